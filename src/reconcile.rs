//! Reconciliation: derive each bay's status from the trip log.
//!
//! A bay is occupied when exactly one active trip (assigned to it, not yet
//! released) references it, and free when none does. Blocked bays are a manual
//! override and are left exactly as they are.
//!
//! The function is pure. It never touches the trip log, never persists, and
//! only moves a bay's `last_update` when its status or linked trip changes, so
//! running it on its own output is a no-op.

use std::collections::{HashMap, HashSet};

use jiff::Timestamp;

use crate::model::{Bay, BayStatus, Trip};

/// The derived bay list plus everything worth warning about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub bays: Vec<Bay>,
    /// Bays held by more than one active trip.
    pub duplicates: Vec<DuplicateAssignment>,
    /// Active trips pointing at a bay that doesn't exist.
    pub orphans: Vec<OrphanTrip>,
}

impl Reconciliation {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }
}

/// More than one active trip claims the same bay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateAssignment {
    pub bay_id: String,
    /// In trip log order. The first one is the trip linked to the bay.
    pub trip_numbers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanTrip {
    pub trip_number: String,
    pub bay_id: String,
}

/// Derives bay statuses from `trips`, stamping changed bays with `now`.
pub fn reconcile(bays: &[Bay], trips: &[Trip], now: Timestamp) -> Reconciliation {
    let mut active: HashMap<&str, Vec<&Trip>> = HashMap::new();
    for trip in trips {
        if let Some(bay_id) = trip.active_bay() {
            active.entry(bay_id).or_default().push(trip);
        }
    }

    let mut duplicates = Vec::new();
    let derived = bays
        .iter()
        .map(|bay| {
            let claims = active.get(bay.id.as_str()).map_or(&[][..], Vec::as_slice);
            if claims.len() > 1 {
                duplicates.push(DuplicateAssignment {
                    bay_id: bay.id.clone(),
                    trip_numbers: claims.iter().map(|t| t.link()).collect(),
                });
            }

            let mut next = bay.clone();
            if bay.status != BayStatus::Blocked {
                match claims.first() {
                    None => next.apply(BayStatus::Free, None, now),
                    Some(trip) => next.apply(BayStatus::Occupied, Some(trip.link()), now),
                };
            }
            next
        })
        .collect();

    let known: HashSet<&str> = bays.iter().map(|b| b.id.as_str()).collect();
    let orphans = trips
        .iter()
        .filter_map(|trip| {
            let bay_id = trip.active_bay()?;
            (!known.contains(bay_id)).then(|| OrphanTrip {
                trip_number: trip.link(),
                bay_id: bay_id.to_string(),
            })
        })
        .collect();

    Reconciliation {
        bays: derived,
        duplicates,
        orphans,
    }
}
