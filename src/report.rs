//! Read-only views over the registry and the trip log: dashboard statistics,
//! trip filtering and the shift summary.

use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::Serialize;

use crate::model::{Bay, BayStats, BayStatus, MAX_SHIFT, ShiftSummary, Trip, TripField};

/// Label used for trips with no region.
pub const NO_REGION: &str = "(none)";

pub fn bay_stats(bays: &[Bay]) -> BayStats {
    let count = |status| bays.iter().filter(|b| b.status == status).count();
    BayStats {
        total: bays.len(),
        free: count(BayStatus::Free),
        occupied: count(BayStatus::Occupied),
        blocked: count(BayStatus::Blocked),
    }
}

/// Date range plus per-field "contains" filters, all of which must match.
#[derive(Debug, Clone, Default)]
pub struct TripFilter {
    /// Inclusive.
    pub from: Option<Date>,
    /// Inclusive.
    pub to: Option<Date>,
    /// Case-insensitive substring matches on the rendered field.
    pub fields: Vec<(TripField, String)>,
}

impl TripFilter {
    /// Parses a `field=needle` filter term.
    pub fn parse_term(term: &str) -> Result<(TripField, String), String> {
        let (name, needle) = term
            .split_once('=')
            .ok_or_else(|| format!("filter must look like field=value, got '{term}'"))?;
        let field = TripField::from_name(name).ok_or_else(|| {
            let known: Vec<&str> = TripField::ALL.iter().map(|f| f.name()).collect();
            format!("unknown field '{name}' (one of: {})", known.join(", "))
        })?;
        Ok((field, needle.trim().to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.fields.is_empty()
    }

    pub fn matches(&self, trip: &Trip) -> bool {
        if self.from.is_some_and(|from| trip.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| trip.date > to) {
            return false;
        }
        self.fields.iter().all(|(field, needle)| {
            trip.field(*field)
                .to_lowercase()
                .contains(&needle.to_lowercase())
        })
    }

    pub fn apply<'a>(&self, trips: &'a [Trip]) -> Vec<&'a Trip> {
        trips.iter().filter(|t| self.matches(t)).collect()
    }
}

/// Dashboard numbers for a set of trips.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStats {
    pub total: usize,
    /// Trips that have left their pré-box.
    pub released: usize,
    pub pending: usize,
    pub average_quantity: f64,
    pub by_region: BTreeMap<String, usize>,
    /// Index 0 is shift 1.
    pub by_shift: [usize; MAX_SHIFT as usize],
}

#[allow(clippy::cast_precision_loss)]
pub fn trip_stats(trips: &[&Trip]) -> TripStats {
    let total = trips.len();
    let released = trips.iter().filter(|t| t.is_released()).count();

    let quantity: u64 = trips.iter().map(|t| u64::from(t.quantity)).sum();
    let average_quantity = if total == 0 {
        0.0
    } else {
        quantity as f64 / total as f64
    };

    let mut by_region = BTreeMap::new();
    let mut by_shift = [0; MAX_SHIFT as usize];
    for trip in trips {
        let region = if trip.region.is_empty() {
            NO_REGION.to_string()
        } else {
            trip.region.clone()
        };
        *by_region.entry(region).or_insert(0) += 1;
        if (1..=MAX_SHIFT).contains(&trip.shift) {
            by_shift[usize::from(trip.shift - 1)] += 1;
        }
    }

    TripStats {
        total,
        released,
        pending: total - released,
        average_quantity,
        by_region,
        by_shift,
    }
}

/// What a shift close records: the day's trips and the registry right now.
pub fn shift_summary(
    bays: &[Bay],
    trips: &[Trip],
    day: Date,
    shift: Option<String>,
) -> ShiftSummary {
    let todays: Vec<&Trip> = trips.iter().filter(|t| t.date == day).collect();
    let completed = todays.iter().filter(|t| t.is_released()).count();
    ShiftSummary {
        day,
        shift,
        total_trips: todays.len(),
        completed_trips: completed,
        pending_trips: todays.len() - completed,
        bays: bay_stats(bays),
    }
}
