//! Row-level change events, as recorded in the journal.

use std::collections::HashMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{Bay, Trip};

/// One insert, update or delete of a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    /// Bay id or trip id.
    pub key: String,
    pub at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Bays,
    Trips,
}

impl Collection {
    /// Stable storage key of the collection.
    pub fn key(self) -> &'static str {
        match self {
            Self::Bays => "bays",
            Self::Trips => "trips",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Changes that turn `before` into `after` for the bay registry.
pub fn diff_bays(before: &[Bay], after: &[Bay], at: Timestamp) -> Vec<ChangeEvent> {
    diff(Collection::Bays, before, after, |b| b.id.clone(), at)
}

/// Changes that turn `before` into `after` for the trip log.
pub fn diff_trips(before: &[Trip], after: &[Trip], at: Timestamp) -> Vec<ChangeEvent> {
    diff(Collection::Trips, before, after, |t| t.id.to_string(), at)
}

/// Inserts and updates in `after` order, then deletes in `before` order.
fn diff<T: PartialEq>(
    collection: Collection,
    before: &[T],
    after: &[T],
    key: impl Fn(&T) -> String,
    at: Timestamp,
) -> Vec<ChangeEvent> {
    let old: HashMap<String, &T> = before.iter().map(|r| (key(r), r)).collect();
    let new: HashMap<String, &T> = after.iter().map(|r| (key(r), r)).collect();

    let event = |kind, key| ChangeEvent {
        collection,
        kind,
        key,
        at,
    };

    let mut events = Vec::new();
    for record in after {
        let k = key(record);
        match old.get(&k) {
            None => events.push(event(ChangeKind::Insert, k)),
            Some(prev) if *prev != record => events.push(event(ChangeKind::Update, k)),
            Some(_) => {}
        }
    }
    for record in before {
        let k = key(record);
        if !new.contains_key(&k) {
            events.push(event(ChangeKind::Delete, k));
        }
    }
    events
}
