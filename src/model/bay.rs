//! Bay types: one physical pré-box slot on the floor.

use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A storage bay tracked by id and occupancy.
///
/// `linked_trip` is `None` whenever the bay is free or blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bay {
    pub id: String,
    pub status: BayStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_trip: Option<String>,
    pub last_update: Timestamp,
}

impl Bay {
    /// A new, free bay.
    pub fn free(id: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: id.into(),
            status: BayStatus::Free,
            linked_trip: None,
            last_update: now,
        }
    }

    /// Whether the bay currently satisfies the status/trip invariant.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            BayStatus::Free | BayStatus::Blocked => self.linked_trip.is_none(),
            BayStatus::Occupied => self.linked_trip.is_some(),
        }
    }

    /// Moves the bay to `status`, clearing the linked trip unless it stays occupied.
    ///
    /// Returns `true` if anything changed. `last_update` only moves on change.
    pub fn set_status(&mut self, status: BayStatus, now: Timestamp) -> bool {
        let linked_trip = match status {
            BayStatus::Occupied => self.linked_trip.clone(),
            BayStatus::Free | BayStatus::Blocked => None,
        };
        self.apply(status, linked_trip, now)
    }

    /// Sets status and linked trip together. Returns `true` if anything changed.
    pub(crate) fn apply(
        &mut self,
        status: BayStatus,
        linked_trip: Option<String>,
        now: Timestamp,
    ) -> bool {
        if self.status == status && self.linked_trip == linked_trip {
            return false;
        }
        self.status = status;
        self.linked_trip = linked_trip;
        self.last_update = now;
        true
    }
}

/// Where a bay stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BayStatus {
    Free,
    Occupied,
    /// Manual override. Never changed by reconciliation.
    Blocked,
}

impl BayStatus {
    /// The next status in the manual click cycle:
    /// `occupied → free → blocked → occupied`.
    pub fn cycle(self) -> Self {
        match self {
            Self::Occupied => Self::Free,
            Self::Free => Self::Blocked,
            Self::Blocked => Self::Occupied,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Occupied => "occupied",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for BayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "occupied" => Ok(Self::Occupied),
            "blocked" => Ok(Self::Blocked),
            other => Err(format!("unknown bay status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> Timestamp {
        Timestamp::new(secs, 0).unwrap()
    }

    #[test]
    fn cycle_visits_every_status_and_returns() {
        let start = BayStatus::Occupied;
        assert_eq!(start.cycle(), BayStatus::Free);
        assert_eq!(start.cycle().cycle(), BayStatus::Blocked);
        assert_eq!(start.cycle().cycle().cycle(), start);
    }

    #[test]
    fn blocking_clears_linked_trip() {
        let mut bay = Bay::free("101", t(1));
        bay.apply(BayStatus::Occupied, Some("5001".into()), t(2));

        assert!(bay.set_status(BayStatus::Blocked, t(3)));
        assert_eq!(bay.linked_trip, None);
        assert_eq!(bay.last_update, t(3));
        assert!(bay.is_consistent());
    }

    #[test]
    fn unchanged_status_keeps_timestamp() {
        let mut bay = Bay::free("7", t(1));
        assert!(!bay.set_status(BayStatus::Free, t(9)));
        assert_eq!(bay.last_update, t(1));
    }

    #[test]
    fn occupied_without_trip_is_inconsistent() {
        let mut bay = Bay::free("7", t(1));
        bay.set_status(BayStatus::Occupied, t(2));
        assert!(!bay.is_consistent());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Blocked".parse::<BayStatus>().unwrap(), BayStatus::Blocked);
        assert!("gone".parse::<BayStatus>().is_err());
    }

    #[test]
    fn serializes_lowercase_status_and_camel_case_fields() {
        let bay = Bay::free("12", t(0));
        let json = serde_json::to_value(&bay).unwrap();
        assert_eq!(json["status"], "free");
        assert!(json.get("lastUpdate").is_some());
        assert!(json.get("linkedTrip").is_none());
    }
}
