//! Shift close records and the statistics they carry.

use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counts of bays by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BayStats {
    pub total: usize,
    pub free: usize,
    pub occupied: usize,
    pub blocked: usize,
}

impl BayStats {
    /// Occupied share of all bays, in percent. Zero when there are no bays.
    #[allow(clippy::cast_precision_loss)]
    pub fn occupancy_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.occupied as f64 * 100.0 / self.total as f64
    }
}

/// What happened on the floor during one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftSummary {
    pub day: Date,
    /// Name of the configured shift running when the summary was taken.
    pub shift: Option<String>,
    pub total_trips: usize,
    /// Trips that have left their pré-box.
    pub completed_trips: usize,
    pub pending_trips: usize,
    pub bays: BayStats,
}

/// The operator's confirmation checklist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub bays_verified: bool,
    pub pending_documented: bool,
    pub incidents_recorded: bool,
}

impl Checklist {
    pub fn is_complete(&self) -> bool {
        self.bays_verified && self.pending_documented && self.incidents_recorded
    }

    /// Labels of the unchecked items.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.bays_verified {
            missing.push("bays verified");
        }
        if !self.pending_documented {
            missing.push("pending documented");
        }
        if !self.incidents_recorded {
            missing.push("incidents recorded");
        }
        missing
    }
}

/// A closed shift. Appended once, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftClose {
    pub id: Uuid,
    pub closed_at: Timestamp,
    pub operator: Option<String>,
    pub summary: ShiftSummary,
    /// Incidents and observations.
    pub notes: Option<String>,
    pub checklist: Checklist,
}
