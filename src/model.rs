//! Core data model for prebox.
//!
//! Bays and trips, the changes recorded between them, and shift closes.

mod bay;
mod change;
mod legacy;
mod shift;
mod trip;

pub use bay::{Bay, BayStatus};
pub use change::{ChangeEvent, ChangeKind, Collection, diff_bays, diff_trips};
pub use legacy::{
    NormalizeError, normalize_bay, normalize_trip, parse_date, parse_shift, parse_time,
};
pub use shift::{BayStats, Checklist, ShiftClose, ShiftSummary};
pub use trip::{DEFAULT_CARGO_TYPE, MAX_SHIFT, Trip, TripDraft, TripField, TripPatch};
