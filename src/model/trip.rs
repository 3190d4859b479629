//! Trip types: one shipment record in the trip log.

use jiff::civil::{Date, DateTime, Time};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Highest shift number the floor runs.
pub const MAX_SHIFT: u8 = 6;

/// Cargo type given to new trips when none is specified.
pub const DEFAULT_CARGO_TYPE: &str = "Distribuição";

/// A shipment record, optionally parked in a pré-box.
///
/// Field order here is the column order of the CSV export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    pub date: Date,
    pub time: Time,
    pub trip_number: String,
    #[serde(default)]
    pub previous_trip_number: Option<String>,
    /// The pré-box this trip is parked in.
    #[serde(default)]
    pub assigned_bay: Option<String>,
    /// Set once the load has moved out of the pré-box ("Box-D").
    #[serde(default)]
    pub secondary_bay_marker: Option<String>,
    pub quantity: u32,
    pub shift: u8,
    pub cargo_type: String,
    pub region: String,
    pub status: String,
    #[serde(default)]
    pub next_manifest_date: Option<Date>,
    #[serde(default)]
    pub km: Option<String>,
    #[serde(default)]
    pub fleet: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub scheduled: Option<String>,
}

impl Trip {
    /// Whether the bay assignment has been released.
    pub fn is_released(&self) -> bool {
        self.secondary_bay_marker.is_some()
    }

    /// The bay this trip currently holds, if any.
    pub fn active_bay(&self) -> Option<&str> {
        if self.is_released() {
            return None;
        }
        self.assigned_bay.as_deref()
    }

    /// How bays and messages refer to this trip: its number, or its id when
    /// it has none.
    pub fn link(&self) -> String {
        if self.trip_number.is_empty() {
            self.id.to_string()
        } else {
            self.trip_number.clone()
        }
    }

    /// The trip as a list of display strings, one per [`TripField::ALL`] column.
    pub fn fields(&self) -> Vec<String> {
        TripField::ALL.iter().map(|f| self.field(*f)).collect()
    }

    /// One field rendered as text. Missing optionals render empty.
    pub fn field(&self, field: TripField) -> String {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        match field {
            TripField::Id => self.id.to_string(),
            TripField::Date => self.date.to_string(),
            TripField::Time => format_time(self.time),
            TripField::TripNumber => self.trip_number.clone(),
            TripField::PreviousTripNumber => opt(&self.previous_trip_number),
            TripField::AssignedBay => opt(&self.assigned_bay),
            TripField::SecondaryBayMarker => opt(&self.secondary_bay_marker),
            TripField::Quantity => self.quantity.to_string(),
            TripField::Shift => self.shift.to_string(),
            TripField::CargoType => self.cargo_type.clone(),
            TripField::Region => self.region.clone(),
            TripField::Status => self.status.clone(),
            TripField::NextManifestDate => self
                .next_manifest_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            TripField::Km => opt(&self.km),
            TripField::Fleet => opt(&self.fleet),
            TripField::Exchange => opt(&self.exchange),
            TripField::Scheduled => opt(&self.scheduled),
        }
    }
}

/// A column of the trip log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripField {
    Id,
    Date,
    Time,
    TripNumber,
    PreviousTripNumber,
    AssignedBay,
    SecondaryBayMarker,
    Quantity,
    Shift,
    CargoType,
    Region,
    Status,
    NextManifestDate,
    Km,
    Fleet,
    Exchange,
    Scheduled,
}

impl TripField {
    /// Every column, in declaration order.
    pub const ALL: [TripField; 17] = [
        Self::Id,
        Self::Date,
        Self::Time,
        Self::TripNumber,
        Self::PreviousTripNumber,
        Self::AssignedBay,
        Self::SecondaryBayMarker,
        Self::Quantity,
        Self::Shift,
        Self::CargoType,
        Self::Region,
        Self::Status,
        Self::NextManifestDate,
        Self::Km,
        Self::Fleet,
        Self::Exchange,
        Self::Scheduled,
    ];

    /// The serialized (camelCase) name, used as CSV header.
    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Date => "date",
            Self::Time => "time",
            Self::TripNumber => "tripNumber",
            Self::PreviousTripNumber => "previousTripNumber",
            Self::AssignedBay => "assignedBay",
            Self::SecondaryBayMarker => "secondaryBayMarker",
            Self::Quantity => "quantity",
            Self::Shift => "shift",
            Self::CargoType => "cargoType",
            Self::Region => "region",
            Self::Status => "status",
            Self::NextManifestDate => "nextManifestDate",
            Self::Km => "km",
            Self::Fleet => "fleet",
            Self::Exchange => "exchange",
            Self::Scheduled => "scheduled",
        }
    }

    /// Looks up a column by its serialized name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// What the operator supplies when adding a trip.
///
/// Everything but the trip number has a default.
#[derive(Debug, Clone, Default)]
pub struct TripDraft {
    pub trip_number: String,
    pub date: Option<Date>,
    pub time: Option<Time>,
    pub previous_trip_number: Option<String>,
    pub assigned_bay: Option<String>,
    pub secondary_bay_marker: Option<String>,
    pub quantity: u32,
    pub shift: Option<u8>,
    pub cargo_type: Option<String>,
    pub region: Option<String>,
    pub status: Option<String>,
    pub next_manifest_date: Option<Date>,
}

impl TripDraft {
    /// Builds the trip, stamping missing date and time from `now`.
    pub fn into_trip(self, now: DateTime) -> Trip {
        let date = self.date.unwrap_or(now.date());
        Trip {
            id: Uuid::new_v4(),
            date,
            time: self.time.unwrap_or_else(|| to_minute(now.time())),
            trip_number: self.trip_number.trim().to_string(),
            previous_trip_number: non_empty(self.previous_trip_number),
            assigned_bay: non_empty(self.assigned_bay),
            secondary_bay_marker: non_empty(self.secondary_bay_marker),
            quantity: self.quantity,
            shift: self.shift.unwrap_or(1),
            cargo_type: non_empty(self.cargo_type).unwrap_or_else(|| DEFAULT_CARGO_TYPE.into()),
            region: non_empty(self.region).unwrap_or_default(),
            status: non_empty(self.status).unwrap_or_default(),
            next_manifest_date: self.next_manifest_date.or(Some(date)),
            km: None,
            fleet: None,
            exchange: None,
            scheduled: None,
        }
    }
}

/// A field edit. `None` leaves a field alone; an empty string clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct TripPatch {
    pub trip_number: Option<String>,
    pub date: Option<Date>,
    pub time: Option<Time>,
    pub previous_trip_number: Option<String>,
    pub assigned_bay: Option<String>,
    pub secondary_bay_marker: Option<String>,
    pub quantity: Option<u32>,
    pub shift: Option<u8>,
    pub cargo_type: Option<String>,
    pub region: Option<String>,
    pub status: Option<String>,
}

impl TripPatch {
    /// Applies the edit in place.
    pub fn apply(self, trip: &mut Trip) {
        if let Some(v) = self.trip_number {
            trip.trip_number = v.trim().to_string();
        }
        if let Some(v) = self.date {
            trip.date = v;
        }
        if let Some(v) = self.time {
            trip.time = v;
        }
        if let Some(v) = self.previous_trip_number {
            trip.previous_trip_number = non_empty(Some(v));
        }
        if let Some(v) = self.assigned_bay {
            trip.assigned_bay = non_empty(Some(v));
        }
        if let Some(v) = self.secondary_bay_marker {
            trip.secondary_bay_marker = non_empty(Some(v));
        }
        if let Some(v) = self.quantity {
            trip.quantity = v;
        }
        if let Some(v) = self.shift {
            trip.shift = v;
        }
        if let Some(v) = self.cargo_type {
            trip.cargo_type = v.trim().to_string();
        }
        if let Some(v) = self.region {
            trip.region = v.trim().to_string();
        }
        if let Some(v) = self.status {
            trip.status = v.trim().to_string();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trip_number.is_none()
            && self.date.is_none()
            && self.time.is_none()
            && self.previous_trip_number.is_none()
            && self.assigned_bay.is_none()
            && self.secondary_bay_marker.is_none()
            && self.quantity.is_none()
            && self.shift.is_none()
            && self.cargo_type.is_none()
            && self.region.is_none()
            && self.status.is_none()
    }
}

/// Renders `HH:MM`, or `HH:MM:SS` when seconds are set.
pub(crate) fn format_time(time: Time) -> String {
    if time.second() == 0 {
        time.strftime("%H:%M").to_string()
    } else {
        time.strftime("%H:%M:%S").to_string()
    }
}

/// Truncates to whole minutes.
fn to_minute(time: Time) -> Time {
    jiff::civil::time(time.hour(), time.minute(), 0, 0)
}

/// Trims a string and maps blank to `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::civil::date;

    fn now() -> DateTime {
        date(2025, 2, 1).at(7, 34, 12, 500)
    }

    #[test]
    fn draft_fills_defaults_from_now() {
        let trip = TripDraft {
            trip_number: " 508938 ".into(),
            assigned_bay: Some("331".into()),
            region: Some("S".into()),
            quantity: 11,
            ..TripDraft::default()
        }
        .into_trip(now());

        assert_eq!(trip.trip_number, "508938");
        assert_eq!(trip.date, date(2025, 2, 1));
        assert_eq!(trip.field(TripField::Time), "07:34");
        assert_eq!(trip.shift, 1);
        assert_eq!(trip.cargo_type, DEFAULT_CARGO_TYPE);
        assert_eq!(trip.next_manifest_date, Some(date(2025, 2, 1)));
        assert_eq!(trip.active_bay(), Some("331"));
    }

    #[test]
    fn blank_bay_becomes_none() {
        let trip = TripDraft {
            trip_number: "1".into(),
            assigned_bay: Some("   ".into()),
            ..TripDraft::default()
        }
        .into_trip(now());
        assert_eq!(trip.assigned_bay, None);
    }

    #[test]
    fn released_trip_holds_no_bay() {
        let mut trip = TripDraft {
            trip_number: "1".into(),
            assigned_bay: Some("101".into()),
            ..TripDraft::default()
        }
        .into_trip(now());

        TripPatch {
            secondary_bay_marker: Some("6".into()),
            ..TripPatch::default()
        }
        .apply(&mut trip);

        assert!(trip.is_released());
        assert_eq!(trip.active_bay(), None);
        assert_eq!(trip.assigned_bay.as_deref(), Some("101"));
    }

    #[test]
    fn empty_patch_string_clears_optional_field() {
        let mut trip = TripDraft {
            trip_number: "1".into(),
            assigned_bay: Some("101".into()),
            ..TripDraft::default()
        }
        .into_trip(now());

        let patch = TripPatch {
            assigned_bay: Some(String::new()),
            ..TripPatch::default()
        };
        assert!(!patch.is_empty());
        patch.apply(&mut trip);
        assert_eq!(trip.assigned_bay, None);
    }

    #[test]
    fn field_names_round_trip() {
        for field in TripField::ALL {
            assert_eq!(TripField::from_name(field.name()), Some(field));
        }
        assert_eq!(TripField::from_name("ASSIGNEDBAY"), Some(TripField::AssignedBay));
        assert_eq!(TripField::from_name("nope"), None);
    }
}
