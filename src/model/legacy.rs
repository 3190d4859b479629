//! Load-time normalization of stored records.
//!
//! Trip and bay records have been written in several shapes over time:
//! `trip` instead of `tripNumber`, `preBox`/`boxInside` instead of
//! `assignedBay`/`secondaryBayMarker`, quantities stored as strings,
//! `dd/mm/yyyy` dates, numeric ids. Every record read from a backend goes
//! through here and comes out in the canonical shape, or as an error naming
//! the field that could not be understood.

use jiff::Timestamp;
use jiff::civil::{Date, Time};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::bay::{Bay, BayStatus};
use super::trip::{DEFAULT_CARGO_TYPE, MAX_SHIFT, Trip, non_empty};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("unreadable record: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("invalid {field}: {value:?}")]
    Invalid { field: &'static str, value: String },
}

pub type Result<T> = core::result::Result<T, NormalizeError>;

/// A JSON scalar of whatever type the writer happened to use.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl Loose {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

fn text(value: Option<Loose>) -> Option<String> {
    non_empty(value.map(Loose::into_text))
}

/// Every trip shape seen so far, flattened into one permissive struct.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnyTrip {
    id: Option<Loose>,
    date: Option<Loose>,
    time: Option<Loose>,
    #[serde(alias = "trip", alias = "trip_number")]
    trip_number: Option<Loose>,
    #[serde(alias = "oldTrip", alias = "previous_trip_number")]
    previous_trip_number: Option<Loose>,
    #[serde(alias = "preBox", alias = "pre_box")]
    assigned_bay: Option<Loose>,
    #[serde(alias = "boxInside", alias = "boxD")]
    secondary_bay_marker: Option<Loose>,
    quantity: Option<Loose>,
    shift: Option<Loose>,
    #[serde(alias = "cargo_type")]
    cargo_type: Option<Loose>,
    region: Option<Loose>,
    status: Option<Loose>,
    #[serde(alias = "manifestDate")]
    next_manifest_date: Option<Loose>,
    km: Option<Loose>,
    fleet: Option<Loose>,
    exchange: Option<Loose>,
    scheduled: Option<Loose>,
}

/// Normalizes one stored trip record.
pub fn normalize_trip(value: Value) -> Result<Trip> {
    let raw: AnyTrip = serde_json::from_value(value)?;

    let date_text = text(raw.date).ok_or(NormalizeError::Missing("date"))?;
    let date = parse_date(&date_text).ok_or(NormalizeError::Invalid {
        field: "date",
        value: date_text,
    })?;

    let time = match text(raw.time) {
        None => Time::midnight(),
        Some(t) => parse_time(&t).ok_or(NormalizeError::Invalid {
            field: "time",
            value: t,
        })?,
    };

    let shift = match text(raw.shift) {
        None => 1,
        Some(s) => parse_shift(&s).ok_or(NormalizeError::Invalid {
            field: "shift",
            value: s,
        })?,
    };

    let next_manifest_date = match text(raw.next_manifest_date) {
        None => None,
        Some(d) => Some(parse_date(&d).ok_or(NormalizeError::Invalid {
            field: "nextManifestDate",
            value: d,
        })?),
    };

    Ok(Trip {
        id: text(raw.id)
            .and_then(|id| id.parse::<Uuid>().ok())
            .unwrap_or_else(Uuid::new_v4),
        date,
        time,
        trip_number: text(raw.trip_number).unwrap_or_default(),
        previous_trip_number: text(raw.previous_trip_number),
        assigned_bay: text(raw.assigned_bay),
        secondary_bay_marker: text(raw.secondary_bay_marker),
        quantity: text(raw.quantity).map_or(0, |q| parse_quantity(&q)),
        shift,
        cargo_type: text(raw.cargo_type).unwrap_or_else(|| DEFAULT_CARGO_TYPE.into()),
        region: text(raw.region).unwrap_or_default(),
        status: text(raw.status).unwrap_or_default(),
        next_manifest_date,
        km: text(raw.km),
        fleet: text(raw.fleet),
        exchange: text(raw.exchange),
        scheduled: text(raw.scheduled),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnyBay {
    id: Option<Loose>,
    status: Option<Loose>,
    #[serde(alias = "trip")]
    linked_trip: Option<Loose>,
    #[serde(alias = "created_at", alias = "updatedAt")]
    last_update: Option<Loose>,
}

/// Normalizes one stored bay record.
///
/// A blocked bay never keeps a linked trip; one written that way has it dropped.
/// Missing or unreadable timestamps are replaced by `now`.
pub fn normalize_bay(value: Value, now: Timestamp) -> Result<Bay> {
    let raw: AnyBay = serde_json::from_value(value)?;

    let id = text(raw.id).ok_or(NormalizeError::Missing("id"))?;
    let status = match text(raw.status) {
        None => BayStatus::Free,
        Some(s) => s.parse::<BayStatus>().map_err(|_| NormalizeError::Invalid {
            field: "status",
            value: s,
        })?,
    };
    let linked_trip = match status {
        BayStatus::Blocked | BayStatus::Free => None,
        BayStatus::Occupied => text(raw.linked_trip),
    };
    let last_update = text(raw.last_update)
        .and_then(|t| t.parse::<Timestamp>().ok())
        .unwrap_or(now);

    Ok(Bay {
        id,
        status,
        linked_trip,
        last_update,
    })
}

/// Parses `yyyy-mm-dd`, an RFC 3339 datetime prefix, or `dd/mm/yyyy`.
pub fn parse_date(s: &str) -> Option<Date> {
    let s = s.trim();
    if let Ok(d) = s.parse::<Date>() {
        return Some(d);
    }
    if let Some(d) = s.get(..10).and_then(|prefix| prefix.parse::<Date>().ok()) {
        return Some(d);
    }
    let mut parts = s.split('/');
    let day = parts.next()?.trim().parse::<i8>().ok()?;
    let month = parts.next()?.trim().parse::<i8>().ok()?;
    let year = parts.next()?.trim().parse::<i16>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Date::new(year, month, day).ok()
}

/// Parses `H:MM`, `HH:MM` or `HH:MM:SS`. Fractional seconds are dropped.
pub fn parse_time(s: &str) -> Option<Time> {
    let mut parts = s.trim().split(':');
    let hour = parts.next()?.trim().parse::<i8>().ok()?;
    let minute = parts.next()?.trim().parse::<i8>().ok()?;
    let second = match parts.next() {
        None => 0,
        Some(sec) => sec.split('.').next()?.trim().parse::<i8>().ok()?,
    };
    if parts.next().is_some() {
        return None;
    }
    Time::new(hour, minute, second, 0).ok()
}

/// Parses a shift number in `1..=MAX_SHIFT`.
pub fn parse_shift(s: &str) -> Option<u8> {
    let shift = s.trim().parse::<u8>().ok()?;
    (1..=MAX_SHIFT).contains(&shift).then_some(shift)
}

/// Quantities were typed free-hand; anything unreadable or negative counts as zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_quantity(s: &str) -> u32 {
    let s = s.trim();
    if let Ok(q) = s.parse::<u32>() {
        return q;
    }
    s.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|q| q.is_finite() && *q > 0.0)
        .map_or(0, |q| q.round().min(f64::from(u32::MAX)) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::civil::{date, time};
    use serde_json::json;

    fn now() -> Timestamp {
        Timestamp::new(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn normalizes_early_control_entry_shape() {
        let trip = normalize_trip(json!({
            "date": "01/02/2025",
            "trip": "508938",
            "time": "7:34",
            "oldTrip": "",
            "km": "",
            "fleet": "F12",
            "preBox": "331",
            "boxInside": "6",
            "quantity": 11,
            "shift": 1,
            "cargoType": "Distribuição",
            "region": "S",
            "status": "",
            "exchange": "",
            "manifestDate": "01/02/2025",
            "scheduled": ""
        }))
        .unwrap();

        assert_eq!(trip.date, date(2025, 2, 1));
        assert_eq!(trip.time, time(7, 34, 0, 0));
        assert_eq!(trip.trip_number, "508938");
        assert_eq!(trip.previous_trip_number, None);
        assert_eq!(trip.assigned_bay.as_deref(), Some("331"));
        assert_eq!(trip.secondary_bay_marker.as_deref(), Some("6"));
        assert_eq!(trip.fleet.as_deref(), Some("F12"));
        assert_eq!(trip.km, None);
        assert_eq!(trip.next_manifest_date, Some(date(2025, 2, 1)));
    }

    #[test]
    fn normalizes_string_quantities_and_shifts() {
        let trip = normalize_trip(json!({
            "date": "2025-02-01",
            "trip": "1",
            "quantity": "12.6",
            "shift": "3"
        }))
        .unwrap();
        assert_eq!(trip.quantity, 13);
        assert_eq!(trip.shift, 3);
        assert_eq!(trip.time, Time::midnight());
    }

    #[test]
    fn hosted_row_with_numeric_pre_box() {
        let trip = normalize_trip(json!({
            "id": "f1d2a7b0-6a3c-4a53-9a53-3f5fbb2a1c11",
            "created_at": "2025-02-01T10:00:00Z",
            "date": "2025-02-01T10:00:00Z",
            "trip": "5001",
            "quantity": 4,
            "region": "N",
            "shift": 2,
            "pre_box": 101
        }))
        .unwrap();
        assert_eq!(trip.assigned_bay.as_deref(), Some("101"));
        assert_eq!(trip.id.to_string(), "f1d2a7b0-6a3c-4a53-9a53-3f5fbb2a1c11");
    }

    #[test]
    fn canonical_record_passes_through() {
        let original = normalize_trip(json!({"date": "2025-02-01", "tripNumber": "9"})).unwrap();
        let again = normalize_trip(serde_json::to_value(&original).unwrap()).unwrap();
        assert_eq!(again, original);
    }

    #[test]
    fn rejects_missing_or_bad_date() {
        let err = normalize_trip(json!({"trip": "1"})).unwrap_err();
        assert!(matches!(err, NormalizeError::Missing("date")));

        let err = normalize_trip(json!({"trip": "1", "date": "31/02/2025"})).unwrap_err();
        assert!(matches!(err, NormalizeError::Invalid { field: "date", .. }));
    }

    #[test]
    fn rejects_shift_out_of_range() {
        let err = normalize_trip(json!({"date": "2025-02-01", "shift": 9})).unwrap_err();
        assert!(matches!(err, NormalizeError::Invalid { field: "shift", .. }));
    }

    #[test]
    fn blocked_bay_drops_its_trip() {
        let bay = normalize_bay(
            json!({
                "id": 7,
                "status": "blocked",
                "trip": "5001",
                "lastUpdate": "2025-02-01T10:00:00Z"
            }),
            now(),
        )
        .unwrap();
        assert_eq!(bay.id, "7");
        assert_eq!(bay.status, BayStatus::Blocked);
        assert_eq!(bay.linked_trip, None);
        assert_eq!(bay.last_update, "2025-02-01T10:00:00Z".parse().unwrap());
    }

    #[test]
    fn bay_with_unreadable_timestamp_gets_now() {
        let bay = normalize_bay(
            json!({"id": "1", "status": "occupied", "trip": "5001", "lastUpdate": "yesterday"}),
            now(),
        )
        .unwrap();
        assert_eq!(bay.linked_trip.as_deref(), Some("5001"));
        assert_eq!(bay.last_update, now());
    }

    #[test]
    fn time_formats() {
        assert_eq!(parse_time("06:06"), Some(time(6, 6, 0, 0)));
        assert_eq!(parse_time("23:59:30.250"), Some(time(23, 59, 30, 0)));
        assert_eq!(parse_time("25:00"), None);
        assert_eq!(parse_time("noon"), None);
    }
}
