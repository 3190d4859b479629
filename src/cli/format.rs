//! Output formatting for CLI display.

use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::config::Notifications;
use crate::model::{Bay, BayStats, BayStatus, Trip, TripField};
use crate::store::{Notice, NoticeKind, Store};

/// Bays per line in the grid.
const GRID_WIDTH: usize = 10;

/// Print notices to stderr, dropping the ones notifications turn off.
/// Warnings are always shown.
pub(super) fn print_notices(notices: &[Notice], settings: &Notifications) {
    for notice in notices.iter().filter(|n| should_show(n.kind, settings)) {
        match notice.kind {
            NoticeKind::Warning => eprintln!("warning: {}", notice.message),
            _ => eprintln!("{}", notice.message),
        }
    }
}

fn should_show(kind: NoticeKind, settings: &Notifications) -> bool {
    match kind {
        NoticeKind::Warning | NoticeKind::Info => true,
        NoticeKind::BayOccupied => settings.enabled && settings.bay_occupied,
        NoticeKind::TripReleased => settings.enabled && settings.trip_released,
    }
}

/// Duplicate assignments and orphan trips, repeated every time state is shown.
pub(super) fn print_standing_warnings(store: &Store) {
    for dup in store.duplicates() {
        eprintln!(
            "warning: bay {} is held by {} active trips: {}",
            dup.bay_id,
            dup.trip_numbers.len(),
            dup.trip_numbers.join(", ")
        );
    }
    for orphan in store.orphans() {
        eprintln!(
            "warning: trip {} points at bay {}, which does not exist",
            orphan.trip_number, orphan.bay_id
        );
    }
}

/// Local wall-clock time, to the second.
pub(super) fn format_timestamp(at: Timestamp) -> String {
    at.to_zoned(TimeZone::system())
        .strftime("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn status_mark(status: BayStatus) -> char {
    match status {
        BayStatus::Free => '.',
        BayStatus::Occupied => '#',
        BayStatus::Blocked => 'x',
    }
}

/// The bay grid: `id` plus a status mark, `GRID_WIDTH` bays per line.
pub(super) fn format_grid(bays: &[Bay]) -> String {
    let width = bays.iter().map(|b| b.id.chars().count()).max().unwrap_or(0);
    bays.chunks(GRID_WIDTH)
        .map(|row| {
            row.iter()
                .map(|b| format!("{:>width$}{}", b.id, status_mark(b.status)))
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(super) fn format_bay_stats(stats: &BayStats) -> String {
    format!(
        "{} bays: {} free, {} occupied, {} blocked ({:.1}% occupied)",
        stats.total,
        stats.free,
        stats.occupied,
        stats.blocked,
        stats.occupancy_rate()
    )
}

/// One line per bay for `bay list`.
pub(super) fn format_bay_line(bay: &Bay) -> String {
    let trip = bay.linked_trip.as_deref().unwrap_or("-");
    format!(
        "{:<6} {:<8} {:<10} {}",
        bay.id,
        bay.status.as_str(),
        trip,
        format_timestamp(bay.last_update)
    )
}

/// One line per trip for `trip list`.
pub(super) fn format_trip_line(trip: &Trip) -> String {
    let short_id = &trip.id.to_string()[..8];
    let bay = trip.assigned_bay.as_deref().unwrap_or("-");
    let state = match &trip.secondary_bay_marker {
        Some(marker) => format!("released ({marker})"),
        None => "active".to_string(),
    };
    format!(
        "{short_id}  {} {:<5}  {:<10} bay {:<5} qty {:<4} shift {}  {:<10} {state}",
        trip.date,
        trip.field(TripField::Time),
        trip.trip_number,
        bay,
        trip.quantity,
        trip.shift,
        trip.region,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_wraps_and_marks_status() {
        let now = Timestamp::UNIX_EPOCH;
        let mut bays: Vec<Bay> = (1..=12).map(|n| Bay::free(n.to_string(), now)).collect();
        bays[0].set_status(BayStatus::Blocked, now);

        let grid = format_grid(&bays);
        let lines: Vec<&str> = grid.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(" 1x   2."));
        assert!(lines[1].ends_with("12."));
    }

    #[test]
    fn empty_grid_is_empty() {
        assert_eq!(format_grid(&[]), "");
    }

    #[test]
    fn disabled_notifications_hide_only_alerts() {
        let settings = Notifications {
            enabled: false,
            ..Notifications::default()
        };
        assert!(!should_show(NoticeKind::BayOccupied, &settings));
        assert!(!should_show(NoticeKind::TripReleased, &settings));
        assert!(should_show(NoticeKind::Warning, &settings));
        assert!(should_show(NoticeKind::Info, &settings));
    }
}
