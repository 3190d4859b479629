//! The application store: sole owner of the bay registry and the trip log.
//!
//! Built once at startup and passed by reference to every command. Each
//! mutation follows the same path: validate, change memory, reconcile, persist
//! through the fallback chain, journal the row-level changes, and hand back
//! the notices worth showing. A failed save never undoes the in-memory change.

use std::collections::HashSet;

use jiff::Timestamp;
use jiff::civil::Date;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{BackupSettings, Config};
use crate::model::{
    Bay, BayStatus, Checklist, Collection, MAX_SHIFT, ShiftClose, Trip, TripDraft, TripPatch,
    diff_bays, diff_trips,
};
use crate::reconcile::{DuplicateAssignment, OrphanTrip, reconcile};
use crate::report::shift_summary;
use crate::storage::{BackupError, BackupInfo, LoadSource, Snapshot, Storage, StorageError};

/// Marker recorded on a trip released without naming where the load went.
pub const RELEASED_MARKER: &str = "Box-D";

/// Validation and lookup failures. None of them change state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("bay id must not be empty")]
    EmptyBayId,

    #[error("bay {0} already exists")]
    DuplicateBay(String),

    #[error("no bay {0}")]
    UnknownBay(String),

    #[error("no trip matching '{0}'")]
    UnknownTrip(String),

    #[error("'{reference}' is ambiguous: matches {count} trips")]
    AmbiguousTrip { reference: String, count: usize },

    #[error("shift must be between 1 and {max}, got {0}", max = MAX_SHIFT)]
    ShiftOutOfRange(u8),

    #[error("nothing to change")]
    EmptyPatch,

    #[error("checklist incomplete: {0}")]
    ChecklistIncomplete(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Backup(#[from] BackupError),
}

pub type Result<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    BayOccupied,
    TripReleased,
    /// Something went wrong but the change was applied.
    Warning,
}

/// A non-fatal message produced by a store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, message)
    }

    fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Warning, message)
    }
}

/// What a mutation has to say for itself.
#[derive(Debug, Default)]
#[must_use]
pub struct Outcome {
    pub notices: Vec<Notice>,
}

pub struct Store {
    storage: Storage,
    bays: Vec<Bay>,
    trips: Vec<Trip>,
    duplicates: Vec<DuplicateAssignment>,
    orphans: Vec<OrphanTrip>,
}

impl Store {
    /// Loads both collections and reconciles them. Never fails; load
    /// problems come back as warnings.
    pub fn open(storage: Storage, config: &Config, now: Timestamp) -> (Self, Vec<Notice>) {
        let loaded = storage.load(config.general.initial_bays, now);
        let mut notices: Vec<Notice> = loaded.warnings.into_iter().map(Notice::warning).collect();
        match loaded.source {
            LoadSource::Primary => {}
            LoadSource::Fallback => notices.push(Notice::warning(
                "loaded from the local cache; the primary store is behind",
            )),
            LoadSource::Default => notices.push(Notice::warning(
                "no store could be read; starting from defaults",
            )),
        }
        let mut store = Self {
            storage,
            bays: loaded.snapshot.bays,
            trips: loaded.snapshot.trips,
            duplicates: Vec::new(),
            orphans: Vec::new(),
        };
        store.settle(now);

        // Collections read from the cache or rewritten on load go back to the primary.
        for collection in loaded.resave {
            let outcome = match collection {
                Collection::Bays => store.storage.save_bays(&store.bays),
                Collection::Trips => store.storage.save_trips(&store.trips),
            };
            if let Some(n) = outcome.notice(collection.key()) {
                notices.push(Notice::warning(n));
            }
        }
        (store, notices)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn bays(&self) -> &[Bay] {
        &self.bays
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    /// Bays claimed by more than one active trip. Never resolved automatically.
    pub fn duplicates(&self) -> &[DuplicateAssignment] {
        &self.duplicates
    }

    /// Active trips pointing at bays that don't exist.
    pub fn orphans(&self) -> &[OrphanTrip] {
        &self.orphans
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            bays: self.bays.clone(),
            trips: self.trips.clone(),
        }
    }

    pub fn bay(&self, id: &str) -> Option<&Bay> {
        self.bays.iter().find(|b| b.id == id.trim())
    }

    /// Finds a trip by full id, unambiguous id prefix, or trip number.
    pub fn find_trip(&self, reference: &str) -> Result<&Trip> {
        self.trip_index(reference).map(|i| &self.trips[i])
    }

    // ── Bays ──

    pub fn add_bay(&mut self, id: &str, now: Timestamp) -> Result<Outcome> {
        let id = id.trim();
        if id.is_empty() {
            return Err(StoreError::EmptyBayId);
        }
        if self.bay(id).is_some() {
            return Err(StoreError::DuplicateBay(id.to_string()));
        }
        let before = self.snapshot();
        self.bays.push(Bay::free(id, now));
        Ok(self.commit(&before, now, vec![Notice::info(format!("bay {id} added"))]))
    }

    pub fn remove_bay(&mut self, id: &str, now: Timestamp) -> Result<Outcome> {
        let index = self.bay_index(id)?;
        let before = self.snapshot();
        let bay = self.bays.remove(index);
        Ok(self.commit(&before, now, vec![Notice::info(format!("bay {} removed", bay.id))]))
    }

    /// Creates bays `1..=count` that don't exist yet.
    pub fn seed_bays(&mut self, count: usize, now: Timestamp) -> Outcome {
        let before = self.snapshot();
        let mut added = 0;
        for n in 1..=count {
            let id = n.to_string();
            if self.bay(&id).is_none() {
                self.bays.push(Bay::free(id, now));
                added += 1;
            }
        }
        self.commit(&before, now, vec![Notice::info(format!("{added} bay(s) added"))])
    }

    /// Advances the bay one step through `occupied → free → blocked → occupied`.
    ///
    /// Only `blocked` sticks: any other result is settled by the trip log. A
    /// bay an active trip still holds skips `free` and goes straight to
    /// `blocked`.
    pub fn cycle_bay(&mut self, id: &str, now: Timestamp) -> Result<Outcome> {
        let index = self.bay_index(id)?;
        let bay = &self.bays[index];
        let mut target = bay.status.cycle();
        if target == BayStatus::Free && !self.active_claims(&bay.id).is_empty() {
            target = BayStatus::Blocked;
        }
        self.force_status(index, target, now)
    }

    pub fn block_bay(&mut self, id: &str, now: Timestamp) -> Result<Outcome> {
        let index = self.bay_index(id)?;
        if self.bays[index].status == BayStatus::Blocked {
            let message = format!("bay {} is already blocked", self.bays[index].id);
            return Ok(Outcome {
                notices: vec![Notice::info(message)],
            });
        }
        self.force_status(index, BayStatus::Blocked, now)
    }

    /// Lifts a block. The bay becomes free, or occupied if a trip holds it.
    pub fn unblock_bay(&mut self, id: &str, now: Timestamp) -> Result<Outcome> {
        let index = self.bay_index(id)?;
        if self.bays[index].status != BayStatus::Blocked {
            let message = format!("bay {} is not blocked", self.bays[index].id);
            return Ok(Outcome {
                notices: vec![Notice::info(message)],
            });
        }
        self.force_status(index, BayStatus::Free, now)
    }

    fn force_status(&mut self, index: usize, target: BayStatus, now: Timestamp) -> Result<Outcome> {
        let before = self.snapshot();
        let id = self.bays[index].id.clone();
        self.bays[index].set_status(target, now);

        let mut notices = Vec::new();
        let claims = self.active_claims(&id);
        if target == BayStatus::Blocked
            && let Some(trip) = claims.first()
        {
            notices.push(Notice::warning(format!(
                "bay {id} blocked while trip {trip} still points at it"
            )));
        }

        let mut outcome = self.commit(&before, now, notices);
        let settled = self.bays[index].status;
        if settled != target {
            let why = match claims.first() {
                Some(trip) => format!("trip {trip} is still active there"),
                None => "no active trip points at it".to_string(),
            };
            outcome.notices.insert(
                0,
                Notice::info(format!("bay {id} settled to {settled}: {why}")),
            );
        }
        Ok(outcome)
    }

    // ── Trips ──

    /// Adds a trip. Returns its id.
    pub fn add_trip(&mut self, draft: TripDraft, now: Timestamp) -> Result<(Uuid, Outcome)> {
        if let Some(shift) = draft.shift {
            check_shift(shift)?;
        }
        let before = self.snapshot();
        let trip = draft.into_trip(now.to_zoned(jiff::tz::TimeZone::system()).datetime());
        let id = trip.id;
        let mut notices = self.assignment_warnings(&trip);
        notices.insert(0, Notice::info(format!("trip {} added", trip.link())));
        self.trips.push(trip);
        Ok((id, self.commit(&before, now, notices)))
    }

    pub fn update_trip(
        &mut self,
        reference: &str,
        patch: TripPatch,
        now: Timestamp,
    ) -> Result<Outcome> {
        if patch.is_empty() {
            return Err(StoreError::EmptyPatch);
        }
        if let Some(shift) = patch.shift {
            check_shift(shift)?;
        }
        let index = self.trip_index(reference)?;
        let before = self.snapshot();
        patch.apply(&mut self.trips[index]);
        let mut notices = vec![Notice::info(format!("trip {} updated", self.trips[index].link()))];
        notices.extend(self.assignment_warnings(&self.trips[index]));
        Ok(self.commit(&before, now, notices))
    }

    /// Marks the load as moved out of its pré-box, freeing the bay.
    pub fn release_trip(
        &mut self,
        reference: &str,
        marker: Option<&str>,
        now: Timestamp,
    ) -> Result<Outcome> {
        let index = self.trip_index(reference)?;
        let trip = &self.trips[index];
        if trip.is_released() {
            return Ok(Outcome {
                notices: vec![Notice::info(format!("trip {} is already released", trip.link()))],
            });
        }
        let held = trip.assigned_bay.clone();
        let before = self.snapshot();
        let marker = marker.map(str::trim).filter(|m| !m.is_empty()).unwrap_or(RELEASED_MARKER);
        self.trips[index].secondary_bay_marker = Some(marker.to_string());

        let message = match held {
            Some(bay) => format!("trip {} released bay {bay}", self.trips[index].link()),
            None => format!("trip {} released", self.trips[index].link()),
        };
        Ok(self.commit(&before, now, vec![Notice::new(NoticeKind::TripReleased, message)]))
    }

    pub fn remove_trip(&mut self, reference: &str, now: Timestamp) -> Result<Outcome> {
        let index = self.trip_index(reference)?;
        let before = self.snapshot();
        let trip = self.trips.remove(index);
        Ok(self.commit(&before, now, vec![Notice::info(format!("trip {} removed", trip.link()))]))
    }

    /// Appends trips read from elsewhere. Trips whose id is already in the log
    /// are skipped; any trip with an invalid shift rejects the whole batch.
    pub fn import_trips(&mut self, trips: Vec<Trip>, now: Timestamp) -> Result<Outcome> {
        for trip in &trips {
            check_shift(trip.shift)?;
        }
        let before = self.snapshot();
        let mut known: HashSet<Uuid> = self.trips.iter().map(|t| t.id).collect();
        let mut skipped = 0;
        let mut added = 0;
        for trip in trips {
            if known.insert(trip.id) {
                self.trips.push(trip);
                added += 1;
            } else {
                skipped += 1;
            }
        }
        let mut notices = vec![Notice::info(format!("{added} trip(s) imported"))];
        if skipped > 0 {
            notices.push(Notice::info(format!("{skipped} trip(s) already in the log, skipped")));
        }
        Ok(self.commit(&before, now, notices))
    }

    pub fn clear_trips(&mut self, now: Timestamp) -> Outcome {
        let before = self.snapshot();
        let count = self.trips.len();
        self.trips.clear();
        self.commit(&before, now, vec![Notice::info(format!("{count} trip(s) removed"))])
    }

    // ── Whole data set ──

    /// Replaces both collections.
    pub fn restore(&mut self, snapshot: Snapshot, now: Timestamp) -> Outcome {
        let before = self.snapshot();
        let message = format!(
            "restored {} bay(s) and {} trip(s)",
            snapshot.bays.len(),
            snapshot.trips.len()
        );
        self.bays = snapshot.bays;
        self.trips = snapshot.trips;
        self.commit(&before, now, vec![Notice::info(message)])
    }

    /// Restores a named backup, honoring the validation and safety-backup settings.
    pub fn restore_backup(
        &mut self,
        name: &str,
        settings: &BackupSettings,
        now: Timestamp,
    ) -> Result<Outcome> {
        let snapshot = self.storage.read_backup(name, settings.validate_before_restore)?;
        let mut notices = Vec::new();
        if settings.create_backup_before_restore {
            let safety = self
                .storage
                .create_backup(&self.snapshot(), settings.compression, now)?;
            notices.push(Notice::info(format!("current data saved as {}", safety.name)));
        }
        let mut outcome = self.restore(snapshot, now);
        notices.append(&mut outcome.notices);
        outcome.notices = notices;
        Ok(outcome)
    }

    /// Takes a backup when automatic backups are on and the newest one is
    /// older than the configured frequency. Prunes afterwards.
    pub fn auto_backup(
        &self,
        settings: &BackupSettings,
        now: Timestamp,
    ) -> Result<Option<BackupInfo>> {
        if !settings.auto_backup {
            return Ok(None);
        }
        let newest = self.storage.list_backups()?.into_iter().filter_map(|b| b.modified).max();
        let due = newest.is_none_or(|at| {
            now.duration_since(at).as_hours() >= settings.frequency.hours()
        });
        if !due {
            return Ok(None);
        }
        let info = self.storage.create_backup(&self.snapshot(), settings.compression, now)?;
        self.storage.prune_backups(settings.keep_count)?;
        Ok(Some(info))
    }

    /// Records the end of a shift. Refused unless the checklist is complete.
    pub fn close_shift(
        &self,
        config: &Config,
        day: Date,
        checklist: Checklist,
        notes: Option<String>,
        operator: Option<String>,
        now: Timestamp,
    ) -> Result<ShiftClose> {
        if !checklist.is_complete() {
            return Err(StoreError::ChecklistIncomplete(checklist.missing().join(", ")));
        }
        let time = now.to_zoned(jiff::tz::TimeZone::system()).time();
        let shift = config.current_shift(time).map(|s| s.name.clone());
        let close = ShiftClose {
            id: Uuid::new_v4(),
            closed_at: now,
            operator,
            summary: shift_summary(&self.bays, &self.trips, day, shift),
            notes: notes.filter(|n| !n.trim().is_empty()),
            checklist,
        };
        self.storage.append_shift_close(&close)?;
        info!(id = %close.id, day = %day, "shift closed");
        Ok(close)
    }

    // ── Internals ──

    /// Re-derives bay statuses from the trip log.
    fn settle(&mut self, now: Timestamp) {
        let stale = self.bays.iter().filter(|b| !b.is_consistent()).count();
        let result = reconcile(&self.bays, &self.trips, now);
        if stale > 0 {
            debug!(stale, "bays out of step with their status");
        }
        if result.has_duplicates() {
            warn!(count = result.duplicates.len(), "bays held by more than one trip");
        }
        self.bays = result.bays;
        self.duplicates = result.duplicates;
        self.orphans = result.orphans;
    }

    /// Reconciles, persists what changed and journals it.
    fn commit(&mut self, before: &Snapshot, now: Timestamp, mut notices: Vec<Notice>) -> Outcome {
        self.settle(now);
        notices.extend(self.occupancy_notices(&before.bays));

        let bay_changes = diff_bays(&before.bays, &self.bays, now);
        let trip_changes = diff_trips(&before.trips, &self.trips, now);
        debug!(bays = bay_changes.len(), trips = trip_changes.len(), "committing");

        if !bay_changes.is_empty()
            && let Some(n) = self.storage.save_bays(&self.bays).notice("bays")
        {
            notices.push(Notice::warning(n));
        }
        if !trip_changes.is_empty()
            && let Some(n) = self.storage.save_trips(&self.trips).notice("trips")
        {
            notices.push(Notice::warning(n));
        }

        let changes: Vec<_> = bay_changes.into_iter().chain(trip_changes).collect();
        if let Err(e) = self.storage.append_changes(&changes) {
            warn!(error = %e, "journal append failed");
            notices.push(Notice::warning(format!("change journal not updated: {e}")));
        }

        Outcome { notices }
    }

    /// Notices for bays that became occupied or were freed.
    fn occupancy_notices(&self, before: &[Bay]) -> Vec<Notice> {
        let mut notices = Vec::new();
        for bay in &self.bays {
            let prev = before.iter().find(|b| b.id == bay.id);
            let was_occupied = prev.is_some_and(|b| b.status == BayStatus::Occupied);
            match (&bay.linked_trip, bay.status) {
                (Some(trip), BayStatus::Occupied)
                    if prev.and_then(|b| b.linked_trip.as_ref()) != Some(trip) =>
                {
                    notices.push(Notice::new(
                        NoticeKind::BayOccupied,
                        format!("bay {} occupied by trip {trip}", bay.id),
                    ));
                }
                (_, BayStatus::Free) if was_occupied => {
                    notices.push(Notice::info(format!("bay {} is free", bay.id)));
                }
                _ => {}
            }
        }
        notices
    }

    /// Warnings about where a trip says it is parked.
    fn assignment_warnings(&self, trip: &Trip) -> Vec<Notice> {
        let Some(bay_id) = trip.active_bay() else {
            return Vec::new();
        };
        match self.bay(bay_id) {
            None => vec![Notice::warning(format!("bay {bay_id} does not exist"))],
            Some(bay) if bay.status == BayStatus::Blocked => {
                vec![Notice::warning(format!("bay {bay_id} is blocked"))]
            }
            Some(_) => {
                let others: Vec<String> = self
                    .active_claims(bay_id)
                    .into_iter()
                    .filter(|n| *n != trip.link())
                    .collect();
                if others.is_empty() {
                    Vec::new()
                } else {
                    vec![Notice::warning(format!(
                        "bay {bay_id} is already held by trip {}",
                        others.join(", ")
                    ))]
                }
            }
        }
    }

    /// Labels of active trips that claim `bay_id`, in log order.
    fn active_claims(&self, bay_id: &str) -> Vec<String> {
        self.trips
            .iter()
            .filter(|t| t.active_bay() == Some(bay_id))
            .map(Trip::link)
            .collect()
    }

    fn bay_index(&self, id: &str) -> Result<usize> {
        let id = id.trim();
        self.bays
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| StoreError::UnknownBay(id.to_string()))
    }

    fn trip_index(&self, reference: &str) -> Result<usize> {
        let reference = reference.trim();
        if let Ok(id) = reference.parse::<Uuid>() {
            return self
                .trips
                .iter()
                .position(|t| t.id == id)
                .ok_or_else(|| StoreError::UnknownTrip(reference.to_string()));
        }

        let by_number: Vec<usize> = positions(&self.trips, |t| t.trip_number == reference);
        let matches = if by_number.is_empty() && !reference.is_empty() {
            positions(&self.trips, |t| t.id.to_string().starts_with(reference))
        } else {
            by_number
        };

        match matches.as_slice() {
            [] => Err(StoreError::UnknownTrip(reference.to_string())),
            [index] => Ok(*index),
            many => Err(StoreError::AmbiguousTrip {
                reference: reference.to_string(),
                count: many.len(),
            }),
        }
    }
}

fn positions(trips: &[Trip], pred: impl Fn(&Trip) -> bool) -> Vec<usize> {
    trips
        .iter()
        .enumerate()
        .filter(|(_, t)| pred(t))
        .map(|(i, _)| i)
        .collect()
}

fn check_shift(shift: u8) -> Result<()> {
    if (1..=MAX_SHIFT).contains(&shift) {
        Ok(())
    } else {
        Err(StoreError::ShiftOutOfRange(shift))
    }
}
