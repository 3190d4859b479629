//! Local persistence for the bay registry and the trip log.
//!
//! Everything lives under one home directory:
//!
//! ```text
//! <home>/
//!   prebox.sqlite        # Primary store: one row per collection
//!   cache/bays.json      # Fallback store, refreshed on every save
//!   cache/trips.json
//!   trips.pending        # Present while the primary store is behind
//!   changes.jsonl        # Append-only change journal
//!   shift_closes.jsonl   # Append-only shift close records
//!   backups/             # Checksummed snapshots
//! ```
//!
//! Saves try the primary store, then the fallback. Loads never fail: when
//! neither store can be read the caller gets a default data set and a list of
//! warnings.

mod backup;
mod journal;
mod json;
mod shift;
mod sqlite;

use std::{fs, io};
use std::path::PathBuf;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{BackendKind, StorageSettings};
use crate::model::{Bay, Collection, Trip, normalize_bay, normalize_trip};

pub use backup::{BackupError, BackupInfo};
pub use json::JsonBackend;
pub use sqlite::SqliteBackend;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt data: {0}")]
    Corrupt(String),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// A place the two collections can be written to and read back from.
///
/// Bodies are JSON arrays stored under the collection's stable key.
pub trait Backend {
    /// Short name used in logs and notices.
    fn name(&self) -> &'static str;

    /// Replaces the stored body of `collection`.
    fn write(&self, collection: Collection, body: &str) -> Result<()>;

    /// Reads the stored body of `collection`. `None` if it was never written.
    fn read(&self, collection: Collection) -> Result<Option<String>>;
}

/// Both collections, as kept in memory and in backups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub bays: Vec<Bay>,
    pub trips: Vec<Trip>,
}

/// How a save went.
#[derive(Debug)]
pub enum SaveOutcome {
    /// Written to the primary store.
    Primary,
    /// The primary store failed; the fallback took the write.
    Fallback { primary_error: StorageError },
    /// Nothing was written.
    Failed {
        primary_error: StorageError,
        fallback_error: Option<StorageError>,
    },
}

impl SaveOutcome {
    /// A user-facing message, if the save didn't go cleanly to the primary store.
    pub fn notice(&self, what: &str) -> Option<String> {
        match self {
            Self::Primary => None,
            Self::Fallback { primary_error } => Some(format!(
                "{what} saved to the local cache only (primary store failed: {primary_error})"
            )),
            Self::Failed {
                primary_error,
                fallback_error: Some(fallback_error),
            } => Some(format!(
                "{what} not saved: {primary_error}; fallback also failed: {fallback_error}. \
                 Changes are kept in memory only"
            )),
            Self::Failed {
                primary_error,
                fallback_error: None,
            } => Some(format!(
                "{what} not saved: {primary_error}. Changes are kept in memory only"
            )),
        }
    }
}

/// Where loaded data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Fallback,
    /// Neither store could be read.
    Default,
}

#[derive(Debug)]
pub struct Loaded {
    pub snapshot: Snapshot,
    pub source: LoadSource,
    pub warnings: Vec<String>,
    /// Collections whose stored form is stale: normalized on load, or read
    /// from the fallback. Writing them back brings the primary up to date.
    pub resave: Vec<Collection>,
}

/// The persistence adapter: a primary backend plus an optional fallback.
pub struct Storage {
    root: PathBuf,
    primary: Box<dyn Backend>,
    fallback: Option<Box<dyn Backend>>,
}

impl Storage {
    /// Opens storage rooted at `root` with the backends named in `settings`.
    ///
    /// The directory is created if it doesn't exist.
    pub fn open(root: impl Into<PathBuf>, settings: &StorageSettings) -> Result<Self> {
        let root = root.into();
        let sqlite =
            || Box::new(SqliteBackend::new(root.join("prebox.sqlite"))) as Box<dyn Backend>;
        let json = || Box::new(JsonBackend::new(root.join("cache"))) as Box<dyn Backend>;
        let (primary, fallback) = match settings.primary {
            BackendKind::Sqlite => (sqlite(), json()),
            BackendKind::Json => (json(), sqlite()),
        };
        Self::with_backends(root, primary, settings.fallback.then_some(fallback))
    }

    /// Storage with explicit backends.
    pub fn with_backends(
        root: impl Into<PathBuf>,
        primary: Box<dyn Backend>,
        fallback: Option<Box<dyn Backend>>,
    ) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            primary,
            fallback,
        })
    }

    // ── Collections ──

    pub fn save_bays(&self, bays: &[Bay]) -> SaveOutcome {
        match serde_json::to_string(bays) {
            Ok(body) => self.save(Collection::Bays, &body),
            Err(e) => SaveOutcome::Failed {
                primary_error: e.into(),
                fallback_error: None,
            },
        }
    }

    pub fn save_trips(&self, trips: &[Trip]) -> SaveOutcome {
        match serde_json::to_string(trips) {
            Ok(body) => self.save(Collection::Trips, &body),
            Err(e) => SaveOutcome::Failed {
                primary_error: e.into(),
                fallback_error: None,
            },
        }
    }

    /// Tries the primary store, then the fallback.
    ///
    /// A successful primary write also refreshes the fallback, best effort.
    /// A write that only reached the fallback marks the collection pending, so
    /// the next load reads the fallback first.
    fn save(&self, collection: Collection, body: &str) -> SaveOutcome {
        let primary_error = match self.primary.write(collection, body) {
            Ok(()) => {
                if let Some(fallback) = &self.fallback
                    && let Err(e) = fallback.write(collection, body)
                {
                    debug!(
                        backend = fallback.name(),
                        collection = collection.key(),
                        error = %e,
                        "cache refresh failed"
                    );
                }
                self.clear_pending(collection);
                return SaveOutcome::Primary;
            }
            Err(e) => e,
        };

        warn!(
            backend = self.primary.name(),
            collection = collection.key(),
            error = %primary_error,
            "primary save failed"
        );
        let Some(fallback) = &self.fallback else {
            return SaveOutcome::Failed {
                primary_error,
                fallback_error: None,
            };
        };
        match fallback.write(collection, body) {
            Ok(()) => {
                self.mark_pending(collection);
                SaveOutcome::Fallback { primary_error }
            }
            Err(fallback_error) => {
                warn!(
                    backend = fallback.name(),
                    collection = collection.key(),
                    error = %fallback_error,
                    "fallback save failed"
                );
                SaveOutcome::Failed {
                    primary_error,
                    fallback_error: Some(fallback_error),
                }
            }
        }
    }

    /// Loads both collections. Never fails.
    ///
    /// Each collection is read from the primary store, then the fallback; a
    /// pending collection is read from the fallback first. A store that was
    /// never written counts as a miss. If no store holds the bay registry, it
    /// is seeded with `seed_bays` free bays numbered from 1.
    pub fn load(&self, seed_bays: usize, now: Timestamp) -> Loaded {
        let mut warnings = Vec::new();
        let mut resave = Vec::new();

        let raw_bays = self.load_collection(Collection::Bays, &mut warnings);
        let raw_trips = self.load_collection(Collection::Trips, &mut warnings);

        let source = match (raw_bays.source, raw_trips.source) {
            (LoadSource::Fallback, _) | (_, LoadSource::Fallback) => LoadSource::Fallback,
            (LoadSource::Default, LoadSource::Default) => LoadSource::Default,
            _ => LoadSource::Primary,
        };

        let bays = match raw_bays.values {
            Some(values) => {
                let bays = normalize_all(
                    values.clone(),
                    "bay",
                    |v| normalize_bay(v, now),
                    &mut warnings,
                );
                if raw_bays.source == LoadSource::Fallback || differs(&values, &bays) {
                    resave.push(Collection::Bays);
                }
                bays
            }
            None => seeded(seed_bays, now),
        };
        let trips = match raw_trips.values {
            Some(values) => {
                let trips = normalize_all(values.clone(), "trip", normalize_trip, &mut warnings);
                if raw_trips.source == LoadSource::Fallback || differs(&values, &trips) {
                    resave.push(Collection::Trips);
                }
                trips
            }
            None => Vec::new(),
        };
        debug!(?source, bays = bays.len(), trips = trips.len(), ?resave, "loaded");

        Loaded {
            snapshot: Snapshot { bays, trips },
            source,
            warnings,
            resave,
        }
    }

    fn load_collection(
        &self,
        collection: Collection,
        warnings: &mut Vec<String>,
    ) -> RawCollection {
        let mut order = vec![(self.primary.as_ref(), LoadSource::Primary)];
        if let Some(fallback) = self.fallback.as_deref() {
            if self.is_pending(collection) {
                order.insert(0, (fallback, LoadSource::Fallback));
            } else {
                order.push((fallback, LoadSource::Fallback));
            }
        }

        let mut readable = false;
        for (backend, source) in order {
            match read_values(backend, collection) {
                Ok(Some(values)) => {
                    return RawCollection {
                        values: Some(values),
                        source,
                    };
                }
                Ok(None) => readable = true,
                Err(e) => {
                    warn!(
                        backend = backend.name(),
                        collection = collection.key(),
                        error = %e,
                        "load failed"
                    );
                    warnings.push(format!(
                        "could not read {} from the {} store: {e}",
                        collection.key(),
                        backend.name()
                    ));
                }
            }
        }
        RawCollection {
            values: None,
            source: if readable {
                LoadSource::Primary
            } else {
                LoadSource::Default
            },
        }
    }

    // ── Pending markers ──

    fn pending_path(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.pending", collection.key()))
    }

    fn is_pending(&self, collection: Collection) -> bool {
        self.pending_path(collection).exists()
    }

    fn mark_pending(&self, collection: Collection) {
        if let Err(e) = fs::write(self.pending_path(collection), b"") {
            warn!(collection = collection.key(), error = %e, "could not mark collection pending");
        }
    }

    fn clear_pending(&self, collection: Collection) {
        match fs::remove_file(self.pending_path(collection)) {
            Ok(()) => debug!(collection = collection.key(), "primary store caught up"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(collection = collection.key(), error = %e, "could not clear pending marker");
            }
        }
    }
}

/// One collection's body before normalization. `None` means never written.
struct RawCollection {
    values: Option<Vec<serde_json::Value>>,
    source: LoadSource,
}

fn read_values(
    backend: &dyn Backend,
    collection: Collection,
) -> Result<Option<Vec<serde_json::Value>>> {
    let Some(body) = backend.read(collection)? else {
        return Ok(None);
    };
    match serde_json::from_str(&body)? {
        serde_json::Value::Array(items) => Ok(Some(items)),
        serde_json::Value::Null => Ok(Some(Vec::new())),
        _ => Err(StorageError::Corrupt(format!("{} is not a list", collection.key()))),
    }
}

/// Whether the stored body is not what the normalized records serialize to.
fn differs<T: Serialize>(raw: &[serde_json::Value], records: &[T]) -> bool {
    match serde_json::to_value(records) {
        Ok(serde_json::Value::Array(items)) => items != raw,
        _ => true,
    }
}

/// Normalizes every record, skipping (and reporting) the ones that can't be.
fn normalize_all<T, E: std::fmt::Display>(
    values: Vec<serde_json::Value>,
    what: &str,
    normalize: impl Fn(serde_json::Value) -> core::result::Result<T, E>,
    warnings: &mut Vec<String>,
) -> Vec<T> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| match normalize(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(what, index = i, error = %e, "skipping unreadable record");
                warnings.push(format!("skipped {what} #{}: {e}", i + 1));
                None
            }
        })
        .collect()
}

/// Free bays `1..=count`.
pub fn seeded(count: usize, now: Timestamp) -> Vec<Bay> {
    (1..=count).map(|n| Bay::free(n.to_string(), now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use jiff::civil::date;
    use tempfile::TempDir;

    use crate::model::{BayStatus, TripDraft};

    /// In-memory backend shared with the test through an `Rc`.
    #[derive(Clone, Default)]
    struct MemoryBackend {
        data: Rc<RefCell<HashMap<&'static str, String>>>,
        broken: Rc<RefCell<bool>>,
    }

    impl MemoryBackend {
        fn broken() -> Self {
            let backend = Self::default();
            *backend.broken.borrow_mut() = true;
            backend
        }

        fn get(&self, collection: Collection) -> Option<String> {
            self.data.borrow().get(collection.key()).cloned()
        }

        fn set(&self, collection: Collection, body: &str) {
            self.data.borrow_mut().insert(collection.key(), body.into());
        }
    }

    impl Backend for MemoryBackend {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn write(&self, collection: Collection, body: &str) -> Result<()> {
            if *self.broken.borrow() {
                return Err(StorageError::Corrupt("unavailable".into()));
            }
            self.set(collection, body);
            Ok(())
        }

        fn read(&self, collection: Collection) -> Result<Option<String>> {
            if *self.broken.borrow() {
                return Err(StorageError::Corrupt("unavailable".into()));
            }
            Ok(self.get(collection))
        }
    }

    fn now() -> Timestamp {
        Timestamp::new(1_738_400_000, 0).unwrap()
    }

    fn storage_with(
        primary: &MemoryBackend,
        fallback: Option<&MemoryBackend>,
    ) -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::with_backends(
            dir.path().join("home"),
            Box::new(primary.clone()),
            fallback.map(|f| Box::new(f.clone()) as Box<dyn Backend>),
        )
        .unwrap();
        (dir, storage)
    }

    fn sample_trip() -> Trip {
        TripDraft {
            trip_number: "5001".into(),
            assigned_bay: Some("101".into()),
            ..TripDraft::default()
        }
        .into_trip(date(2025, 2, 1).at(8, 0, 0, 0))
    }

    #[test]
    fn save_goes_to_primary_and_refreshes_cache() {
        let primary = MemoryBackend::default();
        let cache = MemoryBackend::default();
        let (_dir, storage) = storage_with(&primary, Some(&cache));

        let outcome = storage.save_bays(&[Bay::free("1", now())]);

        assert!(matches!(outcome, SaveOutcome::Primary));
        assert!(outcome.notice("bays").is_none());
        assert!(primary.get(Collection::Bays).is_some());
        assert_eq!(primary.get(Collection::Bays), cache.get(Collection::Bays));
    }

    #[test]
    fn save_falls_back_when_primary_fails() {
        let primary = MemoryBackend::broken();
        let cache = MemoryBackend::default();
        let (_dir, storage) = storage_with(&primary, Some(&cache));

        let outcome = storage.save_trips(&[sample_trip()]);

        assert!(matches!(outcome, SaveOutcome::Fallback { .. }));
        assert!(outcome.notice("trips").unwrap().contains("local cache"));
        assert!(cache.get(Collection::Trips).is_some());
    }

    #[test]
    fn save_reports_failure_when_everything_fails() {
        let primary = MemoryBackend::broken();
        let cache = MemoryBackend::broken();
        let (_dir, storage) = storage_with(&primary, Some(&cache));

        let outcome = storage.save_bays(&[]);

        assert!(matches!(
            outcome,
            SaveOutcome::Failed {
                fallback_error: Some(_),
                ..
            }
        ));
        assert!(outcome.notice("bays").unwrap().contains("in memory only"));
    }

    #[test]
    fn load_prefers_primary() {
        let primary = MemoryBackend::default();
        let cache = MemoryBackend::default();
        primary.set(
            Collection::Bays,
            r#"[{"id":"A","status":"blocked","lastUpdate":"2025-02-01T00:00:00Z"}]"#,
        );
        primary.set(Collection::Trips, "[]");
        cache.set(Collection::Bays, "[]");
        let (_dir, storage) = storage_with(&primary, Some(&cache));

        let loaded = storage.load(70, now());

        assert_eq!(loaded.source, LoadSource::Primary);
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.snapshot.bays.len(), 1);
        assert_eq!(loaded.snapshot.bays[0].status, BayStatus::Blocked);
    }

    #[test]
    fn load_uses_fallback_when_primary_unreadable() {
        let primary = MemoryBackend::broken();
        let cache = MemoryBackend::default();
        cache.set(Collection::Bays, "[]");
        cache.set(Collection::Trips, &serde_json::to_string(&[sample_trip()]).unwrap());
        let (_dir, storage) = storage_with(&primary, Some(&cache));

        let loaded = storage.load(70, now());

        assert_eq!(loaded.source, LoadSource::Fallback);
        assert_eq!(loaded.snapshot.trips.len(), 1);
        assert!(loaded.snapshot.bays.is_empty());
        assert!(!loaded.warnings.is_empty());
    }

    #[test]
    fn load_with_nothing_readable_returns_seeded_default() {
        let primary = MemoryBackend::broken();
        let (_dir, storage) = storage_with(&primary, None);

        let loaded = storage.load(3, now());

        assert_eq!(loaded.source, LoadSource::Default);
        let ids: Vec<&str> = loaded.snapshot.bays.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(loaded.snapshot.trips.is_empty());
    }

    #[test]
    fn fresh_store_is_seeded() {
        let primary = MemoryBackend::default();
        let (_dir, storage) = storage_with(&primary, None);

        let loaded = storage.load(70, now());

        assert_eq!(loaded.source, LoadSource::Primary);
        assert_eq!(loaded.snapshot.bays.len(), 70);
        assert!(loaded.snapshot.bays.iter().all(|b| b.status == BayStatus::Free));
    }

    #[test]
    fn corrupt_primary_body_falls_through() {
        let primary = MemoryBackend::default();
        primary.set(Collection::Bays, "{\"not\":\"a list\"}");
        let cache = MemoryBackend::default();
        cache.set(Collection::Bays, "[]");
        let (_dir, storage) = storage_with(&primary, Some(&cache));

        let loaded = storage.load(70, now());
        assert_eq!(loaded.source, LoadSource::Fallback);
    }

    #[test]
    fn fallback_save_wins_after_primary_recovers() {
        let primary = MemoryBackend::default();
        let cache = MemoryBackend::default();
        let (_dir, storage) = storage_with(&primary, Some(&cache));
        let trip = sample_trip();
        assert!(matches!(storage.save_trips(&[]), SaveOutcome::Primary));

        *primary.broken.borrow_mut() = true;
        let outcome = storage.save_trips(&[trip.clone()]);
        assert!(matches!(outcome, SaveOutcome::Fallback { .. }));
        *primary.broken.borrow_mut() = false;

        let loaded = storage.load(0, now());
        assert_eq!(loaded.snapshot.trips, vec![trip.clone()]);
        assert_eq!(loaded.source, LoadSource::Fallback);
        assert!(loaded.resave.contains(&Collection::Trips));

        // Once the primary takes a write again, it is authoritative.
        assert!(matches!(storage.save_trips(&[]), SaveOutcome::Primary));
        cache.set(Collection::Trips, &serde_json::to_string(&[trip]).unwrap());
        let loaded = storage.load(0, now());
        assert!(loaded.snapshot.trips.is_empty());
        assert_eq!(loaded.source, LoadSource::Primary);
    }

    #[test]
    fn never_written_primary_falls_through_to_cache() {
        let primary = MemoryBackend::default();
        let cache = MemoryBackend::default();
        let trip = sample_trip();
        cache.set(Collection::Trips, &serde_json::to_string(&[trip.clone()]).unwrap());
        let (_dir, storage) = storage_with(&primary, Some(&cache));

        let loaded = storage.load(2, now());

        assert_eq!(loaded.source, LoadSource::Fallback);
        assert_eq!(loaded.snapshot.trips, vec![trip]);
        assert_eq!(loaded.snapshot.bays.len(), 2);
        assert_eq!(loaded.resave, vec![Collection::Trips]);
    }

    #[test]
    fn normalized_collections_are_flagged_for_resave() {
        let primary = MemoryBackend::default();
        primary.set(Collection::Trips, r#"[{"trip":"508938","preBox":"331","date":"01/02/2025"}]"#);
        let (_dir, storage) = storage_with(&primary, None);

        let loaded = storage.load(0, now());
        assert_eq!(loaded.resave, vec![Collection::Trips]);

        assert!(matches!(storage.save_trips(&loaded.snapshot.trips), SaveOutcome::Primary));
        let again = storage.load(0, now());
        assert!(again.resave.is_empty());
        assert_eq!(again.snapshot.trips, loaded.snapshot.trips);
    }

    #[test]
    fn unreadable_records_are_skipped_with_a_warning() {
        let primary = MemoryBackend::default();
        primary.set(Collection::Bays, "[]");
        primary.set(
            Collection::Trips,
            r#"[{"trip":"508938","preBox":"331","date":"2025-02-01","quantity":"11"},{"trip":"x"}]"#,
        );
        let (_dir, storage) = storage_with(&primary, None);

        let loaded = storage.load(0, now());

        assert_eq!(loaded.snapshot.trips.len(), 1);
        assert_eq!(loaded.snapshot.trips[0].assigned_bay.as_deref(), Some("331"));
        assert_eq!(loaded.snapshot.trips[0].quantity, 11);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("trip #2"));
    }

    #[test]
    fn open_with_defaults_round_trips_through_sqlite() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("home"), &StorageSettings::default()).unwrap();

        let trip = sample_trip();
        assert!(matches!(storage.save_trips(&[trip.clone()]), SaveOutcome::Primary));
        assert!(matches!(storage.save_bays(&[Bay::free("101", now())]), SaveOutcome::Primary));

        let loaded = storage.load(70, now());
        assert_eq!(loaded.source, LoadSource::Primary);
        assert_eq!(loaded.snapshot.trips, vec![trip]);
        assert_eq!(loaded.snapshot.bays.len(), 1);
        assert!(dir.path().join("home/cache/trips.json").exists());
    }
}
