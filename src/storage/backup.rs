//! Snapshot backups under `backups/`.
//!
//! Each backup is a JSON envelope carrying the serialized snapshot and its
//! SHA-256 checksum, optionally zstd-compressed (`.json.zst`). Names embed the
//! UTC creation time, so sorting by name sorts by age.

use std::path::PathBuf;
use std::{fs, io};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{Snapshot, Storage};

const VERSION: u32 = 1;
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("backup not found: {0}")]
    NotFound(String),

    #[error("backup {0} failed checksum validation")]
    ChecksumMismatch(String),

    #[error("unsupported backup version: {0}")]
    Version(u32),
}

pub type Result<T> = core::result::Result<T, BackupError>;

/// A backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub name: String,
    pub size_bytes: u64,
    pub compressed: bool,
    /// File modification time, when the filesystem reports one.
    pub modified: Option<Timestamp>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    version: u32,
    created_at: Timestamp,
    bays: usize,
    trips: usize,
    /// Hex SHA-256 of `payload`.
    checksum: String,
    /// The snapshot, serialized.
    payload: String,
}

impl Storage {
    /// Writes a backup of `snapshot`.
    pub fn create_backup(
        &self,
        snapshot: &Snapshot,
        compress: bool,
        now: Timestamp,
    ) -> Result<BackupInfo> {
        let dir = self.backup_dir();
        fs::create_dir_all(&dir)?;

        let payload = serde_json::to_string(snapshot)?;
        let envelope = Envelope {
            version: VERSION,
            created_at: now,
            bays: snapshot.bays.len(),
            trips: snapshot.trips.len(),
            checksum: checksum(&payload),
            payload,
        };
        let json = serde_json::to_vec(&envelope)?;
        let bytes = if compress {
            zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?
        } else {
            json
        };

        let ext = if compress { "json.zst" } else { "json" };
        let stem = format!(
            "backup-{}{:03}Z",
            now.strftime("%Y%m%dT%H%M%S."),
            now.subsec_millisecond()
        );
        let mut name = format!("{stem}.{ext}");
        let mut n = 1;
        while dir.join(&name).exists() {
            name = format!("{stem}-{n}.{ext}");
            n += 1;
        }

        fs::write(dir.join(&name), &bytes)?;
        info!(%name, bays = envelope.bays, trips = envelope.trips, "backup created");
        Ok(BackupInfo {
            name,
            size_bytes: bytes.len() as u64,
            compressed: compress,
            modified: Some(now),
        })
    }

    /// Lists backups, oldest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let entries = match fs::read_dir(self.backup_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            let compressed = name.ends_with(".json.zst");
            if !compressed && !name.ends_with(".json") {
                continue;
            }
            let meta = entry.metadata()?;
            backups.push(BackupInfo {
                size_bytes: meta.len(),
                modified: meta.modified().ok().and_then(|t| Timestamp::try_from(t).ok()),
                name,
                compressed,
            });
        }
        backups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(backups)
    }

    /// Deletes all but the newest `keep` backups. Returns what was removed.
    pub fn prune_backups(&self, keep: usize) -> Result<Vec<BackupInfo>> {
        let backups = self.list_backups()?;
        let excess = backups.len().saturating_sub(keep);
        let removed: Vec<BackupInfo> = backups.into_iter().take(excess).collect();
        for backup in &removed {
            fs::remove_file(self.backup_dir().join(&backup.name))?;
            debug!(name = %backup.name, "backup pruned");
        }
        Ok(removed)
    }

    /// Reads a backup by file name, with or without extension.
    ///
    /// With `validate`, the checksum must match the payload.
    pub fn read_backup(&self, name: &str, validate: bool) -> Result<Snapshot> {
        let path = self.find_backup(name)?;
        let bytes = fs::read(&path)?;
        let json = if path.extension().is_some_and(|e| e == "zst") {
            zstd::decode_all(bytes.as_slice())?
        } else {
            bytes
        };

        let envelope: Envelope = serde_json::from_slice(&json)?;
        if envelope.version != VERSION {
            return Err(BackupError::Version(envelope.version));
        }
        if validate && checksum(&envelope.payload) != envelope.checksum {
            return Err(BackupError::ChecksumMismatch(name.to_string()));
        }
        Ok(serde_json::from_str(&envelope.payload)?)
    }

    fn find_backup(&self, name: &str) -> Result<PathBuf> {
        let not_found = || BackupError::NotFound(name.to_string());
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(not_found());
        }
        self.list_backups()?
            .into_iter()
            .find(|b| {
                b.name == name
                    || b.name.strip_suffix(".json.zst") == Some(name)
                    || b.name.strip_suffix(".json") == Some(name)
            })
            .map(|b| self.backup_dir().join(b.name))
            .ok_or_else(not_found)
    }

    fn backup_dir(&self) -> PathBuf {
        self.root.join("backups")
    }
}

fn checksum(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::civil::date;
    use tempfile::TempDir;

    use crate::config::StorageSettings;
    use crate::model::{Bay, TripDraft};

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("home"), &StorageSettings::default()).unwrap();
        (dir, storage)
    }

    fn t(secs: i64) -> Timestamp {
        Timestamp::new(secs, 0).unwrap()
    }

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            bays: vec![Bay::free("101", t(0)), Bay::free("102", t(0))],
            trips: vec![
                TripDraft {
                    trip_number: "5001".into(),
                    assigned_bay: Some("101".into()),
                    ..TripDraft::default()
                }
                .into_trip(date(2025, 2, 1).at(8, 0, 0, 0)),
            ],
        }
    }

    #[test]
    fn backup_round_trips_compressed_and_plain() {
        let (_dir, storage) = test_storage();
        let snapshot = sample_snapshot();

        let plain = storage.create_backup(&snapshot, false, t(1)).unwrap();
        let packed = storage.create_backup(&snapshot, true, t(2)).unwrap();

        assert!(plain.name.ends_with(".json"));
        assert!(packed.name.ends_with(".json.zst"));
        assert_eq!(storage.read_backup(&plain.name, true).unwrap(), snapshot);
        assert_eq!(storage.read_backup(&packed.name, true).unwrap(), snapshot);
    }

    #[test]
    fn name_without_extension_is_found() {
        let (_dir, storage) = test_storage();
        let info = storage.create_backup(&sample_snapshot(), true, t(1)).unwrap();

        let stem = info.name.strip_suffix(".json.zst").unwrap();
        assert!(storage.read_backup(stem, true).is_ok());
    }

    #[test]
    fn list_is_oldest_first() {
        let (_dir, storage) = test_storage();
        storage.create_backup(&Snapshot::default(), false, t(200)).unwrap();
        storage.create_backup(&Snapshot::default(), false, t(100)).unwrap();

        let names: Vec<String> = storage
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names[0] < names[1]);
        assert!(names[0].starts_with("backup-19700101T000140"));
    }

    #[test]
    fn same_instant_gets_distinct_names() {
        let (_dir, storage) = test_storage();
        let a = storage.create_backup(&Snapshot::default(), false, t(5)).unwrap();
        let b = storage.create_backup(&Snapshot::default(), false, t(5)).unwrap();
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn prune_keeps_newest() {
        let (_dir, storage) = test_storage();
        for secs in 1..=5 {
            storage.create_backup(&Snapshot::default(), false, t(secs)).unwrap();
        }

        let removed = storage.prune_backups(2).unwrap();

        assert_eq!(removed.len(), 3);
        let left = storage.list_backups().unwrap();
        assert_eq!(left.len(), 2);
        assert!(left[0].name.contains("T000004"));
    }

    #[test]
    fn tampered_backup_fails_validation() {
        let (dir, storage) = test_storage();
        let info = storage.create_backup(&sample_snapshot(), false, t(1)).unwrap();
        let path = dir.path().join("home/backups").join(&info.name);

        let mut envelope: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        envelope["payload"] = serde_json::Value::String(
            serde_json::to_string(&Snapshot::default()).unwrap(),
        );
        fs::write(&path, envelope.to_string()).unwrap();

        let err = storage.read_backup(&info.name, true).unwrap_err();
        assert!(matches!(err, BackupError::ChecksumMismatch(_)));
        // Without validation the payload is taken as-is.
        assert_eq!(storage.read_backup(&info.name, false).unwrap(), Snapshot::default());
    }

    #[test]
    fn unknown_backup_is_not_found() {
        let (_dir, storage) = test_storage();
        assert!(matches!(
            storage.read_backup("nope", true).unwrap_err(),
            BackupError::NotFound(_)
        ));
        assert!(matches!(
            storage.read_backup("../etc/passwd", true).unwrap_err(),
            BackupError::NotFound(_)
        ));
    }
}
