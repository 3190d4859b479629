//! JSON file backend: `<dir>/bays.json` and `<dir>/trips.json`.
//!
//! Used as the local cache behind the `SQLite` store, or as the primary store
//! when configured so.

use std::path::PathBuf;
use std::{fs, io};

use crate::model::Collection;

use super::{Backend, Result};

pub struct JsonBackend {
    dir: PathBuf,
}

impl JsonBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.key()))
    }
}

impl Backend for JsonBackend {
    fn name(&self) -> &'static str {
        "json"
    }

    /// Writes through a temporary file so a crash never leaves half a body.
    fn write(&self, collection: Collection, body: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(collection);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read(&self, collection: Collection) -> Result<Option<String>> {
        match fs::read_to_string(self.path(collection)) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn writes_one_file_per_collection() {
        let dir = TempDir::new().unwrap();
        let backend = JsonBackend::new(dir.path().join("cache"));

        backend.write(Collection::Bays, "[]").unwrap();

        assert!(dir.path().join("cache/bays.json").is_file());
        assert!(!dir.path().join("cache/bays.json.tmp").exists());
        assert_eq!(backend.read(Collection::Bays).unwrap().as_deref(), Some("[]"));
        assert_eq!(backend.read(Collection::Trips).unwrap(), None);
    }

    #[test]
    fn blocked_directory_fails_write() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, "x").unwrap();
        let backend = JsonBackend::new(&file);

        assert!(backend.write(Collection::Trips, "[]").is_err());
    }
}
