//! Change journal: row-level insert/update/delete events in `changes.jsonl`.
//!
//! Appended after every persisted mutation. A missing file is an empty journal.

use std::{fs, io};

// Traits must be in scope for `.lines()` on `BufReader` and `.write_all()` on `File`.
use io::{BufRead, Write};

use crate::model::ChangeEvent;

use super::{Result, Storage};

impl Storage {
    /// Appends events to the journal, one JSON object per line.
    pub fn append_changes(&self, events: &[ChangeEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for event in events {
            buf.push_str(&serde_json::to_string(event)?);
            buf.push('\n');
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join("changes.jsonl"))?;
        file.write_all(buf.as_bytes())?;
        Ok(())
    }

    /// Loads the journal, oldest first.
    pub fn load_changes(&self) -> Result<Vec<ChangeEvent>> {
        let file = match fs::File::open(self.root.join("changes.jsonl")) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut events = Vec::new();
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            if !line.is_empty() {
                events.push(serde_json::from_str(&line)?);
            }
        }
        Ok(events)
    }
}
