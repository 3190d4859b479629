//! Shift close records in `shift_closes.jsonl`. Append-only.

use std::{fs, io};

use io::{BufRead, Write};

use crate::model::ShiftClose;

use super::{Result, Storage};

impl Storage {
    pub fn append_shift_close(&self, close: &ShiftClose) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join("shift_closes.jsonl"))?;
        let mut line = serde_json::to_string(close)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// All closed shifts, oldest first.
    pub fn load_shift_closes(&self) -> Result<Vec<ShiftClose>> {
        let path = self.root.join("shift_closes.jsonl");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = io::BufReader::new(fs::File::open(path)?);
        let mut closes = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.is_empty() {
                closes.push(serde_json::from_str(&line)?);
            }
        }
        Ok(closes)
    }
}
