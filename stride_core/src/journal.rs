//! Append-only workout journal.
//!
//! Finished workouts are appended to a JSONL (JSON Lines) file with file
//! locking so concurrent writers cannot interleave lines. The journal is
//! host-side history; the progress ledger remains the engine's only
//! completion record.

use crate::{Result, WorkoutRecord};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Sink for persisting finished workouts
pub trait JournalSink {
    fn append(&mut self, record: &WorkoutRecord) -> Result<()>;
}

/// JSONL-based journal with file locking
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl JournalSink for JsonlJournal {
    fn append(&mut self, record: &WorkoutRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended workout {} to journal", record.id);
        Ok(())
    }
}

/// Read all records from a journal file
///
/// Corrupt lines are skipped with a warning so a partial write never hides
/// the rest of the history.
pub fn read_records(path: &Path) -> Result<Vec<WorkoutRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<WorkoutRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse journal line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} workouts from journal", records.len());
    Ok(records)
}
