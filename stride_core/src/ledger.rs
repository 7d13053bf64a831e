//! Progress ledger: durable record of completed (week, day) workouts.
//!
//! The ledger is a single JSON blob with file locking. Reads are fail-soft: a
//! missing, unreadable, or corrupt record is treated as an empty ledger, never
//! as a fatal error. Writes go through a locked temp file and an atomic
//! rename.

use crate::{Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// The program schedules this many workouts per week.
pub const DAYS_PER_WEEK: u32 = 3;

/// Key under which a completed pair is stored in the persisted set.
pub fn workout_key(week: u32, day: u32) -> String {
    format!("{}-{}", week, day)
}

/// Persisted completion history plus cached last-completed pointers
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressLedger {
    pub last_completed_week: u32,
    pub last_completed_day: u32,
    pub completed_workouts: BTreeSet<String>,
}

impl ProgressLedger {
    pub fn is_completed(&self, week: u32, day: u32) -> bool {
        self.completed_workouts.contains(&workout_key(week, day))
    }

    /// The pair immediately after the last completed one.
    ///
    /// Callers must special-case `last_completed_week == 0` (the untouched
    /// ledger) to mean "(1, 1) is next"; the arithmetic here assumes at least
    /// one completion.
    pub fn next_workout(&self) -> (u32, u32) {
        if self.last_completed_day >= DAYS_PER_WEEK {
            (self.last_completed_week + 1, 1)
        } else {
            (self.last_completed_week, self.last_completed_day + 1)
        }
    }

    fn frontier(&self) -> (u32, u32) {
        if self.last_completed_week == 0 {
            (1, 1)
        } else {
            self.next_workout()
        }
    }

    /// A workout is unlocked when it is the very first, already completed, or
    /// the single pair beyond the completed frontier.
    pub fn is_unlocked(&self, week: u32, day: u32) -> bool {
        (week == 1 && day == 1) || self.is_completed(week, day) || (week, day) == self.frontier()
    }

    /// Idempotent completion mark.
    ///
    /// The pointers advance only when the new pair is strictly later than the
    /// pair already recorded.
    pub fn mark_completed(&mut self, week: u32, day: u32) {
        self.completed_workouts.insert(workout_key(week, day));
        if (week, day) > (self.last_completed_week, self.last_completed_day) {
            self.last_completed_week = week;
            self.last_completed_day = day;
        }
    }

    /// Explicit full reset: clears the set and zeroes the pointers.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Load the ledger from a file with shared locking
    ///
    /// Returns an empty ledger if the file doesn't exist. If the record is
    /// unreadable or corrupt, logs a warning and returns an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No progress record found, starting empty");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    "Unable to open progress record {:?}: {}. Starting empty.",
                    path,
                    e
                );
                return Ok(Self::default());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!(
                "Unable to lock progress record {:?}: {}. Starting empty.",
                path,
                e
            );
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!(
                "Failed to read progress record {:?}: {}. Starting empty.",
                path,
                e
            );
            return Ok(Self::default());
        }

        file.unlock()?;

        match serde_json::from_str::<ProgressLedger>(&contents) {
            Ok(ledger) => {
                tracing::debug!("Loaded progress record from {:?}", path);
                Ok(ledger)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse progress record {:?}: {}. Starting empty.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save the ledger to a file with exclusive locking
    ///
    /// Atomically writes by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "ledger path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved progress record to {:?}", path);
        Ok(())
    }
}

/// Load-mark-save for a single completion.
///
/// A failed write is retried once with a minimal record holding just this
/// completion; if that also fails, the failure is logged and the in-memory
/// ledger is returned unchanged. The workout already finished from the
/// user's perspective, so storage trouble never rolls that back.
pub fn record_completion(path: &Path, week: u32, day: u32) -> ProgressLedger {
    let mut ledger = ProgressLedger::load(path).unwrap_or_default();
    ledger.mark_completed(week, day);

    if let Err(e) = ledger.save(path) {
        tracing::warn!(
            "Failed to persist progress to {:?}: {}. Retrying with minimal record.",
            path,
            e
        );
        let mut minimal = ProgressLedger::default();
        minimal.mark_completed(week, day);
        if let Err(e) = minimal.save(path) {
            tracing::error!("Failed to persist progress after retry: {}", e);
        }
    }

    ledger
}
