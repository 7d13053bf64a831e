//! CSV export of the workout journal.
//!
//! Rows append to an existing export; headers are written only when the
//! target file is empty. The CSV is synced to disk before reporting success.

use crate::{Result, WorkoutRecord};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    week: u32,
    day: u32,
    started_at: String,
    finished_at: String,
    planned_seconds: u64,
    elapsed_seconds: u64,
}

impl From<&WorkoutRecord> for CsvRow {
    fn from(record: &WorkoutRecord) -> Self {
        CsvRow {
            id: record.id.to_string(),
            week: record.week,
            day: record.day,
            started_at: record.started_at.to_rfc3339(),
            finished_at: record.finished_at.to_rfc3339(),
            planned_seconds: record.planned_seconds,
            elapsed_seconds: record.elapsed_seconds,
        }
    }
}

/// Export all journal records to a CSV file
///
/// Returns the number of records written.
pub fn journal_to_csv(journal_path: &Path, csv_path: &Path) -> Result<usize> {
    let records = crate::journal::read_records(journal_path)?;

    if records.is_empty() {
        tracing::info!("No workouts in journal to export");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Headers only when the file is brand new.
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for record in &records {
        writer.serialize(CsvRow::from(record))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} workouts to {:?}", records.len(), csv_path);
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{JournalSink, JsonlJournal};
    use chrono::Utc;
    use uuid::Uuid;

    fn seed_journal(path: &Path, count: u32) {
        let mut journal = JsonlJournal::new(path);
        for day in 1..=count {
            journal
                .append(&WorkoutRecord {
                    id: Uuid::new_v4(),
                    week: 1,
                    day,
                    started_at: Utc::now(),
                    finished_at: Utc::now(),
                    planned_seconds: 300,
                    elapsed_seconds: 305,
                })
                .unwrap();
        }
    }

    #[test]
    fn test_export_writes_headers_and_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("journal.jsonl");
        let csv_path = temp_dir.path().join("workouts.csv");

        seed_journal(&journal_path, 2);
        let count = journal_to_csv(&journal_path, &csv_path).unwrap();
        assert_eq!(count, 2);

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = contents.lines();
        assert!(lines.next().unwrap().starts_with("id,week,day"));
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn test_reexport_appends_without_duplicate_headers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("journal.jsonl");
        let csv_path = temp_dir.path().join("workouts.csv");

        seed_journal(&journal_path, 1);
        journal_to_csv(&journal_path, &csv_path).unwrap();
        journal_to_csv(&journal_path, &csv_path).unwrap();

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        let header_lines = contents
            .lines()
            .filter(|l| l.starts_with("id,week,day"))
            .count();
        assert_eq!(header_lines, 1);
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn test_empty_journal_exports_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("journal.jsonl");
        let csv_path = temp_dir.path().join("workouts.csv");

        let count = journal_to_csv(&journal_path, &csv_path).unwrap();
        assert_eq!(count, 0);
        assert!(!csv_path.exists());
    }
}
