//! Program store: the bundled multi-week interval running program.
//!
//! The program asset is a read-only catalog of weeks, days, and interval
//! durations. Days may reference day 1 of their own week instead of carrying
//! an explicit duration list; every reference is resolved once at load time
//! and memoized by (week, day) key.

use crate::ledger::DAYS_PER_WEEK;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const BUNDLED_PROGRAM: &str = include_str!("../assets/program.json");

/// The only reference form the asset schema currently supports.
const DAY_ONE_REFERENCE: &str = "day1";

/// Process-wide cache of the bundled program. `None` means the bundled asset
/// failed to parse; `get_default_program` reports that as `DataUnavailable`.
static DEFAULT_PROGRAM: Lazy<Option<Program>> = Lazy::new(|| match Program::load() {
    Ok(program) => Some(program),
    Err(e) => {
        tracing::error!("Bundled program asset is unusable: {}", e);
        None
    }
});

/// Get a reference to the cached bundled program
///
/// Loading and resolution run once per process; every later call returns the
/// same structurally-equal data.
pub fn get_default_program() -> Result<&'static Program> {
    DEFAULT_PROGRAM
        .as_ref()
        .ok_or_else(|| Error::DataUnavailable("bundled program asset is malformed".into()))
}

/// One day of the program as written in the asset
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ProgramDay {
    #[serde(default)]
    pub segments: Option<Vec<u32>>,
    #[serde(default, rename = "segmentsReference")]
    pub segments_reference: Option<String>,
}

/// One week of the program with its ordinal
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ProgramWeek {
    pub week: u32,
    pub days: Vec<ProgramDay>,
}

#[derive(Debug, Deserialize)]
struct ProgramFile {
    weeks: Vec<ProgramWeek>,
}

/// Immutable catalog of weeks, days, and resolved interval durations
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    weeks: Vec<ProgramWeek>,
    resolved: HashMap<(u32, u32), Vec<u32>>,
}

impl Program {
    /// Load and resolve the bundled program asset.
    pub fn load() -> Result<Self> {
        Self::from_json(BUNDLED_PROGRAM)
    }

    /// Load and resolve a program asset from a file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::DataUnavailable(format!("cannot read program asset {:?}: {}", path, e))
        })?;
        Self::from_json(&contents)
    }

    /// Parse and resolve a program from its JSON representation.
    pub fn from_json(contents: &str) -> Result<Self> {
        let file: ProgramFile = serde_json::from_str(contents)
            .map_err(|e| Error::DataUnavailable(format!("malformed program asset: {}", e)))?;
        Ok(Self::resolve(file.weeks))
    }

    /// Resolve every day to a concrete duration list, memoized by (week, day).
    ///
    /// A day whose segments and reference are both absent, or whose reference
    /// cannot be satisfied, resolves to an empty list; starting it later
    /// fails with `NoSegments` rather than crashing.
    fn resolve(weeks: Vec<ProgramWeek>) -> Self {
        let mut resolved = HashMap::new();
        for week in &weeks {
            // Day 1's explicit durations seed the reference cache for the week.
            let day_one = week.days.first().and_then(|d| d.segments.clone());
            for (index, day) in week.days.iter().enumerate() {
                let day_number = index as u32 + 1;
                let durations = match (&day.segments, &day.segments_reference) {
                    (Some(segments), _) => segments.clone(),
                    (None, Some(reference)) if reference == DAY_ONE_REFERENCE => {
                        day_one.clone().unwrap_or_default()
                    }
                    _ => Vec::new(),
                };
                resolved.insert((week.week, day_number), durations);
            }
        }
        Self { weeks, resolved }
    }

    pub fn weeks(&self) -> &[ProgramWeek] {
        &self.weeks
    }

    /// Resolved durations for a (week, day) pair; 1-based on both axes.
    ///
    /// Returns `None` for days outside the program. A day inside the program
    /// that failed resolution returns an empty slice.
    pub fn resolved_day(&self, week: u32, day: u32) -> Option<&[u32]> {
        self.resolved.get(&(week, day)).map(|v| v.as_slice())
    }

    /// Validate the program for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.weeks.is_empty() {
            errors.push("Program has no weeks".to_string());
        }

        for (index, week) in self.weeks.iter().enumerate() {
            let expected_ordinal = index as u32 + 1;
            if week.week != expected_ordinal {
                errors.push(format!(
                    "Week at position {} has ordinal {} (expected {})",
                    index, week.week, expected_ordinal
                ));
            }

            if week.days.len() != DAYS_PER_WEEK as usize {
                errors.push(format!(
                    "Week {} has {} days (expected {})",
                    week.week,
                    week.days.len(),
                    DAYS_PER_WEEK
                ));
            }

            for (day_index, day) in week.days.iter().enumerate() {
                let day_number = day_index as u32 + 1;

                if day.segments.is_none() && day.segments_reference.is_none() {
                    errors.push(format!(
                        "Week {} day {} has neither segments nor a reference",
                        week.week, day_number
                    ));
                }

                if let Some(reference) = &day.segments_reference {
                    if reference != DAY_ONE_REFERENCE {
                        errors.push(format!(
                            "Week {} day {} has unknown reference '{}'",
                            week.week, day_number, reference
                        ));
                    } else if day.segments.is_none()
                        && week.days.first().and_then(|d| d.segments.as_ref()).is_none()
                    {
                        errors.push(format!(
                            "Week {} day {} references day 1, which has no explicit segments",
                            week.week, day_number
                        ));
                    }
                }

                if let Some(segments) = &day.segments {
                    if segments.iter().any(|&d| d == 0) {
                        errors.push(format!(
                            "Week {} day {} contains a zero-length interval",
                            week.week, day_number
                        ));
                    }
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_program_loads() {
        let program = Program::load().unwrap();
        assert_eq!(program.weeks().len(), 9);
    }

    #[test]
    fn test_bundled_program_validates() {
        let program = Program::load().unwrap();
        let errors = program.validate();
        assert!(
            errors.is_empty(),
            "Bundled program has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_reload_is_structurally_equal() {
        let a = Program::load().unwrap();
        let b = Program::load().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_program_is_cached() {
        let a = get_default_program().unwrap();
        let b = get_default_program().unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_day_one_reference_resolution() {
        let program = Program::load().unwrap();
        let day_one = program.resolved_day(1, 1).unwrap().to_vec();
        assert_eq!(program.resolved_day(1, 2), Some(day_one.as_slice()));
        assert_eq!(program.resolved_day(1, 3), Some(day_one.as_slice()));
    }

    #[test]
    fn test_explicit_days_do_not_resolve_to_day_one() {
        let program = Program::load().unwrap();
        let day_one = program.resolved_day(5, 1).unwrap();
        let day_three = program.resolved_day(5, 3).unwrap();
        assert_ne!(day_one, day_three);
        assert_eq!(day_three, &[300, 1200, 300]);
    }

    #[test]
    fn test_day_outside_program_is_none() {
        let program = Program::load().unwrap();
        assert_eq!(program.resolved_day(99, 1), None);
        assert_eq!(program.resolved_day(1, 4), None);
    }

    #[test]
    fn test_unresolvable_reference_yields_empty_day() {
        let json = r#"{"weeks":[{"week":1,"days":[
            {"segmentsReference":"day1"},
            {"segments":[60,90,60]},
            {"segmentsReference":"day1"}
        ]}]}"#;
        let program = Program::from_json(json).unwrap();
        // Day 1 carries a reference itself, so nothing seeds the cache.
        assert_eq!(program.resolved_day(1, 1), Some(&[][..]));
        assert_eq!(program.resolved_day(1, 3), Some(&[][..]));
        assert!(!program.validate().is_empty());
    }

    #[test]
    fn test_day_with_neither_field_yields_empty_day() {
        let json = r#"{"weeks":[{"week":1,"days":[
            {"segments":[60,90,60]},
            {},
            {"segmentsReference":"day1"}
        ]}]}"#;
        let program = Program::from_json(json).unwrap();
        assert_eq!(program.resolved_day(1, 2), Some(&[][..]));
        assert!(program
            .validate()
            .iter()
            .any(|e| e.contains("neither segments nor a reference")));
    }

    #[test]
    fn test_malformed_asset_is_data_unavailable() {
        let result = Program::from_json("{ not json }");
        assert!(matches!(result, Err(Error::DataUnavailable(_))));
    }

    #[test]
    fn test_missing_file_is_data_unavailable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = Program::load_from(&temp_dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::DataUnavailable(_))));
    }

    #[test]
    fn test_unknown_reference_flagged_by_validate() {
        let json = r#"{"weeks":[{"week":1,"days":[
            {"segments":[60,90,60]},
            {"segmentsReference":"day2"},
            {"segmentsReference":"day1"}
        ]}]}"#;
        let program = Program::from_json(json).unwrap();
        assert!(program
            .validate()
            .iter()
            .any(|e| e.contains("unknown reference")));
    }
}
