#![forbid(unsafe_code)]

//! Core domain model and workout timing engine for Stride.
//!
//! This crate provides:
//! - Domain types (segments, workout state, events, journal records)
//! - Program store with day-reference resolution
//! - Segment compiler
//! - Progress ledger (completion history and unlock queries)
//! - The workout timing engine (countdown, wall-clock segment timing,
//!   pause/resume, drift watchdog)
//! - Output mapping for notification and haptic adapters
//! - Persistence (ledger blob, workout journal, CSV export)

pub mod types;
pub mod error;
pub mod program;
pub mod segments;
pub mod config;
pub mod logging;
pub mod ledger;
pub mod journal;
pub mod export;
pub mod feedback;
pub mod engine;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use program::{get_default_program, Program, ProgramDay, ProgramWeek};
pub use segments::{compile_segments, total_seconds};
pub use config::Config;
pub use ledger::{record_completion, workout_key, ProgressLedger, DAYS_PER_WEEK};
pub use journal::{read_records, JournalSink, JsonlJournal};
pub use export::journal_to_csv;
pub use feedback::{event_message, haptic_for_event, status_line, HapticPattern};
pub use engine::{EngineConfig, WorkoutEngine};
