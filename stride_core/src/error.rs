//! Error types for the stride_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for stride_core operations
///
/// Persistence corruption is deliberately absent: a ledger or journal that
/// fails to read degrades to an empty value with a logged warning instead of
/// surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Program asset is missing or malformed
    #[error("Program data unavailable: {0}")]
    DataUnavailable(String),

    /// Requested day resolves to zero segments
    #[error("No segments available for week {week}, day {day}")]
    NoSegments { week: u32, day: u32 },

    /// Generic error
    #[error("{0}")]
    Other(String),
}
