//! Error types for the medtrack_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medtrack_core operations
///
/// The scheduling engine itself never fails; these cover storage,
/// configuration and user input at the edges.
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

    /// Snapshot or journal storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed user input (clock times, dates, ids)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
