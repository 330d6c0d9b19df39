//! Error types shared across mailbatch crates.

use thiserror::Error;

/// Result type alias for mailbatch common operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the shared record model.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown level name: {0}")]
    UnknownLevel(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable error code for structured reporting.
    pub fn code(&self) -> u32 {
        match self {
            Error::UnknownLevel(_) => 10,
            Error::InvalidRecord(_) => 11,
            Error::Json(_) => 61,
        }
    }
}
