//! Error types for batch rendering.

use thiserror::Error;

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Errors that can occur while rendering a batch.
#[derive(Error, Debug)]
pub enum ReportError {
    /// The document holds no events.
    #[error("cannot transform an empty event document")]
    EmptyDocument,

    /// Minified output was not valid UTF-8.
    #[error("rendered body is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}
