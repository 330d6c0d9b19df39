//! Transport error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while addressing or delivering a message.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write maildrop file {path}: {source}")]
    Maildrop {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SMTP server rejected {command}: {code} {reply}")]
    Protocol {
        command: String,
        code: u16,
        reply: String,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("malformed SMTP reply: {0}")]
    MalformedReply(String),

    #[error("unsupported addressing scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid addressing {addressing}: {reason}")]
    InvalidAddressing { addressing: String, reason: String },

    #[error("invalid mail address: {0}")]
    InvalidAddress(String),

    #[error("message has no recipients")]
    NoRecipients,
}

impl TransportError {
    pub(crate) fn addressing(addressing: &str, reason: impl Into<String>) -> Self {
        TransportError::InvalidAddressing {
            addressing: addressing.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure is a configuration problem rather than a delivery one.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TransportError::UnsupportedScheme(_)
                | TransportError::InvalidAddressing { .. }
                | TransportError::InvalidAddress(_)
                | TransportError::NoRecipients
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
