//! The event record carried through the batching pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::level::Level;

/// Property name used when rendering the triggering marker.
pub const TRIGGER_PROPERTY: &str = "IsTrigger";

/// A single event record.
///
/// Everything except `triggering` is fixed by the producer. The marker is
/// set by the consumer when the record is classified, never at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub level: Level,
    pub message: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Originating thread identifier.
    #[serde(default)]
    pub thread: String,
    /// Logger (component) name.
    #[serde(default)]
    pub logger: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    /// Rendered error payload, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub triggering: bool,
}

impl Record {
    /// Create a record stamped with the current time and calling thread.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Record {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            thread: current_thread_label(),
            logger: String::new(),
            domain: String::new(),
            username: String::new(),
            properties: BTreeMap::new(),
            exception: None,
            triggering: false,
        }
    }

    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.logger = logger.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = thread.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Mark the record as having met the triggering criteria.
    pub fn mark_triggering(&mut self) {
        self.triggering = true;
    }

    pub fn is_triggering(&self) -> bool {
        self.triggering
    }

    /// Parse one JSON line into a record.
    ///
    /// Records arriving from outside the process never carry a trusted
    /// triggering marker, so it is cleared here.
    pub fn from_json_line(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidRecord("empty line".to_string()));
        }
        let mut record: Record = serde_json::from_str(trimmed)?;
        record.triggering = false;
        if record.thread.is_empty() {
            record.thread = current_thread_label();
        }
        Ok(record)
    }
}

fn current_thread_label() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_not_triggering() {
        let record = Record::new(Level::Error, "disk full");
        assert!(!record.is_triggering());
        assert_eq!(record.message, "disk full");
        assert!(!record.thread.is_empty());
    }

    #[test]
    fn test_mark_triggering() {
        let mut record = Record::new(Level::Warn, "slow");
        record.mark_triggering();
        assert!(record.is_triggering());
    }

    #[test]
    fn test_builder_fields() {
        let record = Record::new(Level::Info, "hello")
            .with_logger("app::db")
            .with_thread("worker-1")
            .with_property("request", "42")
            .with_exception("boom");
        assert_eq!(record.logger, "app::db");
        assert_eq!(record.thread, "worker-1");
        assert_eq!(record.properties.get("request").map(String::as_str), Some("42"));
        assert_eq!(record.exception.as_deref(), Some("boom"));
    }

    #[test]
    fn test_from_json_line_minimal() {
        let record = Record::from_json_line(r#"{"level":"warn","message":"hot"}"#).unwrap();
        assert_eq!(record.level, Level::Warn);
        assert_eq!(record.message, "hot");
        assert!(!record.thread.is_empty());
    }

    #[test]
    fn test_from_json_line_clears_marker() {
        let record =
            Record::from_json_line(r#"{"level":"INFO","message":"x","triggering":true}"#).unwrap();
        assert!(!record.is_triggering());
    }

    #[test]
    fn test_from_json_line_rejects_garbage() {
        assert!(matches!(
            Record::from_json_line("   "),
            Err(Error::InvalidRecord(_))
        ));
        assert!(matches!(Record::from_json_line("{"), Err(Error::Json(_))));
        assert!(Record::from_json_line(r#"{"level":"loud","message":"x"}"#).is_err());
    }
}
