//! Severity levels.
//!
//! Levels carry the numeric values of the classic logging hierarchy so that
//! counts can be bucketed by value range. Several aliases share a value
//! (`Debug`/`Fine`, `Trace`/`Finer`, `Verbose`/`Finest`); ordering between
//! aliases falls back to their position in [`Level::ALL`] so that `Ord` stays
//! consistent with `Eq`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Severity level of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Off,
    Emergency,
    Fatal,
    Alert,
    Critical,
    Severe,
    Error,
    Warn,
    Notice,
    Info,
    Debug,
    Fine,
    Trace,
    Finer,
    Verbose,
    Finest,
    All,
}

/// Coarse grouping of levels used by `class.*` statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelClass {
    /// Above `Critical`.
    Unrecoverable,
    /// Above `Notice`, up to and including `Critical`.
    Recoverable,
    /// Above `Debug`, up to and including `Notice`.
    Information,
    /// `Debug` and below.
    Debug,
}

impl LevelClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelClass::Unrecoverable => "unrecoverable",
            LevelClass::Recoverable => "recoverable",
            LevelClass::Information => "information",
            LevelClass::Debug => "debug",
        }
    }
}

impl Level {
    /// Every predefined level, highest first.
    pub const ALL: [Level; 17] = [
        Level::Off,
        // Unrecoverable errors
        Level::Emergency,
        Level::Fatal,
        Level::Alert,
        // Recoverable errors
        Level::Critical,
        Level::Severe,
        Level::Error,
        Level::Warn,
        // Information
        Level::Notice,
        Level::Info,
        // Debug
        Level::Debug,
        Level::Fine,
        Level::Trace,
        Level::Finer,
        Level::Verbose,
        Level::Finest,
        Level::All,
    ];

    /// Numeric severity value.
    pub fn value(&self) -> i32 {
        match self {
            Level::Off => i32::MAX,
            Level::Emergency => 120_000,
            Level::Fatal => 110_000,
            Level::Alert => 100_000,
            Level::Critical => 90_000,
            Level::Severe => 80_000,
            Level::Error => 70_000,
            Level::Warn => 60_000,
            Level::Notice => 50_000,
            Level::Info => 40_000,
            Level::Debug | Level::Fine => 30_000,
            Level::Trace | Level::Finer => 20_000,
            Level::Verbose | Level::Finest => 10_000,
            Level::All => i32::MIN,
        }
    }

    /// Canonical upper-case name.
    pub fn name(&self) -> &'static str {
        match self {
            Level::Off => "OFF",
            Level::Emergency => "EMERGENCY",
            Level::Fatal => "FATAL",
            Level::Alert => "ALERT",
            Level::Critical => "CRITICAL",
            Level::Severe => "SEVERE",
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Notice => "NOTICE",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Fine => "FINE",
            Level::Trace => "TRACE",
            Level::Finer => "FINER",
            Level::Verbose => "VERBOSE",
            Level::Finest => "FINEST",
            Level::All => "ALL",
        }
    }

    /// Whether this level meets `threshold` by numeric value.
    pub fn is_at_least(&self, threshold: Level) -> bool {
        self.value() >= threshold.value()
    }

    /// The class bucket this level falls in.
    pub fn class(&self) -> LevelClass {
        let value = self.value();
        if value > Level::Critical.value() {
            LevelClass::Unrecoverable
        } else if value > Level::Notice.value() {
            LevelClass::Recoverable
        } else if value > Level::Debug.value() {
            LevelClass::Information
        } else {
            LevelClass::Debug
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Level> {
        Level::ALL
            .iter()
            .copied()
            .find(|level| level.name().eq_ignore_ascii_case(name.trim()))
    }

    fn position(&self) -> usize {
        Level::ALL
            .iter()
            .position(|level| level == self)
            .unwrap_or(Level::ALL.len())
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value()
            .cmp(&other.value())
            .then_with(|| other.position().cmp(&self.position()))
    }
}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::from_name(s).ok_or_else(|| Error::UnknownLevel(s.to_string()))
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
