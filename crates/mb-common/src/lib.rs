//! mailbatch common types.
//!
//! This crate provides the types shared by every mailbatch crate:
//! - The totally ordered severity [`Level`] enumeration and its class buckets
//! - The [`Record`] event entity carried from producers to the delivery sink
//! - Common error types

pub mod error;
pub mod level;
pub mod record;

pub use error::{Error, Result};
pub use level::{Level, LevelClass};
pub use record::{Record, TRIGGER_PROPERTY};
