//! mailbatch core library.
//!
//! - [`engine`]: the batching, triggering and flush-scheduling engine
//! - [`sink`]: batch sinks, including the HTML mail sink
//! - [`config`]: TOML configuration resolution and validation
//! - [`logging`]: tracing subscriber setup for the binary
//! - [`exit_codes`]: stable CLI exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod engine;
pub mod exit_codes;
pub mod logging;
pub mod sink;

pub use engine::{Engine, EngineError, EngineSettings, StopReport};
pub use sink::{BatchSink, FlushedBatch, MailSink, SinkError};
