//! Template formatting for mailbatch.
//!
//! This crate provides:
//! - A small `%name` / `%name{param}` template language ([`Template`], [`format`])
//! - The [`Resolve`] capability a caller supplies to expand directives
//! - [`BatchDirectives`], the resolver used for subject lines, exposing
//!   `env{VAR}` and `events{...}` statistics over a flushed batch
//!
//! The formatter only enforces its own lexical grammar. Directive names are
//! interpreted by the resolver; resolver failures are logged and expand to
//! an empty string so formatting itself never fails.

pub mod error;
pub mod stats;
pub mod template;

pub use error::DirectiveError;
pub use stats::{event_count, BatchDirectives};
pub use template::{format, Resolve, Segment, Template};
