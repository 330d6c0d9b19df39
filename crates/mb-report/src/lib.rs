//! Batch rendering for mailbatch.
//!
//! Two stages turn a flushed batch into a deliverable body:
//!
//! - **Render**: [`render`] builds an [`EventDocument`], one entry per record
//!   in arrival order, bracketed by the layout's header and footer. The
//!   document has an XML text form for logging and archival.
//! - **Transform**: [`HtmlTransform`] turns a document plus the lost-event
//!   count into a self-contained HTML body. Triggering entries are
//!   highlighted and a banner reports lost events.

pub mod config;
pub mod document;
pub mod error;
pub mod html;

pub use config::{Layout, ReportConfig, ReportTheme};
pub use document::{render, EventDocument, EventEntry};
pub use error::{ReportError, Result};
pub use html::HtmlTransform;
