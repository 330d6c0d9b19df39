//! Batch sinks: where the worker hands finished batches.

use mb_common::Record;
use mb_report::{render, HtmlTransform, Layout, ReportError};
use mb_transport::{MailMessage, Mailbox, Priority, Transport, TransportError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

/// A finished batch with its flush-time statistics.
#[derive(Debug, Clone, Serialize)]
pub struct FlushedBatch {
    pub records: Vec<Record>,
    /// Submissions dropped since the previous flush.
    pub lost: u64,
    /// The expanded subject template.
    pub summary: String,
}

impl FlushedBatch {
    pub fn triggering_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_triggering()).count()
    }
}

/// Errors raised while delivering a batch.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("render failed: {0}")]
    Report(#[from] ReportError),

    #[error("delivery failed: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Other(String),
}

/// Consumes finished batches. Called only from the worker thread.
pub trait BatchSink: Send {
    fn deliver(&mut self, batch: &FlushedBatch) -> Result<(), SinkError>;
}

impl<F> BatchSink for F
where
    F: FnMut(&FlushedBatch) -> Result<(), SinkError> + Send,
{
    fn deliver(&mut self, batch: &FlushedBatch) -> Result<(), SinkError> {
        self(batch)
    }
}

/// Message envelope settings for [`MailSink`].
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: Mailbox,
    pub to: Vec<Mailbox>,
    pub reply_to: Option<Mailbox>,
    pub priority: Priority,
}

/// Renders a batch to HTML and sends it as one mail message.
pub struct MailSink {
    layout: Layout,
    transform: HtmlTransform,
    envelope: Envelope,
    transport: Box<dyn Transport>,
}

impl MailSink {
    pub fn new(
        layout: Layout,
        transform: HtmlTransform,
        envelope: Envelope,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            layout,
            transform,
            envelope,
            transport,
        }
    }

    /// Build the message for `batch` without sending it.
    pub fn compose(&self, batch: &FlushedBatch) -> Result<MailMessage, SinkError> {
        let document = render(&batch.records, &self.layout);
        trace!(document = %document.to_xml(), "rendered event document");

        let html = self.transform.transform(&document, batch.lost)?;
        let message = MailMessage::new(
            self.envelope.from.clone(),
            self.envelope.to.clone(),
            batch.summary.as_str(),
            html,
        )?
        .with_reply_to(self.envelope.reply_to.clone())
        .with_priority(self.envelope.priority);
        Ok(message)
    }
}

impl BatchSink for MailSink {
    fn deliver(&mut self, batch: &FlushedBatch) -> Result<(), SinkError> {
        let message = self.compose(batch)?;
        self.transport.send(&message)?;
        debug!(
            transport = %self.transport.describe(),
            message_id = %message.message_id(),
            "batch mailed"
        );
        Ok(())
    }
}

impl std::fmt::Debug for MailSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSink")
            .field("envelope", &self.envelope)
            .field("transport", &self.transport.describe())
            .finish()
    }
}
