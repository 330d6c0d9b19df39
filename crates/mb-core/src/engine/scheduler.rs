//! Flush policy and the worker-owned batching state.

use std::time::{Duration, Instant};

use mb_common::Record;

use super::window::ContextWindow;

/// Why a batch was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Holddown,
    BatchSize,
    Shutdown,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Holddown => "holddown",
            FlushReason::BatchSize => "batch_size",
            FlushReason::Shutdown => "shutdown",
        }
    }
}

/// Count/time flush policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    pub holddown: Duration,
    pub max_batch_size: usize,
    /// Upper bound on a single wait, however far away the holddown expiry is.
    pub poll_ceiling: Duration,
}

impl FlushPolicy {
    /// Whether a batch of `batch_len` records is due `since_flush` after the
    /// previous flush.
    pub fn due(&self, batch_len: usize, since_flush: Duration) -> Option<FlushReason> {
        if batch_len > self.max_batch_size {
            Some(FlushReason::BatchSize)
        } else if batch_len > 0 && since_flush >= self.holddown {
            Some(FlushReason::Holddown)
        } else {
            None
        }
    }

    pub fn is_due(&self, batch_len: usize, since_flush: Duration) -> bool {
        self.due(batch_len, since_flush).is_some()
    }

    /// How long the worker may wait for the next record.
    ///
    /// An empty batch can only become due through a new record, so the wait
    /// is the poll ceiling.
    pub fn wait_timeout(&self, batch_len: usize, since_flush: Duration) -> Duration {
        if batch_len == 0 {
            return self.poll_ceiling;
        }
        self.holddown
            .saturating_sub(since_flush)
            .min(self.poll_ceiling)
    }
}

/// Batch, context window and flush timestamp. Touched only by the worker.
#[derive(Debug)]
pub struct WorkerState {
    batch: Vec<Record>,
    window: ContextWindow,
    last_flush: Instant,
}

impl WorkerState {
    pub fn new(pre_trigger_depth: usize, started: Instant) -> Self {
        Self {
            batch: Vec::new(),
            window: ContextWindow::new(pre_trigger_depth),
            last_flush: started,
        }
    }

    /// Place a classified record into the window or the batch.
    pub fn place(&mut self, mut record: Record, triggering: bool) {
        if triggering {
            record.mark_triggering();
            self.window.drain_into(&mut self.batch);
            self.batch.push(record);
        } else {
            // Eviction from the window is not a lost event.
            let _ = self.window.push(record);
        }
    }

    /// Hand over the batch, leaving an empty one.
    pub fn take_batch(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.batch)
    }

    pub fn mark_flushed(&mut self, at: Instant) {
        self.last_flush = at;
    }

    pub fn since_flush(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_flush)
    }

    pub fn batch(&self) -> &[Record] {
        &self.batch
    }

    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    pub fn window(&self) -> &ContextWindow {
        &self.window
    }
}
