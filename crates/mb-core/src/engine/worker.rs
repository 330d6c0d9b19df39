//! The single consumer thread: classify, place, flush, drain.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use mb_format::{BatchDirectives, Template};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::channel::{IngestReceiver, LostCounter, TakeOutcome};
use super::classifier::TriggerEvaluator;
use super::scheduler::{FlushPolicy, FlushReason, WorkerState};
use crate::sink::{BatchSink, FlushedBatch};

/// Outcome of [`Engine::stop`](super::Engine::stop).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StopReport {
    /// The worker reached its stopped state within the timeout.
    pub completed: bool,
    /// Flushes performed over the worker's lifetime, the final one included.
    pub flushes: u64,
    /// Records pulled from the channel during the final drain.
    pub drained: usize,
    /// Context records never promoted into a batch.
    pub discarded_context: usize,
    /// Drops counted after the last flush, never reported in a summary.
    /// Records abandoned by an engine that never started are included.
    pub unreported_lost: u64,
}

pub(crate) struct Worker {
    receiver: IngestReceiver,
    lost: Arc<LostCounter>,
    evaluator: Box<dyn TriggerEvaluator>,
    sink: Box<dyn BatchSink>,
    policy: FlushPolicy,
    subject: Template,
    state: WorkerState,
    flushes: u64,
}

impl Worker {
    pub(crate) fn new(
        receiver: IngestReceiver,
        lost: Arc<LostCounter>,
        evaluator: Box<dyn TriggerEvaluator>,
        sink: Box<dyn BatchSink>,
        policy: FlushPolicy,
        subject: Template,
        pre_trigger_depth: usize,
    ) -> Self {
        Self {
            receiver,
            lost,
            evaluator,
            sink,
            policy,
            subject,
            state: WorkerState::new(pre_trigger_depth, Instant::now()),
            flushes: 0,
        }
    }

    /// Run until cancelled, then drain. Always ends with the drain step.
    pub(crate) fn run(mut self) -> StopReport {
        info!(
            holddown_ms = self.policy.holddown.as_millis() as u64,
            max_batch_size = self.policy.max_batch_size,
            "batching worker started"
        );

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.run_loop())) {
            error!(
                panic = %panic_message(payload.as_ref()),
                "batching loop failed, draining"
            );
        }

        self.drain()
    }

    fn run_loop(&mut self) {
        loop {
            let timeout = self
                .policy
                .wait_timeout(self.state.batch_len(), self.state.since_flush(Instant::now()));

            match self.receiver.take(timeout) {
                TakeOutcome::Cancelled => return,
                TakeOutcome::Timeout => {}
                TakeOutcome::Record(record) => self.place(record),
            }

            let since_flush = self.state.since_flush(Instant::now());
            if let Some(reason) = self.policy.due(self.state.batch_len(), since_flush) {
                self.flush(reason);
            }
        }
    }

    fn place(&mut self, record: mb_common::Record) {
        let evaluator = &self.evaluator;
        let triggering =
            match panic::catch_unwind(AssertUnwindSafe(|| evaluator.is_triggering(&record))) {
                Ok(triggering) => triggering,
                Err(payload) => {
                    error!(
                        panic = %panic_message(payload.as_ref()),
                        "trigger evaluator panicked, treating record as context"
                    );
                    false
                }
            };
        self.state.place(record, triggering);
    }

    fn flush(&mut self, reason: FlushReason) {
        let records = self.state.take_batch();
        let lost = self.lost.take();
        let summary = self.subject.render(&BatchDirectives::new(&records, lost));
        let batch = FlushedBatch {
            records,
            lost,
            summary,
        };

        info!(
            records = batch.records.len(),
            triggering = batch.triggering_count(),
            lost,
            reason = reason.as_str(),
            "flushing batch"
        );

        let sink = &mut self.sink;
        match panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(&batch))) {
            Ok(Ok(())) => debug!(summary = %batch.summary, "batch delivered"),
            Ok(Err(e)) => error!(error = %e, records = batch.records.len(), "batch delivery failed"),
            Err(payload) => error!(
                panic = %panic_message(payload.as_ref()),
                records = batch.records.len(),
                "batch sink panicked"
            ),
        }

        self.state.mark_flushed(Instant::now());
        self.flushes += 1;
    }

    fn drain(mut self) -> StopReport {
        let residual = self.receiver.drain_all();
        let drained = residual.len();
        debug!(records = drained, "draining ingest channel");
        for record in residual {
            self.place(record);
        }

        if self.state.batch_len() > 0 {
            self.flush(FlushReason::Shutdown);
        }

        let discarded_context = self.state.window().len();
        if discarded_context > 0 {
            warn!(
                records = discarded_context,
                "context records were never promoted into a batch"
            );
        }

        let report = StopReport {
            completed: true,
            flushes: self.flushes,
            drained,
            discarded_context,
            unreported_lost: self.lost.peek(),
        };
        info!(flushes = report.flushes, "batching worker stopped");
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
