//! Asynchronous batching engine.
//!
//! Producers call [`Engine::submit`] from any thread; it never blocks. A
//! single worker thread pulls records from the bounded ingest channel,
//! classifies them, keeps a pre-trigger context window and flushes batches
//! to a [`BatchSink`] under a count/time policy.
//!
//! Lifecycle:
//!
//! ```text
//! new ──start()──▶ running ──stop(timeout)──▶ draining ──▶ stopped
//! ```
//!
//! Records submitted before `start` wait in the channel. Records submitted
//! after `stop` are rejected and counted as lost, and so are records still
//! queued when an engine that never started is stopped.

pub mod channel;
pub mod classifier;
pub mod scheduler;
pub mod window;
mod worker;

pub use channel::{ingest_channel, IngestReceiver, IngestSender, LostCounter, ShutdownSignal, TakeOutcome};
pub use classifier::{LevelEvaluator, TriggerEvaluator};
pub use scheduler::{FlushPolicy, FlushReason, WorkerState};
pub use window::ContextWindow;
pub use worker::StopReport;

use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError};
use mb_common::{Level, Record};
use mb_format::Template;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::sink::BatchSink;
use worker::Worker;

/// Default ingest channel capacity.
pub const DEFAULT_INGEST_CAPACITY: usize = 8192;
/// Default minimum interval between flushes.
pub const DEFAULT_HOLDDOWN: Duration = Duration::from_secs(15 * 60);
/// Default forced-flush batch size.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1024;
/// Default context window depth.
pub const DEFAULT_PRE_TRIGGER_DEPTH: usize = 16;
/// Default upper bound on one worker wait.
pub const DEFAULT_POLL_CEILING: Duration = Duration::from_secs(30);
/// Default bound on how long `stop` waits for the worker.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);
/// Default subject template.
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "mailbatch";

const WORKER_THREAD_NAME: &str = "mailbatch-worker";

/// Errors raised when activating an engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid engine setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("engine has been stopped")]
    Stopped,
}

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Channel capacity; 0 means unbounded.
    pub ingest_capacity: usize,
    pub holddown: Duration,
    pub max_batch_size: usize,
    pub pre_trigger_depth: usize,
    pub trigger_threshold: Level,
    pub poll_ceiling: Duration,
    pub shutdown_timeout: Duration,
    pub subject_template: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ingest_capacity: DEFAULT_INGEST_CAPACITY,
            holddown: DEFAULT_HOLDDOWN,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            pre_trigger_depth: DEFAULT_PRE_TRIGGER_DEPTH,
            trigger_threshold: Level::Warn,
            poll_ceiling: DEFAULT_POLL_CEILING,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            subject_template: DEFAULT_SUBJECT_TEMPLATE.to_string(),
        }
    }
}

impl EngineSettings {
    pub fn with_ingest_capacity(mut self, capacity: usize) -> Self {
        self.ingest_capacity = capacity;
        self
    }

    pub fn with_holddown(mut self, holddown: Duration) -> Self {
        self.holddown = holddown;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_pre_trigger_depth(mut self, depth: usize) -> Self {
        self.pre_trigger_depth = depth;
        self
    }

    pub fn with_trigger_threshold(mut self, threshold: Level) -> Self {
        self.trigger_threshold = threshold;
        self
    }

    pub fn with_poll_ceiling(mut self, ceiling: Duration) -> Self {
        self.poll_ceiling = ceiling;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_subject_template(mut self, template: impl Into<String>) -> Self {
        self.subject_template = template.into();
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |field, reason: &str| {
            Err(EngineError::InvalidSetting {
                field,
                reason: reason.to_string(),
            })
        };
        if self.holddown.is_zero() {
            return invalid("holddown", "must be greater than zero");
        }
        if self.poll_ceiling.is_zero() {
            return invalid("poll_ceiling", "must be greater than zero");
        }
        if self.max_batch_size == 0 {
            return invalid("max_batch_size", "must be greater than zero");
        }
        Ok(())
    }

    fn policy(&self) -> FlushPolicy {
        FlushPolicy {
            holddown: self.holddown,
            max_batch_size: self.max_batch_size,
            poll_ceiling: self.poll_ceiling,
        }
    }
}

enum Lifecycle {
    Idle {
        receiver: IngestReceiver,
        evaluator: Box<dyn TriggerEvaluator>,
        sink: Box<dyn BatchSink>,
    },
    Running {
        handle: JoinHandle<()>,
        done: Receiver<StopReport>,
    },
    Stopped,
}

/// The batching engine. Share it behind an `Arc` to submit from many threads.
pub struct Engine {
    settings: EngineSettings,
    sender: IngestSender,
    shutdown: ShutdownSignal,
    lifecycle: Mutex<Lifecycle>,
}

impl Engine {
    /// Engine that triggers on the configured threshold level.
    pub fn new(settings: EngineSettings, sink: impl BatchSink + 'static) -> Self {
        let evaluator = LevelEvaluator::new(settings.trigger_threshold);
        Self::with_evaluator(settings, evaluator, sink)
    }

    /// Engine with a custom triggering predicate.
    pub fn with_evaluator(
        settings: EngineSettings,
        evaluator: impl TriggerEvaluator + 'static,
        sink: impl BatchSink + 'static,
    ) -> Self {
        let (sender, receiver, shutdown) = ingest_channel(settings.ingest_capacity);
        Self {
            settings,
            sender,
            shutdown,
            lifecycle: Mutex::new(Lifecycle::Idle {
                receiver,
                evaluator: Box::new(evaluator),
                sink: Box::new(sink),
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Validate the settings and spawn the worker. Calling it again is a no-op.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut lifecycle = self.lock();
        match &*lifecycle {
            Lifecycle::Running { .. } => return Ok(()),
            Lifecycle::Stopped => return Err(EngineError::Stopped),
            Lifecycle::Idle { .. } => {}
        }
        self.settings.validate()?;

        let Lifecycle::Idle {
            receiver,
            evaluator,
            sink,
        } = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        else {
            return Ok(());
        };

        let worker = Worker::new(
            receiver,
            self.sender.lost().clone(),
            evaluator,
            sink,
            self.settings.policy(),
            Template::parse(&self.settings.subject_template),
            self.settings.pre_trigger_depth,
        );
        let (done_tx, done_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let report = worker.run();
                let _ = done_tx.send(report);
            })
            .map_err(EngineError::Spawn)?;

        *lifecycle = Lifecycle::Running {
            handle,
            done: done_rx,
        };
        info!(
            capacity = self.settings.ingest_capacity,
            pre_trigger_depth = self.settings.pre_trigger_depth,
            threshold = %self.settings.trigger_threshold,
            "engine started"
        );
        Ok(())
    }

    /// Enqueue a record without blocking. Returns `false` if it was dropped.
    pub fn submit(&self, record: Record) -> bool {
        self.sender.submit(record)
    }

    /// Drops since the last flush.
    pub fn lost_events(&self) -> u64 {
        self.sender.lost().peek()
    }

    /// Read and reset the lost-event counter, as a flush does.
    pub fn take_lost_events(&self) -> u64 {
        self.sender.lost().take()
    }

    /// Records waiting in the ingest channel.
    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.lock(), Lifecycle::Running { .. })
    }

    /// Signal shutdown and wait up to `timeout` for the worker to drain.
    pub fn stop(&self, timeout: Duration) -> StopReport {
        self.shutdown.signal();
        let previous = std::mem::replace(&mut *self.lock(), Lifecycle::Stopped);

        let (handle, done) = match previous {
            Lifecycle::Running { handle, done } => (handle, done),
            Lifecycle::Idle { receiver, .. } => {
                let abandoned = receiver.drain_all().len();
                let lost = self.sender.lost();
                lost.record_drops(abandoned as u64);
                if abandoned > 0 {
                    warn!(
                        records = abandoned,
                        "engine stopped before it was started, queued records lost"
                    );
                }
                return StopReport {
                    completed: true,
                    unreported_lost: lost.peek(),
                    ..StopReport::default()
                };
            }
            Lifecycle::Stopped => {
                return StopReport {
                    completed: true,
                    ..StopReport::default()
                }
            }
        };

        match done.recv_timeout(timeout) {
            Ok(report) => {
                let _ = handle.join();
                report
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "worker did not stop in time, continuing shutdown"
                );
                StopReport::default()
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("worker exited without a stop report");
                let _ = handle.join();
                StopReport::default()
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        // Lifecycle transitions cannot leave the state half-written.
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !matches!(&*self.lock(), Lifecycle::Stopped) {
            let report = self.stop(self.settings.shutdown_timeout);
            debug!(
                completed = report.completed,
                unreported_lost = report.unreported_lost,
                "engine dropped before stop"
            );
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .field("pending", &self.pending())
            .field("lost", &self.lost_events())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{FlushedBatch, SinkError};

    fn noop(_: &FlushedBatch) -> Result<(), SinkError> {
        Ok(())
    }

    #[test]
    fn test_settings_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.ingest_capacity, 8192);
        assert_eq!(settings.holddown, Duration::from_secs(900));
        assert_eq!(settings.max_batch_size, 1024);
        assert_eq!(settings.pre_trigger_depth, 16);
        assert_eq!(settings.trigger_threshold, Level::Warn);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_settings_reject_start() {
        let engine = Engine::new(EngineSettings::default().with_max_batch_size(0), noop);
        assert!(matches!(
            engine.start(),
            Err(EngineError::InvalidSetting { field: "max_batch_size", .. })
        ));
        assert!(!engine.is_running());

        let engine = Engine::new(EngineSettings::default().with_holddown(Duration::ZERO), noop);
        assert!(engine.start().is_err());
    }

    #[test]
    fn test_start_is_idempotent() {
        let engine = Engine::new(EngineSettings::default(), noop);
        engine.start().unwrap();
        engine.start().unwrap();
        assert!(engine.is_running());
        let report = engine.stop(Duration::from_secs(5));
        assert!(report.completed);
        assert!(!engine.is_running());
        assert!(matches!(engine.start(), Err(EngineError::Stopped)));
    }

    #[test]
    fn test_submit_after_stop_is_counted() {
        let engine = Engine::new(EngineSettings::default(), noop);
        engine.start().unwrap();
        engine.stop(Duration::from_secs(5));
        assert!(!engine.submit(Record::new(Level::Error, "late")));
        assert_eq!(engine.lost_events(), 1);
        assert_eq!(engine.take_lost_events(), 1);
        assert_eq!(engine.lost_events(), 0);
    }

    #[test]
    fn test_stop_without_start() {
        let engine = Engine::new(EngineSettings::default(), noop);
        for n in 0..3 {
            assert!(engine.submit(Record::new(Level::Error, format!("queued {n}"))));
        }
        assert_eq!(engine.pending(), 3);

        let report = engine.stop(Duration::from_secs(1));
        assert!(report.completed);
        assert_eq!(report.flushes, 0);
        assert_eq!(report.unreported_lost, 3);
        assert_eq!(engine.lost_events(), 3);
        assert_eq!(engine.pending(), 0);
        assert!(!engine.submit(Record::new(Level::Error, "late")));
        assert_eq!(engine.lost_events(), 4);
    }
}
