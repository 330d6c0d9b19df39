//! Bounded ingest channel with a counted, lossy overflow policy.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::utils::Backoff;
use mb_common::Record;

/// Drops since the last flush.
#[derive(Debug, Default)]
pub struct LostCounter(AtomicU64);

impl LostCounter {
    pub fn record_drop(&self) {
        self.record_drops(1);
    }

    pub fn record_drops(&self, count: u64) {
        self.0.fetch_add(count, Ordering::Relaxed);
    }

    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Read and reset in one step.
    pub fn take(&self) -> u64 {
        self.0.swap(0, Ordering::AcqRel)
    }
}

/// Open/closed state shared by every handle of one channel.
#[derive(Debug, Default)]
struct Gate {
    closed: AtomicBool,
    in_flight: AtomicUsize,
}

impl Gate {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Wait until no producer is between its closed check and its send.
    fn settle(&self) {
        let backoff = Backoff::new();
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            backoff.snooze();
        }
    }
}

/// Result of a single [`IngestReceiver::take`].
#[derive(Debug)]
pub enum TakeOutcome {
    Record(Record),
    Timeout,
    Cancelled,
}

/// Producer half. Cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct IngestSender {
    tx: Sender<Record>,
    lost: Arc<LostCounter>,
    gate: Arc<Gate>,
}

impl IngestSender {
    /// Enqueue without blocking. A rejected record is counted as lost.
    ///
    /// Once the channel is closed every submission is rejected. An accepted
    /// record is always seen by the drain that closes the channel.
    pub fn submit(&self, record: Record) -> bool {
        self.gate.in_flight.fetch_add(1, Ordering::SeqCst);
        let accepted =
            !self.gate.closed.load(Ordering::SeqCst) && self.tx.try_send(record).is_ok();
        self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !accepted {
            self.lost.record_drop();
        }
        accepted
    }

    pub fn is_closed(&self) -> bool {
        self.gate.closed.load(Ordering::SeqCst)
    }

    /// Records currently resident in the channel.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn lost(&self) -> &Arc<LostCounter> {
        &self.lost
    }
}

/// Consumer half, owned by the worker.
#[derive(Debug)]
pub struct IngestReceiver {
    rx: Receiver<Record>,
    cancel: Receiver<()>,
    gate: Arc<Gate>,
}

impl IngestReceiver {
    /// Wait up to `timeout` for a record or the shutdown signal.
    pub fn take(&self, timeout: Duration) -> TakeOutcome {
        channel::select! {
            recv(self.cancel) -> _ => TakeOutcome::Cancelled,
            recv(self.rx) -> msg => match msg {
                Ok(record) => TakeOutcome::Record(record),
                // Every sender is gone, nothing more can arrive.
                Err(_) => TakeOutcome::Cancelled,
            },
            default(timeout) => TakeOutcome::Timeout,
        }
    }

    /// Close the channel to producers and remove every resident record.
    pub fn drain_all(&self) -> Vec<Record> {
        self.gate.close();
        self.gate.settle();
        self.rx.try_iter().collect()
    }
}

/// One-shot cancellation handle for a receiver.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Sender<()>,
    gate: Arc<Gate>,
}

impl ShutdownSignal {
    /// Reject further submissions and wake the consumer.
    pub fn signal(&self) {
        self.gate.close();
        // A full slot means shutdown was already requested.
        let _ = self.tx.try_send(());
    }
}

/// Create a channel holding at most `capacity` records; 0 means unbounded.
pub fn ingest_channel(capacity: usize) -> (IngestSender, IngestReceiver, ShutdownSignal) {
    let (tx, rx) = if capacity == 0 {
        channel::unbounded()
    } else {
        channel::bounded(capacity)
    };
    let (cancel_tx, cancel_rx) = channel::bounded(1);
    let gate = Arc::new(Gate::default());
    (
        IngestSender {
            tx,
            lost: Arc::new(LostCounter::default()),
            gate: gate.clone(),
        },
        IngestReceiver {
            rx,
            cancel: cancel_rx,
            gate: gate.clone(),
        },
        ShutdownSignal { tx: cancel_tx, gate },
    )
}
