//! Triggering classification.

use mb_common::{Level, Record};

/// Decides whether a record forces a flush cycle.
pub trait TriggerEvaluator: Send {
    fn is_triggering(&self, record: &Record) -> bool;
}

impl<F> TriggerEvaluator for F
where
    F: Fn(&Record) -> bool + Send,
{
    fn is_triggering(&self, record: &Record) -> bool {
        self(record)
    }
}

/// Triggers on records at or above a threshold level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelEvaluator {
    threshold: Level,
}

impl LevelEvaluator {
    pub fn new(threshold: Level) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Level {
        self.threshold
    }
}

impl TriggerEvaluator for LevelEvaluator {
    fn is_triggering(&self, record: &Record) -> bool {
        record.level.is_at_least(self.threshold)
    }
}
