//! Pre-trigger context window.

use std::collections::VecDeque;

use mb_common::Record;

/// Ring buffer of the most recent non-triggering records.
#[derive(Debug)]
pub struct ContextWindow {
    records: VecDeque<Record>,
    capacity: usize,
}

impl ContextWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a record, returning the entry evicted to make room.
    pub fn push(&mut self, record: Record) -> Option<Record> {
        if self.capacity == 0 {
            return Some(record);
        }
        let evicted = if self.records.len() == self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }

    /// Move every record into `batch`, oldest first, leaving the window empty.
    pub fn drain_into(&mut self, batch: &mut Vec<Record>) {
        batch.extend(self.records.drain(..));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }
}
