//! History Buffer: the most recent notifications, oldest first.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use framecast_core::{NotificationId, NotificationRecord};

/// Bounded FIFO of recent records.
///
/// Keeps ids unique and timestamps non-decreasing in insertion order; the
/// broker relies on [`fresh_id`](Self::fresh_id) and
/// [`next_timestamp`](Self::next_timestamp) to uphold both before pushing.
#[derive(Debug)]
pub struct HistoryBuffer {
    records: VecDeque<NotificationRecord>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Empty buffer holding at most `capacity` records (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest record when full. Returns the evicted record.
    pub fn push(&mut self, record: NotificationRecord) -> Option<NotificationRecord> {
        let evicted = if self.records.len() >= self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }

    /// Whether a record with this id is buffered.
    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id.as_str() == id)
    }

    /// The requested id if it is usable, else a newly generated one.
    pub fn fresh_id(&self, requested: Option<&str>) -> NotificationId {
        match requested {
            Some(id) if !id.is_empty() && !self.contains(id) => NotificationId::from(id),
            _ => NotificationId::new(),
        }
    }

    /// `now`, clamped to be no earlier than the newest buffered timestamp.
    pub fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.records.back() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        }
    }

    /// Records oldest first (buffer order).
    pub fn iter(&self) -> impl Iterator<Item = &NotificationRecord> {
        self.records.iter()
    }

    /// Records newest first.
    pub fn newest_first(&self) -> Vec<NotificationRecord> {
        self.records.iter().rev().cloned().collect()
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of records kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
