//! Local inbox of received notifications with read flags.

use std::collections::VecDeque;

use framecast_core::NotificationRecord;

/// A received record and whether the user has seen it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboxEntry {
    /// The record as delivered.
    pub record: NotificationRecord,
    /// Read flag.
    pub read: bool,
}

/// Bounded, newest-first, de-duplicated by id.
#[derive(Debug)]
pub struct Inbox {
    entries: VecDeque<InboxEntry>,
    capacity: usize,
}

impl Inbox {
    /// Empty inbox holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add an unread record. Returns `false` if its id is already present.
    pub fn push(&mut self, record: NotificationRecord) -> bool {
        self.insert(record, false)
    }

    /// Add a record with an explicit read flag. Returns `false` on duplicate id.
    pub fn insert(&mut self, record: NotificationRecord, read: bool) -> bool {
        if self.contains(record.id.as_str()) {
            return false;
        }
        if self.entries.len() == self.capacity {
            let _ = self.entries.pop_back();
        }
        self.entries.push_front(InboxEntry { record, read });
        true
    }

    /// Whether a record with `id` is held.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.record.id.as_str() == id)
    }

    /// Entries, newest first.
    pub fn entries(&self) -> Vec<InboxEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Unread entries.
    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.read).count()
    }

    /// Mark one entry read. Returns `false` if the id is unknown.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.record.id.as_str() == id) {
            Some(entry) => {
                entry.read = true;
                true
            }
            None => false,
        }
    }

    /// Mark everything read.
    pub fn mark_all_read(&mut self) {
        for entry in &mut self.entries {
            entry.read = true;
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the inbox is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use framecast_core::{NotificationDraft, NotificationId};

    fn record(id: &str) -> NotificationRecord {
        NotificationRecord::from_draft(
            NotificationDraft::new(id, "d", "info"),
            NotificationId::from(id),
            "appA",
            Utc::now(),
        )
    }

    #[test]
    fn newest_first_and_deduplicated() {
        let mut inbox = Inbox::new(10);
        assert!(inbox.push(record("a")));
        assert!(inbox.push(record("b")));
        assert!(!inbox.push(record("a")));
        let ids: Vec<_> = inbox.entries().into_iter().map(|e| e.record.title).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn bounded_drops_oldest() {
        let mut inbox = Inbox::new(2);
        for id in ["a", "b", "c"] {
            let _ = inbox.push(record(id));
        }
        assert_eq!(inbox.len(), 2);
        assert!(!inbox.contains("a"));
        assert!(inbox.contains("c"));
    }

    #[test]
    fn read_flags() {
        let mut inbox = Inbox::new(10);
        let _ = inbox.push(record("a"));
        let _ = inbox.push(record("b"));
        let _ = inbox.insert(record("c"), true);
        assert_eq!(inbox.unread_count(), 2);

        assert!(inbox.mark_read("a"));
        assert!(!inbox.mark_read("zzz"));
        assert_eq!(inbox.unread_count(), 1);

        inbox.mark_all_read();
        assert_eq!(inbox.unread_count(), 0);
    }
}
