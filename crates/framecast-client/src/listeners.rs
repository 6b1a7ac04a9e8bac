//! Local notification listeners.
//!
//! Handlers live in an indexed map so removal is a keyed delete. A handler
//! that panics is logged and skipped; the remaining handlers still run.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use framecast_core::NotificationRecord;
use parking_lot::Mutex;
use tracing::warn;

type Handler = Arc<dyn Fn(&NotificationRecord) + Send + Sync>;

/// Registered `on_notification` handlers.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<BTreeMap<u64, Handler>>,
}

impl ListenerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler and return its key.
    pub fn subscribe(&self, handler: impl Fn(&NotificationRecord) + Send + Sync + 'static) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.handlers.lock().insert(id, Arc::new(handler));
        id
    }

    /// Remove a handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: u64) -> bool {
        self.handlers.lock().remove(&id).is_some()
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// Invoke every handler in subscription order; returns how many completed.
    pub fn emit(&self, record: &NotificationRecord) -> usize {
        let handlers: Vec<(u64, Handler)> = self
            .handlers
            .lock()
            .iter()
            .map(|(id, h)| (*id, Arc::clone(h)))
            .collect();

        let mut completed = 0;
        for (id, handler) in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(record))).is_ok() {
                completed += 1;
            } else {
                warn!(listener = id, notification_id = %record.id, "notification handler panicked");
            }
        }
        completed
    }
}

/// Removes the handler it was created for.
#[must_use = "dropping a Disposer keeps the handler registered"]
pub struct Disposer {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Disposer {
    pub(crate) fn new(id: u64, registry: &Arc<ListenerRegistry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    /// Unregister the handler. Returns `false` if it was already removed or
    /// the client is gone.
    pub fn dispose(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.unsubscribe(self.id))
    }
}
