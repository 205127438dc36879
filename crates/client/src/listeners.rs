//! Event listener registry shared by the realtime clients.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use apexkit_shared::ServerEvent;

/// Callback invoked for every broadcast event.
pub type Listener = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

type Entries = Mutex<Vec<(u64, Listener)>>;

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Arc<Entries>,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, listener: Listener) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.entries).push((id, listener));
        ListenerHandle {
            id,
            entries: Arc::downgrade(&self.entries),
        }
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Invoke every listener in registration order.
    ///
    /// Runs on a snapshot, so listeners may unsubscribe (or subscribe) while
    /// being called. A panicking listener is logged and skipped. Returns the
    /// number of listeners that completed.
    pub(crate) fn dispatch(&self, event: &ServerEvent) -> usize {
        let snapshot: Vec<Listener> = lock(&self.entries)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::error!("Realtime listener panicked; continuing dispatch"),
            }
        }
        delivered
    }
}

fn lock(entries: &Entries) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returned by `on_event`; removes exactly the listener it was created for.
///
/// Dropping the handle keeps the listener registered.
#[derive(Debug)]
pub struct ListenerHandle {
    id: u64,
    entries: Weak<Entries>,
}

impl ListenerHandle {
    pub fn unsubscribe(self) {
        if let Some(entries) = self.entries.upgrade() {
            lock(&entries).retain(|(id, _)| *id != self.id);
        }
    }
}
