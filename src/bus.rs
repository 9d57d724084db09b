use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tokio::sync::watch;

/// Latest-value topic. Publishing never blocks and late subscribers see the
/// current value.
#[derive(Debug)]
pub struct Topic<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Topic { tx: Arc::clone(&self.tx) }
    }
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn publish(&self, msg: T) {
        self.tx.send_replace(msg);
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Send + Sync + 'static> Topic<T> {
    pub fn latest(&self) -> T {
        self.tx.borrow().clone()
    }
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    closed: bool,
}

/// Single-entry hand-off to a worker thread. A newer offer replaces an input
/// the worker has not taken yet.
#[derive(Debug)]
pub struct PendingSlot<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Default for PendingSlot<T> {
    fn default() -> Self {
        PendingSlot { slot: Mutex::new(Slot { value: None, closed: false }), ready: Condvar::new() }
    }
}

impl<T> PendingSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, returning the stale input it replaced. Offers after
    /// `close` are handed back unchanged.
    pub fn offer(&self, value: T) -> Option<T> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return Some(value);
        }
        let stale = slot.value.replace(value);
        self.ready.notify_one();
        stale
    }

    /// Blocks until an input is pending. Returns `None` once closed and drained.
    pub fn take(&self) -> Option<T> {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.value.take() {
                return Some(value);
            }
            if slot.closed {
                return None;
            }
            self.ready.wait(&mut slot);
        }
    }

    pub fn close(&self) {
        self.slot.lock().closed = true;
        self.ready.notify_all();
    }
}
