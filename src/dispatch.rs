//! Single-slot completion registry.
//!
//! At most one resolver can be registered at a time, and the stored resolver
//! fires exactly once. This slot is the sole concurrency-control primitive of
//! the broker: admission is rejected, not queued, while the slot is occupied.

use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::warn;

/// A one-shot resolution slot.
///
/// `register` arms the slot and hands back the receiving end; `resolve`
/// atomically takes and fires the stored sender. Resolving an empty slot is
/// a silent no-op, which makes duplicate external events harmless.
pub struct CompletionSlot<T> {
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> CompletionSlot<T> {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    /// Arms the slot, returning the receiver for the eventual resolution.
    ///
    /// Returns `None` if the slot is already occupied; the caller must treat
    /// that as "operation already active" and answer its own request
    /// immediately without disturbing the armed slot.
    pub fn register(&self) -> Option<oneshot::Receiver<T>> {
        let mut guard = match self.tx.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("completion slot lock poisoned during register");
                return None;
            }
        };
        if guard.is_some() {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        *guard = Some(tx);
        Some(rx)
    }

    /// Whether a resolver is currently armed.
    pub fn is_occupied(&self) -> bool {
        self.tx.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    /// Takes and fires the stored resolver with `value`.
    ///
    /// Returns `false` if the slot was empty (already resolved or never
    /// armed); the value is dropped in that case.
    pub fn resolve(&self, value: T) -> bool {
        let sender = match self.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                warn!("completion slot lock poisoned during resolve");
                None
            }
        };
        match sender {
            Some(tx) => {
                // A dropped receiver means the caller gave up; nothing to do.
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }
}

impl<T> Default for CompletionSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
