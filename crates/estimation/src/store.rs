//! Latest estimation snapshot per chain kind.

use confirm_common::{EstimationError, Ticket};
use std::{fmt, sync::Arc};
use tokio::sync::watch;

/// Single-writer, multi-reader cell holding the latest value of a confirmation session.
///
/// Writes replace the value wholesale; no history is kept. Cloning the store yields another
/// handle to the same cell. Display widgets can [`subscribe`](Self::subscribe) to be woken on
/// every replacement.
pub struct EstimationStore<T> {
    tx: Arc<watch::Sender<Option<Arc<T>>>>,
}

impl<T> Clone for EstimationStore<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> Default for EstimationStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EstimationStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstimationStore").field("is_set", &self.tx.borrow().is_some()).finish()
    }
}

impl<T> EstimationStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self { tx: Arc::new(watch::Sender::new(None)) }
    }

    /// Replaces the stored value.
    pub fn set_data(&self, value: T) {
        self.tx.send_replace(Some(Arc::new(value)));
    }

    /// Replaces the stored value if `ticket` has not been superseded.
    ///
    /// Returns whether the value was written.
    pub fn set_data_if_current(&self, ticket: &Ticket, value: T) -> bool {
        self.tx.send_if_modified(|slot| {
            if !ticket.is_current() {
                return false;
            }
            *slot = Some(Arc::new(value));
            true
        })
    }

    /// Removes the stored value if `ticket` has not been superseded.
    ///
    /// Returns whether the value was removed.
    pub fn clear_if_current(&self, ticket: &Ticket) -> bool {
        self.tx.send_if_modified(|slot| {
            if !ticket.is_current() || slot.is_none() {
                return false;
            }
            *slot = None;
            true
        })
    }

    /// Returns the latest value, if any.
    pub fn get_data(&self) -> Option<Arc<T>> {
        self.tx.borrow().clone()
    }

    /// Removes the stored value.
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Returns a receiver notified on every replacement.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<T>>> {
        self.tx.subscribe()
    }
}

/// Latest estimation error of a session, cleared by the next successful estimation.
pub type ErrorCell = EstimationStore<EstimationError>;
