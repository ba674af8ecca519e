//! Per-key debouncing of recomputation requests.

use parking_lot::Mutex;
use std::{collections::HashMap, fmt, hash::Hash, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Instant};

/// Coalesces rapid calls per key into a single call once `delay` has elapsed without a new call
/// for that key.
///
/// Every [`Debouncer::call`] aborts the timer still pending for the same key and starts a new one.
/// Calls for different keys never cancel each other. Once a timer fires, its action runs to
/// completion; there is no way to cancel an action that already started.
pub struct Debouncer<K> {
    delay: Duration,
    pending: Arc<Mutex<Pending<K>>>,
}

/// Timers waiting to fire, tagged with the id of the call that started them.
struct Pending<K> {
    next_id: u64,
    timers: HashMap<K, (u64, JoinHandle<()>)>,
}

impl<K> Default for Pending<K> {
    fn default() -> Self {
        Self { next_id: 0, timers: HashMap::new() }
    }
}

impl<K: Hash + Eq> Pending<K> {
    /// Removes the timer of `key` if it still belongs to call `id`.
    fn finish(&mut self, key: &K, id: u64) {
        if self.timers.get(key).is_some_and(|(current, _)| *current == id) {
            self.timers.remove(key);
        }
    }
}

impl<K> fmt::Debug for Debouncer<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.pending.lock().timers.len())
            .finish()
    }
}

impl<K> Clone for Debouncer<K> {
    fn clone(&self) -> Self {
        Self { delay: self.delay, pending: self.pending.clone() }
    }
}

impl<K> Debouncer<K>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + 'static,
{
    /// Creates a new debouncer with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: Default::default() }
    }

    /// Returns the quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `action` to run after the quiet period, replacing any pending action for `key`.
    ///
    /// The quiet period starts now, not when the timer task is first polled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn call<F>(&self, key: K, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + self.delay;
        let pending = self.pending.clone();
        let task_key = key.clone();

        let mut guard = self.pending.lock();
        guard.next_id += 1;
        let id = guard.next_id;
        // Spawned while holding the lock so the task cannot finish before its entry is inserted.
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            pending.lock().finish(&task_key, id);
            action();
        });
        if let Some((_, previous)) = guard.timers.insert(key.clone(), (id, handle)) {
            trace!(target: "confirm::debounce", ?key, "superseding pending call");
            previous.abort();
        }
    }

    /// Returns whether an action is waiting for `key`.
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().timers.contains_key(key)
    }

    /// Aborts all pending actions.
    pub fn cancel_all(&self) {
        for (_, (_, handle)) in self.pending.lock().timers.drain() {
            handle.abort();
        }
    }
}
