//! Latest-request-wins bookkeeping.
//!
//! Every recomputation takes a [`Ticket`] before it starts. Starting a new recomputation makes all
//! earlier tickets stale, so results that arrive late can be recognised and dropped instead of
//! being written over newer ones. In-flight requests are not cancelled.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Hands out monotonically increasing [`Ticket`]s.
#[derive(Clone, Debug, Default)]
pub struct Supersede {
    current: Arc<AtomicU64>,
}

impl Supersede {
    /// Creates a new generation counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation, superseding every ticket issued before.
    pub fn next(&self) -> Ticket {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { generation, current: self.current.clone() }
    }

    /// Returns the latest generation handed out, `0` if none.
    pub fn generation(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

/// Proof of having started a recomputation at a given generation.
#[derive(Clone, Debug)]
pub struct Ticket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl Ticket {
    /// The generation of this ticket.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` if no newer ticket has been issued since this one.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}
