//! Mock nodes and fixtures for testing the confirmation core.

#![warn(unused_crate_dependencies, unreachable_pub)]

#[macro_use]
extern crate tracing;

pub mod evm;
pub mod tezos;

pub use evm::{EvmCall, MockEvmClient};
pub use tezos::{MockTezosRpc, TezosCall};

/// Initializes tracing for tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Per-call bookkeeping shared by the mocks.
#[derive(Debug)]
struct Calls<C> {
    counts: Vec<(C, usize)>,
    failing: Vec<C>,
    delays: std::collections::VecDeque<std::time::Duration>,
    delayed: Option<C>,
}

impl<C: Copy + PartialEq + std::fmt::Debug> Calls<C> {
    fn new(delayed: Option<C>) -> Self {
        Self { counts: Vec::new(), failing: Vec::new(), delays: Default::default(), delayed }
    }

    /// Records a call, returning the delay to apply and whether it fails.
    fn record(&mut self, call: C) -> (Option<std::time::Duration>, bool) {
        match self.counts.iter_mut().find(|(c, _)| *c == call) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((call, 1)),
        }
        let delay = if self.delayed == Some(call) { self.delays.pop_front() } else { None };
        (delay, self.failing.contains(&call))
    }

    fn count(&self, call: C) -> usize {
        self.counts.iter().find(|(c, _)| *c == call).map_or(0, |(_, count)| *count)
    }
}

/// Awaits the delay, then fails with a mock error if asked to.
async fn answer<C: std::fmt::Debug>(
    call: C,
    (delay, fails): (Option<std::time::Duration>, bool),
) -> eyre::Result<()> {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    trace!(target: "confirm::mock", ?call, fails, "answering");
    if fails {
        eyre::bail!("mock {call:?} failure");
    }
    Ok(())
}
