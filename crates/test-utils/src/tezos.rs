//! In-memory Tezos node.

use crate::{Calls, answer};
use async_trait::async_trait;
use confirm_estimation::tezos::{
    BalanceUpdate, BlockHead, ContentResult, OperationContent, OperationKind, OperationResult,
    TezosEstimate, TezosOperation, TezosPayload, TezosRpc,
};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

/// Source account of the fixtures.
pub const SOURCE_PKH: &str = "tz1burnburnburnburnburnburnburjAYjjX";
/// Public key of [`SOURCE_PKH`].
pub const SOURCE_PUBLIC_KEY: &str = "edpkuBknW28nW72KG6RoHtYW7p12T6GKc7nAbwYX5m8Wd9sDVC9yav";
/// Recipient of the fixtures.
pub const RECIPIENT_PKH: &str = "tz1VSUr8wwNhLAzempoch5d6hLRiTh8Cjcjb";

/// Gas consumed by every mocked content, in milligas.
pub const CONSUMED_MILLIGAS: u64 = 1_000_000;

/// A request of the [`TezosRpc`] interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TezosCall {
    /// `head`.
    Head,
    /// `counter`.
    Counter,
    /// `manager_key`.
    ManagerKey,
    /// `forge_operations`.
    Forge,
    /// `simulate_operations`.
    Simulate,
}

type Simulator = Arc<dyn Fn(&[OperationContent]) -> eyre::Result<Vec<ContentResult>> + Send + Sync>;

struct State {
    head: BlockHead,
    counter: u64,
    manager_key: Option<String>,
    calls: Calls<TezosCall>,
    forged: Vec<Vec<OperationContent>>,
    simulated: Vec<Vec<OperationContent>>,
    simulator: Simulator,
}

/// A [`TezosRpc`] answering from memory.
///
/// Simulations apply every content by default, moving transferred amounts between the source and
/// the destination. Calls can be made to fail or to wait before answering.
#[derive(Clone)]
pub struct MockTezosRpc {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for MockTezosRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTezosRpc").finish_non_exhaustive()
    }
}

impl Default for MockTezosRpc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTezosRpc {
    /// A node where the fixture source is revealed and has counter 41.
    pub fn new() -> Self {
        let state = State {
            head: BlockHead {
                hash: "BLockGenesisGenesisGenesisGenesisGenesisf79b5d1CoW2".to_string(),
                chain_id: "NetXdQprcVkpaWU".to_string(),
                level: 1,
            },
            counter: 41,
            manager_key: Some(SOURCE_PUBLIC_KEY.to_string()),
            calls: Calls::new(Some(TezosCall::Head)),
            forged: Vec::new(),
            simulated: Vec::new(),
            simulator: Arc::new(|contents| Ok(applied_results(contents))),
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Marks the source as not revealed.
    pub fn unrevealed(self) -> Self {
        self.state.lock().manager_key = None;
        self
    }

    /// Sets the counter of the source.
    pub fn with_counter(self, counter: u64) -> Self {
        self.state.lock().counter = counter;
        self
    }

    /// Replaces the simulation responder.
    pub fn with_simulator(
        self,
        simulator: impl Fn(&[OperationContent]) -> eyre::Result<Vec<ContentResult>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.state.lock().simulator = Arc::new(simulator);
        self
    }

    /// Makes every subsequent `call` fail.
    pub fn fail(&self, call: TezosCall) {
        self.state.lock().calls.failing.push(call);
    }

    /// Makes `call` succeed again.
    pub fn recover(&self, call: TezosCall) {
        self.state.lock().calls.failing.retain(|c| *c != call);
    }

    /// Queues delays applied, in order, to the next `head` requests.
    pub fn delay_heads(&self, delays: impl IntoIterator<Item = Duration>) {
        self.state.lock().calls.delays.extend(delays);
    }

    /// Number of times `call` was requested.
    pub fn calls(&self, call: TezosCall) -> usize {
        self.state.lock().calls.count(call)
    }

    /// Contents of every forge request, oldest first.
    pub fn forged(&self) -> Vec<Vec<OperationContent>> {
        self.state.lock().forged.clone()
    }

    /// Contents of every simulation request, oldest first.
    pub fn simulated(&self) -> Vec<Vec<OperationContent>> {
        self.state.lock().simulated.clone()
    }

    fn record(&self, call: TezosCall) -> (Option<Duration>, bool) {
        self.state.lock().calls.record(call)
    }
}

#[async_trait]
impl TezosRpc for MockTezosRpc {
    async fn head(&self) -> eyre::Result<BlockHead> {
        answer(TezosCall::Head, self.record(TezosCall::Head)).await?;
        Ok(self.state.lock().head.clone())
    }

    async fn counter(&self, _pkh: &str) -> eyre::Result<u64> {
        answer(TezosCall::Counter, self.record(TezosCall::Counter)).await?;
        Ok(self.state.lock().counter)
    }

    async fn manager_key(&self, _pkh: &str) -> eyre::Result<Option<String>> {
        answer(TezosCall::ManagerKey, self.record(TezosCall::ManagerKey)).await?;
        Ok(self.state.lock().manager_key.clone())
    }

    async fn forge_operations(
        &self,
        _branch: &str,
        contents: &[OperationContent],
    ) -> eyre::Result<String> {
        answer(TezosCall::Forge, self.record(TezosCall::Forge)).await?;
        self.state.lock().forged.push(contents.to_vec());
        Ok(forged_hex(contents.len()))
    }

    async fn simulate_operations(
        &self,
        _head: &BlockHead,
        contents: &[OperationContent],
    ) -> eyre::Result<Vec<ContentResult>> {
        answer(TezosCall::Simulate, self.record(TezosCall::Simulate)).await?;
        let simulator = {
            let mut state = self.state.lock();
            state.simulated.push(contents.to_vec());
            state.simulator.clone()
        };
        simulator(contents)
    }
}

/// Forged bytes of a batch: a 32 byte branch and 64 bytes per content.
pub fn forged_hex(contents: usize) -> String {
    "ab".repeat(32 + 64 * contents)
}

/// Applied results for `contents`, transfers moving their amount from source to destination.
pub fn applied_results(contents: &[OperationContent]) -> Vec<ContentResult> {
    contents
        .iter()
        .map(|content| {
            let mut result = OperationResult::applied();
            result.consumed_milligas = Some(CONSUMED_MILLIGAS);
            if let OperationKind::Transaction { destination, amount, .. } = &content.kind {
                let amount = *amount as i64;
                result.balance_updates = vec![
                    contract_update(&content.source, -amount),
                    contract_update(destination, amount),
                ];
            }
            ContentResult::new(content.kind.name(), result)
        })
        .collect()
}

fn contract_update(contract: &str, change: i64) -> BalanceUpdate {
    BalanceUpdate { kind: "contract".to_string(), contract: Some(contract.to_string()), change }
}

/// An estimate with the given fee, a 1 000 gas limit and no storage.
pub fn estimate(suggested_fee: u64) -> TezosEstimate {
    TezosEstimate { suggested_fee, gas_limit: 1_000, ..Default::default() }
}

/// A payload of the fixture source.
pub fn payload(operations: Vec<TezosOperation>) -> TezosPayload {
    TezosPayload {
        source_pkh: Some(SOURCE_PKH.to_string()),
        source_public_key: Some(SOURCE_PUBLIC_KEY.to_string()),
        operations,
        ..Default::default()
    }
}
