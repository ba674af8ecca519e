//! In-memory EVM node.

use crate::{Calls, answer};
use alloy_primitives::{Address, Log, LogData, U256, address, keccak256};
use alloy_rpc_types::TransactionRequest;
use async_trait::async_trait;
use confirm_estimation::evm::{EvmClient, GasPrice, SimulatedCall, balances::NATIVE_TRANSFER_ADDRESS};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

/// Sender of the fixtures.
pub const SENDER: Address = address!("0x1111111111111111111111111111111111111111");
/// Recipient of the fixtures.
pub const RECIPIENT: Address = address!("0x2222222222222222222222222222222222222222");
/// Chain id of the mock node.
pub const CHAIN_ID: u64 = 1;
/// One gwei in wei.
pub const GWEI: u128 = 1_000_000_000;

/// A request of the [`EvmClient`] interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvmCall {
    /// `chain_id`.
    ChainId,
    /// `transaction_count`.
    TransactionCount,
    /// `gas_price`.
    GasPrice,
    /// `eip1559_fees`.
    Eip1559Fees,
    /// `estimate_gas`.
    EstimateGas,
    /// `simulate_transfers`.
    Simulate,
}

type Simulator = Arc<dyn Fn(&TransactionRequest) -> eyre::Result<SimulatedCall> + Send + Sync>;

struct State {
    nonce: u64,
    gas_price: u128,
    eip1559: GasPrice,
    gas_estimate: u64,
    calls: Calls<EvmCall>,
    simulated: Vec<TransactionRequest>,
    simulator: Simulator,
}

/// An [`EvmClient`] answering from memory.
///
/// Simulations trace the native value of the transaction from its sender to its recipient by
/// default. Calls can be made to fail or to wait before answering.
#[derive(Clone)]
pub struct MockEvmClient {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for MockEvmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEvmClient").finish_non_exhaustive()
    }
}

impl Default for MockEvmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEvmClient {
    /// A node suggesting 50 gwei with a 2 gwei tip, where the sender's next nonce is 7.
    pub fn new() -> Self {
        let state = State {
            nonce: 7,
            gas_price: 50 * GWEI,
            eip1559: GasPrice::eip1559(50 * GWEI, Some(2 * GWEI)),
            gas_estimate: 60_000,
            calls: Calls::new(Some(EvmCall::Simulate)),
            simulated: Vec::new(),
            simulator: Arc::new(|tx| Ok(native_transfer(tx))),
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Sets the next nonce of every account.
    pub fn with_nonce(self, nonce: u64) -> Self {
        self.state.lock().nonce = nonce;
        self
    }

    /// Sets the legacy gas price.
    pub fn with_gas_price(self, gas_price: u128) -> Self {
        self.state.lock().gas_price = gas_price;
        self
    }

    /// Sets the EIP-1559 fee estimate.
    pub fn with_eip1559_fees(self, fees: GasPrice) -> Self {
        self.state.lock().eip1559 = fees;
        self
    }

    /// Sets the gas estimate of every transaction.
    pub fn with_gas_estimate(self, gas: u64) -> Self {
        self.state.lock().gas_estimate = gas;
        self
    }

    /// Replaces the simulation responder.
    pub fn with_simulator(
        self,
        simulator: impl Fn(&TransactionRequest) -> eyre::Result<SimulatedCall> + Send + Sync + 'static,
    ) -> Self {
        self.state.lock().simulator = Arc::new(simulator);
        self
    }

    /// Makes every subsequent `call` fail.
    pub fn fail(&self, call: EvmCall) {
        self.state.lock().calls.failing.push(call);
    }

    /// Makes `call` succeed again.
    pub fn recover(&self, call: EvmCall) {
        self.state.lock().calls.failing.retain(|c| *c != call);
    }

    /// Queues delays applied, in order, to the next simulations.
    pub fn delay_simulations(&self, delays: impl IntoIterator<Item = Duration>) {
        self.state.lock().calls.delays.extend(delays);
    }

    /// Number of times `call` was requested.
    pub fn calls(&self, call: EvmCall) -> usize {
        self.state.lock().calls.count(call)
    }

    /// Every simulated transaction, oldest first.
    pub fn simulated(&self) -> Vec<TransactionRequest> {
        self.state.lock().simulated.clone()
    }

    fn record(&self, call: EvmCall) -> (Option<Duration>, bool) {
        self.state.lock().calls.record(call)
    }
}

#[async_trait]
impl EvmClient for MockEvmClient {
    async fn chain_id(&self) -> eyre::Result<u64> {
        answer(EvmCall::ChainId, self.record(EvmCall::ChainId)).await?;
        Ok(CHAIN_ID)
    }

    async fn transaction_count(&self, _address: Address) -> eyre::Result<u64> {
        answer(EvmCall::TransactionCount, self.record(EvmCall::TransactionCount)).await?;
        Ok(self.state.lock().nonce)
    }

    async fn gas_price(&self) -> eyre::Result<u128> {
        answer(EvmCall::GasPrice, self.record(EvmCall::GasPrice)).await?;
        Ok(self.state.lock().gas_price)
    }

    async fn eip1559_fees(&self) -> eyre::Result<GasPrice> {
        answer(EvmCall::Eip1559Fees, self.record(EvmCall::Eip1559Fees)).await?;
        Ok(self.state.lock().eip1559)
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> eyre::Result<u64> {
        answer(EvmCall::EstimateGas, self.record(EvmCall::EstimateGas)).await?;
        Ok(self.state.lock().gas_estimate)
    }

    async fn simulate_transfers(&self, tx: &TransactionRequest) -> eyre::Result<SimulatedCall> {
        answer(EvmCall::Simulate, self.record(EvmCall::Simulate)).await?;
        let simulator = {
            let mut state = self.state.lock();
            state.simulated.push(tx.clone());
            state.simulator.clone()
        };
        simulator(tx)
    }
}

/// A successful call tracing the native value of `tx`.
pub fn native_transfer(tx: &TransactionRequest) -> SimulatedCall {
    let value = tx.value.unwrap_or_default();
    let logs = match (tx.from, tx.to.and_then(|to| to.to().copied())) {
        (Some(from), Some(to)) if !value.is_zero() => {
            vec![transfer_log(NATIVE_TRANSFER_ADDRESS, from, to, value)]
        }
        _ => Vec::new(),
    };
    SimulatedCall { success: true, logs, ..Default::default() }
}

/// An ERC-20 `Transfer` log emitted by `token`.
pub fn transfer_log(token: Address, from: Address, to: Address, amount: U256) -> Log {
    let topics = vec![
        keccak256("Transfer(address,address,uint256)"),
        from.into_word(),
        to.into_word(),
    ];
    let data = amount.to_be_bytes::<32>().to_vec();
    Log { address: token, data: LogData::new_unchecked(topics, data.into()) }
}
