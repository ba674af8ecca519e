//! Read-only EVM node interface.

use super::GasPrice;
use alloy_network::Ethereum;
use alloy_primitives::{Address, Bytes, Log};
use alloy_provider::Provider;
use alloy_rpc_types::{
    TransactionRequest,
    simulate::{SimBlock, SimulatePayload},
};
use async_trait::async_trait;
use eyre::OptionExt;

/// Outcome of simulating one call with transfer tracing enabled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulatedCall {
    /// Whether the call succeeded.
    pub success: bool,
    /// Return or revert data.
    pub return_data: Bytes,
    /// Emitted logs; native transfers appear as ERC-20 `Transfer` logs of the native pseudo-token.
    pub logs: Vec<Log>,
}

/// The node requests the pipeline needs.
#[async_trait]
pub trait EvmClient: Send + Sync {
    /// Chain id of the node.
    async fn chain_id(&self) -> eyre::Result<u64>;

    /// Number of transactions sent by `address`, i.e. its next nonce.
    async fn transaction_count(&self, address: Address) -> eyre::Result<u64>;

    /// Legacy gas price.
    async fn gas_price(&self) -> eyre::Result<u128>;

    /// EIP-1559 fee estimate.
    async fn eip1559_fees(&self) -> eyre::Result<GasPrice>;

    /// Gas needed by `tx`.
    async fn estimate_gas(&self, tx: &TransactionRequest) -> eyre::Result<u64>;

    /// Executes `tx` against the latest state, tracing value transfers.
    async fn simulate_transfers(&self, tx: &TransactionRequest) -> eyre::Result<SimulatedCall>;
}

/// [`EvmClient`] backed by an alloy [`Provider`].
#[derive(Clone, Debug)]
pub struct ProviderClient<P> {
    provider: P,
}

impl<P> ProviderClient<P> {
    /// Wraps a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: Provider<Ethereum>> EvmClient for ProviderClient<P> {
    async fn chain_id(&self) -> eyre::Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn transaction_count(&self, address: Address) -> eyre::Result<u64> {
        Ok(self.provider.get_transaction_count(address).pending().await?)
    }

    async fn gas_price(&self) -> eyre::Result<u128> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn eip1559_fees(&self) -> eyre::Result<GasPrice> {
        let estimate = self.provider.estimate_eip1559_fees().await?;
        Ok(GasPrice::eip1559(estimate.max_fee_per_gas, Some(estimate.max_priority_fee_per_gas)))
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> eyre::Result<u64> {
        Ok(self.provider.estimate_gas(tx.clone()).await?)
    }

    async fn simulate_transfers(&self, tx: &TransactionRequest) -> eyre::Result<SimulatedCall> {
        let payload = SimulatePayload::default()
            .extend(SimBlock::default().call(tx.clone()))
            .with_trace_transfers();
        trace!(target: "confirm::evm", ?payload, "simulating with eth_simulateV1");

        let call = self
            .provider
            .simulate(&payload)
            .await?
            .pop()
            .and_then(|mut block| block.calls.pop())
            .ok_or_eyre("node returned no simulated call")?;

        Ok(SimulatedCall {
            success: call.status,
            return_data: call.return_data,
            logs: call.logs.into_iter().map(|log| log.inner).collect(),
        })
    }
}
