use super::{
    EvmClient, EvmGasSuggestion, EvmPayload, GasMarket, GasPrice, balances, serialize_unsigned,
};
use crate::{
    balances::{AssetClassifier, BalancesChanges, NoCollectibles},
    options::{EvmFeeOptions, FeeOptionLabel, FeeStep},
    runner::{Pipeline, PipelineError},
};
use alloy_primitives::{Address, Bytes};
use alloy_rpc_types::TransactionRequest;
use async_trait::async_trait;
use confirm_common::{
    ConfirmConfig, EstimationError, SimulationError, config::DEFAULT_TRANSFER_GAS_LIMIT,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fee baseline of an EVM transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmFeeBaseline {
    /// Suggested price per gas, in the market of the transaction.
    pub gas_price: GasPrice,
    /// Suggested gas limit.
    pub gas_limit: u64,
}

/// User choices applied on top of the baseline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvmOverrides {
    /// Custom max fee (or gas price) per gas, in wei.
    pub custom_gas_price: Option<u128>,
    /// Custom gas limit.
    pub custom_gas_limit: Option<u64>,
    /// Custom nonce.
    pub custom_nonce: Option<u64>,
    /// Selected tier.
    pub selected: Option<FeeOptionLabel>,
}

impl EvmOverrides {
    /// The price to use: custom max fee, else the selected tier, else the baseline.
    pub fn resolve_price(&self, baseline: &EvmFeeBaseline, options: &EvmFeeOptions) -> GasPrice {
        match self.custom_gas_price {
            Some(max_fee) => baseline.gas_price.with_max_fee(max_fee),
            None => options.prices.resolve(None, self.selected),
        }
    }

    /// Applies the overrides to the skeleton of `payload`.
    ///
    /// The result carries every field the node and the encoder need, except those still unknown.
    pub fn resolve_request(
        &self,
        payload: &EvmPayload,
        chain_id: Option<u64>,
        suggestion: &EvmGasSuggestion,
        baseline: &EvmFeeBaseline,
        options: &EvmFeeOptions,
    ) -> TransactionRequest {
        let mut tx = payload.tx.clone();
        tx.from = payload.sender();
        tx.chain_id = chain_id;
        tx.gas = Some(self.custom_gas_limit.unwrap_or(baseline.gas_limit));
        tx.nonce = self.custom_nonce.or(suggestion.nonce);
        self.resolve_price(baseline, options).apply(&mut tx);
        tx
    }
}

/// Input of an [`EvmPipeline`] run.
#[derive(Clone, Debug)]
pub struct EvmInput {
    /// The pending transaction.
    pub payload: Arc<EvmPayload>,
    /// The user's choices.
    pub overrides: EvmOverrides,
}

/// Published result of an EVM estimation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmSnapshot {
    /// Baseline fee.
    pub baseline: EvmFeeBaseline,
    /// Tiers derived from the baseline.
    pub options: EvmFeeOptions,
    /// Gas values the baseline was taken from.
    pub suggestion: EvmGasSuggestion,
    /// Chain id of the transaction.
    pub chain_id: Option<u64>,
    /// The transaction with every resolved field applied.
    pub resolved: TransactionRequest,
    /// Unsigned encoding of `resolved`, once every required field is known.
    pub serialized: Option<Bytes>,
    /// Simulated balance changes of the sender.
    pub balances_changes: BalancesChanges,
}

/// Estimation pipeline for EVM transactions.
pub struct EvmPipeline {
    client: Arc<dyn EvmClient>,
    classifier: Arc<dyn AssetClassifier>,
    step: FeeStep,
    transfer_gas_limit: u64,
}

impl std::fmt::Debug for EvmPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmPipeline")
            .field("step", &self.step)
            .field("transfer_gas_limit", &self.transfer_gas_limit)
            .finish_non_exhaustive()
    }
}

impl EvmPipeline {
    /// Creates a pipeline treating every asset as fungible.
    pub fn new(client: Arc<dyn EvmClient>, step: FeeStep) -> Self {
        Self {
            client,
            classifier: Arc::new(NoCollectibles),
            step,
            transfer_gas_limit: DEFAULT_TRANSFER_GAS_LIMIT,
        }
    }

    /// Creates a pipeline with the configured EVM tier step and transfer gas limit.
    pub fn from_config(client: Arc<dyn EvmClient>, config: &ConfirmConfig) -> Self {
        Self::new(client, config.evm.into()).with_transfer_gas_limit(config.transfer_gas_limit)
    }

    /// Sets the classifier used to flag collectibles.
    pub fn with_classifier(mut self, classifier: Arc<dyn AssetClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the gas limit assumed for plain value transfers.
    pub fn with_transfer_gas_limit(mut self, gas_limit: u64) -> Self {
        self.transfer_gas_limit = gas_limit;
        self
    }

    /// The tier step.
    pub fn step(&self) -> FeeStep {
        self.step
    }

    async fn chain_id(
        &self,
        payload: &EvmPayload,
        previous: Option<&EvmSnapshot>,
    ) -> Result<u64, EstimationError> {
        if let Some(chain_id) = payload.chain_id.or(payload.tx.chain_id) {
            return Ok(chain_id);
        }
        if let Some(chain_id) = previous.and_then(|previous| previous.chain_id) {
            return Ok(chain_id);
        }
        self.client.chain_id().await.map_err(|err| EstimationError::network(&err))
    }

    async fn suggestion(
        &self,
        payload: &EvmPayload,
        previous: Option<&EvmSnapshot>,
        from: Address,
    ) -> Result<EvmGasSuggestion, EstimationError> {
        let network = |err: eyre::Report| EstimationError::network(&err);
        let mut suggestion = match (payload.suggestion, previous) {
            (Some(suggestion), _) => suggestion,
            (None, Some(previous)) => previous.suggestion,
            (None, None) => {
                let market = GasMarket::of(&payload.tx);
                let gas_price = match GasPrice::from_request(&payload.tx) {
                    Some(price) => price,
                    None => match market {
                        GasMarket::Legacy => GasPrice::Legacy {
                            gas_price: self.client.gas_price().await.map_err(network)?,
                        },
                        GasMarket::PriorityFee => {
                            self.client.eip1559_fees().await.map_err(network)?
                        }
                    },
                };
                let gas_limit = match payload.tx.gas {
                    Some(gas_limit) => gas_limit,
                    None if payload.is_plain_transfer() => self.transfer_gas_limit,
                    None => {
                        let mut tx = payload.tx.clone();
                        tx.from = Some(from);
                        self.client.estimate_gas(&tx).await.map_err(network)?
                    }
                };
                EvmGasSuggestion { gas_price, gas_limit, nonce: None }
            }
        };

        suggestion.nonce = match payload.tx.nonce.or(suggestion.nonce) {
            Some(nonce) => Some(nonce),
            None => match self.client.transaction_count(from).await {
                Ok(nonce) => Some(nonce),
                Err(err) => {
                    warn!(target: "confirm::evm", %from, %err, "failed to fetch nonce");
                    None
                }
            },
        };
        Ok(suggestion)
    }

    async fn simulate(
        &self,
        from: Address,
        tx: &TransactionRequest,
    ) -> Result<BalancesChanges, SimulationError> {
        let call =
            self.client.simulate_transfers(tx).await.map_err(|err| SimulationError::rpc(&err))?;
        if !call.success {
            return Err(SimulationError::Reverted(call.return_data.to_string()));
        }
        Ok(balances::from_logs(from, &call.logs, self.classifier.as_ref()))
    }
}

#[async_trait]
impl Pipeline for EvmPipeline {
    type Input = EvmInput;
    type Snapshot = EvmSnapshot;

    async fn estimate(
        &self,
        input: EvmInput,
        previous: Option<Arc<EvmSnapshot>>,
    ) -> Result<EvmSnapshot, PipelineError> {
        let EvmInput { payload, overrides } = input;
        let previous = previous.as_deref();
        if let Some(err) = &payload.error {
            return Err(EstimationError::External(err.clone()).into());
        }
        let from = payload.sender().ok_or(EstimationError::SourceUnknown)?;

        let chain_id = self.chain_id(&payload, previous).await?;
        let suggestion = self.suggestion(&payload, previous, from).await?;
        let market = GasMarket::of(&payload.tx);
        let baseline = EvmFeeBaseline {
            gas_price: suggestion.gas_price.into_market(market),
            gas_limit: suggestion.gas_limit,
        };
        let options = EvmFeeOptions::new(&baseline, self.step);

        let resolved =
            overrides.resolve_request(&payload, Some(chain_id), &suggestion, &baseline, &options);
        let serialized = serialize_unsigned(&resolved);
        if serialized.is_none() {
            debug!(target: "confirm::evm", nonce = ?resolved.nonce, "transaction not resolved yet");
        }

        let balances_changes = match self.simulate(from, &resolved).await {
            Ok(changes) => changes,
            Err(err) => {
                warn!(target: "confirm::evm", %err, "keeping previous balance changes");
                previous.map(|previous| previous.balances_changes.clone()).unwrap_or_default()
            }
        };

        Ok(EvmSnapshot {
            baseline,
            options,
            suggestion,
            chain_id: Some(chain_id),
            resolved,
            serialized,
            balances_changes,
        })
    }
}
