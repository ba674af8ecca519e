use super::{
    BlockHead, ContentResult, OperationContent, OperationKind, ReadOnlySigner, TezosEstimate,
    TezosFeeBaseline, TezosOperation, TezosRpc, TezosSigner, balances, estimate,
};
use crate::{
    balances::{AssetClassifier, BalancesChanges, NoCollectibles},
    options::{FeeOptionLabel, FeeStep, TezosFeeOptions},
    runner::{Pipeline, PipelineError},
};
use async_trait::async_trait;
use confirm_common::{ConfirmConfig, EstimationError, SimulationError, errors::display_chain};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A pending batch of Tezos manager operations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosPayload {
    /// Address of the source account.
    #[serde(default)]
    pub source_pkh: Option<String>,
    /// Public key of the source account.
    #[serde(default)]
    pub source_public_key: Option<String>,
    /// Operations in batch order.
    pub operations: Vec<TezosOperation>,
    /// Estimates computed by the requester, reveal first if one is needed.
    #[serde(default)]
    pub estimates: Option<Vec<TezosEstimate>>,
    /// Estimation error reported by the requester.
    #[serde(default)]
    pub error: Option<String>,
}

impl TezosPayload {
    /// The payload estimates, if they line up with the operations.
    pub fn usable_estimates(&self) -> Option<&[TezosEstimate]> {
        let estimates = self.estimates.as_deref()?;
        let ops = self.operations.len();
        if estimates.len() == ops || estimates.len() == ops + 1 {
            Some(estimates)
        } else {
            warn!(
                target: "confirm::tezos",
                estimates = estimates.len(),
                operations = ops,
                "ignoring estimates that do not match the operations"
            );
            None
        }
    }
}

/// User choices applied on top of the baseline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TezosOverrides {
    /// Custom total fee in mutez.
    pub custom_fee: Option<u64>,
    /// Custom total storage limit.
    pub custom_storage_limit: Option<u64>,
    /// Selected tier.
    pub selected: Option<FeeOptionLabel>,
}

impl TezosOverrides {
    /// The fee to use: custom, else the selected tier, else the baseline.
    pub fn resolve_fee(&self, options: &TezosFeeOptions) -> u64 {
        options.fees.resolve(self.custom_fee, self.selected)
    }

    /// The storage limit to use: custom, else the baseline.
    pub fn resolve_storage_limit(&self, baseline: &TezosFeeBaseline) -> u64 {
        self.custom_storage_limit.unwrap_or(baseline.storage_limit)
    }
}

/// Input of a [`TezosPipeline`] run.
#[derive(Clone, Debug)]
pub struct TezosInput {
    /// The pending batch.
    pub payload: Arc<TezosPayload>,
    /// The user's choices.
    pub overrides: TezosOverrides,
}

/// Where the balance changes of a snapshot come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BalancesSource {
    /// A simulation of the forged batch.
    Simulation,
    /// The declared operations, because simulation failed.
    Declared,
}

/// Published result of a Tezos estimation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosSnapshot {
    /// Baseline fee.
    pub baseline: TezosFeeBaseline,
    /// Tiers derived from the baseline.
    pub options: TezosFeeOptions,
    /// Resolved total fee in mutez.
    pub fee: u64,
    /// Resolved total storage limit.
    pub storage_limit: u64,
    /// Hex encoded forged batch.
    pub forged_bytes: String,
    /// The forged contents.
    pub contents: Vec<OperationContent>,
    /// Simulated or declared balance changes of the source.
    pub balances_changes: BalancesChanges,
    /// Where `balances_changes` come from.
    pub balances_source: BalancesSource,
}

impl TezosSnapshot {
    /// Returns `true` if the node forged the batch; fees alone are published while it cannot.
    pub fn is_forged(&self) -> bool {
        !self.forged_bytes.is_empty()
    }
}

/// Estimation pipeline for Tezos batches.
pub struct TezosPipeline {
    rpc: Arc<dyn TezosRpc>,
    classifier: Arc<dyn AssetClassifier>,
    step: FeeStep,
}

impl std::fmt::Debug for TezosPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TezosPipeline").field("step", &self.step).finish_non_exhaustive()
    }
}

impl TezosPipeline {
    /// Creates a pipeline treating every asset as fungible.
    pub fn new(rpc: Arc<dyn TezosRpc>, step: FeeStep) -> Self {
        Self { rpc, classifier: Arc::new(NoCollectibles), step }
    }

    /// Creates a pipeline with the configured Tezos tier step.
    pub fn from_config(rpc: Arc<dyn TezosRpc>, config: &ConfirmConfig) -> Self {
        Self::new(rpc, config.tezos.into())
    }

    /// Sets the classifier used to flag collectibles.
    pub fn with_classifier(mut self, classifier: Arc<dyn AssetClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// The tier step.
    pub fn step(&self) -> FeeStep {
        self.step
    }

    async fn estimates(
        &self,
        payload: &TezosPayload,
        previous: Option<&TezosSnapshot>,
        signer: &ReadOnlySigner,
    ) -> Result<Vec<TezosEstimate>, EstimationError> {
        if let Some(estimates) = payload.usable_estimates() {
            return Ok(estimates.to_vec());
        }
        if let Some(previous) = previous {
            return Ok(previous.baseline.estimates.clone());
        }
        debug!(target: "confirm::tezos", "estimating through the node");
        estimate::estimate_operations(self.rpc.as_ref(), signer, &payload.operations).await
    }

    async fn simulate(
        &self,
        head: &BlockHead,
        contents: &[OperationContent],
    ) -> Result<Vec<ContentResult>, SimulationError> {
        let results = self
            .rpc
            .simulate_operations(head, contents)
            .await
            .map_err(|err| SimulationError::rpc(&err))?;
        if let Some((index, status)) =
            results.iter().enumerate().find_map(|(index, result)| Some((index, result.failure()?)))
        {
            return Err(SimulationError::NotApplied { index, status: status.to_string() });
        }
        Ok(results)
    }

    /// Simulates the batch, retries once with the estimated values, then falls back to the
    /// declared operations.
    async fn balances_changes(
        &self,
        head: &BlockHead,
        contents: &[OperationContent],
        reduced: &[OperationContent],
        payload: &TezosPayload,
        source: &str,
    ) -> (BalancesChanges, BalancesSource) {
        let classifier = self.classifier.as_ref();
        let err = match self.simulate(head, contents).await {
            Ok(results) => {
                let changes = balances::from_simulation(source, contents, &results, classifier);
                return (changes, BalancesSource::Simulation);
            }
            Err(err) => err,
        };
        debug!(target: "confirm::tezos", %err, "simulation failed, retrying with estimated limits");

        match self.simulate(head, reduced).await {
            Ok(results) => {
                let changes = balances::from_simulation(source, reduced, &results, classifier);
                (changes, BalancesSource::Simulation)
            }
            Err(err) => {
                warn!(target: "confirm::tezos", %err, "simulation failed, using declared operations");
                let changes = balances::from_operations(source, &payload.operations, classifier);
                (changes, BalancesSource::Declared)
            }
        }
    }
}

#[async_trait]
impl Pipeline for TezosPipeline {
    type Input = TezosInput;
    type Snapshot = TezosSnapshot;

    async fn estimate(
        &self,
        input: TezosInput,
        previous: Option<Arc<TezosSnapshot>>,
    ) -> Result<TezosSnapshot, PipelineError> {
        let TezosInput { payload, overrides } = input;
        if let Some(err) = &payload.error {
            return Err(EstimationError::External(err.clone()).into());
        }
        let (Some(pkh), Some(public_key)) = (&payload.source_pkh, &payload.source_public_key)
        else {
            return Err(EstimationError::SourceUnknown.into());
        };
        let signer = ReadOnlySigner::new(pkh.as_str(), public_key.as_str()).map_err(|err| {
            warn!(target: "confirm::tezos", %err, "unusable source");
            EstimationError::SourceUnknown
        })?;

        let estimates = self.estimates(&payload, previous.as_deref(), &signer).await?;
        let operations = payload.operations.len();
        let baseline = TezosFeeBaseline::from_estimates(&estimates, operations);
        let options = TezosFeeOptions::new(&baseline, self.step);
        let fee = overrides.resolve_fee(&options);
        let storage_limit = overrides.resolve_storage_limit(&baseline);
        let has_reveal = baseline.has_reveal(operations);

        let forged =
            self.forge(&signer, &payload, &estimates, has_reveal, fee, storage_limit).await;
        let batch = match forged {
            Ok(batch) => batch,
            // A forged snapshot stays until the node forges again.
            Err(err) if previous.as_deref().is_some_and(TezosSnapshot::is_forged) => {
                return Err(PipelineError::Forge(display_chain(&err)));
            }
            Err(err) => {
                let err = display_chain(&err);
                warn!(target: "confirm::tezos", %err, "publishing fees of an unforged batch");
                let balances_changes = balances::from_operations(
                    signer.public_key_hash(),
                    &payload.operations,
                    self.classifier.as_ref(),
                );
                return Ok(TezosSnapshot {
                    baseline,
                    options,
                    fee,
                    storage_limit,
                    forged_bytes: String::new(),
                    contents: Vec::new(),
                    balances_changes,
                    balances_source: BalancesSource::Declared,
                });
            }
        };

        let (balances_changes, balances_source) = self
            .balances_changes(
                &batch.head,
                &batch.contents,
                &batch.reduced,
                &payload,
                signer.public_key_hash(),
            )
            .await;

        Ok(TezosSnapshot {
            baseline,
            options,
            fee,
            storage_limit,
            forged_bytes: batch.forged_bytes,
            contents: batch.contents,
            balances_changes,
            balances_source,
        })
    }
}

/// A batch laid out and forged at a given head.
struct Forged {
    head: BlockHead,
    contents: Vec<OperationContent>,
    reduced: Vec<OperationContent>,
    forged_bytes: String,
}

impl TezosPipeline {
    /// Fetches head and counter, lays out the contents with the resolved totals and forges them.
    async fn forge(
        &self,
        signer: &ReadOnlySigner,
        payload: &TezosPayload,
        estimates: &[TezosEstimate],
        has_reveal: bool,
        fee: u64,
        storage_limit: u64,
    ) -> eyre::Result<Forged> {
        let head = self.rpc.head().await?;
        let counter = self.rpc.counter(signer.public_key_hash()).await?;

        let batch = Batch {
            signer,
            counter,
            operations: &payload.operations,
            estimates,
            has_reveal,
        };
        let contents = batch.contents(Some((fee, storage_limit)));
        let forged_bytes = self.rpc.forge_operations(&head.hash, &contents).await?;
        trace!(target: "confirm::tezos", fee, storage_limit, bytes = forged_bytes.len() / 2, "forged");

        Ok(Forged { reduced: batch.contents(None), head, contents, forged_bytes })
    }
}

/// Everything needed to lay out the contents of a batch.
struct Batch<'a> {
    signer: &'a dyn TezosSigner,
    counter: u64,
    operations: &'a [TezosOperation],
    estimates: &'a [TezosEstimate],
    has_reveal: bool,
}

impl Batch<'_> {
    /// Builds the contents, reveal first.
    ///
    /// With `totals`, the total fee and storage limit are spread over the contents in proportion
    /// to their estimates. Without, every content uses its own estimate.
    fn contents(&self, totals: Option<(u64, u64)>) -> Vec<OperationContent> {
        let reveal = self.has_reveal.then(|| {
            TezosOperation::new(OperationKind::Reveal {
                public_key: self.signer.public_key().to_string(),
            })
        });
        let operations: Vec<&TezosOperation> =
            reveal.iter().chain(self.operations.iter()).collect();

        let estimate_of = |index: usize| self.estimates.get(index).copied().unwrap_or_default();
        let estimated = |f: fn(&TezosEstimate) -> u64| -> Vec<u64> {
            (0..operations.len()).map(|index| f(&estimate_of(index))).collect()
        };
        let (fees, storage_limits) = match totals {
            Some((fee, storage_limit)) => (
                distribute(fee, &estimated(|e| e.suggested_fee)),
                distribute(storage_limit, &estimated(|e| e.storage_limit)),
            ),
            None => (estimated(|e| e.suggested_fee), estimated(|e| e.storage_limit)),
        };

        operations
            .into_iter()
            .enumerate()
            .map(|(index, operation)| {
                let estimate = estimate_of(index);
                let gas_limit = match estimate.gas_limit {
                    0 => operation.gas_limit.unwrap_or(estimate::HARD_GAS_LIMIT_PER_OPERATION),
                    gas_limit => gas_limit,
                };
                OperationContent {
                    kind: operation.kind.clone(),
                    source: self.signer.public_key_hash().to_string(),
                    fee: fees[index],
                    counter: self.counter + 1 + index as u64,
                    gas_limit,
                    storage_limit: storage_limits[index],
                }
            })
            .collect()
    }
}

/// Splits `total` in proportion to `weights`; the rounding remainder goes to the last share.
///
/// Zero weights everywhere put the whole total on the last share.
pub fn distribute(total: u64, weights: &[u64]) -> Vec<u64> {
    let Some(last) = weights.len().checked_sub(1) else { return Vec::new() };
    let sum: u128 = weights.iter().map(|weight| *weight as u128).sum();
    let mut shares: Vec<u64> = if sum == 0 {
        vec![0; weights.len()]
    } else {
        weights.iter().map(|weight| (total as u128 * *weight as u128 / sum) as u64).collect()
    };
    let assigned: u64 = shares.iter().sum();
    shares[last] += total - assigned;
    shares
}
