//! Estimates derived from a simulation at the protocol's hard limits.

use super::{
    ContentResult, OperationContent, OperationKind, TezosEstimate, TezosOperation, TezosRpc,
    TezosSigner,
};
use confirm_common::EstimationError;

/// Gas limit of a single operation.
pub const HARD_GAS_LIMIT_PER_OPERATION: u64 = 1_040_000;
/// Storage limit of a single operation.
pub const HARD_STORAGE_LIMIT_PER_OPERATION: u64 = 60_000;
/// Gas added on top of the consumed gas.
pub const GAS_BUFFER: u64 = 100;
/// Storage paid for every allocated account or originated contract.
pub const ORIGINATION_SIZE: u64 = 257;
/// Burn per byte of storage, in mutez.
pub const COST_PER_BYTE: u64 = 250;
/// Base of the minimal fee, in mutez.
pub const MINIMAL_FEE: u64 = 100;
/// Minimal fee per gas unit, in nanotez.
pub const MINIMAL_NANOTEZ_PER_GAS: u64 = 100;
/// Minimal fee per byte, in mutez.
pub const MINIMAL_MUTEZ_PER_BYTE: u64 = 1;
/// Size of the signature appended to every batch.
const SIGNATURE_SIZE: u64 = 64;

/// Estimates `operations` by simulating them without fees at the hard limits.
///
/// A reveal is prepended, and estimated first, when the source has not revealed its key yet.
pub(crate) async fn estimate_operations(
    rpc: &dyn TezosRpc,
    signer: &dyn TezosSigner,
    operations: &[TezosOperation],
) -> Result<Vec<TezosEstimate>, EstimationError> {
    let pkh = signer.public_key_hash();
    let network = |err: eyre::Report| EstimationError::network(&err);

    let head = rpc.head().await.map_err(network)?;
    let counter = rpc.counter(pkh).await.map_err(network)?;
    let revealed = rpc.manager_key(pkh).await.map_err(network)?.is_some();

    let kinds = (!revealed)
        .then(|| OperationKind::Reveal { public_key: signer.public_key().to_string() })
        .into_iter()
        .chain(operations.iter().map(|operation| operation.kind.clone()));
    let contents: Vec<_> = kinds
        .zip(counter + 1..)
        .map(|(kind, counter)| OperationContent {
            kind,
            source: pkh.to_string(),
            fee: 0,
            counter,
            gas_limit: HARD_GAS_LIMIT_PER_OPERATION,
            storage_limit: HARD_STORAGE_LIMIT_PER_OPERATION,
        })
        .collect();
    if contents.is_empty() {
        return Ok(Vec::new());
    }

    let forged = rpc.forge_operations(&head.hash, &contents).await.map_err(network)?;
    let results = rpc.simulate_operations(&head, &contents).await.map_err(network)?;
    if results.len() != contents.len() {
        return Err(EstimationError::Rejected(format!(
            "expected {} results, got {}",
            contents.len(),
            results.len()
        )));
    }
    if let Some((index, status)) =
        results.iter().enumerate().find_map(|(index, result)| Some((index, result.failure()?)))
    {
        return Err(EstimationError::Rejected(format!("operation #{index} {status}")));
    }

    let bytes = (forged.len() as u64 / 2 + SIGNATURE_SIZE).div_ceil(contents.len() as u64);
    let estimates = results.iter().map(|result| estimate_from_result(result, bytes)).collect();
    trace!(target: "confirm::tezos", ?estimates, revealed, "estimated from simulation");
    Ok(estimates)
}

/// Turns the simulated consumption of one content into an estimate.
pub fn estimate_from_result(result: &ContentResult, bytes: u64) -> TezosEstimate {
    let gas_limit = result.consumed_milligas().div_ceil(1000) + GAS_BUFFER;
    let storage_limit = result.paid_storage_size_diff() + result.allocations() * ORIGINATION_SIZE;
    TezosEstimate {
        suggested_fee: minimal_fee(gas_limit, bytes),
        burn_fee: storage_limit * COST_PER_BYTE,
        gas_limit,
        storage_limit,
    }
}

/// Fee a baker accepts for an operation of the given gas and size.
pub fn minimal_fee(gas_limit: u64, bytes: u64) -> u64 {
    MINIMAL_FEE + (gas_limit * MINIMAL_NANOTEZ_PER_GAS).div_ceil(1000) + bytes * MINIMAL_MUTEZ_PER_BYTE
}
