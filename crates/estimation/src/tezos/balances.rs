//! Balance changes of the source of a Tezos batch.

use super::{
    ContentResult, OperationContent, OperationKind, TezosOperation, TransactionParameters, micheline,
};
use crate::balances::{AssetClassifier, BalancesChanges, TEZ_SLUG, token_slug};
use alloy_primitives::{I256, U256};

/// Computes the changes reported by a successful simulation.
///
/// Tez changes come from the balance updates of the source, token changes from the `transfer`
/// calls of the contents and of the internal operations. Fees are not included.
pub fn from_simulation(
    source: &str,
    contents: &[OperationContent],
    results: &[ContentResult],
    classifier: &dyn AssetClassifier,
) -> BalancesChanges {
    let mut changes = BalancesChanges::new();

    for (content, result) in contents.iter().zip(results) {
        for update in result.results().flat_map(|result| &result.balance_updates) {
            if let Some(change) = update.change_of(source) {
                changes.add(TEZ_SLUG, I256::try_from(change).unwrap_or_default(), false);
            }
        }

        if let OperationKind::Transaction { destination, parameters: Some(parameters), .. } =
            &content.kind
        {
            record_transfers(&mut changes, source, destination, parameters, classifier);
        }
        for internal in &result.internal_operation_results {
            if let (Some(destination), Some(parameters)) = (&internal.destination, &internal.parameters)
            {
                record_transfers(&mut changes, source, destination, parameters, classifier);
            }
        }
    }

    changes
}

/// Best-effort changes computed from the declared operations, used when simulation failed.
pub fn from_operations(
    source: &str,
    operations: &[TezosOperation],
    classifier: &dyn AssetClassifier,
) -> BalancesChanges {
    let mut changes = BalancesChanges::new();

    for operation in operations {
        match &operation.kind {
            OperationKind::Transaction { destination, amount, parameters } => {
                if destination != source {
                    changes.debit(TEZ_SLUG, U256::from(*amount), false);
                }
                if let Some(parameters) = parameters {
                    record_transfers(&mut changes, source, destination, parameters, classifier);
                }
            }
            OperationKind::Origination { balance, .. } => {
                changes.debit(TEZ_SLUG, U256::from(*balance), false);
            }
            OperationKind::Delegation { .. } | OperationKind::Reveal { .. } => {}
        }
    }

    changes
}

fn record_transfers(
    changes: &mut BalancesChanges,
    source: &str,
    contract: &str,
    parameters: &TransactionParameters,
    classifier: &dyn AssetClassifier,
) {
    for transfer in micheline::token_transfers(contract, parameters) {
        let slug = token_slug(&transfer.contract, transfer.token_id);
        let is_collectible = classifier.is_collectible(&slug);
        if transfer.from == source {
            changes.debit(slug.clone(), transfer.amount, is_collectible);
        }
        if transfer.to == source {
            changes.credit(slug, transfer.amount, is_collectible);
        }
    }
}
