//! Read-only Tezos node interface and the parts of its responses the pipeline reads.

use super::{OperationContent, TransactionParameters};
use async_trait::async_trait;
use confirm_common::serde_helpers::{string_i64, string_u64_opt};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Head block of the chain, used as the branch of forged operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHead {
    /// Block hash.
    pub hash: String,
    /// Chain id.
    pub chain_id: String,
    /// Block level.
    pub level: u64,
}

/// The node requests the pipeline needs.
///
/// Implementations own transport concerns such as timeouts and retries; every failure is
/// reported as an [`eyre::Report`].
#[async_trait]
pub trait TezosRpc: Send + Sync {
    /// Fetches the current head.
    async fn head(&self) -> eyre::Result<BlockHead>;

    /// Fetches the current counter of a manager account.
    async fn counter(&self, pkh: &str) -> eyre::Result<u64>;

    /// Fetches the revealed public key of a manager account, `None` if it is not revealed yet.
    async fn manager_key(&self, pkh: &str) -> eyre::Result<Option<String>>;

    /// Forges unsigned contents on top of `branch`, returning the hex encoded bytes.
    async fn forge_operations(
        &self,
        branch: &str,
        contents: &[OperationContent],
    ) -> eyre::Result<String>;

    /// Simulates unsigned contents against the head, returning one result per content.
    async fn simulate_operations(
        &self,
        head: &BlockHead,
        contents: &[OperationContent],
    ) -> eyre::Result<Vec<ContentResult>>;
}

/// Application status of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Applied.
    Applied,
    /// Failed on its own.
    Failed,
    /// Not attempted because an earlier operation failed.
    Skipped,
    /// Applied, then rolled back because a later operation failed.
    Backtracked,
}

impl OperationStatus {
    /// The node's name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Backtracked => "backtracked",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A balance movement reported by the node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    /// `contract` for account balances; freezers and burns use other kinds.
    pub kind: String,
    /// The account, for `contract` updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    /// Signed change in mutez.
    #[serde(with = "string_i64")]
    pub change: i64,
}

impl BalanceUpdate {
    /// Returns the change if this update moves the balance of `account`.
    pub fn change_of(&self, account: &str) -> Option<i64> {
        (self.kind == "contract" && self.contract.as_deref() == Some(account)).then_some(self.change)
    }
}

/// Result of applying one operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the operation was applied.
    pub status: OperationStatus,
    /// Balance movements caused by the operation, fees excluded.
    #[serde(default)]
    pub balance_updates: Vec<BalanceUpdate>,
    /// Consumed gas in milligas.
    #[serde(default, with = "string_u64_opt", skip_serializing_if = "Option::is_none")]
    pub consumed_milligas: Option<u64>,
    /// Newly paid storage in bytes.
    #[serde(default, with = "string_u64_opt", skip_serializing_if = "Option::is_none")]
    pub paid_storage_size_diff: Option<u64>,
    /// Whether the operation allocated a new implicit account.
    #[serde(default)]
    pub allocated_destination_contract: bool,
    /// Contracts originated by the operation.
    #[serde(default)]
    pub originated_contracts: Vec<String>,
    /// Errors reported by the node, kept raw.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<serde_json::Value>,
}

impl OperationResult {
    /// An applied result without side effects.
    pub fn applied() -> Self {
        Self::with_status(OperationStatus::Applied)
    }

    /// A result with the given status and no side effects.
    pub fn with_status(status: OperationStatus) -> Self {
        Self {
            status,
            balance_updates: Vec::new(),
            consumed_milligas: None,
            paid_storage_size_diff: None,
            allocated_destination_contract: false,
            originated_contracts: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Number of storage allocations charged at the fixed origination size.
    pub fn allocations(&self) -> u64 {
        self.originated_contracts.len() as u64 + u64::from(self.allocated_destination_contract)
    }
}

/// An operation emitted by a contract while applying a content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalOperationResult {
    /// Emitting contract.
    pub source: String,
    /// Operation kind.
    pub kind: String,
    /// Destination of internal transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Amount of internal transactions, in mutez.
    #[serde(default, with = "string_u64_opt", skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    /// Entrypoint call of internal transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<TransactionParameters>,
    /// Application result.
    pub result: OperationResult,
}

/// Simulation result of one content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentResult {
    /// Kind of the simulated content.
    pub kind: String,
    /// Result of the content itself.
    pub operation_result: OperationResult,
    /// Operations emitted by contracts while applying the content.
    #[serde(default)]
    pub internal_operation_results: Vec<InternalOperationResult>,
}

impl ContentResult {
    /// A result for a content of `kind` with the given application result.
    pub fn new(kind: impl Into<String>, operation_result: OperationResult) -> Self {
        Self { kind: kind.into(), operation_result, internal_operation_results: Vec::new() }
    }

    /// Every application result of the content, its internal operations included.
    pub fn results(&self) -> impl Iterator<Item = &OperationResult> {
        std::iter::once(&self.operation_result)
            .chain(self.internal_operation_results.iter().map(|internal| &internal.result))
    }

    /// The first status that is not `applied`, if any.
    pub fn failure(&self) -> Option<OperationStatus> {
        self.results().map(|result| result.status).find(|status| *status != OperationStatus::Applied)
    }

    /// Total consumed milligas of the content and its internal operations.
    pub fn consumed_milligas(&self) -> u64 {
        self.results().filter_map(|result| result.consumed_milligas).sum()
    }

    /// Total newly paid storage of the content and its internal operations.
    pub fn paid_storage_size_diff(&self) -> u64 {
        self.results().filter_map(|result| result.paid_storage_size_diff).sum()
    }

    /// Total storage allocations of the content and its internal operations.
    pub fn allocations(&self) -> u64 {
        self.results().map(OperationResult::allocations).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_content_result() {
        let result: ContentResult = serde_json::from_value(json!({
            "kind": "transaction",
            "operation_result": {
                "status": "applied",
                "balance_updates": [
                    { "kind": "contract", "contract": "tz1src", "change": "-1500", "origin": "block" },
                    { "kind": "contract", "contract": "tz1dst", "change": "1500", "origin": "block" }
                ],
                "consumed_milligas": "100000",
                "allocated_destination_contract": true
            },
            "internal_operation_results": [{
                "source": "KT1a",
                "kind": "transaction",
                "destination": "KT1b",
                "amount": "0",
                "nonce": 0,
                "result": { "status": "backtracked", "consumed_milligas": "2500" }
            }]
        }))
        .unwrap();

        assert_eq!(result.operation_result.balance_updates[0].change_of("tz1src"), Some(-1500));
        assert_eq!(result.operation_result.balance_updates[1].change_of("tz1src"), None);
        assert_eq!(result.consumed_milligas(), 102_500);
        assert_eq!(result.allocations(), 1);
        assert_eq!(result.failure(), Some(OperationStatus::Backtracked));
    }
}
