use super::GasPrice;
use alloy_primitives::Address;
use alloy_rpc_types::TransactionRequest;
use serde::{Deserialize, Serialize};

/// Gas values suggested for a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmGasSuggestion {
    /// Suggested price per gas.
    pub gas_price: GasPrice,
    /// Suggested gas limit.
    pub gas_limit: u64,
    /// Next nonce of the sender, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

/// A pending EVM transaction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmPayload {
    /// Sender; falls back to `tx.from`.
    #[serde(default)]
    pub from: Option<Address>,
    /// Chain the transaction is for; falls back to `tx.chain_id`, then to the node.
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Transaction skeleton as requested.
    pub tx: TransactionRequest,
    /// Gas values computed by the requester.
    #[serde(default)]
    pub suggestion: Option<EvmGasSuggestion>,
    /// Estimation error reported by the requester.
    #[serde(default)]
    pub error: Option<String>,
}

impl EvmPayload {
    /// Creates a payload for `tx` sent by `from`.
    pub fn new(from: Address, tx: TransactionRequest) -> Self {
        Self { from: Some(from), tx, ..Default::default() }
    }

    /// The sender, if known.
    pub fn sender(&self) -> Option<Address> {
        self.from.or(self.tx.from)
    }

    /// Returns `true` for a value transfer without calldata.
    pub fn is_plain_transfer(&self) -> bool {
        self.tx.to.is_some_and(|to| to.is_call())
            && self.tx.input.input().is_none_or(|input| input.is_empty())
    }
}
