//! Pending operations handed to the core by the confirmation request.

use crate::{evm::EvmPayload, tezos::TezosPayload};
use serde::{Deserialize, Serialize};

/// An unsigned operation awaiting confirmation, tagged by chain kind.
///
/// Held behind an `Arc` for the whole session and never mutated; everything derived from it is
/// recomputed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chain", rename_all = "lowercase")]
pub enum PendingOperationPayload {
    /// A Tezos batch.
    Tezos(TezosPayload),
    /// An EVM transaction.
    Evm(EvmPayload),
}

impl PendingOperationPayload {
    /// The error attached by the requester, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Tezos(payload) => payload.error.as_deref(),
            Self::Evm(payload) => payload.error.as_deref(),
        }
    }
}
