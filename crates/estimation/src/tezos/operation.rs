//! Tezos manager operations as requested by a dApp and as sent to the node.

use confirm_common::serde_helpers::{string_u64, string_u64_opt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entrypoint call attached to a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionParameters {
    /// Called entrypoint, `default` if the contract has a single one.
    pub entrypoint: String,
    /// Micheline argument, JSON encoded.
    pub value: Value,
}

/// The kind specific part of a manager operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationKind {
    /// Transfer of tez, optionally calling a contract.
    Transaction {
        /// Receiving account or contract.
        destination: String,
        /// Amount in mutez.
        #[serde(default, with = "string_u64")]
        amount: u64,
        /// Contract call, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parameters: Option<TransactionParameters>,
    },
    /// Sets or withdraws the delegate of the source.
    Delegation {
        /// New delegate, `None` withdraws the delegation.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delegate: Option<String>,
    },
    /// Deploys a contract.
    Origination {
        /// Initial balance of the contract in mutez.
        #[serde(default, with = "string_u64")]
        balance: u64,
        /// Code and initial storage.
        script: Value,
    },
    /// Publishes the public key of the source.
    Reveal {
        /// Base58 encoded public key.
        public_key: String,
    },
}

impl OperationKind {
    /// Name of the kind as used by the node.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transaction { .. } => "transaction",
            Self::Delegation { .. } => "delegation",
            Self::Origination { .. } => "origination",
            Self::Reveal { .. } => "reveal",
        }
    }
}

/// A manager operation of a pending batch, with the limits declared by the requester.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TezosOperation {
    /// What the operation does.
    #[serde(flatten)]
    pub kind: OperationKind,
    /// Declared fee in mutez.
    #[serde(default, with = "string_u64_opt", skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
    /// Declared gas limit.
    #[serde(default, with = "string_u64_opt", skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Declared storage limit in bytes.
    #[serde(default, with = "string_u64_opt", skip_serializing_if = "Option::is_none")]
    pub storage_limit: Option<u64>,
}

impl TezosOperation {
    /// Creates an operation without declared limits.
    pub fn new(kind: OperationKind) -> Self {
        Self { kind, fee: None, gas_limit: None, storage_limit: None }
    }

    /// Plain tez transfer.
    pub fn transfer(destination: impl Into<String>, amount: u64) -> Self {
        Self::new(OperationKind::Transaction {
            destination: destination.into(),
            amount,
            parameters: None,
        })
    }

    /// Contract call.
    pub fn call(
        destination: impl Into<String>,
        amount: u64,
        entrypoint: impl Into<String>,
        value: Value,
    ) -> Self {
        Self::new(OperationKind::Transaction {
            destination: destination.into(),
            amount,
            parameters: Some(TransactionParameters { entrypoint: entrypoint.into(), value }),
        })
    }
}

/// Per-operation estimate, as produced by the requester or by a simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosEstimate {
    /// Suggested baker fee in mutez.
    #[serde(with = "string_u64")]
    pub suggested_fee: u64,
    /// Storage burn in mutez.
    #[serde(default, with = "string_u64")]
    pub burn_fee: u64,
    /// Gas limit.
    #[serde(default, with = "string_u64")]
    pub gas_limit: u64,
    /// Storage limit in bytes.
    #[serde(default, with = "string_u64")]
    pub storage_limit: u64,
}

/// A fully specified manager operation, ready to be forged or simulated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationContent {
    /// What the operation does.
    #[serde(flatten)]
    pub kind: OperationKind,
    /// Source account.
    pub source: String,
    /// Fee in mutez.
    #[serde(with = "string_u64")]
    pub fee: u64,
    /// Counter of the source.
    #[serde(with = "string_u64")]
    pub counter: u64,
    /// Gas limit.
    #[serde(with = "string_u64")]
    pub gas_limit: u64,
    /// Storage limit in bytes.
    #[serde(with = "string_u64")]
    pub storage_limit: u64,
}
