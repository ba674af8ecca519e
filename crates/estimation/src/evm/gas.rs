//! Gas market normalization.
//!
//! Legacy and EIP-2930 transactions pay a flat gas price, EIP-1559 style transactions pay a base
//! fee plus a priority fee capped by a max fee. [`GasPrice`] carries either shape so the rest of
//! the pipeline only ever matches on one type.

use alloy_rpc_types::TransactionRequest;
use serde::{Deserialize, Serialize};

/// Transaction type id of legacy transactions.
const LEGACY_TX_TYPE_ID: u8 = 0;
/// Transaction type id of EIP-2930 (access list) transactions.
const EIP2930_TX_TYPE_ID: u8 = 1;

/// The fee market a transaction takes part in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GasMarket {
    /// A single gas price field.
    Legacy,
    /// Max fee plus max priority fee.
    PriorityFee,
}

impl GasMarket {
    /// Determines the market of an incoming transaction skeleton.
    ///
    /// Explicit transaction types win. Untyped skeletons are legacy only if they carry a gas price
    /// and no EIP-1559 fields.
    pub fn of(tx: &TransactionRequest) -> Self {
        match tx.transaction_type {
            Some(LEGACY_TX_TYPE_ID | EIP2930_TX_TYPE_ID) => Self::Legacy,
            Some(_) => Self::PriorityFee,
            None if tx.gas_price.is_some()
                && tx.max_fee_per_gas.is_none()
                && tx.max_priority_fee_per_gas.is_none() =>
            {
                Self::Legacy
            }
            None => Self::PriorityFee,
        }
    }
}

/// Per-gas price of a transaction in wei.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GasPrice {
    /// Flat gas price.
    #[serde(rename_all = "camelCase")]
    Legacy {
        /// Price per gas.
        gas_price: u128,
    },
    /// EIP-1559 fee caps.
    #[serde(rename_all = "camelCase")]
    Eip1559 {
        /// Maximum total price per gas.
        max_fee_per_gas: u128,
        /// Maximum tip per gas.
        max_priority_fee_per_gas: u128,
    },
}

impl GasPrice {
    /// Creates an EIP-1559 price, defaulting the priority fee to the max fee.
    pub fn eip1559(max_fee_per_gas: u128, max_priority_fee_per_gas: Option<u128>) -> Self {
        let max_priority_fee_per_gas =
            max_priority_fee_per_gas.unwrap_or(max_fee_per_gas).min(max_fee_per_gas);
        Self::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas }
    }

    /// Reads the price fields of a skeleton, if the fields for its market are present.
    pub fn from_request(tx: &TransactionRequest) -> Option<Self> {
        match GasMarket::of(tx) {
            GasMarket::Legacy => tx.gas_price.map(|gas_price| Self::Legacy { gas_price }),
            GasMarket::PriorityFee => tx
                .max_fee_per_gas
                .map(|max_fee| Self::eip1559(max_fee, tx.max_priority_fee_per_gas)),
        }
    }

    /// The market of this price.
    pub fn market(&self) -> GasMarket {
        match self {
            Self::Legacy { .. } => GasMarket::Legacy,
            Self::Eip1559 { .. } => GasMarket::PriorityFee,
        }
    }

    /// The highest price per gas this transaction may pay.
    pub fn max_fee(&self) -> u128 {
        match *self {
            Self::Legacy { gas_price } => gas_price,
            Self::Eip1559 { max_fee_per_gas, .. } => max_fee_per_gas,
        }
    }

    /// The priority fee, if this is an EIP-1559 price.
    pub fn priority_fee(&self) -> Option<u128> {
        match *self {
            Self::Legacy { .. } => None,
            Self::Eip1559 { max_priority_fee_per_gas, .. } => Some(max_priority_fee_per_gas),
        }
    }

    /// Raises every fee field by `step`.
    pub fn raise(&self, step: u128) -> Self {
        match *self {
            Self::Legacy { gas_price } => Self::Legacy { gas_price: gas_price.saturating_add(step) },
            Self::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => Self::Eip1559 {
                max_fee_per_gas: max_fee_per_gas.saturating_add(step),
                max_priority_fee_per_gas: max_priority_fee_per_gas.saturating_add(step),
            },
        }
    }

    /// Lowers every fee field by `step`, never going below zero.
    pub fn lower(&self, step: u128) -> Self {
        match *self {
            Self::Legacy { gas_price } => Self::Legacy { gas_price: gas_price.saturating_sub(step) },
            Self::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => Self::Eip1559 {
                max_fee_per_gas: max_fee_per_gas.saturating_sub(step),
                max_priority_fee_per_gas: max_priority_fee_per_gas.saturating_sub(step),
            },
        }
    }

    /// Replaces the max fee with a user supplied one, keeping the market.
    ///
    /// The priority fee is clamped to the new max fee.
    pub fn with_max_fee(&self, max_fee: u128) -> Self {
        match *self {
            Self::Legacy { .. } => Self::Legacy { gas_price: max_fee },
            Self::Eip1559 { max_priority_fee_per_gas, .. } => Self::Eip1559 {
                max_fee_per_gas: max_fee,
                max_priority_fee_per_gas: max_priority_fee_per_gas.min(max_fee),
            },
        }
    }

    /// Converts the price into the market of `market`, used when a suggestion comes from a source
    /// that disagrees with the transaction type.
    pub fn into_market(self, market: GasMarket) -> Self {
        match (self, market) {
            (Self::Legacy { gas_price }, GasMarket::PriorityFee) => Self::eip1559(gas_price, None),
            (Self::Eip1559 { max_fee_per_gas, .. }, GasMarket::Legacy) => {
                Self::Legacy { gas_price: max_fee_per_gas }
            }
            (price, _) => price,
        }
    }

    /// Writes the price into the matching fields of a transaction request.
    pub fn apply(&self, tx: &mut TransactionRequest) {
        match *self {
            Self::Legacy { gas_price } => {
                tx.gas_price = Some(gas_price);
                tx.max_fee_per_gas = None;
                tx.max_priority_fee_per_gas = None;
            }
            Self::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => {
                tx.gas_price = None;
                tx.max_fee_per_gas = Some(max_fee_per_gas);
                tx.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
            }
        }
    }
}
