//! Canonical unsigned encoding of a resolved transaction.

use super::GasPrice;
use alloy_consensus::{SignableTransaction, TxEip1559, TxEip2930, TxLegacy};
use alloy_primitives::{Bytes, TxKind};
use alloy_rpc_types::TransactionRequest;

/// Transaction type id of EIP-2930 transactions.
const EIP2930_TX_TYPE_ID: u8 = 1;

/// Encodes `tx` the way it will be signed: EIP-155 RLP for legacy transactions, EIP-2718 typed
/// envelopes otherwise.
///
/// Returns `None` while the chain id, nonce, gas limit or price is missing, and for transaction
/// types that cannot be built from a request alone (blob and set-code transactions).
pub fn serialize_unsigned(tx: &TransactionRequest) -> Option<Bytes> {
    let chain_id = tx.chain_id?;
    let nonce = tx.nonce?;
    let gas_limit = tx.gas?;
    let price = GasPrice::from_request(tx)?;
    let to = tx.to.unwrap_or(TxKind::Create);
    let value = tx.value.unwrap_or_default();
    let input = tx.input.input().cloned().unwrap_or_default();
    let access_list = tx.access_list.clone().unwrap_or_default();

    let encoded = match price {
        GasPrice::Legacy { gas_price }
            if tx.transaction_type == Some(EIP2930_TX_TYPE_ID) || tx.access_list.is_some() =>
        {
            TxEip2930 { chain_id, nonce, gas_price, gas_limit, to, value, access_list, input }
                .encoded_for_signing()
        }
        GasPrice::Legacy { gas_price } => {
            TxLegacy { chain_id: Some(chain_id), nonce, gas_price, gas_limit, to, value, input }
                .encoded_for_signing()
        }
        GasPrice::Eip1559 { .. } if tx.transaction_type.is_some_and(|ty| ty > 2) => {
            debug!(target: "confirm::evm", ty = ?tx.transaction_type, "no local encoding");
            return None;
        }
        GasPrice::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => TxEip1559 {
            chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            to,
            value,
            access_list,
            input,
        }
        .encoded_for_signing(),
    };
    Some(encoded.into())
}
