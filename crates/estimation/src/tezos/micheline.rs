//! Recognition of FA1.2 and FA2 `transfer` calls in Micheline arguments.

use super::TransactionParameters;
use alloy_primitives::U256;
use serde_json::Value;

/// A token movement requested by a `transfer` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenTransfer {
    /// Token contract.
    pub contract: String,
    /// Token id, `0` for FA1.2 tokens.
    pub token_id: U256,
    /// Sender.
    pub from: String,
    /// Receiver.
    pub to: String,
    /// Amount in atomic units.
    pub amount: U256,
}

/// Extracts the token transfers requested by a call of `contract`.
///
/// Returns nothing for calls that are not FA1.2 or FA2 `transfer`s. Addresses encoded as bytes
/// (optimized Micheline) are not recognised.
pub fn token_transfers(contract: &str, parameters: &TransactionParameters) -> Vec<TokenTransfer> {
    if parameters.entrypoint != "transfer" {
        return Vec::new();
    }
    match &parameters.value {
        Value::Array(batches) => fa2_transfers(contract, batches).unwrap_or_default(),
        value => fa12_transfer(contract, value).into_iter().collect(),
    }
}

/// `(pair (address :from) (pair (address :to) (nat :value)))`
fn fa12_transfer(contract: &str, value: &Value) -> Option<TokenTransfer> {
    let [from, to, amount] = comb(value)?[..] else { return None };
    Some(TokenTransfer {
        contract: contract.to_string(),
        token_id: U256::ZERO,
        from: string(from)?,
        to: string(to)?,
        amount: int(amount)?,
    })
}

/// `(list (pair (address :from_) (list (pair (address :to_) (pair (nat :token_id) (nat :amount))))))`
fn fa2_transfers(contract: &str, batches: &[Value]) -> Option<Vec<TokenTransfer>> {
    let mut transfers = Vec::new();
    for batch in batches {
        let [from, Value::Array(txs)] = comb(batch)?[..] else { return None };
        let from = string(from)?;
        for tx in txs {
            let [to, token_id, amount] = comb(tx)?[..] else { return None };
            transfers.push(TokenTransfer {
                contract: contract.to_string(),
                token_id: int(token_id)?,
                from: from.clone(),
                to: string(to)?,
                amount: int(amount)?,
            });
        }
    }
    Some(transfers)
}

/// Flattens a right comb of `Pair`s into its leaves.
fn comb(value: &Value) -> Option<Vec<&Value>> {
    let args = pair_args(value)?;
    let mut leaves = Vec::with_capacity(args.len() + 1);
    let (last, init) = args.split_last()?;
    leaves.extend(init);
    match comb(last) {
        Some(rest) => leaves.extend(rest),
        None => leaves.push(last),
    }
    Some(leaves)
}

fn pair_args(value: &Value) -> Option<&Vec<Value>> {
    let object = value.as_object()?;
    if object.get("prim")?.as_str()? != "Pair" {
        return None;
    }
    object.get("args")?.as_array()
}

fn string(value: &Value) -> Option<String> {
    value.get("string")?.as_str().map(str::to_string)
}

fn int(value: &Value) -> Option<U256> {
    value.get("int")?.as_str()?.parse().ok()
}
