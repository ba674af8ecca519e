//! Balance changes of the sender, diffed from simulated transfer logs.

use crate::balances::{AssetClassifier, BalancesChanges, ETH_SLUG, token_slug};
use alloy_primitives::{Address, Log, U256, address};
use alloy_sol_types::{SolEventInterface, sol};

/// Pseudo-token emitting the `Transfer` logs of native value transfers in `eth_simulateV1`.
pub const NATIVE_TRANSFER_ADDRESS: Address = address!("0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

sol! {
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 amount);
    }

    interface IERC721 {
        event Transfer(address indexed from, address indexed to, uint256 indexed id);
    }

    interface IERC1155 {
        event TransferSingle(address indexed operator, address indexed from, address indexed to, uint256 id, uint256 value);
        event TransferBatch(address indexed operator, address indexed from, address indexed to, uint256[] ids, uint256[] values);
    }
}

/// Nets the transfers of `logs` from and to `account`.
///
/// Native value moves through [`NATIVE_TRANSFER_ADDRESS`]; ERC-721 and ERC-1155 tokens are keyed
/// by token id, ERC-20 tokens by contract.
pub fn from_logs(
    account: Address,
    logs: &[Log],
    classifier: &dyn AssetClassifier,
) -> BalancesChanges {
    let mut diff = Diff { account, classifier, changes: BalancesChanges::new() };

    for log in logs {
        if let Ok(event) = IERC20::IERC20Events::decode_log(log) {
            let IERC20::IERC20Events::Transfer(transfer) = event.data;
            let slug = if log.address == NATIVE_TRANSFER_ADDRESS {
                ETH_SLUG.to_string()
            } else {
                token_slug(log.address, U256::ZERO)
            };
            diff.record(slug, transfer.from, transfer.to, transfer.amount);
        } else if let Ok(event) = IERC721::IERC721Events::decode_log(log) {
            let IERC721::IERC721Events::Transfer(transfer) = event.data;
            let slug = token_slug(log.address, transfer.id);
            diff.record(slug, transfer.from, transfer.to, U256::from(1));
        } else if let Ok(event) = IERC1155::IERC1155Events::decode_log(log) {
            match event.data {
                IERC1155::IERC1155Events::TransferSingle(transfer) => {
                    let slug = token_slug(log.address, transfer.id);
                    diff.record(slug, transfer.from, transfer.to, transfer.value);
                }
                IERC1155::IERC1155Events::TransferBatch(transfer) => {
                    for (id, value) in transfer.ids.iter().zip(&transfer.values) {
                        let slug = token_slug(log.address, *id);
                        diff.record(slug, transfer.from, transfer.to, *value);
                    }
                }
            }
        }
    }

    diff.changes
}

struct Diff<'a> {
    account: Address,
    classifier: &'a dyn AssetClassifier,
    changes: BalancesChanges,
}

impl Diff<'_> {
    fn record(&mut self, slug: String, from: Address, to: Address, amount: U256) {
        if from != self.account && to != self.account {
            return;
        }
        let is_collectible = self.classifier.is_collectible(&slug);
        if from == self.account {
            self.changes.debit(slug.clone(), amount, is_collectible);
        }
        if to == self.account {
            self.changes.credit(slug, amount, is_collectible);
        }
    }
}
