//! Simulated effect of a pending operation on the sender's balances.

use alloy_primitives::{I256, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Slug of the Tezos native asset.
pub const TEZ_SLUG: &str = "tez";

/// Slug of the EVM native asset.
pub const ETH_SLUG: &str = "eth";

/// Builds the slug of a token: `<contract>_<token id>`.
pub fn token_slug(contract: impl std::fmt::Display, token_id: U256) -> String {
    format!("{contract}_{token_id}")
}

/// Tells whether an asset is a collectible (NFT).
///
/// Asset metadata lives outside this crate; callers plug their lookup in here.
pub trait AssetClassifier: Send + Sync {
    /// Returns `true` if the asset identified by `slug` is a collectible.
    fn is_collectible(&self, slug: &str) -> bool;
}

impl<F> AssetClassifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_collectible(&self, slug: &str) -> bool {
        self(slug)
    }
}

impl AssetClassifier for HashSet<String> {
    fn is_collectible(&self, slug: &str) -> bool {
        self.contains(slug)
    }
}

/// Classifier that treats every asset as fungible.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCollectibles;

impl AssetClassifier for NoCollectibles {
    fn is_collectible(&self, _slug: &str) -> bool {
        false
    }
}

/// Net change of a single asset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChange {
    /// Signed change in atomic units.
    pub atomic_amount: I256,
    /// Whether the asset is a collectible.
    pub is_collectible: bool,
}

/// Net change per asset slug.
///
/// Always rebuilt from scratch for every simulation; never merged into a previous set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancesChanges(BTreeMap<String, BalanceChange>);

impl BalancesChanges {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` to the change of `slug`.
    pub fn add(&mut self, slug: impl Into<String>, delta: I256, is_collectible: bool) {
        let entry = self.0.entry(slug.into()).or_default();
        entry.atomic_amount = entry.atomic_amount.saturating_add(delta);
        entry.is_collectible |= is_collectible;
    }

    /// Records an incoming amount.
    pub fn credit(&mut self, slug: impl Into<String>, amount: U256, is_collectible: bool) {
        self.add(slug, to_signed(amount), is_collectible);
    }

    /// Records an outgoing amount.
    pub fn debit(&mut self, slug: impl Into<String>, amount: U256, is_collectible: bool) {
        self.add(slug, to_signed(amount).saturating_neg(), is_collectible);
    }

    /// Returns the change of `slug`, if any was recorded.
    pub fn get(&self, slug: &str) -> Option<&BalanceChange> {
        self.0.get(slug)
    }

    /// All recorded changes, including those that net to zero.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BalanceChange)> {
        self.0.iter().map(|(slug, change)| (slug.as_str(), change))
    }

    /// Changes worth displaying: zero nets are left out.
    pub fn non_zero(&self) -> impl Iterator<Item = (&str, &BalanceChange)> {
        self.iter().filter(|(_, change)| !change.atomic_amount.is_zero())
    }

    /// Number of recorded assets, including zero nets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn to_signed(amount: U256) -> I256 {
    I256::try_from(amount).unwrap_or(I256::MAX)
}
