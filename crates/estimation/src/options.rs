//! Slow / mid / fast fee tiers derived from a single baseline.
//!
//! `mid` is the baseline itself, `fast` adds one step and `slow` removes one. Steps are a
//! percentage of the baseline with a lower bound, so tiny baselines still produce distinct tiers.
//! `slow` is floored at zero; it may end up below the network suggestion, and that applies to both
//! chain models alike.

use crate::{
    evm::{EvmFeeBaseline, GasPrice},
    tezos::TezosFeeBaseline,
};
use alloy_primitives::U256;
use confirm_common::{
    config::FeeStepConfig,
    units::{ETHER_DECIMALS, TEZ_DECIMALS, to_display},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fee preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeOptionLabel {
    /// Baseline minus one step.
    Slow,
    /// The baseline.
    Mid,
    /// Baseline plus one step.
    Fast,
}

impl FeeOptionLabel {
    /// All labels, cheapest first.
    pub const ALL: [Self; 3] = [Self::Slow, Self::Mid, Self::Fast];

    /// Lowercase name of the label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Mid => "mid",
            Self::Fast => "fast",
        }
    }
}

impl fmt::Display for FeeOptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per [`FeeOptionLabel`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTiers<T> {
    /// Cheapest tier.
    pub slow: T,
    /// Baseline tier.
    pub mid: T,
    /// Most expensive tier.
    pub fast: T,
}

impl<T> FeeTiers<T> {
    /// Returns the value of `label`.
    pub fn get(&self, label: FeeOptionLabel) -> &T {
        match label {
            FeeOptionLabel::Slow => &self.slow,
            FeeOptionLabel::Mid => &self.mid,
            FeeOptionLabel::Fast => &self.fast,
        }
    }

    /// Maps every tier.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> FeeTiers<U> {
        FeeTiers { slow: f(&self.slow), mid: f(&self.mid), fast: f(&self.fast) }
    }

    /// Iterates over the tiers, cheapest first.
    pub fn iter(&self) -> impl Iterator<Item = (FeeOptionLabel, &T)> {
        FeeOptionLabel::ALL.into_iter().map(move |label| (label, self.get(label)))
    }
}

impl<T: Clone> FeeTiers<T> {
    /// Resolves the value to use: an explicit custom value, else the selected tier, else `mid`.
    pub fn resolve(&self, custom: Option<T>, selected: Option<FeeOptionLabel>) -> T {
        custom.unwrap_or_else(|| self.get(selected.unwrap_or(FeeOptionLabel::Mid)).clone())
    }
}

/// Display-unit fee of every tier.
pub type DisplayedFeeOptions = FeeTiers<String>;

/// Step size used to derive the tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeStep {
    percent: u128,
    min_step: u128,
}

impl FeeStep {
    /// Creates a step of `percent` of the baseline, at least `min_step`.
    pub const fn new(percent: u64, min_step: u64) -> Self {
        Self { percent: percent as u128, min_step: min_step as u128 }
    }

    /// The step for the given baseline.
    pub fn step(&self, base: u128) -> u128 {
        (base.saturating_mul(self.percent) / 100).max(self.min_step)
    }

    /// Tier values around `base`.
    pub fn tiers(&self, base: u128) -> FeeTiers<u128> {
        let step = self.step(base);
        FeeTiers { slow: base.saturating_sub(step), mid: base, fast: base.saturating_add(step) }
    }
}

impl From<FeeStepConfig> for FeeStep {
    fn from(config: FeeStepConfig) -> Self {
        Self::new(config.step_percent, config.min_step)
    }
}

/// Tiered Tezos fees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TezosFeeOptions {
    /// Fee of every tier, in mutez.
    pub fees: FeeTiers<u64>,
    /// Fee of every tier, in tez.
    pub displayed: DisplayedFeeOptions,
}

/// Derives the fee tiers from a Tezos baseline.
///
/// Returns `None` while the baseline is not known.
pub fn tezos_fee_options(
    baseline: Option<&TezosFeeBaseline>,
    step: FeeStep,
) -> Option<TezosFeeOptions> {
    baseline.map(|baseline| TezosFeeOptions::new(baseline, step))
}

impl TezosFeeOptions {
    /// Derives the tiers of a known baseline.
    pub fn new(baseline: &TezosFeeBaseline, step: FeeStep) -> Self {
        let fees = step
            .tiers(baseline.gas_fee as u128)
            .map(|fee| u64::try_from(*fee).unwrap_or(u64::MAX));
        let displayed = fees.map(|fee| to_display(U256::from(*fee), TEZ_DECIMALS));
        Self { fees, displayed }
    }
}

/// Tiered EVM gas prices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmFeeOptions {
    /// Gas price of every tier.
    pub prices: FeeTiers<GasPrice>,
    /// `gas_limit × max fee` of every tier, in ether.
    pub displayed: DisplayedFeeOptions,
}

/// Derives the gas price tiers from an EVM baseline.
///
/// The step is computed from the max fee and applied to every fee field, so for EIP-1559 prices
/// the max fee and the priority fee move together. Returns `None` while the baseline is not known.
pub fn evm_fee_options(baseline: Option<&EvmFeeBaseline>, step: FeeStep) -> Option<EvmFeeOptions> {
    baseline.map(|baseline| EvmFeeOptions::new(baseline, step))
}

impl EvmFeeOptions {
    /// Derives the tiers of a known baseline.
    pub fn new(baseline: &EvmFeeBaseline, step: FeeStep) -> Self {
        let price = baseline.gas_price;
        let delta = step.step(price.max_fee());
        let prices = FeeTiers { slow: price.lower(delta), mid: price, fast: price.raise(delta) };
        let displayed = prices.map(|price| {
            let fee = U256::from(baseline.gas_limit) * U256::from(price.max_fee());
            to_display(fee, ETHER_DECIMALS)
        });
        Self { prices, displayed }
    }
}
