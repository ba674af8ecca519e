use super::TezosEstimate;
use serde::{Deserialize, Serialize};

/// Fee baseline of a Tezos batch, in mutez.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TezosFeeBaseline {
    /// Sum of the suggested baker fees, the reveal included.
    pub gas_fee: u64,
    /// Sum of the storage burns.
    pub burn_fee: u64,
    /// `gas_fee + burn_fee`.
    pub total_fee: u64,
    /// Fee plus burn of the reveal, `0` if the source is already revealed.
    pub reveal_fee: u64,
    /// Sum of the storage limits, in bytes.
    pub storage_limit: u64,
    /// The estimates the baseline was computed from, reveal first if present.
    pub estimates: Vec<TezosEstimate>,
}

impl TezosFeeBaseline {
    /// Folds per-operation estimates into a baseline.
    ///
    /// When there is one more estimate than there are operations, the first estimate belongs to
    /// the reveal the node will require before the batch.
    pub fn from_estimates(estimates: &[TezosEstimate], operations: usize) -> Self {
        let reveal_fee = match estimates.first() {
            Some(reveal) if estimates.len() > operations => {
                reveal.suggested_fee.saturating_add(reveal.burn_fee)
            }
            _ => 0,
        };
        let sum = |f: fn(&TezosEstimate) -> u64| {
            estimates.iter().map(f).fold(0u64, |acc, value| acc.saturating_add(value))
        };
        let gas_fee = sum(|e| e.suggested_fee);
        let burn_fee = sum(|e| e.burn_fee);

        Self {
            gas_fee,
            burn_fee,
            total_fee: gas_fee.saturating_add(burn_fee),
            reveal_fee,
            storage_limit: sum(|e| e.storage_limit),
            estimates: estimates.to_vec(),
        }
    }

    /// Returns `true` if the estimates include a reveal.
    pub fn has_reveal(&self, operations: usize) -> bool {
        self.estimates.len() > operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(suggested_fee: u64, burn_fee: u64, storage_limit: u64) -> TezosEstimate {
        TezosEstimate { suggested_fee, burn_fee, storage_limit, gas_limit: 1_000 }
    }

    #[test]
    fn sums_estimates() {
        let baseline = TezosFeeBaseline::from_estimates(
            &[estimate(100, 0, 0), estimate(200, 64_250, 257), estimate(300, 250, 1)],
            3,
        );
        assert_eq!(baseline.gas_fee, 600);
        assert_eq!(baseline.burn_fee, 64_500);
        assert_eq!(baseline.total_fee, 65_100);
        assert_eq!(baseline.storage_limit, 258);
        assert_eq!(baseline.reveal_fee, 0);
        assert!(!baseline.has_reveal(3));
    }

    #[test]
    fn extra_leading_estimate_is_the_reveal() {
        let estimates = [estimate(374, 0, 0), estimate(100, 0, 0), estimate(200, 0, 0)];
        let baseline = TezosFeeBaseline::from_estimates(&estimates, 2);
        assert_eq!(baseline.reveal_fee, 374);
        assert_eq!(baseline.gas_fee, 674);
        assert_eq!(baseline.total_fee, 674);
        assert!(baseline.has_reveal(2));

        let baseline = TezosFeeBaseline::from_estimates(&estimates, 3);
        assert_eq!(baseline.reveal_fee, 0);
    }

    #[test]
    fn empty_estimates() {
        assert_eq!(TezosFeeBaseline::from_estimates(&[], 0), TezosFeeBaseline::default());
    }
}
