//! Display fee estimation
//!
//! The estimate shown next to a pending transaction is a fixed fraction of
//! the amount, expressed in wei. It is advisory only. What the network
//! actually charges is priced by [`NetworkFeeParams`], fetched fresh at
//! submission time, and the two are never derived from each other.

use alloy_primitives::utils::format_ether;
use alloy_primitives::U256;
use std::fmt;

/// Display fee as basis points of the transaction amount (0.5%)
pub const DISPLAY_FEE_BPS: u64 = 50;

const BPS_DENOMINATOR: u64 = 10_000;
const WEI_PER_UNIT: u64 = 1_000_000_000_000_000_000;

/// Estimated display fee in wei
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FeeEstimate {
    wei: U256,
}

impl FeeEstimate {
    pub fn wei(&self) -> U256 {
        self.wei
    }

    /// Fee formatted in ether, as displayed to the user
    pub fn to_ether_string(&self) -> String {
        format_ether(self.wei)
    }
}

impl fmt::Display for FeeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", self.to_ether_string())
    }
}

/// Computes the display fee for a transaction amount
#[derive(Clone, Copy, Debug)]
pub struct FeeEstimator {
    bps: u64,
}

impl FeeEstimator {
    pub fn new() -> Self {
        Self {
            bps: DISPLAY_FEE_BPS,
        }
    }

    /// Estimated fee for `amount` ledger units
    ///
    /// Linear in `amount`; `estimate(0)` is zero.
    pub fn estimate(&self, amount: u64) -> FeeEstimate {
        let wei = U256::from(amount) * U256::from(WEI_PER_UNIT) * U256::from(self.bps)
            / U256::from(BPS_DENOMINATOR);
        FeeEstimate { wei }
    }
}

impl Default for FeeEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Gas parameters attached to a state-mutating ledger call
///
/// `gas_price` is the network's current fee rate, fetched immediately
/// before submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkFeeParams {
    pub gas_limit: u64,
    pub gas_price: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hundred_units_cost_half_an_ether() {
        let fee = FeeEstimator::new().estimate(100);
        assert_eq!(fee.wei(), U256::from(500_000_000_000_000_000u64));
        assert!(fee.to_ether_string().starts_with("0.5"));
    }

    #[test]
    fn test_estimate_is_linear() {
        let estimator = FeeEstimator::default();
        assert_eq!(estimator.estimate(0), FeeEstimate::default());
        for amount in [1u64, 3, 100, 12_345, u32::MAX as u64, u64::MAX / 2] {
            assert_eq!(
                estimator.estimate(2 * amount).wei(),
                estimator.estimate(amount).wei() * U256::from(2)
            );
        }
    }

    #[test]
    fn test_estimate_handles_largest_amount() {
        let fee = FeeEstimator::new().estimate(u64::MAX);
        assert_eq!(
            fee.wei(),
            U256::from(u64::MAX) * U256::from(5_000_000_000_000_000u64)
        );
    }
}
