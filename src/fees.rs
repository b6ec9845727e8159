//! Fee planning: turn the latest fee-market observation and a gas estimate
//! into a concrete plan for one submission attempt. All amounts are integer
//! wei; display conversion happens only at the logging boundary.

pub const GWEI: u128 = 1_000_000_000;

/// Latest observed fee-market data. `base_fee` is `None` on chains that
/// predate the fee market or when the node omits the field.
#[derive(Debug, Clone, Copy)]
pub struct FeeMarket {
    pub base_fee: Option<u128>,
}

/// Gas price and limit for one submission attempt. Never reused across
/// attempts separated by a meaningful time gap; re-plan from a fresh market
/// snapshot instead.
#[derive(Debug, Clone, Copy)]
pub struct FeePlan {
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub priority_fee_per_gas: u128,
    /// True when the limit came from the fallback instead of an estimate
    pub estimate_degraded: bool,
}

impl FeePlan {
    /// Worst-case native cost of the attempt
    pub fn max_cost(&self) -> u128 {
        self.max_fee_per_gas.saturating_mul(self.gas_limit as u128)
    }
}

/// Fee policy knobs. Defaults match the chain this keeper was written for:
/// 2 gwei priority fee, 15 gwei base-fee floor, 1.5x estimation margin and a
/// 200k fallback limit.
#[derive(Debug, Clone, Copy)]
pub struct FeeStrategy {
    pub priority_fee_per_gas: u128,
    pub base_fee_floor: u128,
    pub gas_margin_bps: u64,
    pub fallback_gas_limit: u64,
}

impl Default for FeeStrategy {
    fn default() -> Self {
        Self {
            priority_fee_per_gas: 2 * GWEI,
            base_fee_floor: 15 * GWEI,
            gas_margin_bps: 15_000,
            fallback_gas_limit: 200_000,
        }
    }
}

impl FeeStrategy {
    /// Compute a plan from a fee-market snapshot and an optional gas
    /// estimate.
    ///
    /// The max fee is `base_fee + priority_fee`; when the node reports no
    /// base fee the configured floor substitutes, preferring underpricing
    /// risk over total inaction. The gas limit scales the estimate by the
    /// margin, rounding up so it never lands below the estimate; a missing
    /// estimate falls back to the static limit and flags the plan so the
    /// executor can log degraded confidence.
    pub fn plan(&self, market: FeeMarket, estimated_gas: Option<u64>) -> FeePlan {
        let base_fee = market.base_fee.unwrap_or(self.base_fee_floor);
        let max_fee_per_gas = base_fee.saturating_add(self.priority_fee_per_gas);

        let (gas_limit, estimate_degraded) = match estimated_gas {
            Some(units) => {
                let scaled =
                    (units as u128 * self.gas_margin_bps as u128).div_ceil(10_000);
                // an absurd estimate saturates instead of wrapping
                (u64::try_from(scaled).unwrap_or(u64::MAX), false)
            }
            None => (self.fallback_gas_limit, true),
        };

        FeePlan {
            gas_limit,
            max_fee_per_gas,
            priority_fee_per_gas: self.priority_fee_per_gas,
            estimate_degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_fee_is_base_plus_priority() {
        let strategy = FeeStrategy::default();
        let plan = strategy.plan(
            FeeMarket {
                base_fee: Some(25 * GWEI),
            },
            Some(100_000),
        );
        assert_eq!(plan.max_fee_per_gas, 27 * GWEI);
        assert_eq!(plan.priority_fee_per_gas, 2 * GWEI);
    }

    #[test]
    fn gas_limit_scales_estimate_with_ceiling() {
        let strategy = FeeStrategy::default();
        let plan = strategy.plan(FeeMarket { base_fee: Some(GWEI) }, Some(100_000));
        assert_eq!(plan.gas_limit, 150_000);
        assert!(!plan.estimate_degraded);

        // 33_333 * 1.5 = 49_999.5, must round up
        let plan = strategy.plan(FeeMarket { base_fee: Some(GWEI) }, Some(33_333));
        assert_eq!(plan.gas_limit, 50_000);
    }

    #[test]
    fn pathological_estimate_saturates_instead_of_wrapping() {
        let strategy = FeeStrategy::default();
        let plan = strategy.plan(FeeMarket { base_fee: Some(GWEI) }, Some(u64::MAX));
        // u64::MAX * 1.5 overflows u64; the limit must clamp, not truncate
        assert_eq!(plan.gas_limit, u64::MAX);
    }

    #[test]
    fn missing_estimate_uses_flagged_fallback() {
        let strategy = FeeStrategy::default();
        let plan = strategy.plan(FeeMarket { base_fee: Some(GWEI) }, None);
        assert_eq!(plan.gas_limit, 200_000);
        assert!(plan.estimate_degraded);
    }

    #[test]
    fn missing_base_fee_uses_floor() {
        let strategy = FeeStrategy::default();
        let plan = strategy.plan(FeeMarket { base_fee: None }, Some(50_000));
        assert_eq!(plan.max_fee_per_gas, 17 * GWEI);
    }

    #[test]
    fn max_cost_is_fee_times_limit() {
        let plan = FeePlan {
            gas_limit: 150_000,
            max_fee_per_gas: 10 * GWEI,
            priority_fee_per_gas: 2 * GWEI,
            estimate_degraded: false,
        };
        assert_eq!(plan.max_cost(), 150_000u128 * 10 * GWEI);
    }
}
