//! Engine configuration.
//!
//! All tunable thresholds live here with validated defaults, so deployments
//! can adjust peg sensitivity, liquidation priority weights, and safety
//! margins without touching engine code.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::ledger::AccountId;

/// Tunable parameters for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Absolute peg deviation tolerated before any adjustment
    pub peg_epsilon: Decimal,

    /// Percentage deviation above which a peg is in warning state
    pub warning_threshold_pct: Decimal,

    /// Percentage deviation above which a peg is critical
    pub critical_threshold_pct: Decimal,

    /// Percentage deviation that triggers the emergency circuit breaker
    pub emergency_threshold_pct: Decimal,

    /// Upper bound for mint/burn fees
    pub max_fee: Decimal,

    /// Upper bound for algorithmic rewards/penalties
    pub max_incentive: Decimal,

    /// Percentage deviation at which the fee adjustment factor saturates
    pub fee_sensitivity_pct: Decimal,

    /// Incentive added per percentage point of deviation
    pub incentive_step: Decimal,

    /// Ratio buffer above the minimum inside which a position counts as at risk
    pub at_risk_margin: Decimal,

    /// Multiple of the target ratio above which minting more is recommended
    pub mint_headroom_factor: Decimal,

    /// Liquidation priority weight on (1 - health score)
    pub priority_weight_health: Decimal,

    /// Liquidation priority weight on normalized debt size
    pub priority_weight_debt: Decimal,

    /// Liquidation priority weight on interaction staleness
    pub priority_weight_staleness: Decimal,

    /// Debt size treated as priority 1.0 when normalizing
    pub priority_debt_normalization: u64,

    /// Staleness treated as priority 1.0 (one week)
    pub priority_staleness_saturation_hours: i64,

    /// Supply utilization above which structural recommendations fire
    pub supply_utilization_warning: Decimal,

    /// Identity used by the auto-liquidation sweep
    pub system_liquidator: AccountId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            peg_epsilon: dec!(0.01),
            warning_threshold_pct: dec!(1.0),
            critical_threshold_pct: dec!(5.0),
            emergency_threshold_pct: dec!(20.0),
            max_fee: dec!(0.10),
            max_incentive: dec!(0.10),
            fee_sensitivity_pct: dec!(10.0),
            incentive_step: dec!(0.01),
            at_risk_margin: dec!(0.05),
            mint_headroom_factor: dec!(2.0),
            priority_weight_health: dec!(0.6),
            priority_weight_debt: dec!(0.3),
            priority_weight_staleness: dec!(0.1),
            priority_debt_normalization: 1_000_000,
            priority_staleness_saturation_hours: 168,
            supply_utilization_warning: dec!(0.8),
            system_liquidator: AccountId::new("system:liquidator"),
        }
    }
}

impl EngineConfig {
    /// Validate that the configuration is internally consistent
    pub fn validate(&self) -> bool {
        self.peg_epsilon > Decimal::ZERO
            && self.warning_threshold_pct < self.critical_threshold_pct
            && self.critical_threshold_pct < self.emergency_threshold_pct
            && self.max_fee > Decimal::ZERO
            && self.max_fee <= Decimal::ONE
            && self.max_incentive > Decimal::ZERO
            && self.fee_sensitivity_pct > Decimal::ZERO
            && self.at_risk_margin >= Decimal::ZERO
            && self.mint_headroom_factor > Decimal::ONE
            && self.priority_weight_health
                + self.priority_weight_debt
                + self.priority_weight_staleness
                == Decimal::ONE
            && self.priority_debt_normalization > 0
            && self.priority_staleness_saturation_hours > 0
    }

    /// Override the emergency threshold (test setup)
    pub fn with_emergency_threshold_pct(mut self, pct: Decimal) -> Self {
        self.emergency_threshold_pct = pct;
        self
    }

    /// Override the system liquidator identity
    pub fn with_system_liquidator(mut self, account: AccountId) -> Self {
        self.system_liquidator = account;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate());
    }

    #[test]
    fn test_bad_thresholds_fail_validation() {
        let mut config = EngineConfig::default();
        config.critical_threshold_pct = dec!(0.5); // below warning
        assert!(!config.validate());
    }

    #[test]
    fn test_priority_weights_must_sum_to_one() {
        let mut config = EngineConfig::default();
        config.priority_weight_debt = dec!(0.5);
        assert!(!config.validate());
    }
}
