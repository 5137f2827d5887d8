//! Peg deviation measurement and adjustment calculations.
//!
//! Pure functions: given a deviation and the current parameters they produce
//! the adjusted values, clamped to their configured bounds. Persisting the
//! results is the controller's job.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::config::EngineConfig;
use crate::core::stablecoin::StablecoinParams;
use crate::utils::math::clamp_fee;

// ═══════════════════════════════════════════════════════════════════════════════
// PEG DEVIATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Which side of the peg the market price sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PegDirection {
    /// Market price above target
    Above,
    /// Market price below target
    Below,
    /// Market price exactly at target
    At,
}

/// Measured deviation of market price from the peg target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PegDeviation {
    /// Market price minus target price
    pub deviation: Decimal,
    /// Deviation as a percentage of the target
    pub percentage: Decimal,
    /// Side of the peg
    pub direction: PegDirection,
    /// Whether the deviation is inside the tolerated band
    pub within_threshold: bool,
    /// Observed market price
    pub market_price: Decimal,
    /// Peg target price
    pub target_price: Decimal,
}

impl PegDeviation {
    /// Measure a market price against its target with a tolerance band
    pub fn measure(market_price: Decimal, target_price: Decimal, epsilon: Decimal) -> Self {
        let deviation = market_price - target_price;
        let percentage = deviation / target_price * Decimal::ONE_HUNDRED;
        let direction = if deviation > Decimal::ZERO {
            PegDirection::Above
        } else if deviation < Decimal::ZERO {
            PegDirection::Below
        } else {
            PegDirection::At
        };
        Self {
            deviation,
            percentage,
            direction,
            within_threshold: deviation.abs() <= epsilon,
            market_price,
            target_price,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEE ADJUSTMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Adjusted mint/burn fees for the collateralized mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAdjustment {
    /// Mint fee after adjustment
    pub new_mint_fee: Decimal,
    /// Burn fee after adjustment
    pub new_burn_fee: Decimal,
}

/// Fee adjustment as a monotone function of deviation.
///
/// Above the peg the mint fee scales up and the burn fee down; below the peg
/// the directions flip. The adjustment factor saturates at the configured
/// sensitivity and results are clamped to `[0, max_fee]`. Inside the
/// threshold the current fees pass through unchanged.
pub fn calculate_fee_adjustment(
    deviation: &PegDeviation,
    current_mint_fee: Decimal,
    current_burn_fee: Decimal,
    config: &EngineConfig,
) -> FeeAdjustment {
    if deviation.within_threshold {
        return FeeAdjustment {
            new_mint_fee: current_mint_fee,
            new_burn_fee: current_burn_fee,
        };
    }

    let factor = (deviation.percentage.abs() / config.fee_sensitivity_pct).min(Decimal::ONE);
    let up = Decimal::ONE + factor;
    let down = Decimal::ONE - factor;

    let (new_mint_fee, new_burn_fee) = match deviation.direction {
        PegDirection::Above => (current_mint_fee * up, current_burn_fee * down),
        PegDirection::Below => (current_mint_fee * down, current_burn_fee * up),
        PegDirection::At => (current_mint_fee, current_burn_fee),
    };

    FeeAdjustment {
        new_mint_fee: clamp_fee(new_mint_fee, config.max_fee),
        new_burn_fee: clamp_fee(new_burn_fee, config.max_fee),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUPPLY INCENTIVES
// ═══════════════════════════════════════════════════════════════════════════════

/// Recommended supply direction for the algorithmic mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyAction {
    /// Expand supply: reward minting
    Mint,
    /// Contract supply: reward burning
    Burn,
    /// Deviation inside the band, no incentive
    Hold,
}

/// Supply incentives for the algorithmic mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyIncentives {
    /// Which side to incentivize
    pub recommended_action: SupplyAction,
    /// Incentive offered for the recommended action
    pub reward: Decimal,
    /// Penalty applied to the opposite action
    pub penalty: Decimal,
}

/// Supply incentives as a monotone function of deviation: a price below the
/// peg rewards burning to contract supply, above the peg rewards minting to
/// expand it. Incentives are clamped to `[0, max_incentive]`.
pub fn calculate_supply_incentives(
    deviation: &PegDeviation,
    config: &EngineConfig,
) -> SupplyIncentives {
    if deviation.within_threshold {
        return SupplyIncentives {
            recommended_action: SupplyAction::Hold,
            reward: Decimal::ZERO,
            penalty: Decimal::ZERO,
        };
    }

    let incentive = clamp_fee(
        deviation.percentage.abs() * config.incentive_step,
        config.max_incentive,
    );

    match deviation.direction {
        PegDirection::Below => SupplyIncentives {
            recommended_action: SupplyAction::Burn,
            reward: incentive,
            penalty: Decimal::ZERO,
        },
        PegDirection::Above => SupplyIncentives {
            recommended_action: SupplyAction::Mint,
            reward: incentive,
            penalty: Decimal::ZERO,
        },
        PegDirection::At => SupplyIncentives {
            recommended_action: SupplyAction::Hold,
            reward: Decimal::ZERO,
            penalty: Decimal::ZERO,
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTION RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Kind of action a stability run took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityActionKind {
    /// Mint/burn fees were adjusted
    AdjustFees,
    /// Algorithmic supply incentives were adjusted
    AdjustIncentives,
    /// Minting was disabled by the circuit breaker
    PauseMinting,
    /// Mint fee was pushed to its maximum bound
    MaxMintFee,
}

impl StabilityActionKind {
    /// Stable identifier for audit consumers
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdjustFees => "adjust_fees",
            Self::AdjustIncentives => "adjust_incentives",
            Self::PauseMinting => "pause_minting",
            Self::MaxMintFee => "max_mint_fee",
        }
    }
}

/// Audit record of one action taken by a stability run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityAction {
    /// What was done
    pub action: StabilityActionKind,
    /// Why it was done
    pub reason: String,
    /// When it was done
    pub timestamp: DateTime<Utc>,
    /// Parameters before
    pub before: StablecoinParams,
    /// Parameters after
    pub after: StablecoinParams,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_measure_above_peg() {
        let deviation = PegDeviation::measure(dec!(1.05), dec!(1.0), dec!(0.01));
        assert_eq!(deviation.deviation, dec!(0.05));
        assert_eq!(deviation.percentage, dec!(5.0));
        assert_eq!(deviation.direction, PegDirection::Above);
        assert!(!deviation.within_threshold);
    }

    #[test]
    fn test_measure_below_peg() {
        let deviation = PegDeviation::measure(dec!(0.97), dec!(1.0), dec!(0.01));
        assert_eq!(deviation.deviation, dec!(-0.03));
        assert_eq!(deviation.percentage, dec!(-3.0));
        assert_eq!(deviation.direction, PegDirection::Below);
        assert!(!deviation.within_threshold);
    }

    #[test]
    fn test_measure_within_threshold() {
        let deviation = PegDeviation::measure(dec!(1.005), dec!(1.0), dec!(0.01));
        assert_eq!(deviation.direction, PegDirection::Above);
        assert!(deviation.within_threshold);
    }

    #[test]
    fn test_fees_unchanged_within_threshold() {
        let deviation = PegDeviation::measure(dec!(1.005), dec!(1.0), dec!(0.01));
        let adjustment =
            calculate_fee_adjustment(&deviation, dec!(0.01), dec!(0.01), &config());
        assert_eq!(adjustment.new_mint_fee, dec!(0.01));
        assert_eq!(adjustment.new_burn_fee, dec!(0.01));
    }

    #[test]
    fn test_fees_above_peg() {
        // 5% above peg with sensitivity 10 gives a 0.5 factor
        let deviation = PegDeviation::measure(dec!(1.05), dec!(1.0), dec!(0.01));
        let adjustment =
            calculate_fee_adjustment(&deviation, dec!(0.01), dec!(0.01), &config());
        assert_eq!(adjustment.new_mint_fee, dec!(0.015));
        assert_eq!(adjustment.new_burn_fee, dec!(0.005));
    }

    #[test]
    fn test_fees_below_peg_mirror() {
        let deviation = PegDeviation::measure(dec!(0.95), dec!(1.0), dec!(0.01));
        let adjustment =
            calculate_fee_adjustment(&deviation, dec!(0.01), dec!(0.01), &config());
        assert_eq!(adjustment.new_mint_fee, dec!(0.005));
        assert_eq!(adjustment.new_burn_fee, dec!(0.015));
    }

    #[test]
    fn test_fee_adjustment_clamps_to_max() {
        // 30% above peg saturates the factor; fees stay within [0, max_fee]
        let deviation = PegDeviation::measure(dec!(1.30), dec!(1.0), dec!(0.01));
        let adjustment =
            calculate_fee_adjustment(&deviation, dec!(0.08), dec!(0.01), &config());
        assert_eq!(adjustment.new_mint_fee, dec!(0.10));
        assert_eq!(adjustment.new_burn_fee, Decimal::ZERO);
    }

    #[test]
    fn test_fee_adjustment_monotone_in_deviation() {
        let small = PegDeviation::measure(dec!(1.02), dec!(1.0), dec!(0.01));
        let large = PegDeviation::measure(dec!(1.08), dec!(1.0), dec!(0.01));
        let a = calculate_fee_adjustment(&small, dec!(0.01), dec!(0.01), &config());
        let b = calculate_fee_adjustment(&large, dec!(0.01), dec!(0.01), &config());
        assert!(b.new_mint_fee > a.new_mint_fee);
        assert!(b.new_burn_fee < a.new_burn_fee);
    }

    #[test]
    fn test_incentives_below_peg_recommend_burn() {
        let deviation = PegDeviation::measure(dec!(0.95), dec!(1.0), dec!(0.01));
        let incentives = calculate_supply_incentives(&deviation, &config());
        assert_eq!(incentives.recommended_action, SupplyAction::Burn);
        assert_eq!(incentives.reward, dec!(0.05));
        assert_eq!(incentives.penalty, Decimal::ZERO);
    }

    #[test]
    fn test_incentives_above_peg_recommend_mint() {
        let deviation = PegDeviation::measure(dec!(1.03), dec!(1.0), dec!(0.01));
        let incentives = calculate_supply_incentives(&deviation, &config());
        assert_eq!(incentives.recommended_action, SupplyAction::Mint);
        assert_eq!(incentives.reward, dec!(0.03));
    }

    #[test]
    fn test_incentives_clamped() {
        let deviation = PegDeviation::measure(dec!(0.50), dec!(1.0), dec!(0.01));
        let incentives = calculate_supply_incentives(&deviation, &config());
        assert_eq!(incentives.reward, dec!(0.10));
    }

    #[test]
    fn test_incentives_hold_within_threshold() {
        let deviation = PegDeviation::measure(dec!(1.001), dec!(1.0), dec!(0.01));
        let incentives = calculate_supply_incentives(&deviation, &config());
        assert_eq!(incentives.recommended_action, SupplyAction::Hold);
        assert_eq!(incentives.reward, Decimal::ZERO);
    }
}
