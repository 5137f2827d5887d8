//! Stability mechanism controller.
//!
//! Monitors peg deviation per stablecoin and dispatches the configured
//! mechanism: the collateralized path persists fee adjustments, the
//! algorithmic path persists supply incentives, hybrid does both. Every
//! parameter change is recorded as an audit action and surfaced as a domain
//! event.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::CollateralAnalytics;
use crate::core::config::EngineConfig;
use crate::core::stablecoin::Stablecoin;
use crate::error::{Error, Result};
use crate::events::{DomainEvent, StabilityMechanismAppliedEvent};
use crate::oracle::RateOracle;
use crate::stability::adjustments::{
    calculate_fee_adjustment, calculate_supply_incentives, FeeAdjustment, PegDeviation,
    PegDirection, StabilityAction, StabilityActionKind, SupplyAction, SupplyIncentives,
};
use crate::store::StablecoinStore;
use crate::utils::math::collateral_ratio;

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Classified peg state for monitoring sweeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PegHealth {
    /// Deviation inside the warning threshold
    Healthy,
    /// Deviation between the warning and critical thresholds
    Warning,
    /// Deviation beyond the critical threshold
    Critical,
    /// Deviation could not be measured (oracle failure)
    Unknown,
}

/// One stablecoin's entry in a peg monitoring sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PegStatus {
    /// Stablecoin code
    pub stablecoin_code: String,
    /// Measured deviation, when the oracle answered
    pub deviation: Option<PegDeviation>,
    /// Classified health
    pub health: PegHealth,
    /// Oracle error, when the measurement failed
    pub error: Option<String>,
}

/// Result of a mechanism run or emergency trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityOutcome {
    /// The deviation that drove the run
    pub deviation: PegDeviation,
    /// Audit records of the actions taken, in order
    pub actions: Vec<StabilityAction>,
    /// Stablecoin aggregate after the run
    pub stablecoin: Stablecoin,
    /// Events raised by this call
    pub events: Vec<DomainEvent>,
}

/// Structural (non-automatic) recommendation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityRecommendationKind {
    /// Raise the target collateral ratio
    IncreaseCollateralRequirements,
    /// Encourage users to deposit more collateral
    IncentivizeCollateralDeposits,
    /// Lower the supply cap
    ReduceMaxSupply,
    /// Strengthen burn incentives to shrink supply
    IncreaseBurnIncentives,
}

/// A structural recommendation for operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityRecommendation {
    /// What to consider doing
    pub action: StabilityRecommendationKind,
    /// Why
    pub reason: String,
    /// Relevant current value, when one exists
    pub current: Option<Decimal>,
    /// Relevant target value, when one exists
    pub target: Option<Decimal>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABILITY CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Peg-deviation monitoring and parameter adjustment
#[derive(Clone)]
pub struct StabilityController {
    oracle: Arc<dyn RateOracle>,
    stablecoins: Arc<dyn StablecoinStore>,
    analytics: CollateralAnalytics,
    config: EngineConfig,
}

impl StabilityController {
    /// Create the controller over its injected dependencies
    pub fn new(
        oracle: Arc<dyn RateOracle>,
        stablecoins: Arc<dyn StablecoinStore>,
        analytics: CollateralAnalytics,
        config: EngineConfig,
    ) -> Self {
        Self {
            oracle,
            stablecoins,
            analytics,
            config,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MEASUREMENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Measure a stablecoin's market price against its peg target
    pub fn check_peg_deviation(&self, stablecoin_code: &str) -> Result<PegDeviation> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;
        let market_price = self
            .oracle
            .rate(&stablecoin.code, &stablecoin.peg_asset_code)?;
        Ok(PegDeviation::measure(
            market_price,
            stablecoin.target_price,
            self.config.peg_epsilon,
        ))
    }

    /// Fee adjustment the collateralized mechanism would apply right now
    pub fn calculate_fee_adjustment(&self, stablecoin_code: &str) -> Result<FeeAdjustment> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;
        let deviation = self.check_peg_deviation(stablecoin_code)?;
        Ok(calculate_fee_adjustment(
            &deviation,
            stablecoin.mint_fee,
            stablecoin.burn_fee,
            &self.config,
        ))
    }

    /// Supply incentives the algorithmic mechanism would apply right now
    pub fn calculate_supply_incentives(&self, stablecoin_code: &str) -> Result<SupplyIncentives> {
        let deviation = self.check_peg_deviation(stablecoin_code)?;
        Ok(calculate_supply_incentives(&deviation, &self.config))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MECHANISM DISPATCH
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run the configured stability mechanism once and persist whatever it
    /// adjusted. Inside the threshold nothing changes and no event fires.
    pub fn apply_stability_mechanism(
        &self,
        stablecoin_code: &str,
        now: DateTime<Utc>,
    ) -> Result<StabilityOutcome> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;
        let deviation = self.check_peg_deviation(stablecoin_code)?;
        let params_before = stablecoin.params();
        let mut actions = Vec::new();

        if deviation.within_threshold {
            return Ok(StabilityOutcome {
                deviation,
                actions,
                stablecoin,
                events: Vec::new(),
            });
        }

        let reason = format!(
            "price {} peg by {}%",
            match deviation.direction {
                PegDirection::Above => "above",
                PegDirection::Below => "below",
                PegDirection::At => "at",
            },
            deviation.percentage.abs().round_dp(2)
        );

        let mechanism = stablecoin.mechanism;
        let fee_adjustment = calculate_fee_adjustment(
            &deviation,
            stablecoin.mint_fee,
            stablecoin.burn_fee,
            &self.config,
        );
        let incentives = calculate_supply_incentives(&deviation, &self.config);

        let updated = self.stablecoins.apply(stablecoin_code, &mut |coin| {
            if mechanism.uses_fees()
                && (fee_adjustment.new_mint_fee != coin.mint_fee
                    || fee_adjustment.new_burn_fee != coin.burn_fee)
            {
                let before = coin.params();
                coin.mint_fee = fee_adjustment.new_mint_fee;
                coin.burn_fee = fee_adjustment.new_burn_fee;
                actions.push(StabilityAction {
                    action: StabilityActionKind::AdjustFees,
                    reason: reason.clone(),
                    timestamp: now,
                    before,
                    after: coin.params(),
                });
            }

            if mechanism.uses_incentives() {
                let before = coin.params();
                let (mint_reward, burn_penalty) = match incentives.recommended_action {
                    SupplyAction::Mint => (incentives.reward, Decimal::ZERO),
                    SupplyAction::Burn => (Decimal::ZERO, incentives.reward),
                    SupplyAction::Hold => (Decimal::ZERO, Decimal::ZERO),
                };
                if coin.algo_mint_reward != mint_reward || coin.algo_burn_penalty != burn_penalty {
                    coin.algo_mint_reward = mint_reward;
                    coin.algo_burn_penalty = burn_penalty;
                    actions.push(StabilityAction {
                        action: StabilityActionKind::AdjustIncentives,
                        reason: reason.clone(),
                        timestamp: now,
                        before,
                        after: coin.params(),
                    });
                }
            }
            Ok(())
        })?;

        let events = if actions.is_empty() {
            Vec::new()
        } else {
            tracing::info!(
                stablecoin = %stablecoin_code,
                mechanism = %mechanism,
                deviation_pct = %deviation.percentage,
                actions = actions.len(),
                "stability mechanism applied"
            );
            vec![DomainEvent::StabilityMechanismApplied(
                StabilityMechanismAppliedEvent {
                    stablecoin_code: stablecoin_code.to_string(),
                    deviation_pct: deviation.percentage,
                    params_before,
                    params_after: updated.params(),
                    actions: actions.iter().map(|a| a.action.as_str().to_string()).collect(),
                    timestamp: now,
                },
            )]
        };

        Ok(StabilityOutcome {
            deviation,
            actions,
            stablecoin: updated,
            events,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MONITORING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Classify every active stablecoin's peg. Oracle failures degrade the
    /// entry to `Unknown` rather than failing the sweep.
    pub fn monitor_all_pegs(&self) -> Result<Vec<PegStatus>> {
        let mut statuses = Vec::new();
        for stablecoin in self.stablecoins.list_active()? {
            match self.check_peg_deviation(&stablecoin.code) {
                Ok(deviation) => {
                    let magnitude = deviation.percentage.abs();
                    let health = if magnitude <= self.config.warning_threshold_pct {
                        PegHealth::Healthy
                    } else if magnitude <= self.config.critical_threshold_pct {
                        PegHealth::Warning
                    } else {
                        PegHealth::Critical
                    };
                    statuses.push(PegStatus {
                        stablecoin_code: stablecoin.code.clone(),
                        deviation: Some(deviation),
                        health,
                        error: None,
                    });
                }
                Err(err @ Error::RateUnavailable { .. }) => {
                    tracing::warn!(code = %stablecoin.code, error = %err, "peg check failed");
                    statuses.push(PegStatus {
                        stablecoin_code: stablecoin.code.clone(),
                        deviation: None,
                        health: PegHealth::Unknown,
                        error: Some(err.to_string()),
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(statuses)
    }

    /// Protective circuit breaker for extreme deviations: beyond the
    /// emergency threshold minting is disabled and the mint fee pushed to
    /// its maximum bound. Not a normal stability adjustment.
    pub fn execute_emergency_actions(
        &self,
        stablecoin_code: &str,
        now: DateTime<Utc>,
    ) -> Result<StabilityOutcome> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;
        let deviation = self.check_peg_deviation(stablecoin_code)?;
        let params_before = stablecoin.params();
        let mut actions = Vec::new();

        if deviation.percentage.abs() <= self.config.emergency_threshold_pct {
            return Ok(StabilityOutcome {
                deviation,
                actions,
                stablecoin,
                events: Vec::new(),
            });
        }

        let reason = format!(
            "extreme price deviation: {}% from peg",
            deviation.percentage.round_dp(2)
        );
        let max_fee = self.config.max_fee;

        let updated = self.stablecoins.apply(stablecoin_code, &mut |coin| {
            if coin.minting_enabled {
                let before = coin.params();
                coin.minting_enabled = false;
                actions.push(StabilityAction {
                    action: StabilityActionKind::PauseMinting,
                    reason: reason.clone(),
                    timestamp: now,
                    before,
                    after: coin.params(),
                });
            }
            if coin.mint_fee != max_fee {
                let before = coin.params();
                coin.mint_fee = max_fee;
                actions.push(StabilityAction {
                    action: StabilityActionKind::MaxMintFee,
                    reason: reason.clone(),
                    timestamp: now,
                    before,
                    after: coin.params(),
                });
            }
            Ok(())
        })?;

        tracing::error!(
            stablecoin = %stablecoin_code,
            deviation_pct = %deviation.percentage,
            "emergency actions executed"
        );

        let events = if actions.is_empty() {
            Vec::new()
        } else {
            vec![DomainEvent::StabilityMechanismApplied(
                StabilityMechanismAppliedEvent {
                    stablecoin_code: stablecoin_code.to_string(),
                    deviation_pct: deviation.percentage,
                    params_before,
                    params_after: updated.params(),
                    actions: actions.iter().map(|a| a.action.as_str().to_string()).collect(),
                    timestamp: now,
                },
            )]
        };

        Ok(StabilityOutcome {
            deviation,
            actions,
            stablecoin: updated,
            events,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RECOMMENDATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Structural recommendations that require an operator decision; nothing
    /// here is applied automatically.
    pub fn stability_recommendations(
        &self,
        stablecoin_code: &str,
    ) -> Result<Vec<StabilityRecommendation>> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;
        let mut recommendations = Vec::new();

        if stablecoin.mechanism.uses_fees() {
            let global_ratio = collateral_ratio(
                stablecoin.total_collateral_value,
                stablecoin.total_supply.max(1),
            )
            .unwrap_or(Decimal::ZERO);

            if global_ratio < stablecoin.collateral_ratio {
                recommendations.push(StabilityRecommendation {
                    action: StabilityRecommendationKind::IncreaseCollateralRequirements,
                    reason: "global collateralization below target".into(),
                    current: Some(global_ratio),
                    target: Some(stablecoin.collateral_ratio),
                });
                recommendations.push(StabilityRecommendation {
                    action: StabilityRecommendationKind::IncentivizeCollateralDeposits,
                    reason: "encourage users to add more collateral".into(),
                    current: None,
                    target: None,
                });
            }
        }

        if stablecoin.max_supply > 0 {
            let utilization = stablecoin.supply_utilization();
            if utilization > self.config.supply_utilization_warning {
                recommendations.push(StabilityRecommendation {
                    action: StabilityRecommendationKind::ReduceMaxSupply,
                    reason: "high supply utilization may limit growth".into(),
                    current: Some(utilization),
                    target: Some(self.config.supply_utilization_warning),
                });
                if stablecoin.mechanism.uses_incentives() {
                    recommendations.push(StabilityRecommendation {
                        action: StabilityRecommendationKind::IncreaseBurnIncentives,
                        reason: "reduce supply through algorithmic incentives".into(),
                        current: None,
                        target: None,
                    });
                }
            }
        }

        Ok(recommendations)
    }

    /// Convenience accessor used by embedding hosts to correlate
    /// recommendations with live position data.
    pub fn analytics(&self) -> &CollateralAnalytics {
        &self.analytics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stablecoin::StabilityMechanism;
    use crate::oracle::InMemoryRateOracle;
    use crate::store::{InMemoryPositionStore, InMemoryStablecoinStore};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    struct Fixture {
        controller: StabilityController,
        oracle: Arc<InMemoryRateOracle>,
        stablecoins: Arc<InMemoryStablecoinStore>,
    }

    fn fixture() -> Fixture {
        let oracle = Arc::new(InMemoryRateOracle::new());
        let positions = Arc::new(InMemoryPositionStore::new());
        let stablecoins = Arc::new(InMemoryStablecoinStore::new());
        let config = EngineConfig::default();

        for (code, mechanism) in [
            ("CUSD", StabilityMechanism::Collateralized),
            ("AUSD", StabilityMechanism::Algorithmic),
            ("HUSD", StabilityMechanism::Hybrid),
        ] {
            stablecoins
                .insert(
                    Stablecoin::new(
                        code,
                        code,
                        "USD",
                        mechanism,
                        dec!(1.5),
                        dec!(1.2),
                        dec!(0.1),
                        10_000_000,
                    )
                    .with_fees(dec!(0.01), dec!(0.01)),
                )
                .unwrap();
        }

        let analytics = CollateralAnalytics::new(
            oracle.clone(),
            positions,
            stablecoins.clone(),
            config.clone(),
        );
        let controller =
            StabilityController::new(oracle.clone(), stablecoins.clone(), analytics, config);

        Fixture {
            controller,
            oracle,
            stablecoins,
        }
    }

    #[test]
    fn test_check_peg_deviation_scenario() {
        let fx = fixture();
        fx.oracle.set_rate("CUSD", "USD", dec!(1.05));

        let deviation = fx.controller.check_peg_deviation("CUSD").unwrap();
        assert_eq!(deviation.deviation, dec!(0.05));
        assert_eq!(deviation.percentage, dec!(5.0));
        assert_eq!(deviation.direction, PegDirection::Above);
        assert!(!deviation.within_threshold);
    }

    #[test]
    fn test_check_peg_deviation_oracle_failure() {
        let fx = fixture();
        let err = fx.controller.check_peg_deviation("CUSD").unwrap_err();
        assert!(matches!(err, Error::RateUnavailable { .. }));
    }

    #[test]
    fn test_collateralized_mechanism_adjusts_fees_only() {
        let fx = fixture();
        fx.oracle.set_rate("CUSD", "USD", dec!(1.05));

        let outcome = fx.controller.apply_stability_mechanism("CUSD", t0()).unwrap();
        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(outcome.actions[0].action, StabilityActionKind::AdjustFees);
        assert_eq!(outcome.stablecoin.mint_fee, dec!(0.015));
        assert_eq!(outcome.stablecoin.burn_fee, dec!(0.005));
        assert_eq!(outcome.stablecoin.algo_mint_reward, Decimal::ZERO);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event_type(), "stability.mechanism.applied");
    }

    #[test]
    fn test_algorithmic_mechanism_adjusts_incentives_only() {
        let fx = fixture();
        fx.oracle.set_rate("AUSD", "USD", dec!(0.95));

        let outcome = fx.controller.apply_stability_mechanism("AUSD", t0()).unwrap();
        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(
            outcome.actions[0].action,
            StabilityActionKind::AdjustIncentives
        );
        // Below peg rewards burning
        assert_eq!(outcome.stablecoin.algo_burn_penalty, dec!(0.05));
        assert_eq!(outcome.stablecoin.algo_mint_reward, Decimal::ZERO);
        // Fees untouched by the algorithmic path
        assert_eq!(outcome.stablecoin.mint_fee, dec!(0.01));
    }

    #[test]
    fn test_hybrid_mechanism_applies_both() {
        let fx = fixture();
        fx.oracle.set_rate("HUSD", "USD", dec!(1.05));

        let outcome = fx.controller.apply_stability_mechanism("HUSD", t0()).unwrap();
        let kinds: Vec<_> = outcome.actions.iter().map(|a| a.action).collect();
        assert_eq!(
            kinds,
            vec![
                StabilityActionKind::AdjustFees,
                StabilityActionKind::AdjustIncentives
            ]
        );
        assert_eq!(outcome.stablecoin.mint_fee, dec!(0.015));
        assert_eq!(outcome.stablecoin.algo_mint_reward, dec!(0.05));
    }

    #[test]
    fn test_within_threshold_takes_no_action() {
        let fx = fixture();
        fx.oracle.set_rate("CUSD", "USD", dec!(1.005));

        let outcome = fx.controller.apply_stability_mechanism("CUSD", t0()).unwrap();
        assert!(outcome.actions.is_empty());
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.stablecoin.mint_fee, dec!(0.01));
    }

    #[test]
    fn test_action_records_carry_before_and_after() {
        let fx = fixture();
        fx.oracle.set_rate("CUSD", "USD", dec!(1.05));

        let outcome = fx.controller.apply_stability_mechanism("CUSD", t0()).unwrap();
        let action = &outcome.actions[0];
        assert_eq!(action.before.mint_fee, dec!(0.01));
        assert_eq!(action.after.mint_fee, dec!(0.015));
        assert_eq!(action.timestamp, t0());
        assert!(action.reason.contains("above"));
    }

    #[test]
    fn test_monitor_all_pegs_classifies() {
        let fx = fixture();
        fx.oracle.set_rate("CUSD", "USD", dec!(1.03)); // warning
        fx.oracle.set_rate("AUSD", "USD", dec!(0.90)); // critical
        fx.oracle.set_rate("HUSD", "USD", dec!(1.0)); // healthy

        let statuses = fx.controller.monitor_all_pegs().unwrap();
        let by_code = |code: &str| statuses.iter().find(|s| s.stablecoin_code == code).unwrap();

        assert_eq!(by_code("CUSD").health, PegHealth::Warning);
        assert_eq!(by_code("AUSD").health, PegHealth::Critical);
        assert_eq!(by_code("HUSD").health, PegHealth::Healthy);
    }

    #[test]
    fn test_monitor_degrades_on_oracle_failure() {
        let fx = fixture();
        fx.oracle.set_rate("CUSD", "USD", dec!(1.0));
        fx.oracle.set_rate("HUSD", "USD", dec!(1.0));
        // AUSD has no rate

        let statuses = fx.controller.monitor_all_pegs().unwrap();
        let ausd = statuses
            .iter()
            .find(|s| s.stablecoin_code == "AUSD")
            .unwrap();
        assert_eq!(ausd.health, PegHealth::Unknown);
        assert!(ausd.error.is_some());
        assert_eq!(statuses.len(), 3);
    }

    #[test]
    fn test_emergency_actions_trip_circuit_breaker() {
        let fx = fixture();
        fx.oracle.set_rate("CUSD", "USD", dec!(1.25)); // 25% above peg

        let outcome = fx.controller.execute_emergency_actions("CUSD", t0()).unwrap();
        let kinds: Vec<_> = outcome.actions.iter().map(|a| a.action).collect();
        assert_eq!(
            kinds,
            vec![
                StabilityActionKind::PauseMinting,
                StabilityActionKind::MaxMintFee
            ]
        );
        assert!(!outcome.stablecoin.minting_enabled);
        assert_eq!(outcome.stablecoin.mint_fee, dec!(0.10));
        assert_eq!(outcome.events.len(), 1);
    }

    #[test]
    fn test_emergency_actions_noop_below_threshold() {
        let fx = fixture();
        fx.oracle.set_rate("CUSD", "USD", dec!(1.05));

        let outcome = fx.controller.execute_emergency_actions("CUSD", t0()).unwrap();
        assert!(outcome.actions.is_empty());
        assert!(outcome.stablecoin.minting_enabled);
    }

    #[test]
    fn test_recommendations_for_undercollateralized_coin() {
        let fx = fixture();
        fx.stablecoins
            .apply("CUSD", &mut |coin| {
                coin.total_supply = 1_000_000;
                coin.total_collateral_value = 1_200_000; // 1.2 < 1.5 target
                Ok(())
            })
            .unwrap();

        let recommendations = fx.controller.stability_recommendations("CUSD").unwrap();
        let kinds: Vec<_> = recommendations.iter().map(|r| r.action).collect();
        assert!(kinds.contains(&StabilityRecommendationKind::IncreaseCollateralRequirements));
        assert!(kinds.contains(&StabilityRecommendationKind::IncentivizeCollateralDeposits));
    }

    #[test]
    fn test_recommendations_for_high_utilization_algorithmic_coin() {
        let fx = fixture();
        fx.stablecoins
            .apply("AUSD", &mut |coin| {
                coin.total_supply = 8_500_000; // 85% of max
                Ok(())
            })
            .unwrap();

        let recommendations = fx.controller.stability_recommendations("AUSD").unwrap();
        let kinds: Vec<_> = recommendations.iter().map(|r| r.action).collect();
        assert!(kinds.contains(&StabilityRecommendationKind::ReduceMaxSupply));
        assert!(kinds.contains(&StabilityRecommendationKind::IncreaseBurnIncentives));
        // Algorithmic coins skip the collateral recommendations
        assert!(!kinds.contains(&StabilityRecommendationKind::IncreaseCollateralRequirements));
    }
}
