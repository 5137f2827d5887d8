//! Liquidation engine.
//!
//! Third-party liquidators repay a position's stablecoin debt and receive a
//! proportional share of its collateral minus the liquidation penalty. The
//! penalty's value is removed from circulation here; where it ultimately
//! accrues is outside this engine's responsibility.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::CollateralAnalytics;
use crate::core::config::EngineConfig;
use crate::core::position::{CollateralPosition, PositionId, PositionStatus};
use crate::core::stablecoin::Stablecoin;
use crate::error::{Error, Result};
use crate::events::{DomainEvent, LiquidationExecutedEvent, PositionLiquidatedEvent};
use crate::ledger::{AccountId, Ledger};
use crate::store::{PositionStore, StablecoinStore};
use crate::utils::math::{fraction_of, proportional, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of an eligibility check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEligibility {
    /// Whether the position can be liquidated right now
    pub eligible: bool,
    /// Why not, when ineligible
    pub reason: Option<String>,
    /// Debt a full liquidation would repay
    pub debt_repaid: u64,
    /// Collateral a full liquidation would seize
    pub collateral_seized: u64,
    /// Penalty a full liquidation would withhold
    pub penalty: u64,
}

/// Result of an executed liquidation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    /// Position after the liquidation
    pub position: CollateralPosition,
    /// Stablecoin aggregate after the liquidation
    pub stablecoin: Stablecoin,
    /// Debt repaid by the liquidator
    pub debt_repaid: u64,
    /// Collateral seized from the position
    pub collateral_seized: u64,
    /// Penalty withheld from the liquidator's receipt
    pub penalty: u64,
    /// Collateral actually credited to the liquidator
    pub liquidator_received: u64,
    /// Events raised by this call
    pub events: Vec<DomainEvent>,
}

/// A liquidatable position, scored for ordering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationOpportunity {
    /// Position identifier
    pub position_id: PositionId,
    /// Owning account
    pub account: AccountId,
    /// Stablecoin code
    pub stablecoin_code: String,
    /// Collateral asset held by the position
    pub collateral_asset_code: String,
    /// Outstanding debt
    pub debt_amount: u64,
    /// Locked collateral
    pub collateral_amount: u64,
    /// Freshly converted collateral ratio
    pub current_ratio: Decimal,
    /// Liquidation threshold it fell below
    pub min_ratio: Decimal,
    /// Penalty a full liquidation would withhold
    pub penalty: u64,
    /// Health score in [0, 1]
    pub health_score: Decimal,
    /// Priority score in [0, 1]; orders candidates, never gates them
    pub priority_score: Decimal,
    /// Whether the system sweep may take this position
    pub auto_liquidation_enabled: bool,
}

/// Summary of an auto-liquidation sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Positions successfully liquidated
    pub liquidated_count: usize,
    /// Positions that failed to liquidate
    pub failed_count: usize,
    /// Successful outcomes, in execution order
    pub outcomes: Vec<LiquidationOutcome>,
    /// Failures with the error message, in execution order
    pub failures: Vec<(PositionId, String)>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine for liquidating undercollateralized positions
#[derive(Clone)]
pub struct LiquidationEngine {
    ledger: Arc<dyn Ledger>,
    positions: Arc<dyn PositionStore>,
    stablecoins: Arc<dyn StablecoinStore>,
    analytics: CollateralAnalytics,
    config: EngineConfig,
}

impl LiquidationEngine {
    /// Create the liquidation engine over its injected dependencies
    pub fn new(
        ledger: Arc<dyn Ledger>,
        positions: Arc<dyn PositionStore>,
        stablecoins: Arc<dyn StablecoinStore>,
        analytics: CollateralAnalytics,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger,
            positions,
            stablecoins,
            analytics,
            config,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ELIGIBILITY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Check whether a position can be liquidated at current rates
    pub fn check_eligibility(
        &self,
        position: &CollateralPosition,
        stablecoin: &Stablecoin,
    ) -> Result<LiquidationEligibility> {
        if !position.is_active() {
            return Ok(LiquidationEligibility {
                eligible: false,
                reason: Some(format!("position is {:?}", position.status)),
                debt_repaid: 0,
                collateral_seized: 0,
                penalty: 0,
            });
        }

        let ratio = self
            .analytics
            .current_ratio(position, &stablecoin.peg_asset_code)?
            .unwrap_or(Decimal::ZERO);

        if ratio >= stablecoin.min_collateral_ratio {
            return Ok(LiquidationEligibility {
                eligible: false,
                reason: Some(format!(
                    "ratio {} is at or above minimum {}",
                    ratio, stablecoin.min_collateral_ratio
                )),
                debt_repaid: 0,
                collateral_seized: 0,
                penalty: 0,
            });
        }

        Ok(LiquidationEligibility {
            eligible: true,
            reason: None,
            debt_repaid: position.debt_amount,
            collateral_seized: position.collateral_amount,
            penalty: fraction_of(position.debt_amount, stablecoin.liquidation_penalty)?,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Liquidate a position, partially or in full.
    ///
    /// The liquidator repays `repay_amount` of the position's debt and
    /// receives the proportional collateral share minus the penalty. Full
    /// repayment marks the position liquidated.
    pub fn liquidate_position(
        &self,
        position_id: PositionId,
        liquidator: &AccountId,
        repay_amount: u64,
        now: DateTime<Utc>,
    ) -> Result<LiquidationOutcome> {
        let versioned = self.positions.get(position_id)?;
        let position_before = versioned.position.clone();

        if !position_before.is_active() {
            return Err(Error::PositionNotActive(position_id.to_string()));
        }
        if position_before.account == *liquidator {
            return Err(Error::SelfLiquidation);
        }
        if repay_amount == 0 {
            return Err(Error::ZeroAmount);
        }
        if repay_amount > position_before.debt_amount {
            return Err(Error::ExceedsDebt {
                requested: repay_amount,
                debt: position_before.debt_amount,
            });
        }

        let stablecoin = self.stablecoins.get(&position_before.stablecoin_code)?;
        let current_ratio = self
            .analytics
            .current_ratio(&position_before, &stablecoin.peg_asset_code)?
            .unwrap_or(Decimal::ZERO);
        if current_ratio >= stablecoin.min_collateral_ratio {
            return Err(Error::PositionHealthy {
                id: position_id.to_string(),
                ratio: current_ratio,
                minimum: stablecoin.min_collateral_ratio,
            });
        }

        let balance = self
            .ledger
            .balance(liquidator, &position_before.stablecoin_code)?;
        if balance < repay_amount {
            return Err(Error::InsufficientLiquidatorBalance {
                asset: position_before.stablecoin_code.clone(),
                required: repay_amount,
                available: balance,
            });
        }

        let seized = proportional(
            position_before.collateral_amount,
            repay_amount,
            position_before.debt_amount,
        )?;
        let penalty = fraction_of(repay_amount, stablecoin.liquidation_penalty)?;
        // A deeply underwater position can seize less than the penalty;
        // the liquidator then nets nothing rather than going negative.
        let liquidator_received = seized.saturating_sub(penalty);

        let remaining_collateral = safe_sub(position_before.collateral_amount, seized)?;
        let remaining_value = self.analytics.convert_to_peg_asset(
            &position_before.collateral_asset_code,
            remaining_collateral,
            &stablecoin.peg_asset_code,
        )?;
        // The full seized value leaves the tracked pool, not just the
        // liquidator's net receipt.
        let seized_value = self.analytics.convert_to_peg_asset(
            &position_before.collateral_asset_code,
            seized,
            &stablecoin.peg_asset_code,
        )?;

        // Money movement starts here
        self.ledger
            .debit(liquidator, &position_before.stablecoin_code, repay_amount)?;

        let mut position = position_before.clone();
        let committed: Result<()> = (|| {
            position.apply_liquidation(repay_amount, seized, remaining_value, now)?;
            self.positions.commit(&position, versioned.version)?;
            Ok(())
        })();
        if let Err(err) = committed {
            self.ledger
                .credit(liquidator, &position_before.stablecoin_code, repay_amount)?;
            return Err(err);
        }

        let updated_stablecoin = match self
            .stablecoins
            .apply(&position_before.stablecoin_code, &mut |coin| {
                coin.record_burn(repay_amount, seized_value)
            }) {
            Ok(coin) => coin,
            Err(err) => {
                let loaded = self.positions.get(position.id)?;
                self.positions.commit(&position_before, loaded.version)?;
                self.ledger
                    .credit(liquidator, &position_before.stablecoin_code, repay_amount)?;
                return Err(err);
            }
        };

        self.ledger.credit(
            liquidator,
            &position_before.collateral_asset_code,
            liquidator_received,
        )?;

        tracing::info!(
            position = %position_id,
            liquidator = %liquidator,
            repay_amount,
            collateral_seized = seized,
            penalty,
            fully_liquidated = position.status == PositionStatus::Liquidated,
            "position liquidated"
        );

        let mut events = vec![DomainEvent::LiquidationExecuted(LiquidationExecutedEvent {
            liquidator: liquidator.clone(),
            stablecoin_code: position_before.stablecoin_code.clone(),
            debt_repaid: repay_amount,
            collateral_seized: seized,
            penalty,
            position_before: position_before.clone(),
            position_after: position.clone(),
            timestamp: now,
        })];
        if position.status == PositionStatus::Liquidated {
            events.push(DomainEvent::PositionLiquidated(PositionLiquidatedEvent {
                position_id: position.id,
                account: position.account.clone(),
                liquidator: liquidator.clone(),
                stablecoin_code: position_before.stablecoin_code.clone(),
                position: position.clone(),
                timestamp: now,
            }));
        }

        Ok(LiquidationOutcome {
            position,
            stablecoin: updated_stablecoin,
            debt_repaid: repay_amount,
            collateral_seized: seized,
            penalty,
            liquidator_received,
            events,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DISCOVERY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Liquidatable positions of a stablecoin, highest priority first.
    /// Positions whose collateral asset has no rate are skipped.
    pub fn opportunities(
        &self,
        stablecoin_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<LiquidationOpportunity>> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;
        let mut opportunities = Vec::new();

        for position in self.positions.list_active(stablecoin_code)? {
            if position.debt_amount == 0 {
                continue;
            }
            let current_ratio = match self
                .analytics
                .current_ratio(&position, &stablecoin.peg_asset_code)
            {
                Ok(Some(ratio)) => ratio,
                Ok(None) => continue,
                Err(err @ Error::RateUnavailable { .. }) => {
                    tracing::warn!(position = %position.id, error = %err, "skipping position in discovery");
                    continue;
                }
                Err(err) => return Err(err),
            };
            if current_ratio >= stablecoin.min_collateral_ratio {
                continue;
            }

            // Score against the fresh ratio, not the stored one
            let mut scored = position.clone();
            scored.collateral_ratio = current_ratio;
            let health_score = self.analytics.position_health_score(&scored, &stablecoin);
            let priority_score = self
                .analytics
                .liquidation_priority(&scored, &stablecoin, now);

            opportunities.push(LiquidationOpportunity {
                position_id: position.id,
                account: position.account.clone(),
                stablecoin_code: stablecoin_code.to_string(),
                collateral_asset_code: position.collateral_asset_code.clone(),
                debt_amount: position.debt_amount,
                collateral_amount: position.collateral_amount,
                current_ratio,
                min_ratio: stablecoin.min_collateral_ratio,
                penalty: fraction_of(position.debt_amount, stablecoin.liquidation_penalty)?,
                health_score,
                priority_score,
                auto_liquidation_enabled: position.auto_liquidation_enabled,
            });
        }

        opportunities.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
        Ok(opportunities)
    }

    /// Fully liquidate every eligible position that opted into the system
    /// sweep. Positions without the flag are left for manual or third-party
    /// liquidators; individual failures are logged and do not stop the
    /// batch.
    pub fn process_auto_liquidations(
        &self,
        stablecoin_code: &str,
        now: DateTime<Utc>,
    ) -> Result<SweepSummary> {
        let system_liquidator = self.config.system_liquidator.clone();
        let mut summary = SweepSummary {
            liquidated_count: 0,
            failed_count: 0,
            outcomes: Vec::new(),
            failures: Vec::new(),
        };

        for opportunity in self.opportunities(stablecoin_code, now)? {
            if !opportunity.auto_liquidation_enabled {
                continue;
            }
            match self.liquidate_position(
                opportunity.position_id,
                &system_liquidator,
                opportunity.debt_amount,
                now,
            ) {
                Ok(outcome) => {
                    summary.liquidated_count += 1;
                    summary.outcomes.push(outcome);
                }
                Err(err) => {
                    tracing::warn!(
                        position = %opportunity.position_id,
                        error = %err,
                        "auto-liquidation failed"
                    );
                    summary.failed_count += 1;
                    summary.failures.push((opportunity.position_id, err.to_string()));
                }
            }
        }

        Ok(summary)
    }
}
