//! Collateral analytics.
//!
//! Pure valuation and scoring over positions; nothing here mutates state.
//! Every other component consumes these functions: issuance for ratio checks,
//! liquidation for scoring and ordering, stability for system-wide metrics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::config::EngineConfig;
use crate::core::position::CollateralPosition;
use crate::core::stablecoin::Stablecoin;
use crate::error::{Error, Result};
use crate::oracle::RateOracle;
use crate::store::{PositionStore, StablecoinStore};
use crate::utils::math::{apply_rate, clamp_unit, collateral_ratio, safe_add};

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Suggested action for a position owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Position must be liquidated
    Liquidate,
    /// Add collateral to avoid liquidation
    AddCollateral,
    /// Health is declining, keep watching
    Monitor,
    /// Over-collateralized, more can be minted
    MintMore,
}

/// How urgently a recommendation should be acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Informational
    Low,
    /// Worth acting on soon
    Medium,
    /// Act now to avoid liquidation
    High,
    /// Liquidation is already possible
    Critical,
}

/// A single recommendation for a position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecommendation {
    /// What to do
    pub action: RecommendedAction,
    /// How urgent it is
    pub urgency: Urgency,
    /// Human-readable explanation
    pub message: String,
}

/// Share of one collateral asset within a stablecoin's collateral pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetShare {
    /// Total locked amount in the asset's native minor units
    pub total_amount: u64,
    /// Peg-converted value of that amount
    pub total_value: u64,
    /// Number of active positions holding this asset
    pub position_count: usize,
    /// Percentage of the peg-converted total
    pub percentage: Decimal,
}

/// Collateral pool broken down by asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralDistribution {
    /// Per-asset shares, keyed by asset code
    pub assets: BTreeMap<String, AssetShare>,
    /// Assets skipped because no rate was available, with the oracle error
    pub skipped_assets: Vec<(String, String)>,
}

/// A position currently close to its liquidation threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtRiskPosition {
    /// The position
    pub position: CollateralPosition,
    /// Freshly converted collateral ratio
    pub current_ratio: Decimal,
}

/// System-wide collateralization metrics for one stablecoin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Stablecoin code
    pub stablecoin_code: String,
    /// Outstanding supply
    pub total_supply: u64,
    /// Live peg-converted collateral value across active positions
    pub total_collateral_value: u64,
    /// Live collateral value over supply; `None` with zero supply
    pub global_ratio: Option<Decimal>,
    /// Target collateral ratio
    pub target_ratio: Decimal,
    /// Liquidation threshold
    pub min_ratio: Decimal,
    /// Number of active positions
    pub active_positions: usize,
    /// Number of positions within the at-risk margin
    pub at_risk_positions: usize,
    /// Whether the global ratio clears the minimum
    pub is_healthy: bool,
    /// Collateral pool by asset
    pub distribution: CollateralDistribution,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL ANALYTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Valuation and scoring functions over positions
#[derive(Clone)]
pub struct CollateralAnalytics {
    oracle: Arc<dyn RateOracle>,
    positions: Arc<dyn PositionStore>,
    stablecoins: Arc<dyn StablecoinStore>,
    config: EngineConfig,
}

impl CollateralAnalytics {
    /// Create the analytics component over its injected dependencies
    pub fn new(
        oracle: Arc<dyn RateOracle>,
        positions: Arc<dyn PositionStore>,
        stablecoins: Arc<dyn StablecoinStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            oracle,
            positions,
            stablecoins,
            config,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VALUATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Convert a collateral amount to peg-asset value, rounded to the peg
    /// asset's minor units. Identity when the assets match; otherwise a
    /// missing rate propagates as a hard failure.
    pub fn convert_to_peg_asset(&self, asset: &str, amount: u64, peg_asset: &str) -> Result<u64> {
        if asset == peg_asset {
            return Ok(amount);
        }
        let rate = self.oracle.rate(asset, peg_asset)?;
        apply_rate(amount, rate)
    }

    /// Peg-converted value of a position's locked collateral at current rates
    pub fn position_collateral_value(
        &self,
        position: &CollateralPosition,
        peg_asset: &str,
    ) -> Result<u64> {
        self.convert_to_peg_asset(
            &position.collateral_asset_code,
            position.collateral_amount,
            peg_asset,
        )
    }

    /// Freshly converted collateral ratio; `None` when the position has no
    /// debt.
    pub fn current_ratio(
        &self,
        position: &CollateralPosition,
        peg_asset: &str,
    ) -> Result<Option<Decimal>> {
        let value = self.position_collateral_value(position, peg_asset)?;
        Ok(collateral_ratio(value, position.debt_amount))
    }

    /// Sum of peg-converted collateral across a stablecoin's active
    /// positions. A missing rate fails the whole sum.
    pub fn total_collateral_value(&self, stablecoin_code: &str) -> Result<u64> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;
        let mut total = 0u64;
        for position in self.positions.list_active(stablecoin_code)? {
            let value = self.position_collateral_value(&position, &stablecoin.peg_asset_code)?;
            total = safe_add(total, value)?;
        }
        Ok(total)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SCORING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Health score in [0, 1]. Zero debt is perfect health; otherwise the
    /// score measures distance above the liquidation threshold, saturating
    /// at twice the minimum ratio.
    pub fn position_health_score(
        &self,
        position: &CollateralPosition,
        stablecoin: &Stablecoin,
    ) -> Decimal {
        if position.debt_amount == 0 {
            return Decimal::ONE;
        }
        let min_ratio = stablecoin.min_collateral_ratio;
        clamp_unit((position.collateral_ratio - min_ratio) / min_ratio)
    }

    /// Liquidation priority in [0, 1]; used to order candidates, never to
    /// gate them. Lower health, larger debt, and staler positions rank
    /// higher.
    pub fn liquidation_priority(
        &self,
        position: &CollateralPosition,
        stablecoin: &Stablecoin,
        now: DateTime<Utc>,
    ) -> Decimal {
        let health = self.position_health_score(position, stablecoin);

        let debt_factor = clamp_unit(
            Decimal::from(position.debt_amount)
                / Decimal::from(self.config.priority_debt_normalization),
        );

        let staleness_factor = clamp_unit(
            Decimal::from(position.hours_since_interaction(now))
                / Decimal::from(self.config.priority_staleness_saturation_hours),
        );

        self.config.priority_weight_health * (Decimal::ONE - health)
            + self.config.priority_weight_debt * debt_factor
            + self.config.priority_weight_staleness * staleness_factor
    }

    /// Recommendations for managing a position, most urgent first
    pub fn position_recommendations(
        &self,
        position: &CollateralPosition,
        stablecoin: &Stablecoin,
    ) -> Vec<PositionRecommendation> {
        if !position.is_active() || position.debt_amount == 0 {
            return Vec::new();
        }

        let ratio = position.collateral_ratio;
        let min_ratio = stablecoin.min_collateral_ratio;
        let health = self.position_health_score(position, stablecoin);
        let mut recommendations = Vec::new();

        if ratio < min_ratio {
            recommendations.push(PositionRecommendation {
                action: RecommendedAction::Liquidate,
                urgency: Urgency::Critical,
                message: "Position must be liquidated immediately".into(),
            });
        } else if ratio <= min_ratio + self.config.at_risk_margin {
            recommendations.push(PositionRecommendation {
                action: RecommendedAction::AddCollateral,
                urgency: Urgency::High,
                message: "Add collateral to avoid liquidation".into(),
            });
        } else if health < Decimal::new(4, 1) {
            recommendations.push(PositionRecommendation {
                action: RecommendedAction::Monitor,
                urgency: Urgency::Medium,
                message: "Position health is declining, consider adding collateral".into(),
            });
        } else if ratio >= stablecoin.collateral_ratio * self.config.mint_headroom_factor {
            recommendations.push(PositionRecommendation {
                action: RecommendedAction::MintMore,
                urgency: Urgency::Low,
                message: "Position is over-collateralized, more stablecoins can be minted".into(),
            });
        }

        recommendations
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // AGGREGATES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Group a stablecoin's active positions by collateral asset. An asset
    /// with no available rate is skipped and recorded rather than failing
    /// the whole aggregate.
    pub fn collateral_distribution(&self, stablecoin_code: &str) -> Result<CollateralDistribution> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;
        let positions = self.positions.list_active(stablecoin_code)?;

        let mut grouped: BTreeMap<String, (u64, usize)> = BTreeMap::new();
        for position in &positions {
            let entry = grouped
                .entry(position.collateral_asset_code.clone())
                .or_insert((0, 0));
            entry.0 = safe_add(entry.0, position.collateral_amount)?;
            entry.1 += 1;
        }

        let mut assets = BTreeMap::new();
        let mut skipped_assets = Vec::new();
        let mut total_value = 0u64;

        for (asset, (total_amount, position_count)) in grouped {
            match self.convert_to_peg_asset(&asset, total_amount, &stablecoin.peg_asset_code) {
                Ok(total_value_for_asset) => {
                    total_value = safe_add(total_value, total_value_for_asset)?;
                    assets.insert(
                        asset,
                        AssetShare {
                            total_amount,
                            total_value: total_value_for_asset,
                            position_count,
                            percentage: Decimal::ZERO,
                        },
                    );
                }
                Err(err @ Error::RateUnavailable { .. }) => {
                    tracing::warn!(asset = %asset, error = %err, "skipping asset in distribution");
                    skipped_assets.push((asset, err.to_string()));
                }
                Err(err) => return Err(err),
            }
        }

        if total_value > 0 {
            for share in assets.values_mut() {
                share.percentage = Decimal::from(share.total_value) / Decimal::from(total_value)
                    * Decimal::ONE_HUNDRED;
            }
        }

        Ok(CollateralDistribution {
            assets,
            skipped_assets,
        })
    }

    /// Active positions within the at-risk margin of their liquidation
    /// threshold, ranked by freshly converted ratio (worst first).
    pub fn positions_at_risk(&self, stablecoin_code: &str) -> Result<Vec<AtRiskPosition>> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;
        let threshold = stablecoin.min_collateral_ratio + self.config.at_risk_margin;

        let mut at_risk = Vec::new();
        for position in self.positions.list_active(stablecoin_code)? {
            if position.debt_amount == 0 {
                continue;
            }
            match self.current_ratio(&position, &stablecoin.peg_asset_code)? {
                Some(current_ratio) if current_ratio <= threshold => {
                    at_risk.push(AtRiskPosition {
                        position,
                        current_ratio,
                    });
                }
                _ => {}
            }
        }
        at_risk.sort_by(|a, b| a.current_ratio.cmp(&b.current_ratio));
        Ok(at_risk)
    }

    /// System-wide collateralization metrics for one stablecoin
    pub fn stablecoin_metrics(&self, stablecoin_code: &str) -> Result<SystemMetrics> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;
        let total_collateral_value = self.total_collateral_value(stablecoin_code)?;
        let global_ratio = collateral_ratio(total_collateral_value, stablecoin.total_supply);
        let active_positions = self.positions.list_active(stablecoin_code)?.len();
        let at_risk_positions = self.positions_at_risk(stablecoin_code)?.len();

        Ok(SystemMetrics {
            stablecoin_code: stablecoin.code.clone(),
            total_supply: stablecoin.total_supply,
            total_collateral_value,
            global_ratio,
            target_ratio: stablecoin.collateral_ratio,
            min_ratio: stablecoin.min_collateral_ratio,
            active_positions,
            at_risk_positions,
            is_healthy: global_ratio
                .map(|r| r >= stablecoin.min_collateral_ratio)
                .unwrap_or(true),
            distribution: self.collateral_distribution(stablecoin_code)?,
        })
    }

    /// Metrics for every active stablecoin; coins whose oracle data is
    /// unavailable are skipped with a warning.
    pub fn system_metrics(&self) -> Result<Vec<SystemMetrics>> {
        let mut metrics = Vec::new();
        for stablecoin in self.stablecoins.list_active()? {
            match self.stablecoin_metrics(&stablecoin.code) {
                Ok(m) => metrics.push(m),
                Err(err @ Error::RateUnavailable { .. }) => {
                    tracing::warn!(code = %stablecoin.code, error = %err, "skipping stablecoin metrics");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(metrics)
    }
}
