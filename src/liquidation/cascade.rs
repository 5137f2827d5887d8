//! Liquidation cascade stress testing.
//!
//! Recomputes every active position's collateral value as if the oracle's
//! peg conversions were scaled by a shock factor, and reports which
//! positions would fall below the liquidation threshold. Read-only: nothing
//! here takes locks writers wait on or commits state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::CollateralAnalytics;
use crate::core::position::PositionId;
use crate::error::{Error, Result};
use crate::ledger::AccountId;
use crate::store::{PositionStore, StablecoinStore};
use crate::utils::math::{apply_rate, collateral_ratio, safe_add};

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// One position's simulated outcome under the price shock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadePosition {
    /// Position identifier
    pub position_id: PositionId,
    /// Owning account
    pub account: AccountId,
    /// Ratio at current rates
    pub current_ratio: Decimal,
    /// Ratio after scaling collateral values by the shock factor
    pub simulated_ratio: Decimal,
    /// Whether the shocked ratio falls below the liquidation threshold
    pub would_liquidate: bool,
    /// Outstanding debt
    pub debt_amount: u64,
    /// Locked collateral
    pub collateral_amount: u64,
}

/// Aggregate cascade estimate for one stablecoin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeEstimate {
    /// Stablecoin code
    pub stablecoin_code: String,
    /// Shock factor applied to collateral values (0.9 = 10% drop)
    pub price_shock_factor: Decimal,
    /// Active positions examined
    pub total_positions: usize,
    /// Positions that would become liquidatable
    pub positions_at_risk: usize,
    /// Sum of debt on at-risk positions
    pub total_debt_at_risk: u64,
    /// Sum of collateral on at-risk positions
    pub total_collateral_at_risk: u64,
    /// Share of examined positions at risk, as a percentage
    pub impact_pct: Decimal,
    /// Per-position detail
    pub details: Vec<CascadePosition>,
    /// Assets skipped because no rate was available, with the oracle error
    pub skipped_assets: Vec<(String, String)>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CASCADE SIMULATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only stress tester for price-shock scenarios
#[derive(Clone)]
pub struct CascadeSimulator {
    positions: Arc<dyn PositionStore>,
    stablecoins: Arc<dyn StablecoinStore>,
    analytics: CollateralAnalytics,
}

impl CascadeSimulator {
    /// Create the simulator over its injected dependencies
    pub fn new(
        positions: Arc<dyn PositionStore>,
        stablecoins: Arc<dyn StablecoinStore>,
        analytics: CollateralAnalytics,
    ) -> Self {
        Self {
            positions,
            stablecoins,
            analytics,
        }
    }

    /// Estimate which positions a collateral price shock would push below
    /// the liquidation threshold. A factor of 0.9 models a 10% collateral
    /// price drop; factors above 1 model appreciation.
    pub fn estimate_liquidation_cascade(
        &self,
        stablecoin_code: &str,
        price_shock_factor: Decimal,
    ) -> Result<CascadeEstimate> {
        if price_shock_factor <= Decimal::ZERO {
            return Err(Error::InvalidParameter {
                name: "price_shock_factor".into(),
                reason: format!("must be positive, got {}", price_shock_factor),
            });
        }

        let stablecoin = self.stablecoins.get(stablecoin_code)?;
        let active = self.positions.list_active(stablecoin_code)?;

        let mut details = Vec::with_capacity(active.len());
        let mut skipped_assets: Vec<(String, String)> = Vec::new();
        let mut positions_at_risk = 0usize;
        let mut total_debt_at_risk = 0u64;
        let mut total_collateral_at_risk = 0u64;
        let mut examined = 0usize;

        for position in active {
            if position.debt_amount == 0 {
                continue;
            }
            let current_value = match self
                .analytics
                .position_collateral_value(&position, &stablecoin.peg_asset_code)
            {
                Ok(value) => value,
                Err(err @ Error::RateUnavailable { .. }) => {
                    if !skipped_assets
                        .iter()
                        .any(|(asset, _)| *asset == position.collateral_asset_code)
                    {
                        skipped_assets
                            .push((position.collateral_asset_code.clone(), err.to_string()));
                    }
                    continue;
                }
                Err(err) => return Err(err),
            };
            examined += 1;

            let current_ratio =
                collateral_ratio(current_value, position.debt_amount).unwrap_or(Decimal::ZERO);
            let shocked_value = apply_rate(current_value, price_shock_factor)?;
            let simulated_ratio =
                collateral_ratio(shocked_value, position.debt_amount).unwrap_or(Decimal::ZERO);
            let would_liquidate = simulated_ratio < stablecoin.min_collateral_ratio;

            if would_liquidate {
                positions_at_risk += 1;
                total_debt_at_risk = safe_add(total_debt_at_risk, position.debt_amount)?;
                total_collateral_at_risk =
                    safe_add(total_collateral_at_risk, position.collateral_amount)?;
            }

            details.push(CascadePosition {
                position_id: position.id,
                account: position.account.clone(),
                current_ratio,
                simulated_ratio,
                would_liquidate,
                debt_amount: position.debt_amount,
                collateral_amount: position.collateral_amount,
            });
        }

        let impact_pct = if examined > 0 {
            Decimal::from(positions_at_risk) / Decimal::from(examined) * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        Ok(CascadeEstimate {
            stablecoin_code: stablecoin_code.to_string(),
            price_shock_factor,
            total_positions: examined,
            positions_at_risk,
            total_debt_at_risk,
            total_collateral_at_risk,
            impact_pct,
            details,
            skipped_assets,
        })
    }
}
