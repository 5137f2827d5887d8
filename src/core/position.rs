//! Collateral positions.
//!
//! One active position per account/stablecoin pair; closed and liquidated
//! positions are kept for history. A position holds exactly one collateral
//! asset at a time, and its stored ratio is recomputed immediately after any
//! mutation of collateral or debt.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ledger::AccountId;
use crate::utils::math::{collateral_ratio, safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION ID
// ═══════════════════════════════════════════════════════════════════════════════

/// Store-assigned position identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(u64);

impl PositionId {
    /// Wrap a raw id
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PositionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pos-{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    /// Open with outstanding debt
    Active,
    /// Fully repaid and collateral returned
    Closed,
    /// Seized to zero by liquidation
    Liquidated,
    /// Administratively frozen
    Frozen,
}

impl PositionStatus {
    /// Closed and liquidated positions never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Liquidated)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL POSITION
// ═══════════════════════════════════════════════════════════════════════════════

/// A collateralized debt position against one stablecoin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralPosition {
    /// Identifier assigned by the position store
    pub id: PositionId,
    /// Owning account
    pub account: AccountId,
    /// Stablecoin this position backs
    pub stablecoin_code: String,
    /// The single collateral asset held
    pub collateral_asset_code: String,
    /// Locked collateral in the collateral asset's minor units
    pub collateral_amount: u64,
    /// Outstanding debt in stablecoin minor units
    pub debt_amount: u64,
    /// Peg-converted collateral value over debt; zero while debt is zero
    pub collateral_ratio: Decimal,
    /// Lifecycle state
    pub status: PositionStatus,
    /// Whether the system liquidator may sweep this position
    pub auto_liquidation_enabled: bool,
    /// Last mint/burn/add-collateral/liquidation touch
    pub last_interaction_at: DateTime<Utc>,
    /// When the position was liquidated, if ever
    pub liquidated_at: Option<DateTime<Utc>>,
}

impl CollateralPosition {
    /// Open an empty position
    pub fn new(
        id: PositionId,
        account: AccountId,
        stablecoin_code: impl Into<String>,
        collateral_asset_code: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account,
            stablecoin_code: stablecoin_code.into(),
            collateral_asset_code: collateral_asset_code.into(),
            collateral_amount: 0,
            debt_amount: 0,
            collateral_ratio: Decimal::ZERO,
            status: PositionStatus::Active,
            auto_liquidation_enabled: false,
            last_interaction_at: now,
            liquidated_at: None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Whether the position accepts mutations
    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }

    /// Whether any debt is outstanding
    pub fn has_debt(&self) -> bool {
        self.debt_amount > 0
    }

    /// Hours since the last interaction, never negative
    pub fn hours_since_interaction(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_interaction_at).num_hours().max(0)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add collateral and debt from a mint, then refresh the stored ratio
    /// from the peg-converted total collateral value.
    pub fn apply_mint(
        &mut self,
        collateral_added: u64,
        debt_added: u64,
        collateral_value: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_active()?;
        self.collateral_amount = safe_add(self.collateral_amount, collateral_added)?;
        self.debt_amount = safe_add(self.debt_amount, debt_added)?;
        self.refresh_ratio(collateral_value)?;
        self.last_interaction_at = now;
        Ok(())
    }

    /// Reduce debt and release collateral from a burn. Reaching zero debt
    /// closes the position; the caller must have released all collateral by
    /// then.
    pub fn apply_burn(
        &mut self,
        debt_repaid: u64,
        collateral_released: u64,
        remaining_collateral_value: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_active()?;
        self.debt_amount = safe_sub(self.debt_amount, debt_repaid)?;
        self.collateral_amount = safe_sub(self.collateral_amount, collateral_released)?;

        if self.debt_amount == 0 {
            if self.collateral_amount != 0 {
                return Err(Error::InvariantViolation(format!(
                    "{}: closing with {} collateral still locked",
                    self.id, self.collateral_amount
                )));
            }
            self.collateral_ratio = Decimal::ZERO;
            self.status = PositionStatus::Closed;
        } else {
            self.refresh_ratio(remaining_collateral_value)?;
        }
        self.last_interaction_at = now;
        Ok(())
    }

    /// Add collateral without changing debt
    pub fn apply_collateral_added(
        &mut self,
        collateral_added: u64,
        collateral_value: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_active()?;
        self.collateral_amount = safe_add(self.collateral_amount, collateral_added)?;
        self.refresh_ratio(collateral_value)?;
        self.last_interaction_at = now;
        Ok(())
    }

    /// Apply a liquidation: repay debt, seize collateral. Full repayment
    /// marks the position liquidated; partial repayment leaves it active
    /// with the refreshed ratio.
    pub fn apply_liquidation(
        &mut self,
        debt_repaid: u64,
        collateral_seized: u64,
        remaining_collateral_value: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_active()?;
        self.debt_amount = safe_sub(self.debt_amount, debt_repaid)?;
        self.collateral_amount = safe_sub(self.collateral_amount, collateral_seized)?;

        if self.debt_amount == 0 {
            self.collateral_ratio = Decimal::ZERO;
            self.status = PositionStatus::Liquidated;
            self.liquidated_at = Some(now);
        } else {
            self.refresh_ratio(remaining_collateral_value)?;
        }
        self.last_interaction_at = now;
        Ok(())
    }

    /// Recompute the stored ratio from a peg-converted collateral value.
    /// Calling this on an active position with zero debt is a bug.
    pub fn refresh_ratio(&mut self, collateral_value: u64) -> Result<()> {
        match collateral_ratio(collateral_value, self.debt_amount) {
            Some(ratio) => {
                self.collateral_ratio = ratio;
                Ok(())
            }
            None => Err(Error::InvariantViolation(format!(
                "{}: ratio recomputed on a debt-zero active position",
                self.id
            ))),
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if !self.is_active() {
            return Err(Error::PositionNotActive(self.id.to_string()));
        }
        Ok(())
    }
}
