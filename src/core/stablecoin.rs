//! Stablecoin aggregate.
//!
//! One aggregate per currency code. The running supply and collateral
//! counters are mutated only through the checked methods here; they are never
//! recomputed from positions on the hot path.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::math::{collateral_ratio, safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// STABILITY MECHANISM
// ═══════════════════════════════════════════════════════════════════════════════

/// Strategy used to defend the peg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityMechanism {
    /// Fee adjustments against locked collateral
    Collateralized,
    /// Supply incentives (mint rewards / burn penalties)
    Algorithmic,
    /// Both fee adjustments and supply incentives
    Hybrid,
}

impl StabilityMechanism {
    /// Whether the mechanism uses collateral-side fee adjustments
    pub fn uses_fees(&self) -> bool {
        matches!(self, Self::Collateralized | Self::Hybrid)
    }

    /// Whether the mechanism uses algorithmic supply incentives
    pub fn uses_incentives(&self) -> bool {
        matches!(self, Self::Algorithmic | Self::Hybrid)
    }
}

impl std::fmt::Display for StabilityMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Collateralized => "collateralized",
            Self::Algorithmic => "algorithmic",
            Self::Hybrid => "hybrid",
        };
        write!(f, "{}", name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABLECOIN
// ═══════════════════════════════════════════════════════════════════════════════

/// A stablecoin and its aggregate state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stablecoin {
    /// Currency code (e.g. "FUSD")
    pub code: String,
    /// Human-readable name
    pub name: String,
    /// Asset the coin is pegged to (e.g. "USD")
    pub peg_asset_code: String,
    /// Target price in peg-asset terms (1.0 for a 1:1 peg)
    pub target_price: Decimal,
    /// Strategy used to defend the peg
    pub mechanism: StabilityMechanism,
    /// Target collateral ratio required when minting
    pub collateral_ratio: Decimal,
    /// Liquidation threshold
    pub min_collateral_ratio: Decimal,
    /// Fraction of repaid debt taken as liquidation penalty
    pub liquidation_penalty: Decimal,
    /// Outstanding supply in minor units
    pub total_supply: u64,
    /// Maximum supply in minor units
    pub max_supply: u64,
    /// Running peg-denominated value of locked collateral
    pub total_collateral_value: u64,
    /// Fee charged on mints, as a fraction
    pub mint_fee: Decimal,
    /// Fee charged on burns, as a fraction
    pub burn_fee: Decimal,
    /// Reward offered for minting under the algorithmic mechanism
    pub algo_mint_reward: Decimal,
    /// Penalty applied to burns under the algorithmic mechanism
    pub algo_burn_penalty: Decimal,
    /// Whether the coin participates in engine sweeps
    pub is_active: bool,
    /// Whether minting is currently allowed
    pub minting_enabled: bool,
    /// Whether burning is currently allowed
    pub burning_enabled: bool,
}

impl Stablecoin {
    /// Create a new stablecoin with zeroed counters
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        peg_asset_code: impl Into<String>,
        mechanism: StabilityMechanism,
        collateral_ratio: Decimal,
        min_collateral_ratio: Decimal,
        liquidation_penalty: Decimal,
        max_supply: u64,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            peg_asset_code: peg_asset_code.into(),
            target_price: Decimal::ONE,
            mechanism,
            collateral_ratio,
            min_collateral_ratio,
            liquidation_penalty,
            total_supply: 0,
            max_supply,
            total_collateral_value: 0,
            mint_fee: Decimal::ZERO,
            burn_fee: Decimal::ZERO,
            algo_mint_reward: Decimal::ZERO,
            algo_burn_penalty: Decimal::ZERO,
            is_active: true,
            minting_enabled: true,
            burning_enabled: true,
        }
    }

    /// Set the base mint/burn fees
    pub fn with_fees(mut self, mint_fee: Decimal, burn_fee: Decimal) -> Self {
        self.mint_fee = mint_fee;
        self.burn_fee = burn_fee;
        self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Check whether a mint fits under the supply cap
    pub fn can_mint(&self, amount: u64) -> bool {
        self.total_supply
            .checked_add(amount)
            .is_some_and(|s| s <= self.max_supply)
    }

    /// Global collateralization ratio: tracked collateral value over supply.
    /// `None` when nothing is in circulation.
    pub fn global_ratio(&self) -> Option<Decimal> {
        collateral_ratio(self.total_collateral_value, self.total_supply)
    }

    /// Fraction of the supply cap currently in circulation
    pub fn supply_utilization(&self) -> Decimal {
        if self.max_supply == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.total_supply) / Decimal::from(self.max_supply)
    }

    /// Snapshot of the adjustable parameters, used for audit records
    pub fn params(&self) -> StablecoinParams {
        StablecoinParams {
            mint_fee: self.mint_fee,
            burn_fee: self.burn_fee,
            algo_mint_reward: self.algo_mint_reward,
            algo_burn_penalty: self.algo_burn_penalty,
            minting_enabled: self.minting_enabled,
            burning_enabled: self.burning_enabled,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COUNTER MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record a mint: supply grows by the full mint amount, the collateral
    /// pool by the peg value of the newly locked collateral only.
    pub fn record_mint(&mut self, mint_amount: u64, collateral_value_added: u64) -> Result<()> {
        if !self.can_mint(mint_amount) {
            return Err(Error::MaxSupplyExceeded {
                code: self.code.clone(),
                total_supply: self.total_supply,
                requested: mint_amount,
                max_supply: self.max_supply,
            });
        }
        self.total_supply = safe_add(self.total_supply, mint_amount)?;
        self.total_collateral_value = safe_add(self.total_collateral_value, collateral_value_added)?;
        Ok(())
    }

    /// Record a burn or liquidation repayment: supply shrinks by the exact
    /// amount; the collateral pool by the peg value that left it.
    ///
    /// Supply underflow is a bug and trips an invariant violation. The
    /// collateral counter saturates instead: it accumulates at historical
    /// rates, so a release valued at today's rates can legitimately exceed
    /// what remains.
    pub fn record_burn(&mut self, burn_amount: u64, collateral_value_released: u64) -> Result<()> {
        self.total_supply = safe_sub(self.total_supply, burn_amount).map_err(|_| {
            Error::InvariantViolation(format!(
                "total_supply underflow for {}: supply {}, burn {}",
                self.code, self.total_supply, burn_amount
            ))
        })?;
        self.total_collateral_value = self
            .total_collateral_value
            .saturating_sub(collateral_value_released);
        Ok(())
    }

    /// Record collateral added to an existing position
    pub fn record_collateral_added(&mut self, collateral_value_added: u64) -> Result<()> {
        self.total_collateral_value = safe_add(self.total_collateral_value, collateral_value_added)?;
        Ok(())
    }

    /// Check aggregate invariants; violation is a programming bug
    pub fn check_invariants(&self) -> Result<()> {
        if self.total_supply > self.max_supply {
            return Err(Error::InvariantViolation(format!(
                "{}: total_supply {} exceeds max_supply {}",
                self.code, self.total_supply, self.max_supply
            )));
        }
        if self.mint_fee.is_sign_negative()
            || self.burn_fee.is_sign_negative()
            || self.algo_mint_reward.is_sign_negative()
            || self.algo_burn_penalty.is_sign_negative()
        {
            return Err(Error::InvariantViolation(format!(
                "{}: negative fee or incentive",
                self.code
            )));
        }
        Ok(())
    }
}

/// Snapshot of the parameters the stability controller adjusts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StablecoinParams {
    /// Fee charged on mints
    pub mint_fee: Decimal,
    /// Fee charged on burns
    pub burn_fee: Decimal,
    /// Algorithmic mint reward
    pub algo_mint_reward: Decimal,
    /// Algorithmic burn penalty
    pub algo_burn_penalty: Decimal,
    /// Whether minting is allowed
    pub minting_enabled: bool,
    /// Whether burning is allowed
    pub burning_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fusd() -> Stablecoin {
        Stablecoin::new(
            "FUSD",
            "Pegstone USD",
            "USD",
            StabilityMechanism::Collateralized,
            dec!(1.5),
            dec!(1.2),
            dec!(0.1),
            10_000_000,
        )
        .with_fees(dec!(0.005), dec!(0.003))
    }

    #[test]
    fn test_new_stablecoin_defaults() {
        let coin = fusd();
        assert_eq!(coin.total_supply, 0);
        assert_eq!(coin.target_price, Decimal::ONE);
        assert!(coin.minting_enabled);
        assert!(coin.burning_enabled);
    }

    #[test]
    fn test_can_mint_respects_cap() {
        let mut coin = fusd();
        assert!(coin.can_mint(10_000_000));
        assert!(!coin.can_mint(10_000_001));

        coin.record_mint(9_000_000, 13_500_000).unwrap();
        assert!(coin.can_mint(1_000_000));
        assert!(!coin.can_mint(1_000_001));
    }

    #[test]
    fn test_record_mint_and_burn() {
        let mut coin = fusd();
        coin.record_mint(100_000, 150_000).unwrap();
        assert_eq!(coin.total_supply, 100_000);
        assert_eq!(coin.total_collateral_value, 150_000);

        coin.record_burn(50_000, 75_000).unwrap();
        assert_eq!(coin.total_supply, 50_000);
        assert_eq!(coin.total_collateral_value, 75_000);
    }

    #[test]
    fn test_record_mint_over_cap_fails() {
        let mut coin = fusd();
        coin.total_supply = 10_000_000;
        let err = coin.record_mint(1, 1).unwrap_err();
        assert!(matches!(err, Error::MaxSupplyExceeded { .. }));
    }

    #[test]
    fn test_supply_underflow_is_invariant_violation() {
        let mut coin = fusd();
        let err = coin.record_burn(1, 0).unwrap_err();
        assert!(err.is_critical());
    }

    #[test]
    fn test_collateral_counter_saturates() {
        let mut coin = fusd();
        coin.record_mint(100_000, 110_000).unwrap();
        // Release valued above the tracked pool after a rate move
        coin.record_burn(100_000, 200_000).unwrap();
        assert_eq!(coin.total_collateral_value, 0);
    }

    #[test]
    fn test_global_ratio() {
        let mut coin = fusd();
        assert_eq!(coin.global_ratio(), None);

        coin.record_mint(100_000, 150_000).unwrap();
        assert_eq!(coin.global_ratio(), Some(dec!(1.5)));
    }

    #[test]
    fn test_supply_utilization() {
        let mut coin = fusd();
        coin.record_mint(8_000_000, 12_000_000).unwrap();
        assert_eq!(coin.supply_utilization(), dec!(0.8));
    }

    #[test]
    fn test_mechanism_classification() {
        assert!(StabilityMechanism::Collateralized.uses_fees());
        assert!(!StabilityMechanism::Collateralized.uses_incentives());
        assert!(StabilityMechanism::Algorithmic.uses_incentives());
        assert!(StabilityMechanism::Hybrid.uses_fees());
        assert!(StabilityMechanism::Hybrid.uses_incentives());
    }

    #[test]
    fn test_check_invariants() {
        let mut coin = fusd();
        assert!(coin.check_invariants().is_ok());

        coin.total_supply = coin.max_supply + 1;
        assert!(coin.check_invariants().unwrap_err().is_critical());
    }
}
