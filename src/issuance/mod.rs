//! Issuance service: mint, burn, and add-collateral transitions.
//!
//! Every call validates all preconditions before the first ledger movement,
//! then commits in a fixed order: ledger debit, position commit, aggregate
//! update, ledger credit. The position commit is the per-position
//! serialization point (optimistic version check); the two steps that can
//! legitimately fail under a race — a balance spent concurrently, a position
//! committed concurrently, a supply cap consumed concurrently — each undo
//! the steps already taken before surfacing the error.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::CollateralAnalytics;
use crate::core::position::{CollateralPosition, PositionStatus};
use crate::core::stablecoin::Stablecoin;
use crate::error::{Error, Result};
use crate::events::{
    CollateralAddedEvent, DomainEvent, PositionClosedEvent, StablecoinBurnedEvent,
    StablecoinMintedEvent,
};
use crate::ledger::{AccountId, Ledger};
use crate::store::{PositionStore, StablecoinStore, VersionedPosition};
use crate::utils::math::{collateral_ratio, fraction_of, proportional, safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTCOMES
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a successful mint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintOutcome {
    /// Position after the mint
    pub position: CollateralPosition,
    /// Stablecoin aggregate after the mint
    pub stablecoin: Stablecoin,
    /// Mint fee withheld
    pub fee: u64,
    /// Stablecoin amount credited to the account (mint minus fee)
    pub net_credited: u64,
    /// Peg value of the newly locked collateral
    pub collateral_value_added: u64,
    /// Events raised by this call
    pub events: Vec<DomainEvent>,
}

/// Result of a successful burn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnOutcome {
    /// Position after the burn
    pub position: CollateralPosition,
    /// Stablecoin aggregate after the burn
    pub stablecoin: Stablecoin,
    /// Burn fee charged on top of the burned amount
    pub fee: u64,
    /// Collateral returned to the account
    pub collateral_released: u64,
    /// Whether the burn closed the position
    pub closed: bool,
    /// Events raised by this call
    pub events: Vec<DomainEvent>,
}

/// Result of adding collateral
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCollateralOutcome {
    /// Position after the top-up
    pub position: CollateralPosition,
    /// Stablecoin aggregate after the top-up
    pub stablecoin: Stablecoin,
    /// Peg value of the added collateral
    pub collateral_value_added: u64,
    /// Events raised by this call
    pub events: Vec<DomainEvent>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ISSUANCE SERVICE
// ═══════════════════════════════════════════════════════════════════════════════

/// Mint / burn / add-collateral state transitions on positions
#[derive(Clone)]
pub struct IssuanceService {
    ledger: Arc<dyn Ledger>,
    positions: Arc<dyn PositionStore>,
    stablecoins: Arc<dyn StablecoinStore>,
    analytics: CollateralAnalytics,
}

impl IssuanceService {
    /// Create the issuance service over its injected dependencies
    pub fn new(
        ledger: Arc<dyn Ledger>,
        positions: Arc<dyn PositionStore>,
        stablecoins: Arc<dyn StablecoinStore>,
        analytics: CollateralAnalytics,
    ) -> Self {
        Self {
            ledger,
            positions,
            stablecoins,
            analytics,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MINT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Mint stablecoins against locked collateral.
    ///
    /// Opens a position on the account's first mint for this stablecoin and
    /// tops up the existing one afterwards. The resulting ratio must clear
    /// the *target* collateral ratio, not merely the liquidation minimum.
    pub fn mint(
        &self,
        account: &AccountId,
        stablecoin_code: &str,
        collateral_asset_code: &str,
        collateral_amount: u64,
        mint_amount: u64,
        now: DateTime<Utc>,
    ) -> Result<MintOutcome> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;

        if !stablecoin.minting_enabled {
            return Err(Error::MintingDisabled(stablecoin_code.to_string()));
        }
        if mint_amount == 0 {
            return Err(Error::ZeroAmount);
        }
        if !stablecoin.can_mint(mint_amount) {
            return Err(Error::MaxSupplyExceeded {
                code: stablecoin_code.to_string(),
                total_supply: stablecoin.total_supply,
                requested: mint_amount,
                max_supply: stablecoin.max_supply,
            });
        }

        let available = self.ledger.balance(account, collateral_asset_code)?;
        if available < collateral_amount {
            return Err(Error::InsufficientBalance {
                asset: collateral_asset_code.to_string(),
                required: collateral_amount,
                available,
            });
        }

        let existing = self.positions.find_active(account, stablecoin_code)?;
        if let Some(ref versioned) = existing {
            if versioned.position.collateral_asset_code != collateral_asset_code {
                return Err(Error::AssetMismatch {
                    expected: versioned.position.collateral_asset_code.clone(),
                    provided: collateral_asset_code.to_string(),
                });
            }
        }

        let (existing_collateral, existing_debt) = existing
            .as_ref()
            .map(|v| (v.position.collateral_amount, v.position.debt_amount))
            .unwrap_or((0, 0));

        let total_collateral = safe_add(existing_collateral, collateral_amount)?;
        let total_debt = safe_add(existing_debt, mint_amount)?;
        let total_value = self.analytics.convert_to_peg_asset(
            collateral_asset_code,
            total_collateral,
            &stablecoin.peg_asset_code,
        )?;

        let provided_ratio =
            collateral_ratio(total_value, total_debt).unwrap_or(Decimal::ZERO);
        if provided_ratio < stablecoin.collateral_ratio {
            return Err(Error::InsufficientCollateral {
                required: stablecoin.collateral_ratio,
                provided: provided_ratio,
            });
        }

        let fee = fraction_of(mint_amount, stablecoin.mint_fee)?;
        let net_credited = safe_sub(mint_amount, fee)?;
        let collateral_value_added = self.analytics.convert_to_peg_asset(
            collateral_asset_code,
            collateral_amount,
            &stablecoin.peg_asset_code,
        )?;

        // Money movement starts here. The debit atomically re-checks the
        // balance; each later racy step undoes what came before on failure.
        self.ledger
            .debit(account, collateral_asset_code, collateral_amount)?;

        let position_before = existing.as_ref().map(|v| v.position.clone());
        let commit = |versioned: Option<VersionedPosition>| -> Result<CollateralPosition> {
            match versioned {
                Some(mut v) => {
                    v.position
                        .apply_mint(collateral_amount, mint_amount, total_value, now)?;
                    self.positions.commit(&v.position, v.version)?;
                    Ok(v.position)
                }
                None => {
                    let mut position = CollateralPosition::new(
                        self.positions.next_position_id(),
                        account.clone(),
                        stablecoin_code,
                        collateral_asset_code,
                        now,
                    );
                    position.apply_mint(collateral_amount, mint_amount, total_value, now)?;
                    self.positions.insert(position.clone())?;
                    Ok(position)
                }
            }
        };

        let position = match commit(existing) {
            Ok(position) => position,
            Err(err) => {
                self.ledger
                    .credit(account, collateral_asset_code, collateral_amount)?;
                return Err(err);
            }
        };

        let updated_stablecoin = match self.stablecoins.apply(stablecoin_code, &mut |coin| {
            coin.record_mint(mint_amount, collateral_value_added)
        }) {
            Ok(coin) => coin,
            Err(err) => {
                // Another mint consumed the remaining supply headroom; put
                // the position back the way it was.
                let loaded = self.positions.get(position.id)?;
                match position_before.as_ref() {
                    Some(before) => {
                        self.positions.commit(before, loaded.version)?;
                    }
                    None => {
                        let mut rollback = position.clone();
                        rollback.collateral_amount = 0;
                        rollback.debt_amount = 0;
                        rollback.collateral_ratio = Decimal::ZERO;
                        rollback.status = PositionStatus::Closed;
                        self.positions.commit(&rollback, loaded.version)?;
                    }
                }
                self.ledger
                    .credit(account, collateral_asset_code, collateral_amount)?;
                return Err(err);
            }
        };

        self.ledger.credit(account, stablecoin_code, net_credited)?;

        tracing::info!(
            account = %account,
            stablecoin = %stablecoin_code,
            mint_amount,
            collateral_amount,
            ratio = %position.collateral_ratio,
            "stablecoin minted"
        );

        let events = vec![DomainEvent::StablecoinMinted(StablecoinMintedEvent {
            account: account.clone(),
            stablecoin_code: stablecoin_code.to_string(),
            mint_amount,
            fee,
            collateral_locked: collateral_amount,
            position_before,
            position_after: position.clone(),
            timestamp: now,
        })];

        Ok(MintOutcome {
            position,
            stablecoin: updated_stablecoin,
            fee,
            net_credited,
            collateral_value_added,
            events,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BURN
    // ═══════════════════════════════════════════════════════════════════════════

    /// Burn stablecoins and release collateral.
    ///
    /// With no explicit `collateral_to_release` the release is proportional
    /// to the debt repaid. A burn that extinguishes the debt always releases
    /// the entire remaining collateral and closes the position.
    pub fn burn(
        &self,
        account: &AccountId,
        stablecoin_code: &str,
        burn_amount: u64,
        collateral_to_release: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<BurnOutcome> {
        let stablecoin = self.stablecoins.get(stablecoin_code)?;

        if !stablecoin.burning_enabled {
            return Err(Error::BurningDisabled(stablecoin_code.to_string()));
        }
        if burn_amount == 0 {
            return Err(Error::ZeroAmount);
        }

        let versioned = self
            .positions
            .find_active(account, stablecoin_code)?
            .ok_or_else(|| Error::NoActivePosition {
                account: account.to_string(),
                code: stablecoin_code.to_string(),
            })?;
        let position_before = versioned.position.clone();

        if burn_amount > position_before.debt_amount {
            return Err(Error::ExceedsDebt {
                requested: burn_amount,
                debt: position_before.debt_amount,
            });
        }

        let closes_position = burn_amount == position_before.debt_amount;
        let release = if closes_position {
            position_before.collateral_amount
        } else {
            match collateral_to_release {
                Some(requested) => {
                    if requested > position_before.collateral_amount {
                        return Err(Error::InvalidParameter {
                            name: "collateral_to_release".into(),
                            reason: format!(
                                "{} exceeds locked collateral {}",
                                requested, position_before.collateral_amount
                            ),
                        });
                    }
                    requested
                }
                None => proportional(
                    position_before.collateral_amount,
                    burn_amount,
                    position_before.debt_amount,
                )?,
            }
        };

        let remaining_collateral = safe_sub(position_before.collateral_amount, release)?;
        let remaining_debt = safe_sub(position_before.debt_amount, burn_amount)?;
        let remaining_value = self.analytics.convert_to_peg_asset(
            &position_before.collateral_asset_code,
            remaining_collateral,
            &stablecoin.peg_asset_code,
        )?;

        if !closes_position {
            let resulting = collateral_ratio(remaining_value, remaining_debt)
                .unwrap_or(Decimal::ZERO);
            if resulting < stablecoin.min_collateral_ratio {
                return Err(Error::ReleaseWouldUndercollateralize {
                    resulting,
                    minimum: stablecoin.min_collateral_ratio,
                });
            }
        }

        let fee = fraction_of(burn_amount, stablecoin.burn_fee)?;
        let total_debit = safe_add(burn_amount, fee)?;
        let balance = self.ledger.balance(account, stablecoin_code)?;
        if balance < total_debit {
            return Err(Error::InsufficientBalance {
                asset: stablecoin_code.to_string(),
                required: total_debit,
                available: balance,
            });
        }

        let value_released = self.analytics.convert_to_peg_asset(
            &position_before.collateral_asset_code,
            release,
            &stablecoin.peg_asset_code,
        )?;

        // Money movement starts here
        self.ledger.debit(account, stablecoin_code, total_debit)?;

        let mut position = position_before.clone();
        let committed: Result<()> = (|| {
            position.apply_burn(burn_amount, release, remaining_value, now)?;
            self.positions.commit(&position, versioned.version)?;
            Ok(())
        })();
        if let Err(err) = committed {
            self.ledger.credit(account, stablecoin_code, total_debit)?;
            return Err(err);
        }

        let updated_stablecoin = match self.stablecoins.apply(stablecoin_code, &mut |coin| {
            coin.record_burn(burn_amount, value_released)
        }) {
            Ok(coin) => coin,
            Err(err) => {
                let loaded = self.positions.get(position.id)?;
                self.positions.commit(&position_before, loaded.version)?;
                self.ledger.credit(account, stablecoin_code, total_debit)?;
                return Err(err);
            }
        };

        self.ledger
            .credit(account, &position_before.collateral_asset_code, release)?;

        tracing::info!(
            account = %account,
            stablecoin = %stablecoin_code,
            burn_amount,
            collateral_released = release,
            closed = closes_position,
            "stablecoin burned"
        );

        let mut events = vec![DomainEvent::StablecoinBurned(StablecoinBurnedEvent {
            account: account.clone(),
            stablecoin_code: stablecoin_code.to_string(),
            burn_amount,
            fee,
            collateral_released: release,
            position_before,
            position_after: position.clone(),
            timestamp: now,
        })];
        if position.status == PositionStatus::Closed {
            events.push(DomainEvent::PositionClosed(PositionClosedEvent {
                position_id: position.id,
                account: account.clone(),
                stablecoin_code: stablecoin_code.to_string(),
                position: position.clone(),
                timestamp: now,
            }));
        }

        Ok(BurnOutcome {
            closed: position.status == PositionStatus::Closed,
            position,
            stablecoin: updated_stablecoin,
            fee,
            collateral_released: release,
            events,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ADD COLLATERAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add collateral to an existing position without minting
    pub fn add_collateral(
        &self,
        account: &AccountId,
        stablecoin_code: &str,
        collateral_asset_code: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<AddCollateralOutcome> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        let stablecoin = self.stablecoins.get(stablecoin_code)?;

        let versioned = self
            .positions
            .find_active(account, stablecoin_code)?
            .ok_or_else(|| Error::NoActivePosition {
                account: account.to_string(),
                code: stablecoin_code.to_string(),
            })?;
        let position_before = versioned.position.clone();

        if position_before.collateral_asset_code != collateral_asset_code {
            return Err(Error::AssetMismatch {
                expected: position_before.collateral_asset_code.clone(),
                provided: collateral_asset_code.to_string(),
            });
        }

        let available = self.ledger.balance(account, collateral_asset_code)?;
        if available < amount {
            return Err(Error::InsufficientBalance {
                asset: collateral_asset_code.to_string(),
                required: amount,
                available,
            });
        }

        let new_total = safe_add(position_before.collateral_amount, amount)?;
        let total_value = self.analytics.convert_to_peg_asset(
            collateral_asset_code,
            new_total,
            &stablecoin.peg_asset_code,
        )?;
        let collateral_value_added = self.analytics.convert_to_peg_asset(
            collateral_asset_code,
            amount,
            &stablecoin.peg_asset_code,
        )?;

        self.ledger.debit(account, collateral_asset_code, amount)?;

        let mut position = position_before.clone();
        let committed: Result<()> = (|| {
            position.apply_collateral_added(amount, total_value, now)?;
            self.positions.commit(&position, versioned.version)?;
            Ok(())
        })();
        if let Err(err) = committed {
            self.ledger.credit(account, collateral_asset_code, amount)?;
            return Err(err);
        }

        let updated_stablecoin = self.stablecoins.apply(stablecoin_code, &mut |coin| {
            coin.record_collateral_added(collateral_value_added)
        })?;

        tracing::info!(
            account = %account,
            stablecoin = %stablecoin_code,
            amount,
            ratio = %position.collateral_ratio,
            "collateral added"
        );

        let events = vec![DomainEvent::CollateralAdded(CollateralAddedEvent {
            account: account.clone(),
            stablecoin_code: stablecoin_code.to_string(),
            amount,
            position_before,
            position_after: position.clone(),
            timestamp: now,
        })];

        Ok(AddCollateralOutcome {
            position,
            stablecoin: updated_stablecoin,
            collateral_value_added,
            events,
        })
    }

    /// Opt a position in or out of the system auto-liquidation sweep
    pub fn set_auto_liquidation(
        &self,
        account: &AccountId,
        stablecoin_code: &str,
        enabled: bool,
    ) -> Result<CollateralPosition> {
        let mut versioned = self
            .positions
            .find_active(account, stablecoin_code)?
            .ok_or_else(|| Error::NoActivePosition {
                account: account.to_string(),
                code: stablecoin_code.to_string(),
            })?;
        versioned.position.auto_liquidation_enabled = enabled;
        self.positions.commit(&versioned.position, versioned.version)?;
        Ok(versioned.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::core::stablecoin::StabilityMechanism;
    use crate::ledger::InMemoryLedger;
    use crate::oracle::InMemoryRateOracle;
    use crate::store::{InMemoryPositionStore, InMemoryStablecoinStore};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    struct Fixture {
        service: IssuanceService,
        ledger: Arc<InMemoryLedger>,
        oracle: Arc<InMemoryRateOracle>,
        stablecoins: Arc<InMemoryStablecoinStore>,
        alice: AccountId,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new());
        let oracle = Arc::new(InMemoryRateOracle::new());
        let positions = Arc::new(InMemoryPositionStore::new());
        let stablecoins = Arc::new(InMemoryStablecoinStore::new());

        let stablecoin = Stablecoin::new(
            "FUSD",
            "Pegstone USD",
            "USD",
            StabilityMechanism::Collateralized,
            dec!(1.5),
            dec!(1.2),
            dec!(0.1),
            10_000_000,
        )
        .with_fees(dec!(0.005), dec!(0.003));
        stablecoins.insert(stablecoin).unwrap();

        let analytics = CollateralAnalytics::new(
            oracle.clone(),
            positions.clone(),
            stablecoins.clone(),
            EngineConfig::default(),
        );
        let service = IssuanceService::new(
            ledger.clone(),
            positions.clone(),
            stablecoins.clone(),
            analytics,
        );

        let alice = AccountId::from("alice");
        ledger.set_balance(&alice, "USD", 1_000_000);

        Fixture {
            service,
            ledger,
            oracle,
            stablecoins,
            alice,
        }
    }

    #[test]
    fn test_mint_scenario() {
        // Mint $1,000 against $1,500 USD collateral at 0.5% mint fee
        let fx = fixture();
        let outcome = fx
            .service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();

        assert_eq!(outcome.position.collateral_ratio, dec!(1.5));
        assert_eq!(outcome.fee, 500);
        assert_eq!(outcome.net_credited, 99_500);
        assert_eq!(fx.ledger.balance(&fx.alice, "FUSD").unwrap(), 99_500);
        assert_eq!(
            fx.ledger.balance(&fx.alice, "USD").unwrap(),
            1_000_000 - 150_000
        );
        assert_eq!(outcome.stablecoin.total_supply, 100_000);
        assert_eq!(outcome.stablecoin.total_collateral_value, 150_000);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event_type(), "stablecoin.minted");
    }

    #[test]
    fn test_mint_disabled() {
        let fx = fixture();
        fx.stablecoins
            .apply("FUSD", &mut |coin| {
                coin.minting_enabled = false;
                Ok(())
            })
            .unwrap();

        let err = fx
            .service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap_err();
        assert!(matches!(err, Error::MintingDisabled(_)));
    }

    #[test]
    fn test_mint_max_supply() {
        let fx = fixture();
        fx.stablecoins
            .apply("FUSD", &mut |coin| {
                coin.total_supply = coin.max_supply;
                Ok(())
            })
            .unwrap();

        let err = fx
            .service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap_err();
        assert!(matches!(err, Error::MaxSupplyExceeded { .. }));
    }

    #[test]
    fn test_mint_insufficient_account_balance() {
        let fx = fixture();
        fx.ledger.set_balance(&fx.alice, "USD", 100_000);

        let err = fx
            .service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
        // Nothing moved
        assert_eq!(fx.ledger.balance(&fx.alice, "USD").unwrap(), 100_000);
        assert_eq!(fx.ledger.balance(&fx.alice, "FUSD").unwrap(), 0);
    }

    #[test]
    fn test_mint_insufficient_collateral() {
        let fx = fixture();
        // 1:1 collateral against a 1.5 target ratio
        let err = fx
            .service
            .mint(&fx.alice, "FUSD", "USD", 100_000, 100_000, t0())
            .unwrap_err();
        match err {
            Error::InsufficientCollateral { required, provided } => {
                assert_eq!(required, dec!(1.5));
                assert_eq!(provided, dec!(1));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_mint_with_foreign_collateral() {
        let fx = fixture();
        fx.oracle.set_rate("EUR", "USD", dec!(1.1));
        fx.ledger.set_balance(&fx.alice, "EUR", 150_000);

        let outcome = fx
            .service
            .mint(&fx.alice, "FUSD", "EUR", 150_000, 100_000, t0())
            .unwrap();

        // €1,500 at 1.1 = $1,650 peg value
        assert_eq!(outcome.collateral_value_added, 165_000);
        assert_eq!(outcome.position.collateral_ratio, dec!(1.65));
        assert_eq!(outcome.stablecoin.total_collateral_value, 165_000);
    }

    #[test]
    fn test_mint_into_existing_position() {
        let fx = fixture();
        fx.service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();
        let outcome = fx
            .service
            .mint(&fx.alice, "FUSD", "USD", 75_000, 50_000, t0())
            .unwrap();

        assert_eq!(outcome.position.collateral_amount, 225_000);
        assert_eq!(outcome.position.debt_amount, 150_000);
        assert_eq!(outcome.position.collateral_ratio, dec!(1.5));
        assert_eq!(outcome.stablecoin.total_supply, 150_000);
    }

    #[test]
    fn test_mint_asset_mismatch_on_existing_position() {
        let fx = fixture();
        fx.oracle.set_rate("EUR", "USD", dec!(1.1));
        fx.ledger.set_balance(&fx.alice, "EUR", 150_000);

        fx.service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();
        let err = fx
            .service
            .mint(&fx.alice, "FUSD", "EUR", 150_000, 100_000, t0())
            .unwrap_err();
        assert!(matches!(err, Error::AssetMismatch { .. }));
    }

    #[test]
    fn test_burn_scenario() {
        // Burn 50,000 from debt 100,000 / collateral 150,000 at 0.3% burn fee
        let fx = fixture();
        fx.service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();
        fx.ledger.set_balance(&fx.alice, "FUSD", 100_000);

        let outcome = fx
            .service
            .burn(&fx.alice, "FUSD", 50_000, None, t0())
            .unwrap();

        assert_eq!(outcome.collateral_released, 75_000);
        assert_eq!(outcome.fee, 150);
        assert!(!outcome.closed);
        assert_eq!(outcome.position.debt_amount, 50_000);
        assert_eq!(outcome.position.collateral_amount, 75_000);
        assert_eq!(outcome.position.collateral_ratio, dec!(1.5));
        // Debited burn + fee = 50,150
        assert_eq!(
            fx.ledger.balance(&fx.alice, "FUSD").unwrap(),
            100_000 - 50_150
        );
        assert_eq!(outcome.stablecoin.total_supply, 50_000);
        assert_eq!(outcome.stablecoin.total_collateral_value, 75_000);
    }

    #[test]
    fn test_burn_disabled() {
        let fx = fixture();
        fx.service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();
        fx.stablecoins
            .apply("FUSD", &mut |coin| {
                coin.burning_enabled = false;
                Ok(())
            })
            .unwrap();

        let err = fx
            .service
            .burn(&fx.alice, "FUSD", 50_000, None, t0())
            .unwrap_err();
        assert!(matches!(err, Error::BurningDisabled(_)));
    }

    #[test]
    fn test_burn_more_than_debt() {
        let fx = fixture();
        fx.service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();

        let err = fx
            .service
            .burn(&fx.alice, "FUSD", 150_000, None, t0())
            .unwrap_err();
        assert!(matches!(err, Error::ExceedsDebt { .. }));
    }

    #[test]
    fn test_burn_excessive_release_rejected() {
        let fx = fixture();
        fx.service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();
        fx.ledger.set_balance(&fx.alice, "FUSD", 100_000);

        // Releasing 140,000 would leave 10,000 backing 90,000 of debt
        let err = fx
            .service
            .burn(&fx.alice, "FUSD", 10_000, Some(140_000), t0())
            .unwrap_err();
        assert!(matches!(err, Error::ReleaseWouldUndercollateralize { .. }));
    }

    #[test]
    fn test_full_burn_closes_position_and_emits_event() {
        let fx = fixture();
        fx.service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();
        fx.ledger.set_balance(&fx.alice, "FUSD", 200_000);

        let outcome = fx
            .service
            .burn(&fx.alice, "FUSD", 100_000, None, t0())
            .unwrap();

        assert!(outcome.closed);
        assert_eq!(outcome.position.status, PositionStatus::Closed);
        assert_eq!(outcome.position.collateral_amount, 0);
        assert_eq!(outcome.collateral_released, 150_000);
        assert_eq!(outcome.stablecoin.total_supply, 0);
        let types: Vec<_> = outcome.events.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["stablecoin.burned", "position.closed"]);
    }

    #[test]
    fn test_burn_without_position() {
        let fx = fixture();
        let err = fx
            .service
            .burn(&fx.alice, "FUSD", 50_000, None, t0())
            .unwrap_err();
        assert!(matches!(err, Error::NoActivePosition { .. }));
    }

    #[test]
    fn test_add_collateral() {
        let fx = fixture();
        fx.service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();

        let outcome = fx
            .service
            .add_collateral(&fx.alice, "FUSD", "USD", 50_000, t0())
            .unwrap();

        assert_eq!(outcome.position.collateral_amount, 200_000);
        assert_eq!(outcome.position.debt_amount, 100_000);
        assert_eq!(outcome.position.collateral_ratio, dec!(2));
        assert_eq!(outcome.stablecoin.total_collateral_value, 200_000);
        assert_eq!(outcome.events[0].event_type(), "position.collateral_added");
    }

    #[test]
    fn test_add_collateral_asset_mismatch() {
        let fx = fixture();
        fx.service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();

        let err = fx
            .service
            .add_collateral(&fx.alice, "FUSD", "EUR", 50_000, t0())
            .unwrap_err();
        assert!(matches!(err, Error::AssetMismatch { .. }));
    }

    #[test]
    fn test_mint_burn_round_trip_preserves_principal() {
        let fx = fixture();
        let start = fx.ledger.balance(&fx.alice, "USD").unwrap();

        let mint = fx
            .service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();
        // Top up with the fee shortfall so the full debt can be repaid
        fx.ledger
            .credit(&fx.alice, "FUSD", mint.fee + 1_000)
            .unwrap();

        let burn = fx
            .service
            .burn(&fx.alice, "FUSD", 100_000, None, t0())
            .unwrap();
        assert!(burn.closed);

        // The collateral account is back to its pre-mint value: no principal
        // was lost, only the mint and burn fees left the stablecoin account.
        assert_eq!(fx.ledger.balance(&fx.alice, "USD").unwrap(), start);
        assert_eq!(
            fx.ledger.balance(&fx.alice, "FUSD").unwrap(),
            1_000 - burn.fee
        );
    }

    #[test]
    fn test_set_auto_liquidation() {
        let fx = fixture();
        fx.service
            .mint(&fx.alice, "FUSD", "USD", 150_000, 100_000, t0())
            .unwrap();

        let position = fx
            .service
            .set_auto_liquidation(&fx.alice, "FUSD", true)
            .unwrap();
        assert!(position.auto_liquidation_enabled);
    }
}
