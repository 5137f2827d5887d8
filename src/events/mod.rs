//! Domain events for state change notifications.
//!
//! Every mutating engine call returns the events it raised as part of its
//! outcome, so the audit trail is a first-class, inspectable value rather
//! than a side effect of some global dispatcher. Delivery and storage are
//! the embedding host's concern.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::position::{CollateralPosition, PositionId};
use crate::core::stablecoin::StablecoinParams;
use crate::ledger::AccountId;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All engine event types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// Stablecoins were minted against collateral
    StablecoinMinted(StablecoinMintedEvent),
    /// Stablecoins were burned and collateral released
    StablecoinBurned(StablecoinBurnedEvent),
    /// Collateral was added to an existing position
    CollateralAdded(CollateralAddedEvent),
    /// A position was fully repaid and closed
    PositionClosed(PositionClosedEvent),
    /// A liquidation (partial or full) was executed
    LiquidationExecuted(LiquidationExecutedEvent),
    /// A position was seized to zero by liquidation
    PositionLiquidated(PositionLiquidatedEvent),
    /// A stability mechanism run adjusted parameters
    StabilityMechanismApplied(StabilityMechanismAppliedEvent),
}

impl DomainEvent {
    /// Event type identifier for external consumers
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StablecoinMinted(_) => "stablecoin.minted",
            Self::StablecoinBurned(_) => "stablecoin.burned",
            Self::CollateralAdded(_) => "position.collateral_added",
            Self::PositionClosed(_) => "position.closed",
            Self::LiquidationExecuted(_) => "liquidation.executed",
            Self::PositionLiquidated(_) => "position.liquidated",
            Self::StabilityMechanismApplied(_) => "stability.mechanism.applied",
        }
    }

    /// When the event occurred
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::StablecoinMinted(e) => e.timestamp,
            Self::StablecoinBurned(e) => e.timestamp,
            Self::CollateralAdded(e) => e.timestamp,
            Self::PositionClosed(e) => e.timestamp,
            Self::LiquidationExecuted(e) => e.timestamp,
            Self::PositionLiquidated(e) => e.timestamp,
            Self::StabilityMechanismApplied(e) => e.timestamp,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ISSUANCE EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when stablecoins are minted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StablecoinMintedEvent {
    /// Owning account
    pub account: AccountId,
    /// Stablecoin code
    pub stablecoin_code: String,
    /// Amount minted (gross, before fee)
    pub mint_amount: u64,
    /// Mint fee withheld
    pub fee: u64,
    /// Collateral locked by this mint
    pub collateral_locked: u64,
    /// Position before the mint; `None` when the mint opened it
    pub position_before: Option<CollateralPosition>,
    /// Position after the mint
    pub position_after: CollateralPosition,
    /// When the mint happened
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when stablecoins are burned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StablecoinBurnedEvent {
    /// Owning account
    pub account: AccountId,
    /// Stablecoin code
    pub stablecoin_code: String,
    /// Amount burned
    pub burn_amount: u64,
    /// Burn fee charged on top
    pub fee: u64,
    /// Collateral released back to the account
    pub collateral_released: u64,
    /// Position before the burn
    pub position_before: CollateralPosition,
    /// Position after the burn
    pub position_after: CollateralPosition,
    /// When the burn happened
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when collateral is added without minting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralAddedEvent {
    /// Owning account
    pub account: AccountId,
    /// Stablecoin code
    pub stablecoin_code: String,
    /// Amount of collateral added
    pub amount: u64,
    /// Position before
    pub position_before: CollateralPosition,
    /// Position after
    pub position_after: CollateralPosition,
    /// When the collateral was added
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a position is fully repaid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    /// The closed position's id
    pub position_id: PositionId,
    /// Owning account
    pub account: AccountId,
    /// Stablecoin code
    pub stablecoin_code: String,
    /// Final position state
    pub position: CollateralPosition,
    /// When the position closed
    pub timestamp: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted for every executed liquidation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationExecutedEvent {
    /// Liquidating account
    pub liquidator: AccountId,
    /// Stablecoin code
    pub stablecoin_code: String,
    /// Debt repaid by the liquidator
    pub debt_repaid: u64,
    /// Collateral seized from the position
    pub collateral_seized: u64,
    /// Penalty withheld from the liquidator's receipt
    pub penalty: u64,
    /// Position before the liquidation
    pub position_before: CollateralPosition,
    /// Position after the liquidation
    pub position_after: CollateralPosition,
    /// When the liquidation happened
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a liquidation fully seizes a position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    /// The liquidated position's id
    pub position_id: PositionId,
    /// Account that owned the position
    pub account: AccountId,
    /// Liquidating account
    pub liquidator: AccountId,
    /// Stablecoin code
    pub stablecoin_code: String,
    /// Final position state
    pub position: CollateralPosition,
    /// When the position was liquidated
    pub timestamp: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABILITY EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when a stability mechanism run changes parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityMechanismAppliedEvent {
    /// Stablecoin code
    pub stablecoin_code: String,
    /// Peg deviation percentage that drove the run
    pub deviation_pct: Decimal,
    /// Parameters before the run
    pub params_before: StablecoinParams,
    /// Parameters after the run
    pub params_after: StablecoinParams,
    /// Action kinds taken, in order
    pub actions: Vec<String>,
    /// When the mechanism ran
    pub timestamp: DateTime<Utc>,
}
