//! Error types for the Pegstone engine.
//!
//! This module defines all error types used throughout the engine,
//! providing clear and actionable error messages.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias for Pegstone operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Pegstone engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Issuance Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Minting is disabled for the stablecoin
    #[error("Minting is disabled for {0}")]
    MintingDisabled(String),

    /// Burning is disabled for the stablecoin
    #[error("Burning is disabled for {0}")]
    BurningDisabled(String),

    /// Mint would push total supply past the configured maximum
    #[error("Maximum supply reached for {code}: supply {total_supply} + mint {requested} > max {max_supply}")]
    MaxSupplyExceeded {
        /// Stablecoin code
        code: String,
        /// Current total supply
        total_supply: u64,
        /// Requested mint amount
        requested: u64,
        /// Maximum supply
        max_supply: u64,
    },

    /// Collateral does not meet the target collateral ratio
    #[error("Insufficient collateral: required ratio {required}, provided ratio {provided}")]
    InsufficientCollateral {
        /// Required (target) collateral ratio
        required: Decimal,
        /// Ratio the provided collateral would produce
        provided: Decimal,
    },

    /// Account balance too low for the requested debit
    #[error("Insufficient {asset} balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Asset being debited
        asset: String,
        /// Amount required
        required: u64,
        /// Amount available
        available: u64,
    },

    /// Burn amount exceeds outstanding debt
    #[error("Cannot burn more than debt amount: requested {requested}, debt {debt}")]
    ExceedsDebt {
        /// Requested burn amount
        requested: u64,
        /// Outstanding debt
        debt: u64,
    },

    /// Releasing collateral would leave the position undercollateralized
    #[error("Collateral release would make position undercollateralized: resulting ratio {resulting}, minimum {minimum}")]
    ReleaseWouldUndercollateralize {
        /// Ratio the position would end at
        resulting: Decimal,
        /// Minimum allowed ratio
        minimum: Decimal,
    },

    /// Collateral asset differs from the position's existing collateral asset
    #[error("Collateral asset mismatch: position holds {expected}, got {provided}")]
    AssetMismatch {
        /// Asset the position already holds
        expected: String,
        /// Asset offered
        provided: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Liquidation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Position is not in the active state
    #[error("Position is not active: {0}")]
    PositionNotActive(String),

    /// Position is healthy and cannot be liquidated
    #[error("Position {id} is not eligible for liquidation: ratio {ratio} >= minimum {minimum}")]
    PositionHealthy {
        /// Position identifier
        id: String,
        /// Current collateral ratio
        ratio: Decimal,
        /// Liquidation threshold
        minimum: Decimal,
    },

    /// An account cannot liquidate its own position
    #[error("Cannot liquidate your own position")]
    SelfLiquidation,

    /// Liquidator lacks the stablecoin balance to repay the debt
    #[error("Insufficient {asset} balance for liquidation: required {required}, available {available}")]
    InsufficientLiquidatorBalance {
        /// Stablecoin being repaid
        asset: String,
        /// Repay amount required
        required: u64,
        /// Liquidator's balance
        available: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// No exchange rate available for the asset pair
    #[error("Exchange rate not found for {from} to {to}")]
    RateUnavailable {
        /// Source asset code
        from: String,
        /// Target asset code
        to: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Store Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Stablecoin not found in the store
    #[error("Stablecoin not found: {0}")]
    StablecoinNotFound(String),

    /// Position not found in the store
    #[error("Position not found: {0}")]
    PositionNotFound(String),

    /// No active position exists for the account/stablecoin pair
    #[error("No active position found for account {account} and stablecoin {code}")]
    NoActivePosition {
        /// Owning account
        account: String,
        /// Stablecoin code
        code: String,
    },

    /// Concurrent writer committed first; reload and retry
    #[error("Concurrent modification of {entity}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Entity that was concurrently modified
        entity: String,
        /// Version the writer loaded
        expected: u64,
        /// Version found at commit time
        actual: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invariant violation detected (programming bug, not a caller error)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the caller can recover by adjusting inputs
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MintingDisabled(_)
                | Error::BurningDisabled(_)
                | Error::MaxSupplyExceeded { .. }
                | Error::InsufficientCollateral { .. }
                | Error::InsufficientBalance { .. }
                | Error::ExceedsDebt { .. }
                | Error::ReleaseWouldUndercollateralize { .. }
                | Error::AssetMismatch { .. }
                | Error::PositionNotActive(_)
                | Error::PositionHealthy { .. }
                | Error::SelfLiquidation
                | Error::InsufficientLiquidatorBalance { .. }
                | Error::InvalidParameter { .. }
                | Error::ZeroAmount
        )
    }

    /// Returns true if retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict { .. })
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_) | Error::Internal(_) | Error::Overflow { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Issuance errors: 1xxx
            Error::MintingDisabled(_) => 1001,
            Error::BurningDisabled(_) => 1002,
            Error::MaxSupplyExceeded { .. } => 1003,
            Error::InsufficientCollateral { .. } => 1004,
            Error::InsufficientBalance { .. } => 1005,
            Error::ExceedsDebt { .. } => 1006,
            Error::ReleaseWouldUndercollateralize { .. } => 1007,
            Error::AssetMismatch { .. } => 1008,

            // Liquidation errors: 2xxx
            Error::PositionNotActive(_) => 2001,
            Error::PositionHealthy { .. } => 2002,
            Error::SelfLiquidation => 2003,
            Error::InsufficientLiquidatorBalance { .. } => 2004,

            // Oracle errors: 3xxx
            Error::RateUnavailable { .. } => 3001,

            // Store errors: 4xxx
            Error::StablecoinNotFound(_) => 4001,
            Error::PositionNotFound(_) => 4002,
            Error::NoActivePosition { .. } => 4003,
            Error::ConcurrencyConflict { .. } => 4004,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::ZeroAmount => 5002,
            Error::Overflow { .. } => 5003,

            // Internal errors: 9xxx
            Error::InvariantViolation(_) => 9001,
            Error::Internal(_) => 9002,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::MintingDisabled("".into()).code(),
            Error::BurningDisabled("".into()).code(),
            Error::InsufficientCollateral {
                required: dec!(1.5),
                provided: dec!(1.0),
            }
            .code(),
            Error::RateUnavailable {
                from: "".into(),
                to: "".into(),
            }
            .code(),
            Error::ConcurrencyConflict {
                entity: "".into(),
                expected: 0,
                actual: 1,
            }
            .code(),
            Error::ZeroAmount.code(),
            Error::SelfLiquidation.code(),
            Error::InvariantViolation("".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientBalance {
            asset: "USD".into(),
            required: 150_000,
            available: 50_000,
        };
        assert!(err.to_string().contains("150000"));
        assert!(err.to_string().contains("USD"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::ExceedsDebt {
            requested: 10,
            debt: 5
        }
        .is_recoverable());
        assert!(!Error::Internal("test".into()).is_recoverable());
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::ConcurrencyConflict {
            entity: "position pos-1".into(),
            expected: 3,
            actual: 4,
        }
        .is_retryable());
        assert!(!Error::SelfLiquidation.is_retryable());
    }

    #[test]
    fn test_is_critical() {
        assert!(Error::InvariantViolation("negative supply".into()).is_critical());
        assert!(!Error::MintingDisabled("FUSD".into()).is_critical());
    }
}
