//! Safe arithmetic for money amounts and ratios.
//!
//! Amounts are `u64` integers in the asset's minor units, matching the
//! ledger contract; rates, ratios, and fees are `rust_decimal::Decimal`.
//! All conversions between the two go through this module so rounding happens
//! in exactly one place.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Error, Result};

/// Safe addition with overflow check
pub fn safe_add(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction. Underflow here means a precondition check was skipped,
/// so it surfaces as an invariant violation rather than a caller error.
pub fn safe_sub(a: u64, b: u64) -> Result<u64> {
    a.checked_sub(b)
        .ok_or_else(|| Error::InvariantViolation(format!("underflow in {} - {}", a, b)))
}

/// Round a decimal amount to whole minor units, half away from zero.
///
/// Matches the rounding the ledger applies to converted values: 0.5 of a
/// minor unit rounds up, never banker's rounding.
pub fn to_minor_units(value: Decimal) -> Result<u64> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::InvalidParameter {
            name: "amount".into(),
            reason: format!("negative amount {}", value),
        });
    }
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or(Error::Overflow {
            operation: format!("to_minor_units({})", value),
        })
}

/// Multiply an amount by an exchange rate, rounding to minor units
pub fn apply_rate(amount: u64, rate: Decimal) -> Result<u64> {
    let product = Decimal::from(amount)
        .checked_mul(rate)
        .ok_or(Error::Overflow {
            operation: format!("{} * {}", amount, rate),
        })?;
    to_minor_units(product)
}

/// Take a fraction of an amount (fees, penalties), rounding to minor units
pub fn fraction_of(amount: u64, fraction: Decimal) -> Result<u64> {
    apply_rate(amount, fraction)
}

/// Compute `amount * numerator / denominator`, rounding to minor units.
///
/// Used for proportional collateral release and seizure; the division is
/// performed in decimal space so `150_000 * 50_000 / 100_000` is exact.
pub fn proportional(amount: u64, numerator: u64, denominator: u64) -> Result<u64> {
    if denominator == 0 {
        return Err(Error::InvalidParameter {
            name: "denominator".into(),
            reason: "division by zero".into(),
        });
    }
    let value = Decimal::from(amount)
        .checked_mul(Decimal::from(numerator))
        .ok_or(Error::Overflow {
            operation: format!("{} * {}", amount, numerator),
        })?
        / Decimal::from(denominator);
    to_minor_units(value)
}

/// Collateral ratio: peg-converted collateral value divided by debt.
///
/// Returns `None` when debt is zero; the ratio is undefined there and the
/// caller decides what that means (perfect health for scoring, closed for
/// lifecycle).
pub fn collateral_ratio(collateral_value: u64, debt: u64) -> Option<Decimal> {
    if debt == 0 {
        return None;
    }
    Some(Decimal::from(collateral_value) / Decimal::from(debt))
}

/// Clamp a score to the unit interval [0, 1]
pub fn clamp_unit(value: Decimal) -> Decimal {
    value.clamp(Decimal::ZERO, Decimal::ONE)
}

/// Clamp a fee or incentive to [0, max]
pub fn clamp_fee(value: Decimal, max: Decimal) -> Decimal {
    value.clamp(Decimal::ZERO, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_safe_arithmetic() {
        assert_eq!(safe_add(1, 2).unwrap(), 3);
        assert!(safe_add(u64::MAX, 1).is_err());

        assert_eq!(safe_sub(5, 3).unwrap(), 2);
        let err = safe_sub(3, 5).unwrap_err();
        assert!(err.is_critical());
    }

    #[test]
    fn test_to_minor_units_rounding() {
        assert_eq!(to_minor_units(dec!(99500.4)).unwrap(), 99500);
        assert_eq!(to_minor_units(dec!(99500.5)).unwrap(), 99501);
        assert_eq!(to_minor_units(dec!(0)).unwrap(), 0);
        assert!(to_minor_units(dec!(-1)).is_err());
    }

    #[test]
    fn test_apply_rate() {
        // €1,500.00 at 1.1 EUR/USD = $1,650.00
        assert_eq!(apply_rate(150_000, dec!(1.1)).unwrap(), 165_000);
        assert_eq!(apply_rate(100_000, dec!(1)).unwrap(), 100_000);
    }

    #[test]
    fn test_fraction_of() {
        // 0.5% mint fee on 100,000 units
        assert_eq!(fraction_of(100_000, dec!(0.005)).unwrap(), 500);
        // 10% penalty on a 50,000 repay
        assert_eq!(fraction_of(50_000, dec!(0.1)).unwrap(), 5_000);
    }

    #[test]
    fn test_proportional() {
        // Release half the collateral when burning half the debt
        assert_eq!(proportional(150_000, 50_000, 100_000).unwrap(), 75_000);
        // Full proportion returns everything
        assert_eq!(proportional(150_000, 100_000, 100_000).unwrap(), 150_000);
        assert!(proportional(1, 1, 0).is_err());
    }

    #[test]
    fn test_collateral_ratio() {
        assert_eq!(collateral_ratio(150_000, 100_000), Some(dec!(1.5)));
        assert_eq!(collateral_ratio(110_000, 100_000), Some(dec!(1.1)));
        assert_eq!(collateral_ratio(100_000, 0), None);
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_unit(dec!(1.7)), Decimal::ONE);
        assert_eq!(clamp_unit(dec!(-0.2)), Decimal::ZERO);
        assert_eq!(clamp_fee(dec!(0.15), dec!(0.10)), dec!(0.10));
        assert_eq!(clamp_fee(dec!(0.05), dec!(0.10)), dec!(0.05));
    }
}
