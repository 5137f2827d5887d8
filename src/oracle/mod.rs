//! Exchange-rate oracle boundary.
//!
//! Rate sourcing, aggregation, and caching are external concerns; the engine
//! consumes a single lookup. Every component receives its oracle explicitly
//! (no ambient/global rate service), which makes rate failures a visible,
//! testable input.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};

/// Price lookup between two assets
pub trait RateOracle: Send + Sync {
    /// Exchange rate from one asset to another; fails with `RateUnavailable`
    /// when no quote exists for the pair.
    fn rate(&self, from: &str, to: &str) -> Result<Decimal>;
}

/// In-memory rate table for tests and reference use
#[derive(Debug, Default)]
pub struct InMemoryRateOracle {
    rates: RwLock<HashMap<(String, String), Decimal>>,
}

impl InMemoryRateOracle {
    /// Create an empty rate table
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the quote for a directed pair
    pub fn set_rate(&self, from: &str, to: &str, rate: Decimal) {
        let mut rates = self.rates.write().expect("oracle lock poisoned");
        rates.insert((from.to_string(), to.to_string()), rate);
    }

    /// Remove a quote (for simulating oracle outages in tests)
    pub fn clear_rate(&self, from: &str, to: &str) {
        let mut rates = self.rates.write().expect("oracle lock poisoned");
        rates.remove(&(from.to_string(), to.to_string()));
    }
}

impl RateOracle for InMemoryRateOracle {
    fn rate(&self, from: &str, to: &str) -> Result<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let rates = self
            .rates
            .read()
            .map_err(|e| Error::Internal(format!("oracle lock poisoned: {}", e)))?;
        rates
            .get(&(from.to_string(), to.to_string()))
            .copied()
            .ok_or_else(|| Error::RateUnavailable {
                from: from.to_string(),
                to: to.to_string(),
            })
    }
}
