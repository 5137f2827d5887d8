//! Ledger boundary.
//!
//! Account balance bookkeeping is owned by an external system; the engine
//! only needs the three calls below. Amounts are integers in the asset's
//! minor units. The in-memory implementation backs the test suite and serves
//! as the reference for adapter authors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::utils::math::{safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// ACCOUNT ID
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque account identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create an account id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Multi-asset account ledger
pub trait Ledger: Send + Sync {
    /// Current balance of an account in an asset, in minor units
    fn balance(&self, account: &AccountId, asset: &str) -> Result<u64>;

    /// Remove funds from an account; fails with `InsufficientBalance`
    fn debit(&self, account: &AccountId, asset: &str, amount: u64) -> Result<()>;

    /// Add funds to an account
    fn credit(&self, account: &AccountId, asset: &str, amount: u64) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory ledger for tests and reference use
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: RwLock<HashMap<(AccountId, String), u64>>,
}

impl InMemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account balance (test setup)
    pub fn set_balance(&self, account: &AccountId, asset: &str, amount: u64) {
        let mut balances = self.balances.write().expect("ledger lock poisoned");
        balances.insert((account.clone(), asset.to_string()), amount);
    }
}

impl Ledger for InMemoryLedger {
    fn balance(&self, account: &AccountId, asset: &str) -> Result<u64> {
        let balances = self
            .balances
            .read()
            .map_err(|e| Error::Internal(format!("ledger lock poisoned: {}", e)))?;
        Ok(*balances
            .get(&(account.clone(), asset.to_string()))
            .unwrap_or(&0))
    }

    fn debit(&self, account: &AccountId, asset: &str, amount: u64) -> Result<()> {
        let mut balances = self
            .balances
            .write()
            .map_err(|e| Error::Internal(format!("ledger lock poisoned: {}", e)))?;
        let key = (account.clone(), asset.to_string());
        let current = *balances.get(&key).unwrap_or(&0);
        if current < amount {
            return Err(Error::InsufficientBalance {
                asset: asset.to_string(),
                required: amount,
                available: current,
            });
        }
        balances.insert(key, safe_sub(current, amount)?);
        Ok(())
    }

    fn credit(&self, account: &AccountId, asset: &str, amount: u64) -> Result<()> {
        let mut balances = self
            .balances
            .write()
            .map_err(|e| Error::Internal(format!("ledger lock poisoned: {}", e)))?;
        let key = (account.clone(), asset.to_string());
        let current = *balances.get(&key).unwrap_or(&0);
        balances.insert(key, safe_add(current, amount)?);
        Ok(())
    }
}
