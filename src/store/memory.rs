//! In-memory stores for tests and reference use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::core::position::{CollateralPosition, PositionId, PositionStatus};
use crate::core::stablecoin::Stablecoin;
use crate::error::{Error, Result};
use crate::ledger::AccountId;
use crate::store::{PositionStore, StablecoinStore, VersionedPosition};

fn lock_err<T>(e: std::sync::PoisonError<T>) -> Error {
    Error::Internal(format!("store lock poisoned: {}", e))
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory position store with optimistic versioning
#[derive(Debug, Default)]
pub struct InMemoryPositionStore {
    positions: RwLock<HashMap<PositionId, (CollateralPosition, u64)>>,
    next_id: AtomicU64,
}

impl InMemoryPositionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl PositionStore for InMemoryPositionStore {
    fn next_position_id(&self) -> PositionId {
        PositionId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn get(&self, id: PositionId) -> Result<VersionedPosition> {
        let positions = self.positions.read().map_err(lock_err)?;
        positions
            .get(&id)
            .map(|(position, version)| VersionedPosition {
                position: position.clone(),
                version: *version,
            })
            .ok_or_else(|| Error::PositionNotFound(id.to_string()))
    }

    fn find_active(
        &self,
        account: &AccountId,
        stablecoin_code: &str,
    ) -> Result<Option<VersionedPosition>> {
        let positions = self.positions.read().map_err(lock_err)?;
        Ok(positions
            .values()
            .find(|(p, _)| {
                p.status == PositionStatus::Active
                    && p.account == *account
                    && p.stablecoin_code == stablecoin_code
            })
            .map(|(position, version)| VersionedPosition {
                position: position.clone(),
                version: *version,
            }))
    }

    fn list_active(&self, stablecoin_code: &str) -> Result<Vec<CollateralPosition>> {
        let positions = self.positions.read().map_err(lock_err)?;
        let mut active: Vec<CollateralPosition> = positions
            .values()
            .filter(|(p, _)| {
                p.status == PositionStatus::Active && p.stablecoin_code == stablecoin_code
            })
            .map(|(p, _)| p.clone())
            .collect();
        active.sort_by_key(|p| p.id);
        Ok(active)
    }

    fn list_all_active(&self) -> Result<Vec<CollateralPosition>> {
        let positions = self.positions.read().map_err(lock_err)?;
        let mut active: Vec<CollateralPosition> = positions
            .values()
            .filter(|(p, _)| p.status == PositionStatus::Active)
            .map(|(p, _)| p.clone())
            .collect();
        active.sort_by_key(|p| p.id);
        Ok(active)
    }

    fn insert(&self, position: CollateralPosition) -> Result<u64> {
        let mut positions = self.positions.write().map_err(lock_err)?;
        if positions.contains_key(&position.id) {
            return Err(Error::InvalidParameter {
                name: "position".into(),
                reason: format!("{} already exists", position.id),
            });
        }
        positions.insert(position.id, (position, 1));
        Ok(1)
    }

    fn commit(&self, position: &CollateralPosition, expected_version: u64) -> Result<u64> {
        let mut positions = self.positions.write().map_err(lock_err)?;
        let entry = positions
            .get_mut(&position.id)
            .ok_or_else(|| Error::PositionNotFound(position.id.to_string()))?;
        if entry.1 != expected_version {
            return Err(Error::ConcurrencyConflict {
                entity: format!("position {}", position.id),
                expected: expected_version,
                actual: entry.1,
            });
        }
        *entry = (position.clone(), expected_version + 1);
        Ok(expected_version + 1)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABLECOIN STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory stablecoin store with serialized aggregate mutations
#[derive(Debug, Default)]
pub struct InMemoryStablecoinStore {
    stablecoins: RwLock<HashMap<String, Stablecoin>>,
}

impl InMemoryStablecoinStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl StablecoinStore for InMemoryStablecoinStore {
    fn get(&self, code: &str) -> Result<Stablecoin> {
        let stablecoins = self.stablecoins.read().map_err(lock_err)?;
        stablecoins
            .get(code)
            .cloned()
            .ok_or_else(|| Error::StablecoinNotFound(code.to_string()))
    }

    fn list_active(&self) -> Result<Vec<Stablecoin>> {
        let stablecoins = self.stablecoins.read().map_err(lock_err)?;
        let mut active: Vec<Stablecoin> = stablecoins
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(active)
    }

    fn insert(&self, stablecoin: Stablecoin) -> Result<()> {
        let mut stablecoins = self.stablecoins.write().map_err(lock_err)?;
        if stablecoins.contains_key(&stablecoin.code) {
            return Err(Error::InvalidParameter {
                name: "stablecoin".into(),
                reason: format!("{} already exists", stablecoin.code),
            });
        }
        stablecoins.insert(stablecoin.code.clone(), stablecoin);
        Ok(())
    }

    fn apply(
        &self,
        code: &str,
        mutation: &mut dyn FnMut(&mut Stablecoin) -> Result<()>,
    ) -> Result<Stablecoin> {
        let mut stablecoins = self.stablecoins.write().map_err(lock_err)?;
        let stored = stablecoins
            .get_mut(code)
            .ok_or_else(|| Error::StablecoinNotFound(code.to_string()))?;

        // Mutate a scratch copy so a failed mutation leaves the aggregate
        // untouched.
        let mut scratch = stored.clone();
        mutation(&mut scratch)?;
        scratch.check_invariants()?;
        *stored = scratch.clone();
        Ok(scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stablecoin::StabilityMechanism;
    use chrono::{TimeZone, Utc};
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
    }

    fn position(store: &InMemoryPositionStore, account: &str) -> CollateralPosition {
        CollateralPosition::new(
            store.next_position_id(),
            AccountId::from(account),
            "FUSD",
            "USD",
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_insert_and_get_position() {
        let store = InMemoryPositionStore::new();
        let p = position(&store, "alice");
        let id = p.id;

        assert_eq!(store.insert(p).unwrap(), 1);
        let loaded = store.get(id).unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.position.account, AccountId::from("alice"));
    }

    #[test]
    fn test_commit_bumps_version() {
        let store = InMemoryPositionStore::new();
        let p = position(&store, "alice");
        store.insert(p.clone()).unwrap();

        let loaded = store.get(p.id).unwrap();
        assert_eq!(store.commit(&loaded.position, loaded.version).unwrap(), 2);
        assert_eq!(store.get(p.id).unwrap().version, 2);
    }

    #[test]
    fn test_stale_commit_conflicts() {
        let store = InMemoryPositionStore::new();
        let p = position(&store, "alice");
        store.insert(p.clone()).unwrap();

        let first = store.get(p.id).unwrap();
        let second = store.get(p.id).unwrap();

        store.commit(&first.position, first.version).unwrap();
        let err = store.commit(&second.position, second.version).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_find_active_ignores_closed_positions() {
        let store = InMemoryPositionStore::new();
        let mut p = position(&store, "alice");
        p.status = PositionStatus::Closed;
        store.insert(p).unwrap();

        assert!(store
            .find_active(&AccountId::from("alice"), "FUSD")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_stablecoin_apply_is_transactional() {
        let store = InMemoryStablecoinStore::new();
        store.insert(fusd()).unwrap();

        // A failing mutation leaves the stored aggregate untouched
        let result = store.apply("FUSD", &mut |coin| {
            coin.total_supply = 42;
            Err(Error::ZeroAmount)
        });
        assert!(result.is_err());
        assert_eq!(store.get("FUSD").unwrap().total_supply, 0);

        // A succeeding mutation persists
        store
            .apply("FUSD", &mut |coin| coin.record_mint(100, 150))
            .unwrap();
        assert_eq!(store.get("FUSD").unwrap().total_supply, 100);
    }

    #[test]
    fn test_unknown_stablecoin() {
        let store = InMemoryStablecoinStore::new();
        assert!(matches!(
            store.get("NOPE").unwrap_err(),
            Error::StablecoinNotFound(_)
        ));
    }
}
