//! Persistence boundary for positions and stablecoin aggregates.
//!
//! The engine follows a load / mutate-in-memory / commit pattern. Positions
//! carry an optimistic version: a commit with a stale version fails with a
//! retryable `ConcurrencyConflict`, so two writers racing on the same
//! position can never interleave a silently stale write. Stablecoin
//! aggregates are updated through a serialized closure, which gives the
//! per-stablecoin atomic counter semantics batch sweeps rely on.

pub mod memory;

pub use memory::{InMemoryPositionStore, InMemoryStablecoinStore};

use crate::core::position::{CollateralPosition, PositionId};
use crate::core::stablecoin::Stablecoin;
use crate::error::Result;
use crate::ledger::AccountId;

/// A position together with the version it was loaded at
#[derive(Debug, Clone)]
pub struct VersionedPosition {
    /// The position snapshot
    pub position: CollateralPosition,
    /// Version to present at commit time
    pub version: u64,
}

/// Store for collateral positions
pub trait PositionStore: Send + Sync {
    /// Allocate an identifier for a new position
    fn next_position_id(&self) -> PositionId;

    /// Load a position with its current version
    fn get(&self, id: PositionId) -> Result<VersionedPosition>;

    /// Find the active position for an account/stablecoin pair, if any
    fn find_active(
        &self,
        account: &AccountId,
        stablecoin_code: &str,
    ) -> Result<Option<VersionedPosition>>;

    /// Snapshot of the active positions of one stablecoin
    fn list_active(&self, stablecoin_code: &str) -> Result<Vec<CollateralPosition>>;

    /// Snapshot of every active position across stablecoins
    fn list_all_active(&self) -> Result<Vec<CollateralPosition>>;

    /// Insert a new position at version 1
    fn insert(&self, position: CollateralPosition) -> Result<u64>;

    /// Commit a mutated position. Fails with `ConcurrencyConflict` when the
    /// stored version no longer matches `expected_version`; returns the new
    /// version on success.
    fn commit(&self, position: &CollateralPosition, expected_version: u64) -> Result<u64>;
}

/// Store for stablecoin aggregates
pub trait StablecoinStore: Send + Sync {
    /// Load a stablecoin by code
    fn get(&self, code: &str) -> Result<Stablecoin>;

    /// Snapshot of all active stablecoins
    fn list_active(&self) -> Result<Vec<Stablecoin>>;

    /// Register a stablecoin
    fn insert(&self, stablecoin: Stablecoin) -> Result<()>;

    /// Run a mutation against the stored aggregate, serialized per store.
    /// The closure either fully applies or (by returning an error) leaves
    /// the aggregate untouched. Returns the updated aggregate.
    fn apply(
        &self,
        code: &str,
        mutation: &mut dyn FnMut(&mut Stablecoin) -> Result<()>,
    ) -> Result<Stablecoin>;
}
