//! # Pegstone
//!
//! A collateral and stability engine for synthetic currency units pegged to
//! a reference asset. The engine values collateral across multiple asset
//! denominations, mints and burns supply against locked collateral under
//! strict ratio invariants, liquidates undercollateralized positions with
//! third-party liquidator incentives, and continuously adjusts fees and
//! incentives to defend the peg.
//!
//! ## Architecture
//!
//! The engine consists of four components, leaf-first:
//!
//! - **Analytics**: pure valuation and scoring over positions
//! - **Issuance**: mint / burn / add-collateral state transitions
//! - **Liquidation**: eligibility, execution, discovery, sweeps, cascades
//! - **Stability**: peg monitoring and fee/incentive adjustments
//!
//! Account balances, exchange rates, and durable persistence are external
//! collaborators behind the [`ledger`], [`oracle`], and [`store`] traits;
//! in-memory reference implementations back the test suite.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pegstone::prelude::*;
//!
//! let outcome = issuance.mint(&account, "FUSD", "USD", 150_000, 100_000, Utc::now())?;
//! assert_eq!(outcome.position.collateral_ratio, dec!(1.5));
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod analytics;
pub mod core;
pub mod error;
pub mod events;
pub mod issuance;
pub mod ledger;
pub mod liquidation;
pub mod oracle;
pub mod stability;
pub mod store;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::analytics::CollateralAnalytics;
    pub use crate::core::{
        config::EngineConfig,
        position::{CollateralPosition, PositionId, PositionStatus},
        stablecoin::{Stablecoin, StabilityMechanism},
    };
    pub use crate::error::{Error, Result};
    pub use crate::events::DomainEvent;
    pub use crate::issuance::IssuanceService;
    pub use crate::ledger::{AccountId, InMemoryLedger, Ledger};
    pub use crate::liquidation::{CascadeSimulator, LiquidationEngine};
    pub use crate::oracle::{InMemoryRateOracle, RateOracle};
    pub use crate::stability::StabilityController;
    pub use crate::store::{
        InMemoryPositionStore, InMemoryStablecoinStore, PositionStore, StablecoinStore,
    };
}

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name
pub const ENGINE_NAME: &str = "pegstone";
