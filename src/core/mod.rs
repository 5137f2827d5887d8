//! Core domain types for the Pegstone engine.
//!
//! - Stablecoin aggregate and its supply/collateral counters
//! - Collateral positions and their lifecycle
//! - Engine configuration and tunable thresholds

pub mod config;
pub mod position;
pub mod stablecoin;

pub use config::EngineConfig;
pub use position::{CollateralPosition, PositionId, PositionStatus};
pub use stablecoin::{Stablecoin, StablecoinParams, StabilityMechanism};
