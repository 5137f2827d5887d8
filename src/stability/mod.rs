//! Peg stability mechanisms.
//!
//! - Peg-deviation measurement against the oracle
//! - Fee and supply-incentive adjustment calculations
//! - Mechanism dispatch (collateralized / algorithmic / hybrid)
//! - Peg monitoring, emergency circuit breaker, structural recommendations

pub mod adjustments;
pub mod controller;

pub use adjustments::{
    FeeAdjustment, PegDeviation, PegDirection, StabilityAction, StabilityActionKind, SupplyAction,
    SupplyIncentives,
};
pub use controller::{
    PegHealth, PegStatus, StabilityController, StabilityOutcome, StabilityRecommendation,
    StabilityRecommendationKind,
};
