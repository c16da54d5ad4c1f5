//! Gradient-boosted ranking model
//!
//! A native second-order boosting implementation driven by a pluggable
//! objective. The ranking objective optimizes a smooth surrogate of
//! Average Precision instead of log-loss, and early stopping maximizes
//! AP on the training batch.

pub mod model;
pub mod objective;
pub mod params;
mod tree;

pub use model::{predict_label, RankingBooster};
pub use objective::{ApRankingObjective, LogLossObjective, Objective};
pub use params::BoosterParams;
