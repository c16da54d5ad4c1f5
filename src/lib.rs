//! adaptrank - Optimal-transport domain adaptation for ranking
//!
//! Evaluates whether a gradient-boosted ranking model trained on a
//! source distribution can be adapted, via optimal-transport feature
//! alignment, to a degraded target distribution, and selects the
//! transport hyperparameters that maximize downstream Average Precision
//! without ever reading target labels.
//!
//! # Modules
//!
//! ## Core
//! - [`crossval`] - Pseudo-labeling cross-validation of transport
//!   hyperparameters
//! - [`transport`] - Adaptation strategies (OT family, SA, TCA, CORAL)
//! - [`booster`] - Gradient-boosted ranking model with the AP objective
//! - [`eval`] - Evaluation harness: adapt, train, four-way AP report
//!
//! ## Support
//! - [`data`] - Dataset loading, degradation, sampling, rescaling
//! - [`metrics`] - Average Precision and label agreement
//! - [`store`] - Hyperparameter and result persistence
//! - [`runner`] - Experiment orchestration and worker threads
//! - [`cli`] - Command-line interface

pub mod error;

// Core
pub mod booster;
pub mod crossval;
pub mod eval;
pub mod transport;

// Support
pub mod cli;
pub mod data;
pub mod metrics;
pub mod runner;
pub mod store;

pub use error::{AdaptError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::booster::{ApRankingObjective, BoosterParams, Objective, RankingBooster};
    pub use crate::crossval::{
        CrossValConfig, ParamGrid, PseudoLabelCrossValidator, ScoringPolicy, SearchHistory,
        SearchMode, SearchOutcome, SearchRecord,
    };
    pub use crate::error::{AdaptError, Result};
    pub use crate::eval::{adapt_domain, apply_model, select_transport_params, ApReport};
    pub use crate::runner::{launch_parallel, launch_run, RunConfig, RunSummary};
    pub use crate::store::{HyperparameterStore, ResultStore, RunResult, StoreValue};
    pub use crate::transport::{AdaptationMethod, Direction, ParamValue, TransportParams};
}
