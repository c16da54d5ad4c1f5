//! Persistence
//!
//! The semicolon-delimited hyperparameter store and the gzip-compressed
//! run-result store.

pub mod hyperparams;
pub mod results;

pub use hyperparams::{HyperparameterStore, StoreValue};
pub use results::{ResultStore, RunResult};
