//! Transport hyperparameter selection
//!
//! The label-free search loop at the heart of the crate: grids of
//! candidate transport parameters scored by pseudo-labeling consistency,
//! under a wall-clock budget, with typed per-candidate failures.

pub mod dimension;
pub mod grid;
pub mod search;

pub use dimension::subspace_dimension_search;
pub use grid::ParamGrid;
pub use search::{
    CandidateFailure, CrossValConfig, PseudoLabelCrossValidator, ScoringPolicy, SearchHistory,
    SearchMode, SearchOutcome, SearchRecord,
};
