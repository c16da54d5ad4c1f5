//! Dataset handling
//!
//! Loading, degradation, stratified sampling and rescaling of the
//! source/target feature matrices. All downstream code works on dense
//! `ndarray` matrices with binary {0,1} labels and no NaNs.

pub mod degrade;
pub mod loader;
pub mod sampling;
pub mod scaler;

pub use degrade::degrade_features;
pub use loader::{import_dataset, set_nan_floor};
pub use sampling::{candidate_seed, stratified_split, stratified_subset, SeedSequence};
pub use scaler::{FeatureScaler, ScalerKind};
