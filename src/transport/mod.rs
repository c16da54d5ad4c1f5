//! Domain adaptation strategies
//!
//! One tagged variant per alignment technique, selected once at
//! configuration time so the cross-validator's inner loop stays
//! strategy-agnostic. OT-family variants produce a [`TransportPlan`]
//! through a [`CouplingStrategy`]; subspace/covariance variants remap
//! both domains directly.

pub mod coral;
pub mod coupling;
pub mod linalg;
pub mod plan;
pub mod solvers;
pub mod subspace;

pub use coupling::{coupling_strategy, CouplingStrategy};
pub use plan::TransportPlan;

use crate::error::{AdaptError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which domain is projected into the other's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Project source rows into the target geometry (classic OT).
    SourceToTarget,
    /// Project target rows into the source geometry (the transpose plan).
    TargetToSource,
}

/// The enumerated adaptation method set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdaptationMethod {
    /// No adaptation baseline.
    Na,
    /// Balanced entropic OT with class regularization.
    Ot,
    /// Unbalanced entropic OT.
    Uot,
    /// Joint class-proportion OT.
    Jcpot,
    /// Unbalanced OT with per-class mass relaxation weights.
    ReweightUot,
    /// Subspace alignment.
    Sa,
    /// Covariance alignment.
    Coral,
    /// Transfer component analysis.
    Tca,
}

impl AdaptationMethod {
    pub const ALL: [AdaptationMethod; 8] = [
        AdaptationMethod::Na,
        AdaptationMethod::Ot,
        AdaptationMethod::Uot,
        AdaptationMethod::Jcpot,
        AdaptationMethod::ReweightUot,
        AdaptationMethod::Sa,
        AdaptationMethod::Coral,
        AdaptationMethod::Tca,
    ];

    /// True for the variants that fit a row-wise transport coupling.
    pub fn is_coupling(&self) -> bool {
        matches!(
            self,
            AdaptationMethod::Ot
                | AdaptationMethod::Uot
                | AdaptationMethod::Jcpot
                | AdaptationMethod::ReweightUot
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            AdaptationMethod::Na => "NA",
            AdaptationMethod::Ot => "OT",
            AdaptationMethod::Uot => "UOT",
            AdaptationMethod::Jcpot => "JCPOT",
            AdaptationMethod::ReweightUot => "reweight_UOT",
            AdaptationMethod::Sa => "SA",
            AdaptationMethod::Coral => "CORAL",
            AdaptationMethod::Tca => "TCA",
        }
    }
}

impl fmt::Display for AdaptationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AdaptationMethod {
    type Err = AdaptError;

    fn from_str(s: &str) -> Result<Self> {
        AdaptationMethod::ALL
            .iter()
            .find(|m| m.name() == s)
            .copied()
            .ok_or_else(|| {
                AdaptError::Validation(format!(
                    "unknown adaptation method '{s}' (expected one of NA, OT, UOT, JCPOT, reweight_UOT, SA, CORAL, TCA)"
                ))
            })
    }
}

/// A single transport hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    /// Per-class weights keyed by the class label rendered as a string,
    /// e.g. `{"0": 10, "1": 1}` in the reweighted unbalanced case.
    ClassWeights(BTreeMap<String, f64>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::ClassWeights(w) => {
                write!(f, "{{")?;
                for (i, (k, v)) in w.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// One hyperparameter candidate: parameter name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportParams(BTreeMap<String, ParamValue>);

impl TransportParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: ParamValue) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn set(&mut self, key: &str, value: ParamValue) {
        self.0.insert(key.to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Numeric parameter, fatal if absent or of the wrong kind.
    pub fn float(&self, key: &str) -> Result<f64> {
        match self.0.get(key) {
            Some(ParamValue::Float(v)) => Ok(*v),
            _ => Err(AdaptError::Validation(format!(
                "transport parameter '{key}' is missing or not numeric"
            ))),
        }
    }

    /// Per-class weight mapping, fatal if absent or of the wrong kind.
    pub fn class_weights(&self, key: &str) -> Result<&BTreeMap<String, f64>> {
        match self.0.get(key) {
            Some(ParamValue::ClassWeights(w)) => Ok(w),
            _ => Err(AdaptError::Validation(format!(
                "transport parameter '{key}' is missing or not a class-weight mapping"
            ))),
        }
    }
}

impl fmt::Display for TransportParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}
