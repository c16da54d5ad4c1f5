//! Hyperparameter grids
//!
//! An ordered mapping from parameter name to candidate values; the
//! cartesian product of the value lists defines the search space,
//! enumerated with the last parameter varying fastest so grid order is
//! deterministic across runs.

use crate::transport::{AdaptationMethod, ParamValue, TransportParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamGrid {
    entries: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_floats(mut self, key: &str, values: &[f64]) -> Self {
        self.entries.push((
            key.to_string(),
            values.iter().map(|&v| ParamValue::Float(v)).collect(),
        ));
        self
    }

    pub fn with_values(mut self, key: &str, values: Vec<ParamValue>) -> Self {
        self.entries.push((key.to_string(), values));
        self
    }

    /// Number of candidates in the cartesian product.
    pub fn len(&self) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        self.entries.iter().map(|(_, v)| v.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self, key: &str) -> Option<&[ParamValue]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Enumerate every candidate in deterministic order.
    pub fn enumerate(&self) -> Vec<TransportParams> {
        let mut out: Vec<TransportParams> = vec![TransportParams::new()];
        for (key, values) in &self.entries {
            let mut next = Vec::with_capacity(out.len() * values.len());
            for prev in &out {
                for value in values {
                    next.push(prev.clone().with(key, value.clone()));
                }
            }
            out = next;
        }
        if self.entries.is_empty() {
            Vec::new()
        } else {
            out
        }
    }

    /// The stock search space per adaptation method.
    pub fn default_for(method: AdaptationMethod) -> Self {
        const REG_RANGE: [f64; 8] = [0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];
        let weighted_reg_m: Vec<ParamValue> = [2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0]
            .iter()
            .map(|&w| {
                ParamValue::ClassWeights(BTreeMap::from([
                    ("0".to_string(), w),
                    ("1".to_string(), 1.0),
                ]))
            })
            .collect();

        match method {
            AdaptationMethod::Ot => Self::new()
                .with_floats("reg_e", &REG_RANGE)
                .with_floats("reg_cl", &REG_RANGE),
            AdaptationMethod::Uot => Self::new()
                .with_floats("reg_e", &REG_RANGE)
                .with_floats("reg_m", &REG_RANGE),
            AdaptationMethod::Jcpot => Self::new().with_floats("reg_e", &REG_RANGE),
            AdaptationMethod::ReweightUot => Self::new()
                .with_floats("reg_e", &REG_RANGE)
                .with_values("reg_m", weighted_reg_m),
            // Subspace methods search a dimensionality, CORAL/NA nothing.
            AdaptationMethod::Sa | AdaptationMethod::Tca | AdaptationMethod::Coral
            | AdaptationMethod::Na => Self::new(),
        }
    }
}
