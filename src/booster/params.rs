//! Booster hyperparameters

use crate::error::{AdaptError, Result};
use crate::store::hyperparams::StoreValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hyperparameters of the ranking booster.
///
/// `max_depth` and `num_round` always come from the hyperparameter store;
/// no defaults are synthesized for them when parsing a store column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoosterParams {
    pub max_depth: usize,
    pub num_round: usize,
    pub learning_rate: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    /// Row fraction drawn per boosting round.
    pub subsample: f64,
    /// Rounds without eval-metric improvement before stopping; None
    /// disables early stopping.
    pub early_stopping_rounds: Option<usize>,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            max_depth: 6,
            num_round: 100,
            learning_rate: 0.3,
            gamma: 0.0,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            subsample: 1.0,
            early_stopping_rounds: Some(50),
            seed: 42,
        }
    }
}

impl BoosterParams {
    /// Build params from a hyperparameter-store column.
    ///
    /// Mandatory keys: `max_depth` and `num_round` (the alias
    /// `num_boost_round` is accepted). A missing mandatory key is fatal.
    pub fn from_store(algo: &str, entries: &BTreeMap<String, StoreValue>) -> Result<Self> {
        let mut params = Self::default();

        params.max_depth = require_int(algo, entries, "max_depth")? as usize;
        params.num_round = match lookup_int(entries, "num_round") {
            Some(v) => v as usize,
            None => require_int(algo, entries, "num_boost_round")? as usize,
        };

        if let Some(v) = lookup_float(entries, "eta") {
            params.learning_rate = v;
        }
        if let Some(v) = lookup_float(entries, "gamma") {
            params.gamma = v;
        }
        if let Some(v) = lookup_float(entries, "min_child_weight") {
            params.min_child_weight = v;
        }
        if let Some(v) = lookup_float(entries, "lambda") {
            params.reg_lambda = v;
        }
        if let Some(v) = lookup_float(entries, "subsample") {
            params.subsample = v;
        }

        Ok(params)
    }

    /// Store representation, round-trippable through
    /// [`BoosterParams::from_store`].
    pub fn to_store(&self) -> BTreeMap<String, StoreValue> {
        let mut entries = BTreeMap::new();
        entries.insert("max_depth".into(), StoreValue::Int(self.max_depth as i64));
        entries.insert("num_round".into(), StoreValue::Int(self.num_round as i64));
        entries.insert("eta".into(), StoreValue::Float(self.learning_rate));
        entries.insert("gamma".into(), StoreValue::Float(self.gamma));
        entries.insert(
            "min_child_weight".into(),
            StoreValue::Float(self.min_child_weight),
        );
        entries.insert("lambda".into(), StoreValue::Float(self.reg_lambda));
        entries
    }

    /// Small fast configuration for unit tests.
    #[doc(hidden)]
    pub fn for_tests() -> Self {
        Self {
            max_depth: 3,
            num_round: 20,
            learning_rate: 0.3,
            gamma: 0.0,
            min_child_weight: 0.0,
            reg_lambda: 1.0,
            subsample: 1.0,
            early_stopping_rounds: None,
            seed: 42,
        }
    }
}

fn lookup_int(entries: &BTreeMap<String, StoreValue>, key: &str) -> Option<i64> {
    match entries.get(key) {
        Some(StoreValue::Int(v)) => Some(*v),
        Some(StoreValue::Float(v)) => Some(*v as i64),
        _ => None,
    }
}

fn lookup_float(entries: &BTreeMap<String, StoreValue>, key: &str) -> Option<f64> {
    match entries.get(key) {
        Some(StoreValue::Int(v)) => Some(*v as f64),
        Some(StoreValue::Float(v)) => Some(*v),
        _ => None,
    }
}

fn require_int(algo: &str, entries: &BTreeMap<String, StoreValue>, key: &str) -> Result<i64> {
    lookup_int(entries, key).ok_or_else(|| AdaptError::MissingHyperparameter {
        algo: algo.to_string(),
        key: key.to_string(),
    })
}
