//! Run-result store
//!
//! An append-only mapping `dataset -> adaptation method -> RunResult`,
//! serialized as gzip-compressed JSON. One file per run under a per-day
//! results directory, created on demand.

use crate::booster::BoosterParams;
use crate::error::{AdaptError, Result};
use crate::eval::ApReport;
use crate::transport::TransportParams;
use chrono::Local;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Everything recorded for one (dataset, method) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub algo: String,
    pub ap_train: f64,
    pub ap_test: f64,
    pub ap_clean: f64,
    pub ap_target: f64,
    pub params_model: BoosterParams,
    pub param_transport: TransportParams,
    /// Winner of the separated cheat search, when it ran.
    pub param_transport_true_labels: Option<TransportParams>,
    pub elapsed_seconds: f64,
}

impl RunResult {
    pub fn new(
        algo: &str,
        report: ApReport,
        params_model: BoosterParams,
        param_transport: TransportParams,
        param_transport_true_labels: Option<TransportParams>,
        elapsed_seconds: f64,
    ) -> Self {
        Self {
            algo: algo.to_string(),
            ap_train: report.train,
            ap_test: report.test,
            ap_clean: report.clean,
            ap_target: report.target,
            params_model,
            param_transport,
            param_transport_true_labels,
            elapsed_seconds,
        }
    }
}

/// Nested result mapping for one run file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultStore {
    runs: BTreeMap<String, BTreeMap<String, RunResult>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one result. Appending twice for the same (dataset, method)
    /// pair replaces the earlier entry within this run file.
    pub fn insert(&mut self, dataset: &str, method: &str, result: RunResult) {
        self.runs
            .entry(dataset.to_string())
            .or_default()
            .insert(method.to_string(), result);
    }

    pub fn get(&self, dataset: &str, method: &str) -> Option<&RunResult> {
        self.runs.get(dataset).and_then(|m| m.get(method))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &RunResult)> {
        self.runs.iter().flat_map(|(dataset, methods)| {
            methods
                .iter()
                .map(move |(method, result)| (dataset.as_str(), method.as_str(), result))
        })
    }

    /// Write as gzip-compressed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec(self)?;
        let file = std::fs::File::create(path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&json)?;
        encoder.finish()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| AdaptError::Data(format!("cannot open {}: {e}", path.display())))?;
        let mut decoder = GzDecoder::new(file);
        let mut json = Vec::new();
        decoder.read_to_end(&mut json)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// One summary line per stored run.
    pub fn summary(&self) -> Vec<String> {
        self.iter()
            .map(|(dataset, method, r)| {
                format!(
                    "Dataset: {dataset} Transport: {method} Algo: {} \
                     Train AP {:5.2} Test AP {:5.2} Clean AP {:5.2} Target AP {:5.2} \
                     Parameters: {}",
                    r.algo, r.ap_train, r.ap_test, r.ap_clean, r.ap_target, r.param_transport
                )
            })
            .collect()
    }
}

/// Default run-file path: a per-day results directory and a
/// time-of-day file id, e.g. `results0708/fraude1_UOT_xgboost-ap<id>.json.gz`.
pub fn default_result_path(results_root: &Path, dataset: &str, method: &str, algo: &str, rescale: bool) -> PathBuf {
    let now = Local::now();
    let day_dir = format!("results{}", now.format("%d%m"));
    let file_id = now.format("%H%M%f");
    let tag = if rescale { "_rescale" } else { "" };
    results_root
        .join(day_dir)
        .join(format!("{dataset}{tag}_{method}_{algo}{file_id}.json.gz"))
}
