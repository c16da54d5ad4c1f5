//! Run orchestration
//!
//! Glues the pieces into one experiment run: load datasets, rescale,
//! select transport parameters, adapt, train, persist. A higher-level
//! launcher runs independent (dataset, method) combinations on worker
//! threads; each run owns its matrices and history, so there is no
//! shared mutable state between workers.

use std::path::{Path, PathBuf};
use std::time::Instant;

use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::booster::BoosterParams;
use crate::crossval::CrossValConfig;
use crate::data::degrade::{degrade_features, TOY_DEGRADATION};
use crate::data::loader::import_dataset;
use crate::data::sampling::stratified_split;
use crate::data::scaler::{FeatureScaler, ScalerKind};
use crate::error::{AdaptError, Result};
use crate::eval::{adapt_domain, select_transport_params, train_model, ApReport};
use crate::store::hyperparams::HyperparameterStore;
use crate::store::results::{default_result_path, ResultStore, RunResult};
use crate::transport::{AdaptationMethod, Direction, TransportParams};

/// Everything one experiment run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub dataset: String,
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub hyperparameter_file: PathBuf,
    /// Hyperparameter store column to read.
    pub algo: String,
    pub method: AdaptationMethod,
    pub direction: Direction,
    pub nb_iteration_cv: usize,
    pub cv_with_true_labels: bool,
    pub select_features: bool,
    pub rescale: bool,
    /// Explicit output path; derived from dataset/method/algo when None.
    pub output_file: Option<PathBuf>,
    pub results_root: PathBuf,
    pub seed: u64,
}

impl RunConfig {
    pub fn new(dataset: &str, source: &Path, target: &Path, hyperparams: &Path) -> Self {
        Self {
            dataset: dataset.to_string(),
            source_path: source.to_path_buf(),
            target_path: target.to_path_buf(),
            hyperparameter_file: hyperparams.to_path_buf(),
            algo: "ap".to_string(),
            method: AdaptationMethod::Uot,
            direction: Direction::TargetToSource,
            nb_iteration_cv: 8,
            cv_with_true_labels: false,
            select_features: true,
            rescale: true,
            output_file: None,
            results_root: PathBuf::from("."),
            seed: 1,
        }
    }
}

/// Outcome of one run, echoed to the caller after persistence.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub dataset: String,
    pub method: AdaptationMethod,
    pub report: ApReport,
    pub param_transport: TransportParams,
    pub elapsed_seconds: f64,
    pub output_file: PathBuf,
}

/// Execute one full experiment run.
///
/// Setup failures (missing dataset, malformed store) propagate; only
/// per-candidate failures inside the search are contained.
pub fn launch_run(config: &RunConfig) -> Result<RunSummary> {
    let start = Instant::now();
    info!(dataset = %config.dataset, method = %config.method, "run started");

    let (xs, ys) = import_dataset(&config.source_path, config.select_features)?;
    let (xt, yt) = import_dataset(&config.target_path, config.select_features)?;

    let (xs, xt, scaler) = if config.rescale {
        let scaler = FeatureScaler::fit(ScalerKind::L2Norm, &xs)?;
        (scaler.transform(&xs)?, scaler.transform(&xt)?, Some(scaler))
    } else {
        (xs, xt, None)
    };
    let xclean = xt.clone();

    let store = HyperparameterStore::load(&config.hyperparameter_file)?;
    let model_params = BoosterParams::from_store(&config.algo, &store.import(&config.algo)?)?;

    let cv_config = CrossValConfig {
        nb_training_iteration: config.nb_iteration_cv,
        direction: config.direction,
        seed: config.seed,
        ..Default::default()
    };

    let (param_transport, param_transport_cheat) = if config.method == AdaptationMethod::Na {
        (TransportParams::new(), None)
    } else {
        select_transport_params(
            config.method,
            &model_params,
            &cv_config,
            &xs,
            &ys,
            &xt,
            config.cv_with_true_labels.then_some(&yt),
        )?
    };

    let (xs, xt, xclean) = adapt_domain(
        config.method,
        &param_transport,
        &xs,
        &ys,
        &xt,
        &xclean,
        config.direction,
    )?;

    let report = train_model(
        &model_params,
        &xs,
        &ys,
        &xt,
        &yt,
        &xclean,
        scaler.as_ref(),
        config.seed.wrapping_add(3456),
    )?;

    let elapsed = start.elapsed().as_secs_f64();
    let output_file = config.output_file.clone().unwrap_or_else(|| {
        default_result_path(
            &config.results_root,
            &config.dataset,
            config.method.name(),
            &config.algo,
            config.rescale,
        )
    });

    let mut results = ResultStore::new();
    results.insert(
        &config.dataset,
        config.method.name(),
        RunResult::new(
            &config.algo,
            report,
            model_params,
            param_transport.clone(),
            param_transport_cheat,
            elapsed,
        ),
    );
    results.save(&output_file)?;

    info!(
        dataset = %config.dataset,
        method = %config.method,
        train = report.train,
        test = report.test,
        clean = report.clean,
        target = report.target,
        params = %param_transport,
        elapsed,
        "run finished"
    );

    Ok(RunSummary {
        dataset: config.dataset.clone(),
        method: config.method,
        report,
        param_transport,
        elapsed_seconds: elapsed,
        output_file,
    })
}

/// Run several independent configurations on worker threads and collect
/// their summaries. Worker panics and errors are reported per run, not
/// propagated across runs.
pub fn launch_parallel(configs: Vec<RunConfig>) -> Vec<Result<RunSummary>> {
    let handles: Vec<_> = configs
        .into_iter()
        .map(|config| {
            std::thread::spawn(move || {
                info!(
                    dataset = %config.dataset,
                    method = %config.method,
                    "worker thread started"
                );
                launch_run(&config)
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| {
            h.join()
                .unwrap_or_else(|_| Err(AdaptError::Computation("worker thread panicked".into())))
        })
        .collect()
}

/// The six experiment clusters: dataset name plus its source, target and
/// tuned-hyperparameter files.
pub fn cluster_config(
    index: usize,
    method: AdaptationMethod,
    rescale: bool,
) -> Result<RunConfig> {
    const CLUSTERS: usize = 6;
    if index >= CLUSTERS {
        return Err(AdaptError::Validation(format!(
            "cluster index {index} out of range (0..{CLUSTERS})"
        )));
    }
    let name = format!("fraude{}", index + 1);
    let mut config = RunConfig::new(
        &name,
        Path::new(&format!("datasets/source_20_{name}.csv")),
        Path::new(&format!("datasets/target_20_{name}.csv")),
        Path::new(&format!(
            "hyperparameters/cluster20_{name}_best_model_and_params.csv"
        )),
    );
    config.method = method;
    config.rescale = rescale;
    config.nb_iteration_cv = 4;
    Ok(config)
}

/// Synthetic toy pipeline: a separable two-class dataset is split into
/// source and target halves, the target copy is degraded, and the full
/// select-adapt-train-evaluate path runs with a small search budget.
pub fn toy_run(
    method: AdaptationMethod,
    direction: Direction,
    model_params: &BoosterParams,
    seed: u64,
) -> Result<(ApReport, TransportParams)> {
    let (x, y) = synthetic_dataset(seed);

    let scaler = FeatureScaler::fit(ScalerKind::Robust, &x)?;
    let x = scaler.transform(&x)?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(1234));
    let (xs, xt, ys, yt) = stratified_split(&x, &y, 0.51, &mut rng)?;

    let xclean = xt.clone();
    let mut xt = xt;
    degrade_features(&mut xt, &TOY_DEGRADATION, &mut rng);

    let cv_config = CrossValConfig {
        nb_training_iteration: 2,
        direction,
        candidate_pause: std::time::Duration::ZERO,
        seed,
        ..Default::default()
    };

    let (param_transport, _) = if method == AdaptationMethod::Na {
        (TransportParams::new(), None)
    } else {
        select_transport_params(method, model_params, &cv_config, &xs, &ys, &xt, None)?
    };

    let (xs, xt, xclean) = adapt_domain(
        method,
        &param_transport,
        &xs,
        &ys,
        &xt,
        &xclean,
        direction,
    )?;

    let report = train_model(
        model_params,
        &xs,
        &ys,
        &xt,
        &yt,
        &xclean,
        None,
        seed.wrapping_add(3456),
    )?;

    Ok((report, param_transport))
}

/// Deterministic synthetic binary dataset with a rare positive class and
/// enough features for the toy degradation plan to bite.
fn synthetic_dataset(seed: u64) -> (Array2<f64>, Array1<f64>) {
    use rand::Rng;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = 240;
    let n_features = 6;
    let y = Array1::from_shape_fn(n, |i| if i % 5 == 0 { 1.0 } else { 0.0 });
    let x = Array2::from_shape_fn((n, n_features), |(i, j)| {
        let base = if y[i] == 1.0 { 3.0 } else { 0.5 };
        base + 0.4 * (j as f64 + 1.0) + rng.gen_range(-0.5..0.5)
    });
    (x, y)
}
