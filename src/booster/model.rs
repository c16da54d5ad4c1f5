//! Boosting loop and fitted model

use crate::error::{AdaptError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::objective::{sigmoid, Objective};
use super::params::BoosterParams;
use super::tree::{build_tree, TreeNode};

/// A gradient-boosted ranking model.
///
/// Trained with a pluggable objective; early stopping maximizes the
/// objective's eval metric on the training batch and the fitted model
/// keeps only the trees up to the best round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingBooster {
    params: BoosterParams,
    trees: Vec<TreeNode>,
    base_score: f64,
    best_round: usize,
    best_eval: f64,
}

impl RankingBooster {
    /// Train on `(x, y)` with the given objective.
    pub fn train(
        params: &BoosterParams,
        x: &Array2<f64>,
        y: &Array1<f64>,
        objective: &dyn Objective,
    ) -> Result<Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(AdaptError::Data("cannot train on empty matrix".into()));
        }
        if n != y.len() {
            return Err(AdaptError::Shape(format!(
                "features have {} rows but labels have {}",
                n,
                y.len()
            )));
        }

        // Base margin in log-odds space.
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        let base_score = (p / (1.0 - p)).ln();
        let mut raw = Array1::from_elem(n, base_score);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
        let mut trees: Vec<TreeNode> = Vec::with_capacity(params.num_round);
        let mut best_eval = f64::NEG_INFINITY;
        let mut best_round = 0;
        let mut rounds_since_best = 0;

        for round in 0..params.num_round {
            let (grad, hess) = objective.gradient(&raw, y);
            let indices = subsample_indices(n, params.subsample, &mut rng);
            let tree = build_tree(x, &grad, &hess, &indices, 0, params);

            for i in 0..n {
                let row = x.row(i);
                let sample = row.as_slice().expect("row-major feature matrix");
                raw[i] += params.learning_rate * tree.predict(sample);
            }
            trees.push(tree);

            let eval = objective.eval(&raw, y);
            trace!(round, %eval, metric = objective.eval_name(), "boosting round");
            if eval > best_eval {
                best_eval = eval;
                best_round = round + 1;
                rounds_since_best = 0;
            } else {
                rounds_since_best += 1;
                if let Some(patience) = params.early_stopping_rounds {
                    if rounds_since_best >= patience {
                        break;
                    }
                }
            }
        }

        if params.early_stopping_rounds.is_some() {
            trees.truncate(best_round.max(1));
        }
        let best_round = trees.len();

        Ok(Self {
            params: params.clone(),
            trees,
            base_score,
            best_round,
            best_eval,
        })
    }

    /// Sigmoid scores in `[0, 1]`, one per row.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AdaptError::ModelNotFitted);
        }
        let n = x.nrows();
        let mut raw = Array1::from_elem(n, self.base_score);
        for i in 0..n {
            let row = x.row(i);
            let sample = row.as_slice().expect("row-major feature matrix");
            for tree in &self.trees {
                raw[i] += self.params.learning_rate * tree.predict(sample);
            }
        }
        Ok(raw.mapv(sigmoid))
    }

    /// Number of trees kept after early stopping.
    pub fn best_round(&self) -> usize {
        self.best_round
    }

    /// Best training eval-metric value reached.
    pub fn best_eval(&self) -> f64 {
        self.best_eval
    }
}

fn subsample_indices(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil() as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k.max(1));
    indices.sort_unstable();
    indices
}

/// Train on `(x_train, y_train)` and return hard {0,1} labels for
/// `x_eval`, thresholding scores at 0.5.
///
/// This is the pseudo-labeling primitive of the cross-validator.
pub fn predict_label(
    params: &BoosterParams,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_eval: &Array2<f64>,
    objective: &dyn Objective,
) -> Result<Array1<f64>> {
    let model = RankingBooster::train(params, x_train, y_train, objective)?;
    let scores = model.predict(x_eval)?;
    Ok(scores.mapv(|s| if s > 0.5 { 1.0 } else { 0.0 }))
}
