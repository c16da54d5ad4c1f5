//! Training objectives
//!
//! An objective supplies the per-row gradient and Hessian consumed by the
//! tree builder, plus the scalar eval metric that drives early stopping.
//! Scores passed in are raw (pre-sigmoid) margins.

use crate::metrics::average_precision;
use ndarray::Array1;

/// Floor for the gradient denominator. When every prediction saturates on
/// one side the probability mass sum can underflow to zero; flooring it
/// keeps the gradient finite instead of aborting the run.
const MASS_FLOOR: f64 = 1e-12;

pub trait Objective: Send + Sync {
    /// Gradient and Hessian-diagonal for the current margins, both of
    /// length `labels.len()`.
    fn gradient(&self, raw: &Array1<f64>, labels: &Array1<f64>) -> (Array1<f64>, Array1<f64>);

    /// Scalar quality of the current margins; higher is better.
    fn eval(&self, raw: &Array1<f64>, labels: &Array1<f64>) -> f64;

    /// Name of the eval metric, for logging.
    fn eval_name(&self) -> &'static str;
}

/// Smooth surrogate of the Average Precision gradient.
///
/// With `p = sigmoid(raw)`, `S+`/`S-` the probability mass on
/// positive/negative rows and `T` the total mass, a positive row gets
/// `-S- * p(1-p) / T` and a negative row `S+ * p(1-p) / T`: positives are
/// pushed up and negatives down proportionally to the opposing class
/// mass. Curvature is not modeled; the Hessian is a constant damping
/// term, exposed as a tunable rather than a fixed law.
#[derive(Debug, Clone)]
pub struct ApRankingObjective {
    pub hessian: f64,
}

impl Default for ApRankingObjective {
    fn default() -> Self {
        Self { hessian: 0.1 }
    }
}

impl Objective for ApRankingObjective {
    fn gradient(&self, raw: &Array1<f64>, labels: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
        let probs = raw.mapv(sigmoid);
        let mut sum_pos = 0.0;
        let mut sum_neg = 0.0;
        for (&p, &y) in probs.iter().zip(labels.iter()) {
            if y == 1.0 {
                sum_pos += p;
            } else {
                sum_neg += p;
            }
        }
        let total = (sum_pos + sum_neg).max(MASS_FLOOR);

        let grad = Array1::from_shape_fn(raw.len(), |i| {
            let p = probs[i];
            let dsig = p * (1.0 - p);
            if labels[i] == 1.0 {
                -sum_neg * dsig / total
            } else {
                sum_pos * dsig / total
            }
        });
        let hess = Array1::from_elem(raw.len(), self.hessian);
        (grad, hess)
    }

    fn eval(&self, raw: &Array1<f64>, labels: &Array1<f64>) -> f64 {
        average_precision(labels, &raw.mapv(sigmoid))
    }

    fn eval_name(&self) -> &'static str {
        "AP"
    }
}

/// Standard logistic loss, kept for comparison runs.
#[derive(Debug, Clone, Default)]
pub struct LogLossObjective;

impl Objective for LogLossObjective {
    fn gradient(&self, raw: &Array1<f64>, labels: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
        let probs = raw.mapv(sigmoid);
        let grad = &probs - labels;
        let hess = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));
        (grad, hess)
    }

    fn eval(&self, raw: &Array1<f64>, labels: &Array1<f64>) -> f64 {
        average_precision(labels, &raw.mapv(sigmoid))
    }

    fn eval_name(&self) -> &'static str {
        "AP"
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
