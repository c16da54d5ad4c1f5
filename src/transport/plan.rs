//! Transport plan
//!
//! The result of fitting an OT-family strategy: a coupling between the
//! rows of two feature matrices, able to project either domain into the
//! other's geometry by barycentric mapping. Plans live for a single
//! candidate evaluation and are never persisted.

use crate::error::{AdaptError, Result};
use ndarray::{Array2, Axis};

#[derive(Debug, Clone)]
pub struct TransportPlan {
    coupling: Array2<f64>,
    xs: Array2<f64>,
    xt: Array2<f64>,
}

impl TransportPlan {
    pub fn new(coupling: Array2<f64>, xs: Array2<f64>, xt: Array2<f64>) -> Result<Self> {
        if coupling.nrows() != xs.nrows() || coupling.ncols() != xt.nrows() {
            return Err(AdaptError::Shape(format!(
                "coupling is {}x{} for {} source and {} target rows",
                coupling.nrows(),
                coupling.ncols(),
                xs.nrows(),
                xt.nrows()
            )));
        }
        if coupling.iter().any(|v| !v.is_finite()) {
            return Err(AdaptError::SolverFailure(
                "coupling contains non-finite entries".into(),
            ));
        }
        Ok(Self { coupling, xs, xt })
    }

    /// Project the source rows into the target geometry:
    /// each source row becomes the coupling-weighted barycenter of the
    /// target rows it sends mass to.
    pub fn transform_source(&self) -> Array2<f64> {
        barycentric_map(&self.coupling, &self.xt)
    }

    /// Project the target rows into the source geometry using the
    /// transpose of the same fitted plan.
    pub fn transform_target(&self) -> Array2<f64> {
        barycentric_map(&self.coupling.t().to_owned(), &self.xs)
    }

    pub fn coupling(&self) -> &Array2<f64> {
        &self.coupling
    }
}

/// Row-normalize `weights` and map through `points`. Rows with zero mass
/// map to the origin rather than NaN.
fn barycentric_map(weights: &Array2<f64>, points: &Array2<f64>) -> Array2<f64> {
    let mut normalized = weights.clone();
    for mut row in normalized.axis_iter_mut(Axis(0)) {
        let sum: f64 = row.iter().sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        } else {
            row.fill(0.0);
        }
    }
    normalized.dot(points)
}
