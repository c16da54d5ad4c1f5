//! Covariance alignment (CORAL)
//!
//! Parameter-free second-order alignment: whiten the projected-from
//! domain with its own covariance, recolor with the other domain's.
//! Feature dimensionality is preserved.

use crate::error::Result;
use ndarray::Array2;

use super::linalg;
use super::Direction;

const COV_RIDGE: f64 = 1.0;
const EIG_FLOOR: f64 = 1e-12;

/// Align second-order statistics between the two domains.
///
/// Returns `(source, target)` with the recolored side replaced: forward
/// recolors the source into target statistics, transpose recolors the
/// target into source statistics.
pub fn coral_adaptation(
    xs: &Array2<f64>,
    xt: &Array2<f64>,
    direction: Direction,
) -> Result<(Array2<f64>, Array2<f64>)> {
    match direction {
        Direction::SourceToTarget => {
            let mapped = recolor(xs, xt)?;
            Ok((mapped, xt.clone()))
        }
        Direction::TargetToSource => {
            let mapped = recolor(xt, xs)?;
            Ok((xs.clone(), mapped))
        }
    }
}

/// Whiten `from` with its covariance and recolor with `to`'s.
fn recolor(from: &Array2<f64>, to: &Array2<f64>) -> Result<Array2<f64>> {
    let mut cov_from = linalg::covariance(from);
    let mut cov_to = linalg::covariance(to);
    // Ridge keeps both covariances full-rank.
    for i in 0..cov_from.nrows() {
        cov_from[[i, i]] += COV_RIDGE;
        cov_to[[i, i]] += COV_RIDGE;
    }
    let whiten = linalg::symmetric_matrix_power(&cov_from, -0.5, EIG_FLOOR)?;
    let color = linalg::symmetric_matrix_power(&cov_to, 0.5, EIG_FLOOR)?;
    Ok(from.dot(&whiten).dot(&color))
}
