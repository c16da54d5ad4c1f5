//! Dense linear algebra helpers
//!
//! Hand-rolled symmetric eigen-decomposition (cyclic Jacobi), Cholesky
//! factorization and triangular solves over `ndarray`, sized for the
//! covariance/kernel matrices the alignment strategies build.

use crate::error::{AdaptError, Result};
use ndarray::{Array1, Array2, Axis};

/// Column-mean-centered copy of `x` and the means used.
pub fn center(x: &Array2<f64>) -> (Array2<f64>, Array1<f64>) {
    let means = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let mut out = x.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        row -= &means;
    }
    (out, means)
}

/// Sample covariance of the rows of `x` (features in columns).
pub fn covariance(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let (centered, _) = center(x);
    let denom = if n > 1 { (n - 1) as f64 } else { 1.0 };
    centered.t().dot(&centered) / denom
}

/// Eigen-decomposition of a symmetric matrix via cyclic Jacobi rotations.
///
/// Returns eigenvalues in descending order with matching eigenvector
/// columns. `a` must be square and symmetric; asymmetry beyond roundoff
/// is a caller bug surfaced as a validation error.
pub fn symmetric_eigen(a: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(AdaptError::Shape(format!(
            "eigen-decomposition needs a square matrix, got {}x{}",
            n,
            a.ncols()
        )));
    }
    for i in 0..n {
        for j in (i + 1)..n {
            if (a[[i, j]] - a[[j, i]]).abs() > 1e-6 * (1.0 + a[[i, j]].abs()) {
                return Err(AdaptError::Validation(
                    "eigen-decomposition input is not symmetric".into(),
                ));
            }
        }
    }

    let mut m = a.clone();
    let mut v = Array2::<f64>::eye(n);
    let max_sweeps = 100;

    for _ in 0..max_sweeps {
        let mut off_diag = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                off_diag += m[[i, j] ] * m[[i, j]];
            }
        }
        if off_diag.sqrt() < 1e-12 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if m[[p, q]].abs() < 1e-15 {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * m[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let mkp = m[[k, p]];
                    let mkq = m[[k, q]];
                    m[[k, p]] = c * mkp - s * mkq;
                    m[[k, q]] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let mpk = m[[p, k]];
                    let mqk = m[[q, k]];
                    m[[p, k]] = c * mpk - s * mqk;
                    m[[q, k]] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    // Sort descending by eigenvalue.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        m[[j, j]]
            .partial_cmp(&m[[i, i]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let values = Array1::from_shape_fn(n, |k| m[[order[k], order[k]]]);
    let vectors = v.select(Axis(1), &order);
    Ok((values, vectors))
}

/// Top-`d` principal component basis of `x`, columns = components.
pub fn pca_basis(x: &Array2<f64>, d: usize) -> Result<Array2<f64>> {
    let cov = covariance(x);
    let (_, vectors) = symmetric_eigen(&cov)?;
    let d = d.min(vectors.ncols());
    if d == 0 {
        return Err(AdaptError::Validation(
            "subspace dimensionality must be at least 1".into(),
        ));
    }
    Ok(vectors.select(Axis(1), &(0..d).collect::<Vec<_>>()))
}

/// Symmetric matrix power `a^p` through its eigen-decomposition, with
/// eigenvalues floored at `eps` (used for `p = ±1/2` on covariances).
pub fn symmetric_matrix_power(a: &Array2<f64>, p: f64, eps: f64) -> Result<Array2<f64>> {
    let (values, vectors) = symmetric_eigen(a)?;
    let powered = values.mapv(|v| v.max(eps).powf(p));
    let mut scaled = vectors.clone();
    for (j, mut col) in scaled.axis_iter_mut(Axis(1)).enumerate() {
        col *= powered[j];
    }
    Ok(scaled.dot(&vectors.t()))
}

/// Cholesky factor L of an SPD matrix (`a = L·Lᵀ`), jittered on the
/// diagonal if needed.
pub fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 {
                    sum += 1e-9;
                    if sum <= 0.0 {
                        return Err(AdaptError::Computation(
                            "matrix is not positive definite".into(),
                        ));
                    }
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}

/// Solve `L·x = b` for lower-triangular `L`.
pub fn solve_lower_triangular(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Solve `Lᵀ·x = b` for lower-triangular `L`.
pub fn solve_upper_from_lower(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = b[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_eigen_diagonal() {
        let a = array![[3.0, 0.0], [0.0, 1.0]];
        let (values, vectors) = symmetric_eigen(&a).unwrap();
        assert!((values[0] - 3.0).abs() < 1e-9);
        assert!((values[1] - 1.0).abs() < 1e-9);
        assert!((vectors[[0, 0]].abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_eigen_reconstruction() {
        let a = array![[2.0, 1.0, 0.0], [1.0, 3.0, 0.5], [0.0, 0.5, 1.5]];
        let (values, vectors) = symmetric_eigen(&a).unwrap();
        // V diag(w) Vᵀ reproduces A.
        let mut scaled = vectors.clone();
        for (j, mut col) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            col *= values[j];
        }
        let rebuilt = scaled.dot(&vectors.t());
        for (x, y) in a.iter().zip(rebuilt.iter()) {
            assert!((x - y).abs() < 1e-8);
        }
    }

    #[test]
    fn test_eigen_rejects_asymmetric() {
        let a = array![[1.0, 2.0], [0.0, 1.0]];
        assert!(symmetric_eigen(&a).is_err());
    }

    #[test]
    fn test_matrix_sqrt_roundtrip() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let half = symmetric_matrix_power(&a, 0.5, 1e-12).unwrap();
        let rebuilt = half.dot(&half);
        for (x, y) in a.iter().zip(rebuilt.iter()) {
            assert!((x - y).abs() < 1e-8);
        }
    }

    #[test]
    fn test_cholesky_solves() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let l = cholesky(&a).unwrap();
        let b = array![1.0, 2.0];
        let y = solve_lower_triangular(&l, &b);
        let x = solve_upper_from_lower(&l, &y);
        let ax = a.dot(&x);
        assert!((ax[0] - 1.0).abs() < 1e-9);
        assert!((ax[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_pca_basis_orientation() {
        // Variance concentrated along the first axis.
        let x = array![
            [10.0, 0.1],
            [-10.0, -0.1],
            [8.0, 0.05],
            [-8.0, -0.02],
            [9.0, 0.0]
        ];
        let basis = pca_basis(&x, 1).unwrap();
        assert_eq!(basis.dim(), (2, 1));
        assert!(basis[[0, 0]].abs() > 0.99);
    }
}
