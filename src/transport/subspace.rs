//! Subspace-based alignment
//!
//! SA aligns the PCA bases of the two domains; TCA learns shared transfer
//! components from an MMD-regularized eigenproblem over the joint linear
//! kernel. Both reduce dimensionality to `d`, unlike the OT family which
//! preserves it.

use crate::error::{AdaptError, Result};
use ndarray::{Array2, Axis};

use super::linalg;
use super::Direction;

/// Subspace alignment: project each domain on its own `d` principal
/// components, then rotate the projected-from domain's basis onto the
/// other's (`M = P_fromᵀ · P_to`).
///
/// The clean backup must go through a *fresh* fit on (original source,
/// clean) — routing it through the degraded-target fit would leak the
/// degraded geometry into the clean baseline.
#[derive(Debug, Clone)]
pub struct SubspaceAlignment {
    d: usize,
    source_basis: Array2<f64>,
    target_basis: Array2<f64>,
}

impl SubspaceAlignment {
    pub fn fit(xs: &Array2<f64>, xt: &Array2<f64>, d: usize) -> Result<Self> {
        if d == 0 || d > xs.ncols() {
            return Err(AdaptError::Validation(format!(
                "subspace dimensionality {d} out of range for {} features",
                xs.ncols()
            )));
        }
        Ok(Self {
            d,
            source_basis: linalg::pca_basis(xs, d)?,
            target_basis: linalg::pca_basis(xt, d)?,
        })
    }

    pub fn dim(&self) -> usize {
        self.d
    }

    /// Map both domains into the shared `d`-dimensional space. With
    /// `Direction::SourceToTarget` the source basis is aligned onto the
    /// target's; the transpose direction swaps the roles.
    pub fn transform(
        &self,
        xs: &Array2<f64>,
        xt: &Array2<f64>,
        direction: Direction,
    ) -> Result<(Array2<f64>, Array2<f64>)> {
        let align = match direction {
            Direction::SourceToTarget => self.source_basis.t().dot(&self.target_basis),
            Direction::TargetToSource => self.target_basis.t().dot(&self.source_basis),
        };
        match direction {
            Direction::SourceToTarget => Ok((
                xs.dot(&self.source_basis).dot(&align),
                xt.dot(&self.target_basis),
            )),
            Direction::TargetToSource => Ok((
                xs.dot(&self.source_basis),
                xt.dot(&self.target_basis).dot(&align),
            )),
        }
    }
}

/// Transfer component analysis with a linear kernel.
///
/// Builds the joint kernel over stacked source and target rows, applies
/// the MMD operator `L` and centering `H`, and keeps the top-`d`
/// eigenvectors of `(KLK + mu·I)⁻¹ KHK` as shared components. The clean
/// baseline is mapped with the *original* pre-adaptation target as
/// reference so it stays an independent measurement.
#[derive(Debug, Clone)]
pub struct TransferComponents {
    d: usize,
    mu: f64,
}

impl TransferComponents {
    pub fn new(d: usize) -> Self {
        Self { d, mu: 1.0 }
    }

    /// Fit on the two domains and return both mapped into the shared
    /// latent space: `(source_latent, target_latent)`.
    pub fn fit_transform(
        &self,
        xs: &Array2<f64>,
        xt: &Array2<f64>,
    ) -> Result<(Array2<f64>, Array2<f64>)> {
        let ns = xs.nrows();
        let nt = xt.nrows();
        let n = ns + nt;
        if self.d == 0 || self.d > n {
            return Err(AdaptError::Validation(format!(
                "latent dimensionality {} out of range for {n} joint rows",
                self.d
            )));
        }
        if xs.ncols() != xt.ncols() {
            return Err(AdaptError::Shape(format!(
                "domains disagree on feature count: {} vs {}",
                xs.ncols(),
                xt.ncols()
            )));
        }

        // Stacked linear kernel.
        let mut joint = Array2::<f64>::zeros((n, xs.ncols()));
        joint.slice_mut(ndarray::s![..ns, ..]).assign(xs);
        joint.slice_mut(ndarray::s![ns.., ..]).assign(xt);
        let kernel = joint.dot(&joint.t());

        // MMD operator.
        let mut l = Array2::<f64>::zeros((n, n));
        let ss = 1.0 / (ns as f64 * ns as f64);
        let tt = 1.0 / (nt as f64 * nt as f64);
        let st = -1.0 / (ns as f64 * nt as f64);
        for i in 0..n {
            for j in 0..n {
                l[[i, j]] = match (i < ns, j < ns) {
                    (true, true) => ss,
                    (false, false) => tt,
                    _ => st,
                };
            }
        }

        // Centering matrix H = I - 1/n.
        let mut h = Array2::<f64>::from_elem((n, n), -1.0 / n as f64);
        for i in 0..n {
            h[[i, i]] += 1.0;
        }

        let klk = kernel.dot(&l).dot(&kernel);
        let khk = kernel.dot(&h).dot(&kernel);

        // Symmetrize (KLK + mu I) and reduce the generalized problem to a
        // symmetric one through its Cholesky factor.
        let mut left = (&klk + &klk.t()) * 0.5;
        for i in 0..n {
            left[[i, i]] += self.mu;
        }
        let chol = linalg::cholesky(&left)?;
        let khk_sym = (&khk + &khk.t()) * 0.5;

        // B = L⁻¹ · KHK · L⁻ᵀ, eigen of B, components = L⁻ᵀ · eigvecs.
        let b = triangular_sandwich(&chol, &khk_sym);
        let (_, vectors) = linalg::symmetric_eigen(&b)?;
        let top = vectors.select(Axis(1), &(0..self.d).collect::<Vec<_>>());
        let mut components = Array2::<f64>::zeros((n, self.d));
        for j in 0..self.d {
            let col = top.column(j).to_owned();
            let solved = linalg::solve_upper_from_lower(&chol, &col);
            components.column_mut(j).assign(&solved);
        }

        let latent = kernel.dot(&components);
        let source_latent = latent.slice(ndarray::s![..ns, ..]).to_owned();
        let target_latent = latent.slice(ndarray::s![ns.., ..]).to_owned();
        Ok((source_latent, target_latent))
    }
}

/// `L⁻¹ · A · L⁻ᵀ` for lower-triangular `L` and symmetric `A`.
fn triangular_sandwich(l: &Array2<f64>, a: &Array2<f64>) -> Array2<f64> {
    let n = a.nrows();
    // First solve L · Y = A column-wise, then L · Bᵀ = Yᵀ.
    let mut y = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let col = a.column(j).to_owned();
        y.column_mut(j)
            .assign(&linalg::solve_lower_triangular(l, &col));
    }
    let mut b = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        let row = y.row(i).to_owned();
        b.row_mut(i)
            .assign(&linalg::solve_lower_triangular(l, &row));
    }
    // Enforce symmetry lost to roundoff.
    (&b + &b.t()) * 0.5
}

/// Validation curve for `d`: candidate dimensionalities for a subspace
/// search given the feature count.
pub fn dimension_candidates(n_features: usize) -> Vec<usize> {
    (1..=n_features.min(8)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn domains() -> (Array2<f64>, Array2<f64>) {
        let xs = array![
            [1.0, 0.1, 0.0],
            [2.0, 0.2, 0.1],
            [3.0, 0.1, 0.0],
            [4.0, 0.3, 0.1],
            [5.0, 0.2, 0.0]
        ];
        let xt = array![
            [1.2, 0.0, 0.3],
            [2.1, 0.1, 0.2],
            [3.3, 0.0, 0.4],
            [4.2, 0.2, 0.3]
        ];
        (xs, xt)
    }

    #[test]
    fn test_sa_output_dimensionality() {
        let (xs, xt) = domains();
        let sa = SubspaceAlignment::fit(&xs, &xt, 2).unwrap();
        let (ms, mt) = sa.transform(&xs, &xt, Direction::SourceToTarget).unwrap();
        assert_eq!(ms.dim(), (5, 2));
        assert_eq!(mt.dim(), (4, 2));
    }

    #[test]
    fn test_sa_direction_changes_which_side_is_rotated() {
        let (xs, xt) = domains();
        let sa = SubspaceAlignment::fit(&xs, &xt, 2).unwrap();
        let (_, mt_fwd) = sa.transform(&xs, &xt, Direction::SourceToTarget).unwrap();
        let (_, mt_rev) = sa.transform(&xs, &xt, Direction::TargetToSource).unwrap();
        // Forward leaves the target in its own subspace; transpose rotates it.
        let diff: f64 = mt_fwd
            .iter()
            .zip(mt_rev.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(diff > 1e-9);
    }

    #[test]
    fn test_fresh_fit_differs_from_degraded_fit() {
        let (xs, xt) = domains();
        // "Clean" counterpart: the target before a degradation.
        let mut degraded = xt.clone();
        for i in 0..degraded.nrows() {
            degraded[[i, 1]] *= 10.0;
        }
        let fresh = SubspaceAlignment::fit(&xs, &xt, 2).unwrap();
        let from_degraded = SubspaceAlignment::fit(&xs, &degraded, 2).unwrap();
        let (_, clean_fresh) = fresh.transform(&xs, &xt, Direction::SourceToTarget).unwrap();
        let (_, clean_via_degraded) = from_degraded
            .transform(&xs, &xt, Direction::SourceToTarget)
            .unwrap();
        let diff: f64 = clean_fresh
            .iter()
            .zip(clean_via_degraded.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(diff > 1e-9, "degraded-fit mapping must not be interchangeable");
    }

    #[test]
    fn test_tca_latent_shapes() {
        let (xs, xt) = domains();
        let tca = TransferComponents::new(2);
        let (ls, lt) = tca.fit_transform(&xs, &xt).unwrap();
        assert_eq!(ls.dim(), (5, 2));
        assert_eq!(lt.dim(), (4, 2));
        assert!(ls.iter().chain(lt.iter()).all(|v| v.is_finite()));
    }

    #[test]
    fn test_tca_rejects_bad_dim() {
        let (xs, xt) = domains();
        assert!(TransferComponents::new(0).fit_transform(&xs, &xt).is_err());
        assert!(TransferComponents::new(100).fit_transform(&xs, &xt).is_err());
    }

    #[test]
    fn test_sa_rejects_bad_dim() {
        let (xs, xt) = domains();
        assert!(SubspaceAlignment::fit(&xs, &xt, 0).is_err());
        assert!(SubspaceAlignment::fit(&xs, &xt, 4).is_err());
    }
}
