//! Target degradation
//!
//! Simulates distribution shift by perturbing selected features of the
//! target split: a nonzero coefficient rescales the column, a zero
//! coefficient zeroes out a random half of its rows.

use ndarray::Array2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Degradation plan used by the toy pipeline: features 2 and 3 rescaled
/// by 0.1 and 10, feature 4 half-zeroed.
pub const TOY_DEGRADATION: [(usize, f64); 3] = [(2, 0.1), (3, 10.0), (4, 0.0)];

/// Apply a degradation plan in place.
pub fn degrade_features(x: &mut Array2<f64>, plan: &[(usize, f64)], rng: &mut ChaCha8Rng) {
    let n = x.nrows();
    for &(feat, coef) in plan {
        if feat >= x.ncols() {
            continue;
        }
        if coef != 0.0 {
            for i in 0..n {
                x[[i, feat]] *= coef;
            }
        } else {
            // Half the rows, drawn with replacement.
            for _ in 0..n / 2 {
                let i = rng.gen_range(0..n);
                x[[i, feat]] = 0.0;
            }
        }
    }
}
