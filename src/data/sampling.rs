//! Stratified sampling and deterministic seeding
//!
//! Every stochastic operation in the search takes an explicit RNG seeded
//! through [`SeedSequence`], never process-wide random state, so
//! concurrent runs are independent and repeated runs reproducible.

use crate::error::{AdaptError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seed for the candidate at `iteration` in a cross-validation run.
///
/// The affine form keeps consecutive candidates far apart in seed space
/// while staying reproducible across runs and machines.
pub fn candidate_seed(iteration: usize) -> u64 {
    4896 * iteration as u64 + 5272
}

/// Explicit seed derivation for a whole run.
///
/// `base` distinguishes independent runs (e.g. worker threads); the
/// candidate index distinguishes iterations inside one search.
#[derive(Debug, Clone, Copy)]
pub struct SeedSequence {
    base: u64,
}

impl SeedSequence {
    pub fn new(base: u64) -> Self {
        Self { base }
    }

    /// RNG for candidate `iteration` of this run.
    pub fn candidate_rng(&self, iteration: usize) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.base.wrapping_add(candidate_seed(iteration)))
    }

    pub fn base(&self) -> u64 {
        self.base
    }
}

/// Stratified shuffle split: `test_size` fraction of each class goes to
/// the second returned pair, the rest to the first.
pub fn stratified_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    rng: &mut ChaCha8Rng,
) -> Result<(Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>)> {
    if x.nrows() != y.len() {
        return Err(AdaptError::Shape(format!(
            "features have {} rows but labels have {} entries",
            x.nrows(),
            y.len()
        )));
    }
    if !(0.0..1.0).contains(&test_size) {
        return Err(AdaptError::Validation(format!(
            "test_size must be in [0, 1), got {test_size}"
        )));
    }

    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();
    for class in unique_labels(y) {
        let mut idx: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == class)
            .map(|(i, _)| i)
            .collect();
        idx.shuffle(rng);
        let n_test = (test_size * idx.len() as f64).round() as usize;
        test_idx.extend_from_slice(&idx[..n_test]);
        train_idx.extend_from_slice(&idx[n_test..]);
    }
    train_idx.sort_unstable();
    test_idx.sort_unstable();

    Ok((
        x.select(Axis(0), &train_idx),
        x.select(Axis(0), &test_idx),
        select_labels(y, &train_idx),
        select_labels(y, &test_idx),
    ))
}

/// Class-stratified random subset keeping fraction `p` of each class,
/// rounding down, with independent shuffling per class.
///
/// Must not be applied to true target labels: class proportions of the
/// target are not observable in the production search.
pub fn stratified_subset(
    x: &Array2<f64>,
    y: &Array1<f64>,
    p: f64,
    rng: &mut ChaCha8Rng,
) -> (Array2<f64>, Array1<f64>) {
    let mut keep = Vec::new();
    for class in unique_labels(y) {
        let mut idx: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == class)
            .map(|(i, _)| i)
            .collect();
        idx.shuffle(rng);
        let n_keep = (p * idx.len() as f64) as usize;
        keep.extend_from_slice(&idx[..n_keep]);
    }
    (x.select(Axis(0), &keep), select_labels(y, &keep))
}

fn unique_labels(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = Vec::new();
    for &v in y.iter() {
        if !classes.contains(&v) {
            classes.push(v);
        }
    }
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes
}

fn select_labels(y: &Array1<f64>, idx: &[usize]) -> Array1<f64> {
    Array1::from_vec(idx.iter().map(|&i| y[i]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn toy(n0: usize, n1: usize) -> (Array2<f64>, Array1<f64>) {
        let n = n0 + n1;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| (i * 3 + j) as f64);
        let y = Array1::from_shape_fn(n, |i| if i < n0 { 0.0 } else { 1.0 });
        (x, y)
    }

    #[test]
    fn test_candidate_seed_formula() {
        assert_eq!(candidate_seed(0), 5272);
        assert_eq!(candidate_seed(3), 4896 * 3 + 5272);
    }

    #[test]
    fn test_stratified_subset_counts() {
        // Class counts {0: 20, 1: 10} at p=0.5 must give {0: 10, 1: 5}.
        let (x, y) = toy(20, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let (xs, ys) = stratified_subset(&x, &y, 0.5, &mut rng);
        assert_eq!(xs.nrows(), 15);
        assert_eq!(ys.iter().filter(|&&v| v == 0.0).count(), 10);
        assert_eq!(ys.iter().filter(|&&v| v == 1.0).count(), 5);
    }

    #[test]
    fn test_stratified_subset_rounds_down() {
        let (x, y) = toy(5, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let (_, ys) = stratified_subset(&x, &y, 0.5, &mut rng);
        assert_eq!(ys.iter().filter(|&&v| v == 0.0).count(), 2);
        assert_eq!(ys.iter().filter(|&&v| v == 1.0).count(), 1);
    }

    #[test]
    fn test_stratified_split_preserves_proportions() {
        let (x, y) = toy(30, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (xtr, xte, ytr, yte) = stratified_split(&x, &y, 0.3, &mut rng).unwrap();
        assert_eq!(xtr.nrows() + xte.nrows(), 40);
        assert_eq!(ytr.iter().filter(|&&v| v == 1.0).count(), 7);
        assert_eq!(yte.iter().filter(|&&v| v == 1.0).count(), 3);
        assert_eq!(xtr.ncols(), 3);
    }

    #[test]
    fn test_split_rejects_mismatched_shapes() {
        let x = Array2::<f64>::zeros((4, 2));
        let y = Array1::<f64>::zeros(5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(stratified_split(&x, &y, 0.3, &mut rng).is_err());
    }

    #[test]
    fn test_seed_sequence_reproducible() {
        let seq = SeedSequence::new(42);
        let (x, y) = toy(10, 10);
        let (_, a) = stratified_subset(&x, &y, 0.5, &mut seq.candidate_rng(2));
        let (_, b) = stratified_subset(&x, &y, 0.5, &mut seq.candidate_rng(2));
        assert_eq!(a, b);
    }
}
