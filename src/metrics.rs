//! Ranking metrics
//!
//! Average Precision is the target metric throughout: the booster's early
//! stopping maximizes it, the cross-validator selects by it, and the
//! evaluation harness reports it on all four splits.

use ndarray::Array1;

/// Average Precision: area under the precision-recall curve, computed as
/// `AP = Σ (R_n - R_{n-1}) * P_n` over descending score thresholds.
///
/// Ties are handled by grouping equal scores into a single threshold step.
/// Returns 0.0 when the batch contains no positive labels.
pub fn average_precision(y_true: &Array1<f64>, scores: &Array1<f64>) -> f64 {
    debug_assert_eq!(y_true.len(), scores.len());
    let n = y_true.len();
    let n_pos = y_true.iter().filter(|&&y| y == 1.0).count();
    if n == 0 || n_pos == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ap = 0.0;
    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut prev_recall = 0.0;
    let mut i = 0;
    while i < n {
        // Advance over the whole tie group before evaluating precision.
        let threshold = scores[order[i]];
        while i < n && scores[order[i]] == threshold {
            if y_true[order[i]] == 1.0 {
                tp += 1;
            }
            seen += 1;
            i += 1;
        }
        let precision = tp as f64 / seen as f64;
        let recall = tp as f64 / n_pos as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }
    ap
}

/// Exact-match agreement between hard label vectors, in [0, 1].
///
/// The cross-validator reports this alongside AP as the `precision` field
/// of every search record.
pub fn label_agreement(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    debug_assert_eq!(y_true.len(), y_pred.len());
    if y_true.is_empty() {
        return 0.0;
    }
    let matches = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(a, b)| (*a - *b).abs() < 0.5)
        .count();
    matches as f64 / y_true.len() as f64
}
