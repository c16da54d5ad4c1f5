//! Feature rescaling
//!
//! Per-feature scaling with an exact inverse. The harness rescales source
//! and target before adaptation and inverse-rescales before the final
//! fit, so the booster sees features on their original magnitudes.

use crate::error::{AdaptError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalerKind {
    /// Divide each feature by its L2 norm over the fit data.
    L2Norm,
    /// Center on the median, scale by the interquartile range.
    Robust,
}

/// Parameters for one fitted feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FeatureParams {
    center: f64,
    scale: f64,
}

/// A fitted per-feature scaler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScaler {
    kind: ScalerKind,
    params: Vec<FeatureParams>,
}

impl FeatureScaler {
    /// Fit scaling parameters on `x` (typically the source domain).
    pub fn fit(kind: ScalerKind, x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(AdaptError::Data("cannot fit scaler on empty matrix".into()));
        }
        let params = match kind {
            ScalerKind::L2Norm => x
                .axis_iter(Axis(1))
                .map(|col| {
                    let norm = col.iter().map(|v| v * v).sum::<f64>().sqrt();
                    FeatureParams {
                        center: 0.0,
                        scale: if norm > 0.0 { norm } else { 1.0 },
                    }
                })
                .collect(),
            ScalerKind::Robust => x
                .axis_iter(Axis(1))
                .map(|col| {
                    let mut sorted: Vec<f64> = col.to_vec();
                    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                    let median = percentile(&sorted, 0.5);
                    let iqr = percentile(&sorted, 0.75) - percentile(&sorted, 0.25);
                    FeatureParams {
                        center: median,
                        scale: if iqr > 0.0 { iqr } else { 1.0 },
                    }
                })
                .collect(),
        };
        Ok(Self { kind, params })
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    /// Scale a matrix with the fitted parameters.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        let mut out = x.clone();
        for (j, p) in self.params.iter().enumerate() {
            let mut col = out.column_mut(j);
            col.mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(out)
    }

    /// Undo [`transform`](Self::transform) exactly.
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        let mut out = x.clone();
        for (j, p) in self.params.iter().enumerate() {
            let mut col = out.column_mut(j);
            col.mapv_inplace(|v| v * p.scale + p.center);
        }
        Ok(out)
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.params.len() {
            return Err(AdaptError::Shape(format!(
                "scaler fitted on {} features, got {}",
                self.params.len(),
                x.ncols()
            )));
        }
        Ok(())
    }
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}
