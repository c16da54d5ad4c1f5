//! OT-family adaptation strategies
//!
//! Each variant fits a [`TransportPlan`] from source features, source
//! labels and unlabeled target features. Target labels are never
//! consulted here; the cheat mode lives entirely in the cross-validator.

use crate::error::{AdaptError, Result};
use ndarray::{Array1, Array2};

use super::plan::TransportPlan;
use super::solvers;
use super::{AdaptationMethod, TransportParams};

/// A strategy that fits a row-wise coupling between two domains.
pub trait CouplingStrategy: Send + Sync {
    fn fit(&self, xs: &Array2<f64>, ys: &Array1<f64>, xt: &Array2<f64>) -> Result<TransportPlan>;
}

/// Balanced entropic OT with class-aware LpL1 regularization.
pub struct BalancedOt {
    reg_e: f64,
    reg_cl: f64,
}

impl BalancedOt {
    pub fn from_params(params: &TransportParams) -> Result<Self> {
        Ok(Self {
            reg_e: params.float("reg_e")?,
            reg_cl: params.float("reg_cl")?,
        })
    }
}

impl CouplingStrategy for BalancedOt {
    fn fit(&self, xs: &Array2<f64>, ys: &Array1<f64>, xt: &Array2<f64>) -> Result<TransportPlan> {
        let mut cost = solvers::cost_matrix(xs, xt);
        solvers::median_normalize(&mut cost);
        let a = solvers::uniform_weights(xs.nrows());
        let b = solvers::uniform_weights(xt.nrows());
        let coupling = solvers::sinkhorn_lpl1(&a, ys, &b, &cost, self.reg_e, self.reg_cl)?;
        TransportPlan::new(coupling, xs.clone(), xt.clone())
    }
}

/// Unbalanced entropic OT with scalar mass relaxation.
pub struct UnbalancedOt {
    reg_e: f64,
    reg_m: f64,
}

impl UnbalancedOt {
    pub fn from_params(params: &TransportParams) -> Result<Self> {
        Ok(Self {
            reg_e: params.float("reg_e")?,
            reg_m: params.float("reg_m")?,
        })
    }
}

impl CouplingStrategy for UnbalancedOt {
    fn fit(&self, xs: &Array2<f64>, _ys: &Array1<f64>, xt: &Array2<f64>) -> Result<TransportPlan> {
        let cost = solvers::cost_matrix(xs, xt);
        let a = solvers::uniform_weights(xs.nrows());
        let b = solvers::uniform_weights(xt.nrows());
        let reg_m_rows = Array1::from_elem(xs.nrows(), self.reg_m);
        let coupling = solvers::sinkhorn_unbalanced(&a, &b, &cost, self.reg_e, &reg_m_rows)?;
        TransportPlan::new(coupling, xs.clone(), xt.clone())
    }
}

/// Unbalanced OT whose mass relaxation is a per-class weight mapping, so
/// minority-class mass can be penalized differently.
pub struct ReweightedUot {
    reg_e: f64,
    class_weights: std::collections::BTreeMap<String, f64>,
}

impl ReweightedUot {
    pub fn from_params(params: &TransportParams) -> Result<Self> {
        Ok(Self {
            reg_e: params.float("reg_e")?,
            class_weights: params.class_weights("reg_m")?.clone(),
        })
    }
}

impl CouplingStrategy for ReweightedUot {
    fn fit(&self, xs: &Array2<f64>, ys: &Array1<f64>, xt: &Array2<f64>) -> Result<TransportPlan> {
        let cost = solvers::cost_matrix(xs, xt);
        let a = solvers::uniform_weights(xs.nrows());
        let b = solvers::uniform_weights(xt.nrows());
        let reg_m_rows = per_row_weights(ys, &self.class_weights)?;
        let coupling = solvers::sinkhorn_unbalanced(&a, &b, &cost, self.reg_e, &reg_m_rows)?;
        TransportPlan::new(coupling, xs.clone(), xt.clone())
    }
}

/// Joint class-proportion OT.
pub struct JointProportionOt {
    reg_e: f64,
}

impl JointProportionOt {
    pub fn from_params(params: &TransportParams) -> Result<Self> {
        Ok(Self {
            reg_e: params.float("reg_e")?,
        })
    }
}

impl CouplingStrategy for JointProportionOt {
    fn fit(&self, xs: &Array2<f64>, ys: &Array1<f64>, xt: &Array2<f64>) -> Result<TransportPlan> {
        let mut cost = solvers::cost_matrix(xs, xt);
        solvers::median_normalize(&mut cost);
        let a = solvers::uniform_weights(xs.nrows());
        let b = solvers::uniform_weights(xt.nrows());
        let coupling = solvers::jcpot_coupling(&a, ys, &b, &cost, self.reg_e)?;
        TransportPlan::new(coupling, xs.clone(), xt.clone())
    }
}

/// Build the coupling strategy for an OT-family method from a candidate's
/// parameters. Fails for non-coupling methods.
pub fn coupling_strategy(
    method: AdaptationMethod,
    params: &TransportParams,
) -> Result<Box<dyn CouplingStrategy>> {
    match method {
        AdaptationMethod::Ot => Ok(Box::new(BalancedOt::from_params(params)?)),
        AdaptationMethod::Uot => Ok(Box::new(UnbalancedOt::from_params(params)?)),
        AdaptationMethod::ReweightUot => Ok(Box::new(ReweightedUot::from_params(params)?)),
        AdaptationMethod::Jcpot => Ok(Box::new(JointProportionOt::from_params(params)?)),
        other => Err(AdaptError::Validation(format!(
            "{other} does not fit a transport coupling"
        ))),
    }
}

fn per_row_weights(
    ys: &Array1<f64>,
    class_weights: &std::collections::BTreeMap<String, f64>,
) -> Result<Array1<f64>> {
    let mut out = Array1::<f64>::zeros(ys.len());
    for (i, &y) in ys.iter().enumerate() {
        let key = format!("{}", y as i64);
        let w = class_weights.get(&key).ok_or_else(|| {
            AdaptError::Validation(format!("no mass-relaxation weight for class '{key}'"))
        })?;
        out[i] = *w;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ParamValue;
    use ndarray::array;
    use std::collections::BTreeMap;

    fn domains() -> (Array2<f64>, Array1<f64>, Array2<f64>) {
        let xs = array![[0.0, 0.0], [0.3, 0.1], [5.0, 5.0], [5.3, 5.1]];
        let ys = array![0.0, 0.0, 1.0, 1.0];
        let xt = array![[0.2, 0.1], [5.1, 5.2]];
        (xs, ys, xt)
    }

    #[test]
    fn test_all_coupling_variants_fit() {
        let (xs, ys, xt) = domains();
        let weight_map = BTreeMap::from([("0".to_string(), 10.0), ("1".to_string(), 1.0)]);

        let cases: Vec<(AdaptationMethod, TransportParams)> = vec![
            (
                AdaptationMethod::Ot,
                TransportParams::new()
                    .with("reg_e", ParamValue::Float(0.5))
                    .with("reg_cl", ParamValue::Float(0.1)),
            ),
            (
                AdaptationMethod::Uot,
                TransportParams::new()
                    .with("reg_e", ParamValue::Float(0.5))
                    .with("reg_m", ParamValue::Float(1.0)),
            ),
            (
                AdaptationMethod::ReweightUot,
                TransportParams::new()
                    .with("reg_e", ParamValue::Float(0.5))
                    .with("reg_m", ParamValue::ClassWeights(weight_map)),
            ),
            (
                AdaptationMethod::Jcpot,
                TransportParams::new().with("reg_e", ParamValue::Float(0.5)),
            ),
        ];

        for (method, params) in cases {
            let strategy = coupling_strategy(method, &params).unwrap();
            let plan = strategy.fit(&xs, &ys, &xt).unwrap();
            let mapped = plan.transform_source();
            assert_eq!(mapped.dim(), (4, 2), "{method}");
            assert!(mapped.iter().all(|v| v.is_finite()), "{method}");
            let back = plan.transform_target();
            assert_eq!(back.dim(), (2, 2), "{method}");
        }
    }

    #[test]
    fn test_missing_param_is_fatal() {
        let params = TransportParams::new().with("reg_e", ParamValue::Float(0.5));
        assert!(coupling_strategy(AdaptationMethod::Ot, &params).is_err());
        assert!(coupling_strategy(AdaptationMethod::Uot, &params).is_err());
    }

    #[test]
    fn test_non_coupling_method_rejected() {
        let params = TransportParams::new();
        assert!(coupling_strategy(AdaptationMethod::Sa, &params).is_err());
        assert!(coupling_strategy(AdaptationMethod::Na, &params).is_err());
    }

    #[test]
    fn test_reweighted_requires_all_classes() {
        let (xs, ys, xt) = domains();
        let weight_map = BTreeMap::from([("0".to_string(), 10.0)]);
        let params = TransportParams::new()
            .with("reg_e", ParamValue::Float(0.5))
            .with("reg_m", ParamValue::ClassWeights(weight_map));
        let strategy = coupling_strategy(AdaptationMethod::ReweightUot, &params).unwrap();
        assert!(strategy.fit(&xs, &ys, &xt).is_err());
    }
}
