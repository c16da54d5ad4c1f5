//! Subspace dimensionality search
//!
//! SA and TCA have a single integer hyperparameter `d`. It is validated
//! with the same label-free consistency idea as the OT grid search: map
//! both domains into the candidate subspace, pseudo-label the mapped
//! target with a source-trained model, and check that a model trained on
//! a stratified half of the pseudo-labeled target still classifies the
//! mapped source.

use ndarray::{Array1, Array2};
use tracing::{info, warn};

use crate::booster::{predict_label, ApRankingObjective, BoosterParams};
use crate::data::sampling::{stratified_subset, SeedSequence};
use crate::error::Result;
use crate::metrics::average_precision;
use crate::transport::subspace::{dimension_candidates, SubspaceAlignment, TransferComponents};
use crate::transport::{AdaptationMethod, Direction, ParamValue, TransportParams};

use super::search::{CandidateFailure, SearchHistory, SearchRecord};

/// Pick the subspace dimensionality for SA or TCA.
///
/// Returns the `d` whose consistency AP is highest; failures per
/// candidate dimension are contained like OT candidates.
pub fn subspace_dimension_search(
    method: AdaptationMethod,
    model_params: &BoosterParams,
    xs: &Array2<f64>,
    ys: &Array1<f64>,
    xt: &Array2<f64>,
    seed: u64,
) -> Result<usize> {
    let objective = ApRankingObjective::default();
    let seeds = SeedSequence::new(seed);
    let mut history = SearchHistory::default();

    for (iteration, d) in dimension_candidates(xs.ncols()).into_iter().enumerate() {
        let mut rng = seeds.candidate_rng(iteration);
        let params = TransportParams::new().with("d", ParamValue::Float(d as f64));

        let outcome = (|| -> Result<SearchRecord> {
            let (mapped_src, mapped_tgt) = match method {
                AdaptationMethod::Sa => {
                    let sa = SubspaceAlignment::fit(xs, xt, d)?;
                    sa.transform(xs, xt, Direction::SourceToTarget)?
                }
                AdaptationMethod::Tca => TransferComponents::new(d).fit_transform(xs, xt)?,
                other => {
                    return Err(crate::error::AdaptError::Validation(format!(
                        "{other} has no subspace dimensionality to search"
                    )))
                }
            };

            let pseudo = predict_label(model_params, &mapped_src, ys, &mapped_tgt, &objective)?;
            let (subset_x, subset_y) = stratified_subset(&mapped_tgt, &pseudo, 0.5, &mut rng);
            let y_pred = predict_label(model_params, &subset_x, &subset_y, &mapped_src, &objective)?;
            let ap = 100.0 * average_precision(ys, &y_pred);
            Ok(SearchRecord {
                params: params.clone(),
                precision: ap,
                average_precision: ap,
            })
        })();

        match outcome {
            Ok(record) => {
                info!(d, average_precision = record.average_precision, "dimension evaluated");
                history.push(record);
            }
            Err(e) => {
                warn!(d, error = %e, "dimension candidate failed, skipping");
                history.push_failure(CandidateFailure {
                    iteration,
                    params,
                    reason: e.to_string(),
                });
            }
        }
    }

    let best = history.best()?;
    Ok(best.params.float("d")? as usize)
}
