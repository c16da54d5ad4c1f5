//! Entropic transport solvers
//!
//! Sinkhorn scaling iterations over a squared-euclidean cost matrix:
//! balanced, class-regularized (LpL1 majoration), unbalanced (KL mass
//! relaxation, optionally per-class reweighted) and joint class-proportion
//! estimation. Divergence surfaces as `SolverFailure` so the caller can
//! skip the candidate instead of aborting the search.

use crate::error::{AdaptError, Result};
use ndarray::{Array1, Array2, Axis};

const SINKHORN_MAX_ITER: usize = 1000;
const SINKHORN_TOL: f64 = 1e-9;
const LPL1_OUTER_ITER: usize = 10;
const LPL1_INNER_ITER: usize = 200;
const JCPOT_ITER: usize = 100;

/// Pairwise squared euclidean distances, rows of `xs` vs rows of `xt`.
pub fn cost_matrix(xs: &Array2<f64>, xt: &Array2<f64>) -> Array2<f64> {
    let ns = xs.nrows();
    let nt = xt.nrows();
    let mut cost = Array2::<f64>::zeros((ns, nt));
    for i in 0..ns {
        let a = xs.row(i);
        for j in 0..nt {
            let b = xt.row(j);
            let mut d = 0.0;
            for (x, y) in a.iter().zip(b.iter()) {
                let diff = x - y;
                d += diff * diff;
            }
            cost[[i, j]] = d;
        }
    }
    cost
}

/// Divide the cost matrix by its median entry, so `reg_e` values keep a
/// comparable meaning across datasets.
pub fn median_normalize(cost: &mut Array2<f64>) {
    let mut values: Vec<f64> = cost.iter().copied().collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if values.is_empty() {
        1.0
    } else {
        values[values.len() / 2]
    };
    if median > 0.0 {
        cost.mapv_inplace(|v| v / median);
    }
}

/// Uniform distribution over `n` atoms.
pub fn uniform_weights(n: usize) -> Array1<f64> {
    Array1::from_elem(n, 1.0 / n as f64)
}

/// Balanced entropic OT via Sinkhorn-Knopp scaling.
pub fn sinkhorn_knopp(
    a: &Array1<f64>,
    b: &Array1<f64>,
    cost: &Array2<f64>,
    reg: f64,
) -> Result<Array2<f64>> {
    check_reg(reg)?;
    let kernel = cost.mapv(|c| (-c / reg).exp());
    let mut u = Array1::from_elem(a.len(), 1.0 / a.len() as f64);
    let mut v = Array1::from_elem(b.len(), 1.0 / b.len() as f64);

    for _ in 0..SINKHORN_MAX_ITER {
        let kv = kernel.dot(&v);
        let u_next = a / &kv.mapv(|x| x.max(f64::MIN_POSITIVE));
        let ktu = kernel.t().dot(&u_next);
        let v_next = b / &ktu.mapv(|x| x.max(f64::MIN_POSITIVE));

        check_finite(&u_next)?;
        check_finite(&v_next)?;

        let delta = u_next
            .iter()
            .zip(u.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max);
        u = u_next;
        v = v_next;
        if delta < SINKHORN_TOL {
            break;
        }
    }

    Ok(scale_kernel(&kernel, &u, &v))
}

/// Class-regularized entropic OT (the LpL1 majoration loop): each outer
/// pass adds a per-class penalty that discourages one target point from
/// receiving mass from several source classes.
pub fn sinkhorn_lpl1(
    a: &Array1<f64>,
    labels: &Array1<f64>,
    b: &Array1<f64>,
    cost: &Array2<f64>,
    reg_e: f64,
    reg_cl: f64,
) -> Result<Array2<f64>> {
    check_reg(reg_e)?;
    let p = 0.5;
    let epsilon = 1e-3;
    let ns = a.len();
    let nt = b.len();

    let classes = unique_classes(labels);
    let mut penalty = Array2::<f64>::zeros((ns, nt));
    let mut coupling = Array2::<f64>::zeros((ns, nt));

    for _ in 0..LPL1_OUTER_ITER {
        let reg_cost = cost + &(penalty.mapv(|w| w * reg_cl));
        coupling = sinkhorn_bounded(a, b, &reg_cost, reg_e, LPL1_INNER_ITER)?;

        penalty.fill(1.0);
        for &class in &classes {
            // Mass each target point receives from this source class.
            let mut class_mass = Array1::<f64>::zeros(nt);
            for i in 0..ns {
                if labels[i] == class {
                    class_mass += &coupling.row(i);
                }
            }
            let majoration = class_mass.mapv(|m| p * (m + epsilon).powf(p - 1.0));
            for i in 0..ns {
                if labels[i] == class {
                    penalty.row_mut(i).assign(&majoration);
                }
            }
        }
    }

    Ok(coupling)
}

/// Unbalanced entropic OT with KL-relaxed marginals (Sinkhorn-Knopp
/// unbalanced). `reg_m` controls how strictly marginals are enforced;
/// per-row exponents support class-reweighted relaxation on the source.
pub fn sinkhorn_unbalanced(
    a: &Array1<f64>,
    b: &Array1<f64>,
    cost: &Array2<f64>,
    reg: f64,
    reg_m_rows: &Array1<f64>,
) -> Result<Array2<f64>> {
    check_reg(reg)?;
    if reg_m_rows.len() != a.len() {
        return Err(AdaptError::Shape(format!(
            "per-row mass relaxation has {} entries for {} source rows",
            reg_m_rows.len(),
            a.len()
        )));
    }
    let kernel = cost.mapv(|c| (-c / reg).exp());
    let fi_rows = reg_m_rows.mapv(|m| m / (m + reg));
    let fi_mean = reg_m_rows.mean().unwrap_or(1.0);
    let fi_cols = fi_mean / (fi_mean + reg);

    let mut u = Array1::from_elem(a.len(), 1.0);
    let mut v = Array1::from_elem(b.len(), 1.0);

    for _ in 0..SINKHORN_MAX_ITER {
        let kv = kernel.dot(&v);
        let mut u_next = Array1::<f64>::zeros(a.len());
        for i in 0..a.len() {
            u_next[i] = (a[i] / kv[i].max(f64::MIN_POSITIVE)).powf(fi_rows[i]);
        }
        let ktu = kernel.t().dot(&u_next);
        let v_next =
            Array1::from_shape_fn(b.len(), |j| (b[j] / ktu[j].max(f64::MIN_POSITIVE)).powf(fi_cols));

        check_finite(&u_next)?;
        check_finite(&v_next)?;

        let delta = u_next
            .iter()
            .zip(u.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max);
        u = u_next;
        v = v_next;
        if delta < SINKHORN_TOL {
            break;
        }
    }

    Ok(scale_kernel(&kernel, &u, &v))
}

/// Joint class-proportion transport: estimate the unobserved target class
/// proportions by Bregman projections on per-class masses, then return
/// the proportion-corrected coupling (single source pair).
pub fn jcpot_coupling(
    a: &Array1<f64>,
    labels: &Array1<f64>,
    b: &Array1<f64>,
    cost: &Array2<f64>,
    reg: f64,
) -> Result<Array2<f64>> {
    check_reg(reg)?;
    let ns = a.len();
    let classes = unique_classes(labels);

    // Class-membership operators: d1 averages rows of a class, d2 sums them.
    let mut d1 = Array2::<f64>::zeros((classes.len(), ns));
    let mut d2 = Array2::<f64>::zeros((classes.len(), ns));
    for (c_idx, &class) in classes.iter().enumerate() {
        let count = labels.iter().filter(|&&y| y == class).count();
        if count == 0 {
            continue;
        }
        for i in 0..ns {
            if labels[i] == class {
                d1[[c_idx, i]] = 1.0 / count as f64;
                d2[[c_idx, i]] = 1.0;
            }
        }
    }

    let mut coupling = cost.mapv(|c| (-c / reg).exp());
    for _ in 0..JCPOT_ITER {
        // Project columns on the target marginal.
        coupling = project_columns(&coupling, b)?;
        // Estimated class proportions from current row masses.
        let row_mass = coupling.sum_axis(Axis(1));
        let proportions = d1.dot(&row_mass);
        // Project rows on the proportion-derived masses.
        let desired = d2.t().dot(&proportions);
        coupling = project_rows(&coupling, &desired)?;
        check_finite(&coupling.sum_axis(Axis(1)))?;
    }

    Ok(coupling)
}

fn sinkhorn_bounded(
    a: &Array1<f64>,
    b: &Array1<f64>,
    cost: &Array2<f64>,
    reg: f64,
    max_iter: usize,
) -> Result<Array2<f64>> {
    let kernel = cost.mapv(|c| (-c / reg).exp());
    let mut u = Array1::from_elem(a.len(), 1.0 / a.len() as f64);
    let mut v = Array1::from_elem(b.len(), 1.0 / b.len() as f64);
    for _ in 0..max_iter {
        let kv = kernel.dot(&v);
        u = a / &kv.mapv(|x| x.max(f64::MIN_POSITIVE));
        let ktu = kernel.t().dot(&u);
        v = b / &ktu.mapv(|x| x.max(f64::MIN_POSITIVE));
        check_finite(&u)?;
        check_finite(&v)?;
    }
    Ok(scale_kernel(&kernel, &u, &v))
}

fn scale_kernel(kernel: &Array2<f64>, u: &Array1<f64>, v: &Array1<f64>) -> Array2<f64> {
    let mut out = kernel.clone();
    for (i, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val *= u[i] * v[j];
        }
    }
    out
}

fn project_rows(coupling: &Array2<f64>, target: &Array1<f64>) -> Result<Array2<f64>> {
    let mut out = coupling.clone();
    for (i, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        let sum: f64 = row.iter().sum();
        if sum > 0.0 {
            let scale = target[i] / sum;
            row.mapv_inplace(|v| v * scale);
        }
    }
    Ok(out)
}

fn project_columns(coupling: &Array2<f64>, target: &Array1<f64>) -> Result<Array2<f64>> {
    let mut out = coupling.clone();
    for j in 0..out.ncols() {
        let sum: f64 = out.column(j).iter().sum();
        if sum > 0.0 {
            let scale = target[j] / sum;
            out.column_mut(j).mapv_inplace(|v| v * scale);
        }
    }
    Ok(out)
}

fn unique_classes(labels: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = Vec::new();
    for &y in labels.iter() {
        if !classes.contains(&y) {
            classes.push(y);
        }
    }
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes
}

fn check_reg(reg: f64) -> Result<()> {
    if reg <= 0.0 || !reg.is_finite() {
        return Err(AdaptError::SolverFailure(format!(
            "entropic regularization must be positive and finite, got {reg}"
        )));
    }
    Ok(())
}

fn check_finite(v: &Array1<f64>) -> Result<()> {
    if v.iter().any(|x| !x.is_finite()) {
        return Err(AdaptError::SolverFailure(
            "scaling vector diverged (non-finite values)".into(),
        ));
    }
    Ok(())
}
