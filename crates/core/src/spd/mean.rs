//! Weighted geometric means (centroids) of SPD matrices

use ndarray::{Array2, ArrayView3, Axis};
use tracing::debug;

use super::linalg::{expm, frobenius_norm, invsqrtm, logm, powm, sqrtm, symmetrize};
use super::metric::Metric;
use crate::error::{Error, Result};

/// Stopping tolerance of the Riemannian gradient descent
const RIEMANN_TOL: f64 = 1e-8;
/// Stopping tolerance of the log-det fixed point
const LOGDET_TOL: f64 = 1e-5;
/// Iteration cap shared by the iterative means
const MAX_ITER: usize = 50;

/// Uniform weights when `weights` is `None`, normalized to sum 1 otherwise.
fn normalize_weights(n: usize, weights: Option<&[f64]>) -> Result<Vec<f64>> {
    match weights {
        None => Ok(vec![1.0 / n as f64; n]),
        Some(w) => {
            if w.len() != n {
                return Err(Error::invalid(
                    "sample_weight",
                    w.len(),
                    format!("expected one weight per trial ({})", n),
                ));
            }
            if w.iter().any(|x| !x.is_finite() || *x < 0.0) {
                return Err(Error::invalid(
                    "sample_weight",
                    format!("{:?}", w),
                    "weights must be finite and non-negative",
                ));
            }
            let total: f64 = w.iter().sum();
            if total <= 0.0 {
                return Err(Error::DegenerateInput("sample weights sum to zero".into()));
            }
            Ok(w.iter().map(|x| x / total).collect())
        }
    }
}

fn check_trials(trials: &ArrayView3<'_, f64>) -> Result<usize> {
    let (n_trials, rows, cols) = trials.dim();
    if n_trials == 0 {
        return Err(Error::DegenerateInput("cannot average an empty trial set".into()));
    }
    if rows != cols {
        return Err(Error::shape_mismatch(
            "trials",
            &[n_trials, rows, rows],
            &[n_trials, rows, cols],
        ));
    }
    Ok(n_trials)
}

/// Centroid of `trials` under `metric`, optionally weighted.
pub fn mean(
    trials: ArrayView3<'_, f64>,
    metric: Metric,
    weights: Option<&[f64]>,
) -> Result<Array2<f64>> {
    match metric {
        Metric::Riemann => mean_riemann(trials, weights),
        Metric::LogEuclid => mean_logeuclid(trials, weights),
        Metric::Euclid => mean_euclid(trials, weights),
        Metric::LogDet => mean_logdet(trials, weights),
    }
}

/// Weighted arithmetic mean
pub fn mean_euclid(trials: ArrayView3<'_, f64>, weights: Option<&[f64]>) -> Result<Array2<f64>> {
    let n_trials = check_trials(&trials)?;
    let w = normalize_weights(n_trials, weights)?;
    let (_, n, _) = trials.dim();

    let mut c = Array2::zeros((n, n));
    for (wi, x) in w.iter().zip(trials.axis_iter(Axis(0))) {
        c.scaled_add(*wi, &x);
    }
    Ok(c)
}

/// Log-Euclidean mean `exp(Σ w_i log X_i)`
pub fn mean_logeuclid(trials: ArrayView3<'_, f64>, weights: Option<&[f64]>) -> Result<Array2<f64>> {
    let n_trials = check_trials(&trials)?;
    let w = normalize_weights(n_trials, weights)?;
    let (_, n, _) = trials.dim();

    let mut t = Array2::zeros((n, n));
    for (wi, x) in w.iter().zip(trials.axis_iter(Axis(0))) {
        t.scaled_add(*wi, &logm(x)?);
    }
    expm(t.view())
}

/// Affine-invariant Riemannian (Karcher) mean.
///
/// Gradient descent on the manifold starting from the arithmetic mean.
/// The step size `nu` shrinks by 5% while the step norm keeps decreasing
/// and halves when it grows.
pub fn mean_riemann(trials: ArrayView3<'_, f64>, weights: Option<&[f64]>) -> Result<Array2<f64>> {
    let n_trials = check_trials(&trials)?;
    let w = normalize_weights(n_trials, weights)?;
    let (_, n, _) = trials.dim();

    let mut c = mean_euclid(trials, Some(&w))?;
    let mut nu = 1.0;
    let mut tau = f64::MAX;
    let mut crit = f64::MAX;
    let mut k = 0;

    while crit > RIEMANN_TOL && k < MAX_ITER && nu > RIEMANN_TOL {
        k += 1;
        let c12 = sqrtm(c.view())?;
        let cm12 = invsqrtm(c.view())?;

        let mut j = Array2::zeros((n, n));
        for (wi, x) in w.iter().zip(trials.axis_iter(Axis(0))) {
            let whitened = symmetrize(cm12.dot(&x).dot(&cm12));
            j.scaled_add(*wi, &logm(whitened.view())?);
        }

        crit = frobenius_norm(j.view());
        let h = nu * crit;
        let step = expm((&j * nu).view())?;
        c = symmetrize(c12.dot(&step).dot(&c12));

        if h < tau {
            nu *= 0.95;
            tau = h;
        } else {
            nu *= 0.5;
        }
    }

    debug!(iterations = k, crit, "riemann mean");
    Ok(c)
}

/// Log-determinant mean, fixed point `C ← (Σ w_i ((X_i + C)/2)⁻¹)⁻¹`
pub fn mean_logdet(trials: ArrayView3<'_, f64>, weights: Option<&[f64]>) -> Result<Array2<f64>> {
    let n_trials = check_trials(&trials)?;
    let w = normalize_weights(n_trials, weights)?;
    let (_, n, _) = trials.dim();

    let mut c = mean_euclid(trials, Some(&w))?;
    let mut crit = f64::MAX;
    let mut k = 0;

    while crit > LOGDET_TOL && k < MAX_ITER {
        k += 1;
        let mut j = Array2::zeros((n, n));
        for (wi, x) in w.iter().zip(trials.axis_iter(Axis(0))) {
            let mid = (&x + &c) * 0.5;
            j.scaled_add(*wi, &powm(mid.view(), -1.0)?);
        }
        let next = powm(j.view(), -1.0)?;
        crit = frobenius_norm((&next - &c).view());
        c = next;
    }

    debug!(iterations = k, crit, "logdet mean");
    Ok(c)
}
