//! Distances between SPD matrices

use ndarray::ArrayView2;

use super::linalg::{frobenius_norm, invsqrtm, log_det, logm, symmetric_eigen, symmetrize};
use super::metric::Metric;
use crate::error::{Error, Result};

fn check_pair(a: &ArrayView2<'_, f64>, b: &ArrayView2<'_, f64>) -> Result<()> {
    if a.dim() != b.dim() {
        let (ar, ac) = a.dim();
        let (br, bc) = b.dim();
        return Err(Error::shape_mismatch("matrix", &[ar, ac], &[br, bc]));
    }
    Ok(())
}

/// Distance between two SPD matrices under `metric`.
pub fn distance(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>, metric: Metric) -> Result<f64> {
    match metric {
        Metric::Riemann => distance_riemann(a, b),
        Metric::LogEuclid => distance_logeuclid(a, b),
        Metric::Euclid => distance_euclid(a, b),
        Metric::LogDet => distance_logdet(a, b),
    }
}

/// Affine-invariant Riemannian distance
///
/// `d(A, B) = sqrt(Σ ln² λ_i)` with `λ_i` the eigenvalues of
/// `A^{-1/2} B A^{-1/2}` (the generalized eigenvalues of the pair).
pub fn distance_riemann(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<f64> {
    check_pair(&a, &b)?;
    let isa = invsqrtm(a)?;
    let m = symmetrize(isa.dot(&b).dot(&isa));
    let eig = symmetric_eigen(m.view())?;
    if eig.min_eigenvalue() <= 0.0 {
        return Err(Error::DegenerateInput(
            "riemann distance requires SPD matrices".into(),
        ));
    }
    Ok(eig.eigenvalues.iter().map(|l| l.ln().powi(2)).sum::<f64>().sqrt())
}

/// Log-Euclidean distance `‖log A − log B‖_F`
pub fn distance_logeuclid(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<f64> {
    check_pair(&a, &b)?;
    let diff = logm(a)? - logm(b)?;
    Ok(frobenius_norm(diff.view()))
}

/// Euclidean (Frobenius) distance `‖A − B‖_F`
pub fn distance_euclid(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<f64> {
    check_pair(&a, &b)?;
    Ok(frobenius_norm((&a - &b).view()))
}

/// Log-determinant (Stein / Jensen-Bregman) distance
///
/// `d(A, B) = sqrt(ln det((A + B) / 2) − ½ ln det(A B))`
pub fn distance_logdet(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<f64> {
    check_pair(&a, &b)?;
    let half_sum = (&a + &b) * 0.5;
    let value = log_det(half_sum.view())? - 0.5 * (log_det(a)? + log_det(b)?);
    // Round-off can push identical matrices slightly below zero
    Ok(value.max(0.0).sqrt())
}
