//! Dense linear algebra on symmetric matrices
//!
//! Everything the metrics need reduces to one operation: decompose a
//! symmetric matrix `M = V Λ Vᵀ` and rebuild `V f(Λ) Vᵀ` for some scalar
//! function `f`. The decomposition is a cyclic Jacobi sweep, which is exact
//! enough for covariance-sized matrices (tens of channels) and needs no
//! LAPACK.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use tracing::warn;

use crate::error::{Error, Result};

/// Maximum number of full Jacobi sweeps
const MAX_SWEEPS: usize = 64;

/// Relative off-diagonal norm at which a sweep is considered converged
const JACOBI_TOL: f64 = 1e-15;

/// Relative asymmetry tolerated by [`is_spd`]
const SYMMETRY_TOL: f64 = 1e-10;

/// Eigen-decomposition of a symmetric matrix, eigenvalues ascending.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues in ascending order
    pub eigenvalues: Array1<f64>,
    /// Column `i` is the unit eigenvector of `eigenvalues[i]`
    pub eigenvectors: Array2<f64>,
}

impl SymmetricEigen {
    /// Rebuild `V diag(f(λ)) Vᵀ`
    pub fn recompose<F: Fn(f64) -> f64>(&self, f: F) -> Array2<f64> {
        let mapped = self.eigenvalues.mapv(f);
        let scaled = &self.eigenvectors * &mapped;
        symmetrize(scaled.dot(&self.eigenvectors.t()))
    }

    /// Smallest eigenvalue (`NAN` for an empty matrix)
    pub fn min_eigenvalue(&self) -> f64 {
        self.eigenvalues.iter().next().copied().unwrap_or(f64::NAN)
    }
}

fn check_square(matrix: &ArrayView2<'_, f64>) -> Result<usize> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(Error::shape_mismatch("matrix", &[rows, rows], &[rows, cols]));
    }
    if rows == 0 {
        return Err(Error::DegenerateInput("empty matrix".into()));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(Error::DegenerateInput("matrix contains non-finite values".into()));
    }
    Ok(rows)
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Only the symmetric part of `matrix` is used.
pub fn symmetric_eigen(matrix: ArrayView2<'_, f64>) -> Result<SymmetricEigen> {
    let n = check_square(&matrix)?;

    let mut a = symmetrize(matrix.to_owned());
    let mut v: Array2<f64> = Array2::eye(n);

    if !jacobi_sweeps(&mut a, &mut v, MAX_SWEEPS) {
        warn!(n, sweeps = MAX_SWEEPS, "Jacobi eigen-decomposition did not converge");
    }

    // Sort by eigenvalue ascending
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[i, i]].total_cmp(&a[[j, j]]));

    let eigenvalues = Array1::from_iter(order.iter().map(|&i| a[[i, i]]));
    let eigenvectors = v.select(Axis(1), &order);

    Ok(SymmetricEigen {
        eigenvalues,
        eigenvectors,
    })
}

/// Run up to `max_sweeps` cyclic Jacobi sweeps on `a`, accumulating the
/// rotations into `v`. Returns whether the off-diagonal part vanished.
fn jacobi_sweeps(a: &mut Array2<f64>, v: &mut Array2<f64>, max_sweeps: usize) -> bool {
    let n = a.nrows();
    let scale = frobenius_norm(a.view()).max(f64::MIN_POSITIVE);

    for _sweep in 0..max_sweeps {
        if off_diagonal_norm(a) <= JACOBI_TOL * scale {
            return true;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                let g = 100.0 * apq.abs();
                if apq.abs() <= f64::MIN_POSITIVE
                    || (a[[p, p]].abs() + g == a[[p, p]].abs()
                        && a[[q, q]].abs() + g == a[[q, q]].abs())
                {
                    // Below rounding of both diagonal entries
                    a[[p, q]] = 0.0;
                    a[[q, p]] = 0.0;
                    continue;
                }

                // Rotation zeroing a[p][q] (Rutishauser's stable form)
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                a[[p, q]] = 0.0;
                a[[q, p]] = 0.0;
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }
    off_diagonal_norm(a) <= JACOBI_TOL * scale
}

/// Norm of the strict upper triangle
fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    let mut off = 0.0;
    for p in 0..n {
        for q in (p + 1)..n {
            off += a[[p, q]] * a[[p, q]];
        }
    }
    off.sqrt()
}

/// Decompose and require strictly positive eigenvalues.
fn spd_eigen(matrix: ArrayView2<'_, f64>, op: &str) -> Result<SymmetricEigen> {
    let eig = symmetric_eigen(matrix)?;
    let min = eig.min_eigenvalue();
    if min <= 0.0 {
        return Err(Error::DegenerateInput(format!(
            "{} requires an SPD matrix, smallest eigenvalue is {:e}",
            op, min
        )));
    }
    Ok(eig)
}

/// Matrix square root `M^{1/2}`
pub fn sqrtm(matrix: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    Ok(spd_eigen(matrix, "sqrtm")?.recompose(f64::sqrt))
}

/// Inverse square root `M^{-1/2}`
pub fn invsqrtm(matrix: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    Ok(spd_eigen(matrix, "invsqrtm")?.recompose(|x| 1.0 / x.sqrt()))
}

/// Matrix logarithm of an SPD matrix
pub fn logm(matrix: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    Ok(spd_eigen(matrix, "logm")?.recompose(f64::ln))
}

/// Matrix exponential of a symmetric matrix
pub fn expm(matrix: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    Ok(symmetric_eigen(matrix)?.recompose(f64::exp))
}

/// Matrix power `M^alpha` of an SPD matrix. `powm(m, -1.0)` is the inverse.
pub fn powm(matrix: ArrayView2<'_, f64>, alpha: f64) -> Result<Array2<f64>> {
    Ok(spd_eigen(matrix, "powm")?.recompose(|x| x.powf(alpha)))
}

/// `ln det M` of an SPD matrix
pub fn log_det(matrix: ArrayView2<'_, f64>) -> Result<f64> {
    Ok(spd_eigen(matrix, "log_det")?.eigenvalues.mapv(f64::ln).sum())
}

/// Symmetric positive-definiteness check.
pub fn is_spd(matrix: ArrayView2<'_, f64>) -> bool {
    check_spd(matrix).is_ok()
}

/// Like [`is_spd`] but reports why the matrix was rejected.
pub fn check_spd(matrix: ArrayView2<'_, f64>) -> Result<()> {
    check_square(&matrix)?;
    let asym = frobenius_norm((&matrix - &matrix.t()).view());
    let scale = frobenius_norm(matrix).max(f64::MIN_POSITIVE);
    if asym > SYMMETRY_TOL * scale {
        return Err(Error::DegenerateInput(format!(
            "matrix is not symmetric (relative asymmetry {:e})",
            asym / scale
        )));
    }
    spd_eigen(matrix, "check_spd").map(|_| ())
}

/// Sub-matrix keeping the rows and columns listed in `channels`, in order.
pub fn restrict(matrix: ArrayView2<'_, f64>, channels: &[usize]) -> Array2<f64> {
    matrix.select(Axis(0), channels).select(Axis(1), channels)
}

/// Frobenius norm
pub fn frobenius_norm(matrix: ArrayView2<'_, f64>) -> f64 {
    matrix.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// `(M + Mᵀ) / 2`; removes the round-off asymmetry of matrix products.
pub fn symmetrize(matrix: Array2<f64>) -> Array2<f64> {
    let t = matrix.t().to_owned();
    (matrix + t) * 0.5
}
