//! Covariance from curvature.
//!
//! At a minimum of `−ln L`, the covariance estimate is `H⁻¹`. The Hessian
//! from finite differences may be indefinite or near-singular (flat
//! directions, optimum on a bound), so inversion degrades in stages:
//!
//! 1. Cholesky (the expected case: `H` positive definite)
//! 2. general LU inverse, kept only if every variance is finite and > 0
//! 3. diagonal `1 / H_ii`, ignoring correlations
//!
//! Any stage past the first is logged.

use nalgebra::DMatrix;

/// How a covariance matrix was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inversion {
    Cholesky,
    Lu,
    Diagonal,
}

/// Invert a Hessian of `−ln L` into a covariance matrix.
///
/// Variances that cannot be determined come out as NaN.
pub fn covariance_from_hessian(hessian: &DMatrix<f64>) -> (DMatrix<f64>, Inversion) {
    if hessian.iter().all(|v| v.is_finite()) {
        if let Some(chol) = hessian.clone().cholesky() {
            return (chol.inverse(), Inversion::Cholesky);
        }
        if let Some(inv) = hessian.clone().try_inverse()
            && inv.diagonal().iter().all(|v| v.is_finite() && *v > 0.0)
        {
            log::warn!("Hessian is not positive definite; covariance from LU inverse");
            return (inv, Inversion::Lu);
        }
    }

    log::warn!("Hessian could not be inverted; covariance from its diagonal only");
    let n = hessian.nrows();
    let mut cov = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        let h = hessian[(i, i)];
        cov[(i, i)] = if h.is_finite() && h > 0.0 { 1.0 / h } else { f64::NAN };
    }
    (cov, Inversion::Diagonal)
}

/// Square roots of the diagonal; NaN variances stay NaN.
pub fn standard_errors(cov: &DMatrix<f64>) -> Vec<f64> {
    cov.diagonal().iter().map(|v| v.sqrt()).collect()
}
