//! Finite-difference Hessian of a scalar objective, built on `finitediff`.
//!
//! `finitediff` steps by a fixed absolute `√ε` in every coordinate. The
//! objective is therefore evaluated in scaled coordinates `u`, with
//!
//! ```text
//! x_i = c_i + (h_i / √ε) · u_i,   h_i = ε^(1/4) · max(|x_i|, 1)
//! ```
//!
//! so each physical step is `h_i`, which balances truncation and round-off
//! error for second differences. The nested stencil reaches `2 h_i` from the
//! center `c`, and the center is kept `3 h_i` away from each bound. When `x`
//! is closer than that the center moves inward, and the curvature is the one
//! of the nearest interior point.

use std::cell::RefCell;

use finitediff::FiniteDiff;
use nalgebra::DMatrix;

use crate::error::{FitError, Result};

/// `ε^(1/4)` for f64.
const STEP_SCALE: f64 = 1.220_703_125e-4;

/// Absolute step `finitediff` takes per coordinate.
const FD_STEP: f64 = 1.490_116_119_384_765_6e-8;

/// Distance from the center to a bound, in steps.
const BOUND_MARGIN: f64 = 3.0;

/// Hessian of `f` at `x`, evaluated only inside `bounds`.
///
/// Central differences are tried first. If they give a non-finite entry the
/// forward stencil is tried, and whichever is used is symmetrized. An error
/// from `f` aborts the computation and is returned as-is.
pub fn central_hessian<F>(f: F, x: &[f64], bounds: &[(f64, f64)]) -> Result<DMatrix<f64>>
where
    F: FnMut(&[f64]) -> Result<f64>,
{
    let n = x.len();
    let h: Vec<f64> = x.iter().map(|v| STEP_SCALE * v.abs().max(1.0)).collect();
    let center: Vec<f64> = x
        .iter()
        .zip(&h)
        .enumerate()
        .map(|(i, (&xi, &hi))| {
            let (lo, up) = bounds.get(i).copied().unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
            let (a, b) = (lo + BOUND_MARGIN * hi, up - BOUND_MARGIN * hi);
            let c = if a <= b { xi.clamp(a, b) } else { xi };
            if c != xi {
                log::debug!("hessian stencil for coordinate {i} shifted from {xi} to {c} to stay in bounds");
            }
            c
        })
        .collect();
    let scale: Vec<f64> = h.iter().map(|hi| hi / FD_STEP).collect();

    let eval = RefCell::new(f);
    let failure: RefCell<Option<FitError>> = RefCell::new(None);
    let cost = |u: &Vec<f64>| -> f64 {
        if failure.borrow().is_some() {
            return f64::NAN;
        }
        let point: Vec<f64> = center
            .iter()
            .zip(&scale)
            .zip(u)
            .map(|((c, s), ui)| c + s * ui)
            .collect();
        let value = (&mut *eval.borrow_mut())(&point);
        match value {
            Ok(v) => v,
            Err(e) => {
                failure.replace(Some(e));
                f64::NAN
            }
        }
    };
    let grad = |u: &Vec<f64>| -> Vec<f64> { u.central_diff(&cost) };

    let origin = vec![0.0; n];
    let mut raw = origin.central_hessian(&grad);
    if let Some(e) = failure.take() {
        return Err(e);
    }
    if !all_finite(&raw) {
        log::debug!("central hessian has non-finite entries; trying forward differences");
        let forward = origin.forward_hessian(&grad);
        if let Some(e) = failure.take() {
            return Err(e);
        }
        if all_finite(&forward) {
            raw = forward;
        }
    }

    let mut hess = DMatrix::from_fn(n, n, |i, j| raw[i][j] / (scale[i] * scale[j]));
    symmetrize(&mut hess);
    Ok(hess)
}

fn all_finite(m: &[Vec<f64>]) -> bool {
    m.iter().flatten().all(|v| v.is_finite())
}

fn symmetrize(hess: &mut DMatrix<f64>) {
    for i in 0..hess.nrows() {
        for j in 0..i {
            let avg = 0.5 * (hess[(i, j)] + hess[(j, i)]);
            hess[(i, j)] = avg;
            hess[(j, i)] = avg;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FREE: (f64, f64) = (f64::NEG_INFINITY, f64::INFINITY);

    #[test]
    fn quadratic_form_is_recovered() {
        // f(x) = x0² + 3·x0·x1 + 2·x1²  →  H = [[2, 3], [3, 4]]
        let f = |x: &[f64]| Ok(x[0] * x[0] + 3.0 * x[0] * x[1] + 2.0 * x[1] * x[1]);
        let h = central_hessian(f, &[0.7, -1.3], &[FREE, FREE]).unwrap();
        assert_relative_eq!(h[(0, 0)], 2.0, epsilon = 1e-4);
        assert_relative_eq!(h[(0, 1)], 3.0, epsilon = 1e-4);
        assert_relative_eq!(h[(1, 1)], 4.0, epsilon = 1e-4);
        assert_eq!(h[(0, 1)], h[(1, 0)]);
    }

    #[test]
    fn large_parameters_use_relative_steps() {
        let f = |x: &[f64]| Ok(0.5 * (x[0] - 1e6).powi(2) / 4.0);
        let h = central_hessian(f, &[1e6], &[FREE]).unwrap();
        assert_relative_eq!(h[(0, 0)], 0.25, epsilon = 1e-3);
    }

    #[test]
    fn stencil_stays_inside_bounds() {
        // Undefined below zero, like a rate or a variance.
        let f = |x: &[f64]| {
            if x[0] < 0.0 || x[1] > 1.0 {
                Err(FitError::Optimizer(format!("evaluated out of bounds at {x:?}")))
            } else {
                Ok(3.0 * x[0] * x[0] + x[0] * x[1] + x[1] * x[1])
            }
        };
        let h = central_hessian(f, &[0.0, 1.0], &[(0.0, 10.0), (-1.0, 1.0)]).unwrap();
        assert_relative_eq!(h[(0, 0)], 6.0, epsilon = 1e-3);
        assert_relative_eq!(h[(0, 1)], 1.0, epsilon = 1e-3);
        assert_relative_eq!(h[(1, 1)], 2.0, epsilon = 1e-3);
    }

    #[test]
    fn objective_errors_propagate() {
        let f = |_: &[f64]| Err(FitError::NotFit);
        assert!(matches!(central_hessian(f, &[1.0], &[FREE]), Err(FitError::NotFit)));
    }
}
