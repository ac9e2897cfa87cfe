//! Maximum-likelihood fitting.
//!
//! The objective minimized is `−ln L − Σ ln_prior` over the unfixed vector.
//! Bounds are enforced by an infinite cost outside them; Nelder–Mead handles
//! that without gradients. After the first run the simplex is rebuilt around
//! the optimum and the search restarted, which guards against premature
//! collapse of the simplex.
//!
//! Uncertainty comes from the curvature at the optimum: the covariance is
//! the inverse finite-difference Hessian of the objective (see
//! [`crate::math::covariance_from_hessian`]). The stencil stays inside the
//! bounds. If the model still fails there, the estimates are kept and the
//! errors are reported as undetermined.

use std::cell::RefCell;

use argmin::core::{CostFunction, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use nalgebra::DMatrix;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::domain::{FitData, FitQuality, FitRow, FitTable, MlConfig};
use crate::error::{FitError, Result};
use crate::fit::likelihood::Objective;
use crate::math::{central_hessian, covariance_from_hessian, standard_errors};
use crate::models::FitModel;

/// Bridges a model and its objective to `argmin`.
///
/// `CostFunction::cost` takes `&self`, so the model sits in a `RefCell`.
struct CostAdapter<'a, M> {
    objective: &'a Objective,
    model: RefCell<&'a mut M>,
}

impl<M: FitModel> CostFunction for CostAdapter<'_, M> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        let mut model = self.model.borrow_mut();
        let lp = self.objective.ln_posterior(&mut **model, params)?;
        Ok(if lp.is_nan() { f64::INFINITY } else { -lp })
    }
}

/// Best point found by [`minimize`].
#[derive(Debug, Clone)]
pub(crate) struct Optimum {
    pub params: Vec<f64>,
    pub cost: f64,
    pub converged: bool,
}

/// Minimize `−ln posterior` from `start`.
pub(crate) fn minimize<M: FitModel>(
    model: &mut M,
    objective: &Objective,
    start: &[f64],
    config: &MlConfig,
) -> Result<Optimum> {
    let start_cost = -objective.ln_posterior(model, start)?;
    if !start_cost.is_finite() {
        return Err(FitError::NonFiniteStart {
            names: objective.blame(start),
        });
    }

    let mut best = Optimum {
        params: start.to_vec(),
        cost: start_cost,
        converged: false,
    };
    for run in 0..=config.restarts {
        let simplex = initial_simplex(&best.params, objective.bounds(), config.initial_step);
        let solver = NelderMead::new(simplex)
            .with_sd_tolerance(config.sd_tolerance)
            .map_err(optimizer_error)?;
        let problem = CostAdapter {
            objective,
            model: RefCell::new(&mut *model),
        };
        let res = Executor::new(problem, solver)
            .configure(|state| state.max_iters(config.max_iterations))
            .run()
            .map_err(optimizer_error)?;

        let state = res.state();
        let converged = matches!(
            state.get_termination_status(),
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
        );
        let Some(params) = state.get_best_param().cloned() else {
            return Err(FitError::Optimizer("no best parameter reported".to_string()));
        };
        let cost = state.get_best_cost();
        log::debug!("nelder-mead run {run}: cost {cost:.6} after {} iterations", state.get_iter());

        let improvement = best.cost - cost;
        if cost <= best.cost {
            best = Optimum {
                params,
                cost,
                converged,
            };
        } else {
            best.converged = converged;
        }
        if run > 0 && improvement.abs() <= config.sd_tolerance {
            break;
        }
    }
    if !best.converged {
        log::warn!(
            "optimizer stopped without converging after {} iterations",
            config.max_iterations
        );
    }
    Ok(best)
}

/// `x` plus one vertex per coordinate, stepped inward when a step would
/// leave the bounds.
fn initial_simplex(x: &[f64], bounds: &[(f64, f64)], step: f64) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(x.len() + 1);
    simplex.push(x.to_vec());
    for i in 0..x.len() {
        let h = if x[i] == 0.0 { step } else { step * x[i].abs() };
        let (lo, hi) = bounds[i];
        let mut vertex = x.to_vec();
        vertex[i] = if x[i] + h <= hi {
            x[i] + h
        } else if x[i] - h >= lo {
            x[i] - h
        } else {
            0.5 * (x[i] + if hi - x[i] > x[i] - lo { hi } else { lo })
        };
        simplex.push(vertex);
    }
    simplex
}

/// Recover our own error from an `argmin` error where possible.
fn optimizer_error(err: argmin::core::Error) -> FitError {
    match err.downcast::<FitError>() {
        Ok(fit) => fit,
        Err(other) => FitError::Optimizer(other.to_string()),
    }
}

/// Two-sided 95% normal quantile.
pub(crate) fn z_95() -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(n) => n.inverse_cdf(0.975),
        Err(_) => 1.959_963_984_540_054,
    }
}

/// Maximum-likelihood fitter.
#[derive(Debug, Clone, Default)]
pub struct MlFitter {
    config: MlConfig,
    table: Option<FitTable>,
    quality: Option<FitQuality>,
    covariance: Option<DMatrix<f64>>,
    converged: bool,
}

impl MlFitter {
    pub fn new(config: MlConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &MlConfig {
        &self.config
    }

    /// Fit `model` to `data`.
    ///
    /// Any previous result is discarded first, so a failed run leaves no
    /// table behind.
    pub fn fit<M: FitModel>(&mut self, model: &mut M, data: &FitData) -> Result<&FitTable> {
        self.table = None;
        self.quality = None;
        self.covariance = None;
        self.converged = false;

        model.finalize_params()?;
        let objective = Objective::new(model, data)?;
        let guesses = model.guesses();
        let optimum = minimize(model, &objective, &guesses, &self.config)?;

        let hessian = central_hessian(
            |p| Ok(-(objective.ln_likelihood(model, p)? + objective.ln_prior(p))),
            &optimum.params,
            objective.bounds(),
        )
        .unwrap_or_else(|e| {
            log::warn!("curvature at the optimum could not be evaluated: {e}");
            DMatrix::from_element(objective.dim(), objective.dim(), f64::NAN)
        });
        let (covariance, _) = covariance_from_hessian(&hessian);
        let std = standard_errors(&covariance);
        let z = z_95();

        let rows = objective
            .names()
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let estimate = optimum.params[i];
                let (lower_bound, upper_bound) = objective.bounds()[i];
                let s = std[i];
                FitRow {
                    name: name.clone(),
                    guess: guesses[i],
                    estimate,
                    std: s.is_finite().then_some(s),
                    low_95: estimate - z * s,
                    high_95: estimate + z * s,
                    lower_bound,
                    upper_bound,
                }
            })
            .collect();

        self.quality = Some(objective.quality(model, &optimum.params)?);
        self.covariance = Some(covariance);
        self.converged = optimum.converged;
        Ok(self.table.insert(FitTable { rows }))
    }

    /// Result table of the last successful run.
    pub fn fit_table(&self) -> Result<&FitTable> {
        self.table.as_ref().ok_or(FitError::NotFit)
    }

    pub fn quality(&self) -> Option<&FitQuality> {
        self.quality.as_ref()
    }

    /// Covariance of the unfixed parameters at the optimum.
    pub fn covariance(&self) -> Option<&DMatrix<f64>> {
        self.covariance.as_ref()
    }

    pub fn estimate(&self) -> Option<Vec<f64>> {
        self.table.as_ref().map(FitTable::estimates)
    }

    pub fn converged(&self) -> bool {
        self.converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::YStd;
    use crate::error::BoxError;
    use crate::models::{Arguments, ModelWrapper, Signature};
    use approx::assert_relative_eq;

    fn line() -> ModelWrapper {
        ModelWrapper::new(
            |a: &Arguments| -> std::result::Result<Vec<f64>, BoxError> {
                let (m, b) = (a.scalar("m")?, a.scalar("b")?);
                Ok(a.vector("x")?.iter().map(|x| m * x + b).collect())
            },
            Signature::new()
                .arg("m")
                .arg("b")
                .arg_default("x", vec![-2.0, -1.0, 0.0, 1.0, 2.0]),
            None,
        )
        .unwrap()
    }

    #[test]
    fn exact_line_is_recovered_with_closed_form_errors() {
        let mut w = line();
        let data = FitData::new(vec![-3.0, -1.0, 1.0, 3.0, 5.0], YStd::Scalar(0.5)).unwrap();
        let mut fitter = MlFitter::new(MlConfig::default()).unwrap();
        let table = fitter.fit(&mut w, &data).unwrap().clone();

        let m = table.get("m").unwrap();
        let b = table.get("b").unwrap();
        assert_relative_eq!(m.estimate, 2.0, epsilon = 1e-4);
        assert_relative_eq!(b.estimate, 1.0, epsilon = 1e-4);
        // Var(m) = σ² / Σx², Var(b) = σ² / n
        assert_relative_eq!(m.std.unwrap(), 0.5 / 10f64.sqrt(), epsilon = 1e-3);
        assert_relative_eq!(b.std.unwrap(), 0.5 / 5f64.sqrt(), epsilon = 1e-3);
        assert!(m.low_95 < 2.0 && 2.0 < m.high_95);

        let q = fitter.quality().unwrap();
        assert!(q.chi2 < 1e-6);
        assert_eq!(q.n_params, 2);
    }

    #[test]
    fn bounds_hold_at_the_optimum() {
        let mut w = line();
        w.parameter_mut("m").unwrap().set_bounds(0.0, 1.0).unwrap();
        let data = FitData::new(vec![-3.0, -1.0, 1.0, 3.0, 5.0], YStd::Scalar(0.5)).unwrap();
        let mut fitter = MlFitter::new(MlConfig::default()).unwrap();
        let table = fitter.fit(&mut w, &data).unwrap();
        let m = table.get("m").unwrap().estimate;
        assert!((0.0..=1.0).contains(&m));
        assert!(m > 0.99);
    }

    #[test]
    fn table_absent_before_and_after_failed_run() {
        let mut fitter = MlFitter::new(MlConfig::default()).unwrap();
        assert!(matches!(fitter.fit_table(), Err(FitError::NotFit)));

        let mut w = line();
        let ok = FitData::new(vec![-3.0, -1.0, 1.0, 3.0, 5.0], YStd::Scalar(0.5)).unwrap();
        fitter.fit(&mut w, &ok).unwrap();
        assert!(fitter.fit_table().is_ok());

        let wrong_len = FitData::new(vec![1.0, 2.0], YStd::Scalar(0.5)).unwrap();
        assert!(fitter.fit(&mut w, &wrong_len).is_err());
        assert!(matches!(fitter.fit_table(), Err(FitError::NotFit)));
    }

    #[test]
    fn start_outside_bounds_names_the_parameter() {
        let mut w = line();
        w.parameter_mut("b").unwrap().set_bounds(5.0, 10.0).unwrap();
        let data = FitData::new(vec![-3.0, -1.0, 1.0, 3.0, 5.0], YStd::Scalar(0.5)).unwrap();
        let err = MlFitter::new(MlConfig::default())
            .unwrap()
            .fit(&mut w, &data)
            .unwrap_err();
        assert!(matches!(&err, FitError::NonFiniteStart { names } if names == &["b"]));
    }

    /// Exponential decay, undefined for negative rates.
    fn decay() -> ModelWrapper {
        ModelWrapper::new(
            |a: &Arguments| -> std::result::Result<Vec<f64>, BoxError> {
                let k = a.scalar("k")?;
                if k < 0.0 {
                    return Err(format!("negative rate {k}").into());
                }
                Ok(a.vector("t")?.iter().map(|t| (-k * t).exp()).collect())
            },
            Signature::new()
                .arg_default("k", 0.5)
                .arg_default("t", vec![0.0, 1.0, 2.0, 3.0]),
            None,
        )
        .unwrap()
    }

    #[test]
    fn optimum_on_a_bound_keeps_its_errors() {
        // Growing data pulls k below zero; the fit must stop at the bound.
        let mut w = decay();
        w.parameter_mut("k").unwrap().set_bounds(0.0, 10.0).unwrap();
        let data = FitData::new(vec![1.0, 1.2, 1.5, 1.9], YStd::Scalar(0.1)).unwrap();
        let mut fitter = MlFitter::new(MlConfig::default()).unwrap();
        let k = fitter.fit(&mut w, &data).unwrap().get("k").unwrap().clone();
        assert!(k.estimate >= 0.0 && k.estimate < 1e-2, "k = {}", k.estimate);
        let std = k.std.unwrap();
        assert!(std > 0.0 && std.is_finite());
    }

    #[test]
    fn failing_curvature_leaves_errors_undetermined() {
        // Bounds narrower than the stencil: the model is called outside them.
        let mut w = decay();
        w.set_guess("k", 5e-6).unwrap();
        w.parameter_mut("k").unwrap().set_bounds(0.0, 1e-5).unwrap();
        let data = FitData::new(vec![1.0, 1.2, 1.5, 1.9], YStd::Scalar(0.1)).unwrap();
        let mut fitter = MlFitter::new(MlConfig::default()).unwrap();
        let table = fitter.fit(&mut w, &data).unwrap();
        let k = table.get("k").unwrap();
        assert!((0.0..=1e-5).contains(&k.estimate));
        assert_eq!(k.std, None);
        assert!(k.low_95.is_nan() && k.high_95.is_nan());
    }

    #[test]
    fn simplex_stays_inside_bounds() {
        let s = initial_simplex(&[1.0, 0.0], &[(0.0, 1.0), (-1.0, 1.0)], 0.05);
        assert_eq!(s.len(), 3);
        assert_relative_eq!(s[1][0], 0.95);
        assert_relative_eq!(s[2][1], 0.05);
    }
}
