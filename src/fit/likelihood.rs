//! Gaussian log-likelihood and log-posterior over the unfixed vector.
//!
//! ```text
//! ln L = −½ Σ cᵢ ((yᵢ − fᵢ) / σᵢ)² − Σ cᵢ ln(σᵢ √(2π))
//! ```
//!
//! `cᵢ` are observation multiplicities: all 1 for the observed data, draw
//! counts for a resampled bootstrap replicate. The model is evaluated at
//! every original point either way.

use std::f64::consts::PI;

use crate::domain::{FitData, FitQuality};
use crate::error::{FitError, Result};
use crate::models::FitModel;
use crate::priors::Prior;

/// Everything a fitter needs besides the model itself.
///
/// Built from a finalized model, so names, bounds and priors are a snapshot
/// of the unfixed parameters at the start of a run.
#[derive(Debug, Clone)]
pub struct Objective {
    names: Vec<String>,
    bounds: Vec<(f64, f64)>,
    priors: Vec<Prior>,
    y_obs: Vec<f64>,
    sigmas: Vec<f64>,
    counts: Option<Vec<f64>>,
    ln_norm: f64,
}

impl Objective {
    pub fn new<M: FitModel>(model: &M, data: &FitData) -> Result<Self> {
        data.validate()?;
        let names = model.names();
        if names.is_empty() {
            return Err(FitError::NoUnfixedParameters);
        }
        let sigmas = data.sigmas();
        let ln_norm = sigmas.iter().map(|s| (s * (2.0 * PI).sqrt()).ln()).sum();
        Ok(Self {
            names,
            bounds: model.bounds(),
            priors: model.priors(),
            y_obs: data.y_obs.clone(),
            sigmas,
            counts: None,
            ln_norm,
        })
    }

    /// Same parameters and uncertainties, new responses.
    pub(crate) fn with_y_obs(&self, y_obs: Vec<f64>) -> Self {
        Self {
            y_obs,
            ..self.clone()
        }
    }

    /// Same data, each point weighted by how often it was drawn.
    pub(crate) fn with_counts(&self, counts: Vec<f64>) -> Self {
        let ln_norm = counts
            .iter()
            .zip(&self.sigmas)
            .map(|(c, s)| c * (s * (2.0 * PI).sqrt()).ln())
            .sum();
        Self {
            counts: Some(counts),
            ln_norm,
            ..self.clone()
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    pub fn dim(&self) -> usize {
        self.names.len()
    }

    pub fn n_obs(&self) -> usize {
        self.y_obs.len()
    }

    pub fn sigmas(&self) -> &[f64] {
        &self.sigmas
    }

    pub fn y_obs(&self) -> &[f64] {
        &self.y_obs
    }

    pub fn in_bounds(&self, params: &[f64]) -> bool {
        params
            .iter()
            .zip(&self.bounds)
            .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    /// `Σ cᵢ ((yᵢ − fᵢ) / σᵢ)²`.
    pub fn chi2(&self, prediction: &[f64]) -> Result<f64> {
        if prediction.len() != self.y_obs.len() {
            return Err(FitError::OutputLength {
                got: prediction.len(),
                expected: self.y_obs.len(),
            });
        }
        let chi2 = prediction
            .iter()
            .zip(&self.y_obs)
            .zip(&self.sigmas)
            .enumerate()
            .map(|(i, ((f, y), s))| {
                let r = (y - f) / s;
                self.count(i) * r * r
            })
            .sum();
        Ok(chi2)
    }

    pub fn ln_likelihood<M: FitModel>(&self, model: &mut M, params: &[f64]) -> Result<f64> {
        let prediction = model.eval_unfixed(params)?;
        Ok(-0.5 * self.chi2(&prediction)? - self.ln_norm)
    }

    /// `Σ ln_prior`; −∞ when any parameter lies outside its prior support.
    pub fn ln_prior(&self, params: &[f64]) -> f64 {
        params
            .iter()
            .zip(&self.priors)
            .map(|(v, prior)| prior.ln_prior(*v))
            .sum()
    }

    /// `ln L + Σ ln_prior`, −∞ outside the bounds. The model is not
    /// evaluated where the prior already rules the point out. NaN results
    /// read as −∞.
    pub fn ln_posterior<M: FitModel>(&self, model: &mut M, params: &[f64]) -> Result<f64> {
        if !self.in_bounds(params) {
            return Ok(f64::NEG_INFINITY);
        }
        let lp = self.ln_prior(params);
        if lp == f64::NEG_INFINITY || lp.is_nan() {
            return Ok(f64::NEG_INFINITY);
        }
        let value = self.ln_likelihood(model, params)? + lp;
        Ok(if value.is_nan() { f64::NEG_INFINITY } else { value })
    }

    /// Names of parameters that rule out `params` on their own: out of
    /// bounds or outside their prior support. All names when none does.
    pub(crate) fn blame(&self, params: &[f64]) -> Vec<String> {
        let offenders: Vec<String> = params
            .iter()
            .enumerate()
            .filter(|(i, v)| {
                let (lo, hi) = self.bounds[*i];
                **v < lo || **v > hi || self.priors[*i].ln_prior(**v) == f64::NEG_INFINITY
            })
            .map(|(i, _)| self.names[i].clone())
            .collect();
        if offenders.is_empty() {
            self.names.clone()
        } else {
            offenders
        }
    }

    pub fn quality<M: FitModel>(&self, model: &mut M, params: &[f64]) -> Result<FitQuality> {
        let prediction = model.eval_unfixed(params)?;
        let chi2 = self.chi2(&prediction)?;
        Ok(FitQuality::new(
            self.n_obs(),
            self.dim(),
            -0.5 * chi2 - self.ln_norm,
            chi2,
        ))
    }

    fn count(&self, i: usize) -> f64 {
        self.counts.as_ref().map_or(1.0, |c| c[i])
    }
}
