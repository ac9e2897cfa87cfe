//! Shared domain types.
//!
//! These types are intentionally kept plain and serializable so they can be:
//!
//! - built in code or deserialized from a caller's own config format
//! - validated once, before any model is evaluated
//! - reported or exported after a fit

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// Options shared by both wrapper variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapperOptions {
    /// Value used for any fit parameter whose guess has not been set.
    pub default_guess: f64,
}

impl Default for WrapperOptions {
    fn default() -> Self {
        Self { default_guess: 0.0 }
    }
}

impl WrapperOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.default_guess.is_finite() {
            return Err(FitError::invalid_config(
                "default_guess",
                format!("must be finite, got {}", self.default_guess),
            ));
        }
        Ok(())
    }
}

/// Measurement uncertainty of the observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YStd {
    /// One standard deviation shared by every point.
    Scalar(f64),
    /// One standard deviation per point.
    PerPoint(Vec<f64>),
}

/// Observed responses and their uncertainties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitData {
    pub y_obs: Vec<f64>,
    pub y_std: YStd,
}

impl FitData {
    /// Build and validate.
    pub fn new(y_obs: Vec<f64>, y_std: YStd) -> Result<Self> {
        let data = Self { y_obs, y_std };
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> Result<()> {
        if self.y_obs.is_empty() {
            return Err(FitError::InvalidData("y_obs is empty".to_string()));
        }
        if let Some(i) = self.y_obs.iter().position(|y| !y.is_finite()) {
            return Err(FitError::InvalidData(format!(
                "y_obs[{i}] is not finite ({})",
                self.y_obs[i]
            )));
        }
        match &self.y_std {
            YStd::Scalar(s) => check_sigma(*s, "y_std")?,
            YStd::PerPoint(v) => {
                if v.len() != self.y_obs.len() {
                    return Err(FitError::InvalidData(format!(
                        "y_std has {} entries but y_obs has {}",
                        v.len(),
                        self.y_obs.len()
                    )));
                }
                for (i, s) in v.iter().enumerate() {
                    check_sigma(*s, &format!("y_std[{i}]"))?;
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.y_obs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y_obs.is_empty()
    }

    /// Standard deviation of point `i`.
    pub fn sigma(&self, i: usize) -> f64 {
        match &self.y_std {
            YStd::Scalar(s) => *s,
            YStd::PerPoint(v) => v[i],
        }
    }

    /// Per-point standard deviations.
    pub fn sigmas(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.sigma(i)).collect()
    }
}

fn check_sigma(s: f64, what: &str) -> Result<()> {
    if !(s.is_finite() && s > 0.0) {
        return Err(FitError::InvalidData(format!(
            "{what} must be finite and > 0, got {s}"
        )));
    }
    Ok(())
}

/// One row of the result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRow {
    pub name: String,
    pub guess: f64,
    /// Point estimate: the optimum (ML), the replicate median (bootstrap)
    /// or the posterior mean (MCMC).
    pub estimate: f64,
    pub std: Option<f64>,
    pub low_95: f64,
    pub high_95: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Result table of a completed fit, one row per unfixed parameter in
/// unfixed-vector order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitTable {
    pub rows: Vec<FitRow>,
}

impl FitTable {
    pub fn get(&self, name: &str) -> Option<&FitRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn estimates(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.estimate).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Goodness-of-fit summary at the reported estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub n_obs: usize,
    pub n_params: usize,
    pub ln_likelihood: f64,
    pub chi2: f64,
    /// `chi2 / (n_obs - n_params)`; NaN without residual degrees of freedom.
    pub reduced_chi2: f64,
    pub aic: f64,
    pub bic: f64,
}

impl FitQuality {
    pub fn new(n_obs: usize, n_params: usize, ln_likelihood: f64, chi2: f64) -> Self {
        let n = n_obs as f64;
        let k = n_params as f64;
        let dof = n_obs.saturating_sub(n_params);
        let reduced_chi2 = if dof > 0 { chi2 / dof as f64 } else { f64::NAN };
        Self {
            n_obs,
            n_params,
            ln_likelihood,
            chi2,
            reduced_chi2,
            aic: 2.0 * k - 2.0 * ln_likelihood,
            bic: k * n.ln() - 2.0 * ln_likelihood,
        }
    }
}

/// Maximum-likelihood engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlConfig {
    /// Nelder–Mead iteration cap per run.
    pub max_iterations: u64,
    /// Additional runs restarted from the previous optimum.
    pub restarts: usize,
    /// Convergence threshold on the standard deviation of simplex costs.
    pub sd_tolerance: f64,
    /// Relative size of the initial simplex (absolute for zero guesses).
    pub initial_step: f64,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5_000,
            restarts: 2,
            sd_tolerance: 1e-10,
            initial_step: 0.05,
        }
    }
}

impl MlConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(FitError::invalid_config("max_iterations", "must be > 0"));
        }
        if !(self.sd_tolerance.is_finite() && self.sd_tolerance > 0.0) {
            return Err(FitError::invalid_config(
                "sd_tolerance",
                format!("must be finite and > 0, got {}", self.sd_tolerance),
            ));
        }
        if !(self.initial_step.is_finite() && self.initial_step > 0.0) {
            return Err(FitError::invalid_config(
                "initial_step",
                format!("must be finite and > 0, got {}", self.initial_step),
            ));
        }
        Ok(())
    }
}

/// How bootstrap replicates are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapMode {
    /// Add `N(0, σᵢ)` noise to every observation.
    Perturb,
    /// Draw observations with replacement.
    Resample,
}

/// Bootstrap engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub num_bootstrap: usize,
    pub mode: BootstrapMode,
    pub seed: u64,
    /// Settings of each replicate's ML refit.
    pub ml: MlConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            num_bootstrap: 200,
            mode: BootstrapMode::Perturb,
            seed: 0,
            ml: MlConfig::default(),
        }
    }
}

impl BootstrapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_bootstrap < 2 {
            return Err(FitError::invalid_config(
                "num_bootstrap",
                format!("need at least 2 replicates, got {}", self.num_bootstrap),
            ));
        }
        self.ml.validate()
    }
}

/// Ensemble sampler settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianConfig {
    /// Walkers in the ensemble; at least twice the unfixed parameter count.
    pub num_walkers: usize,
    /// Steps per walker, burn-in included.
    pub num_steps: usize,
    /// Leading steps discarded from every walker.
    pub burn_in: usize,
    /// Relative Gaussian spread of the starting walkers around the start point.
    pub initial_walker_spread: f64,
    /// Start from the ML estimate instead of the wrapper guesses.
    pub ml_guess: bool,
    pub seed: u64,
    /// Stretch move scale `a` (> 1).
    pub stretch_scale: f64,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        Self {
            num_walkers: 32,
            num_steps: 2_000,
            burn_in: 500,
            initial_walker_spread: 1e-4,
            ml_guess: true,
            seed: 0,
            stretch_scale: 2.0,
        }
    }
}

impl BayesianConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_walkers < 2 || self.num_walkers % 2 != 0 {
            return Err(FitError::invalid_config(
                "num_walkers",
                format!("must be an even number >= 2, got {}", self.num_walkers),
            ));
        }
        if self.burn_in >= self.num_steps {
            return Err(FitError::invalid_config(
                "burn_in",
                format!(
                    "must be smaller than num_steps ({}), got {}",
                    self.num_steps, self.burn_in
                ),
            ));
        }
        if !(self.initial_walker_spread.is_finite() && self.initial_walker_spread > 0.0) {
            return Err(FitError::invalid_config(
                "initial_walker_spread",
                format!("must be finite and > 0, got {}", self.initial_walker_spread),
            ));
        }
        if !(self.stretch_scale.is_finite() && self.stretch_scale > 1.0) {
            return Err(FitError::invalid_config(
                "stretch_scale",
                format!("must be finite and > 1, got {}", self.stretch_scale),
            ));
        }
        Ok(())
    }
}

/// Fitting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Ml,
    Bootstrap,
    Mcmc,
}
