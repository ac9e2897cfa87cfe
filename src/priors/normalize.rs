//! Density capability and prior normalization.
//!
//! A prior is normalized once, at construction, over the part of its support
//! that can actually be integrated. Supports bounded on both sides use the
//! whole support; otherwise the central interval holding all but
//! `tail_mass` of the probability is used.
//!
//! The mass over that interval is measured with the distribution CDF rather
//! than by quadrature on a grid: grid sums diverge for densities with
//! integrable endpoint singularities (e.g. Beta(0.5, 0.5)) and lose accuracy
//! for heavy tails.

use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF};
use statrs::statistics::{Max, Min};
use thiserror::Error;

use crate::error::{FitError, Result};

/// What a prior needs from a distribution.
pub trait Density: Send + Sync + std::fmt::Debug {
    fn ln_pdf(&self, x: f64) -> f64;
    fn cdf(&self, x: f64) -> f64;
    fn inverse_cdf(&self, p: f64) -> f64;
    /// Closed support interval `(min, max)`; either end may be infinite.
    fn support(&self) -> (f64, f64);
}

#[derive(Debug, Error)]
#[error("scale must be finite and > 0 and loc finite (loc={loc}, scale={scale})")]
pub struct LocScaleError {
    loc: f64,
    scale: f64,
}

/// Location–scale transform of a standard `statrs` distribution:
/// `pdf(x) = f((x - loc) / scale) / scale`.
#[derive(Debug, Clone)]
pub struct LocScale<D> {
    dist: D,
    loc: f64,
    scale: f64,
    ln_scale: f64,
}

impl<D> LocScale<D> {
    pub fn new(dist: D, loc: f64, scale: f64) -> std::result::Result<Self, LocScaleError> {
        if !(loc.is_finite() && scale.is_finite() && scale > 0.0) {
            return Err(LocScaleError { loc, scale });
        }
        Ok(Self {
            dist,
            loc,
            scale,
            ln_scale: scale.ln(),
        })
    }

    fn standardize(&self, x: f64) -> f64 {
        (x - self.loc) / self.scale
    }
}

impl<D> Density for LocScale<D>
where
    D: Continuous<f64, f64>
        + ContinuousCDF<f64, f64>
        + Min<f64>
        + Max<f64>
        + Send
        + Sync
        + std::fmt::Debug,
{
    fn ln_pdf(&self, x: f64) -> f64 {
        self.dist.ln_pdf(self.standardize(x)) - self.ln_scale
    }

    fn cdf(&self, x: f64) -> f64 {
        self.dist.cdf(self.standardize(x))
    }

    fn inverse_cdf(&self, p: f64) -> f64 {
        self.loc + self.scale * self.dist.inverse_cdf(p)
    }

    fn support(&self) -> (f64, f64) {
        (
            self.loc + self.scale * self.dist.min(),
            self.loc + self.scale * self.dist.max(),
        )
    }
}

/// How much probability may be cut from the tails of an unbounded support.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruncationPolicy {
    pub tail_mass: f64,
}

impl Default for TruncationPolicy {
    fn default() -> Self {
        Self { tail_mass: 1e-8 }
    }
}

impl TruncationPolicy {
    pub fn validate(&self) -> Result<()> {
        if !(self.tail_mass.is_finite() && self.tail_mass > 0.0 && self.tail_mass < 1.0) {
            return Err(FitError::invalid_config(
                "tail_mass",
                format!("must lie in (0, 1), got {}", self.tail_mass),
            ));
        }
        Ok(())
    }
}

/// Interval over which the density is integrated for normalization.
pub fn integration_interval(density: &dyn Density, policy: TruncationPolicy) -> (f64, f64) {
    let (lo, hi) = density.support();
    if lo.is_finite() && hi.is_finite() {
        return (lo, hi);
    }
    let half = policy.tail_mass / 2.0;
    (density.inverse_cdf(half), density.inverse_cdf(1.0 - half))
}

/// Probability mass over the integration interval, if it is well defined.
pub fn probability_mass(density: &dyn Density, policy: TruncationPolicy) -> Option<f64> {
    let (a, b) = integration_interval(density, policy);
    if a.is_nan() || b.is_nan() {
        return None;
    }
    let mass = density.cdf(b) - density.cdf(a);
    (mass.is_finite() && mass > 0.0).then_some(mass)
}

/// Log of the normalization constant.
///
/// Falls back to 0 (normalization 1) with a warning when the mass cannot be
/// determined.
pub fn log_normalization(density: &dyn Density, policy: TruncationPolicy) -> f64 {
    match probability_mass(density, policy) {
        Some(mass) => mass.ln(),
        None => {
            log::warn!("could not normalize prior pdf for {density:?}; using normalization 1");
            0.0
        }
    }
}
