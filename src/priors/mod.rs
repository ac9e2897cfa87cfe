//! Prior distributions over fit parameters.
//!
//! A [`Prior`] is either the improper flat prior (`ln_prior = 0`) or a
//! continuous density from `statrs` under a location–scale transform,
//! normalized once at construction (see [`normalize`]). Constructors use the
//! default [`TruncationPolicy`]; [`Prior::with_truncation`] and
//! [`PriorSpec::truncation`] choose another.

pub mod normalize;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use statrs::distribution::{
    Beta, Cauchy, ChiSquared, Continuous, ContinuousCDF, Exp, Gamma, LogNormal, Normal, StudentsT,
};
use statrs::statistics::{Max, Min};

use crate::error::{FitError, Result};

pub use normalize::{Density, LocScale, TruncationPolicy, log_normalization};

/// Family names that describe discrete distributions and so cannot serve as
/// a continuous prior.
const DISCRETE_FAMILIES: &[&str] = &[
    "bernoulli",
    "binomial",
    "categorical",
    "discrete_uniform",
    "geometric",
    "hypergeometric",
    "multinomial",
    "negative_binomial",
    "poisson",
];

/// A normalized continuous density.
#[derive(Debug, Clone)]
pub struct ContinuousPrior {
    density: Arc<dyn Density>,
    log_normalization: f64,
    support: (f64, f64),
    truncation: TruncationPolicy,
}

impl ContinuousPrior {
    fn new(density: Arc<dyn Density>, truncation: TruncationPolicy) -> Self {
        let log_normalization = log_normalization(density.as_ref(), truncation);
        let support = density.support();
        Self {
            density,
            log_normalization,
            support,
            truncation,
        }
    }

    pub fn ln_prior(&self, x: f64) -> f64 {
        let (lo, hi) = self.support;
        if !x.is_finite() || x < lo || x > hi {
            return f64::NEG_INFINITY;
        }
        self.density.ln_pdf(x) - self.log_normalization
    }

    pub fn log_normalization(&self) -> f64 {
        self.log_normalization
    }

    pub fn support(&self) -> (f64, f64) {
        self.support
    }

    pub fn density(&self) -> &dyn Density {
        self.density.as_ref()
    }

    pub fn truncation(&self) -> TruncationPolicy {
        self.truncation
    }
}

/// Prior belief about one parameter.
#[derive(Debug, Clone, Default)]
pub enum Prior {
    /// Improper flat prior: `ln_prior(x) = 0` for every `x`.
    #[default]
    Uniform,
    Gaussian(ContinuousPrior),
    Chi2(ContinuousPrior),
    Beta(ContinuousPrior),
    Exponential(ContinuousPrior),
    Generic { family: String, prior: ContinuousPrior },
}

impl Prior {
    pub fn uniform() -> Self {
        Prior::Uniform
    }

    /// Normal prior with mean `loc` and standard deviation `scale`.
    pub fn gaussian(loc: f64, scale: f64) -> Result<Self> {
        gaussian(loc, scale, TruncationPolicy::default())
    }

    pub fn chi2(df: f64, loc: f64, scale: f64) -> Result<Self> {
        chi2(df, loc, scale, TruncationPolicy::default())
    }

    pub fn beta(a: f64, b: f64, loc: f64, scale: f64) -> Result<Self> {
        beta(a, b, loc, scale, TruncationPolicy::default())
    }

    /// Exponential prior; `scale` is the mean (the inverse rate).
    pub fn exponential(loc: f64, scale: f64) -> Result<Self> {
        exponential(loc, scale, TruncationPolicy::default())
    }

    /// Any continuous `statrs` distribution, used as is.
    pub fn generic<D>(family: impl Into<String>, dist: D) -> Result<Self>
    where
        D: Continuous<f64, f64>
            + ContinuousCDF<f64, f64>
            + Min<f64>
            + Max<f64>
            + Send
            + Sync
            + std::fmt::Debug
            + 'static,
    {
        let family = family.into();
        let prior = loc_scale_prior(&family, dist, 0.0, 1.0, TruncationPolicy::default())?;
        Ok(Prior::Generic { family, prior })
    }

    /// The same density normalized under `policy`.
    pub fn with_truncation(self, policy: TruncationPolicy) -> Result<Self> {
        policy.validate()?;
        let renormalize = |p: ContinuousPrior| ContinuousPrior::new(p.density, policy);
        Ok(match self {
            Prior::Uniform => Prior::Uniform,
            Prior::Gaussian(p) => Prior::Gaussian(renormalize(p)),
            Prior::Chi2(p) => Prior::Chi2(renormalize(p)),
            Prior::Beta(p) => Prior::Beta(renormalize(p)),
            Prior::Exponential(p) => Prior::Exponential(renormalize(p)),
            Prior::Generic { family, prior } => Prior::Generic {
                family,
                prior: renormalize(prior),
            },
        })
    }

    /// Build a prior from a family name and its parameters.
    pub fn from_spec(spec: &PriorSpec) -> Result<Self> {
        let family = spec.family.trim().to_ascii_lowercase();
        let (loc, scale) = (spec.loc, spec.scale);
        let policy = spec.truncation.unwrap_or_default();
        policy.validate()?;
        match family.as_str() {
            "uniform" | "uninformative" => Ok(Prior::Uniform),
            "gaussian" | "normal" | "norm" => gaussian(loc, scale, policy),
            "chi2" | "chi_squared" => chi2(spec.param("df")?, loc, scale, policy),
            "beta" => beta(spec.param("a")?, spec.param("b")?, loc, scale, policy),
            "exponential" | "expon" => exponential(loc, scale, policy),
            "gamma" => {
                let base = Gamma::new(spec.param("shape")?, 1.0).map_err(construction("gamma"))?;
                generic_loc_scale("gamma", base, loc, scale, policy)
            }
            "students_t" | "t" => {
                let base = StudentsT::new(0.0, 1.0, spec.param("df")?)
                    .map_err(construction("students_t"))?;
                generic_loc_scale("students_t", base, loc, scale, policy)
            }
            "cauchy" => {
                let base = Cauchy::new(0.0, 1.0).map_err(construction("cauchy"))?;
                generic_loc_scale("cauchy", base, loc, scale, policy)
            }
            "lognormal" | "log_normal" => {
                let base = LogNormal::new(0.0, spec.param("s")?).map_err(construction("lognormal"))?;
                generic_loc_scale("lognormal", base, loc, scale, policy)
            }
            f if DISCRETE_FAMILIES.contains(&f) => Err(FitError::NotContinuous {
                family: f.to_string(),
            }),
            f => Err(FitError::UnknownFamily {
                family: f.to_string(),
            }),
        }
    }

    /// Normalized log prior density at `x`.
    pub fn ln_prior(&self, x: f64) -> f64 {
        match self.continuous() {
            Some(p) => p.ln_prior(x),
            None => 0.0,
        }
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, Prior::Uniform)
    }

    pub fn continuous(&self) -> Option<&ContinuousPrior> {
        match self {
            Prior::Uniform => None,
            Prior::Gaussian(p) | Prior::Chi2(p) | Prior::Beta(p) | Prior::Exponential(p) => Some(p),
            Prior::Generic { prior, .. } => Some(prior),
        }
    }

    pub fn family(&self) -> &str {
        match self {
            Prior::Uniform => "uniform",
            Prior::Gaussian(_) => "gaussian",
            Prior::Chi2(_) => "chi2",
            Prior::Beta(_) => "beta",
            Prior::Exponential(_) => "exponential",
            Prior::Generic { family, .. } => family,
        }
    }
}

/// Declarative prior description, e.g. from a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorSpec {
    pub family: String,
    /// Shape parameters by name (`df`, `a`, `b`, `shape`, `s`).
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    #[serde(default)]
    pub loc: f64,
    #[serde(default = "unit_scale")]
    pub scale: f64,
    /// Tail truncation for normalization; the default policy when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<TruncationPolicy>,
}

fn unit_scale() -> f64 {
    1.0
}

impl PriorSpec {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            params: BTreeMap::new(),
            loc: 0.0,
            scale: 1.0,
            truncation: None,
        }
    }

    pub fn param_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn loc_scale(mut self, loc: f64, scale: f64) -> Self {
        self.loc = loc;
        self.scale = scale;
        self
    }

    pub fn truncation(mut self, policy: TruncationPolicy) -> Self {
        self.truncation = Some(policy);
        self
    }

    fn param(&self, name: &str) -> Result<f64> {
        self.params.get(name).copied().ok_or_else(|| FitError::InvalidValue {
            name: name.to_string(),
            reason: format!("required by the {} prior", self.family),
        })
    }
}

fn construction<E>(family: &'static str) -> impl FnOnce(E) -> FitError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| FitError::PriorConstruction {
        family: family.to_string(),
        source: Box::new(e),
    }
}

fn gaussian(loc: f64, scale: f64, policy: TruncationPolicy) -> Result<Prior> {
    let base = Normal::new(0.0, 1.0).map_err(construction("gaussian"))?;
    Ok(Prior::Gaussian(loc_scale_prior("gaussian", base, loc, scale, policy)?))
}

fn chi2(df: f64, loc: f64, scale: f64, policy: TruncationPolicy) -> Result<Prior> {
    let base = ChiSquared::new(df).map_err(construction("chi2"))?;
    Ok(Prior::Chi2(loc_scale_prior("chi2", base, loc, scale, policy)?))
}

fn beta(a: f64, b: f64, loc: f64, scale: f64, policy: TruncationPolicy) -> Result<Prior> {
    let base = Beta::new(a, b).map_err(construction("beta"))?;
    Ok(Prior::Beta(loc_scale_prior("beta", base, loc, scale, policy)?))
}

fn exponential(loc: f64, scale: f64, policy: TruncationPolicy) -> Result<Prior> {
    let base = Exp::new(1.0).map_err(construction("exponential"))?;
    Ok(Prior::Exponential(loc_scale_prior("exponential", base, loc, scale, policy)?))
}

fn loc_scale_prior<D>(
    family: &str,
    base: D,
    loc: f64,
    scale: f64,
    policy: TruncationPolicy,
) -> Result<ContinuousPrior>
where
    D: Continuous<f64, f64>
        + ContinuousCDF<f64, f64>
        + Min<f64>
        + Max<f64>
        + Send
        + Sync
        + std::fmt::Debug
        + 'static,
{
    let density = LocScale::new(base, loc, scale).map_err(|e| FitError::PriorConstruction {
        family: family.to_string(),
        source: Box::new(e),
    })?;
    Ok(ContinuousPrior::new(Arc::new(density), policy))
}

fn generic_loc_scale<D>(
    family: &str,
    base: D,
    loc: f64,
    scale: f64,
    policy: TruncationPolicy,
) -> Result<Prior>
where
    D: Continuous<f64, f64>
        + ContinuousCDF<f64, f64>
        + Min<f64>
        + Max<f64>
        + Send
        + Sync
        + std::fmt::Debug
        + 'static,
{
    let prior = loc_scale_prior(family, base, loc, scale, policy)?;
    Ok(Prior::Generic {
        family: family.to_string(),
        prior,
    })
}
