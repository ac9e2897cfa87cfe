//! Fitting engines.
//!
//! - [`MlFitter`]: Nelder–Mead maximum likelihood with Hessian errors
//! - [`BootstrapFitter`]: ML refits over perturbed or resampled data
//! - [`BayesianSampler`]: affine-invariant ensemble MCMC
//!
//! All three see the model only through [`crate::models::FitModel`].

pub mod bayesian;
pub mod bootstrap;
pub mod likelihood;
pub mod ml;
pub mod setup;

pub use bayesian::*;
pub use bootstrap::*;
pub use likelihood::*;
pub use ml::MlFitter;
pub use setup::*;
