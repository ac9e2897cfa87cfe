//! `probfit` library crate.
//!
//! Wrap an arbitrary model callable, describe its parameters (guesses,
//! bounds, priors, fixed flags), and fit it to data with one of three
//! engines:
//!
//! - maximum likelihood (`fit::MlFitter`)
//! - bootstrap refits (`fit::BootstrapFitter`)
//! - ensemble MCMC (`fit::BayesianSampler`)
//!
//! The library logs through the `log` facade and never installs a logger.

pub mod domain;
pub mod error;
pub mod fit;
pub mod math;
pub mod models;
pub mod priors;
pub mod report;
