//! The contract between wrappers and fitting engines.
//!
//! Engines rely on two primitive operations:
//! - describe the unfixed parameters (names, guesses, bounds, priors)
//! - evaluate the model at an unfixed-parameter vector
//!
//! Both wrapper variants implement them here.

use crate::error::Result;
use crate::models::vector::VectorModelWrapper;
use crate::models::wrapper::ModelWrapper;
use crate::priors::Prior;

/// A wrapped model as seen by a fitter.
///
/// `Clone` is how parallel engines give every worker its own copy of the
/// mutable evaluation state.
pub trait FitModel: Clone + Send + Sync {
    /// Absorb all parameter edits since the last call. Engines call this once
    /// before reading anything else.
    fn finalize_params(&mut self) -> Result<()>;

    fn names(&self) -> Vec<String>;

    fn guesses(&self) -> Vec<f64>;

    fn bounds(&self) -> Vec<(f64, f64)>;

    fn priors(&self) -> Vec<Prior>;

    /// Evaluate at `params`, one value per unfixed parameter of the last
    /// finalize.
    fn eval_unfixed(&mut self, params: &[f64]) -> Result<Vec<f64>>;
}

impl FitModel for ModelWrapper {
    fn finalize_params(&mut self) -> Result<()> {
        ModelWrapper::finalize_params(self)
    }

    fn names(&self) -> Vec<String> {
        ModelWrapper::names(self)
    }

    fn guesses(&self) -> Vec<f64> {
        ModelWrapper::guesses(self)
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        ModelWrapper::bounds(self)
    }

    fn priors(&self) -> Vec<Prior> {
        ModelWrapper::priors(self)
    }

    fn eval_unfixed(&mut self, params: &[f64]) -> Result<Vec<f64>> {
        self.eval_cached(params)
    }
}

impl FitModel for VectorModelWrapper {
    fn finalize_params(&mut self) -> Result<()> {
        VectorModelWrapper::finalize_params(self)?;
        self.check_kwargs()
    }

    fn names(&self) -> Vec<String> {
        VectorModelWrapper::names(self)
    }

    fn guesses(&self) -> Vec<f64> {
        VectorModelWrapper::guesses(self)
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        VectorModelWrapper::bounds(self)
    }

    fn priors(&self) -> Vec<Prior> {
        VectorModelWrapper::priors(self)
    }

    fn eval_unfixed(&mut self, params: &[f64]) -> Result<Vec<f64>> {
        self.fast_model(params)
    }
}
