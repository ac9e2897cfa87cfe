//! Picking the wrapper for a model callable.
//!
//! A callable whose first argument is the whole parameter vector goes to
//! [`VectorModelWrapper`]; one taking named arguments goes to
//! [`ModelWrapper`]. [`wrap_function`] makes the choice and [`AnyModel`]
//! carries either result through the engines.

use std::fmt;
use std::sync::Arc;

use crate::domain::WrapperOptions;
use crate::error::{BoxError, FitError, Result};
use crate::models::args::{Arguments, Signature, VectorSignature};
use crate::models::model::FitModel;
use crate::models::param::FitParameter;
use crate::models::vector::{FittableParams, VectorModelFn, VectorModelWrapper};
use crate::models::wrapper::{ModelFn, ModelWrapper};
use crate::priors::Prior;

/// A model callable together with its declared arguments.
#[derive(Clone)]
pub enum ModelFunction {
    Named { model: ModelFn, signature: Signature },
    Vector { model: VectorModelFn, signature: VectorSignature },
}

impl ModelFunction {
    pub fn named<F>(model: F, signature: Signature) -> Self
    where
        F: Fn(&Arguments) -> std::result::Result<Vec<f64>, BoxError> + Send + Sync + 'static,
    {
        ModelFunction::Named {
            model: Arc::new(model),
            signature,
        }
    }

    pub fn vector<F>(model: F, signature: VectorSignature) -> Self
    where
        F: Fn(&[f64], &Arguments) -> std::result::Result<Vec<f64>, BoxError> + Send + Sync + 'static,
    {
        ModelFunction::Vector {
            model: Arc::new(model),
            signature,
        }
    }

    pub fn takes_vector(&self) -> bool {
        matches!(self, ModelFunction::Vector { .. })
    }
}

impl fmt::Debug for ModelFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFunction::Named { signature, .. } => {
                f.debug_struct("Named").field("signature", signature).finish_non_exhaustive()
            }
            ModelFunction::Vector { signature, .. } => {
                f.debug_struct("Vector").field("signature", signature).finish_non_exhaustive()
            }
        }
    }
}

/// Wrap `function` in the wrapper its calling convention needs.
///
/// For a named-argument model, `fit_parameters` is optional: without it the
/// leading numeric arguments are fit. Guesses given in
/// [`FittableParams::Guesses`] replace the argument defaults. A vector model
/// has no names of its own, so it needs `fit_parameters`.
pub fn wrap_function(
    function: ModelFunction,
    fit_parameters: Option<FittableParams>,
    non_fit_kwargs: Option<Arguments>,
) -> Result<AnyModel> {
    match function {
        ModelFunction::Named { model, signature } => {
            let call = move |a: &Arguments| model(a);
            let (names, guesses): (Option<Vec<String>>, Vec<(String, f64)>) = match fit_parameters {
                None => (None, Vec::new()),
                Some(FittableParams::Names(names)) => (Some(names), Vec::new()),
                Some(FittableParams::Guesses(guesses)) => {
                    (Some(guesses.iter().map(|(n, _)| n.clone()).collect()), guesses)
                }
            };
            let requested: Option<Vec<&str>> =
                names.as_ref().map(|v| v.iter().map(String::as_str).collect());
            let mut wrapper = ModelWrapper::with_options(
                call,
                signature,
                requested.as_deref(),
                non_fit_kwargs,
                WrapperOptions::default(),
            )?;
            for (name, guess) in guesses {
                wrapper.set_guess(&name, guess)?;
            }
            Ok(AnyModel::Named(wrapper))
        }
        ModelFunction::Vector { model, signature } => {
            let fit_parameters = fit_parameters.ok_or(FitError::EmptyFittable)?;
            let call = move |theta: &[f64], a: &Arguments| model(theta, a);
            let wrapper = VectorModelWrapper::new(call, signature, fit_parameters, non_fit_kwargs)?;
            Ok(AnyModel::Vector(wrapper))
        }
    }
}

/// Either wrapper, as chosen by [`wrap_function`].
#[derive(Debug, Clone)]
pub enum AnyModel {
    Named(ModelWrapper),
    Vector(VectorModelWrapper),
}

impl AnyModel {
    pub fn as_named(&self) -> Option<&ModelWrapper> {
        match self {
            AnyModel::Named(w) => Some(w),
            AnyModel::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&VectorModelWrapper> {
        match self {
            AnyModel::Vector(w) => Some(w),
            AnyModel::Named(_) => None,
        }
    }

    pub fn parameter_mut(&mut self, name: &str) -> Result<&mut FitParameter> {
        match self {
            AnyModel::Named(w) => w.parameter_mut(name),
            AnyModel::Vector(w) => w.parameter_mut(name),
        }
    }

    pub fn set_guess(&mut self, name: &str, guess: f64) -> Result<()> {
        match self {
            AnyModel::Named(w) => w.set_guess(name, guess),
            AnyModel::Vector(w) => w.set_guess(name, guess),
        }
    }
}

impl FitModel for AnyModel {
    fn finalize_params(&mut self) -> Result<()> {
        match self {
            AnyModel::Named(w) => FitModel::finalize_params(w),
            AnyModel::Vector(w) => FitModel::finalize_params(w),
        }
    }

    fn names(&self) -> Vec<String> {
        match self {
            AnyModel::Named(w) => w.names(),
            AnyModel::Vector(w) => w.names(),
        }
    }

    fn guesses(&self) -> Vec<f64> {
        match self {
            AnyModel::Named(w) => w.guesses(),
            AnyModel::Vector(w) => w.guesses(),
        }
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        match self {
            AnyModel::Named(w) => w.bounds(),
            AnyModel::Vector(w) => w.bounds(),
        }
    }

    fn priors(&self) -> Vec<Prior> {
        match self {
            AnyModel::Named(w) => w.priors(),
            AnyModel::Vector(w) => w.priors(),
        }
    }

    fn eval_unfixed(&mut self, params: &[f64]) -> Result<Vec<f64>> {
        match self {
            AnyModel::Named(w) => w.eval_unfixed(params),
            AnyModel::Vector(w) => w.eval_unfixed(params),
        }
    }
}
