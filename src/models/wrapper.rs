//! Wrapper for models that take their parameters as named arguments.
//!
//! The caller declares the argument list with a [`Signature`]. Each argument
//! becomes either a [`FitParameter`] or a fixed argument:
//!
//! - with no explicit selection, the leading run of arguments that have no
//!   default (or a numeric one) are fit parameters, up to the first argument
//!   that is not, or that the caller supplied as a non-fit value
//! - with an explicit selection, exactly the named arguments are fit
//!   parameters
//!
//! Fitters see only the unfixed parameters, in declaration order.

use std::fmt;
use std::sync::Arc;

use crate::domain::WrapperOptions;
use crate::error::{BoxError, FitError, Result};
use crate::models::args::{ArgValue, Arguments, Signature};
use crate::models::param::{FitParameter, check_reserved};
use crate::priors::Prior;

/// A named-argument model: receives every declared argument by name.
pub type ModelFn = Arc<dyn Fn(&Arguments) -> std::result::Result<Vec<f64>, BoxError> + Send + Sync>;

/// Names taken by the wrapper's accessors.
pub const RESERVED_NAMES: &[&str] = &[
    "model",
    "fast_model",
    "guesses",
    "bounds",
    "names",
    "priors",
    "fit_parameters",
    "other_arguments",
    "finalize_params",
    "get_parameter",
    "parameter_mut",
    "set_guess",
    "set",
    "get",
    "vector_index",
];

/// What a name refers to inside a [`ModelWrapper`].
#[derive(Debug, Clone, Copy)]
pub enum Attribute<'a> {
    Parameter(&'a FitParameter),
    Fixed(&'a ArgValue),
}

#[derive(Clone)]
pub struct ModelWrapper {
    model: ModelFn,
    signature: Signature,
    fit_parameters: Vec<FitParameter>,
    other_arguments: Arguments,
    options: WrapperOptions,
    // Rebuilt by `finalize_params`.
    call_args: Arguments,
    unfixed: Vec<usize>,
}

impl fmt::Debug for ModelWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelWrapper")
            .field("signature", &self.signature)
            .field("fit_parameters", &self.fit_parameters)
            .field("other_arguments", &self.other_arguments)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ModelWrapper {
    /// Wrap `model` with default options and no non-fit values.
    pub fn new<F>(model: F, signature: Signature, fittable_params: Option<&[&str]>) -> Result<Self>
    where
        F: Fn(&Arguments) -> std::result::Result<Vec<f64>, BoxError> + Send + Sync + 'static,
    {
        Self::with_options(model, signature, fittable_params, None, WrapperOptions::default())
    }

    pub fn with_options<F>(
        model: F,
        signature: Signature,
        fittable_params: Option<&[&str]>,
        non_fit_kwargs: Option<Arguments>,
        options: WrapperOptions,
    ) -> Result<Self>
    where
        F: Fn(&Arguments) -> std::result::Result<Vec<f64>, BoxError> + Send + Sync + 'static,
    {
        options.validate()?;
        signature.check_unique()?;
        for arg in signature.args() {
            check_reserved(&arg.name, RESERVED_NAMES, "ModelWrapper")?;
        }

        let non_fit = non_fit_kwargs.unwrap_or_default();
        let undeclared: Vec<String> = non_fit
            .names()
            .filter(|n| !signature.contains(n))
            .map(str::to_string)
            .collect();
        if !undeclared.is_empty() {
            return Err(FitError::UndeclaredParameters { names: undeclared });
        }

        let selected: Vec<String> = match fittable_params {
            Some(requested) => select_explicit(&signature, requested, &non_fit)?,
            None => signature
                .args()
                .iter()
                .take_while(|a| a.is_fittable_candidate() && !non_fit.contains(&a.name))
                .map(|a| a.name.clone())
                .collect(),
        };

        let mut fit_parameters = Vec::with_capacity(selected.len());
        let mut other_arguments = Arguments::new();
        for arg in signature.args() {
            if selected.contains(&arg.name) {
                let guess = arg.default.as_ref().and_then(ArgValue::as_f64);
                fit_parameters.push(FitParameter::new(arg.name.clone(), guess)?);
            } else {
                let value = non_fit
                    .get(&arg.name)
                    .or(arg.default.as_ref())
                    .cloned()
                    .unwrap_or(ArgValue::Null);
                other_arguments.insert(arg.name.clone(), value);
            }
        }

        let mut wrapper = Self {
            model: Arc::new(model),
            signature,
            fit_parameters,
            other_arguments,
            options,
            call_args: Arguments::new(),
            unfixed: Vec::new(),
        };
        wrapper.rebuild();
        Ok(wrapper)
    }

    /// Look a name up among fit parameters, then fixed arguments.
    pub fn get(&self, name: &str) -> Option<Attribute<'_>> {
        if let Some(p) = self.fit_parameters.iter().find(|p| p.name() == name) {
            return Some(Attribute::Parameter(p));
        }
        self.other_arguments.get(name).map(Attribute::Fixed)
    }

    pub fn get_parameter(&self, name: &str) -> Result<&FitParameter> {
        self.fit_parameters
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| unknown(name))
    }

    pub fn parameter_mut(&mut self, name: &str) -> Result<&mut FitParameter> {
        self.fit_parameters
            .iter_mut()
            .find(|p| p.name() == name)
            .ok_or_else(|| unknown(name))
    }

    /// Set a fit parameter's guess or a fixed argument's value.
    ///
    /// For a fit parameter the value must have a numeric reading; `Null`
    /// clears the guess.
    pub fn set(&mut self, name: &str, value: impl Into<ArgValue>) -> Result<()> {
        let value = value.into();
        if let Some(p) = self.fit_parameters.iter_mut().find(|p| p.name() == name) {
            if value.is_null() {
                p.clear_guess();
                return Ok(());
            }
            let guess = value.as_f64().ok_or_else(|| FitError::InvalidValue {
                name: name.to_string(),
                reason: format!("cannot use {value:?} as a guess"),
            })?;
            return p.set_guess(guess);
        }
        match self.other_arguments.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(unknown(name)),
        }
    }

    pub fn set_guess(&mut self, name: &str, guess: f64) -> Result<()> {
        self.parameter_mut(name)?.set_guess(guess)
    }

    pub fn fit_parameters(&self) -> &[FitParameter] {
        &self.fit_parameters
    }

    pub fn other_arguments(&self) -> &Arguments {
        &self.other_arguments
    }

    pub fn options(&self) -> WrapperOptions {
        self.options
    }

    /// Position of `name` in the unfixed vector; `None` when fixed or unknown.
    pub fn vector_index(&self, name: &str) -> Option<usize> {
        self.unfixed_parameters().position(|p| p.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.unfixed_parameters().map(|p| p.name().to_string()).collect()
    }

    /// Current guesses of the unfixed parameters; unset guesses read as
    /// `default_guess`.
    pub fn guesses(&self) -> Vec<f64> {
        let default = self.options.default_guess;
        self.unfixed_parameters().map(|p| p.guess_or(default)).collect()
    }

    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.unfixed_parameters().map(FitParameter::bounds).collect()
    }

    /// Priors of the unfixed parameters; missing priors read as uniform.
    pub fn priors(&self) -> Vec<Prior> {
        self.unfixed_parameters()
            .map(|p| p.prior().cloned().unwrap_or_default())
            .collect()
    }

    /// Validate the parameters and rebuild the argument cache used for
    /// evaluation. Fails if a fixed argument still has no value.
    pub fn finalize_params(&mut self) -> Result<()> {
        for p in &self.fit_parameters {
            p.validate()?;
        }
        if let Some(name) = self.other_arguments.first_null() {
            return Err(FitError::MissingValue {
                name: name.to_string(),
            });
        }
        self.rebuild();
        Ok(())
    }

    /// Finalize and return a callable bound to the current state.
    pub fn model(&mut self) -> Result<BoundModel<'_>> {
        self.finalize_params()?;
        Ok(BoundModel { wrapper: self })
    }

    /// Write `params` into the unfixed slots of the cache and call the model.
    /// Assumes a preceding `finalize_params`.
    pub(crate) fn eval_cached(&mut self, params: &[f64]) -> Result<Vec<f64>> {
        for (&idx, &value) in self.unfixed.iter().zip(params) {
            let name = self.fit_parameters[idx].name();
            if let Some(slot) = self.call_args.get_mut(name) {
                *slot = ArgValue::Scalar(value);
            }
        }
        (self.model)(&self.call_args).map_err(FitError::model_failed)
    }

    fn unfixed_parameters(&self) -> impl Iterator<Item = &FitParameter> {
        self.fit_parameters.iter().filter(|p| !p.fixed())
    }

    fn rebuild(&mut self) {
        let default = self.options.default_guess;
        let mut args = Arguments::new();
        for arg in self.signature.args() {
            match self.fit_parameters.iter().find(|p| p.name() == arg.name) {
                Some(p) => args.insert(arg.name.clone(), p.guess_or(default)),
                None => {
                    let value = self.other_arguments.get(&arg.name).cloned().unwrap_or(ArgValue::Null);
                    args.insert(arg.name.clone(), value);
                }
            }
        }
        self.call_args = args;
        self.unfixed = self
            .fit_parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.fixed())
            .map(|(i, _)| i)
            .collect();
    }
}

/// A [`ModelWrapper`] ready for evaluation.
///
/// Holds the wrapper mutably, so its parameters cannot change while the
/// handle is alive.
pub struct BoundModel<'a> {
    wrapper: &'a mut ModelWrapper,
}

impl BoundModel<'_> {
    /// Evaluate at `params` (unfixed parameters, in order), or at the
    /// current guesses when `None`.
    pub fn call(&mut self, params: Option<&[f64]>) -> Result<Vec<f64>> {
        let params = match params {
            Some(p) => {
                let expected = self.wrapper.unfixed.len();
                if p.len() != expected {
                    return Err(FitError::VectorLength {
                        got: p.len(),
                        expected,
                    });
                }
                p.to_vec()
            }
            None => self.wrapper.guesses(),
        };
        self.wrapper.eval_cached(&params)
    }

    pub fn names(&self) -> Vec<String> {
        self.wrapper.names()
    }
}

fn select_explicit(signature: &Signature, requested: &[&str], non_fit: &Arguments) -> Result<Vec<String>> {
    let mut seen: Vec<&str> = Vec::with_capacity(requested.len());
    for name in requested {
        if seen.contains(name) {
            return Err(FitError::DuplicateName {
                name: name.to_string(),
            });
        }
        seen.push(name);
    }

    let undeclared: Vec<String> = requested
        .iter()
        .filter(|n| !signature.contains(n))
        .map(|n| n.to_string())
        .collect();
    if !undeclared.is_empty() {
        return Err(FitError::UndeclaredParameters { names: undeclared });
    }

    let conflicting: Vec<String> = requested
        .iter()
        .filter(|n| non_fit.contains(n))
        .map(|n| n.to_string())
        .collect();
    if !conflicting.is_empty() {
        return Err(FitError::RoleConflict {
            names: conflicting,
            roles: "fit parameters and non-fit arguments",
        });
    }

    let not_fittable: Vec<String> = signature
        .args()
        .iter()
        .filter(|a| requested.contains(&a.name.as_str()) && !a.is_fittable_candidate())
        .map(|a| a.name.clone())
        .collect();
    if !not_fittable.is_empty() {
        return Err(FitError::NotFittable { names: not_fittable });
    }
    Ok(requested.iter().map(|n| n.to_string()).collect())
}

fn unknown(name: &str) -> FitError {
    FitError::UnknownName {
        name: name.to_string(),
    }
}
