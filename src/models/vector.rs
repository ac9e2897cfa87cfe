//! Wrapper for models whose first argument is the parameter vector.
//!
//! The parameter set is an explicit ordered table of [`FitParameter`] rows.
//! Rows can be edited in place but never added or removed, so the table,
//! the working vector and the unfixed mask always have the same length.

use std::fmt;
use std::sync::Arc;

use crate::domain::WrapperOptions;
use crate::error::{BoxError, FitError, Result};
use crate::models::args::{ArgValue, Arguments, VectorSignature};
use crate::models::param::{FitParameter, check_reserved};
use crate::priors::Prior;

/// A vector model: receives the full parameter vector plus its keyword
/// arguments.
pub type VectorModelFn =
    Arc<dyn Fn(&[f64], &Arguments) -> std::result::Result<Vec<f64>, BoxError> + Send + Sync>;

/// Names taken by the wrapper's accessors.
pub const VECTOR_RESERVED_NAMES: &[&str] = &[
    "model",
    "fast_model",
    "guesses",
    "bounds",
    "names",
    "priors",
    "parameters",
    "parameter",
    "parameter_mut",
    "rows_mut",
    "other_arguments",
    "finalize_params",
    "set_guess",
    "set_kwarg",
    "vector_index",
];

/// The fit parameters of a vector model, in vector order.
#[derive(Debug, Clone, PartialEq)]
pub enum FittableParams {
    /// Names only; every guess starts at `default_guess`.
    Names(Vec<String>),
    /// Names with starting guesses.
    Guesses(Vec<(String, f64)>),
}

impl FittableParams {
    pub fn names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        FittableParams::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn guesses<S: Into<String>>(guesses: impl IntoIterator<Item = (S, f64)>) -> Self {
        FittableParams::Guesses(guesses.into_iter().map(|(n, g)| (n.into(), g)).collect())
    }
}

#[derive(Clone)]
pub struct VectorModelWrapper {
    model: VectorModelFn,
    signature: VectorSignature,
    rows: Vec<FitParameter>,
    other_arguments: Arguments,
    options: WrapperOptions,
    // Rebuilt by `finalize_params`.
    unfixed_mask: Vec<bool>,
    working: Vec<f64>,
}

impl fmt::Debug for VectorModelWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorModelWrapper")
            .field("signature", &self.signature)
            .field("rows", &self.rows)
            .field("other_arguments", &self.other_arguments)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl VectorModelWrapper {
    pub fn new<F>(
        model: F,
        signature: VectorSignature,
        fittable_params: FittableParams,
        non_fit_kwargs: Option<Arguments>,
    ) -> Result<Self>
    where
        F: Fn(&[f64], &Arguments) -> std::result::Result<Vec<f64>, BoxError> + Send + Sync + 'static,
    {
        Self::with_options(
            model,
            signature,
            fittable_params,
            non_fit_kwargs,
            WrapperOptions::default(),
        )
    }

    pub fn with_options<F>(
        model: F,
        signature: VectorSignature,
        fittable_params: FittableParams,
        non_fit_kwargs: Option<Arguments>,
        options: WrapperOptions,
    ) -> Result<Self>
    where
        F: Fn(&[f64], &Arguments) -> std::result::Result<Vec<f64>, BoxError> + Send + Sync + 'static,
    {
        options.validate()?;
        signature.check_unique()?;

        let entries: Vec<(String, f64)> = match fittable_params {
            FittableParams::Names(names) => names
                .into_iter()
                .map(|n| (n, options.default_guess))
                .collect(),
            FittableParams::Guesses(guesses) => {
                for (name, guess) in &guesses {
                    if !guess.is_finite() {
                        return Err(FitError::InvalidValue {
                            name: format!("fittable_params['{name}']"),
                            reason: format!("guess must be a finite number, got {guess}"),
                        });
                    }
                }
                guesses
            }
        };
        if entries.is_empty() {
            return Err(FitError::EmptyFittable);
        }
        let fit_names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        for (i, name) in fit_names.iter().enumerate() {
            if fit_names[..i].contains(name) {
                return Err(FitError::DuplicateName {
                    name: name.to_string(),
                });
            }
        }

        let clashing: Vec<String> = fit_names
            .iter()
            .filter(|n| signature.declares(n))
            .map(|n| n.to_string())
            .collect();
        if !clashing.is_empty() {
            return Err(FitError::RoleConflict {
                names: clashing,
                roles: "fit parameters and keyword arguments of the model",
            });
        }
        if fit_names.contains(&signature.vector_arg.as_str()) {
            return Err(FitError::RoleConflict {
                names: vec![signature.vector_arg.clone()],
                roles: "the parameter vector and one of its elements",
            });
        }
        for name in &fit_names {
            check_reserved(name, VECTOR_RESERVED_NAMES, "VectorModelWrapper")?;
        }

        let non_fit = non_fit_kwargs.unwrap_or_default();
        if non_fit.contains(&signature.vector_arg) {
            return Err(FitError::RoleConflict {
                names: vec![signature.vector_arg.clone()],
                roles: "the parameter vector and a non-fit keyword argument",
            });
        }
        if !signature.accepts_var_kwargs {
            let undeclared: Vec<String> = non_fit
                .names()
                .filter(|n| !signature.declares(n))
                .map(str::to_string)
                .collect();
            if !undeclared.is_empty() {
                return Err(FitError::UndeclaredParameters { names: undeclared });
            }
        }

        let mut other_arguments = Arguments::new();
        for kw in &signature.kwargs {
            other_arguments.insert(kw.name.clone(), kw.default.clone().unwrap_or(ArgValue::Null));
        }
        for (name, value) in non_fit.iter() {
            other_arguments.insert(name, value.clone());
        }
        for name in other_arguments.names() {
            check_reserved(name, VECTOR_RESERVED_NAMES, "VectorModelWrapper")?;
        }
        let overlapping: Vec<String> = fit_names
            .iter()
            .filter(|n| other_arguments.contains(n))
            .map(|n| n.to_string())
            .collect();
        if !overlapping.is_empty() {
            return Err(FitError::RoleConflict {
                names: overlapping,
                roles: "fit parameters and non-fit keyword arguments",
            });
        }

        let rows = entries
            .into_iter()
            .map(|(name, guess)| FitParameter::new(name, Some(guess)))
            .collect::<Result<Vec<_>>>()?;

        let mut wrapper = Self {
            model: Arc::new(model),
            signature,
            rows,
            other_arguments,
            options,
            unfixed_mask: Vec::new(),
            working: Vec::new(),
        };
        wrapper.finalize_params()?;
        Ok(wrapper)
    }

    /// Validate every row and rebuild the unfixed mask and working vector.
    pub fn finalize_params(&mut self) -> Result<()> {
        for row in &self.rows {
            row.validate()?;
        }
        let default = self.options.default_guess;
        self.unfixed_mask = self.rows.iter().map(|r| !r.fixed()).collect();
        self.working = self.rows.iter().map(|r| r.guess_or(default)).collect();
        Ok(())
    }

    /// Finalize and return a callable bound to the current state.
    pub fn model(&mut self) -> Result<VectorBoundModel<'_>> {
        self.finalize_params()?;
        self.check_kwargs()?;
        Ok(VectorBoundModel {
            model: &self.model,
            kwargs: &self.other_arguments,
            mask: &self.unfixed_mask,
            guesses: self.working.clone(),
        })
    }

    /// Evaluate with `params` written into the unfixed slots of the cached
    /// working vector.
    ///
    /// No finalize and no length check: the caller guarantees `params` holds
    /// exactly one value per unfixed parameter of the last finalize.
    pub fn fast_model(&mut self, params: &[f64]) -> Result<Vec<f64>> {
        let slots = self
            .working
            .iter_mut()
            .zip(&self.unfixed_mask)
            .filter_map(|(w, &free)| free.then_some(w));
        for (slot, &value) in slots.zip(params) {
            *slot = value;
        }
        (self.model)(&self.working, &self.other_arguments).map_err(FitError::model_failed)
    }

    pub fn parameters(&self) -> &[FitParameter] {
        &self.rows
    }

    pub fn parameter(&self, name: &str) -> Result<&FitParameter> {
        self.rows
            .iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| unknown(name))
    }

    pub fn parameter_mut(&mut self, name: &str) -> Result<&mut FitParameter> {
        self.rows
            .iter_mut()
            .find(|r| r.name() == name)
            .ok_or_else(|| unknown(name))
    }

    /// Edit the table in place. Changes take effect at the next finalize.
    pub fn rows_mut(&mut self) -> &mut [FitParameter] {
        &mut self.rows
    }

    pub fn set_guess(&mut self, name: &str, guess: f64) -> Result<()> {
        self.parameter_mut(name)?.set_guess(guess)
    }

    pub fn other_arguments(&self) -> &Arguments {
        &self.other_arguments
    }

    /// Set a keyword argument. Undeclared names are accepted only when the
    /// model takes arbitrary keywords.
    pub fn set_kwarg(&mut self, name: &str, value: impl Into<ArgValue>) -> Result<()> {
        if self.rows.iter().any(|r| r.name() == name) {
            return Err(FitError::RoleConflict {
                names: vec![name.to_string()],
                roles: "fit parameters and non-fit keyword arguments",
            });
        }
        if name == self.signature.vector_arg {
            return Err(FitError::RoleConflict {
                names: vec![name.to_string()],
                roles: "the parameter vector and a non-fit keyword argument",
            });
        }
        if !self.other_arguments.contains(name) {
            if !self.signature.accepts_var_kwargs {
                return Err(unknown(name));
            }
            check_reserved(name, VECTOR_RESERVED_NAMES, "VectorModelWrapper")?;
        }
        self.other_arguments.insert(name, value);
        Ok(())
    }

    pub fn options(&self) -> WrapperOptions {
        self.options
    }

    /// Position of `name` in the unfixed vector; `None` when fixed or unknown.
    pub fn vector_index(&self, name: &str) -> Option<usize> {
        self.unfixed_rows().position(|r| r.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.unfixed_rows().map(|r| r.name().to_string()).collect()
    }

    pub fn guesses(&self) -> Vec<f64> {
        let default = self.options.default_guess;
        self.unfixed_rows().map(|r| r.guess_or(default)).collect()
    }

    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.unfixed_rows().map(FitParameter::bounds).collect()
    }

    pub fn priors(&self) -> Vec<Prior> {
        self.unfixed_rows()
            .map(|r| r.prior().cloned().unwrap_or_default())
            .collect()
    }

    pub(crate) fn check_kwargs(&self) -> Result<()> {
        match self.other_arguments.first_null() {
            Some(name) => Err(FitError::MissingValue {
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn unfixed_rows(&self) -> impl Iterator<Item = &FitParameter> {
        self.rows.iter().filter(|r| !r.fixed())
    }
}

/// A [`VectorModelWrapper`] ready for evaluation.
pub struct VectorBoundModel<'a> {
    model: &'a VectorModelFn,
    kwargs: &'a Arguments,
    mask: &'a [bool],
    guesses: Vec<f64>,
}

impl VectorBoundModel<'_> {
    /// Evaluate the model.
    ///
    /// A vector of full length replaces every value; one of unfixed length
    /// fills the unfixed slots and leaves fixed ones at their guesses. `None`
    /// evaluates at the current guesses.
    pub fn call(&self, params: Option<&[f64]>) -> Result<Vec<f64>> {
        let mut full = self.guesses.clone();
        if let Some(params) = params {
            let total = full.len();
            let unfixed = self.mask.iter().filter(|&&free| free).count();
            if params.len() == total {
                full.copy_from_slice(params);
            } else if params.len() == unfixed {
                let slots = full
                    .iter_mut()
                    .zip(self.mask)
                    .filter_map(|(w, &free)| free.then_some(w));
                for (slot, &value) in slots.zip(params) {
                    *slot = value;
                }
            } else {
                return Err(FitError::VectorLengthEither {
                    got: params.len(),
                    total,
                    unfixed,
                });
            }
        }
        (self.model)(&full, self.kwargs).map_err(FitError::model_failed)
    }
}

fn unknown(name: &str) -> FitError {
    FitError::UnknownName {
        name: name.to_string(),
    }
}
