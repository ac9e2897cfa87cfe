//! Crate-wide error type.
//!
//! Validation errors are raised while building wrappers, priors and fitter
//! configurations; runtime errors are raised while evaluating a model or
//! running a fit. Every variant that concerns a parameter carries its name.

use thiserror::Error;

/// Boxed error returned by user model callables.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, FitError>;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("parameter name '{name}' is reserved by {owner}; rename the model argument")]
    ReservedName { name: String, owner: &'static str },

    #[error("name '{name}' is declared more than once")]
    DuplicateName { name: String },

    #[error("parameter(s) not declared as model arguments: {}", .names.join(", "))]
    UndeclaredParameters { names: Vec<String> },

    #[error("default for argument(s) {} cannot be coerced into a float", .names.join(", "))]
    NotFittable { names: Vec<String> },

    #[error("parameter(s) {} cannot be both {roles}", .names.join(", "))]
    RoleConflict { names: Vec<String>, roles: &'static str },

    #[error("'{name}' is neither a fit parameter nor a fixed argument")]
    UnknownName { name: String },

    #[error("invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("guess {guess} for parameter '{name}' lies outside bounds [{lower}, {upper}]")]
    GuessOutOfBounds {
        name: String,
        guess: f64,
        lower: f64,
        upper: f64,
    },

    #[error("invalid bounds [{lower}, {upper}] for parameter '{name}'")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    #[error("number of fit parameters ({got}) does not match number of unfixed parameters ({expected})")]
    VectorLength { got: usize, expected: usize },

    #[error(
        "params length ({got}) must either equal the total number of parameters ({total}) \
         or the number of unfixed parameters ({unfixed})"
    )]
    VectorLengthEither {
        got: usize,
        total: usize,
        unfixed: usize,
    },

    #[error("argument '{name}' has no value; set it before evaluating the model")]
    MissingValue { name: String },

    #[error("fittable_params must contain at least one parameter")]
    EmptyFittable,

    #[error("no unfixed parameters to fit")]
    NoUnfixedParameters,

    #[error("'{family}' is not a continuous distribution")]
    NotContinuous { family: String },

    #[error("unknown distribution family '{family}'")]
    UnknownFamily { family: String },

    #[error("the {family} distribution could not be constructed")]
    PriorConstruction {
        family: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid fit data: {0}")]
    InvalidData(String),

    #[error("invalid configuration '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("the wrapped model failed")]
    ModelFailed {
        #[source]
        source: BoxError,
    },

    #[error("model returned {got} values but {expected} observations were supplied")]
    OutputLength { got: usize, expected: usize },

    #[error("starting point has zero posterior probability for parameter(s): {}", .names.join(", "))]
    NonFiniteStart { names: Vec<String> },

    #[error("optimizer failed: {0}")]
    Optimizer(String),

    #[error("no completed fit is available")]
    NotFit,
}

impl FitError {
    pub(crate) fn model_failed(source: BoxError) -> Self {
        FitError::ModelFailed { source }
    }

    pub(crate) fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        FitError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn messages_name_offending_parameters() {
        let err = FitError::UndeclaredParameters {
            names: vec!["a".into(), "c".into()],
        };
        assert!(err.to_string().contains("a, c"));

        let err = FitError::RoleConflict {
            names: vec!["x".into()],
            roles: "fit parameters and keyword arguments",
        };
        assert!(err.to_string().contains("x"));
    }

    #[test]
    fn model_failure_keeps_cause() {
        let cause: BoxError = "division by zero".into();
        let err = FitError::model_failed(cause);
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("division by zero"));
    }
}
