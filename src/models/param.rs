//! A single fittable quantity.

use crate::error::{FitError, Result};
use crate::priors::Prior;

/// One fit parameter: a named model argument the fitters may vary.
///
/// The guess always lies within the bounds; every setter checks this and
/// reports the parameter name on failure.
#[derive(Debug, Clone)]
pub struct FitParameter {
    name: String,
    guess: Option<f64>,
    fixed: bool,
    bounds: (f64, f64),
    prior: Option<Prior>,
}

impl FitParameter {
    pub fn new(name: impl Into<String>, guess: Option<f64>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FitError::InvalidValue {
                name,
                reason: "parameter names must not be empty".to_string(),
            });
        }
        let mut param = Self {
            name,
            guess: None,
            fixed: false,
            bounds: (f64::NEG_INFINITY, f64::INFINITY),
            prior: None,
        };
        if let Some(g) = guess {
            param.set_guess(g)?;
        }
        Ok(param)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn guess(&self) -> Option<f64> {
        self.guess
    }

    /// The guess, or `default` when none has been set.
    pub fn guess_or(&self, default: f64) -> f64 {
        self.guess.unwrap_or(default)
    }

    pub fn set_guess(&mut self, guess: f64) -> Result<()> {
        if !guess.is_finite() {
            return Err(FitError::InvalidValue {
                name: self.name.clone(),
                reason: format!("guess must be a finite number, got {guess}"),
            });
        }
        let (lower, upper) = self.bounds;
        if guess < lower || guess > upper {
            return Err(FitError::GuessOutOfBounds {
                name: self.name.clone(),
                guess,
                lower,
                upper,
            });
        }
        self.guess = Some(guess);
        Ok(())
    }

    pub fn clear_guess(&mut self) {
        self.guess = None;
    }

    pub fn fixed(&self) -> bool {
        self.fixed
    }

    pub fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    pub fn bounds(&self) -> (f64, f64) {
        self.bounds
    }

    /// Replace the bounds. Either end may be infinite; the current guess, if
    /// any, must lie inside the new interval.
    pub fn set_bounds(&mut self, lower: f64, upper: f64) -> Result<()> {
        check_bounds(&self.name, lower, upper)?;
        if let Some(guess) = self.guess
            && (guess < lower || guess > upper)
        {
            return Err(FitError::GuessOutOfBounds {
                name: self.name.clone(),
                guess,
                lower,
                upper,
            });
        }
        self.bounds = (lower, upper);
        Ok(())
    }

    pub fn prior(&self) -> Option<&Prior> {
        self.prior.as_ref()
    }

    pub fn set_prior(&mut self, prior: Option<Prior>) {
        self.prior = prior;
    }

    /// Re-check every invariant of the record.
    pub fn validate(&self) -> Result<()> {
        let (lower, upper) = self.bounds;
        check_bounds(&self.name, lower, upper)?;
        if let Some(guess) = self.guess {
            if !guess.is_finite() {
                return Err(FitError::InvalidValue {
                    name: self.name.clone(),
                    reason: format!("guess must be a finite number, got {guess}"),
                });
            }
            if guess < lower || guess > upper {
                return Err(FitError::GuessOutOfBounds {
                    name: self.name.clone(),
                    guess,
                    lower,
                    upper,
                });
            }
        }
        Ok(())
    }
}

fn check_bounds(name: &str, lower: f64, upper: f64) -> Result<()> {
    if lower.is_nan() || upper.is_nan() || lower >= upper {
        return Err(FitError::InvalidBounds {
            name: name.to_string(),
            lower,
            upper,
        });
    }
    Ok(())
}

/// Fail if `name` collides with the accessor surface of a wrapper.
pub(crate) fn check_reserved(name: &str, reserved: &[&str], owner: &'static str) -> Result<()> {
    if reserved.contains(&name) {
        return Err(FitError::ReservedName {
            name: name.to_string(),
            owner,
        });
    }
    Ok(())
}
