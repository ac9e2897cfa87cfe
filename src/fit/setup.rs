//! One entry point over the three engines.
//!
//! [`setup`] wraps a model callable (see [`wrap_function`]) and pairs it
//! with the engine for a [`Method`]. The returned [`Analysis`] owns both, so
//! parameters can still be edited through [`Analysis::model_mut`] before
//! calling [`Analysis::fit`].

use crate::domain::{FitData, FitQuality, FitTable, Method};
use crate::error::Result;
use crate::fit::{BayesianSampler, BootstrapFitter, MlFitter};
use crate::models::{AnyModel, Arguments, FitModel, FittableParams, ModelFunction, wrap_function};

/// A fitter chosen at runtime.
#[derive(Debug, Clone)]
pub enum AnyFitter {
    Ml(MlFitter),
    Bootstrap(BootstrapFitter),
    Mcmc(BayesianSampler),
}

impl AnyFitter {
    /// The fitter for `method` with default settings.
    pub fn for_method(method: Method) -> Self {
        match method {
            Method::Ml => AnyFitter::Ml(MlFitter::default()),
            Method::Bootstrap => AnyFitter::Bootstrap(BootstrapFitter::default()),
            Method::Mcmc => AnyFitter::Mcmc(BayesianSampler::default()),
        }
    }

    pub fn method(&self) -> Method {
        match self {
            AnyFitter::Ml(_) => Method::Ml,
            AnyFitter::Bootstrap(_) => Method::Bootstrap,
            AnyFitter::Mcmc(_) => Method::Mcmc,
        }
    }

    pub fn fit<M: FitModel>(&mut self, model: &mut M, data: &FitData) -> Result<&FitTable> {
        match self {
            AnyFitter::Ml(f) => f.fit(model, data),
            AnyFitter::Bootstrap(f) => f.fit(model, data),
            AnyFitter::Mcmc(f) => f.fit(model, data),
        }
    }

    pub fn fit_table(&self) -> Result<&FitTable> {
        match self {
            AnyFitter::Ml(f) => f.fit_table(),
            AnyFitter::Bootstrap(f) => f.fit_table(),
            AnyFitter::Mcmc(f) => f.fit_table(),
        }
    }

    pub fn quality(&self) -> Option<&FitQuality> {
        match self {
            AnyFitter::Ml(f) => f.quality(),
            AnyFitter::Bootstrap(f) => f.quality(),
            AnyFitter::Mcmc(f) => f.quality(),
        }
    }
}

/// A wrapped model bound to the engine that will fit it.
#[derive(Debug, Clone)]
pub struct Analysis {
    model: AnyModel,
    fitter: AnyFitter,
}

/// Wrap `function` and pair it with the default engine for `method`.
///
/// `fit_parameters` and `non_fit_kwargs` go to [`wrap_function`] unchanged.
pub fn setup(
    function: ModelFunction,
    method: Method,
    fit_parameters: Option<FittableParams>,
    non_fit_kwargs: Option<Arguments>,
) -> Result<Analysis> {
    let model = wrap_function(function, fit_parameters, non_fit_kwargs)?;
    Ok(Analysis::new(model, AnyFitter::for_method(method)))
}

impl Analysis {
    /// Pair an already wrapped model with a configured fitter.
    pub fn new(model: AnyModel, fitter: AnyFitter) -> Self {
        Self { model, fitter }
    }

    pub fn method(&self) -> Method {
        self.fitter.method()
    }

    pub fn model(&self) -> &AnyModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut AnyModel {
        &mut self.model
    }

    pub fn fitter(&self) -> &AnyFitter {
        &self.fitter
    }

    /// Fit the bound model to `data`.
    pub fn fit(&mut self, data: &FitData) -> Result<&FitTable> {
        self.fitter.fit(&mut self.model, data)
    }

    pub fn fit_table(&self) -> Result<&FitTable> {
        self.fitter.fit_table()
    }

    pub fn quality(&self) -> Option<&FitQuality> {
        self.fitter.quality()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::YStd;
    use crate::error::{BoxError, FitError};
    use crate::models::{Signature, VectorSignature};

    fn constant() -> ModelFunction {
        ModelFunction::named(
            |a: &Arguments| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![a.scalar("c")?; 3]) },
            Signature::new().arg("c"),
        )
    }

    #[test]
    fn setup_picks_the_engine() {
        for method in [Method::Ml, Method::Bootstrap, Method::Mcmc] {
            let f = setup(constant(), method, None, None).unwrap();
            assert_eq!(f.method(), method);
            assert!(matches!(f.fit_table(), Err(FitError::NotFit)));
        }
    }

    #[test]
    fn ml_through_setup() {
        let data = FitData::new(vec![1.0, 2.0, 3.0], YStd::Scalar(1.0)).unwrap();
        let mut f = setup(constant(), Method::Ml, None, None).unwrap();
        let c = f.fit(&data).unwrap().get("c").unwrap().estimate;
        assert!((c - 2.0).abs() < 1e-4);
        assert!(f.quality().is_some());
    }

    #[test]
    fn non_fit_kwargs_reach_the_model() {
        let f = ModelFunction::vector(
            |theta: &[f64], a: &Arguments| -> std::result::Result<Vec<f64>, BoxError> {
                Ok(a.vector("x")?.iter().map(|x| theta[0] * x).collect())
            },
            VectorSignature::new("theta").kwarg("x"),
        );
        let mut analysis = setup(
            f,
            Method::Ml,
            Some(FittableParams::names(["slope"])),
            Some(Arguments::new().with("x", vec![1.0, 2.0, 3.0])),
        )
        .unwrap();
        assert!(analysis.model().as_vector().is_some());

        analysis.model_mut().set_guess("slope", 1.0).unwrap();
        let data = FitData::new(vec![2.0, 4.0, 6.0], YStd::Scalar(0.1)).unwrap();
        let slope = analysis.fit(&data).unwrap().get("slope").unwrap().estimate;
        assert!((slope - 2.0).abs() < 1e-4);
    }

    #[test]
    fn wrapping_errors_surface_from_setup() {
        let err = setup(
            constant(),
            Method::Ml,
            Some(FittableParams::names(["c", "missing"])),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, FitError::UndeclaredParameters { .. }));
    }
}
