//! Behavior of the two wrappers as seen from outside the crate.

use std::f64::consts::PI;

use approx::assert_relative_eq;
use probfit::error::{BoxError, FitError};
use probfit::models::{
    ArgValue, Arguments, Attribute, FitModel, FittableParams, ModelWrapper, Signature, VectorModelWrapper,
    VectorSignature,
};
use probfit::priors::Prior;

fn quadratic() -> ModelWrapper {
    ModelWrapper::new(
        |a: &Arguments| -> Result<Vec<f64>, BoxError> {
            let (p0, p1, p2) = (a.scalar("p0")?, a.scalar("p1")?, a.scalar("p2")?);
            let scale = a.scalar("scale")?;
            Ok(a.vector("x")?
                .iter()
                .map(|x| scale * (p0 + p1 * x + p2 * x * x))
                .collect())
        },
        Signature::new()
            .arg("p0")
            .arg_default("p1", 1.0)
            .arg_default("p2", 0.5)
            .arg_default("x", vec![0.0, 1.0, 2.0])
            .arg_default("scale", 2.0),
        None,
    )
    .unwrap()
}

fn vector_quadratic() -> VectorModelWrapper {
    VectorModelWrapper::new(
        |theta: &[f64], a: &Arguments| -> Result<Vec<f64>, BoxError> {
            Ok(a.vector("x")?
                .iter()
                .map(|x| theta[0] + theta[1] * x + theta[2] * x * x)
                .collect())
        },
        VectorSignature::new("theta").kwarg("x"),
        FittableParams::guesses([("c0", 1.0), ("c1", 2.0), ("c2", 3.0)]),
        Some(Arguments::new().with("x", vec![0.0, 1.0, 2.0])),
    )
    .unwrap()
}

#[test]
fn leading_numeric_arguments_become_fit_parameters() {
    let w = quadratic();
    let names: Vec<&str> = w.fit_parameters().iter().map(|p| p.name()).collect();
    assert_eq!(names, ["p0", "p1", "p2"]);
    assert!(w.other_arguments().contains("x"));
    assert!(w.other_arguments().contains("scale"));
    assert_eq!(w.get_parameter("p1").unwrap().guess(), Some(1.0));
    assert_eq!(w.get_parameter("p0").unwrap().guess(), None);
}

#[test]
fn unfixed_views_follow_the_fixed_flags() {
    let mut w = quadratic();
    assert_eq!(w.names().len(), 3);
    w.parameter_mut("p1").unwrap().set_fixed(true);
    assert_eq!(w.names(), ["p0", "p2"]);
    assert_eq!(w.guesses().len(), 2);
    assert_eq!(w.bounds().len(), 2);
    assert_eq!(w.priors().len(), 2);
    assert_eq!(w.vector_index("p2"), Some(1));
    assert_eq!(w.vector_index("p1"), None);

    let mut model = w.model().unwrap();
    // scale · (p0 + 1·x + p2·x²) with p0 = 1, p2 = 0
    assert_eq!(model.call(Some(&[1.0, 0.0])).unwrap(), vec![2.0, 4.0, 6.0]);
    assert!(matches!(
        model.call(Some(&[1.0, 0.0, 0.0])),
        Err(FitError::VectorLength { got: 3, expected: 2 })
    ));
}

#[test]
fn set_and_get_round_trip() {
    let mut w = quadratic();
    w.set("p0", 4.5).unwrap();
    w.set("scale", 3.0).unwrap();
    w.set("x", vec![1.0, 2.0]).unwrap();

    assert!(matches!(w.get("p0"), Some(Attribute::Parameter(p)) if p.guess() == Some(4.5)));
    assert!(matches!(w.get("scale"), Some(Attribute::Fixed(ArgValue::Scalar(v))) if *v == 3.0));
    assert!(matches!(w.get("x"), Some(Attribute::Fixed(ArgValue::Vector(v))) if v == &[1.0, 2.0]));
    assert!(w.get("nope").is_none());
    assert!(matches!(w.set("nope", 1.0), Err(FitError::UnknownName { .. })));
}

#[test]
fn vector_model_takes_full_or_unfixed_vectors() {
    let mut w = vector_quadratic();
    w.parameter_mut("c1").unwrap().set_fixed(true);
    let expected_full = vec![1.0, 6.0, 17.0];
    let model = w.model().unwrap();
    assert_eq!(model.call(None).unwrap(), expected_full);
    assert_eq!(model.call(Some(&[1.0, 2.0, 3.0])).unwrap(), expected_full);
    // unfixed (c0, c2), c1 stays at its guess of 2
    assert_eq!(model.call(Some(&[0.0, 1.0])).unwrap(), vec![0.0, 3.0, 8.0]);
    assert!(matches!(
        model.call(Some(&[1.0])),
        Err(FitError::VectorLengthEither { got: 1, total: 3, unfixed: 2 })
    ));
}

#[test]
fn fast_model_matches_model() {
    let mut w = vector_quadratic();
    w.parameter_mut("c0").unwrap().set_fixed(true);
    let slow = w.model().unwrap().call(Some(&[0.5, -1.0])).unwrap();
    let fast = w.fast_model(&[0.5, -1.0]).unwrap();
    assert_eq!(slow, fast);
    assert_eq!(w.eval_unfixed(&[0.5, -1.0]).unwrap(), fast);
}

#[test]
fn fitting_a_keyword_argument_is_rejected_by_name() {
    let err = VectorModelWrapper::new(
        |theta: &[f64], _: &Arguments| -> Result<Vec<f64>, BoxError> { Ok(theta.to_vec()) },
        VectorSignature::new("theta").kwarg("x"),
        FittableParams::names(["x"]),
        None,
    )
    .unwrap_err();
    assert!(matches!(&err, FitError::RoleConflict { names, .. } if names == &["x"]));
    assert!(err.to_string().contains('x'));
}

#[test]
fn gaussian_prior_is_normalized() {
    let prior = Prior::gaussian(0.0, 1.0).unwrap();
    assert_relative_eq!(prior.ln_prior(0.0), -0.5 * (2.0 * PI).ln(), epsilon = 1e-7);

    let mut w = quadratic();
    w.parameter_mut("p0").unwrap().set_prior(Some(prior));
    assert_eq!(w.priors()[0].family(), "gaussian");
    assert!(w.priors()[1].is_uniform());
}
