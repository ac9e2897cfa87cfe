//! End-to-end fits of `y = m x + b` with known Gaussian noise.

use approx::assert_relative_eq;
use probfit::domain::{BayesianConfig, BootstrapConfig, BootstrapMode, FitData, Method, MlConfig, YStd};
use probfit::error::BoxError;
use probfit::fit::{BayesianSampler, BootstrapFitter, MlFitter, setup};
use probfit::models::{
    Arguments, FittableParams, ModelFunction, ModelWrapper, Signature, VectorModelWrapper, VectorSignature,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

const M: f64 = -3.0;
const B: f64 = 20.0;
const SIGMA: f64 = 0.25;
const N: usize = 20;

fn xs() -> Vec<f64> {
    (0..N).map(|i| -5.0 + 10.0 * i as f64 / (N - 1) as f64).collect()
}

fn synthetic(rng: &mut StdRng) -> FitData {
    let noise = Normal::new(0.0, SIGMA).unwrap();
    let y = xs().iter().map(|x| M * x + B + noise.sample(rng)).collect();
    FitData::new(y, YStd::Scalar(SIGMA)).unwrap()
}

fn named_line() -> ModelWrapper {
    ModelWrapper::new(
        |a: &Arguments| -> Result<Vec<f64>, BoxError> {
            let (m, b) = (a.scalar("m")?, a.scalar("b")?);
            Ok(a.vector("x")?.iter().map(|x| m * x + b).collect())
        },
        Signature::new().arg("m").arg("b").arg_default("x", xs()),
        None,
    )
    .unwrap()
}

fn vector_line() -> VectorModelWrapper {
    VectorModelWrapper::new(
        |theta: &[f64], a: &Arguments| -> Result<Vec<f64>, BoxError> {
            Ok(a.vector("x")?.iter().map(|x| theta[0] * x + theta[1]).collect())
        },
        VectorSignature::new("theta").kwarg("x"),
        FittableParams::guesses([("m", 0.0), ("b", 0.0)]),
        Some(Arguments::new().with("x", xs())),
    )
    .unwrap()
}

/// Closed-form standard errors of the slope and intercept.
fn analytic_std() -> (f64, f64) {
    let x = xs();
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let sxx: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    let std_m = SIGMA / sxx.sqrt();
    let std_b = SIGMA * (1.0 / n + mean * mean / sxx).sqrt();
    (std_m, std_b)
}

#[test]
fn ml_intervals_cover_the_truth() {
    let trials = 100;
    let mut rng = StdRng::seed_from_u64(2024);
    let (std_m, std_b) = analytic_std();
    let mut covered_m = 0;
    let mut covered_b = 0;
    for _ in 0..trials {
        let data = synthetic(&mut rng);
        let mut w = named_line();
        let mut fitter = MlFitter::new(MlConfig::default()).unwrap();
        let table = fitter.fit(&mut w, &data).unwrap();
        let m = table.get("m").unwrap();
        let b = table.get("b").unwrap();
        assert_relative_eq!(m.std.unwrap(), std_m, max_relative = 1e-2);
        assert_relative_eq!(b.std.unwrap(), std_b, max_relative = 1e-2);
        if m.low_95 <= M && M <= m.high_95 {
            covered_m += 1;
        }
        if b.low_95 <= B && B <= b.high_95 {
            covered_b += 1;
        }
    }
    // Binomial(100, 0.95): 88 is more than three standard deviations low.
    assert!(covered_m >= 88, "slope covered {covered_m}/{trials}");
    assert!(covered_b >= 88, "intercept covered {covered_b}/{trials}");
}

#[test]
fn both_wrappers_give_the_same_ml_fit() {
    let data = synthetic(&mut StdRng::seed_from_u64(7));
    let mut named = named_line();
    let mut vector = vector_line();
    let a = MlFitter::new(MlConfig::default())
        .unwrap()
        .fit(&mut named, &data)
        .unwrap()
        .clone();
    let b = MlFitter::new(MlConfig::default())
        .unwrap()
        .fit(&mut vector, &data)
        .unwrap()
        .clone();
    for name in ["m", "b"] {
        assert_relative_eq!(a.get(name).unwrap().estimate, b.get(name).unwrap().estimate, epsilon = 1e-5);
    }
}

#[test]
fn bootstrap_agrees_with_ml() {
    let data = synthetic(&mut StdRng::seed_from_u64(11));
    let (std_m, std_b) = analytic_std();

    let mut w = vector_line();
    let ml = MlFitter::new(MlConfig::default()).unwrap().fit(&mut w, &data).unwrap().clone();

    let config = BootstrapConfig {
        num_bootstrap: 100,
        mode: BootstrapMode::Perturb,
        seed: 5,
        ..BootstrapConfig::default()
    };
    let mut fitter = BootstrapFitter::new(config).unwrap();
    let boot = fitter.fit(&mut w, &data).unwrap().clone();
    assert_eq!(fitter.samples().unwrap().nrows(), 100);

    for (name, std) in [("m", std_m), ("b", std_b)] {
        let row = boot.get(name).unwrap();
        let ml_estimate = ml.get(name).unwrap().estimate;
        assert!((row.estimate - ml_estimate).abs() < 0.5 * std, "{name}: {row:?}");
        assert_relative_eq!(row.std.unwrap(), std, max_relative = 0.3);
        assert!(row.low_95 < ml_estimate && ml_estimate < row.high_95);
    }
}

#[test]
fn resampling_bootstrap_runs() {
    let data = synthetic(&mut StdRng::seed_from_u64(13));
    let mut w = named_line();
    let config = BootstrapConfig {
        num_bootstrap: 50,
        mode: BootstrapMode::Resample,
        seed: 1,
        ..BootstrapConfig::default()
    };
    let mut fitter = BootstrapFitter::new(config).unwrap();
    let table = fitter.fit(&mut w, &data).unwrap();
    let m = table.get("m").unwrap();
    assert!((m.estimate - M).abs() < 0.1);
    assert!(m.low_95 <= m.estimate && m.estimate <= m.high_95);
}

#[test]
fn mcmc_posterior_matches_ml() {
    let data = synthetic(&mut StdRng::seed_from_u64(17));
    let (std_m, std_b) = analytic_std();

    let mut w = named_line();
    let ml = MlFitter::new(MlConfig::default()).unwrap().fit(&mut w, &data).unwrap().clone();

    let config = BayesianConfig {
        num_walkers: 32,
        num_steps: 1500,
        burn_in: 300,
        seed: 9,
        ..BayesianConfig::default()
    };
    let mut sampler = BayesianSampler::new(config).unwrap();
    let post = sampler.fit(&mut w, &data).unwrap().clone();
    assert_eq!(sampler.samples().unwrap().shape(), (1200 * 32, 2));

    for (name, std) in [("m", std_m), ("b", std_b)] {
        let row = post.get(name).unwrap();
        let ml_estimate = ml.get(name).unwrap().estimate;
        assert!((row.estimate - ml_estimate).abs() < 0.25 * std, "{name}: {row:?}");
        assert_relative_eq!(row.std.unwrap(), std, max_relative = 0.2);
    }
    let medians = sampler.medians().unwrap();
    assert!((medians[0] - ml.get("m").unwrap().estimate).abs() < 0.25 * std_m);
    assert!(sampler.quality().is_some());
}

#[test]
fn setup_fits_the_line_with_every_method() {
    let data = synthetic(&mut StdRng::seed_from_u64(23));
    let (std_m, std_b) = analytic_std();
    for method in [Method::Ml, Method::Bootstrap, Method::Mcmc] {
        let line = ModelFunction::named(
            |a: &Arguments| -> Result<Vec<f64>, BoxError> {
                let (m, b) = (a.scalar("m")?, a.scalar("b")?);
                Ok(a.vector("x")?.iter().map(|x| m * x + b).collect())
            },
            Signature::new().arg("m").arg("b").arg("x"),
        );
        let mut f = setup(line, method, None, Some(Arguments::new().with("x", xs()))).unwrap();
        let table = f.fit(&data).unwrap();
        for (name, truth, std) in [("m", M, std_m), ("b", B, std_b)] {
            let row = table.get(name).unwrap();
            assert!((row.estimate - truth).abs() < 4.0 * std, "{method:?} {name}: {row:?}");
            assert!(row.low_95 < row.estimate && row.estimate < row.high_95);
        }
    }
}
