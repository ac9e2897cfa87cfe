//! Bootstrap fitting: ML refits over synthetic datasets.
//!
//! Replicates are independent, so they run in parallel. Each rayon worker
//! owns a clone of the model; the objective and data are shared read-only.
//! Replicate `i` draws from its own RNG seeded with `seed + i`, so results do
//! not depend on scheduling.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::domain::{BootstrapConfig, BootstrapMode, FitData, FitQuality, FitRow, FitTable};
use crate::error::{FitError, Result};
use crate::fit::likelihood::Objective;
use crate::fit::ml::minimize;
use crate::math::Summary;
use crate::models::FitModel;

#[derive(Debug, Clone, Default)]
pub struct BootstrapFitter {
    config: BootstrapConfig,
    table: Option<FitTable>,
    quality: Option<FitQuality>,
    samples: Option<DMatrix<f64>>,
}

impl BootstrapFitter {
    pub fn new(config: BootstrapConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Run `num_bootstrap` replicates.
    ///
    /// Replicates whose refit fails are skipped with a warning; if every
    /// replicate fails, the first error is returned.
    pub fn fit<M: FitModel>(&mut self, model: &mut M, data: &FitData) -> Result<&FitTable> {
        self.table = None;
        self.quality = None;
        self.samples = None;

        model.finalize_params()?;
        let objective = Objective::new(model, data)?;
        let guesses = model.guesses();
        let config = self.config;
        let proto: &M = model;

        let results: Vec<Result<Vec<f64>>> = (0..config.num_bootstrap)
            .into_par_iter()
            .map_init(
                || proto.clone(),
                |worker, i| {
                    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
                    let replicate = replicate_objective(&objective, config.mode, &mut rng)?;
                    minimize(worker, &replicate, &guesses, &config.ml).map(|o| o.params)
                },
            )
            .collect();

        let mut draws: Vec<Vec<f64>> = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (i, result) in results.into_iter().enumerate() {
            match result {
                Ok(params) => draws.push(params),
                Err(e) => {
                    log::warn!("bootstrap replicate {i} failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        if draws.is_empty() {
            return Err(first_error.unwrap_or(FitError::NotFit));
        }
        let skipped = config.num_bootstrap - draws.len();
        if skipped > 0 {
            log::warn!("{skipped} of {} bootstrap replicates skipped", config.num_bootstrap);
        }

        let dim = objective.dim();
        let samples = DMatrix::from_fn(draws.len(), dim, |r, c| draws[r][c]);
        let mut estimate = Vec::with_capacity(dim);
        let rows = objective
            .names()
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let column: Vec<f64> = samples.column(i).iter().copied().collect();
                let s = Summary::of(&column);
                estimate.push(s.median);
                let (lower_bound, upper_bound) = objective.bounds()[i];
                FitRow {
                    name: name.clone(),
                    guess: guesses[i],
                    estimate: s.median,
                    std: s.std.is_finite().then_some(s.std),
                    low_95: s.low_95,
                    high_95: s.high_95,
                    lower_bound,
                    upper_bound,
                }
            })
            .collect();

        log::debug!("bootstrap finished with {} replicates", draws.len());
        self.quality = Some(objective.quality(model, &estimate)?);
        self.samples = Some(samples);
        Ok(self.table.insert(FitTable { rows }))
    }

    pub fn fit_table(&self) -> Result<&FitTable> {
        self.table.as_ref().ok_or(FitError::NotFit)
    }

    pub fn quality(&self) -> Option<&FitQuality> {
        self.quality.as_ref()
    }

    /// Replicate estimates, one row per successful replicate.
    pub fn samples(&self) -> Option<&DMatrix<f64>> {
        self.samples.as_ref()
    }
}

fn replicate_objective(objective: &Objective, mode: BootstrapMode, rng: &mut StdRng) -> Result<Objective> {
    match mode {
        BootstrapMode::Perturb => {
            let y = objective
                .y_obs()
                .iter()
                .zip(objective.sigmas())
                .map(|(y, s)| {
                    Normal::new(*y, *s)
                        .map(|n| n.sample(&mut *rng))
                        .map_err(|e| FitError::InvalidData(e.to_string()))
                })
                .collect::<Result<Vec<f64>>>()?;
            Ok(objective.with_y_obs(y))
        }
        BootstrapMode::Resample => {
            let n = objective.n_obs();
            let mut counts = vec![0.0; n];
            for _ in 0..n {
                counts[rng.gen_range(0..n)] += 1.0;
            }
            Ok(objective.with_counts(counts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MlConfig, YStd};
    use crate::error::BoxError;
    use crate::models::{Arguments, FittableParams, VectorModelWrapper, VectorSignature};

    fn line() -> VectorModelWrapper {
        VectorModelWrapper::new(
            |theta: &[f64], a: &Arguments| -> std::result::Result<Vec<f64>, BoxError> {
                Ok(a.vector("x")?.iter().map(|x| theta[0] * x + theta[1]).collect())
            },
            VectorSignature::new("theta").kwarg("x"),
            FittableParams::guesses([("m", 1.0), ("b", 0.0)]),
            Some(Arguments::new().with("x", vec![-2.0, -1.0, 0.0, 1.0, 2.0])),
        )
        .unwrap()
    }

    fn config(mode: BootstrapMode) -> BootstrapConfig {
        BootstrapConfig {
            num_bootstrap: 40,
            mode,
            seed: 11,
            ml: MlConfig::default(),
        }
    }

    #[test]
    fn perturbed_replicates_bracket_the_fit() {
        let mut w = line();
        let data = FitData::new(vec![-3.1, -0.9, 1.05, 2.9, 5.1], YStd::Scalar(0.2)).unwrap();
        let mut fitter = BootstrapFitter::new(config(BootstrapMode::Perturb)).unwrap();
        let table = fitter.fit(&mut w, &data).unwrap().clone();
        let m = table.get("m").unwrap();
        assert!(m.low_95 < m.estimate && m.estimate < m.high_95);
        assert!((m.estimate - 2.0).abs() < 0.2);
        assert_eq!(fitter.samples().unwrap().shape(), (40, 2));
    }

    #[test]
    fn same_seed_same_samples() {
        let data = FitData::new(vec![-3.1, -0.9, 1.05, 2.9, 5.1], YStd::Scalar(0.2)).unwrap();
        let run = || {
            let mut w = line();
            let mut fitter = BootstrapFitter::new(config(BootstrapMode::Resample)).unwrap();
            fitter.fit(&mut w, &data).unwrap();
            fitter.samples().cloned().unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn every_replicate_failing_is_an_error() {
        let mut w = line();
        let data = FitData::new(vec![1.0, 2.0], YStd::Scalar(0.2)).unwrap();
        let mut fitter = BootstrapFitter::new(config(BootstrapMode::Perturb)).unwrap();
        let err = fitter.fit(&mut w, &data).unwrap_err();
        assert!(matches!(err, FitError::OutputLength { .. }));
        assert!(fitter.fit_table().is_err());
    }
}
