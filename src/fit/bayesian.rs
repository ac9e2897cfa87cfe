//! Bayesian sampling with an affine-invariant ensemble sampler.
//!
//! Each step updates the ensemble in two halves with the stretch move
//! (Goodman & Weare, 2010): walker `k` in one half is moved along the line
//! through a random walker `j` of the other half,
//!
//! ```text
//! y = x_j + z (x_k − x_j),   g(z) ∝ 1/√z on [1/a, a]
//! ```
//!
//! and accepted with probability `min(1, z^(d−1) · p(y) / p(x_k))`.
//!
//! All random numbers come from one seeded RNG, drawn sequentially. Only the
//! posterior evaluations of a half are parallel, each rayon worker on its own
//! model clone, so a run is reproducible for a given seed.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::domain::{BayesianConfig, FitData, FitQuality, FitRow, FitTable, MlConfig};
use crate::error::{FitError, Result};
use crate::fit::likelihood::Objective;
use crate::fit::ml::minimize;
use crate::math::Summary;
use crate::models::FitModel;

/// Attempts at drawing a starting walker with non-zero posterior.
const MAX_INIT_TRIES: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct BayesianSampler {
    config: BayesianConfig,
    table: Option<FitTable>,
    quality: Option<FitQuality>,
    medians: Option<Vec<f64>>,
    samples: Option<DMatrix<f64>>,
    acceptance: Option<f64>,
}

impl BayesianSampler {
    pub fn new(config: BayesianConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &BayesianConfig {
        &self.config
    }

    /// Sample the posterior of `model` given `data`.
    pub fn fit<M: FitModel>(&mut self, model: &mut M, data: &FitData) -> Result<&FitTable> {
        self.table = None;
        self.quality = None;
        self.medians = None;
        self.samples = None;
        self.acceptance = None;

        let cfg = self.config;
        model.finalize_params()?;
        let objective = Objective::new(model, data)?;
        let dim = objective.dim();
        if cfg.num_walkers < 2 * dim {
            return Err(FitError::invalid_config(
                "num_walkers",
                format!("need at least {} walkers for {dim} parameters", 2 * dim),
            ));
        }

        let guesses = model.guesses();
        let start = if cfg.ml_guess {
            minimize(model, &objective, &guesses, &MlConfig::default())?.params
        } else {
            guesses.clone()
        };

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let (mut walkers, mut ln_post) = initial_ensemble(model, &objective, &start, &cfg, &mut rng)?;

        let half = cfg.num_walkers / 2;
        let kept_steps = cfg.num_steps - cfg.burn_in;
        let mut chain: Vec<f64> = Vec::with_capacity(kept_steps * cfg.num_walkers * dim);
        let mut accepted = 0usize;

        for step in 0..cfg.num_steps {
            for (active, other) in [(0..half, half..cfg.num_walkers), (half..cfg.num_walkers, 0..half)] {
                let mut proposals = Vec::with_capacity(half);
                for k in active {
                    let j = rng.gen_range(other.clone());
                    let u: f64 = rng.r#gen();
                    let a = cfg.stretch_scale;
                    let z = ((a - 1.0) * u + 1.0).powi(2) / a;
                    let y: Vec<f64> = walkers[j]
                        .iter()
                        .zip(&walkers[k])
                        .map(|(xj, xk)| xj + z * (xk - xj))
                        .collect();
                    let ln_u: f64 = rng.r#gen::<f64>().ln();
                    proposals.push((k, z, y, ln_u));
                }

                let proto: &M = model;
                let proposed: Vec<Result<f64>> = proposals
                    .par_iter()
                    .map_init(|| proto.clone(), |m, (_, _, y, _)| objective.ln_posterior(m, y))
                    .collect();

                for ((k, z, y, ln_u), lp) in proposals.into_iter().zip(proposed) {
                    let lp = lp?;
                    let ln_ratio = (dim as f64 - 1.0) * z.ln() + lp - ln_post[k];
                    if lp.is_finite() && ln_u < ln_ratio {
                        walkers[k] = y;
                        ln_post[k] = lp;
                        accepted += 1;
                    }
                }
            }
            if step >= cfg.burn_in {
                for w in &walkers {
                    chain.extend_from_slice(w);
                }
            }
        }

        let n_draws = kept_steps * cfg.num_walkers;
        let samples = DMatrix::from_row_slice(n_draws, dim, &chain);
        let acceptance = accepted as f64 / (cfg.num_steps * cfg.num_walkers) as f64;
        log::debug!("ensemble sampler finished: {n_draws} draws, acceptance {acceptance:.3}");
        if acceptance < 0.05 {
            log::warn!("ensemble acceptance fraction is only {acceptance:.3}; results may be unreliable");
        }

        let mut means = Vec::with_capacity(dim);
        let mut medians = Vec::with_capacity(dim);
        let rows = objective
            .names()
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let column: Vec<f64> = samples.column(i).iter().copied().collect();
                let s = Summary::of(&column);
                means.push(s.mean);
                medians.push(s.median);
                let (lower_bound, upper_bound) = objective.bounds()[i];
                FitRow {
                    name: name.clone(),
                    guess: guesses[i],
                    estimate: s.mean,
                    std: s.std.is_finite().then_some(s.std),
                    low_95: s.low_95,
                    high_95: s.high_95,
                    lower_bound,
                    upper_bound,
                }
            })
            .collect();

        self.quality = Some(objective.quality(model, &means)?);
        self.medians = Some(medians);
        self.samples = Some(samples);
        self.acceptance = Some(acceptance);
        Ok(self.table.insert(FitTable { rows }))
    }

    pub fn fit_table(&self) -> Result<&FitTable> {
        self.table.as_ref().ok_or(FitError::NotFit)
    }

    pub fn quality(&self) -> Option<&FitQuality> {
        self.quality.as_ref()
    }

    /// Posterior medians, in unfixed-vector order.
    pub fn medians(&self) -> Option<&[f64]> {
        self.medians.as_deref()
    }

    /// Post-burn-in draws: one row per walker per kept step, one column per
    /// unfixed parameter. Rows are grouped by step.
    pub fn samples(&self) -> Option<&DMatrix<f64>> {
        self.samples.as_ref()
    }

    /// Fraction of proposals accepted over the whole run.
    pub fn acceptance_fraction(&self) -> Option<f64> {
        self.acceptance
    }
}

/// Walkers scattered around `start`, each with finite posterior.
fn initial_ensemble<M: FitModel>(
    model: &mut M,
    objective: &Objective,
    start: &[f64],
    cfg: &BayesianConfig,
    rng: &mut StdRng,
) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
    let lp0 = objective.ln_posterior(model, start)?;
    if !lp0.is_finite() {
        return Err(FitError::NonFiniteStart {
            names: objective.blame(start),
        });
    }

    let mut walkers = Vec::with_capacity(cfg.num_walkers);
    let mut ln_post = Vec::with_capacity(cfg.num_walkers);
    for _ in 0..cfg.num_walkers {
        let mut placed = false;
        for _ in 0..MAX_INIT_TRIES {
            let w: Vec<f64> = start
                .iter()
                .map(|x| {
                    let n: f64 = rng.sample(StandardNormal);
                    x + cfg.initial_walker_spread * x.abs().max(1.0) * n
                })
                .collect();
            let lp = objective.ln_posterior(model, &w)?;
            if lp.is_finite() {
                walkers.push(w);
                ln_post.push(lp);
                placed = true;
                break;
            }
        }
        if !placed {
            log::warn!("could not scatter a walker around the start point; starting it there");
            walkers.push(start.to_vec());
            ln_post.push(lp0);
        }
    }
    Ok((walkers, ln_post))
}
