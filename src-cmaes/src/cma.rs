//! Default strategy engine: CMA-ES
//!
//! `(μ/μ_w, λ)`-CMA-ES with rank-one and rank-μ covariance updates and
//! cumulative step-size adaptation. Candidates are drawn as
//! `x = m + σ·B·(D∘z)` with `z ~ N(0, I)`, where `C = B·diag(D²)·Bᵀ` is
//! refreshed lazily from the covariance matrix.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::engine::{EngineInit, StrategyEngine, TerminationBudgets, TerminationReason};
use crate::error::{CheckpointError, CmaesError, Result};

/// Largest accepted ratio between extreme covariance eigenvalues.
const MAX_CONDITION: f64 = 1e14;
/// Step tolerance relative to the initial step size.
const TOL_X_FACTOR: f64 = 1e-11;
const JACOBI_MAX_SWEEPS: usize = 100;

/// Covariance matrix adaptation evolution strategy.
pub struct CmaEngine {
    n: usize,
    lambda: usize,
    mu: usize,
    weights: Array1<f64>,
    mu_eff: f64,
    c_sigma: f64,
    d_sigma: f64,
    c_c: f64,
    c_1: f64,
    c_mu: f64,
    chi_n: f64,

    mean: Array1<f64>,
    sigma: f64,
    cov: Array2<f64>,
    b: Array2<f64>,
    d: Array1<f64>,
    p_c: Array1<f64>,
    p_sigma: Array1<f64>,
    population: Array2<f64>,

    rng: StdRng,
    seed: u64,
    budgets: TerminationBudgets,
    tol_x: f64,

    generation: usize,
    evaluations: usize,
    best_x: Array1<f64>,
    best_f: f64,
    history: VecDeque<f64>,
    history_len: usize,
    last_fitness: Array1<f64>,

    eigen_generation: usize,
    eigen_time: Duration,
    started: Instant,
}

/// Distribution state written to and read from checkpoint files.
#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    dimension: usize,
    sigma: f64,
    mean: Vec<f64>,
    covariance: Vec<Vec<f64>>,
    p_c: Vec<f64>,
    p_sigma: Vec<f64>,
}

/// NaN fitness ranks behind every number.
fn rank_key(f: f64) -> f64 {
    if f.is_nan() { f64::INFINITY } else { f }
}

fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

impl CmaEngine {
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.cov
    }

    /// Variance-effective selection mass.
    pub fn mu_eff(&self) -> f64 {
        self.mu_eff
    }

    fn draw(&mut self) -> Array1<f64> {
        let n = self.n;
        let rng = &mut self.rng;
        let z: Array1<f64> = Array1::from_shape_fn(n, |_| rng.sample(StandardNormal));
        let y = self.b.dot(&(&self.d * &z));
        &self.mean + &(y * self.sigma)
    }

    fn maybe_update_eigensystem(&mut self) {
        let gap = (self.generation - self.eigen_generation) as f64;
        let threshold = self.lambda as f64 / (self.c_1 + self.c_mu) / self.n as f64 / 10.0;
        if gap <= threshold {
            return;
        }
        if self.budgets.max_time_fraction < 1.0 {
            let elapsed = self.started.elapsed().as_secs_f64();
            if elapsed > 0.0
                && self.eigen_time.as_secs_f64() > self.budgets.max_time_fraction * elapsed
            {
                return;
            }
        }
        let t0 = Instant::now();
        self.decompose();
        self.eigen_time += t0.elapsed();
        self.eigen_generation = self.generation;
    }

    fn decompose(&mut self) {
        self.cov = (&self.cov + &self.cov.t()) * 0.5;
        let (mut values, vectors) = symmetric_eigen(&self.cov);

        let max_ev = values.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let min_ev = values.fold(f64::INFINITY, |a, &b| a.min(b));
        if min_ev <= 0.0 {
            let floor = if max_ev > 0.0 { max_ev / MAX_CONDITION } else { f64::MIN_POSITIVE };
            let shift = floor - min_ev;
            debug!(
                "covariance not positive definite (min eigenvalue {:.3e}), shifting by {:.3e}",
                min_ev, shift
            );
            for i in 0..self.n {
                self.cov[[i, i]] += shift;
            }
            values += shift;
        }

        self.d = values.mapv(f64::sqrt);
        self.b = vectors;
    }
}

impl StrategyEngine for CmaEngine {
    fn initialize(init: EngineInit) -> Result<Self> {
        let n = init.dimension;
        if n == 0 {
            return Err(CmaesError::InvalidDimension { dimension: n });
        }
        if init.initial_mean.len() != n {
            return Err(CmaesError::DimensionMismatch { expected: n, got: init.initial_mean.len() });
        }
        if init.initial_step_sizes.len() != n {
            return Err(CmaesError::DimensionMismatch {
                expected: n,
                got: init.initial_step_sizes.len(),
            });
        }
        if let Some(bad) = init.initial_step_sizes.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(CmaesError::invalid_option(
                "initial_step_size",
                format!("step sizes must be positive, got {}", bad),
            ));
        }
        let lambda = init.population_size;
        if lambda < 2 {
            return Err(CmaesError::invalid_option(
                "population_size",
                format!("population size must be at least 2, got {}", lambda),
            ));
        }

        let nf = n as f64;
        let mu = lambda / 2;
        let mu_prime = lambda as f64 / 2.0;
        let raw = Array1::from_shape_fn(mu, |i| (mu_prime + 0.5).ln() - ((i + 1) as f64).ln());
        let weights = &raw / raw.sum();
        let mu_eff = 1.0 / weights.dot(&weights);

        let c_sigma = (mu_eff + 2.0) / (nf + mu_eff + 5.0);
        let d_sigma =
            1.0 + 2.0 * (((mu_eff - 1.0) / (nf + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let c_c = (4.0 + mu_eff / nf) / (nf + 4.0 + 2.0 * mu_eff / nf);
        let c_1 = 2.0 / ((nf + 1.3).powi(2) + mu_eff);
        let c_mu = (1.0 - c_1)
            .min(2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((nf + 2.0).powi(2) + mu_eff));
        let chi_n = nf.sqrt() * (1.0 - 1.0 / (4.0 * nf) + 1.0 / (21.0 * nf * nf));

        // Overall σ is the RMS step size; the per-coordinate shape goes into C.
        let sigma = (init.initial_step_sizes.dot(&init.initial_step_sizes) / nf).sqrt();
        let d = init.initial_step_sizes.mapv(|s| s / sigma);
        let cov = Array2::from_diag(&d.mapv(|v| v * v));

        let seed = match init.seed {
            Some(s) => s,
            None => rand::rng().random::<u64>(),
        };
        debug!(
            "CMA-ES init: n={} lambda={} mu={} mu_eff={:.3} sigma={:.3e} seed={}",
            n, lambda, mu, mu_eff, sigma, seed
        );

        Ok(Self {
            n,
            lambda,
            mu,
            weights,
            mu_eff,
            c_sigma,
            d_sigma,
            c_c,
            c_1,
            c_mu,
            chi_n,
            best_x: init.initial_mean.clone(),
            mean: init.initial_mean,
            sigma,
            cov,
            b: Array2::eye(n),
            d,
            p_c: Array1::zeros(n),
            p_sigma: Array1::zeros(n),
            population: Array2::zeros((lambda, n)),
            rng: StdRng::seed_from_u64(seed),
            seed,
            budgets: init.budgets,
            tol_x: TOL_X_FACTOR * sigma,
            generation: 0,
            evaluations: 0,
            best_f: f64::INFINITY,
            history: VecDeque::new(),
            history_len: 10 + (30.0 * nf / lambda as f64).ceil() as usize,
            last_fitness: Array1::zeros(0),
            eigen_generation: 0,
            eigen_time: Duration::ZERO,
            started: Instant::now(),
        })
    }

    fn population_size(&self) -> usize {
        self.lambda
    }

    fn sample_population(&mut self) -> &Array2<f64> {
        for k in 0..self.lambda {
            let x = self.draw();
            self.population.row_mut(k).assign(&x);
        }
        &self.population
    }

    fn resample_single(&mut self, index: usize) -> ArrayView1<'_, f64> {
        let x = self.draw();
        self.population.row_mut(index).assign(&x);
        self.population.row(index)
    }

    fn replace_candidate(&mut self, index: usize, candidate: ArrayView1<f64>) {
        self.population.row_mut(index).assign(&candidate);
    }

    fn population(&self) -> &Array2<f64> {
        &self.population
    }

    fn update_distribution(&mut self, fitness: &Array1<f64>) -> Result<()> {
        if fitness.len() != self.lambda {
            return Err(CmaesError::PopulationMismatch {
                expected: self.lambda,
                got: fitness.len(),
            });
        }
        let n = self.n;
        self.evaluations += self.lambda;

        let keys = fitness.mapv(rank_key);
        let mut order: Vec<usize> = (0..self.lambda).collect();
        order.sort_by(|&a, &b| keys[a].total_cmp(&keys[b]));

        let best = order[0];
        if fitness[best] < self.best_f {
            self.best_f = fitness[best];
            self.best_x = self.population.row(best).to_owned();
        }
        self.history.push_front(keys[best]);
        self.history.truncate(self.history_len);

        // Recombination
        let old_mean = self.mean.clone();
        let mut ys = Array2::<f64>::zeros((self.mu, n));
        for (i, &k) in order.iter().take(self.mu).enumerate() {
            let y = (&self.population.row(k) - &old_mean) / self.sigma;
            ys.row_mut(i).assign(&y);
        }
        let y_w = self.weights.dot(&ys);
        self.mean = &old_mean + &(&y_w * self.sigma);

        // Evolution paths
        let cs = self.c_sigma;
        let inv_sqrt_c_yw = self.b.dot(&(&self.b.t().dot(&y_w) / &self.d));
        self.p_sigma =
            &self.p_sigma * (1.0 - cs) + &(inv_sqrt_c_yw * (cs * (2.0 - cs) * self.mu_eff).sqrt());
        self.generation += 1;

        let ps_norm = norm(&self.p_sigma);
        let hsig_denom = (1.0 - (1.0 - cs).powf(2.0 * self.generation as f64)).sqrt();
        let hsig = ps_norm / hsig_denom / self.chi_n < 1.4 + 2.0 / (n as f64 + 1.0);
        let h = if hsig { 1.0 } else { 0.0 };

        let cc = self.c_c;
        self.p_c = &self.p_c * (1.0 - cc) + &(&y_w * (h * (cc * (2.0 - cc) * self.mu_eff).sqrt()));

        // Covariance: rank-one plus rank-mu
        let pc_col = self.p_c.view().insert_axis(Axis(1));
        let rank_one = pc_col.dot(&pc_col.t());
        let weighted_ys = &ys * &self.weights.view().insert_axis(Axis(1));
        let rank_mu = ys.t().dot(&weighted_ys);
        let old_factor =
            1.0 - self.c_1 - self.c_mu + (1.0 - h) * self.c_1 * cc * (2.0 - cc);
        self.cov = &self.cov * old_factor + &(rank_one * self.c_1) + &(rank_mu * self.c_mu);

        // Step size
        self.sigma *= ((cs / self.d_sigma) * (ps_norm / self.chi_n - 1.0)).exp();

        let median = order[self.lambda / 2];
        if keys[best].is_finite() && keys[best] == keys[median] {
            self.sigma *= (0.2 + cs / self.d_sigma).exp();
            debug!(
                "flat fitness at generation {}, increasing sigma to {:.3e}",
                self.generation, self.sigma
            );
        }

        self.last_fitness = keys;
        self.maybe_update_eigensystem();
        Ok(())
    }

    fn termination(&self) -> Option<TerminationReason> {
        let budgets = &self.budgets;
        if self.generation >= budgets.max_iterations {
            return Some(TerminationReason::MaxIterations { limit: budgets.max_iterations });
        }
        if let Some(limit) = budgets.max_evaluations {
            if self.evaluations >= limit {
                return Some(TerminationReason::MaxEvaluations { limit });
            }
        }
        if self.generation == 0 {
            return None;
        }

        let (lo, hi) = self
            .history
            .iter()
            .chain(self.last_fitness.iter())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &f| (lo.min(f), hi.max(f)));
        let range = hi - lo;
        if range <= budgets.function_tolerance {
            return Some(TerminationReason::FunctionTolerance {
                range,
                tolerance: budgets.function_tolerance,
            });
        }

        let n = self.n;
        let step = |i: usize| self.sigma * self.p_c[i].abs().max(self.cov[[i, i]].sqrt());
        if (0..n).all(|i| step(i) < self.tol_x) {
            return Some(TerminationReason::StepTolerance { tolerance: self.tol_x });
        }

        let max_d = self.d.fold(0.0_f64, |a, &b| a.max(b));
        let min_d = self.d.fold(f64::INFINITY, |a, &b| a.min(b));
        let condition = if min_d > 0.0 { (max_d / min_d).powi(2) } else { f64::INFINITY };
        if condition > MAX_CONDITION {
            return Some(TerminationReason::ConditionNumber { condition });
        }

        let axis = self.generation % n;
        let scale = 0.1 * self.sigma * self.d[axis];
        if (0..n).all(|i| self.mean[i] == self.mean[i] + scale * self.b[[i, axis]]) {
            return Some(TerminationReason::NoEffectAxis { axis });
        }

        if let Some(coordinate) = (0..n)
            .find(|&i| self.mean[i] == self.mean[i] + 0.2 * self.sigma * self.cov[[i, i]].sqrt())
        {
            return Some(TerminationReason::NoEffectCoordinate { coordinate });
        }

        None
    }

    fn best_ever(&self) -> (Array1<f64>, f64) {
        (self.best_x.clone(), self.best_f)
    }

    fn generation(&self) -> usize {
        self.generation
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn step_size(&self) -> f64 {
        self.sigma
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn resume_from_checkpoint(&mut self, path: &Path) -> std::result::Result<(), CheckpointError> {
        let content = fs::read_to_string(path)
            .map_err(|source| CheckpointError::Io { path: path.to_path_buf(), source })?;
        let cp: Checkpoint = serde_json::from_str(&content)?;

        let n = self.n;
        let found = [cp.mean.len(), cp.p_c.len(), cp.p_sigma.len(), cp.covariance.len()]
            .into_iter()
            .chain(cp.covariance.iter().map(|row| row.len()))
            .find(|&len| len != n);
        if cp.dimension != n {
            return Err(CheckpointError::DimensionMismatch { expected: n, found: cp.dimension });
        }
        if let Some(found) = found {
            return Err(CheckpointError::DimensionMismatch { expected: n, found });
        }

        self.mean = Array1::from_vec(cp.mean);
        self.sigma = cp.sigma;
        self.cov = Array2::from_shape_fn((n, n), |(i, j)| cp.covariance[i][j]);
        self.p_c = Array1::from_vec(cp.p_c);
        self.p_sigma = Array1::from_vec(cp.p_sigma);
        self.decompose();
        self.eigen_generation = self.generation;
        debug!("resumed CMA-ES distribution from {} (sigma={:.3e})", path.display(), self.sigma);
        Ok(())
    }

    fn write_checkpoint(&self, path: &Path) -> std::result::Result<(), CheckpointError> {
        let cp = Checkpoint {
            dimension: self.n,
            sigma: self.sigma,
            mean: self.mean.to_vec(),
            covariance: self.cov.outer_iter().map(|row| row.to_vec()).collect(),
            p_c: self.p_c.to_vec(),
            p_sigma: self.p_sigma.to_vec(),
        };
        let json = serde_json::to_string_pretty(&cp)?;
        fs::write(path, json)
            .map_err(|source| CheckpointError::Io { path: path.to_path_buf(), source })
    }
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns the eigenvalues and the matching eigenvectors as columns.
pub(crate) fn symmetric_eigen(matrix: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let mut off = 0.0;
        let mut diag = 0.0;
        for p in 0..n {
            diag += a[[p, p]] * a[[p, p]];
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off == 0.0 || off <= f64::EPSILON * f64::EPSILON * diag {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let app = a[[p, p]];
                let aqq = a[[q, q]];
                let theta = (aqq - app) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for r in 0..n {
                    if r == p || r == q {
                        continue;
                    }
                    let arp = a[[r, p]];
                    let arq = a[[r, q]];
                    let new_rp = c * arp - s * arq;
                    let new_rq = s * arp + c * arq;
                    a[[r, p]] = new_rp;
                    a[[p, r]] = new_rp;
                    a[[r, q]] = new_rq;
                    a[[q, r]] = new_rq;
                }
                a[[p, p]] = app - t * apq;
                a[[q, q]] = aqq + t * apq;
                a[[p, q]] = 0.0;
                a[[q, p]] = 0.0;

                for r in 0..n {
                    let vrp = v[[r, p]];
                    let vrq = v[[r, q]];
                    v[[r, p]] = c * vrp - s * vrq;
                    v[[r, q]] = s * vrp + c * vrq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}
