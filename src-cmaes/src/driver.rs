//! Constrained optimization driver
//!
//! One call to [`CmaesOptimizer::optimize`] is one run: options are
//! resolved, a fresh engine is created, and the loop
//! sample → repair → evaluate → update runs until the engine reports
//! termination. The engine is owned by the call, so it is released on
//! every exit path including objective failures.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use log::{Level, debug, log, warn};
use ndarray::Array1;

use crate::cma::CmaEngine;
use crate::engine::{StrategyEngine, TerminationReason};
use crate::error::{CmaesError, FeasibilityStallWarning, Result};
use crate::evaluate::{ParallelConfig, configure_thread_pool, evaluate_population};
use crate::options::{AdvancedOptions, ConvergenceSettings, resolve_options};
use crate::recorder::OptimizationRecorder;
use crate::repair::repair_population;
use crate::system::ObjectiveSystem;

/// Checkpoint written with [`Diagnostics::File`] and read by `resume`
pub const RESUME_FILE: &str = "resumecmaes.json";
/// Name of the generation-history CSV (without extension)
pub const HISTORY_NAME: &str = "allcmaes";

/// Where run diagnostics go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Diagnostics {
    /// Progress at debug level only
    #[default]
    Quiet,
    /// Progress at info level
    Console,
    /// Checkpoint and history files at the end of the run
    File,
    Both,
}

impl Diagnostics {
    pub fn console(self) -> bool {
        matches!(self, Diagnostics::Console | Diagnostics::Both)
    }

    pub fn file(self) -> bool {
        matches!(self, Diagnostics::File | Diagnostics::Both)
    }
}

impl FromStr for Diagnostics {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quiet" | "none" | "0" => Ok(Diagnostics::Quiet),
            "console" | "print" | "1" => Ok(Diagnostics::Console),
            "file" | "files" | "2" => Ok(Diagnostics::File),
            "both" | "all" | "3" => Ok(Diagnostics::Both),
            _ => Err(format!("unknown diagnostics level: {}", s)),
        }
    }
}

/// Driver-level configuration
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    /// Budgets used when the advanced options leave them unset
    pub convergence: ConvergenceSettings,
    pub diagnostics: Diagnostics,
    /// Directory for checkpoint and history files
    pub output_dir: Option<PathBuf>,
    pub parallel: ParallelConfig,
}

/// Fluent builder for [`DriverConfig`]
#[derive(Debug, Default)]
pub struct DriverConfigBuilder {
    cfg: DriverConfig,
}

impl DriverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn max_iterations(mut self, v: usize) -> Self {
        self.cfg.convergence.max_iterations = v;
        self
    }
    pub fn function_tolerance(mut self, v: f64) -> Self {
        self.cfg.convergence.function_tolerance = v;
        self
    }
    pub fn max_evaluations(mut self, v: usize) -> Self {
        self.cfg.convergence.max_evaluations = Some(v);
        self
    }
    pub fn max_time_fraction(mut self, v: f64) -> Self {
        self.cfg.convergence.max_time_fraction = v;
        self
    }
    pub fn diagnostics(mut self, v: Diagnostics) -> Self {
        self.cfg.diagnostics = v;
        self
    }
    pub fn output_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.cfg.output_dir = Some(v.into());
        self
    }
    pub fn parallel(mut self, v: ParallelConfig) -> Self {
        self.cfg.parallel = v;
        self
    }
    pub fn build(self) -> DriverConfig {
        self.cfg
    }
}

/// Information passed to the observer after each generation
#[derive(Debug, Clone)]
pub struct GenerationInfo {
    /// Generations completed
    pub generation: usize,
    pub evaluations: usize,
    pub best_x: Array1<f64>,
    /// Best fitness over all generations so far
    pub best_f: f64,
    /// Best fitness within this generation
    pub generation_best_f: f64,
    pub sigma: f64,
}

/// Per-generation observer
pub type GenerationCallback = Box<dyn FnMut(&GenerationInfo) + Send>;

/// Result of a run
#[derive(Clone)]
pub struct CmaesReport {
    pub x: Array1<f64>,
    pub fun: f64,
    pub reason: Option<TerminationReason>,
    pub message: String,
    /// Generations run
    pub nit: usize,
    /// Objective evaluations
    pub nfev: usize,
    /// Seed the engine actually used
    pub seed: u64,
    pub population_size: usize,
    /// Single-candidate redraws during repair
    pub resamples: usize,
    /// Candidates clamped after exhausting their redraws
    pub stalls: Vec<FeasibilityStallWarning>,
}

impl fmt::Debug for CmaesReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmaesReport")
            .field("x", &format!("len={}", self.x.len()))
            .field("fun", &self.fun)
            .field("message", &self.message)
            .field("nit", &self.nit)
            .field("nfev", &self.nfev)
            .field("seed", &self.seed)
            .field("population_size", &self.population_size)
            .field("resamples", &self.resamples)
            .field("stalls", &self.stalls.len())
            .finish()
    }
}

/// CMA-ES driver over an [`ObjectiveSystem`]
pub struct CmaesOptimizer<'a, S>
where
    S: ObjectiveSystem + ?Sized,
{
    system: &'a S,
    config: DriverConfig,
    options: AdvancedOptions,
    callback: Option<GenerationCallback>,
}

impl<'a, S> CmaesOptimizer<'a, S>
where
    S: ObjectiveSystem + ?Sized,
{
    /// Create a driver for `system`, which must have at least 2 parameters
    pub fn new(system: &'a S) -> Result<Self> {
        let n = system.num_parameters();
        if n < 2 {
            return Err(CmaesError::InvalidDimension { dimension: n });
        }
        if let Some(bounds) = system.parameter_limits() {
            if bounds.dimension() != n {
                return Err(CmaesError::DimensionMismatch { expected: n, got: bounds.dimension() });
            }
        }
        Ok(Self {
            system,
            config: DriverConfig::default(),
            options: AdvancedOptions::new(),
            callback: None,
        })
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Mutable access to configuration
    pub fn config_mut(&mut self) -> &mut DriverConfig {
        &mut self.config
    }

    pub fn options_mut(&mut self) -> &mut AdvancedOptions {
        &mut self.options
    }

    pub fn set_options(&mut self, options: AdvancedOptions) {
        self.options = options;
    }

    pub fn set_callback(&mut self, callback: GenerationCallback) {
        self.callback = Some(callback);
    }

    /// Minimize from the initial guess in `results`.
    ///
    /// On success `results` holds the best point found and its fitness is
    /// returned; on failure `results` is left as it was.
    pub fn optimize(&mut self, results: &mut Array1<f64>) -> Result<f64> {
        let report = self.minimize(results)?;
        results.assign(&report.x);
        Ok(report.fun)
    }

    /// Minimize from `x0` with the default CMA-ES engine
    pub fn minimize(&mut self, x0: &Array1<f64>) -> Result<CmaesReport> {
        self.minimize_with::<CmaEngine>(x0)
    }

    /// Minimize from `x0` with engine `E`
    pub fn minimize_with<E: StrategyEngine>(&mut self, x0: &Array1<f64>) -> Result<CmaesReport> {
        let n = self.system.num_parameters();
        if x0.len() != n {
            return Err(CmaesError::DimensionMismatch { expected: n, got: x0.len() });
        }
        let bounds = self.system.parameter_limits();
        if let Some(b) = bounds {
            if let Some(i) = b.first_violation(x0.view()) {
                return Err(CmaesError::InfeasibleStart {
                    index: i,
                    value: x0[i],
                    lower: b.lower()[i],
                    upper: b.upper()[i],
                });
            }
        }

        let settings = resolve_options(&self.options, n, &self.config.convergence)?;
        configure_thread_pool(&self.config.parallel);

        let level = if self.config.diagnostics.console() { Level::Info } else { Level::Debug };
        let start = Instant::now();

        let mut engine = E::initialize(settings.engine_init(x0.clone()))?;
        log!(
            level,
            "CMA-ES start: n={}, lambda={}, sigma={:.3e}, seed={}, max_iterations={}, bounded={}",
            n,
            engine.population_size(),
            engine.step_size(),
            engine.seed(),
            settings.max_iterations,
            bounds.is_some()
        );

        let artifact_dir = if settings.resume || self.config.diagnostics.file() {
            Some(self.artifact_dir())
        } else {
            None
        };

        if let (true, Some(dir)) = (settings.resume, artifact_dir.as_ref()) {
            let path = dir.join(RESUME_FILE);
            match engine.resume_from_checkpoint(&path) {
                Ok(()) => log!(level, "resumed from {}", path.display()),
                Err(e) => warn!("could not resume from {}: {}; starting fresh", path.display(), e),
            }
        }

        let recorder =
            self.config.diagnostics.file().then(|| OptimizationRecorder::new(HISTORY_NAME));
        let mut history = recorder.as_ref().map(|r| r.create_callback());

        let mut resamples = 0;
        let mut stalls = Vec::new();

        let reason = loop {
            if let Some(reason) = engine.termination() {
                break reason;
            }
            let generation = engine.generation();

            engine.sample_population();
            if let Some(b) = bounds {
                let outcome =
                    repair_population(&mut engine, b, settings.max_resample_attempts, generation);
                resamples += outcome.resamples;
                stalls.extend(outcome.stalls);
            }

            let fitness = evaluate_population(
                self.system,
                engine.population(),
                &self.config.parallel,
                generation,
            )?;
            engine.update_distribution(&fitness)?;

            let (best_x, best_f) = engine.best_ever();
            let info = GenerationInfo {
                generation: engine.generation(),
                evaluations: engine.evaluations(),
                best_x,
                best_f,
                generation_best_f: fitness
                    .iter()
                    .copied()
                    .filter(|f| !f.is_nan())
                    .fold(f64::INFINITY, f64::min),
                sigma: engine.step_size(),
            };
            log!(
                level,
                "CMA-ES gen {}: best={:.6e} gen_best={:.6e} sigma={:.3e} nfev={}",
                info.generation,
                info.best_f,
                info.generation_best_f,
                info.sigma,
                info.evaluations
            );
            if let Some(cb) = self.callback.as_mut() {
                cb(&info);
            }
            if let Some(cb) = history.as_mut() {
                cb(&info);
            }
        };

        let (mut x, mut fun) = engine.best_ever();
        let mut nfev = engine.evaluations();
        if fun == f64::INFINITY {
            // No generation ran, or no candidate had a usable fitness: fall back
            // to the initial guess, evaluated so the pair is consistent.
            let generation = engine.generation();
            fun = self.system.objective(x0, true).map_err(|s| {
                CmaesError::ObjectiveEvaluation { index: 0, generation, status: s.0 }
            })?;
            x = x0.clone();
            nfev += 1;
        }

        if let (true, Some(dir)) = (self.config.diagnostics.file(), artifact_dir.as_ref()) {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("could not create {}: {}", dir.display(), e);
            }
            let checkpoint = dir.join(RESUME_FILE);
            match engine.write_checkpoint(&checkpoint) {
                Ok(()) => debug!("wrote checkpoint {}", checkpoint.display()),
                Err(e) => warn!("could not write checkpoint {}: {}", checkpoint.display(), e),
            }
            if let Some(r) = recorder.as_ref() {
                match r.save_to_csv(dir) {
                    Ok(path) => debug!("wrote generation history {}", path.display()),
                    Err(e) => warn!("could not write generation history: {}", e),
                }
            }
        }

        let message = reason.to_string();
        log!(
            level,
            "CMA-ES done: {} (nit={}, nfev={}, f={:.6e}, {:.3}s)",
            message,
            engine.generation(),
            nfev,
            fun,
            start.elapsed().as_secs_f64()
        );
        if !stalls.is_empty() {
            warn!("{} candidates were clamped after exhausting their resamples", stalls.len());
        }

        Ok(CmaesReport {
            x,
            fun,
            reason: Some(reason),
            message,
            nit: engine.generation(),
            nfev,
            seed: engine.seed(),
            population_size: engine.population_size(),
            resamples,
            stalls,
        })
    }

    fn artifact_dir(&self) -> PathBuf {
        if let Some(dir) = &self.config.output_dir {
            return dir.clone();
        }
        match cmaopt_env::get_records_dir() {
            Ok(dir) => dir,
            Err(e) => {
                debug!("{}; writing artifacts to the current directory", e);
                PathBuf::from(".")
            }
        }
    }
}
