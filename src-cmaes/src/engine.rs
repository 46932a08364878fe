//! Strategy engine contract
//!
//! The driver talks to the search distribution only through
//! [`StrategyEngine`]. The engine owns its state for one run; dropping it
//! releases everything, so the driver needs no explicit dispose step.

use std::fmt;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{CheckpointError, Result};

/// Stopping budgets handed to the engine at initialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminationBudgets {
    /// Maximum number of generations
    pub max_iterations: usize,
    /// Maximum number of objective evaluations (None = unlimited)
    pub max_evaluations: Option<usize>,
    /// Stop when recent fitness values span less than this
    pub function_tolerance: f64,
    /// Largest share of wall time the engine may spend in its
    /// decomposition step; 1.0 or more never postpones it
    pub max_time_fraction: f64,
}

/// Everything an engine needs to start a run.
#[derive(Debug, Clone)]
pub struct EngineInit {
    pub dimension: usize,
    pub initial_mean: Array1<f64>,
    /// Initial standard deviation per coordinate
    pub initial_step_sizes: Array1<f64>,
    /// None lets the engine pick (and report) its own seed
    pub seed: Option<u64>,
    pub population_size: usize,
    pub budgets: TerminationBudgets,
}

/// Why an engine stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerminationReason {
    MaxIterations { limit: usize },
    MaxEvaluations { limit: usize },
    /// Range of recent fitness values fell below the tolerance
    FunctionTolerance { range: f64, tolerance: f64 },
    /// Every coordinate's standard deviation fell below the tolerance
    StepTolerance { tolerance: f64 },
    ConditionNumber { condition: f64 },
    /// Adding a principal-axis step did not change the mean
    NoEffectAxis { axis: usize },
    /// Adding a coordinate step did not change the mean
    NoEffectCoordinate { coordinate: usize },
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TerminationReason::MaxIterations { limit } => {
                write!(f, "Maximum number of iterations reached: {}", limit)
            }
            TerminationReason::MaxEvaluations { limit } => {
                write!(f, "Maximum number of function evaluations reached: {}", limit)
            }
            TerminationReason::FunctionTolerance { range, tolerance } => write!(
                f,
                "Function values converged: range {:.3e} <= tolerance {:.3e}",
                range, tolerance
            ),
            TerminationReason::StepTolerance { tolerance } => {
                write!(f, "Step sizes below tolerance {:.3e}", tolerance)
            }
            TerminationReason::ConditionNumber { condition } => {
                write!(f, "Covariance condition number {:.3e} too large", condition)
            }
            TerminationReason::NoEffectAxis { axis } => {
                write!(f, "Standard deviation along principal axis {} has no effect", axis)
            }
            TerminationReason::NoEffectCoordinate { coordinate } => {
                write!(f, "Standard deviation in coordinate {} has no effect", coordinate)
            }
        }
    }
}

/// A population-based search distribution.
///
/// Candidates are the rows of the population matrix. After
/// [`sample_population`](StrategyEngine::sample_population) the driver may
/// regenerate or overwrite single rows before reporting one fitness value
/// per row, in row order, to
/// [`update_distribution`](StrategyEngine::update_distribution).
pub trait StrategyEngine: Sized {
    fn initialize(init: EngineInit) -> Result<Self>;

    fn population_size(&self) -> usize;

    /// Draw a fresh population from the current distribution.
    fn sample_population(&mut self) -> &Array2<f64>;

    /// Redraw only candidate `index` of the current population.
    fn resample_single(&mut self, index: usize) -> ArrayView1<'_, f64>;

    /// Overwrite candidate `index` with a caller-supplied point.
    fn replace_candidate(&mut self, index: usize, candidate: ArrayView1<f64>);

    /// Population of the current generation.
    fn population(&self) -> &Array2<f64>;

    fn update_distribution(&mut self, fitness: &Array1<f64>) -> Result<()>;

    /// `Some(reason)` once any stopping criterion holds.
    fn termination(&self) -> Option<TerminationReason>;

    /// Best point and fitness seen over all generations.
    fn best_ever(&self) -> (Array1<f64>, f64);

    fn generation(&self) -> usize;

    fn evaluations(&self) -> usize;

    /// Current overall step size.
    fn step_size(&self) -> f64;

    /// Seed actually used by the random generator.
    fn seed(&self) -> u64;

    /// Restore the distribution from a checkpoint file.
    fn resume_from_checkpoint(&mut self, _path: &Path) -> std::result::Result<(), CheckpointError> {
        Err(CheckpointError::Unsupported)
    }

    /// Write the distribution to a checkpoint file.
    fn write_checkpoint(&self, _path: &Path) -> std::result::Result<(), CheckpointError> {
        Err(CheckpointError::Unsupported)
    }
}
