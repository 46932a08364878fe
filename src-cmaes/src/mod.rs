//! Box-constrained CMA-ES optimization driver in pure Rust using ndarray
//!
//! The caller supplies an [`ObjectiveSystem`] (objective plus optional
//! per-parameter bounds); the driver runs the generation loop against a
//! [`StrategyEngine`], by default the [`CmaEngine`] in this crate.
//!
//! Supported features:
//! - Box constraints, enforced by resampling infeasible candidates with a
//!   bounded retry count and a clamping fallback
//! - Advanced options by name (`lambda`, `sigma`, `seed`, budgets, `resume`)
//!   resolved once into typed settings
//! - Optional parallel evaluation of each generation on the rayon pool
//! - Checkpoint and generation-history files, resume from a checkpoint
//!
//! ```no_run
//! use cmaopt_cmaes::{AdvancedOptions, Bounds, CmaesOptimizer, FnSystem};
//! use ndarray::Array1;
//!
//! let system = FnSystem::new(|x: &Array1<f64>| x.dot(x), 5)
//!     .with_bounds(Bounds::uniform(5, -10.0, 10.0)?)?;
//! let mut optimizer = CmaesOptimizer::new(&system)?;
//! optimizer.set_options(AdvancedOptions::new().with("seed", 42));
//!
//! let mut x = Array1::from_elem(5, 5.0);
//! let best = optimizer.optimize(&mut x)?;
//! println!("f = {best:e} at {x}");
//! # Ok::<(), cmaopt_cmaes::CmaesError>(())
//! ```

pub mod cma;
pub mod driver;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod minimize;
pub mod options;
pub mod recorder;
pub mod repair;
pub mod system;

pub use cma::CmaEngine;
pub use driver::{
    CmaesOptimizer, CmaesReport, Diagnostics, DriverConfig, DriverConfigBuilder, GenerationCallback,
    GenerationInfo, HISTORY_NAME, RESUME_FILE,
};
pub use engine::{EngineInit, StrategyEngine, TerminationBudgets, TerminationReason};
pub use error::{CheckpointError, CmaesError, FeasibilityStallWarning, Result};
pub use evaluate::ParallelConfig;
pub use minimize::cmaes_minimize;
pub use options::{
    AdvancedOptions, CmaesSettings, ConvergenceSettings, OptionKey, OptionValue, resolve_options,
};
pub use recorder::{GenerationRecord, OptimizationRecorder};
pub use repair::{RepairOutcome, repair_population};
pub use system::{Bounds, FnSystem, ObjectiveStatus, ObjectiveSystem};
