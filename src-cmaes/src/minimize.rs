use ndarray::Array1;

use crate::driver::{CmaesOptimizer, CmaesReport, DriverConfig};
use crate::error::Result;
use crate::options::AdvancedOptions;
use crate::system::{Bounds, FnSystem};

/// Convenience entry point over a plain closure:
/// - `func`: objective function mapping x -> f(x)
/// - `x0`: initial guess, also the initial mean of the search
/// - `bounds`: optional `(lower, upper)` pairs, one per parameter
/// - `options`: advanced options (population size, step size, seed, budgets)
/// - `config`: driver configuration
pub fn cmaes_minimize<F>(
    func: F,
    x0: &Array1<f64>,
    bounds: Option<&[(f64, f64)]>,
    options: AdvancedOptions,
    config: DriverConfig,
) -> Result<CmaesReport>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    let mut system = FnSystem::new(func, x0.len());
    if let Some(pairs) = bounds {
        system = system.with_bounds(Bounds::from_pairs(pairs)?)?;
    }
    let mut optimizer = CmaesOptimizer::new(&system)?.with_config(config);
    optimizer.set_options(options);
    optimizer.minimize(x0)
}
