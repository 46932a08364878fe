use log::debug;
use ndarray::{Array1, Array2};
use rayon::prelude::*;

use crate::error::{CmaesError, Result};
use crate::system::{ObjectiveStatus, ObjectiveSystem};

/// Parallel evaluation configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParallelConfig {
    /// Evaluate the candidates of a generation on the rayon pool
    pub enabled: bool,
    /// Number of threads to use (None = use rayon default)
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn sequential() -> Self {
        Self::default()
    }

    pub fn parallel(num_threads: Option<usize>) -> Self {
        Self { enabled: true, num_threads }
    }
}

/// Size the global rayon pool once.
///
/// Returns false when a thread count was requested but the global pool
/// already existed, in which case the existing pool keeps its size.
pub fn configure_thread_pool(config: &ParallelConfig) -> bool {
    let (true, Some(n)) = (config.enabled, config.num_threads) else {
        return true;
    };
    match rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
        Ok(()) => true,
        Err(e) => {
            debug!(
                "requested {} evaluation threads not applied ({}); using {}",
                n,
                e,
                rayon::current_num_threads()
            );
            false
        }
    }
}

/// Evaluate every row of `population`, returning index-aligned fitness.
///
/// Sequential mode stops at the first failing candidate. Parallel mode
/// evaluates every candidate and reports the failure with the lowest
/// index, so both modes surface the same error.
pub fn evaluate_population<S>(
    system: &S,
    population: &Array2<f64>,
    config: &ParallelConfig,
    generation: usize,
) -> Result<Array1<f64>>
where
    S: ObjectiveSystem + ?Sized,
{
    let npop = population.nrows();
    let failure = |index: usize, status: ObjectiveStatus| CmaesError::ObjectiveEvaluation {
        index,
        generation,
        status: status.0,
    };

    if !config.enabled {
        let mut fitness = Array1::zeros(npop);
        for i in 0..npop {
            let candidate = population.row(i).to_owned();
            fitness[i] = system.objective(&candidate, true).map_err(|s| failure(i, s))?;
        }
        return Ok(fitness);
    }

    let results = (0..npop)
        .into_par_iter()
        .map(|i| {
            let candidate = population.row(i).to_owned();
            system.objective(&candidate, true)
        })
        .collect::<Vec<_>>();

    let mut fitness = Array1::zeros(npop);
    for (i, result) in results.into_iter().enumerate() {
        fitness[i] = result.map_err(|s| failure(i, s))?;
    }
    Ok(fitness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::FnSystem;
    use ndarray::array;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailAbove {
        threshold: f64,
        calls: AtomicUsize,
    }

    impl ObjectiveSystem for FailAbove {
        fn num_parameters(&self) -> usize {
            2
        }
        fn objective(
            &self,
            x: &Array1<f64>,
            new_parameters: bool,
        ) -> std::result::Result<f64, ObjectiveStatus> {
            assert!(new_parameters);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if x[0] > self.threshold { Err(ObjectiveStatus(3)) } else { Ok(x[0] + x[1]) }
        }
    }

    #[test]
    fn test_second_pool_size_is_not_applied() {
        assert!(configure_thread_pool(&ParallelConfig::sequential()));
        assert!(configure_thread_pool(&ParallelConfig::parallel(None)));
        configure_thread_pool(&ParallelConfig::parallel(Some(2)));
        assert!(!configure_thread_pool(&ParallelConfig::parallel(Some(3))));
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let sys = FnSystem::new(|x: &Array1<f64>| x.iter().map(|v| v * v).sum(), 2);
        let pop = Array2::from_shape_fn((16, 2), |(i, j)| i as f64 - j as f64 * 0.5);

        let seq = evaluate_population(&sys, &pop, &ParallelConfig::sequential(), 0).unwrap();
        let par = evaluate_population(&sys, &pop, &ParallelConfig::parallel(None), 0).unwrap();
        assert_eq!(seq, par);
        assert_eq!(seq[3], 9.0 + 0.25);
    }

    #[test]
    fn test_sequential_stops_at_first_failure() {
        let sys = FailAbove { threshold: 1.5, calls: AtomicUsize::new(0) };
        let pop = array![[0.0, 1.0], [1.0, 1.0], [2.0, 1.0], [3.0, 1.0]];
        let err = evaluate_population(&sys, &pop, &ParallelConfig::sequential(), 5).unwrap_err();
        assert!(matches!(
            err,
            CmaesError::ObjectiveEvaluation { index: 2, generation: 5, status: 3 }
        ));
        assert_eq!(sys.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_parallel_reports_lowest_failing_index() {
        let sys = FailAbove { threshold: 1.5, calls: AtomicUsize::new(0) };
        let pop = array![[0.0, 1.0], [3.0, 1.0], [2.0, 1.0], [0.5, 1.0]];
        let err = evaluate_population(&sys, &pop, &ParallelConfig::parallel(None), 0).unwrap_err();
        assert!(matches!(err, CmaesError::ObjectiveEvaluation { index: 1, .. }));
        assert_eq!(sys.calls.load(Ordering::SeqCst), 4);
    }
}
