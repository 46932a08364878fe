//! Feasibility repair
//!
//! Every candidate handed to the objective must lie inside the box. An
//! infeasible candidate is redrawn from the engine in place; after
//! `max_attempts` failed redraws it is clamped coordinate-wise and the
//! stall is reported instead of looping forever.

use log::warn;

use crate::engine::StrategyEngine;
use crate::error::FeasibilityStallWarning;
use crate::system::Bounds;

/// What the repair step had to do for one generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairOutcome {
    /// Total number of single-candidate redraws
    pub resamples: usize,
    /// Candidates that had to be clamped
    pub stalls: Vec<FeasibilityStallWarning>,
}

impl RepairOutcome {
    pub fn is_clean(&self) -> bool {
        self.resamples == 0 && self.stalls.is_empty()
    }
}

/// Make every candidate of the engine's current population feasible.
///
/// Feasible candidates are left untouched so row indices keep lining up
/// with the engine's own bookkeeping.
pub fn repair_population<E: StrategyEngine>(
    engine: &mut E,
    bounds: &Bounds,
    max_attempts: usize,
    generation: usize,
) -> RepairOutcome {
    let mut outcome = RepairOutcome::default();

    for index in 0..engine.population_size() {
        if bounds.contains(engine.population().row(index)) {
            continue;
        }

        let mut attempts = 0;
        let mut feasible = false;
        while attempts < max_attempts {
            attempts += 1;
            if bounds.contains(engine.resample_single(index)) {
                feasible = true;
                break;
            }
        }
        outcome.resamples += attempts;

        if !feasible {
            let clamped = bounds.clamp(engine.population().row(index));
            engine.replace_candidate(index, clamped.view());
            warn!(
                "generation {}: candidate {} still infeasible after {} resamples, clamped",
                generation, index, attempts
            );
            outcome.stalls.push(FeasibilityStallWarning { generation, index, attempts });
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineInit, TerminationReason};
    use crate::error::Result;
    use ndarray::{Array1, Array2, ArrayView1, array};
    use std::collections::VecDeque;

    /// Engine whose redraws come from a fixed script.
    struct ScriptedEngine {
        population: Array2<f64>,
        script: VecDeque<Array1<f64>>,
        resample_calls: Vec<usize>,
    }

    impl ScriptedEngine {
        fn new(population: Array2<f64>, script: Vec<Array1<f64>>) -> Self {
            Self { population, script: script.into(), resample_calls: Vec::new() }
        }
    }

    impl StrategyEngine for ScriptedEngine {
        fn initialize(init: EngineInit) -> Result<Self> {
            Ok(Self::new(Array2::zeros((init.population_size, init.dimension)), Vec::new()))
        }
        fn population_size(&self) -> usize {
            self.population.nrows()
        }
        fn sample_population(&mut self) -> &Array2<f64> {
            &self.population
        }
        fn resample_single(&mut self, index: usize) -> ArrayView1<'_, f64> {
            self.resample_calls.push(index);
            if let Some(next) = self.script.pop_front() {
                self.population.row_mut(index).assign(&next);
            }
            self.population.row(index)
        }
        fn replace_candidate(&mut self, index: usize, candidate: ArrayView1<f64>) {
            self.population.row_mut(index).assign(&candidate);
        }
        fn population(&self) -> &Array2<f64> {
            &self.population
        }
        fn update_distribution(&mut self, _fitness: &Array1<f64>) -> Result<()> {
            Ok(())
        }
        fn termination(&self) -> Option<TerminationReason> {
            None
        }
        fn best_ever(&self) -> (Array1<f64>, f64) {
            (self.population.row(0).to_owned(), f64::INFINITY)
        }
        fn generation(&self) -> usize {
            0
        }
        fn evaluations(&self) -> usize {
            0
        }
        fn step_size(&self) -> f64 {
            1.0
        }
        fn seed(&self) -> u64 {
            0
        }
    }

    fn unit_box() -> Bounds {
        Bounds::uniform(2, -1.0, 1.0).unwrap()
    }

    #[test]
    fn test_feasible_population_untouched() {
        let pop = array![[0.0, 0.5], [-1.0, 1.0], [0.9, -0.9]];
        let mut engine = ScriptedEngine::new(pop.clone(), vec![]);
        let outcome = repair_population(&mut engine, &unit_box(), 10, 0);
        assert!(outcome.is_clean());
        assert!(engine.resample_calls.is_empty());
        assert_eq!(engine.population, pop);
    }

    #[test]
    fn test_resamples_until_feasible() {
        let pop = array![[0.0, 0.0], [3.0, 0.0], [0.0, 0.0]];
        let script = vec![array![2.0, 0.0], array![0.0, -5.0], array![0.5, 0.5]];
        let mut engine = ScriptedEngine::new(pop, script);
        let outcome = repair_population(&mut engine, &unit_box(), 10, 4);
        assert_eq!(outcome.resamples, 3);
        assert!(outcome.stalls.is_empty());
        assert_eq!(engine.resample_calls, vec![1, 1, 1]);
        assert_eq!(engine.population.row(1), array![0.5, 0.5]);
        assert_eq!(engine.population.row(0), array![0.0, 0.0]);
    }

    #[test]
    fn test_stall_falls_back_to_clamp() {
        let pop = array![[0.0, 0.0], [5.0, -7.0]];
        let script = vec![array![4.0, 0.0]; 3];
        let mut engine = ScriptedEngine::new(pop, script);
        let outcome = repair_population(&mut engine, &unit_box(), 3, 9);
        assert_eq!(outcome.resamples, 3);
        assert_eq!(
            outcome.stalls,
            vec![FeasibilityStallWarning { generation: 9, index: 1, attempts: 3 }]
        );
        // The last redraw (4, 0) is clamped, not the original sample.
        assert_eq!(engine.population.row(1), array![1.0, 0.0]);
        assert!(unit_box().contains(engine.population.row(1)));
    }

    #[test]
    fn test_nan_candidate_is_repaired() {
        let pop = array![[f64::NAN, 0.0], [0.0, 0.0]];
        let mut engine = ScriptedEngine::new(pop, vec![]);
        let outcome = repair_population(&mut engine, &unit_box(), 2, 0);
        assert_eq!(outcome.stalls.len(), 1);
        assert_eq!(engine.population.row(0), array![-1.0, 0.0]);
    }
}
