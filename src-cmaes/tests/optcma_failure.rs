mod common;

use cmaopt_cmaes::{CmaesError, CmaesOptimizer, DriverConfigBuilder, ParallelConfig};
use common::FailsAfter;
use ndarray::{Array1, array};

#[test]
fn test_objective_failure_aborts_run() {
    // Population size for n = 3 is 7: the 21st call is the last candidate of generation 2.
    let system = FailsAfter::new(20, 7);
    let mut optimizer = CmaesOptimizer::new(&system).unwrap();
    optimizer.options_mut().set("seed", 1);

    let mut x = array![1.0, 2.0, 3.0];
    let err = optimizer.optimize(&mut x).unwrap_err();

    assert!(err.is_evaluation_error());
    assert!(matches!(
        err,
        CmaesError::ObjectiveEvaluation { index: 6, generation: 2, status: 7 }
    ));
    assert_eq!(x, array![1.0, 2.0, 3.0]);
}

#[test]
fn test_parallel_objective_failure() {
    let system = FailsAfter::new(20, -3);
    let config = DriverConfigBuilder::new().parallel(ParallelConfig::parallel(Some(2))).build();
    let mut optimizer = CmaesOptimizer::new(&system).unwrap().with_config(config);
    optimizer.options_mut().set("seed", 1);

    let err = optimizer.minimize(&Array1::ones(3)).unwrap_err();

    assert!(matches!(
        err,
        CmaesError::ObjectiveEvaluation { generation: 2, status: -3, .. }
    ));
}

#[test]
fn test_initial_guess_failure_when_no_generation_runs() {
    let system = FailsAfter::new(0, 4);
    let mut optimizer = CmaesOptimizer::new(&system).unwrap();
    optimizer.options_mut().set("max_iterations", 0);

    let err = optimizer.minimize(&Array1::ones(3)).unwrap_err();

    assert!(matches!(err, CmaesError::ObjectiveEvaluation { status: 4, .. }));
}
