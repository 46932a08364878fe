mod common;

use cmaopt_cmaes::{CmaesOptimizer, OptimizationRecorder};
use common::Benchmark;
use ndarray::array;

#[test]
fn test_best_fitness_never_increases() {
    let system = Benchmark::bounded("ackley", 2);
    let recorder = OptimizationRecorder::new("ackley");
    let mut optimizer = CmaesOptimizer::new(&system).unwrap();
    optimizer.options_mut().set("seed", 11).set("sigma", 3.0).set("max_iterations", 120);
    optimizer.set_callback(recorder.create_callback());

    let report = optimizer.minimize(&array![2.5, -1.5]).unwrap();
    let records = recorder.records();

    assert_eq!(records.len(), report.nit);
    for pair in records.windows(2) {
        assert!(pair[1].best_f <= pair[0].best_f);
        assert_eq!(pair[1].generation, pair[0].generation + 1);
        assert!(pair[1].evaluations > pair[0].evaluations);
    }
    for record in &records {
        assert!(record.generation_best >= record.best_f);
    }
    let last = records.last().unwrap();
    assert_eq!(last.best_f, report.fun);
    assert_eq!(last.best_x, report.x.to_vec());
    assert_eq!(recorder.best_solution().map(|(_, f)| f), Some(report.fun));
}
