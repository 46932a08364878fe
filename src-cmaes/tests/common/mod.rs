#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use cmaopt_cmaes::{Bounds, ObjectiveStatus, ObjectiveSystem};
use cmaopt_testfunctions::{TestFunction, get_function, get_function_bounds};
use ndarray::Array1;

/// Benchmark system that counts evaluations and bound violations.
pub struct Benchmark {
    func: TestFunction,
    n: usize,
    bounds: Option<Bounds>,
    evaluations: AtomicUsize,
    violations: AtomicUsize,
}

impl Benchmark {
    pub fn unbounded(name: &str, n: usize) -> Self {
        let func = get_function(name).unwrap_or_else(|| panic!("unknown function {name}"));
        Self {
            func,
            n,
            bounds: None,
            evaluations: AtomicUsize::new(0),
            violations: AtomicUsize::new(0),
        }
    }

    /// `name` with its usual bounds
    pub fn bounded(name: &str, n: usize) -> Self {
        let pairs = get_function_bounds(name, n).unwrap_or_else(|| panic!("{name} has no bounds"));
        Self::unbounded(name, n).with_bounds(Bounds::from_pairs(&pairs).unwrap())
    }

    pub fn boxed(name: &str, n: usize, lower: f64, upper: f64) -> Self {
        Self::unbounded(name, n).with_bounds(Bounds::uniform(n, lower, upper).unwrap())
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    pub fn violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }
}

impl ObjectiveSystem for Benchmark {
    fn num_parameters(&self) -> usize {
        self.n
    }

    fn parameter_limits(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    fn objective(&self, x: &Array1<f64>, _new: bool) -> Result<f64, ObjectiveStatus> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        if let Some(b) = &self.bounds {
            if !b.contains(x.view()) {
                self.violations.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok((self.func)(x))
    }
}

/// Sphere that fails with `status` once called more than `ok_calls` times.
pub struct FailsAfter {
    pub ok_calls: usize,
    pub status: i32,
    calls: AtomicUsize,
}

impl FailsAfter {
    pub fn new(ok_calls: usize, status: i32) -> Self {
        Self { ok_calls, status, calls: AtomicUsize::new(0) }
    }
}

impl ObjectiveSystem for FailsAfter {
    fn num_parameters(&self) -> usize {
        3
    }

    fn objective(&self, x: &Array1<f64>, _new: bool) -> Result<f64, ObjectiveStatus> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_calls {
            return Err(ObjectiveStatus(self.status));
        }
        Ok(x.dot(x))
    }
}
