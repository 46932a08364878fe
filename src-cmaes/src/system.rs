//! Objective systems and box constraints
//!
//! The caller describes the problem through [`ObjectiveSystem`]; the driver
//! only reads from it, so a system can be shared by concurrent evaluations.

use std::fmt;

use ndarray::{Array1, ArrayView1};

use crate::error::{CmaesError, Result};

/// Non-zero status code returned by a failing objective evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectiveStatus(pub i32);

impl fmt::Display for ObjectiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.0)
    }
}

/// Independent lower/upper limit per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl Bounds {
    /// Build bounds from lower and upper vectors of equal length.
    pub fn new(lower: Array1<f64>, upper: Array1<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(CmaesError::DimensionMismatch { expected: lower.len(), got: upper.len() });
        }
        for (i, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(CmaesError::InvalidBounds { index: i, lower: lo, upper: hi });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Same `[lower, upper]` interval on every one of `n` dimensions.
    pub fn uniform(n: usize, lower: f64, upper: f64) -> Result<Self> {
        Self::new(Array1::from_elem(n, lower), Array1::from_elem(n, upper))
    }

    /// Build bounds from `(lower, upper)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        let lower = pairs.iter().map(|&(lo, _)| lo).collect::<Array1<f64>>();
        let upper = pairs.iter().map(|&(_, hi)| hi).collect::<Array1<f64>>();
        Self::new(lower, upper)
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }

    /// Index of the first coordinate outside its interval, if any.
    pub fn first_violation(&self, x: ArrayView1<f64>) -> Option<usize> {
        x.iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .position(|(&xi, (&lo, &hi))| !(lo <= xi && xi <= hi))
    }

    pub fn contains(&self, x: ArrayView1<f64>) -> bool {
        self.first_violation(x).is_none()
    }

    /// Project `x` onto the box coordinate by coordinate.
    ///
    /// NaN coordinates are sent to the lower bound.
    pub fn clamp(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let mut out = x.to_owned();
        for (j, v) in out.iter_mut().enumerate() {
            *v = if v.is_nan() { self.lower[j] } else { v.clamp(self.lower[j], self.upper[j]) };
        }
        out
    }
}

/// A problem to minimize.
///
/// `objective` receives a candidate of length [`num_parameters`] and
/// returns its fitness (lower is better) or the non-zero status that made
/// the evaluation fail. It must not depend on call order: candidates of a
/// generation may be evaluated concurrently.
///
/// [`num_parameters`]: ObjectiveSystem::num_parameters
pub trait ObjectiveSystem: Sync {
    fn num_parameters(&self) -> usize;

    /// Box constraints, if the problem has any.
    fn parameter_limits(&self) -> Option<&Bounds> {
        None
    }

    fn has_limits(&self) -> bool {
        self.parameter_limits().is_some()
    }

    fn objective(
        &self,
        x: &Array1<f64>,
        new_parameters: bool,
    ) -> std::result::Result<f64, ObjectiveStatus>;
}

/// [`ObjectiveSystem`] built from a plain closure and optional bounds.
pub struct FnSystem<F>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    func: F,
    dimension: usize,
    bounds: Option<Bounds>,
}

impl<F> FnSystem<F>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    pub fn new(func: F, dimension: usize) -> Self {
        Self { func, dimension, bounds: None }
    }

    /// Attach box constraints; their dimension must match the problem.
    pub fn with_bounds(mut self, bounds: Bounds) -> Result<Self> {
        if bounds.dimension() != self.dimension {
            return Err(CmaesError::DimensionMismatch {
                expected: self.dimension,
                got: bounds.dimension(),
            });
        }
        self.bounds = Some(bounds);
        Ok(self)
    }
}

impl<F> ObjectiveSystem for FnSystem<F>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    fn num_parameters(&self) -> usize {
        self.dimension
    }

    fn parameter_limits(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    fn objective(
        &self,
        x: &Array1<f64>,
        _new_parameters: bool,
    ) -> std::result::Result<f64, ObjectiveStatus> {
        Ok((self.func)(x))
    }
}
