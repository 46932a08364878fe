//! Optimization test functions library
//!
//! Closed-form benchmark functions used to validate the optimizer, with
//! metadata (usual bounds, optimum, modality) and lookup by name.
//!
//! # Example
//!
//! ```rust
//! use ndarray::Array1;
//! use cmaopt_testfunctions::*;
//!
//! let x = Array1::from_vec(vec![0.0, 0.0]);
//! assert_eq!(sphere(&x), 0.0);
//!
//! let f = get_function("rosenbrock").unwrap();
//! assert_eq!(f(&Array1::from_vec(vec![1.0, 1.0, 1.0])), 0.0);
//!
//! let bounds = get_function_bounds("ackley", 3).unwrap();
//! assert_eq!(bounds.len(), 3);
//! ```

use ndarray::Array1;
use std::collections::HashMap;

pub mod functions;
pub use functions::*;

/// Signature shared by every test function
pub type TestFunction = fn(&Array1<f64>) -> f64;

/// Metadata for a test function
#[derive(Debug, Clone)]
pub struct FunctionMetadata {
    /// Function name
    pub name: String,
    /// Usual search interval, applied to every dimension (None = unbounded)
    pub bounds: Option<(f64, f64)>,
    /// Location of the global minimum for a given dimension
    pub optimum: fn(usize) -> Vec<f64>,
    /// Value at the global minimum
    pub optimal_value: f64,
    /// Description of the function
    pub description: String,
    /// Whether the function is multimodal
    pub multimodal: bool,
    /// Supported dimension(s); empty means any dimension ≥ 2
    pub dimensions: Vec<usize>,
}

impl FunctionMetadata {
    pub fn supports_dimension(&self, n: usize) -> bool {
        if self.dimensions.is_empty() { n >= 2 } else { self.dimensions.contains(&n) }
    }
}

/// Same `(lower, upper)` pair for each of `n` dimensions
pub fn create_bounds(n: usize, lower: f64, upper: f64) -> Vec<(f64, f64)> {
    vec![(lower, upper); n]
}

fn zeros(n: usize) -> Vec<f64> {
    vec![0.0; n]
}

fn ones(n: usize) -> Vec<f64> {
    vec![1.0; n]
}

fn schwefel_optimum(n: usize) -> Vec<f64> {
    vec![420.9687; n]
}

fn easom_optimum(_n: usize) -> Vec<f64> {
    vec![std::f64::consts::PI; 2]
}

fn meta(
    name: &str,
    bounds: Option<(f64, f64)>,
    optimum: fn(usize) -> Vec<f64>,
    optimal_value: f64,
    description: &str,
    multimodal: bool,
    dimensions: Vec<usize>,
) -> FunctionMetadata {
    FunctionMetadata {
        name: name.to_string(),
        bounds,
        optimum,
        optimal_value,
        description: description.to_string(),
        multimodal,
        dimensions,
    }
}

/// Get metadata for all available test functions
pub fn get_function_metadata() -> HashMap<String, FunctionMetadata> {
    [
        meta(
            "sphere",
            Some((-5.12, 5.12)),
            zeros,
            0.0,
            "N-dimensional quadratic bowl",
            false,
            vec![],
        ),
        meta("cigtab", None, zeros, 0.0, "N-dimensional badly scaled quadratic", false, vec![]),
        meta("rosenbrock", None, ones, 0.0, "N-dimensional curved valley", false, vec![]),
        meta(
            "ackley",
            Some((-32.768, 32.768)),
            zeros,
            0.0,
            "N-dimensional multimodal function",
            true,
            vec![],
        ),
        meta(
            "rastrigin",
            Some((-5.12, 5.12)),
            zeros,
            0.0,
            "N-dimensional highly multimodal function",
            true,
            vec![],
        ),
        meta(
            "schwefel",
            Some((-500.0, 500.0)),
            schwefel_optimum,
            0.0,
            "N-dimensional multimodal function, optimum near the bounds",
            true,
            vec![],
        ),
        meta("drop_wave", Some((-5.12, 5.12)), zeros, -1.0, "2D multimodal ripples", true, vec![2]),
        meta(
            "easom",
            Some((-100.0, 100.0)),
            easom_optimum,
            -1.0,
            "2D plateau with a narrow well",
            true,
            vec![2],
        ),
    ]
    .into_iter()
    .map(|m| (m.name.clone(), m))
    .collect()
}

/// Registry name for `name`, accepting aliases
pub fn canonical_name(name: &str) -> Option<&'static str> {
    let canonical = match name {
        "sphere" => "sphere",
        "cigtab" => "cigtab",
        "rosenbrock" => "rosenbrock",
        "ackley" => "ackley",
        "rastrigin" => "rastrigin",
        "schwefel" => "schwefel",
        "drop_wave" | "dropwave" => "drop_wave",
        "easom" => "easom",
        _ => return None,
    };
    Some(canonical)
}

/// Look up a test function by name
pub fn get_function(name: &str) -> Option<TestFunction> {
    let f: TestFunction = match canonical_name(name)? {
        "sphere" => sphere,
        "cigtab" => cigtab,
        "rosenbrock" => rosenbrock,
        "ackley" => ackley,
        "rastrigin" => rastrigin,
        "schwefel" => schwefel,
        "drop_wave" => drop_wave,
        "easom" => easom,
        _ => return None,
    };
    Some(f)
}

/// Usual bounds of `function_name` for `n` dimensions
///
/// Returns None for unknown or unbounded functions.
pub fn get_function_bounds(function_name: &str, n: usize) -> Option<Vec<(f64, f64)>> {
    let metadata = get_function_metadata();
    let (lo, hi) = metadata.get(canonical_name(function_name)?)?.bounds?;
    Some(create_bounds(n, lo, hi))
}

/// Sorted names of all functions
pub fn list_functions() -> Vec<String> {
    let mut names: Vec<String> = get_function_metadata().into_keys().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_function_minima() {
        for (name, meta) in get_function_metadata() {
            let f = get_function(&name).unwrap_or_else(|| panic!("{} not registered", name));
            for n in [2usize, 3, 5] {
                if !meta.supports_dimension(n) {
                    continue;
                }
                let x = Array1::from_vec((meta.optimum)(n));
                let value = f(&x);
                // Schwefel's constant is rounded to 4 decimals.
                let tolerance = if name == "schwefel" { 1e-3 * n as f64 } else { 1e-10 };
                assert!(
                    (value - meta.optimal_value).abs() < tolerance,
                    "{} (n={}): f(optimum) = {}, expected {}",
                    name,
                    n,
                    value,
                    meta.optimal_value
                );
            }
        }
    }

    #[test]
    fn test_optimum_is_within_bounds() {
        for (name, meta) in get_function_metadata() {
            if let Some((lo, hi)) = meta.bounds {
                let n = meta.dimensions.first().copied().unwrap_or(3);
                assert!((meta.optimum)(n).iter().all(|&v| lo <= v && v <= hi), "{}", name);
            }
        }
    }

    #[test]
    fn test_bounds_lookup() {
        assert_eq!(get_function_bounds("ackley", 3), Some(vec![(-32.768, 32.768); 3]));
        assert_eq!(get_function_bounds("rosenbrock", 2), None);
        assert_eq!(get_function_bounds("nope", 2), None);
        assert_eq!(create_bounds(2, -1.0, 1.0), vec![(-1.0, 1.0), (-1.0, 1.0)]);
    }

    #[test]
    fn test_registry() {
        assert!(get_function("dropwave").is_some());
        assert_eq!(canonical_name("dropwave"), Some("drop_wave"));
        assert_eq!(get_function_bounds("dropwave", 2), Some(vec![(-5.12, 5.12); 2]));
        assert!(get_function("unknown").is_none());
        let names = list_functions();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "ackley");
        assert!(names.iter().all(|n| get_function(n).is_some()));
    }

    #[test]
    fn test_values_away_from_optimum() {
        let x = Array1::from_vec(vec![1.0, 2.0]);
        assert_eq!(sphere(&x), 5.0);
        assert_eq!(cigtab(&x), 1e4 + 4e-4 + 5.0);
        assert_eq!(rosenbrock(&Array1::from_vec(vec![0.0, 0.0])), 1.0);
        assert!(ackley(&x) > 0.0);
        assert!(rastrigin(&x) > 0.0);
        assert!(drop_wave(&x) > -1.0);
        assert!(easom(&x) > -1.0);
    }
}
