use ndarray::Array1;

/// Sphere function - simple quadratic bowl
/// Global minimum: f(x) = 0 at x = (0, 0, ..., 0)
/// Bounds: x_i in [-5.12, 5.12]
pub fn sphere(x: &Array1<f64>) -> f64 {
    x.iter().map(|&xi| xi * xi).sum()
}

/// Cigar-tablet function - badly scaled quadratic
/// f(x) = 1e4·x1² + 1e-4·x2² + Σ x_i²
/// Global minimum: f(x) = 0 at x = (0, 0, ..., 0)
/// Unbounded
pub fn cigtab(x: &Array1<f64>) -> f64 {
    let head = 1e4 * x[0] * x[0] + if x.len() > 1 { 1e-4 * x[1] * x[1] } else { 0.0 };
    head + sphere(x)
}

/// Rosenbrock function - curved valley
/// Global minimum: f(x) = 0 at x = (1, 1, ..., 1)
/// Unbounded (commonly searched in [-2.048, 2.048])
pub fn rosenbrock(x: &Array1<f64>) -> f64 {
    x.windows(2)
        .into_iter()
        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
        .sum()
}
