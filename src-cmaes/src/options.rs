//! Advanced options and their resolution into engine settings
//!
//! Callers pass a loose name→value table ([`AdvancedOptions`]); it is
//! resolved exactly once per run into a typed [`CmaesSettings`], falling
//! back to the driver's own [`ConvergenceSettings`] for every budget the
//! caller leaves unset.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::debug;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::engine::{EngineInit, TerminationBudgets};
use crate::error::{CmaesError, Result};

/// Default initial step size, broadcast over all coordinates.
pub const DEFAULT_STEP_SIZE: f64 = 0.1;

/// Default number of resamples per candidate before clamping.
pub const DEFAULT_MAX_RESAMPLE_ATTEMPTS: usize = 1000;

/// Value of one advanced option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    List(Vec<f64>),
    Text(String),
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v as i64)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Real(v)
    }
}

impl From<Vec<f64>> for OptionValue {
    fn from(v: Vec<f64>) -> Self {
        OptionValue::List(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

impl FromStr for OptionValue {
    type Err = String;

    /// Parse command-line text: booleans, integers, reals, comma-separated
    /// real lists, anything else is kept as text.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let t = s.trim();
        if t.is_empty() {
            return Err("empty option value".to_string());
        }
        match t.to_lowercase().as_str() {
            "true" => return Ok(OptionValue::Bool(true)),
            "false" => return Ok(OptionValue::Bool(false)),
            _ => {}
        }
        if let Ok(i) = t.parse::<i64>() {
            return Ok(OptionValue::Int(i));
        }
        if let Ok(r) = t.parse::<f64>() {
            return Ok(OptionValue::Real(r));
        }
        if t.contains(',') {
            let parsed: std::result::Result<Vec<f64>, _> =
                t.split(',').map(|p| p.trim().parse::<f64>()).collect();
            if let Ok(list) = parsed {
                return Ok(OptionValue::List(list));
            }
        }
        Ok(OptionValue::Text(t.to_string()))
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Real(r) => write!(f, "{}", r),
            OptionValue::List(l) => {
                let parts: Vec<String> = l.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            OptionValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Name→value table of advanced options.
///
/// Setting a name twice replaces the earlier value; when two spellings of
/// the same option are present the one set last wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvancedOptions {
    entries: Vec<(String, OptionValue)>,
}

impl AdvancedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) -> &mut Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
        self
    }

    pub fn with(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<OptionValue> {
        let pos = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a JSON object such as `{"lambda": 12, "sigma": 0.3}`.
    ///
    /// Entries keep their order in the document, so a later alias wins.
    pub fn from_json_str(s: &str) -> std::result::Result<Self, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(s)?;
        let entries = map
            .into_iter()
            .map(|(k, v)| Ok((k, serde_json::from_value(v)?)))
            .collect::<std::result::Result<_, serde_json::Error>>()?;
        Ok(Self { entries })
    }

    pub fn from_json_file(path: &Path) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&content)?)
    }

    pub fn to_json_string(&self) -> std::result::Result<String, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(k, v)| Ok((k.clone(), serde_json::to_value(v)?)))
            .collect::<std::result::Result<_, serde_json::Error>>()?;
        serde_json::to_string_pretty(&map)
    }
}

/// Every option the resolver understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    PopulationSize,
    InitialStepSize,
    Seed,
    MaxIterations,
    MaxEvaluations,
    FunctionTolerance,
    MaxTimeFraction,
    Resume,
    MaxResampleAttempts,
}

impl FromStr for OptionKey {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let t: String = s.to_lowercase().chars().filter(|c| *c != '_' && *c != '-').collect();
        match t.as_str() {
            "populationsize" | "lambda" | "popsize" => Ok(OptionKey::PopulationSize),
            "initialstepsize" | "sigma" | "stepsize" => Ok(OptionKey::InitialStepSize),
            "seed" => Ok(OptionKey::Seed),
            "maxiterations" | "maxiter" | "stopmaxiter" => Ok(OptionKey::MaxIterations),
            "maxevaluations" | "maxeval" | "stopmaxfunevals" => Ok(OptionKey::MaxEvaluations),
            "functiontolerance" | "tolfun" | "stoptolfun" => Ok(OptionKey::FunctionTolerance),
            "maxtimefraction"
            | "maxtimefractionfordecomposition"
            | "maxtimefractionforeigendecomposition" => Ok(OptionKey::MaxTimeFraction),
            "resume" => Ok(OptionKey::Resume),
            "maxresampleattempts" => Ok(OptionKey::MaxResampleAttempts),
            _ => Err(format!("unknown option: {}", s)),
        }
    }
}

/// Budgets the driver applies when the caller sets none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceSettings {
    pub max_iterations: usize,
    pub function_tolerance: f64,
    pub max_evaluations: Option<usize>,
    pub max_time_fraction: f64,
}

impl Default for ConvergenceSettings {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            function_tolerance: 1e-12,
            max_evaluations: None,
            max_time_fraction: 1.0,
        }
    }
}

/// Fully resolved run settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CmaesSettings {
    pub population_size: usize,
    /// Initial standard deviation per coordinate
    pub step_sizes: Array1<f64>,
    pub seed: Option<u64>,
    pub max_iterations: usize,
    pub max_evaluations: Option<usize>,
    pub function_tolerance: f64,
    pub max_time_fraction: f64,
    pub resume: bool,
    pub max_resample_attempts: usize,
}

impl CmaesSettings {
    /// Settings with nothing overridden.
    pub fn defaults(n: usize, convergence: &ConvergenceSettings) -> Self {
        Self {
            population_size: default_population_size(n),
            step_sizes: Array1::from_elem(n, DEFAULT_STEP_SIZE),
            seed: None,
            max_iterations: convergence.max_iterations,
            max_evaluations: convergence.max_evaluations,
            function_tolerance: convergence.function_tolerance,
            max_time_fraction: convergence.max_time_fraction,
            resume: false,
            max_resample_attempts: DEFAULT_MAX_RESAMPLE_ATTEMPTS,
        }
    }

    pub fn budgets(&self) -> TerminationBudgets {
        TerminationBudgets {
            max_iterations: self.max_iterations,
            max_evaluations: self.max_evaluations,
            function_tolerance: self.function_tolerance,
            max_time_fraction: self.max_time_fraction,
        }
    }

    pub fn engine_init(&self, initial_mean: Array1<f64>) -> EngineInit {
        EngineInit {
            dimension: initial_mean.len(),
            initial_mean,
            initial_step_sizes: self.step_sizes.clone(),
            seed: self.seed,
            population_size: self.population_size,
            budgets: self.budgets(),
        }
    }
}

/// `4 + floor(3 ln n)`
pub fn default_population_size(n: usize) -> usize {
    4 + (3.0 * (n.max(1) as f64).ln()).floor() as usize
}

/// Resolve `options` for an `n`-dimensional problem.
///
/// Unknown names are skipped. Population size and step size fall back to
/// their defaults when not strictly positive; seeds and budgets must be
/// non-negative.
pub fn resolve_options(
    options: &AdvancedOptions,
    n: usize,
    convergence: &ConvergenceSettings,
) -> Result<CmaesSettings> {
    let mut settings = CmaesSettings::defaults(n, convergence);

    for (name, value) in options.iter() {
        let key = match name.parse::<OptionKey>() {
            Ok(key) => key,
            Err(_) => {
                debug!("ignoring unknown option '{}'", name);
                continue;
            }
        };
        match key {
            OptionKey::PopulationSize => {
                let v = as_int(name, value)?;
                if v == 1 {
                    let reason = "population size must be at least 2";
                    return Err(CmaesError::invalid_option(name, reason));
                }
                if v > 1 {
                    settings.population_size = v as usize;
                }
            }
            OptionKey::InitialStepSize => match value {
                OptionValue::List(list) => {
                    if list.len() != n {
                        return Err(CmaesError::invalid_option(
                            name,
                            format!("expected {} step sizes, got {}", n, list.len()),
                        ));
                    }
                    if let Some(bad) = list.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
                        return Err(CmaesError::invalid_option(
                            name,
                            format!("step sizes must be positive, got {}", bad),
                        ));
                    }
                    settings.step_sizes = Array1::from_vec(list.clone());
                }
                _ => {
                    let v = as_real(name, value)?;
                    if v > 0.0 {
                        settings.step_sizes = Array1::from_elem(n, v);
                    }
                }
            },
            OptionKey::Seed => {
                settings.seed = Some(as_non_negative_int(name, value)? as u64);
            }
            OptionKey::MaxIterations => {
                settings.max_iterations = as_non_negative_int(name, value)? as usize;
            }
            OptionKey::MaxEvaluations => {
                settings.max_evaluations = Some(as_non_negative_int(name, value)? as usize);
            }
            OptionKey::FunctionTolerance => {
                settings.function_tolerance = as_non_negative_real(name, value)?;
            }
            OptionKey::MaxTimeFraction => {
                settings.max_time_fraction = as_non_negative_real(name, value)?;
            }
            OptionKey::Resume => {
                settings.resume = as_bool(name, value)?;
            }
            OptionKey::MaxResampleAttempts => {
                let v = as_int(name, value)?;
                if v < 1 {
                    let reason = format!("must be at least 1, got {}", v);
                    return Err(CmaesError::invalid_option(name, reason));
                }
                settings.max_resample_attempts = v as usize;
            }
        }
    }

    Ok(settings)
}

fn expected(name: &str, what: &str, got: &dyn fmt::Display) -> CmaesError {
    CmaesError::invalid_option(name, format!("expected {}, got {}", what, got))
}

fn as_int(name: &str, value: &OptionValue) -> Result<i64> {
    match value {
        OptionValue::Int(i) => Ok(*i),
        OptionValue::Real(r) if r.is_finite() && r.fract() == 0.0 => Ok(*r as i64),
        OptionValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| expected(name, "an integer", &format!("'{}'", s))),
        other => Err(expected(name, "an integer", other)),
    }
}

fn as_non_negative_int(name: &str, value: &OptionValue) -> Result<i64> {
    let v = as_int(name, value)?;
    if v < 0 {
        return Err(CmaesError::invalid_option(name, format!("must be non-negative, got {}", v)));
    }
    Ok(v)
}

fn as_real(name: &str, value: &OptionValue) -> Result<f64> {
    let v = match value {
        OptionValue::Real(r) => *r,
        OptionValue::Int(i) => *i as f64,
        OptionValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| expected(name, "a number", &format!("'{}'", s)))?,
        other => {
            return Err(expected(name, "a number", other));
        }
    };
    if v.is_nan() {
        return Err(CmaesError::invalid_option(name, "must be a number, got NaN"));
    }
    Ok(v)
}

fn as_non_negative_real(name: &str, value: &OptionValue) -> Result<f64> {
    let v = as_real(name, value)?;
    if v < 0.0 {
        return Err(CmaesError::invalid_option(name, format!("must be non-negative, got {}", v)));
    }
    Ok(v)
}

fn as_bool(name: &str, value: &OptionValue) -> Result<bool> {
    match value {
        OptionValue::Bool(b) => Ok(*b),
        OptionValue::Int(0) => Ok(false),
        OptionValue::Int(1) => Ok(true),
        OptionValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(expected(name, "a boolean", &format!("'{}'", s))),
        },
        other => Err(expected(name, "a boolean", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(options: &AdvancedOptions, n: usize) -> Result<CmaesSettings> {
        resolve_options(options, n, &ConvergenceSettings::default())
    }

    #[test]
    fn test_defaults() {
        let s = resolve(&AdvancedOptions::new(), 5).unwrap();
        // 4 + floor(3 * ln 5) = 4 + floor(4.828) = 8
        assert_eq!(s.population_size, 8);
        assert_eq!(s.step_sizes, Array1::from_elem(5, 0.1));
        assert_eq!(s.seed, None);
        assert_eq!(s.max_iterations, 1000);
        assert_eq!(s.max_evaluations, None);
        assert_eq!(s.function_tolerance, 1e-12);
        assert!(!s.resume);
        assert_eq!(s.max_resample_attempts, DEFAULT_MAX_RESAMPLE_ATTEMPTS);

        assert_eq!(default_population_size(2), 6);
        assert_eq!(default_population_size(10), 10);
    }

    #[test]
    fn test_explicit_values_and_aliases() {
        let options = AdvancedOptions::new()
            .with("lambda", 12)
            .with("sigma", 0.5)
            .with("seed", 42)
            .with("stopMaxFunEvals", 5000)
            .with("maxTimeFractionForEigendecomposition", 0.2)
            .with("resume", true)
            .with("max_iterations", 200)
            .with("function_tolerance", 1e-8);
        let s = resolve(&options, 3).unwrap();
        assert_eq!(s.population_size, 12);
        assert_eq!(s.step_sizes, Array1::from_elem(3, 0.5));
        assert_eq!(s.seed, Some(42));
        assert_eq!(s.max_evaluations, Some(5000));
        assert_eq!(s.max_time_fraction, 0.2);
        assert!(s.resume);
        assert_eq!(s.max_iterations, 200);
        assert_eq!(s.function_tolerance, 1e-8);
    }

    #[test]
    fn test_non_positive_falls_back_to_default() {
        let options = AdvancedOptions::new().with("population_size", 0).with("sigma", 0.0);
        let s = resolve(&options, 4).unwrap();
        assert_eq!(s.population_size, default_population_size(4));
        assert_eq!(s.step_sizes, Array1::from_elem(4, DEFAULT_STEP_SIZE));

        let options = AdvancedOptions::new().with("lambda", -3).with("sigma", -1.0);
        let s = resolve(&options, 4).unwrap();
        assert_eq!(s.population_size, default_population_size(4));
        assert_eq!(s.step_sizes, Array1::from_elem(4, DEFAULT_STEP_SIZE));
    }

    #[test]
    fn test_invalid_values() {
        let err = resolve(&AdvancedOptions::new().with("seed", -1), 2).unwrap_err();
        assert!(matches!(err, CmaesError::InvalidOption { ref name, .. } if name == "seed"));

        assert!(resolve(&AdvancedOptions::new().with("max_evaluations", -10), 2).is_err());
        assert!(resolve(&AdvancedOptions::new().with("max_iterations", -1), 2).is_err());
        assert!(resolve(&AdvancedOptions::new().with("tolfun", -1e-3), 2).is_err());
        assert!(resolve(&AdvancedOptions::new().with("max_time_fraction", -0.5), 2).is_err());
        assert!(resolve(&AdvancedOptions::new().with("lambda", 1), 2).is_err());
        assert!(resolve(&AdvancedOptions::new().with("seed", 1.5), 2).is_err());
        assert!(resolve(&AdvancedOptions::new().with("resume", "maybe"), 2).is_err());
        assert!(resolve(&AdvancedOptions::new().with("max_resample_attempts", 0), 2).is_err());
    }

    #[test]
    fn test_per_dimension_step_sizes() {
        let options = AdvancedOptions::new().with("sigma", vec![0.1, 0.2, 0.3]);
        let s = resolve(&options, 3).unwrap();
        assert_eq!(s.step_sizes, Array1::from_vec(vec![0.1, 0.2, 0.3]));

        let wrong_len = AdvancedOptions::new().with("sigma", vec![0.1, 0.2]);
        assert!(resolve(&wrong_len, 3).is_err());

        let negative = AdvancedOptions::new().with("sigma", vec![0.1, -0.2, 0.3]);
        assert!(resolve(&negative, 3).is_err());
    }

    #[test]
    fn test_unknown_options_are_ignored() {
        let options = AdvancedOptions::new().with("no_such_option", 3).with("lambda", 9);
        let s = resolve(&options, 2).unwrap();
        assert_eq!(s.population_size, 9);
    }

    #[test]
    fn test_set_replaces_and_last_alias_wins() {
        let mut options = AdvancedOptions::new();
        options.set("lambda", 10).set("lambda", 14);
        assert_eq!(options.len(), 1);
        assert_eq!(options.get("lambda"), Some(&OptionValue::Int(14)));

        options.set("population_size", 20);
        assert_eq!(resolve(&options, 2).unwrap().population_size, 20);

        assert_eq!(options.remove("population_size"), Some(OptionValue::Int(20)));
        assert_eq!(resolve(&options, 2).unwrap().population_size, 14);
    }

    #[test]
    fn test_option_value_parsing() {
        assert_eq!("true".parse::<OptionValue>().unwrap(), OptionValue::Bool(true));
        assert_eq!("42".parse::<OptionValue>().unwrap(), OptionValue::Int(42));
        assert_eq!("-7".parse::<OptionValue>().unwrap(), OptionValue::Int(-7));
        assert_eq!("0.25".parse::<OptionValue>().unwrap(), OptionValue::Real(0.25));
        assert_eq!(
            "0.1, 0.2".parse::<OptionValue>().unwrap(),
            OptionValue::List(vec![0.1, 0.2])
        );
        assert_eq!("abc".parse::<OptionValue>().unwrap(), OptionValue::Text("abc".into()));
        assert!("".parse::<OptionValue>().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let options = AdvancedOptions::from_json_str(
            r#"{"lambda": 12, "sigma": [0.1, 0.2], "resume": false, "tolfun": 1e-9}"#,
        )
        .unwrap();
        assert_eq!(options.get("lambda"), Some(&OptionValue::Int(12)));
        assert_eq!(options.get("sigma"), Some(&OptionValue::List(vec![0.1, 0.2])));
        assert_eq!(options.get("resume"), Some(&OptionValue::Bool(false)));
        assert_eq!(options.get("tolfun"), Some(&OptionValue::Real(1e-9)));

        let text = options.to_json_string().unwrap();
        let back = AdvancedOptions::from_json_str(&text).unwrap();
        assert_eq!(back.get("lambda"), options.get("lambda"));
        assert_eq!(back.get("sigma"), options.get("sigma"));
    }

    #[test]
    fn test_json_alias_order_is_kept() {
        let later_lambda =
            AdvancedOptions::from_json_str(r#"{"population_size": 20, "lambda": 10}"#).unwrap();
        let names: Vec<&str> = later_lambda.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["population_size", "lambda"]);
        assert_eq!(resolve(&later_lambda, 3).unwrap().population_size, 10);

        let later_size =
            AdvancedOptions::from_json_str(r#"{"lambda": 10, "population_size": 20}"#).unwrap();
        assert_eq!(resolve(&later_size, 3).unwrap().population_size, 20);

        let text = later_lambda.to_json_string().unwrap();
        let back = AdvancedOptions::from_json_str(&text).unwrap();
        assert_eq!(back, later_lambda);
    }

    #[test]
    fn test_engine_init() {
        let options = AdvancedOptions::new().with("seed", 7).with("lambda", 10);
        let s = resolve(&options, 2).unwrap();
        let init = s.engine_init(Array1::from_vec(vec![1.0, 2.0]));
        assert_eq!(init.dimension, 2);
        assert_eq!(init.population_size, 10);
        assert_eq!(init.seed, Some(7));
        assert_eq!(init.budgets.max_iterations, 1000);
    }
}
