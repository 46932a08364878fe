use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::driver::GenerationInfo;

/// Records optimization progress via driver callbacks
#[derive(Debug, Clone)]
pub struct OptimizationRecorder {
    /// Run name (used for the CSV filename)
    name: String,
    /// Shared records storage
    records: Arc<Mutex<Vec<GenerationRecord>>>,
}

/// One generation of a run
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub generation: usize,
    /// Objective evaluations so far
    pub evaluations: usize,
    /// Overall step size after the update
    pub sigma: f64,
    /// Best fitness within this generation
    pub generation_best: f64,
    /// Best fitness over all generations so far
    pub best_f: f64,
    /// Point reaching `best_f`
    pub best_x: Vec<f64>,
    /// Whether this generation improved the best-ever fitness
    pub is_improvement: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl OptimizationRecorder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), records: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a callback that appends one record per generation
    pub fn create_callback(&self) -> Box<dyn FnMut(&GenerationInfo) + Send> {
        let records = self.records.clone();
        Box::new(move |info: &GenerationInfo| {
            let mut guard = lock(&records);
            let is_improvement = match guard.last() {
                Some(prev) => info.best_f < prev.best_f,
                None => info.best_f.is_finite(),
            };
            guard.push(GenerationRecord {
                generation: info.generation,
                evaluations: info.evaluations,
                sigma: info.sigma,
                generation_best: info.generation_best_f,
                best_f: info.best_f,
                best_x: info.best_x.to_vec(),
                is_improvement,
            });
        })
    }

    /// Write all records to `<dir>/<name>.csv`, creating `dir` if needed
    pub fn save_to_csv(&self, dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
        create_dir_all(dir)?;
        let path = dir.join(format!("{}.csv", self.name));
        let mut writer = csv::Writer::from_path(&path)?;

        let records = lock(&self.records);
        let n = records.first().map_or(0, |r| r.best_x.len());

        let mut header: Vec<String> =
            ["generation", "evaluations", "sigma", "generation_best", "best_f", "is_improvement"]
                .iter()
                .map(|s| s.to_string())
                .collect();
        header.extend((0..n).map(|i| format!("x{}", i)));
        writer.write_record(&header)?;

        for r in records.iter() {
            let mut row = vec![
                r.generation.to_string(),
                r.evaluations.to_string(),
                format!("{:.16e}", r.sigma),
                format!("{:.16e}", r.generation_best),
                format!("{:.16e}", r.best_f),
                r.is_improvement.to_string(),
            ];
            row.extend(r.best_x.iter().map(|v| format!("{:.16e}", v)));
            writer.write_record(&row)?;
        }
        writer.flush()?;

        Ok(path)
    }

    /// Copy of all records
    pub fn records(&self) -> Vec<GenerationRecord> {
        lock(&self.records).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.records).clear();
    }

    /// Best-ever point and fitness of the last recorded generation
    pub fn best_solution(&self) -> Option<(Vec<f64>, f64)> {
        lock(&self.records).last().map(|r| (r.best_x.clone(), r.best_f))
    }
}
