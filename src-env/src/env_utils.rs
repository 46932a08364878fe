//! Environment variable utilities for cmaopt
//!
//! `CMAOPT_DIR` points to the project root; generated data lives below it
//! in `data_generated/`.

use crate::constants::{CMAOPT_DIR, DATA_GENERATED, RECORDS};
use std::env;
use std::path::PathBuf;

/// Error type for environment variable issues
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("CMAOPT_DIR is not set; export CMAOPT_DIR=/path/to/cmaopt (the project root)")]
    CmaoptDirNotSet,

    #[error("CMAOPT_DIR points to a non-existent directory: {0}")]
    CmaoptDirNotFound(PathBuf),

    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, EnvError> {
    if !path.exists() {
        std::fs::create_dir_all(&path)
            .map_err(|source| EnvError::DirectoryCreationFailed { path: path.clone(), source })?;
    }
    Ok(path)
}

/// Get the CMAOPT_DIR environment variable and validate it exists
///
/// # Errors
///
/// Returns an error if CMAOPT_DIR is not set or points to a non-existent
/// directory.
///
/// # Example
///
/// ```no_run
/// use cmaopt_env::env_utils::get_cmaopt_dir;
///
/// let root = get_cmaopt_dir()?;
/// println!("cmaopt directory: {}", root.display());
/// # Ok::<(), cmaopt_env::env_utils::EnvError>(())
/// ```
pub fn get_cmaopt_dir() -> Result<PathBuf, EnvError> {
    let root = env::var(CMAOPT_DIR).map_err(|_| EnvError::CmaoptDirNotSet)?;
    let path = PathBuf::from(root);

    if !path.exists() {
        return Err(EnvError::CmaoptDirNotFound(path));
    }

    Ok(path)
}

/// Get the path to the data_generated directory, creating it if necessary
pub fn get_data_generated_dir() -> Result<PathBuf, EnvError> {
    ensure_dir(get_cmaopt_dir()?.join(DATA_GENERATED))
}

/// Get the path to data_generated/records, creating it if necessary
///
/// Default location for checkpoint and generation-history files.
pub fn get_records_dir() -> Result<PathBuf, EnvError> {
    ensure_dir(get_data_generated_dir()?.join(RECORDS))
}

/// Check that CMAOPT_DIR is usable and return a short summary
///
/// # Example
///
/// ```no_run
/// use cmaopt_env::env_utils::check_cmaopt_env;
///
/// match check_cmaopt_env() {
///     Ok(summary) => println!("{}", summary),
///     Err(e) => {
///         eprintln!("Environment setup error: {}", e);
///         std::process::exit(1);
///     }
/// }
/// ```
pub fn check_cmaopt_env() -> Result<String, EnvError> {
    let root = get_cmaopt_dir()?;
    let records = get_records_dir()?;
    Ok(format!("CMAOPT_DIR: {}\nRecords directory: {}", root.display(), records.display()))
}
