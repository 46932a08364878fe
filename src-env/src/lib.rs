//! Environment helpers for cmaopt
//!
//! Resolves where diagnostics artifacts (checkpoints, generation history)
//! are written when the caller does not name a directory.

pub mod constants;
pub mod env_utils;

pub use env_utils::{
    EnvError, check_cmaopt_env, get_cmaopt_dir, get_data_generated_dir, get_records_dir,
};
