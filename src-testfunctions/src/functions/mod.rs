//! Test function implementations organized by category
//!
//! - `unimodal`: a single optimum (bowl, ill-conditioned bowl, curved valley)
//! - `multimodal`: many local minima

pub mod multimodal;
pub mod unimodal;

pub use multimodal::*;
pub use unimodal::*;
