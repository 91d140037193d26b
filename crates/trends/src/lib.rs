//! # Trends
//!
//! Historical trend analysis: turns a bounded window of past trip records
//! into weighted-average durations, delay probabilities, reliability and
//! confidence scores. Prediction is a lightweight statistical estimator,
//! not a trained model; with no history it degrades to a clearly tagged
//! low-confidence fallback rather than an error.

mod analyzer;
mod factors;
mod predict;
mod provider;
mod record;
mod stats;

pub use crate::analyzer::*;
pub use crate::factors::*;
pub use crate::predict::*;
pub use crate::provider::*;
pub use crate::record::*;
pub use crate::stats::*;
