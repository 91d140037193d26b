//! # Geo
//!
//! Pure geospatial arithmetic: great-circle distance, initial bearing and
//! ETA estimation with traffic adjustment. No state, safe to call from any
//! task without locking.

mod calc;
mod traffic;

pub use crate::calc::*;
pub use crate::traffic::*;
