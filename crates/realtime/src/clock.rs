//! # Clock
//!
//! Injectable time source. Scheduling math (arm a timer at `eta - lead`)
//! reads the clock through this trait so it can be tested without real
//! delays.

use std::fmt::Debug;

use chrono::{DateTime, Utc};

/// Time source abstraction used wherever scheduling or stamping logic
/// needs "now".
pub trait Clock: Send + Sync + Debug {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production wiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
