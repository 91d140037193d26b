//! # Notifier
//!
//! Keyed, cancelable one-shot notification timers plus synchronous delay
//! alerts. At most one timer is outstanding per key; scheduling again under
//! the same key atomically replaces the previous timer. Alerting is
//! best-effort by design and never a precondition for live tracking.

mod key;
mod notification;
mod scheduler;

pub use crate::key::*;
pub use crate::notification::*;
pub use crate::scheduler::*;
