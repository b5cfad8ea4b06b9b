//! Refresh timer and clock abstractions

use chrono::{DateTime, Utc};
use std::time::Duration;

/// One-shot timer that drives the periodic refresh
///
/// Arming is fire-and-forget: when the delay elapses the implementation
/// delivers a timer trigger to the scheduler. Arming again replaces any
/// shot that is still pending, so at most one refresh is ever queued.
pub trait RefreshTimer: Send + Sync {
    /// Schedule the next refresh `after` from now
    fn arm(&self, after: Duration);
}

/// Source of the current time for the debounce gate
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
