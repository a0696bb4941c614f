//! Timer host abstraction
//!
//! The bouncer never sleeps or spawns on its own. It asks a [`TimerHost`]
//! to run a task after a delay and to cancel it again. Hosts:
//! - [`TokioTimer`](crate::TokioTimer): tokio runtime timers
//! - [`ManualTimer`](crate::ManualTimer): simulated clock for tests and replay

use std::fmt;
use std::time::{Duration, Instant};

/// Handle to a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Work run when a timer fires
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling primitives supplied by the host
pub trait TimerHost: Send + Sync {
    /// Current time on the host clock
    fn now(&self) -> Instant;

    /// Run `task` once, `delay` from now
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId;

    /// Cancel a scheduled task
    ///
    /// Unknown or already-fired ids are ignored.
    fn cancel(&self, id: TimerId);
}

/// Whole milliseconds, saturating, for log fields
pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
