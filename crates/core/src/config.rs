//! Bouncer timing options

use crate::timer::millis;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing options for a bouncer
///
/// Loadable from a `[bounce]` TOML table:
/// ```toml
/// throttle_wait_ms = 300
/// max_delay_ms = 3000
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BounceOptions {
    /// Sliding quiet window (default: 300ms)
    pub throttle_wait_ms: u64,
    /// Absolute per-chain deadline (default: none)
    pub max_delay_ms: Option<u64>,
}

impl Default for BounceOptions {
    fn default() -> Self {
        Self {
            throttle_wait_ms: 300,
            max_delay_ms: None,
        }
    }
}

impl BounceOptions {
    /// Create options with the given throttle window and no max delay
    pub fn new(throttle_wait: Duration) -> Self {
        Self {
            throttle_wait_ms: millis(throttle_wait),
            max_delay_ms: None,
        }
    }

    /// Set the max-delay deadline
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay_ms = Some(millis(max_delay));
        self
    }

    pub fn throttle_wait(&self) -> Duration {
        Duration::from_millis(self.throttle_wait_ms)
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay_ms.map(Duration::from_millis)
    }

    /// Check that both windows are non-zero
    pub fn validate(&self) -> Result<()> {
        validate_throttle_wait(self.throttle_wait())?;
        if let Some(max_delay) = self.max_delay() {
            validate_max_delay(max_delay)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_throttle_wait(wait: Duration) -> Result<()> {
    if wait.is_zero() {
        return Err(Error::InvalidConfig(
            "throttle wait must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_max_delay(max_delay: Duration) -> Result<()> {
    if max_delay.is_zero() {
        return Err(Error::InvalidConfig(
            "max delay must be greater than zero when set".to_string(),
        ));
    }
    Ok(())
}
