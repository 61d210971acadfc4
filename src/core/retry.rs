use std::time::Duration;

use crate::error::{Error, Result};
use crate::settings::Settings;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_DELAY_SECS: u64 = 10;
const DEFAULT_MAX_DELAY_SECS: u64 = 60;

/// Budget for rate-limited requests.
///
/// `max_attempts` counts every send of the same request, including the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub default_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_delay: Duration::from_secs(DEFAULT_DELAY_SECS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Read `<prefix>.max_attempts`, `<prefix>.default_delay_secs` and
    /// `<prefix>.max_delay_secs`, keeping defaults for unset keys.
    pub fn from_settings(settings: &Settings, prefix: &str) -> Result<Self> {
        let defaults = Self::default();

        let max_attempts = match settings.get_u64(&format!("{}.max_attempts", prefix))? {
            Some(0) => {
                return Err(Error::config_invalid_value(
                    format!("{}.max_attempts", prefix),
                    Some("0".to_string()),
                    "At least one attempt is required",
                ))
            }
            Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
            None => defaults.max_attempts,
        };

        let default_delay = settings
            .get_u64(&format!("{}.default_delay_secs", prefix))?
            .map(Duration::from_secs)
            .unwrap_or(defaults.default_delay);

        let max_delay = settings
            .get_u64(&format!("{}.max_delay_secs", prefix))?
            .map(Duration::from_secs)
            .unwrap_or(defaults.max_delay);

        Ok(Self {
            max_attempts,
            default_delay,
            max_delay: max_delay.max(default_delay),
        })
    }

    /// Delay before re-sending after the `attempt`-th rate-limited response.
    ///
    /// An explicit `Retry-After` wins; otherwise the default delay doubles per
    /// attempt. Both are capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        let delay = match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => {
                let exponent = attempt.saturating_sub(1).min(16);
                self.default_delay.saturating_mul(1u32 << exponent)
            }
        };
        delay.min(self.max_delay)
    }

    pub fn allows_another_attempt(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.max_attempts
    }
}
