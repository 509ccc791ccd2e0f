use std::time::Duration;

use crate::config::ClientSettings;

/// Exponential backoff between connection attempts.
///
/// `max_retries: None` retries forever, which is what lets a client created
/// once keep working across broker restarts. An attempt running past
/// `connect_timeout` counts as a failure and is backed off like any other.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: Option<u32>,
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            max_retries: None,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.reconnect_initial_ms),
            max_delay: Duration::from_millis(settings.reconnect_max_ms),
            max_retries: settings.reconnect_max_retries,
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), or `None` once the
    /// policy has given up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if self.max_retries.is_some_and(|max| attempt >= max) {
            return None;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64()).max(0.0);
        Some(Duration::from_secs_f64(capped))
    }
}

/// Attempt counter over a `ReconnectPolicy`. Reset after each successful connect.
#[derive(Debug)]
pub(crate) struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.policy.delay_for(self.attempt)?;
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        self.policy.connect_timeout
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }
}
