//! Centralized configuration for busproxy.
//!
//! Well-known bus names live in [`BusConfig`], default retry schedules in
//! [`RetryDefaults`]. [`RetryConfig`] is the per-handle, overridable form of
//! the defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Names defined by the D-Bus specification.
pub struct BusConfig;

impl BusConfig {
    // Property-access interface
    pub const PROPERTIES_INTERFACE: &'static str = "org.freedesktop.DBus.Properties";
    pub const PROPERTY_GET: &'static str = "Get";
    pub const PROPERTY_SET: &'static str = "Set";
    pub const PROPERTY_GET_ALL: &'static str = "GetAll";

    // Peer-liveness interface
    pub const PEER_INTERFACE: &'static str = "org.freedesktop.DBus.Peer";
    pub const PEER_OBJECT_PATH: &'static str = "/";
    pub const PEER_PING: &'static str = "Ping";

    /// Property read by the version probe.
    pub const VERSION_PROPERTY: &'static str = "version";
}

/// Default schedules of the retry procedures.
pub struct RetryDefaults;

impl RetryDefaults {
    // Service version probe
    pub const VERSION_PROBE_ATTEMPTS: u32 = 10;
    pub const VERSION_PROBE_STEP: Duration = Duration::from_secs(1);
    pub const VERSION_PROBE_MAX_DELAY: Duration = Duration::from_secs(10);

    // Peer liveness probe
    pub const PING_ATTEMPTS: u32 = 3;
    pub const PING_DELAY: Duration = Duration::from_secs(1);
    pub const PING_GRACE: Duration = Duration::from_micros(400);
}

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay every time.
    Fixed,
    /// `base * (attempt + 1)`
    Linear,
    /// `base * 2^attempt`
    Exponential,
}

/// Attempt and delay schedule of one retry procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySchedule {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff: Backoff::Exponential,
        }
    }
}

impl RetrySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule of the service version probe: 1s, 2s, 3s, ...
    pub fn version_probe() -> Self {
        Self::new()
            .with_max_attempts(RetryDefaults::VERSION_PROBE_ATTEMPTS)
            .with_base_delay(RetryDefaults::VERSION_PROBE_STEP)
            .with_max_delay(RetryDefaults::VERSION_PROBE_MAX_DELAY)
            .with_backoff(Backoff::Linear)
    }

    /// Schedule of the peer liveness probe: 1s between attempts.
    pub fn ping() -> Self {
        Self::new()
            .with_max_attempts(RetryDefaults::PING_ATTEMPTS)
            .with_base_delay(RetryDefaults::PING_DELAY)
            .with_max_delay(RetryDefaults::PING_DELAY)
            .with_backoff(Backoff::Fixed)
    }

    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Calculate the delay after a given failed attempt (0-indexed).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(attempt.saturating_add(1)),
            Backoff::Exponential => {
                let multiplier = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(multiplier)
            }
        };
        delay.min(self.max_delay)
    }
}

/// Retry schedules used by one proxy handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub version_probe: RetrySchedule,
    pub ping: RetrySchedule,
    /// Pause after a successful ping, letting the service settle.
    pub ping_grace: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            version_probe: RetrySchedule::version_probe(),
            ping: RetrySchedule::ping(),
            ping_grace: RetryDefaults::PING_GRACE,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version_probe(mut self, schedule: RetrySchedule) -> Self {
        self.version_probe = schedule;
        self
    }

    pub fn with_ping(mut self, schedule: RetrySchedule) -> Self {
        self.ping = schedule;
        self
    }

    pub fn with_ping_grace(mut self, grace: Duration) -> Self {
        self.ping_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_probe_delays_are_linear() {
        let schedule = RetrySchedule::version_probe();
        assert_eq!(schedule.max_attempts, 10);
        assert_eq!(schedule.calculate_delay(0), Duration::from_secs(1));
        assert_eq!(schedule.calculate_delay(1), Duration::from_secs(2));
        assert_eq!(schedule.calculate_delay(2), Duration::from_secs(3));
        assert_eq!(schedule.calculate_delay(8), Duration::from_secs(9));
    }

    #[test]
    fn test_ping_delays_are_fixed() {
        let schedule = RetrySchedule::ping();
        assert_eq!(schedule.max_attempts, 3);
        assert_eq!(schedule.calculate_delay(0), Duration::from_secs(1));
        assert_eq!(schedule.calculate_delay(5), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_delay_capped_at_max() {
        let schedule = RetrySchedule::new()
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5));

        assert_eq!(schedule.calculate_delay(0), Duration::from_secs(1));
        assert_eq!(schedule.calculate_delay(2), Duration::from_secs(4));
        assert_eq!(schedule.calculate_delay(3), Duration::from_secs(5));
        assert_eq!(schedule.calculate_delay(40), Duration::from_secs(5));
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.ping_grace, Duration::from_micros(400));
        assert_eq!(config.version_probe.backoff, Backoff::Linear);
        assert_eq!(config.ping.backoff, Backoff::Fixed);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = RetryConfig::new().with_ping(RetrySchedule::ping().with_max_attempts(5));
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RetryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.ping.max_attempts, 5);
    }
}
