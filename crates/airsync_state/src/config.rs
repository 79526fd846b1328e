//! Configuration for heartbeat/long-poll behavior.

use std::time::Duration;

/// Bounds for the negotiated heartbeat interval.
///
/// Client-requested intervals are clamped into `[min, max]` at the
/// setter; [`default`](HeartbeatConfig::default_interval) applies when
/// a device never negotiated one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Smallest interval a client may negotiate.
    pub min: Duration,
    /// Largest interval a client may negotiate.
    pub max: Duration,
    /// Interval used when the device never negotiated one.
    pub default: Duration,
}

impl HeartbeatConfig {
    /// Creates a heartbeat configuration.
    pub fn new(min: Duration, max: Duration, default: Duration) -> Self {
        Self { min, max, default }
    }

    /// Sets the minimum interval.
    pub fn with_min(mut self, min: Duration) -> Self {
        self.min = min;
        self
    }

    /// Sets the maximum interval.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// Clamps a requested interval into `[min, max]`.
    pub fn clamp(&self, requested: Duration) -> Duration {
        requested.clamp(self.min, self.max)
    }

    /// The interval for a device that never negotiated one.
    pub fn default_interval(&self) -> Duration {
        self.default
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(60),
            max: Duration::from_secs(2700),
            default: Duration::from_secs(480),
        }
    }
}
