//! Heartbeat state and the long-poll change monitor.

use crate::config::HeartbeatConfig;
use airsync_protocol::PingState;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

/// Per-device ping registrations and negotiated heartbeat intervals.
///
/// A device registers the collections it wants watched, then parks a
/// long-poll on a [`PingMonitor`]. The cache only remembers; the
/// monitor does the waiting.
#[derive(Debug, Default)]
pub struct PingStateCache {
    config: HeartbeatConfig,
    states: RwLock<HashMap<String, PingState>>,
    intervals: RwLock<HashMap<String, Duration>>,
}

impl PingStateCache {
    /// Creates a cache with the given heartbeat bounds.
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            states: RwLock::new(HashMap::new()),
            intervals: RwLock::new(HashMap::new()),
        }
    }

    /// Loads the device's ping state, creating an empty one watching
    /// nothing (with the default heartbeat as its lifetime budget) on
    /// first sight.
    pub fn init_ping_state(&self, device_id: &str) -> PingState {
        let mut states = self.states.write();
        states
            .entry(device_id.to_string())
            .or_insert_with(|| PingState::new(Vec::new(), self.config.default_interval()))
            .clone()
    }

    /// The collections the device is long-polling, empty if none.
    pub fn load_ping_collection_state(&self, device_id: &str) -> Vec<String> {
        let states = self.states.read();
        states
            .get(device_id)
            .map(|state| state.collections.clone())
            .unwrap_or_default()
    }

    /// Adds one collection to a device's watch list, creating the
    /// ping state if needed.
    pub fn watch(&self, device_id: &str, collection_id: &str) {
        let mut states = self.states.write();
        states
            .entry(device_id.to_string())
            .or_insert_with(|| PingState::new(Vec::new(), self.config.default_interval()))
            .watch(collection_id);
    }

    /// Sets a device's long-poll lifetime budget, clamped to the
    /// heartbeat bounds. Returns the effective value.
    pub fn set_lifetime(&self, device_id: &str, requested: Duration) -> Duration {
        let effective = self.config.clamp(requested);
        let mut states = self.states.write();
        states
            .entry(device_id.to_string())
            .or_insert_with(|| PingState::new(Vec::new(), self.config.default_interval()))
            .lifetime = effective;
        effective
    }

    /// Negotiates a heartbeat interval for a device.
    ///
    /// The request is clamped into the configured bounds; the effective
    /// interval is stored and returned so the response can tell the
    /// client what it actually got.
    pub fn set_heartbeat_interval(&self, device_id: &str, requested: Duration) -> Duration {
        let effective = self.config.clamp(requested);
        if effective != requested {
            debug!(
                "clamped heartbeat for {} from {:?} to {:?}",
                device_id, requested, effective
            );
        }
        let mut intervals = self.intervals.write();
        intervals.insert(device_id.to_string(), effective);
        effective
    }

    /// The device's negotiated interval, or the configured default.
    pub fn heartbeat_interval(&self, device_id: &str) -> Duration {
        let intervals = self.intervals.read();
        intervals
            .get(device_id)
            .copied()
            .unwrap_or_else(|| self.config.default_interval())
    }

    /// Forgets a device's ping registration. The negotiated heartbeat
    /// survives; it belongs to the device, not to one ping.
    pub fn reset_ping_state(&self, device_id: &str) {
        let mut states = self.states.write();
        states.remove(device_id);
    }
}

/// The result of one long-poll wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    /// At least one watched collection changed; resync these.
    Changed(Vec<String>),
    /// The heartbeat elapsed with nothing to report.
    TimedOut,
}

/// Wakes parked ping requests when collections change.
///
/// Writers call [`notify_change`](PingMonitor::notify_change) with the
/// collection that changed; each parked [`wait`](PingMonitor::wait)
/// wakes, drains the changes it watches, and either reports them or
/// parks again until its deadline.
#[derive(Debug, Default)]
pub struct PingMonitor {
    notify: Notify,
    changed: Mutex<HashSet<String>>,
}

impl PingMonitor {
    /// Creates a monitor with no pending changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a change to a collection and wakes every parked wait.
    pub fn notify_change(&self, collection_id: &str) {
        {
            let mut changed = self.changed.lock();
            changed.insert(collection_id.to_string());
        }
        self.notify.notify_waiters();
    }

    /// Parks until a watched collection changes or `heartbeat` elapses.
    ///
    /// Changes recorded before the call are observed too; the wakeup
    /// registration is armed before the changed set is inspected, so a
    /// change landing between the check and the park is never lost.
    pub async fn wait(&self, watched: &[String], heartbeat: Duration) -> PingOutcome {
        let deadline = Instant::now() + heartbeat;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let hits = self.take_watched(watched);
            if !hits.is_empty() {
                return PingOutcome::Changed(hits);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return PingOutcome::TimedOut;
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return PingOutcome::TimedOut;
            }
        }
    }

    fn take_watched(&self, watched: &[String]) -> Vec<String> {
        let mut changed = self.changed.lock();
        let mut hits: Vec<String> = watched
            .iter()
            .filter(|id| changed.contains(*id))
            .cloned()
            .collect();
        for id in &hits {
            changed.remove(id);
        }
        hits.sort();
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cache() -> PingStateCache {
        PingStateCache::new(HeartbeatConfig::default())
    }

    #[test]
    fn init_creates_once_and_loads_after() {
        let cache = cache();
        let state = cache.init_ping_state("dev");
        assert!(state.collections.is_empty());
        assert_eq!(state.lifetime, Duration::from_secs(480));

        cache.watch("dev", "INBOX");
        let state = cache.init_ping_state("dev");
        assert!(state.is_watching("INBOX"));
    }

    #[test]
    fn watch_accumulates_collections() {
        let cache = cache();
        cache.watch("dev", "INBOX");
        cache.watch("dev", "@Calendar@");
        cache.watch("dev", "@Calendar@");

        assert_eq!(
            cache.load_ping_collection_state("dev"),
            vec!["INBOX".to_string(), "@Calendar@".to_string()]
        );
        assert!(cache.load_ping_collection_state("other").is_empty());
    }

    #[test]
    fn lifetime_is_clamped_at_the_setter() {
        let cache = cache();
        assert_eq!(
            cache.set_lifetime("dev", Duration::from_secs(9000)),
            Duration::from_secs(2700)
        );
        assert_eq!(cache.init_ping_state("dev").lifetime, Duration::from_secs(2700));
    }

    #[test]
    fn heartbeat_negotiation_clamps_and_sticks() {
        let cache = cache();
        assert_eq!(cache.heartbeat_interval("dev"), Duration::from_secs(480));

        let effective = cache.set_heartbeat_interval("dev", Duration::from_secs(5));
        assert_eq!(effective, Duration::from_secs(60));
        assert_eq!(cache.heartbeat_interval("dev"), Duration::from_secs(60));
    }

    #[test]
    fn reset_keeps_negotiated_heartbeat() {
        let cache = cache();
        cache.watch("dev", "INBOX");
        cache.set_heartbeat_interval("dev", Duration::from_secs(120));
        cache.reset_ping_state("dev");

        assert!(cache.load_ping_collection_state("dev").is_empty());
        assert_eq!(cache.heartbeat_interval("dev"), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_quietly() {
        let monitor = PingMonitor::new();
        let outcome = monitor
            .wait(&["INBOX".into()], Duration::from_secs(30))
            .await;
        assert_eq!(outcome, PingOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn change_before_wait_is_observed() {
        let monitor = PingMonitor::new();
        monitor.notify_change("INBOX");
        let outcome = monitor
            .wait(&["INBOX".into()], Duration::from_secs(30))
            .await;
        assert_eq!(outcome, PingOutcome::Changed(vec!["INBOX".into()]));
    }

    #[tokio::test(start_paused = true)]
    async fn change_during_wait_wakes_the_poll() {
        let monitor = Arc::new(PingMonitor::new());
        let waiter = {
            let monitor = monitor.clone();
            tokio::spawn(async move {
                monitor
                    .wait(&["INBOX".into()], Duration::from_secs(600))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        monitor.notify_change("INBOX");

        assert_eq!(
            waiter.await.unwrap(),
            PingOutcome::Changed(vec!["INBOX".into()])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unwatched_changes_do_not_wake() {
        let monitor = Arc::new(PingMonitor::new());
        let waiter = {
            let monitor = monitor.clone();
            tokio::spawn(async move {
                monitor
                    .wait(&["INBOX".into()], Duration::from_secs(30))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        monitor.notify_change("@Calendar@");

        assert_eq!(waiter.await.unwrap(), PingOutcome::TimedOut);

        // The unwatched change stays queued for whoever watches it.
        let outcome = monitor
            .wait(&["@Calendar@".into()], Duration::from_secs(30))
            .await;
        assert_eq!(outcome, PingOutcome::Changed(vec!["@Calendar@".into()]));
    }
}
