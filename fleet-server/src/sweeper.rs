//! Staleness sweeper — evicts aircraft that stopped reporting.
//!
//! Runs on a fixed interval until aborted at shutdown. A tick that shrinks
//! the fleet publishes the new snapshot; a tick that removes nothing stays
//! silent. A failing tick is logged and the next one runs on schedule.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use fleet_core::config::FleetConfig;
use fleet_core::{now_millis, FleetStore, Millis};

use crate::broadcast::Gateway;

/// Timing parameters for the sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Idle time after which an aircraft is evicted.
    pub idle_threshold: Millis,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        SweeperConfig::from(&FleetConfig::default())
    }
}

impl From<&FleetConfig> for SweeperConfig {
    fn from(fleet: &FleetConfig) -> Self {
        SweeperConfig {
            interval: fleet.sweep_interval(),
            idle_threshold: fleet.idle_threshold_ms,
        }
    }
}

/// Periodic eviction of idle aircraft.
pub struct Sweeper {
    store: Arc<FleetStore>,
    gateway: Gateway,
    config: SweeperConfig,
}

impl Sweeper {
    pub fn new(store: Arc<FleetStore>, gateway: Gateway, config: SweeperConfig) -> Self {
        Sweeper {
            store,
            gateway,
            config,
        }
    }

    /// Spawn the sweep loop. Abort the handle to stop it.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        tracing::debug!(
            interval_ms = self.config.interval.as_millis() as u64,
            idle_threshold_ms = self.config.idle_threshold,
            "sweeper started"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        // First tick completes immediately; nothing can be idle yet
        interval.tick().await;

        loop {
            interval.tick().await;
            let now = now_millis();
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| self.tick(now))) {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                tracing::error!(%reason, "sweep tick failed");
            }
        }
    }

    /// One sweep pass at time `now`. Returns how many aircraft were evicted.
    pub fn tick(&self, now: Millis) -> usize {
        let removed = self.store.expire(now, self.config.idle_threshold);
        if removed > 0 {
            // Store lock is released; snapshot and fan-out happen outside it
            let snapshot = self.store.versioned_snapshot();
            tracing::info!(removed, remaining = snapshot.len(), "evicted idle aircraft");
            self.gateway.publish(snapshot);
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{AircraftFields, Position};

    const IDLE: Millis = 15_000;

    fn merge(store: &FleetStore, id: &str, now: Millis) {
        let fields = AircraftFields {
            callsign: "N/A".into(),
            position: Position::new(44.0, -91.0),
            altitude: 1000.0,
            ground_speed: 0.0,
            heading: 0.0,
        };
        store.merge(id, fields, now).unwrap();
    }

    fn sweeper(store: &Arc<FleetStore>, gateway: &Gateway) -> Sweeper {
        let config = SweeperConfig {
            interval: Duration::from_millis(15_000),
            idle_threshold: IDLE,
        };
        Sweeper::new(store.clone(), gateway.clone(), config)
    }

    #[test]
    fn test_default_config() {
        let config = SweeperConfig::default();
        assert_eq!(config.interval, Duration::from_secs(15));
        assert_eq!(config.idle_threshold, 15_000);
    }

    #[test]
    fn test_tick_without_eviction_does_not_publish() {
        let store = Arc::new(FleetStore::new());
        let gateway = Gateway::new();
        merge(&store, "ABC123", 1_000);

        let mut sub = gateway.connect(&store);
        sub.try_recv().unwrap();

        assert_eq!(sweeper(&store, &gateway).tick(1_000 + IDLE - 1), 0);
        assert!(sub.try_recv().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_tick_with_eviction_publishes() {
        let store = Arc::new(FleetStore::new());
        let gateway = Gateway::new();
        merge(&store, "OLD", 1_000);
        merge(&store, "NEW", 10_000);

        let mut sub = gateway.connect(&store);
        sub.try_recv().unwrap();

        assert_eq!(sweeper(&store, &gateway).tick(1_000 + IDLE + 1), 1);

        let snap = sub.try_recv().expect("publish after eviction");
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].identity, "NEW");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_loop_evicts_and_publishes() {
        let store = Arc::new(FleetStore::new());
        let gateway = Gateway::new();
        merge(&store, "ABC123", now_millis());

        let mut sub = gateway.connect(&store);
        assert_eq!(sub.recv().await.unwrap().len(), 1);

        let config = SweeperConfig {
            interval: Duration::from_millis(20),
            idle_threshold: 10,
        };
        let handle = Sweeper::new(store.clone(), gateway.clone(), config).start();

        let snap = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("sweeper should publish")
            .unwrap();
        assert!(snap.is_empty());
        assert!(store.is_empty());

        handle.abort();
    }
}
