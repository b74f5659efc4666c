//! Broadcast gateway: fans fleet snapshots out to connected viewers.
//!
//! The gateway holds only the latest published snapshot in a `watch` channel,
//! so a slow viewer never queues stale state: whenever it reads, it reads the
//! newest fleet. Snapshots carry the store version they were taken at and a
//! publish never replaces a newer snapshot with an older one, whatever order
//! concurrent publishers arrive in.

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use fleet_core::{FleetSnapshot, FleetStore};

/// A published fleet snapshot, shared between all subscribers.
pub type Snapshot = Arc<FleetSnapshot>;

/// Latest-snapshot fan-out to every connected viewer.
#[derive(Clone)]
pub struct Gateway {
    latest: Arc<watch::Sender<Snapshot>>,
}

impl Default for Gateway {
    fn default() -> Self {
        Gateway::new()
    }
}

impl Gateway {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(FleetSnapshot::default()));
        Gateway {
            latest: Arc::new(tx),
        }
    }

    /// Register a subscriber. Its first snapshot is the current fleet, and
    /// nobody else is notified.
    pub fn connect(&self, store: &FleetStore) -> Subscription {
        // Subscribe before reading the store: any publish from here on is
        // either older than the initial snapshot or seen by `recv`.
        let rx = self.latest.subscribe();
        let initial = Arc::new(store.versioned_snapshot());
        let id = Uuid::new_v4();

        tracing::info!(subscriber = %id, aircraft = initial.len(), "subscriber connected");
        Subscription {
            id,
            seen: initial.version,
            initial: Some(initial),
            rx,
        }
    }

    /// Make `snapshot` the latest for every subscriber, unless a newer one was
    /// already published. Returns whether it was accepted.
    pub fn publish(&self, snapshot: FleetSnapshot) -> bool {
        let version = snapshot.version;
        let aircraft = snapshot.len();
        let accepted = self.latest.send_if_modified(|current| {
            if snapshot.is_newer_than(current) {
                *current = Arc::new(snapshot);
                true
            } else {
                false
            }
        });

        if accepted {
            tracing::debug!(
                version,
                aircraft,
                subscribers = self.subscriber_count(),
                "published snapshot"
            );
        } else {
            tracing::debug!(version, "superseded snapshot dropped");
        }
        accepted
    }

    pub fn subscriber_count(&self) -> usize {
        self.latest.receiver_count()
    }
}

/// One connected viewer. Dropping it unregisters the viewer.
pub struct Subscription {
    id: Uuid,
    initial: Option<Snapshot>,
    seen: u64,
    rx: watch::Receiver<Snapshot>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn take_if_newer(&mut self) -> Option<Snapshot> {
        let latest = self.rx.borrow_and_update().clone();
        if latest.version > self.seen {
            self.seen = latest.version;
            Some(latest)
        } else {
            None
        }
    }

    /// Wait for the next snapshot newer than the last one handed out.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            self.rx.changed().await.ok()?;
            if let Some(snapshot) = self.take_if_newer() {
                return Some(snapshot);
            }
        }
    }

    /// Newer snapshot, if one is waiting.
    pub fn try_recv(&mut self) -> Option<Snapshot> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        match self.rx.has_changed() {
            Ok(true) => self.take_if_newer(),
            _ => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        tracing::info!(subscriber = %self.id, "subscriber disconnected");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
