//! The live fleet snapshot: one record per aircraft identity.
//!
//! A single keyed map behind a coarse mutex. Every operation copies data in
//! or out; callers never see the map itself. Update cadence is seconds-scale,
//! so contention is not a concern, but no merge may be lost or split.
//!
//! Every mutation bumps a version counter inside the same critical section,
//! so a versioned snapshot can be ordered against any other.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::*;

#[derive(Debug, Default)]
struct Fleet {
    records: HashMap<String, AircraftRecord>,
    version: u64,
}

impl Fleet {
    fn sorted(&self) -> Vec<AircraftRecord> {
        let mut records: Vec<AircraftRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        records
    }
}

/// Owner of the live fleet snapshot.
#[derive(Debug, Default)]
pub struct FleetStore {
    fleet: Mutex<Fleet>,
}

impl FleetStore {
    pub fn new() -> Self {
        FleetStore::default()
    }

    // Poisoning is recovered: every write leaves the map consistent.
    fn lock(&self) -> MutexGuard<'_, Fleet> {
        self.fleet.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or update the record for `identity`. Returns a copy of the result.
    ///
    /// On update the existing position becomes `previous_position` and
    /// `last_seen` is set to `now`, whatever order callers present timestamps in.
    pub fn merge(&self, identity: &str, fields: AircraftFields, now: Millis) -> Result<AircraftRecord> {
        self.upsert_with(identity, now, |_| fields)
    }

    /// Read-then-merge in one critical section.
    ///
    /// `build` sees the current record for `identity` (if any) and returns the
    /// fields to merge. No other merge or expire can run in between.
    pub fn upsert_with<F>(&self, identity: &str, now: Millis, build: F) -> Result<AircraftRecord>
    where
        F: FnOnce(Option<&AircraftRecord>) -> AircraftFields,
    {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(FleetError::InvalidIdentity);
        }

        let mut fleet = self.lock();
        let fields = build(fleet.records.get(identity));

        let record = match fleet.records.get_mut(identity) {
            Some(existing) => {
                existing.apply(fields, now);
                existing.clone()
            }
            None => {
                let rec = AircraftRecord::new(identity.to_string(), fields, now);
                fleet.records.insert(identity.to_string(), rec.clone());
                rec
            }
        };
        fleet.version += 1;
        Ok(record)
    }

    /// Point-in-time copy of every record, most recently seen first.
    pub fn snapshot(&self) -> Vec<AircraftRecord> {
        self.lock().sorted()
    }

    /// Like [`snapshot`](Self::snapshot), tagged with the version it was taken at.
    pub fn versioned_snapshot(&self) -> FleetSnapshot {
        let fleet = self.lock();
        FleetSnapshot {
            version: fleet.version,
            aircraft: fleet.sorted(),
        }
    }

    /// Number of mutations applied so far.
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Remove every record idle for at least `idle_threshold` ms. Returns count removed.
    pub fn expire(&self, now: Millis, idle_threshold: Millis) -> usize {
        let mut fleet = self.lock();
        let before = fleet.records.len();
        fleet.records.retain(|_, rec| !rec.is_stale(now, idle_threshold));
        let removed = before - fleet.records.len();
        if removed > 0 {
            fleet.version += 1;
        }
        removed
    }

    /// Copy of a single record.
    pub fn get(&self, identity: &str) -> Option<AircraftRecord> {
        self.lock().records.get(identity.trim()).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
