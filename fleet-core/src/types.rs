//! Shared types, error enum, and the aircraft record for fleet-core.

use std::ops::Deref;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by fleet-core.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("aircraft identity must not be empty")]
    InvalidIdentity,
    #[error("config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FleetError>;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Wall-clock milliseconds since the UNIX epoch.
pub type Millis = u64;

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Aircraft record
// ---------------------------------------------------------------------------

/// Callsign used when a report carries none.
pub const UNKNOWN_CALLSIGN: &str = "N/A";

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Position {
            latitude,
            longitude,
        }
    }
}

/// Everything a merge may overwrite on a record (all fields except identity).
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftFields {
    pub callsign: String,
    pub position: Position,
    pub altitude: f64,
    pub ground_speed: f64,
    pub heading: f64,
}

/// One tracked aircraft in the live snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AircraftRecord {
    pub identity: String,
    pub callsign: String,
    pub position: Position,
    pub altitude: f64,
    pub ground_speed: f64,
    /// Compass degrees, always in [0, 360).
    pub heading: f64,
    pub last_seen: Millis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_position: Option<Position>,
}

impl AircraftRecord {
    pub fn new(identity: String, fields: AircraftFields, now: Millis) -> Self {
        AircraftRecord {
            identity,
            callsign: fields.callsign,
            position: fields.position,
            altitude: fields.altitude,
            ground_speed: fields.ground_speed,
            heading: crate::geo::normalize_degrees(fields.heading),
            last_seen: now,
            previous_position: None,
        }
    }

    /// Overwrite every mutable field, keeping the current position as the previous one.
    pub fn apply(&mut self, fields: AircraftFields, now: Millis) {
        self.previous_position = Some(self.position);
        self.callsign = fields.callsign;
        self.position = fields.position;
        self.altitude = fields.altitude;
        self.ground_speed = fields.ground_speed;
        self.heading = crate::geo::normalize_degrees(fields.heading);
        self.last_seen = now;
    }

    /// Milliseconds since the last accepted update; never negative.
    pub fn idle_for(&self, now: Millis) -> Millis {
        now.saturating_sub(self.last_seen)
    }

    pub fn is_stale(&self, now: Millis, idle_threshold: Millis) -> bool {
        self.idle_for(now) >= idle_threshold
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The whole fleet at one store version. Higher versions are newer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetSnapshot {
    pub version: u64,
    pub aircraft: Vec<AircraftRecord>,
}

impl FleetSnapshot {
    pub fn is_newer_than(&self, other: &FleetSnapshot) -> bool {
        self.version > other.version
    }
}

impl Deref for FleetSnapshot {
    type Target = [AircraftRecord];

    fn deref(&self) -> &[AircraftRecord] {
        &self.aircraft
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
