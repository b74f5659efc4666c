//! Ingest reconciliation — raw report batches into fleet store merges.
//!
//! Reports arrive loosely structured: field names differ between receivers
//! (`hex`/`flight`, `lat`/`latitude`, `track`/`heading`, ...). Each field is
//! resolved from an ordered key list, once, in [`NormalizedReport::from_value`].
//! One bad entry is skipped and logged; it never aborts the batch. A batch
//! that is not an array at all is rejected outright.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::geo::{derived_heading, normalize_degrees};
use crate::store::FleetStore;
use crate::types::*;

// ---------------------------------------------------------------------------
// Field resolution policy
// ---------------------------------------------------------------------------

const HEX_KEYS: &[&str] = &["hex", "icao"];
const CALLSIGN_KEYS: &[&str] = &["flight", "flightId", "callsign"];
const LATITUDE_KEYS: &[&str] = &["lat", "latitude"];
const LONGITUDE_KEYS: &[&str] = &["lon", "longitude"];
const ALTITUDE_KEYS: &[&str] = &["altitude", "alt_baro", "alt_geom"];
const SPEED_KEYS: &[&str] = &["speed", "gs", "groundSpeed"];
const HEADING_KEYS: &[&str] = &["track", "heading"];

/// Why a single report was left out of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("report is not an object")]
    NotAnObject,
    #[error("no hex code or callsign")]
    MissingIdentity,
    #[error("missing latitude")]
    MissingLatitude,
    #[error("missing longitude")]
    MissingLongitude,
    #[error("missing altitude")]
    MissingAltitude,
}

/// Read-only view over one raw report object.
struct RawReport<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> RawReport<'a> {
    /// First key holding a non-blank string, trimmed.
    fn text(&self, keys: &[&str]) -> Option<&'a str> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k)?.as_str())
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// First key holding a finite number (or a numeric string). `null` is absent.
    fn number(&self, keys: &[&str]) -> Option<f64> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .find_map(as_number)
    }

    /// Like `number`, but readsb reports `alt_baro: "ground"` for taxiing aircraft.
    fn altitude(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().filter_map(|k| self.fields.get(*k)).find_map(|v| {
            match v.as_str() {
                Some(s) if s.trim().eq_ignore_ascii_case("ground") => Some(0.0),
                _ => as_number(v),
            }
        })
    }
}

fn as_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// A report after field resolution, ready to merge.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReport {
    pub identity: String,
    pub callsign: String,
    pub position: Position,
    pub altitude: f64,
    pub ground_speed: f64,
    /// `track`/`heading` as sent, if any.
    pub reported_heading: Option<f64>,
}

impl NormalizedReport {
    pub fn from_value(entry: &Value) -> std::result::Result<Self, SkipReason> {
        let raw = RawReport {
            fields: entry.as_object().ok_or(SkipReason::NotAnObject)?,
        };

        let hex = raw.text(HEX_KEYS).map(str::to_ascii_uppercase);
        let callsign = raw.text(CALLSIGN_KEYS).map(str::to_string);
        let identity = hex
            .or_else(|| callsign.clone())
            .ok_or(SkipReason::MissingIdentity)?;

        let latitude = raw.number(LATITUDE_KEYS).ok_or(SkipReason::MissingLatitude)?;
        let longitude = raw.number(LONGITUDE_KEYS).ok_or(SkipReason::MissingLongitude)?;
        let altitude = raw.altitude(ALTITUDE_KEYS).ok_or(SkipReason::MissingAltitude)?;

        Ok(NormalizedReport {
            identity,
            callsign: callsign.unwrap_or_else(|| UNKNOWN_CALLSIGN.to_string()),
            position: Position::new(latitude, longitude),
            altitude,
            ground_speed: raw.number(SPEED_KEYS).unwrap_or(0.0),
            reported_heading: raw.number(HEADING_KEYS),
        })
    }

    fn into_fields(self, heading: f64) -> AircraftFields {
        AircraftFields {
            callsign: self.callsign,
            position: self.position,
            altitude: self.altitude,
            ground_speed: self.ground_speed,
            heading,
        }
    }
}

// ---------------------------------------------------------------------------
// Heading policy
// ---------------------------------------------------------------------------

/// Which heading wins when both a reported and a derived one are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeadingPolicy {
    /// Bearing from the previous to the new position beats the reported track.
    #[default]
    PreferDerived,
    /// Reported track beats the derived bearing.
    PreferReported,
    /// Like `PreferDerived`, but an aircraft that has not moved keeps its
    /// reported track instead of the 0 bearing of two identical points.
    PreferDerivedWhenMoving,
}

impl FromStr for HeadingPolicy {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "derived" => Ok(HeadingPolicy::PreferDerived),
            "reported" => Ok(HeadingPolicy::PreferReported),
            "moving" => Ok(HeadingPolicy::PreferDerivedWhenMoving),
            other => Err(FleetError::Config(format!(
                "unknown heading policy '{other}' (expected 'derived', 'reported' or 'moving')"
            ))),
        }
    }
}

impl fmt::Display for HeadingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadingPolicy::PreferDerived => f.write_str("derived"),
            HeadingPolicy::PreferReported => f.write_str("reported"),
            HeadingPolicy::PreferDerivedWhenMoving => f.write_str("moving"),
        }
    }
}

/// Pick the heading for a merge. Always in [0, 360).
pub fn resolve_heading(
    policy: HeadingPolicy,
    previous: Option<&Position>,
    next: &Position,
    reported: Option<f64>,
) -> f64 {
    let derived = previous.and_then(|prev| match policy {
        HeadingPolicy::PreferDerivedWhenMoving if prev == next => None,
        _ => derived_heading(prev, next),
    });
    let hdg = match policy {
        HeadingPolicy::PreferDerived | HeadingPolicy::PreferDerivedWhenMoving => {
            derived.or(reported)
        }
        HeadingPolicy::PreferReported => reported.or(derived),
    };
    normalize_degrees(hdg.unwrap_or(0.0))
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Per-batch counts. Per-entry detail only goes to the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub applied: usize,
    pub skipped: usize,
}

impl ReconcileOutcome {
    /// True when at least one merge touched the store.
    pub fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// Applies raw report batches to a [`FleetStore`].
#[derive(Debug, Clone)]
pub struct Reconciler {
    store: Arc<FleetStore>,
    policy: HeadingPolicy,
}

impl Reconciler {
    pub fn new(store: Arc<FleetStore>) -> Self {
        Self::with_policy(store, HeadingPolicy::default())
    }

    pub fn with_policy(store: Arc<FleetStore>, policy: HeadingPolicy) -> Self {
        Reconciler { store, policy }
    }

    pub fn store(&self) -> &Arc<FleetStore> {
        &self.store
    }

    pub fn policy(&self) -> HeadingPolicy {
        self.policy
    }

    /// Reconcile one batch. Fails only if `batch` is not an array.
    pub fn reconcile(&self, batch: &Value, now: Millis) -> Result<ReconcileOutcome> {
        let entries = batch.as_array().ok_or_else(|| {
            FleetError::InvalidPayload("expected an array of aircraft reports".into())
        })?;

        let mut outcome = ReconcileOutcome::default();
        for (index, entry) in entries.iter().enumerate() {
            match self.apply(entry, now) {
                Ok(rec) => {
                    outcome.applied += 1;
                    tracing::debug!(
                        identity = %rec.identity,
                        latitude = rec.position.latitude,
                        longitude = rec.position.longitude,
                        heading = rec.heading,
                        "merged aircraft report"
                    );
                }
                Err(reason) => {
                    outcome.skipped += 1;
                    tracing::warn!(index, %reason, report = %entry, "skipping aircraft report");
                }
            }
        }

        if !entries.is_empty() {
            tracing::info!(
                applied = outcome.applied,
                skipped = outcome.skipped,
                "reconciled batch"
            );
        }
        Ok(outcome)
    }

    fn apply(&self, entry: &Value, now: Millis) -> std::result::Result<AircraftRecord, SkipReason> {
        let report = NormalizedReport::from_value(entry)?;
        let identity = report.identity.clone();
        let policy = self.policy;

        self.store
            .upsert_with(&identity, now, move |existing| {
                let heading = resolve_heading(
                    policy,
                    existing.map(|rec| &rec.position),
                    &report.position,
                    report.reported_heading,
                );
                report.into_fields(heading)
            })
            .map_err(|_| SkipReason::MissingIdentity)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
