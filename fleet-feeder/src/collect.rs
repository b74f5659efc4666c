//! Receiver-side collector.
//!
//! Polls a dump1090-style `data.json` endpoint, keeps aircraft that have a
//! position, reshapes them into the ingest format and POSTs the batch to a
//! fleet server. Transient failures are logged and retried on the next cycle.

use std::future::Future;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

/// Timeout for each source fetch and target POST.
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source returned no aircraft list")]
    NoAircraftList,
}

// ---------------------------------------------------------------------------
// Reshaping
// ---------------------------------------------------------------------------

/// Aircraft entries from a source document: either a bare array or an object
/// with an `aircraft` array (dump1090-fa / readsb `aircraft.json`).
pub fn extract_aircraft(doc: &Value) -> Option<&Vec<Value>> {
    match doc {
        Value::Array(list) => Some(list),
        Value::Object(obj) => obj.get("aircraft").and_then(Value::as_array),
        _ => None,
    }
}

fn first<'a>(entry: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| entry.get(*k))
        .find(|v| !v.is_null())
}

/// Reshape one source entry; `None` when it has no usable position.
pub fn format_entry(entry: &Value) -> Option<Value> {
    let obj = entry.as_object()?;
    let lat = obj.get("lat").and_then(Value::as_f64)?;
    let lon = obj.get("lon").and_then(Value::as_f64)?;

    let mut out = Map::new();
    if let Some(hex) = obj.get("hex").and_then(Value::as_str) {
        out.insert("hex".into(), Value::from(hex.trim()));
    }
    if let Some(flight) = obj.get("flight").and_then(Value::as_str) {
        out.insert("flight".into(), Value::from(flight.trim()));
    }
    out.insert("latitude".into(), Value::from(lat));
    out.insert("longitude".into(), Value::from(lon));
    out.insert(
        "altitude".into(),
        first(obj, &["alt_baro", "altitude", "alt_geom"])
            .cloned()
            .unwrap_or(Value::from(0)),
    );
    out.insert(
        "speed".into(),
        first(obj, &["gs", "speed"])
            .cloned()
            .unwrap_or(Value::from(0)),
    );
    if let Some(track) = first(obj, &["track", "heading"]) {
        out.insert("track".into(), track.clone());
    }
    Some(Value::Object(out))
}

/// Reshape a whole source list, dropping entries without a position.
pub fn format_batch(entries: &[Value]) -> Vec<Value> {
    entries.iter().filter_map(format_entry).collect()
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FeederConfig {
    /// dump1090 JSON URL.
    pub source: String,
    /// Fleet server ingest URL.
    pub target: String,
    /// Time between polls.
    pub interval: Duration,
    /// Fetch attempts per poll.
    pub retries: u32,
    /// Pause between failed fetch attempts.
    pub retry_delay: Duration,
}

pub struct Collector {
    http: reqwest::Client,
    config: FeederConfig,
}

impl Collector {
    pub fn new(config: FeederConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Collector { http, config })
    }

    /// One fetch of the source list.
    pub async fn fetch(&self) -> Result<Vec<Value>, FeedError> {
        let doc: Value = self
            .http
            .get(&self.config.source)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        extract_aircraft(&doc)
            .cloned()
            .ok_or(FeedError::NoAircraftList)
    }

    /// Fetch with retries; an exhausted poll yields an empty list.
    pub async fn fetch_with_retries(&self) -> Vec<Value> {
        let attempts = self.config.retries.max(1);
        for attempt in 1..=attempts {
            match self.fetch().await {
                Ok(list) => {
                    tracing::debug!(count = list.len(), attempt, "fetched source aircraft");
                    return list;
                }
                Err(e) => {
                    tracing::warn!(attempt, attempts, "fetch failed: {e}");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }
        tracing::error!(source = %self.config.source, "giving up on this poll");
        Vec::new()
    }

    /// POST one batch to the fleet server.
    pub async fn send(&self, batch: &[Value]) -> Result<(), FeedError> {
        self.http
            .post(&self.config.target)
            .json(batch)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Fetch, reshape and forward one batch. Returns the number sent.
    pub async fn poll_once(&self) -> usize {
        let batch = format_batch(&self.fetch_with_retries().await);
        if batch.is_empty() {
            tracing::info!("no positioned aircraft to send");
            return 0;
        }

        match self.send(&batch).await {
            Ok(()) => {
                tracing::info!(count = batch.len(), "sent aircraft batch");
                batch.len()
            }
            Err(e) => {
                tracing::error!("failed to send batch: {e}");
                0
            }
        }
    }

    /// Poll on the configured interval until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = &mut shutdown => {
                    tracing::info!("feeder stopping");
                    break;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
