//! Ingest API — receivers POST batches of aircraft reports here.
//!
//! The reconciler merges the batch into the fleet store; if anything was
//! merged, a versioned snapshot is published once, after the store lock is
//! gone. A concurrent ingest that published a newer version wins.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use fleet_core::{now_millis, FleetError, Millis, ReconcileOutcome};

use crate::web::AppState;

/// Reconcile `batch` and publish on change.
pub fn ingest_batch(
    state: &AppState,
    batch: &Value,
    now: Millis,
) -> Result<ReconcileOutcome, FleetError> {
    let outcome = state.reconciler.reconcile(batch, now)?;
    if outcome.changed() {
        state.gateway.publish(state.store().versioned_snapshot());
    }
    Ok(outcome)
}

/// POST /api/aircraft — batch ingest from a receiver.
pub async fn api_ingest_aircraft(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    match ingest_batch(&state, &body, now_millis()) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "message": "Aircraft data updated successfully",
                "applied": outcome.applied,
                "skipped": outcome.skipped,
            })),
        ),
        Err(FleetError::InvalidPayload(reason)) => {
            tracing::warn!(%reason, "rejected ingest batch");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid data format. Expected an array of aircraft objects."
                })),
            )
        }
        Err(e) => {
            tracing::error!("ingest failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::web::{build_router, test_state};

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/aircraft")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_api_ingest_batch() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = app
            .oneshot(post(
                r#"[{"hex":"a1b2c3","flight":"UAL1 ","lat":44.0,"lon":-91.0,"altitude":31000,"track":270},
                    {"hex":"d4e5f6","lat":44.0,"lon":-91.0}]"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["applied"], 1);
        assert_eq!(json["skipped"], 1);

        let rec = state.store().get("A1B2C3").unwrap();
        assert_eq!(rec.callsign, "UAL1");
        assert_eq!(rec.heading, 270.0);
    }

    #[tokio::test]
    async fn test_api_ingest_rejects_non_array() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = app
            .oneshot(post(r#"{"hex":"a1b2c3","lat":44.0,"lon":-91.0,"altitude":1}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("array"));
        assert!(state.store().is_empty());
    }

    #[tokio::test]
    async fn test_api_ingest_empty_batch() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = app.oneshot(post("[]")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["applied"], 0);
        assert_eq!(json["skipped"], 0);
    }

    #[test]
    fn test_ingest_publishes_only_on_change() {
        let state = test_state();
        let mut sub = state.gateway.connect(state.store());
        sub.try_recv().unwrap();

        ingest_batch(&state, &json!([]), 1_000).unwrap();
        ingest_batch(&state, &json!([{"hex": "ABC123"}]), 1_000).unwrap();
        assert!(sub.try_recv().is_none());

        let batch = json!([{"hex": "ABC123", "lat": 44.0, "lon": -91.0, "altitude": 1000}]);
        ingest_batch(&state, &batch, 1_000).unwrap();
        assert_eq!(sub.try_recv().unwrap().len(), 1);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_ingest_structural_error_publishes_nothing() {
        let state = test_state();
        let mut sub = state.gateway.connect(state.store());
        sub.try_recv().unwrap();

        assert!(ingest_batch(&state, &json!({"not": "an array"}), 0).is_err());
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_concurrent_ingests_leave_viewer_on_final_fleet() {
        let state = test_state();
        let mut sub = state.gateway.connect(state.store());
        sub.try_recv().unwrap();

        std::thread::scope(|s| {
            for i in 0..8 {
                let state = state.clone();
                s.spawn(move || {
                    let batch = json!([{"hex": format!("AC{i:04}"), "lat": 44.0, "lon": -91.0, "altitude": 1000}]);
                    ingest_batch(&state, &batch, 1_000).unwrap();
                });
            }
        });

        let mut last = None;
        while let Some(snap) = sub.try_recv() {
            last = Some(snap);
        }
        let last = last.expect("at least one publish");
        assert_eq!(last.aircraft, state.store().snapshot());
        assert_eq!(last.len(), 8);
    }
}
