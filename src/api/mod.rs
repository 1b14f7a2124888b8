//! HTTP surface: health check plus the approval callback endpoint. Thin by
//! design — everything interesting happens in `ingest::Ingestor`.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::IngestError;
use crate::AppState;

/// Acknowledgement body returned to the webhook sender on success.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub code: i32,
    pub msg: String,
    pub timestamp: String,
}

impl Ack {
    pub fn received() -> Self {
        Self {
            code: 0,
            msg: "received".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/approval/callback", post(approval_callback))
        .with_state(state)
}

/// GET / — liveness probe.
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /approval/callback — one webhook event in, one ack out.
/// Failures map to HTTP 500 via `IngestError::into_response`; the sender
/// owns the retry policy.
async fn approval_callback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<Ack>, IngestError> {
    tracing::debug!(payload = %payload, "approval callback received");
    state.ingestor.handle_event(&payload).await?;
    Ok(Json(Ack::received()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_wire_shape() {
        let ack = Ack::received();
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["msg"], "received");
        assert!(json["timestamp"].as_str().is_some());
    }
}
