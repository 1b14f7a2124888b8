use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy for the ingestion pipeline.
///
/// Validation and auth-config failures need action from the caller or the
/// operator; everything else is retryable at whole-event granularity, which
/// is safe because persistence is upsert-based. Form-parse problems are
/// deliberately absent: they degrade to an empty field set instead of
/// failing the event (see `form::normalize`).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid event: {0}")]
    Validation(String),

    #[error("vendor credentials not configured: {0} is unset")]
    AuthConfig(&'static str),

    #[error("token exchange failed: {0}")]
    AuthProvider(String),

    #[error("vendor unreachable: {0}")]
    RemoteUnavailable(String),

    #[error("vendor returned HTTP {status}")]
    RemoteHttp { status: u16, body: String },

    #[error("vendor business error code={code}: {msg}")]
    RemoteBusiness { code: i64, msg: String },

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl IngestError {
    /// Short description safe to echo to the webhook sender. Raw vendor
    /// bodies and database detail stay in the logs only.
    pub fn public_message(&self) -> String {
        match self {
            IngestError::Validation(msg) => format!("invalid event: {msg}"),
            IngestError::AuthConfig(var) => format!("vendor credentials not configured ({var})"),
            IngestError::AuthProvider(_) => "vendor token exchange failed".to_string(),
            IngestError::RemoteUnavailable(_) => "vendor API unreachable".to_string(),
            IngestError::RemoteHttp { status, .. } => {
                format!("vendor API returned HTTP {status}")
            }
            IngestError::RemoteBusiness { code, .. } => {
                format!("vendor API business error (code {code})")
            }
            IngestError::Persistence(_) => "database error".to_string(),
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match &self {
            IngestError::Validation(msg) => {
                tracing::warn!("rejected callback: {msg}");
            }
            IngestError::AuthConfig(var) => {
                tracing::error!("vendor credentials not configured: {var} is unset");
            }
            IngestError::Persistence(e) => {
                tracing::error!("persistence failed: {e}");
            }
            other => {
                // Debug form keeps vendor status/code/body detail in the logs
                // without echoing it to the caller.
                tracing::warn!("ingestion failed: {other:?}");
            }
        }

        let body = Json(json!({
            "code": -1,
            "msg": "callback error",
            "error": self.public_message(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        // The webhook sender treats any non-200 as "retry later"; one status
        // keeps its retry logic trivial.
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
