//! Ingestion orchestrator: validate → fetch → normalize → persist.
//!
//! Each event is one synchronous unit of work. Any step failure
//! short-circuits the rest — a failed fetch never leaves a partial instance
//! in the store. Retry is owned by the webhook sender; nothing here retries.

use serde_json::Value;
use tracing::info;

use crate::errors::IngestError;
use crate::form;
use crate::models::instance::InstanceSnapshot;
use crate::store::postgres::PgStore;
use crate::vendor::client::ApprovalClient;

pub struct Ingestor {
    client: ApprovalClient,
    store: PgStore,
}

impl Ingestor {
    pub fn new(client: ApprovalClient, store: PgStore) -> Self {
        Self { client, store }
    }

    /// Entry point for a webhook callback payload. Only `instance_code` is
    /// read from the event itself; the authoritative record is re-fetched.
    pub async fn handle_event(&self, payload: &Value) -> Result<(), IngestError> {
        let instance_code = payload
            .get("instance_code")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .ok_or_else(|| IngestError::Validation("missing instance_code".to_string()))?;

        self.process_instance_code(instance_code).await
    }

    /// Run the pipeline for one instance code. Also used by the backfill CLI
    /// to re-pull instances whose callbacks were missed.
    pub async fn process_instance_code(&self, instance_code: &str) -> Result<(), IngestError> {
        let fetched = self.client.fetch_instance(instance_code).await?;
        let fields = form::normalize(fetched.instance.form.as_ref());
        let snapshot = InstanceSnapshot::build(instance_code, fetched.raw, &fetched.instance, fields);

        self.store.persist(&snapshot).await?;

        info!(
            instance_code,
            status = snapshot.instance.status.as_ref().map(|s| s.as_str()).unwrap_or("-"),
            tasks = snapshot.tasks.len(),
            fields = snapshot.fields.len(),
            "approval instance persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Ingestor tests that exercise the network live in tests/ingest.rs with
    // wiremock; here we only cover payload validation, which must fail
    // before any collaborator is touched.

    fn ingestor_without_backends() -> Ingestor {
        let tokens = std::sync::Arc::new(crate::vendor::token::TokenCache::new(
            "http://127.0.0.1:9",
            Some("app".into()),
            Some("secret".into()),
        ));
        let client = ApprovalClient::new("http://127.0.0.1:9", tokens);
        let store = PgStore::connect_lazy("postgres://localhost/unused").unwrap();
        Ingestor::new(client, store)
    }

    #[tokio::test]
    async fn test_missing_instance_code_is_validation_error() {
        let ingestor = ingestor_without_backends();
        let err = ingestor
            .handle_event(&json!({"approval_code": "A1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_instance_code_is_validation_error() {
        let ingestor = ingestor_without_backends();
        for payload in [json!({"instance_code": ""}), json!({"instance_code": "   "})] {
            let err = ingestor.handle_event(&payload).await.unwrap_err();
            assert!(matches!(err, IngestError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_non_string_instance_code_is_validation_error() {
        let ingestor = ingestor_without_backends();
        let err = ingestor
            .handle_event(&json!({"instance_code": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }
}
