//! Approval callback ingestion service.
//!
//! Receives approval webhook events, re-fetches the authoritative instance
//! from the vendor API, normalizes the form payload, and upserts a
//! four-table relational snapshot.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod form;
pub mod ingest;
pub mod models;
pub mod store;
pub mod vendor;

use std::sync::Arc;

use ingest::Ingestor;
use store::postgres::PgStore;
use vendor::client::ApprovalClient;
use vendor::token::TokenCache;

/// Shared application state passed to handlers.
pub struct AppState {
    pub ingestor: Ingestor,
}

/// Wire the pipeline from config + store: token cache → vendor client →
/// orchestrator.
pub fn build_ingestor(cfg: &config::Config, store: PgStore) -> Ingestor {
    let tokens = Arc::new(TokenCache::new(
        &cfg.lark_base_url,
        cfg.app_id.clone(),
        cfg.app_secret.clone(),
    ));
    let client = ApprovalClient::new(&cfg.lark_base_url, tokens);
    Ingestor::new(client, store)
}
