//! Shared setup for HTTP-level scenario tests: a real DB pool, a registry,
//! and a state builder so each test only picks the one knob it cares about
//! (`api_key`).

use std::sync::Arc;

use acct_api::state::AppState;
use acct_erpx::{ErpxClient, ErpxSettings};
use sqlx::PgPool;

pub async fn db_pool() -> anyhow::Result<PgPool> {
    acct_db::testkit_db_pool().await
}

pub async fn build_state(pool: PgPool, api_key: Option<String>) -> Arc<AppState> {
    let erpx = Arc::new(ErpxClient::new(ErpxSettings { base_url: "http://127.0.0.1:0".to_string(), ..Default::default() }).expect("erpx client"));
    let registry = Arc::new(acct_workflows::build_registry());
    let audit = acct_audit::AuditWriter::connect(pool.clone()).await.expect("audit writer");
    Arc::new(AppState::new(pool, erpx, registry, audit, api_key))
}
