//! Shared runtime state for `acct-api`.
//!
//! Mirrors the teacher's `AppState` shape — one struct handed to every
//! handler via Axum's `State<Arc<AppState>>` extractor — generalized from
//! trading daemon state (integrity engine, SSE status bus) to the DB pool,
//! ERP client, workflow registry, and audit writer this service needs.

use std::sync::Arc;

use acct_erpx::ErpxClient;
use acct_workflows::WorkflowRegistry;
use sqlx::PgPool;
use tokio::sync::Mutex;

#[derive(Clone, Copy, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self { service: "acct-api", version: env!("CARGO_PKG_VERSION") }
    }
}

/// Handed to every handler wrapped in `Arc<AppState>`.
pub struct AppState {
    pub pool: PgPool,
    pub erpx: Arc<ErpxClient>,
    pub registry: Arc<WorkflowRegistry>,
    pub audit: Mutex<acct_audit::AuditWriter>,
    pub build: BuildInfo,
    /// `None` when `ACCT_AUTH_MODE=none`; `Some(key)` when `api_key` (§6).
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        erpx: Arc<ErpxClient>,
        registry: Arc<WorkflowRegistry>,
        audit: acct_audit::AuditWriter,
        api_key: Option<String>,
    ) -> Self {
        Self { pool, erpx, registry, audit: Mutex::new(audit), build: BuildInfo::default(), api_key }
    }
}

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START.get_or_init(std::time::Instant::now).elapsed().as_secs()
}
