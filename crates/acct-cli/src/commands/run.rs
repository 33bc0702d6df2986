//! `acct-cli run ...` — create, dispatch, and inspect run rows from the
//! operator's terminal without going through the HTTP API (SPEC_FULL §4.7,
//! "the CLI and the HTTP API are two front ends over the same `acct-db` and
//! `acct-dispatcher` calls; neither has logic the other lacks").

use std::sync::Arc;

use acct_db::run::{self, RunFilter};
use acct_dispatcher::{dispatch, DispatcherConfig};
use acct_erpx::ErpxClient;
use acct_workflows::engine::WorkflowRegistry;
use anyhow::Result;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// `acct-cli run start`: insert a queued run row (idempotent on
/// `idempotency_key`) and print its id and status.
pub async fn start(pool: &PgPool, run_type: &str, trigger_type: &str, cursor_in: Value, idempotency_key: &str) -> Result<()> {
    let run_id = Uuid::new_v4();
    let (row, created) = run::create_or_get_run(pool, run_id, run_type, trigger_type, idempotency_key, cursor_in).await?;

    println!("run_id={}", row.run_id);
    println!("run_type={}", row.run_type);
    println!("status={}", row.status.as_str());
    println!("created={}", created);
    Ok(())
}

/// `acct-cli run dispatch`: invoke the dispatcher synchronously for one run
/// id, the same entry point the in-process worker pool calls.
pub async fn dispatch_one(pool: &PgPool, erpx: Arc<ErpxClient>, registry: &WorkflowRegistry, run_id: Uuid) -> Result<()> {
    let outcome = dispatch(pool, erpx, registry, run_id, &DispatcherConfig::default()).await?;
    println!("run_id={}", run_id);
    println!("outcome={:?}", outcome);
    Ok(())
}

/// `acct-cli run show`: print one run row.
pub async fn show(pool: &PgPool, run_id: Uuid) -> Result<()> {
    let row = run::fetch_run(pool, run_id).await?;
    println!("run_id={}", row.run_id);
    println!("run_type={}", row.run_type);
    println!("trigger_type={}", row.trigger_type);
    println!("status={}", row.status.as_str());
    println!("idempotency_key={}", row.idempotency_key);
    println!("started_at={:?}", row.started_at);
    println!("finished_at={:?}", row.finished_at);
    println!("cursor_out={}", row.cursor_out);
    println!("stats={}", row.stats);
    Ok(())
}

/// `acct-cli run list`: print matching run rows one per line.
pub async fn list(pool: &PgPool, run_type: Option<String>, status: Option<String>, limit: i64, offset: i64) -> Result<()> {
    let rows = run::list_runs(pool, &RunFilter { run_type, status, limit, offset }).await?;
    for row in &rows {
        println!("{}\t{}\t{}\t{}", row.run_id, row.run_type, row.status.as_str(), row.idempotency_key);
    }
    println!("count={}", rows.len());
    Ok(())
}
