//! Run rows: idempotent creation, state transitions, and (behind
//! `runtime-claim`) the dispatcher's atomic claim query. Mirrors the
//! teacher's `insert_run`/`arm_run`/`begin_run`/`RunStatus` idiom generalized
//! to the queued→running→{success,failed,cancelled} lifecycle of SPEC_FULL §3.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(RunStatus::Queued),
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            other => Err(anyhow!("invalid run status: {other}")),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed | RunStatus::Cancelled)
    }
}

#[derive(Debug, Clone)]
pub struct RunRow {
    pub run_id: Uuid,
    pub run_type: String,
    pub trigger_type: String,
    pub status: RunStatus,
    pub idempotency_key: String,
    pub cursor_in: Value,
    pub cursor_out: Value,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stats: Value,
}

fn row_to_run(row: &sqlx::postgres::PgRow) -> Result<RunRow> {
    Ok(RunRow {
        run_id: row.try_get("run_id")?,
        run_type: row.try_get("run_type")?,
        trigger_type: row.try_get("trigger_type")?,
        status: RunStatus::parse(&row.try_get::<String, _>("status")?)?,
        idempotency_key: row.try_get("idempotency_key")?,
        cursor_in: row.try_get("cursor_in")?,
        cursor_out: row.try_get("cursor_out")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        stats: row.try_get("stats")?,
    })
}

/// Create a run row, or return the existing one if `idempotency_key` already
/// exists (§4.7, §8 property 1). Never raises on a duplicate key.
pub async fn create_or_get_run(
    pool: &PgPool,
    run_id: Uuid,
    run_type: &str,
    trigger_type: &str,
    idempotency_key: &str,
    cursor_in: Value,
) -> Result<(RunRow, bool)> {
    let inserted = sqlx::query(
        r#"
        insert into runs (run_id, run_type, trigger_type, status, idempotency_key, cursor_in)
        values ($1, $2, $3, 'queued', $4, $5)
        on conflict (idempotency_key) do nothing
        "#,
    )
    .bind(run_id)
    .bind(run_type)
    .bind(trigger_type)
    .bind(idempotency_key)
    .bind(&cursor_in)
    .execute(pool)
    .await
    .context("create_or_get_run insert failed")?
    .rows_affected()
        > 0;

    let row = fetch_by_idempotency_key(pool, idempotency_key)
        .await?
        .ok_or_else(|| anyhow!("run row vanished immediately after insert-or-fetch"))?;

    Ok((row, inserted))
}

pub async fn fetch_by_idempotency_key(pool: &PgPool, key: &str) -> Result<Option<RunRow>> {
    let row = sqlx::query("select * from runs where idempotency_key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("fetch_by_idempotency_key failed")?;
    row.as_ref().map(row_to_run).transpose()
}

pub async fn fetch_run(pool: &PgPool, run_id: Uuid) -> Result<RunRow> {
    let row = sqlx::query("select * from runs where run_id = $1")
        .bind(run_id)
        .fetch_one(pool)
        .await
        .context("fetch_run failed")?;
    row_to_run(&row)
}

/// queued → running. No-op (returns Ok) if already running so retried
/// dispatch attempts don't fail; invalid from a terminal state.
pub async fn begin_run(pool: &PgPool, run_id: Uuid) -> Result<()> {
    let run = fetch_run(pool, run_id).await?;
    match run.status {
        RunStatus::Queued | RunStatus::Running => {}
        other => return Err(anyhow!("cannot begin run in status {:?}", other)),
    }

    sqlx::query(
        r#"
        update runs set status = 'running',
               started_at = coalesce(started_at, now())
        where run_id = $1
        "#,
    )
    .bind(run_id)
    .execute(pool)
    .await
    .context("begin_run update failed")?;

    Ok(())
}

/// running → terminal (success/failed/cancelled). Persists `cursor_out` and
/// `stats`. Only the dispatcher calls this (§4.4: "only the dispatcher
/// transitions runs; workflows never write the run row's status").
pub async fn finish_run(
    pool: &PgPool,
    run_id: Uuid,
    status: RunStatus,
    cursor_out: Value,
    stats: Value,
) -> Result<()> {
    if !status.is_terminal() {
        return Err(anyhow!("finish_run requires a terminal status, got {:?}", status));
    }

    sqlx::query(
        r#"
        update runs set status = $2, cursor_out = $3, stats = $4, finished_at = now()
        where run_id = $1
        "#,
    )
    .bind(run_id)
    .bind(status.as_str())
    .bind(&cursor_out)
    .bind(&stats)
    .execute(pool)
    .await
    .context("finish_run update failed")?;

    Ok(())
}

/// Record another dispatch attempt in `stats.attempts` without transitioning
/// status, so the run stays visibly `running` while the dispatcher retries.
pub async fn record_attempt(pool: &PgPool, run_id: Uuid, attempt: u32, last_error: &str) -> Result<()> {
    sqlx::query(
        r#"
        update runs
           set stats = jsonb_set(jsonb_set(stats, '{attempts}', to_jsonb($2::int)),
                                  '{error}', to_jsonb($3::text))
         where run_id = $1
        "#,
    )
    .bind(run_id)
    .bind(attempt as i32)
    .bind(last_error)
    .execute(pool)
    .await
    .context("record_attempt update failed")?;

    Ok(())
}

pub struct RunFilter {
    pub run_type: Option<String>,
    pub status: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_runs(pool: &PgPool, f: &RunFilter) -> Result<Vec<RunRow>> {
    let rows = sqlx::query(
        r#"
        select * from runs
        where ($1::text is null or run_type = $1)
          and ($2::text is null or status = $2)
        order by created_at desc
        limit $3 offset $4
        "#,
    )
    .bind(&f.run_type)
    .bind(&f.status)
    .bind(f.limit)
    .bind(f.offset)
    .fetch_all(pool)
    .await
    .context("list_runs failed")?;

    rows.iter().map(row_to_run).collect()
}

/// §4.4 dispatcher entry point: atomically claim up to `limit` queued runs
/// via `FOR UPDATE SKIP LOCKED` so concurrent dispatcher workers never claim
/// the same row. Gated behind `runtime-claim` so only `acct-dispatcher` can
/// call it — the same single-dispatcher discipline as the teacher's
/// `outbox_claim_batch` behind `runtime-claim`.
#[cfg(feature = "runtime-claim")]
pub async fn claim_queued_runs(pool: &PgPool, limit: i64) -> Result<Vec<RunRow>> {
    let mut tx = pool.begin().await.context("claim_queued_runs begin tx failed")?;

    let rows = sqlx::query(
        r#"
        select * from runs
        where status = 'queued'
        order by created_at
        for update skip locked
        limit $1
        "#,
    )
    .bind(limit)
    .fetch_all(&mut *tx)
    .await
    .context("claim_queued_runs select failed")?;

    let claimed: Result<Vec<RunRow>> = rows.iter().map(row_to_run).collect();
    tx.commit().await.context("claim_queued_runs commit failed")?;
    claimed
}
