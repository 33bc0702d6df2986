//! Run dispatcher (SPEC_FULL §4.4): `dispatch(run_id) -> terminal_status`.
//!
//! Grounded on the teacher's `mqk-runtime` role as the sole crate allowed to
//! enable `acct-db`'s `runtime-claim` feature, and on `acct-db::run`'s
//! match-based invalid-transition-as-error idiom, generalized to
//! queued→running→{success,failed,cancelled}. Only this module calls
//! `acct_db::run::finish_run`/`begin_run` in production — "only the
//! dispatcher transitions runs; workflows never write the run row's status"
//! (§4.4, §7).

use std::sync::Arc;
use std::time::Duration;

use acct_db::run::{self, RunStatus};
use acct_erpx::ErpxClient;
use acct_workflows::engine::{WorkflowCtx, WorkflowOutcome, WorkflowRegistry};
use anyhow::{Context, Result};
use rand::Rng;
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

pub mod worker;

/// Retry/backoff knobs for a dispatch attempt loop (§4.4 "Retry policy").
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub max_attempts: u32,
    pub backoff_base_seconds: f64,
    pub backoff_max_seconds: f64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { max_attempts: 3, backoff_base_seconds: 1.0, backoff_max_seconds: 20.0 }
    }
}

impl DispatcherConfig {
    /// `min(max, base * 2^(attempt-1)) * uniform(0.5, 1.5)` — the same shape
    /// as the ERP client's backoff formula (§4.1), reused here for workflow
    /// retries rather than inventing a second formula.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.backoff_base_seconds * 2f64.powi(attempt as i32 - 1);
        let capped = exp.min(self.backoff_max_seconds);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_secs_f64((capped * jitter).max(0.0))
    }
}

/// Terminal result of one `dispatch` call (§4.4 "Public contract").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Run row was not in `{queued, running}`; nothing was done.
    NoOp { status: RunStatus },
    Success,
    Failed { reason: String },
}

/// Load the run row, resolve its workflow, invoke it with retry, and
/// transition the row to a terminal state (§4.4 steps 1–6).
///
/// Idempotent by construction: a run row already in a terminal state is a
/// no-op, and workflows are individually idempotent with respect to their
/// writes (§4.4 "Idempotency at dispatch"), so re-invoking `dispatch` for
/// the same `run_id` — e.g. after a crash mid-retry — is always safe.
pub async fn dispatch(
    pool: &PgPool,
    erpx: Arc<ErpxClient>,
    registry: &WorkflowRegistry,
    run_id: Uuid,
    cfg: &DispatcherConfig,
) -> Result<DispatchOutcome> {
    let row = run::fetch_run(pool, run_id).await.context("dispatch: fetch_run failed")?;

    if !matches!(row.status, RunStatus::Queued | RunStatus::Running) {
        return Ok(DispatchOutcome::NoOp { status: row.status });
    }

    run::begin_run(pool, run_id).await.context("dispatch: begin_run failed")?;

    let Some(workflow) = registry.resolve(&row.run_type) else {
        let reason = format!("no workflow registered for run_type '{}'", row.run_type);
        error!(run_id = %run_id, run_type = %row.run_type, "dispatch: unknown run_type");
        run::finish_run(pool, run_id, RunStatus::Failed, json!({}), json!({ "error": reason }))
            .await
            .context("dispatch: finish_run(failed) for unknown run_type")?;
        return Ok(DispatchOutcome::Failed { reason });
    };

    let ctx = WorkflowCtx { pool: pool.clone(), erpx, run_id, cursor_in: row.cursor_in.clone() };

    let mut last_error = String::new();
    for attempt in 1..=cfg.max_attempts {
        info!(run_id = %run_id, run_type = %row.run_type, attempt, "dispatching workflow");
        let outcome: WorkflowOutcome = workflow.run(&ctx).await;

        if !outcome.has_errors() {
            run::finish_run(pool, run_id, RunStatus::Success, outcome.cursor_out, outcome.stats)
                .await
                .context("dispatch: finish_run(success) failed")?;
            return Ok(DispatchOutcome::Success);
        }

        last_error = outcome.errors.join("; ");
        warn!(run_id = %run_id, attempt, error = %last_error, "workflow attempt failed");
        run::record_attempt(pool, run_id, attempt, &last_error)
            .await
            .context("dispatch: record_attempt failed")?;

        if attempt < cfg.max_attempts {
            tokio::time::sleep(cfg.backoff(attempt)).await;
        }
    }

    run::finish_run(
        pool,
        run_id,
        RunStatus::Failed,
        json!({}),
        json!({ "attempts": cfg.max_attempts, "error": last_error }),
    )
    .await
    .context("dispatch: finish_run(failed) after exhausted retries")?;

    Ok(DispatchOutcome::Failed { reason: last_error })
}
