//! Worker-pool claim loop (§4.4 "Claiming", §5 "Parallel workers consume
//! dispatcher tasks from a queue"). Polls `acct_db::run::claim_queued_runs`
//! (gated behind `runtime-claim`, enabled only by this crate) and fans
//! claimed rows out to `dispatch` under a bounded concurrency semaphore.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acct_db::run::claim_queued_runs;
use acct_erpx::ErpxClient;
use acct_workflows::engine::WorkflowRegistry;
use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::{dispatch, DispatcherConfig};

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub concurrency: usize,
    pub claim_batch_size: i64,
    pub poll_interval: Duration,
    pub dispatch: DispatcherConfig,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            claim_batch_size: 8,
            poll_interval: Duration::from_millis(500),
            dispatch: DispatcherConfig::default(),
        }
    }
}

/// Cooperative stop flag (§5 "Scheduler and dispatcher respond to
/// process-termination signals cooperatively"). Shared with a
/// `tokio::signal` handler by the binary that owns the pool.
#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs until `shutdown.is_stopping()`, claiming up to `claim_batch_size`
/// queued runs per poll and dispatching each on its own task, bounded by a
/// semaphore of size `concurrency` (§5: "Each dispatch runs on its own
/// worker with an independent DB transaction and an ERP client instance
/// (safe to share if stateless; the rate limiter is process-wide)").
pub async fn run_claim_loop(
    pool: PgPool,
    erpx: Arc<ErpxClient>,
    registry: Arc<WorkflowRegistry>,
    cfg: WorkerPoolConfig,
    shutdown: ShutdownFlag,
) -> Result<()> {
    let permits = Arc::new(Semaphore::new(cfg.concurrency));

    while !shutdown.is_stopping() {
        let claimed = claim_queued_runs(&pool, cfg.claim_batch_size)
            .await
            .context("claim loop: claim_queued_runs failed")?;

        if claimed.is_empty() {
            tokio::time::sleep(cfg.poll_interval).await;
            continue;
        }

        for row in claimed {
            let pool = pool.clone();
            let erpx = Arc::clone(&erpx);
            let registry = Arc::clone(&registry);
            let dispatch_cfg = cfg.dispatch.clone();
            let permits = Arc::clone(&permits);

            let permit = permits.clone().acquire_owned().await.expect("semaphore never closed");
            tokio::spawn(async move {
                let _permit = permit;
                info!(run_id = %row.run_id, run_type = %row.run_type, "worker claimed run");
                match dispatch(&pool, erpx, &registry, row.run_id, &dispatch_cfg).await {
                    Ok(outcome) => info!(run_id = %row.run_id, outcome = ?outcome, "worker dispatch finished"),
                    Err(e) => error!(run_id = %row.run_id, error = %e, "worker dispatch errored"),
                }
            });
        }
    }

    info!("claim loop observed shutdown; finishing in-flight dispatches");
    // Draining: acquiring every permit blocks until all in-flight dispatches
    // release theirs, matching §4.5's "finish current iteration, then exit".
    let _ = permits.acquire_many(cfg.concurrency as u32).await;
    Ok(())
}
