//! Two concurrent loops in one process (§4.5, §5): a cron loop firing
//! `schedules` entries and an object-store poller loop watching `pollers`
//! prefixes, both POSTing run requests through one shared [`AgentClient`].
//!
//! Grounded on `original_source/.../agent_scheduler/main.py`'s single
//! `while True: time.sleep(10)` loop, split here into two `tokio::spawn`ed
//! tasks per component design note 5 ("two concurrent loops in one
//! process") — cooperative shutdown replaces the Python `KeyboardInterrupt`
//! handling with a shared `watch::Receiver<bool>` flag every tick observes.

pub mod agent_client;
pub mod config;
pub mod cron_loop;
pub mod idempotency;
pub mod poller;

use std::time::Duration;

use aws_sdk_s3::Client as S3Client;
use chrono::Utc;
use tokio::sync::watch;
use tracing::info;

use agent_client::AgentClient;
use config::SchedulerConfig;

/// Poll cadence for the cron loop: coarser than the poller loop since cron
/// jobs fire on minute-or-coarser cadences in practice; still fine-grained
/// enough that the hash-truncated idempotency key collapses any double fire.
const CRON_TICK_INTERVAL: Duration = Duration::from_secs(5);
/// The poller loop's own sweep cadence; each individual poller's configured
/// `interval_seconds` gates whether that poller actually lists on a given
/// sweep.
const POLLER_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Run both loops until `shutdown` is signalled. Each loop finishes its
/// current iteration before observing the signal and returning (§4.5
/// "Scheduler stop is cooperative").
pub async fn run(cfg: SchedulerConfig, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let agent = AgentClient::new(&cfg.agent_base_url)?;

    let aws_cfg = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let s3 = S3Client::new(&aws_cfg);

    let mut jobs = cron_loop::build_jobs(&cfg.schedules, Utc::now())?;
    let mut pollers = poller::build_pollers(&cfg.pollers);

    info!(
        jobs = ?jobs.iter().map(|j| j.name.as_str()).collect::<Vec<_>>(),
        pollers = ?pollers.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        base_url = %cfg.agent_base_url,
        "scheduler_started"
    );

    let mut cron_shutdown = shutdown.clone();
    let agent_for_cron = agent;
    let cron_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CRON_TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cron_loop::tick(&agent_for_cron, &mut jobs, Utc::now()).await;
                }
                _ = cron_shutdown.changed() => {
                    if *cron_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let agent_for_poll = AgentClient::new(&cfg.agent_base_url)?;
    let poller_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(POLLER_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = std::time::Instant::now();
                    for state in pollers.iter_mut() {
                        if now < state.next_poll {
                            continue;
                        }
                        state.next_poll = now + Duration::from_secs(state.cfg.interval_seconds.max(1));
                        poller::poll_once(&s3, &agent_for_poll, state).await;
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let (cron_res, poller_res) = tokio::join!(cron_task, poller_task);
    cron_res?;
    poller_res?;
    Ok(())
}
