//! Cron loop (§4.5 "Cron loop"): fires `schedules` entries on their cron
//! expression, materializes a payload from the configured template, derives
//! an idempotency key that collapses duplicate fires within the same month,
//! and POSTs a run.
//!
//! Grounded on `original_source/.../agent_scheduler/main.py`'s `CronJob`,
//! `_cron_next` (there backed by `croniter`; here by the `cron` crate's
//! `Schedule::upcoming`), and `_materialize_payload`.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc};
use cron::Schedule;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::agent_client::AgentClient;
use crate::config::ScheduleConfig;
use crate::idempotency::make_idempotency_key;

pub struct CronJob {
    pub name: String,
    pub schedule: Schedule,
    pub run_type: String,
    pub payload_template: Map<String, Value>,
    pub next_fire: DateTime<Utc>,
}

impl CronJob {
    pub fn new(name: String, cfg: &ScheduleConfig, now: DateTime<Utc>) -> anyhow::Result<Self> {
        let schedule = Schedule::from_str(&cfg.cron)
            .with_context_cron(&name, &cfg.cron)?;
        let next_fire = schedule
            .after(&now)
            .next()
            .ok_or_else(|| anyhow::anyhow!("cron expression '{}' for job '{name}' has no future occurrence", cfg.cron))?;
        Ok(Self {
            name,
            schedule,
            run_type: cfg.run_type.clone(),
            payload_template: cfg.payload.clone(),
            next_fire,
        })
    }

    fn advance(&mut self, now: DateTime<Utc>) {
        if let Some(next) = self.schedule.after(&now).next() {
            self.next_fire = next;
        }
    }
}

trait CronResultExt<T> {
    fn with_context_cron(self, job: &str, expr: &str) -> anyhow::Result<T>;
}

impl<T> CronResultExt<T> for Result<T, cron::error::Error> {
    fn with_context_cron(self, job: &str, expr: &str) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("invalid cron expression '{expr}' for job '{job}': {e}"))
    }
}

/// Build the configured, enabled cron jobs, each scheduled for its first
/// occurrence after `now`.
pub fn build_jobs(
    schedules: &std::collections::HashMap<String, ScheduleConfig>,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<CronJob>> {
    let mut jobs = Vec::new();
    for (name, cfg) in schedules {
        if !cfg.enabled {
            continue;
        }
        jobs.push(CronJob::new(name.clone(), cfg, now)?);
    }
    Ok(jobs)
}

/// Expand the payload template's placeholders (§4.5): `updated_after_hours:N`
/// → `iso(now - N hours)`, `period: prev_month | this_month`, `as_of: today`.
/// Any other key passes through unchanged.
pub fn materialize_payload(template: &Map<String, Value>, now: DateTime<Utc>) -> Map<String, Value> {
    let today = now.date_naive();
    let mut out = Map::new();
    for (k, v) in template {
        match (k.as_str(), v.as_str()) {
            ("updated_after_hours", _) => {
                if let Some(hours) = v.as_i64() {
                    let ts = now - ChronoDuration::hours(hours);
                    out.insert("updated_after".to_string(), json!(ts.to_rfc3339()));
                } else {
                    out.insert(k.clone(), v.clone());
                }
            }
            ("as_of", Some("today")) => {
                out.insert("as_of".to_string(), json!(today.format("%Y-%m-%d").to_string()));
            }
            ("period", Some("prev_month")) => {
                out.insert("period".to_string(), json!(prev_month_period(today)));
            }
            ("period", Some("this_month")) => {
                out.insert("period".to_string(), json!(this_month_period(today)));
            }
            _ => {
                out.insert(k.clone(), v.clone());
            }
        }
    }
    out
}

fn this_month_period(d: chrono::NaiveDate) -> String {
    format!("{:04}-{:02}", d.year(), d.month())
}

fn prev_month_period(d: chrono::NaiveDate) -> String {
    let first_of_this_month = d.with_day(1).expect("day 1 always valid");
    let prev_last_day = first_of_this_month - ChronoDuration::days(1);
    this_month_period(prev_last_day)
}

/// One tick of the cron loop: fire every job whose `next_fire` has elapsed,
/// then schedule its next occurrence (§4.5 "Ordering & cancellation": jobs
/// fire in the order their next_ts elapses; missed ticks are not replayed).
pub async fn tick(agent: &AgentClient, jobs: &mut [CronJob], now: DateTime<Utc>) {
    jobs.sort_by_key(|j| j.next_fire);
    for job in jobs.iter_mut() {
        if job.next_fire > now {
            continue;
        }
        let payload = materialize_payload(&job.payload_template, now);
        let month = this_month_period(now.date_naive());
        let idem = make_idempotency_key(&[json!("schedule"), json!(job.name), Value::Object(payload.clone()), json!(month)]);

        match agent.create_run(&job.run_type, "schedule", Value::Object(payload.clone()), &idem).await {
            Ok(resp) => info!(job = %job.name, run_type = %job.run_type, run_id = %resp.run_id, "schedule_run_created"),
            Err(e) => error!(job = %job.name, run_type = %job.run_type, error = %e, "schedule_run_failed"),
        }

        job.advance(now);
        if job.next_fire <= now {
            warn!(job = %job.name, "cron schedule produced a non-advancing next occurrence; skipping until next tick");
        }
    }
}
