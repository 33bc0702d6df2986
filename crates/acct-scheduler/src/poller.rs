//! Object-store poller loop (§4.5 "Object-store poller"): for each
//! configured prefix, at its `interval_seconds`, list new keys and POST one
//! `voucher_ingest`-shaped run per key.
//!
//! Grounded on `original_source/.../agent_scheduler/main.py`'s
//! `_poll_drop_bucket` (in-memory `seen` set, `{file_uri}` payload). The
//! original's listing call goes through its own `common/storage.py`; here
//! that's `aws_sdk_s3::Client::list_objects_v2`, scoped out of this spec per
//! §1 ("object-storage mechanics" is an external collaborator) except for
//! this one call the poller needs to discover new keys.

use std::collections::{HashMap, HashSet};

use aws_sdk_s3::Client as S3Client;
use serde_json::json;
use tracing::{error, info};

use crate::agent_client::AgentClient;
use crate::config::PollerConfig;
use crate::idempotency::make_idempotency_key;

pub struct PollerState {
    pub name: String,
    pub cfg: PollerConfig,
    pub seen: HashSet<String>,
    pub next_poll: std::time::Instant,
}

impl PollerState {
    pub fn new(name: String, cfg: PollerConfig) -> Self {
        Self { name, cfg, seen: HashSet::new(), next_poll: std::time::Instant::now() }
    }
}

pub fn build_pollers(pollers: &HashMap<String, PollerConfig>) -> Vec<PollerState> {
    pollers
        .iter()
        .filter(|(_, cfg)| cfg.enabled)
        .map(|(name, cfg)| PollerState::new(name.clone(), cfg.clone()))
        .collect()
}

/// List every key under `bucket`/`prefix`, following continuation tokens.
async fn list_all_keys(s3: &S3Client, bucket: &str, prefix: &str) -> anyhow::Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
        let mut req = s3.list_objects_v2().bucket(bucket).prefix(prefix);
        if let Some(token) = &continuation_token {
            req = req.continuation_token(token);
        }
        let resp = req.send().await?;

        for obj in resp.contents() {
            if let Some(key) = obj.key() {
                keys.push(key.to_string());
            }
        }

        if resp.is_truncated().unwrap_or(false) {
            continuation_token = resp.next_continuation_token().map(str::to_string);
            if continuation_token.is_none() {
                break;
            }
        } else {
            break;
        }
    }

    Ok(keys)
}

/// One tick for one poller: list the bucket/prefix, POST a run for every key
/// not already in `seen`, and mark it seen regardless of POST outcome (§4.5:
/// "idempotency on the API side absorbs re-emission" — a failed POST is
/// retried on the API's own retry path via the scheduler's next full sweep,
/// not by re-listing the same key forever).
pub async fn poll_once(s3: &S3Client, agent: &AgentClient, state: &mut PollerState) {
    let keys = match list_all_keys(s3, &state.cfg.bucket, &state.cfg.prefix).await {
        Ok(k) => k,
        Err(e) => {
            error!(poller = %state.name, bucket = %state.cfg.bucket, prefix = %state.cfg.prefix, error = %e, "poller list failed");
            return;
        }
    };

    for key in keys {
        if state.seen.contains(&key) {
            continue;
        }
        state.seen.insert(key.clone());

        let file_uri = format!("s3://{}/{}", state.cfg.bucket, key);
        let payload = json!({ "file_uri": file_uri });
        let idem = make_idempotency_key(&[json!(state.cfg.run_type), json!(state.cfg.bucket), json!(key)]);

        match agent.create_run(&state.cfg.run_type, "event", payload, &idem).await {
            Ok(resp) => info!(poller = %state.name, run_type = %state.cfg.run_type, key = %key, run_id = %resp.run_id, "event_run_created"),
            Err(e) => error!(poller = %state.name, run_type = %state.cfg.run_type, key = %key, error = %e, "event_run_failed"),
        }
    }
}
