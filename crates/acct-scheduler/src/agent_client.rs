//! Thin HTTP client the scheduler uses to POST run requests to `acct-api`
//! (§4.5, §6). Grounded on `original_source/.../agent_scheduler/main.py`'s
//! `AgentClient` — one `reqwest::Client` shared across both loops (§5
//! "sharing one HTTP client"), `Idempotency-Key` header, `run_type` +
//! `trigger_type` + `payload` body.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
struct CreateRunRequest<'a> {
    run_type: &'a str,
    trigger_type: &'a str,
    payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRunResponse {
    pub run_id: String,
    pub status: String,
}

pub struct AgentClient {
    http: reqwest::Client,
    base_url: String,
}

impl AgentClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub async fn create_run(
        &self,
        run_type: &str,
        trigger_type: &str,
        payload: Value,
        idempotency_key: &str,
    ) -> Result<CreateRunResponse> {
        let url = format!("{}/agent/v1/runs", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("Idempotency-Key", idempotency_key)
            .json(&CreateRunRequest { run_type, trigger_type, payload })
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("POST {url} returned {status}: {body}");
        }

        resp.json().await.context("decode create-run response failed")
    }
}
