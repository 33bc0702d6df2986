//! Rate-limited, retrying client for the read-only ERP API (SPEC_FULL §4.1).
//!
//! Grounded on `original_source/.../common/erpx_client.py`'s `_RateLimiter`
//! and tenacity retry loop for behavior, and on `mqk-md::provider`'s
//! `ProviderError`/object-safety shape for the Rust-side contract. Diverges
//! from the Python original in one place: the original treats all 4xx as
//! retryable, SPEC_FULL §4.1 makes 4xx terminal except 408/429, and this is
//! what's implemented here.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use acct_schemas::ErpRecord;

/// Rate limiter is locked at this qps by policy regardless of configuration
/// (SPEC_FULL §4.1: "the client MUST NOT exceed this regardless of
/// configuration requesting higher").
pub const MAX_QPS: f64 = 10.0;
/// Retry attempts are capped at this value by policy.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct ErpxSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_seconds: u64,
    pub qps: f64,
    pub retry_max_attempts: u32,
    pub retry_base_seconds: f64,
    pub retry_max_seconds: f64,
}

impl Default for ErpxSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            token: None,
            timeout_seconds: 30,
            qps: MAX_QPS,
            retry_max_attempts: MAX_ATTEMPTS,
            retry_base_seconds: 1.0,
            retry_max_seconds: 20.0,
        }
    }
}

/// Errors an [`ErpxClient`] call may return.
#[derive(Debug)]
pub enum UpstreamError {
    /// Network/transport failure (connection refused, DNS, etc).
    Transport(String),
    /// Request timed out.
    Timeout,
    /// Retries exhausted; carries the last observed status and a response
    /// snippet (SPEC_FULL §4.1 failure semantics).
    Exhausted { last_status: Option<u16>, snippet: String },
    /// Terminal 4xx (not 408/429) — never retried.
    Client { status: u16, snippet: String },
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamError::Transport(msg) => write!(f, "erp transport error: {msg}"),
            UpstreamError::Timeout => write!(f, "erp request timed out"),
            UpstreamError::Exhausted { last_status, snippet } => {
                write!(f, "erp upstream error after retries: status={last_status:?} body={snippet}")
            }
            UpstreamError::Client { status, snippet } => write!(f, "erp client error {status}: {snippet}"),
        }
    }
}

impl std::error::Error for UpstreamError {}

/// Token-bucket pacer. Acquisition is blocking and FIFO under a single mutex
/// (SPEC_FULL §4.1: "blocking and fair (FIFO under lock)"). `qps <= 0`
/// disables pacing.
struct RateLimiter {
    min_interval: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(qps: f64) -> Self {
        let qps = if qps <= 0.0 { 0.0 } else { qps.min(MAX_QPS) };
        let min_interval = if qps <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / qps)
        };
        Self { min_interval, next_allowed: Mutex::new(None) }
    }

    async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let wait_until = {
            let mut next = self.next_allowed.lock().expect("rate limiter mutex poisoned");
            let now = Instant::now();
            let start = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(start + self.min_interval);
            start
        };
        let now = Instant::now();
        if wait_until > now {
            tokio::time::sleep(wait_until - now).await;
        }
    }
}

/// Rate-limited, retrying read-only ERP client (SPEC_FULL §4.1).
pub struct ErpxClient {
    http: reqwest::Client,
    settings: ErpxSettings,
    limiter: RateLimiter,
}

impl ErpxClient {
    pub fn new(settings: ErpxSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;
        let limiter = RateLimiter::new(settings.qps);
        Ok(Self { http, settings, limiter })
    }

    fn max_attempts(&self) -> u32 {
        self.settings.retry_max_attempts.min(MAX_ATTEMPTS).max(1)
    }

    /// Backoff per SPEC_FULL §4.1: `min(max, base * 2^(attempt-1)) * uniform(0.5, 1.5)`.
    fn backoff_duration(&self, attempt: u32) -> Duration {
        let exp = self.settings.retry_base_seconds * 2f64.powi(attempt as i32 - 1);
        let capped = exp.min(self.settings.retry_max_seconds);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_secs_f64((capped * jitter).max(0.0))
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<ErpRecord>, UpstreamError> {
        let url = format!("{}{}", self.settings.base_url.trim_end_matches('/'), path);
        let mut last_status: Option<u16> = None;
        let mut last_snippet = String::new();

        for attempt in 1..=self.max_attempts() {
            self.limiter.acquire().await;

            let mut req = self.http.get(&url).query(query);
            if let Some(token) = &self.settings.token {
                req = req.bearer_auth(token);
            }

            let outcome = req.send().await;
            match outcome {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body: Value = resp.json().await.map_err(|e| UpstreamError::Transport(e.to_string()))?;
                        return Ok(parse_records(body));
                    }

                    let code = status.as_u16();
                    let snippet = resp.text().await.unwrap_or_default();
                    last_status = Some(code);
                    last_snippet = snippet.chars().take(300).collect();

                    let retryable = status.is_server_error() || code == 408 || code == 429;
                    if !retryable {
                        return Err(UpstreamError::Client { status: code, snippet: last_snippet });
                    }
                    warn!(attempt, status = code, "erp retryable status, backing off");
                }
                Err(e) => {
                    last_snippet = e.to_string();
                    if e.is_timeout() {
                        debug!(attempt, "erp request timed out");
                    } else {
                        debug!(attempt, error = %e, "erp transport error");
                    }
                }
            }

            if attempt < self.max_attempts() {
                tokio::time::sleep(self.backoff_duration(attempt)).await;
            }
        }

        Err(UpstreamError::Exhausted { last_status, snippet: last_snippet })
    }

    pub async fn get_journals(&self, updated_after: Option<&str>) -> Result<Vec<ErpRecord>, UpstreamError> {
        let q = updated_after.map(|v| vec![("updated_after", v)]).unwrap_or_default();
        self.get("/erp/v1/journals", &q).await
    }

    pub async fn get_vouchers(&self, updated_after: Option<&str>) -> Result<Vec<ErpRecord>, UpstreamError> {
        let q = updated_after.map(|v| vec![("updated_after", v)]).unwrap_or_default();
        self.get("/erp/v1/vouchers", &q).await
    }

    pub async fn get_invoices(&self, period: &str) -> Result<Vec<ErpRecord>, UpstreamError> {
        self.get("/erp/v1/invoices", &[("period", period)]).await
    }

    pub async fn get_ar_aging(&self, as_of: &str) -> Result<Vec<ErpRecord>, UpstreamError> {
        self.get("/erp/v1/ar/aging", &[("as_of", as_of)]).await
    }

    pub async fn get_assets(&self, updated_after: Option<&str>) -> Result<Vec<ErpRecord>, UpstreamError> {
        let q = updated_after.map(|v| vec![("updated_after", v)]).unwrap_or_default();
        self.get("/erp/v1/assets", &q).await
    }

    pub async fn get_close_calendar(&self, period: &str) -> Result<Vec<ErpRecord>, UpstreamError> {
        self.get("/erp/v1/close/calendar", &[("period", period)]).await
    }

    pub async fn get_bank_transactions(&self, updated_after: Option<&str>) -> Result<Vec<ErpRecord>, UpstreamError> {
        let q = updated_after.map(|v| vec![("updated_after", v)]).unwrap_or_default();
        self.get("/erp/v1/bank_transactions", &q).await
    }

    pub async fn get_partners(&self, updated_after: Option<&str>) -> Result<Vec<ErpRecord>, UpstreamError> {
        let q = updated_after.map(|v| vec![("updated_after", v)]).unwrap_or_default();
        self.get("/erp/v1/partners", &q).await
    }

    pub async fn get_contracts(&self, updated_after: Option<&str>) -> Result<Vec<ErpRecord>, UpstreamError> {
        let q = updated_after.map(|v| vec![("updated_after", v)]).unwrap_or_default();
        self.get("/erp/v1/contracts", &q).await
    }

    pub async fn get_payments(&self, contract_id: Option<&str>) -> Result<Vec<ErpRecord>, UpstreamError> {
        let q = contract_id.map(|v| vec![("contract_id", v)]).unwrap_or_default();
        self.get("/erp/v1/payments", &q).await
    }
}

fn parse_records(body: Value) -> Vec<ErpRecord> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(ErpRecord(map)),
                _ => None,
            })
            .collect(),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("items").cloned() {
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Object(m) => Some(ErpRecord(m)),
                        _ => None,
                    })
                    .collect()
            } else {
                vec![ErpRecord(map)]
            }
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_caps_at_policy_qps_even_if_configured_higher() {
        let limiter = RateLimiter::new(1000.0);
        assert!(limiter.min_interval >= Duration::from_secs_f64(1.0 / MAX_QPS));
    }

    #[test]
    fn qps_zero_disables_pacing() {
        let limiter = RateLimiter::new(0.0);
        assert!(limiter.min_interval.is_zero());
    }

    #[test]
    fn backoff_respects_min_and_max_bounds() {
        let client = ErpxClient::new(ErpxSettings {
            retry_base_seconds: 1.0,
            retry_max_seconds: 5.0,
            ..Default::default()
        })
        .unwrap();

        for attempt in 1..=5 {
            let d = client.backoff_duration(attempt);
            assert!(d.as_secs_f64() <= 5.0 * 1.5 + 0.001, "attempt {attempt} backoff {d:?} exceeds max*jitter");
        }
    }

    #[test]
    fn max_attempts_capped_at_policy_even_if_configured_higher() {
        let client = ErpxClient::new(ErpxSettings { retry_max_attempts: 50, ..Default::default() }).unwrap();
        assert_eq!(client.max_attempts(), MAX_ATTEMPTS);
    }

    #[test]
    fn parse_records_accepts_bare_array() {
        let body = serde_json::json!([{"a": 1}, {"b": 2}]);
        assert_eq!(parse_records(body).len(), 2);
    }

    #[test]
    fn parse_records_accepts_items_wrapper() {
        let body = serde_json::json!({"items": [{"a": 1}]});
        assert_eq!(parse_records(body).len(), 1);
    }
}
