//! Shared fixtures for `tests/scenario_*.rs` integration tests across the
//! workspace (SPEC_FULL §8). Two things every scenario needs: a real
//! Postgres pool with migrations applied, and a stand-in ERP server so
//! workflows can be exercised without a live upstream. Neither production
//! crate (`acct-api`, `acct-cli`) depends on this crate.

use std::sync::Arc;

use acct_erpx::{ErpxClient, ErpxSettings};
use anyhow::Result;
use serde_json::Value;
use sqlx::PgPool;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Connect to `ACCT_DATABASE_URL` and ensure migrations have run. Thin
/// wrapper so scenario tests don't need to import `acct-db` directly just
/// for this one call.
pub async fn db_pool() -> Result<PgPool> {
    acct_db::testkit_db_pool().await
}

/// An in-memory ERP server with every read endpoint `acct_erpx::ErpxClient`
/// calls mounted to return an empty list by default. Tests override
/// individual endpoints with [`ErpFixture::set`] before building a client.
pub struct ErpFixture {
    server: MockServer,
}

const ENDPOINTS: &[&str] = &[
    "/erp/v1/journals",
    "/erp/v1/vouchers",
    "/erp/v1/invoices",
    "/erp/v1/ar/aging",
    "/erp/v1/assets",
    "/erp/v1/close/calendar",
    "/erp/v1/bank_transactions",
    "/erp/v1/partners",
    "/erp/v1/contracts",
    "/erp/v1/payments",
];

impl ErpFixture {
    /// Start the server with every endpoint defaulted to `[]`.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        for ep in ENDPOINTS {
            Mock::given(method("GET"))
                .and(path(*ep))
                .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(vec![])))
                .mount(&server)
                .await;
        }
        Self { server }
    }

    /// Override one endpoint's response body. Call after [`start`](Self::start);
    /// wiremock matches the most-recently-mounted expectation first.
    pub async fn set(&self, endpoint: &str, body: Value) {
        Mock::given(method("GET")).and(path(endpoint)).respond_with(ResponseTemplate::new(200).set_body_json(body)).mount(&self.server).await;
    }

    /// Build a client pointed at this server with rate limiting disabled
    /// (`qps: 0.0`), so scenario tests that issue several calls aren't
    /// paced at the production 10 qps ceiling.
    pub fn client(&self) -> Arc<ErpxClient> {
        Arc::new(ErpxClient::new(ErpxSettings { base_url: self.server.uri(), qps: 0.0, ..Default::default() }).expect("erpx client"))
    }
}
