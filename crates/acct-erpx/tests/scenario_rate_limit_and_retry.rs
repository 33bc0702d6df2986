//! Scenarios: rate-limit compliance and retry cap (SPEC_FULL §8 properties
//! 7, 8; §8 scenario S4).

use acct_erpx::{ErpxClient, ErpxSettings};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn five_calls_at_qps_ten_take_at_least_400ms() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/erp/v1/vouchers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let client = ErpxClient::new(ErpxSettings { base_url: server.uri(), qps: 10.0, ..Default::default() }).unwrap();

    let start = tokio::time::Instant::now();
    for _ in 0..5 {
        client.get_vouchers(None).await.unwrap();
    }
    let elapsed = start.elapsed();

    assert!(elapsed.as_secs_f64() >= 0.4 - 0.02, "elapsed {elapsed:?} should be >= ~0.4s at qps=10");
}

#[tokio::test]
async fn retries_exhaust_at_three_attempts_on_5xx() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/erp/v1/vouchers"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = ErpxClient::new(ErpxSettings {
        base_url: server.uri(),
        qps: 0.0,
        retry_base_seconds: 0.01,
        retry_max_seconds: 0.02,
        ..Default::default()
    })
    .unwrap();

    let err = client.get_vouchers(None).await.unwrap_err();
    assert!(matches!(err, acct_erpx::UpstreamError::Exhausted { .. }));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3, "max attempts is capped at 3 by policy");
}

#[tokio::test]
async fn terminal_4xx_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/erp/v1/vouchers"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ErpxClient::new(ErpxSettings { base_url: server.uri(), qps: 0.0, ..Default::default() }).unwrap();

    let err = client.get_vouchers(None).await.unwrap_err();
    assert!(matches!(err, acct_erpx::UpstreamError::Client { status: 404, .. }));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "4xx other than 408/429 must be terminal, not retried");
}

#[tokio::test]
async fn rate_zero_qps_disables_pacing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/erp/v1/vouchers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let client = ErpxClient::new(ErpxSettings { base_url: server.uri(), qps: 0.0, ..Default::default() }).unwrap();

    let start = tokio::time::Instant::now();
    for _ in 0..5 {
        client.get_vouchers(None).await.unwrap();
    }
    assert!(start.elapsed().as_secs_f64() < 0.3, "qps=0 must not pace requests");
}
