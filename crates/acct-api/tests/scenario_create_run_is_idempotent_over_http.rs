//! `POST /agent/v1/runs` keyed by `Idempotency-Key`: two requests with the
//! same key and payload resolve to the same `run_id` and never insert a
//! second row (SPEC_FULL §6, mirrors S1 at the HTTP layer).

mod common;

use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

fn post_run(key: &str, run_type: &str, payload: serde_json::Value) -> axum::http::Request<axum::body::Body> {
    let body = serde_json::json!({"run_type": run_type, "trigger_type": "manual", "payload": payload}).to_string();
    axum::http::Request::builder()
        .method("POST")
        .uri("/agent/v1/runs")
        .header("content-type", "application/json")
        .header("Idempotency-Key", key)
        .body(axum::body::Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn duplicate_idempotency_key_returns_the_same_run_id() {
    let pool = match common::db_pool().await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("SKIP: no test database available: {e}");
            return;
        }
    };

    let state = common::build_state(pool, None).await;
    let app = acct_api::routes::build_router(state);

    let key = format!("http-idem-{}", Uuid::new_v4());
    let payload = serde_json::json!({"period": "2026-03"});

    let res1 = app.clone().oneshot(post_run(&key, "tax_report", payload.clone())).await.unwrap();
    assert_eq!(res1.status(), axum::http::StatusCode::OK);
    let body1: serde_json::Value = serde_json::from_slice(&res1.into_body().collect().await.unwrap().to_bytes()).unwrap();

    let res2 = app.clone().oneshot(post_run(&key, "tax_report", payload.clone())).await.unwrap();
    assert_eq!(res2.status(), axum::http::StatusCode::OK);
    let body2: serde_json::Value = serde_json::from_slice(&res2.into_body().collect().await.unwrap().to_bytes()).unwrap();

    assert_eq!(body1["run_id"], body2["run_id"], "same idempotency key must resolve to the same run_id");

    // A different payload under the same key is a conflict, not a new run.
    let res3 = app.oneshot(post_run(&key, "tax_report", serde_json::json!({"period": "2026-04"}))).await.unwrap();
    assert_eq!(res3.status(), axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_run_type_is_rejected() {
    let pool = match common::db_pool().await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("SKIP: no test database available: {e}");
            return;
        }
    };

    let state = common::build_state(pool, None).await;
    let app = acct_api::routes::build_router(state);

    let key = format!("http-unknown-{}", Uuid::new_v4());
    let res = app.oneshot(post_run(&key, "not_a_real_workflow", serde_json::json!({}))).await.unwrap();
    assert_eq!(res.status(), axum::http::StatusCode::BAD_REQUEST);
}
