//! `POST /agent/v1/qa` answers a templated question and records it;
//! `GET /agent/v1/qa` then lists that audit row back (SPEC_FULL §4.8, §6).

mod common;

use http_body_util::BodyExt;
use tower::ServiceExt;

#[tokio::test]
async fn asking_a_question_records_an_audit_row_visible_in_the_listing() {
    let pool = match common::db_pool().await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("SKIP: no test database available: {e}");
            return;
        }
    };

    let state = common::build_state(pool, None).await;
    let app = acct_api::routes::build_router(state);

    let body = serde_json::json!({"question": "how many vouchers were ingested?"}).to_string();
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/agent/v1/qa")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body))
        .unwrap();

    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), axum::http::StatusCode::OK);
    let answer: serde_json::Value = serde_json::from_slice(&res.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(answer["question_type"], "voucher_counts");
    let id = answer["id"].as_str().unwrap().to_string();

    let res = app
        .oneshot(axum::http::Request::builder().uri("/agent/v1/qa?limit=500").body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), axum::http::StatusCode::OK);
    let rows: Vec<serde_json::Value> = serde_json::from_slice(&res.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert!(rows.iter().any(|r| r["id"] == id), "the newly asked question must appear in the audit listing");
}
