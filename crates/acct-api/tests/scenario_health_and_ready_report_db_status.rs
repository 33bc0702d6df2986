//! `GET /healthz` never touches the database; `GET /readyz` reflects
//! `acct_db::status` (SPEC_FULL §6, "liveness vs. readiness").

mod common;

use http_body_util::BodyExt;
use tower::ServiceExt;

#[tokio::test]
async fn healthz_and_readyz_report_ok_against_a_migrated_database() {
    let pool = match common::db_pool().await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("SKIP: no test database available: {e}");
            return;
        }
    };

    let state = common::build_state(pool, None).await;
    let app = acct_api::routes::build_router(state);

    let res = app
        .clone()
        .oneshot(axum::http::Request::builder().uri("/healthz").body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), axum::http::StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&res.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["ok"], true);

    let res = app
        .oneshot(axum::http::Request::builder().uri("/readyz").body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), axum::http::StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&res.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["schema_ready"], true);
}
