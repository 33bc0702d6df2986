//! S2 (SPEC_FULL §8) at the HTTP layer: an approver who is also the
//! proposal's maker gets 409 and the proposal status is untouched.

mod common;

use acct_db::contract_proposal::{self, NewContractProposal};
use acct_db::run;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn maker_is_checker_returns_409_and_status_is_unchanged() {
    let pool = match common::db_pool().await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("SKIP: no test database available: {e}");
            return;
        }
    };

    let (seed_run, _) =
        run::create_or_get_run(&pool, Uuid::new_v4(), "tax_report", "manual", &format!("s2-seed-{}", Uuid::new_v4()), json!({}))
            .await
            .unwrap();

    let maker = "alice@example.com";
    let proposal = contract_proposal::insert_if_absent(
        &pool,
        &NewContractProposal {
            case_id: format!("case-{}", Uuid::new_v4()),
            obligation_id: None,
            proposal_type: "journal_entry".to_string(),
            title: "S2 maker-checker test".to_string(),
            summary: "seeded for HTTP scenario".to_string(),
            details: json!({}),
            risk_level: "medium".to_string(),
            confidence: Decimal::new(90, 2),
            created_by: maker.to_string(),
            tier: 2,
            evidence_summary_hash: "deadbeef".to_string(),
            proposal_key: format!("s2-key-{}", Uuid::new_v4()),
            run_id: seed_run.run_id,
        },
    )
    .await
    .unwrap()
    .0;

    let state = common::build_state(pool.clone(), None).await;
    let app = acct_api::routes::build_router(state);

    let body = json!({"decision": "approve", "approver_id": maker, "evidence_ack": true}).to_string();
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(format!("/agent/v1/contract/proposals/{}/approvals", proposal.proposal_id))
        .header("content-type", "application/json")
        .header("Idempotency-Key", format!("s2-approval-{}", Uuid::new_v4()))
        .body(axum::body::Body::from(body))
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), axum::http::StatusCode::CONFLICT);

    let refetched = contract_proposal::fetch(&pool, proposal.proposal_id).await.unwrap();
    assert_eq!(refetched.status, "draft", "a rejected maker-checker attempt must not change the proposal status");
}
