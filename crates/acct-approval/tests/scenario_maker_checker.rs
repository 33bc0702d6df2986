//! Maker-checker approval properties (SPEC_FULL §8 properties 2-5, scenarios S2/S3).

use acct_approval::{decide, ApprovalError, ApprovalRequest, Decision};
use acct_audit::AuditWriter;
use acct_db::contract_proposal::{self, NewContractProposal};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

async fn make_pool(url: &str) -> anyhow::Result<sqlx::PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new().max_connections(4).connect(url).await?;
    sqlx::migrate!("../acct-db/migrations").run(&pool).await?;
    Ok(pool)
}

async fn make_proposal(pool: &sqlx::PgPool, created_by: &str) -> anyhow::Result<Uuid> {
    let key = format!("proposal-{}", Uuid::new_v4());
    let (row, inserted) = contract_proposal::insert_if_absent(
        pool,
        &NewContractProposal {
            case_id: "case-1".to_string(),
            obligation_id: None,
            proposal_type: "write_off".to_string(),
            title: "Test proposal".to_string(),
            summary: "A proposal for approval tests".to_string(),
            details: json!({}),
            risk_level: "low".to_string(),
            confidence: Decimal::new(90, 2),
            created_by: created_by.to_string(),
            tier: 1,
            evidence_summary_hash: "deadbeef".to_string(),
            proposal_key: key,
            run_id: Uuid::new_v4(),
        },
    )
    .await?;
    assert!(inserted);
    Ok(row.proposal_id)
}

#[tokio::test]
async fn maker_cannot_approve_own_proposal() -> anyhow::Result<()> {
    let Ok(url) = std::env::var("ACCT_DATABASE_URL") else {
        eprintln!("skipping: ACCT_DATABASE_URL not set");
        return Ok(());
    };
    let pool = make_pool(&url).await?;
    let mut audit = AuditWriter::connect(pool.clone()).await?;

    let proposal_id = make_proposal(&pool, "maker1").await?;

    let req = ApprovalRequest {
        proposal_id,
        approver_id: "maker1".to_string(),
        decision: Decision::Approve,
        evidence_ack: true,
        idempotency_key: format!("key-{}", Uuid::new_v4()),
    };

    let err = decide(&pool, &mut audit, &req).await.expect_err("maker==checker must fail");
    assert!(matches!(err, ApprovalError::MakerIsChecker));

    let row = contract_proposal::fetch(&pool, proposal_id).await?;
    assert_eq!(row.status, "draft", "proposal must remain non-terminal");

    Ok(())
}

#[tokio::test]
async fn approve_without_evidence_ack_is_rejected_and_nonterminal() -> anyhow::Result<()> {
    let Ok(url) = std::env::var("ACCT_DATABASE_URL") else {
        eprintln!("skipping: ACCT_DATABASE_URL not set");
        return Ok(());
    };
    let pool = make_pool(&url).await?;
    let mut audit = AuditWriter::connect(pool.clone()).await?;

    let proposal_id = make_proposal(&pool, "maker1").await?;

    let req = ApprovalRequest {
        proposal_id,
        approver_id: "checker1".to_string(),
        decision: Decision::Approve,
        evidence_ack: false,
        idempotency_key: format!("key-{}", Uuid::new_v4()),
    };

    let err = decide(&pool, &mut audit, &req).await.expect_err("missing evidence_ack must fail");
    assert!(matches!(err, ApprovalError::MissingEvidenceAck));

    let row = contract_proposal::fetch(&pool, proposal_id).await?;
    assert_eq!(row.status, "draft");

    Ok(())
}

#[tokio::test]
async fn terminal_proposal_rejects_every_subsequent_attempt() -> anyhow::Result<()> {
    let Ok(url) = std::env::var("ACCT_DATABASE_URL") else {
        eprintln!("skipping: ACCT_DATABASE_URL not set");
        return Ok(());
    };
    let pool = make_pool(&url).await?;
    let mut audit = AuditWriter::connect(pool.clone()).await?;

    let proposal_id = make_proposal(&pool, "maker1").await?;

    let first = ApprovalRequest {
        proposal_id,
        approver_id: "checker1".to_string(),
        decision: Decision::Approve,
        evidence_ack: true,
        idempotency_key: format!("key-{}", Uuid::new_v4()),
    };
    let decided = decide(&pool, &mut audit, &first).await?;
    assert_eq!(decided.proposal_status, "approved");
    assert!(!decided.replay);

    // Different approver, different key, proposal already terminal -> 409.
    let second = ApprovalRequest {
        proposal_id,
        approver_id: "checker2".to_string(),
        decision: Decision::Approve,
        evidence_ack: true,
        idempotency_key: format!("key-{}", Uuid::new_v4()),
    };
    let err = decide(&pool, &mut audit, &second).await.expect_err("already-terminal must fail");
    assert!(matches!(err, ApprovalError::AlreadyTerminal { .. }));

    Ok(())
}

#[tokio::test]
async fn same_idempotency_key_replays_without_side_effect() -> anyhow::Result<()> {
    let Ok(url) = std::env::var("ACCT_DATABASE_URL") else {
        eprintln!("skipping: ACCT_DATABASE_URL not set");
        return Ok(());
    };
    let pool = make_pool(&url).await?;
    let mut audit = AuditWriter::connect(pool.clone()).await?;

    let proposal_id = make_proposal(&pool, "maker1").await?;
    let key = format!("key-{}", Uuid::new_v4());

    let req = ApprovalRequest {
        proposal_id,
        approver_id: "checker1".to_string(),
        decision: Decision::Approve,
        evidence_ack: true,
        idempotency_key: key.clone(),
    };

    let first = decide(&pool, &mut audit, &req).await?;
    assert!(!first.replay);

    let second = decide(&pool, &mut audit, &req).await?;
    assert!(second.replay);
    assert_eq!(first.approval.id, second.approval.id);
    assert_eq!(second.proposal_status, "approved");

    Ok(())
}

#[tokio::test]
async fn concurrent_approvers_yield_exactly_one_terminal_decision() -> anyhow::Result<()> {
    let Ok(url) = std::env::var("ACCT_DATABASE_URL") else {
        eprintln!("skipping: ACCT_DATABASE_URL not set");
        return Ok(());
    };
    let pool = make_pool(&url).await?;
    let proposal_id = make_proposal(&pool, "maker1").await?;

    let pool_a = pool.clone();
    let pool_b = pool.clone();

    let task_a = tokio::spawn(async move {
        let mut audit = AuditWriter::connect(pool_a.clone()).await.unwrap();
        let req = ApprovalRequest {
            proposal_id,
            approver_id: "approver1".to_string(),
            decision: Decision::Approve,
            evidence_ack: true,
            idempotency_key: format!("key-a-{}", Uuid::new_v4()),
        };
        decide(&pool_a, &mut audit, &req).await
    });

    let task_b = tokio::spawn(async move {
        let mut audit = AuditWriter::connect(pool_b.clone()).await.unwrap();
        let req = ApprovalRequest {
            proposal_id,
            approver_id: "approver2".to_string(),
            decision: Decision::Approve,
            evidence_ack: true,
            idempotency_key: format!("key-b-{}", Uuid::new_v4()),
        };
        decide(&pool_b, &mut audit, &req).await
    });

    let (res_a, res_b) = (task_a.await?, task_b.await?);
    let successes = [res_a.is_ok(), res_b.is_ok()].into_iter().filter(|ok| *ok).count();
    assert!(successes >= 1, "at least one approval must succeed");

    let row = contract_proposal::fetch(&pool, proposal_id).await?;
    assert_eq!(row.status, "approved", "exactly one terminal transition must have landed");

    let decisions = sqlx::query_scalar::<_, i64>("select count(*) from approval_decisions where proposal_id = $1")
        .bind(proposal_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(decisions, successes as i64, "one approval row per successful decision");

    Ok(())
}
