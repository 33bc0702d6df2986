use acct_db::contract_proposal::NewContractProposal;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

/// `acct-cli approval decide --decision approve` without --evidence-ack must
/// be refused (SPEC_FULL §4.6 validation order step 1).
///
/// DB-backed; skipped if ACCT_DATABASE_URL is not set.
#[tokio::test]
async fn cli_approval_decide_approve_without_evidence_ack_fails() -> anyhow::Result<()> {
    let url = match std::env::var(acct_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: {} not set", acct_db::ENV_DB_URL);
            return Ok(());
        }
    };

    let pool = acct_db::connect(&url).await?;
    acct_db::migrate(&pool).await?;

    let run_id = Uuid::new_v4();
    acct_db::run::create_or_get_run(
        &pool,
        run_id,
        "voucher_classify",
        "manual",
        &format!("cli-approval-test-{run_id}"),
        json!({}),
    )
    .await?;

    let (proposal, _) = acct_db::contract_proposal::insert_if_absent(
        &pool,
        &NewContractProposal {
            case_id: "CASE-1".to_string(),
            obligation_id: None,
            proposal_type: "voucher_classification".to_string(),
            title: "classify voucher".to_string(),
            summary: "suggest a classification tag".to_string(),
            details: json!({}),
            risk_level: "low".to_string(),
            confidence: Decimal::new(90, 2),
            created_by: "maker@example.com".to_string(),
            tier: 1,
            evidence_summary_hash: "deadbeef".to_string(),
            proposal_key: format!("cli-proposal-{run_id}"),
            run_id,
        },
    )
    .await?;

    let mut cmd = assert_cmd::Command::cargo_bin("acct-cli")?;
    cmd.env(acct_db::ENV_DB_URL, &url)
        .args([
            "approval",
            "decide",
            "--proposal-id",
            &proposal.proposal_id.to_string(),
            "--approver-id",
            "checker@example.com",
            "--decision",
            "approve",
            "--idempotency-key",
            &format!("cli-decide-{run_id}"),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("evidence_ack"));

    Ok(())
}
