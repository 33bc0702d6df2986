//! Every proposal `journal_suggestion` writes balances: Σdebit = Σcredit on
//! each proposal (SPEC_FULL §3 invariant, §8 property).

use std::sync::Arc;

use acct_db::voucher::{self, NewVoucher};
use acct_erpx::{ErpxClient, ErpxSettings};
use acct_workflows::engine::WorkflowCtx;
use acct_workflows::journal_suggestion::JournalSuggestionWorkflow;
use acct_workflows::Workflow;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

async fn make_pool(url: &str) -> anyhow::Result<sqlx::PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new().max_connections(4).connect(url).await?;
    sqlx::migrate!("../acct-db/migrations").run(&pool).await?;
    Ok(pool)
}

#[tokio::test]
async fn generated_proposals_have_balanced_lines() -> anyhow::Result<()> {
    let Ok(url) = std::env::var("ACCT_DATABASE_URL") else {
        eprintln!("skipping: ACCT_DATABASE_URL not set");
        return Ok(());
    };
    let pool = make_pool(&url).await?;
    let run_id = Uuid::new_v4();

    let (voucher_row, _) = voucher::insert_if_absent(
        &pool,
        &NewVoucher {
            erp_voucher_id: Some(format!("test-{run_id}")),
            voucher_no: format!("TV-{run_id}"),
            voucher_type: "sell_invoice".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            amount: Decimal::new(12_345_67, 2),
            currency: "VND".to_string(),
            partner_name: Some("Test Partner".to_string()),
            partner_tax_code: None,
            has_attachment: true,
            source: "scenario_test".to_string(),
            type_hint: None,
            raw_payload: json!({}),
            run_id,
        },
    )
    .await?;

    let erpx = Arc::new(ErpxClient::new(ErpxSettings::default())?);
    let ctx = WorkflowCtx { pool: pool.clone(), erpx, run_id, cursor_in: json!({}) };
    let outcome = JournalSuggestionWorkflow.run(&ctx).await;
    assert!(!outcome.has_errors(), "journal_suggestion should succeed: {:?}", outcome.errors);

    let proposals = acct_db::journal::list_proposals(
        &pool,
        &acct_db::journal::JournalFilter { run_id: Some(run_id), status: None, limit: 10, offset: 0 },
    )
    .await?;
    let proposal = proposals.into_iter().find(|p| p.voucher_id == voucher_row.id).expect("proposal was created for the voucher");

    let lines = acct_db::journal::fetch_lines(&pool, proposal.proposal_id).await?;
    let debit_total: Decimal = lines.iter().map(|l| l.debit).sum();
    let credit_total: Decimal = lines.iter().map(|l| l.credit).sum();
    assert_eq!(debit_total, credit_total, "proposal lines must balance");
    assert_eq!(debit_total, voucher_row.amount);

    Ok(())
}
