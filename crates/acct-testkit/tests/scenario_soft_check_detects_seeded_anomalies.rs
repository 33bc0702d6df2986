//! S5 (SPEC_FULL §8): seeding 2 unattached vouchers, one imbalanced journal
//! proposal, and 2 overdue unpaid sell invoices must surface
//! `MISSING_ATTACHMENT >= 2`, `JOURNAL_IMBALANCED >= 1`,
//! `OVERDUE_INVOICE >= 2`, and exactly one `SoftCheckResult` row scored
//! below 1.0 for the period.

use acct_db::journal::{self, NewJournalLine, NewJournalProposal};
use acct_db::run;
use acct_db::soft_check::{self, SoftCheckFilter};
use acct_db::validation::{self, ValidationFilter};
use acct_db::voucher::{self, NewVoucher};
use acct_dispatcher::{dispatch, DispatchOutcome, DispatcherConfig};
use acct_testkit::{db_pool, ErpFixture};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn seeded_anomalies_are_detected_and_scored_below_one() {
    let pool = match db_pool().await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("SKIP: no test database available: {e}");
            return;
        }
    };

    let period = format!("2027-{:02}-soft", (Uuid::new_v4().as_u128() % 12 + 1) as u32);
    let today = Utc::now().date_naive();
    let overdue_date = (today - Duration::days(10)).to_string();

    let erp = ErpFixture::start().await;
    erp.set(
        "/erp/v1/invoices",
        json!([
            {"invoice_no": "INV-OD-1", "inv_type": "sell", "amount": "1000.00", "vat_rate": "0.08", "vat_amount": "80.00", "due_date": overdue_date, "status": "unpaid"},
            {"invoice_no": "INV-OD-2", "inv_type": "sell", "amount": "2000.00", "vat_rate": "0.08", "vat_amount": "160.00", "due_date": overdue_date, "status": "unpaid"},
        ]),
    )
    .await;
    let registry = acct_workflows::build_registry();

    let (seed_run, _) = run::create_or_get_run(
        &pool,
        Uuid::new_v4(),
        "soft_checks",
        "manual",
        &format!("s5-seed-{}", Uuid::new_v4()),
        json!({}),
    )
    .await
    .unwrap();

    let date = NaiveDate::parse_from_str(&format!("{}-01", &period[..7]), "%Y-%m-%d").unwrap();

    let mut unattached_ids = Vec::new();
    for n in 0..2 {
        let (voucher, _) = voucher::insert_if_absent(
            &pool,
            &NewVoucher {
                erp_voucher_id: None,
                voucher_no: format!("S5-NOATT-{n}-{}", Uuid::new_v4()),
                voucher_type: "cash_disbursement".to_string(),
                date,
                amount: Decimal::new(500_00, 2),
                currency: "VND".to_string(),
                partner_name: None,
                partner_tax_code: None,
                has_attachment: false,
                source: "testkit_seed".to_string(),
                type_hint: None,
                raw_payload: json!({}),
                run_id: seed_run.run_id,
            },
        )
        .await
        .unwrap();
        unattached_ids.push(voucher.id);
    }

    // One voucher backing the imbalanced journal proposal (needs a
    // voucher_id to attach lines to).
    let (voucher_for_proposal, _) = voucher::insert_if_absent(
        &pool,
        &NewVoucher {
            erp_voucher_id: None,
            voucher_no: format!("S5-JRNL-{}", Uuid::new_v4()),
            voucher_type: "sell_invoice".to_string(),
            date,
            amount: Decimal::new(5_000_000_00, 2),
            currency: "VND".to_string(),
            partner_name: None,
            partner_tax_code: None,
            has_attachment: true,
            source: "testkit_seed".to_string(),
            type_hint: None,
            raw_payload: json!({}),
            run_id: seed_run.run_id,
        },
    )
    .await
    .unwrap();

    journal::insert_proposal(
        &pool,
        &NewJournalProposal {
            voucher_id: voucher_for_proposal.id,
            description: "imbalanced test proposal".to_string(),
            confidence: Decimal::new(80, 2),
            reasoning: "seeded for soft-check scenario".to_string(),
            run_id: seed_run.run_id,
            lines: vec![
                NewJournalLine {
                    account_code: "131".to_string(),
                    account_name: "Receivable".to_string(),
                    debit: Decimal::new(5_000_000_00, 2),
                    credit: Decimal::ZERO,
                },
                NewJournalLine {
                    account_code: "511".to_string(),
                    account_name: "Revenue".to_string(),
                    debit: Decimal::ZERO,
                    credit: Decimal::new(4_000_000_00, 2),
                },
            ],
        },
    )
    .await
    .unwrap();

    let (check_run, _) = run::create_or_get_run(
        &pool,
        Uuid::new_v4(),
        "soft_checks",
        "manual",
        &format!("s5-check-{}", Uuid::new_v4()),
        json!({"period": period}),
    )
    .await
    .unwrap();

    let outcome = dispatch(&pool, erp.client(), &registry, check_run.run_id, &DispatcherConfig::default()).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::Success);

    let issues = validation::list(
        &pool,
        &ValidationFilter { run_id: Some(check_run.run_id), severity: None, resolution: None, limit: 1000, offset: 0 },
    )
    .await
    .unwrap();

    let missing_attachment = issues.iter().filter(|i| i.rule_code == "MISSING_ATTACHMENT").count();
    let imbalanced = issues.iter().filter(|i| i.rule_code == "JOURNAL_IMBALANCED").count();
    let overdue = issues.iter().filter(|i| i.rule_code == "OVERDUE_INVOICE").count();

    assert!(missing_attachment >= 2, "expected >=2 MISSING_ATTACHMENT, got {missing_attachment}");
    assert!(imbalanced >= 1, "expected >=1 JOURNAL_IMBALANCED, got {imbalanced}");
    assert!(overdue >= 2, "expected >=2 OVERDUE_INVOICE, got {overdue}");
    assert!(unattached_ids.len() == 2);

    let results = soft_check::list(
        &pool,
        &SoftCheckFilter { period: Some(period.clone()), run_id: Some(check_run.run_id), limit: 10, offset: 0 },
    )
    .await
    .unwrap();
    assert_eq!(results.len(), 1, "expected exactly one SoftCheckResult row for this run");
    assert!(results[0].score < Decimal::ONE, "score {} should be below 1.0 with seeded anomalies", results[0].score);
}
