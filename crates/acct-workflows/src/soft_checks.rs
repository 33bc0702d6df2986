//! `soft_checks`: run the fixed rule set over the current period's vouchers,
//! journal proposals, and invoices; persist one `SoftCheckResult` and N
//! `ValidationIssue` rows (SPEC_FULL §4.3.2).

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use acct_db::journal::{self, JournalFilter};
use acct_db::soft_check::{self, NewSoftCheckResult};
use acct_db::validation::{self, NewValidationIssue};
use acct_db::voucher::{self, VoucherFilter};
use acct_schemas::InvoiceFields;

use crate::engine::{Workflow, WorkflowCtx, WorkflowOutcome};

pub struct SoftChecksWorkflow;

const FETCH_LIMIT: i64 = 2000;

#[async_trait]
impl Workflow for SoftChecksWorkflow {
    fn run_type(&self) -> &'static str {
        "soft_checks"
    }

    async fn run(&self, ctx: &WorkflowCtx) -> WorkflowOutcome {
        let period = ctx
            .cursor_in
            .get("period")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| Utc::now().format("%Y-%m").to_string());

        let vouchers = match voucher::list(&ctx.pool, &VoucherFilter { run_id: None, limit: FETCH_LIMIT, offset: 0 }).await {
            Ok(v) => v,
            Err(e) => return WorkflowOutcome::failed(vec![format!("fetch vouchers: {e:#}")]),
        };

        if vouchers.is_empty() {
            return WorkflowOutcome::ok(json!({"period": period}), json!({"total_checks": 0}));
        }

        let proposals = match journal::list_proposals(
            &ctx.pool,
            &JournalFilter { run_id: None, status: None, limit: FETCH_LIMIT, offset: 0 },
        )
        .await
        {
            Ok(p) => p,
            Err(e) => return WorkflowOutcome::failed(vec![format!("fetch proposals: {e:#}")]),
        };

        let mut issues = Vec::new();
        let mut total_checks = 0i32;

        // MISSING_ATTACHMENT — one per voucher.
        for v in &vouchers {
            total_checks += 1;
            if !v.has_attachment {
                issues.push(NewValidationIssue {
                    rule_code: "MISSING_ATTACHMENT".to_string(),
                    severity: "warning".to_string(),
                    message: format!("voucher {} has no attachment", v.voucher_no),
                    erp_ref: v.erp_voucher_id.clone(),
                    details: json!({"voucher_id": v.id}),
                    check_result_id: None,
                    run_id: ctx.run_id,
                });
            }
        }

        // JOURNAL_IMBALANCED — one per journal proposal.
        for p in &proposals {
            total_checks += 1;
            let lines = match journal::fetch_lines(&ctx.pool, p.proposal_id).await {
                Ok(l) => l,
                Err(e) => {
                    issues.push(NewValidationIssue {
                        rule_code: "JOURNAL_IMBALANCED".to_string(),
                        severity: "error".to_string(),
                        message: format!("could not load lines for proposal {}: {e:#}", p.proposal_id),
                        erp_ref: None,
                        details: json!({"proposal_id": p.proposal_id}),
                        check_result_id: None,
                        run_id: ctx.run_id,
                    });
                    continue;
                }
            };
            let debit_total: Decimal = lines.iter().map(|l| l.debit).sum();
            let credit_total: Decimal = lines.iter().map(|l| l.credit).sum();
            let max_total = debit_total.max(credit_total).max(Decimal::ONE);
            if (debit_total - credit_total).abs() > max_total * Decimal::new(1, 2) {
                issues.push(NewValidationIssue {
                    rule_code: "JOURNAL_IMBALANCED".to_string(),
                    severity: "error".to_string(),
                    message: format!(
                        "proposal {} is imbalanced: debit={debit_total} credit={credit_total}",
                        p.proposal_id
                    ),
                    erp_ref: None,
                    details: json!({"proposal_id": p.proposal_id, "debit_total": debit_total, "credit_total": credit_total}),
                    check_result_id: None,
                    run_id: ctx.run_id,
                });
            }
        }

        // OVERDUE_INVOICE — one per unpaid invoice past due_date. Invoices
        // are read live from the ERP, never mirrored locally (§3: only
        // vouchers and bank txs are local mirror entities).
        match ctx.erpx.get_invoices(&period).await {
            Ok(records) => {
                let today = Utc::now().date_naive();
                for record in &records {
                    let Some(inv) = InvoiceFields::from_record(record) else { continue };
                    total_checks += 1;
                    let overdue = inv.status == "unpaid"
                        && inv
                            .due_date
                            .as_deref()
                            .and_then(|d| d.parse::<NaiveDate>().ok())
                            .is_some_and(|due| due < today);
                    if overdue {
                        issues.push(NewValidationIssue {
                            rule_code: "OVERDUE_INVOICE".to_string(),
                            severity: "warning".to_string(),
                            message: format!("invoice {} is unpaid and overdue", inv.invoice_no),
                            erp_ref: Some(inv.invoice_no),
                            details: json!({"due_date": inv.due_date, "amount": inv.amount}),
                            check_result_id: None,
                            run_id: ctx.run_id,
                        });
                    }
                }
            }
            Err(e) => issues.push(NewValidationIssue {
                rule_code: "OVERDUE_INVOICE".to_string(),
                severity: "error".to_string(),
                message: format!("could not fetch invoices for period {period}: {e}"),
                erp_ref: None,
                details: json!({}),
                check_result_id: None,
                run_id: ctx.run_id,
            }),
        }

        // DUPLICATE_VOUCHER — deterministic id-ascending pairing.
        let ids: Vec<_> = vouchers.iter().map(|v| v.id).collect();
        match voucher::find_duplicate_voucher_nos(&ctx.pool, &ids).await {
            Ok(pairs) => {
                for (id_a, id_b, voucher_no) in pairs {
                    total_checks += 1;
                    issues.push(NewValidationIssue {
                        rule_code: "DUPLICATE_VOUCHER".to_string(),
                        severity: "warning".to_string(),
                        message: format!("vouchers {id_a} and {id_b} share voucher_no {voucher_no}"),
                        erp_ref: Some(voucher_no),
                        details: json!({"id_a": id_a, "id_b": id_b}),
                        check_result_id: None,
                        run_id: ctx.run_id,
                    });
                }
            }
            Err(e) => return WorkflowOutcome::failed(vec![format!("find_duplicate_voucher_nos: {e:#}")]),
        }

        let errors_count = issues.iter().filter(|i| i.severity == "error").count() as i32;
        let warnings_count = issues.iter().filter(|i| i.severity == "warning").count() as i32;
        let passed = total_checks - errors_count - warnings_count;
        let score = if total_checks > 0 {
            Decimal::from(passed) / Decimal::from(total_checks)
        } else {
            Decimal::ONE
        };

        if let Err(e) = validation::insert_many(&ctx.pool, &issues).await {
            return WorkflowOutcome::failed(vec![format!("insert_many validation issues: {e:#}")]);
        }

        let result = NewSoftCheckResult {
            period: period.clone(),
            total_checks,
            passed,
            warnings: warnings_count,
            errors: errors_count,
            score,
            run_id: ctx.run_id,
        };
        if let Err(e) = soft_check::insert(&ctx.pool, &result).await {
            return WorkflowOutcome::failed(vec![format!("insert soft_check_result: {e:#}")]);
        }

        WorkflowOutcome::ok(
            json!({"period": period}),
            json!({
                "total_checks": total_checks,
                "passed": passed,
                "warnings": warnings_count,
                "errors": errors_count,
                "score": score,
            }),
        )
    }
}
