//! `tax_report`: summarize VAT in/out/payable from live ERP invoices and a
//! trial-balance-style debit/credit split from the voucher mirror, each
//! written as a versioned snapshot (§4.2). Grounded on
//! `original_source/.../flows/tax_report.py`.

use std::path::PathBuf;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use acct_artifacts::SnapshotExport;
use acct_db::snapshot::{self, ReportSnapshotRow};
use acct_db::voucher::{self, VoucherFilter};
use acct_schemas::InvoiceFields;

use crate::engine::{Workflow, WorkflowCtx, WorkflowOutcome};

pub struct TaxReportWorkflow;

const DEFAULT_VAT_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2); // 0.08
const FETCH_LIMIT: i64 = 5000;

/// Best-effort side-car export (SPEC_FULL §4.2, glossary "Run manifest"):
/// writes the snapshot's summary under `ACCT_EXPORTS_ROOT` (default
/// `./exports`) and attaches the resulting `file_uri` to the row already
/// committed by `insert_next_version`. Failure here never fails the
/// workflow — the DB row is the source of truth, the export is a pointer.
async fn export_side_car(pool: &sqlx::PgPool, run_id: Uuid, row: &ReportSnapshotRow) {
    let exports_root = std::env::var("ACCT_EXPORTS_ROOT").unwrap_or_else(|_| "./exports".to_string());
    let export = SnapshotExport {
        report_type: &row.report_type,
        period: &row.period,
        version: row.version,
        run_id,
        summary: row.summary_json.clone(),
    };
    match acct_artifacts::export_snapshot_file(&PathBuf::from(&exports_root), &export) {
        Ok(uri) => {
            if let Err(e) = snapshot::update_file_uri(pool, row.id, &uri).await {
                warn!(run_id = %run_id, snapshot_id = %row.id, error = %e, "tax_report: update_file_uri failed");
            }
        }
        Err(e) => {
            warn!(run_id = %run_id, report_type = %row.report_type, period = %row.period, error = %e, "tax_report: export_snapshot_file failed");
        }
    }
}

#[async_trait]
impl Workflow for TaxReportWorkflow {
    fn run_type(&self) -> &'static str {
        "tax_report"
    }

    async fn run(&self, ctx: &WorkflowCtx) -> WorkflowOutcome {
        let period = match ctx.cursor_in.get("period").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return WorkflowOutcome::failed(vec!["tax_report requires cursor_in.period".to_string()]),
        };

        let invoices = match ctx.erpx.get_invoices(&period).await {
            Ok(r) => r,
            Err(e) => return WorkflowOutcome::failed(vec![format!("fetch erp invoices: {e}")]),
        };

        let vouchers = match voucher::list(&ctx.pool, &VoucherFilter { run_id: None, limit: FETCH_LIMIT, offset: 0 }).await
        {
            Ok(v) => v,
            Err(e) => return WorkflowOutcome::failed(vec![format!("fetch vouchers: {e:#}")]),
        };

        let mut total_revenue = Decimal::ZERO;
        let mut total_vat_out = Decimal::ZERO;
        let mut total_purchase = Decimal::ZERO;
        let mut total_vat_in = Decimal::ZERO;
        let mut sell_count = 0i64;
        let mut buy_count = 0i64;

        for record in &invoices {
            let Some(inv) = InvoiceFields::from_record(record) else { continue };
            let vat = if inv.vat_amount.is_zero() { inv.amount * DEFAULT_VAT_RATE } else { inv.vat_amount };
            if inv.inv_type == "sell" {
                total_revenue += inv.amount;
                total_vat_out += vat;
                sell_count += 1;
            } else {
                total_purchase += inv.amount;
                total_vat_in += vat;
                buy_count += 1;
            }
        }
        let vat_payable = total_vat_out - total_vat_in;

        let vat_summary = json!({
            "period": period,
            "sell_invoices": sell_count,
            "buy_invoices": buy_count,
            "total_revenue": total_revenue,
            "total_vat_out": total_vat_out,
            "total_purchase": total_purchase,
            "total_vat_in": total_vat_in,
            "vat_payable": vat_payable,
        });

        let vat_snapshot = match snapshot::insert_next_version(&ctx.pool, "vat_list", &period, None, vat_summary.clone(), ctx.run_id).await {
            Ok(s) => s,
            Err(e) => return WorkflowOutcome::failed(vec![format!("insert vat_list snapshot: {e:#}")]),
        };
        export_side_car(&ctx.pool, ctx.run_id, &vat_snapshot).await;

        let mut total_debit = Decimal::ZERO;
        let mut total_credit = Decimal::ZERO;
        for v in &vouchers {
            match v.voucher_type.as_str() {
                "sell_invoice" | "receipt" => total_debit += v.amount,
                _ => total_credit += v.amount,
            }
        }

        let tb_summary = json!({
            "period": period,
            "total_debit": total_debit,
            "total_credit": total_credit,
            "balance": total_debit - total_credit,
            "voucher_count": vouchers.len(),
        });

        let tb_snapshot = match snapshot::insert_next_version(&ctx.pool, "trial_balance", &period, None, tb_summary.clone(), ctx.run_id).await
        {
            Ok(s) => s,
            Err(e) => return WorkflowOutcome::failed(vec![format!("insert trial_balance snapshot: {e:#}")]),
        };
        export_side_car(&ctx.pool, ctx.run_id, &tb_snapshot).await;

        WorkflowOutcome::ok(
            json!({"period": period}),
            json!({
                "period": period,
                "vat_summary": vat_summary,
                "vat_snapshot_version": vat_snapshot.version,
                "trial_balance": tb_summary,
                "trial_balance_version": tb_snapshot.version,
                "snapshots_created": 2,
            }),
        )
    }
}
