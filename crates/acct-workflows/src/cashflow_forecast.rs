//! `cashflow_forecast`: project a 30-day cash-in/cash-out forecast from live
//! unpaid invoices and the local bank-transaction mirror's recent history.
//! Grounded on `original_source/.../flows/cashflow_forecast.py`.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;

use acct_db::bank_tx::{self, BankTxFilter};
use acct_db::cashflow::{self, NewCashflowRow};
use acct_schemas::InvoiceFields;

use crate::engine::{Workflow, WorkflowCtx, WorkflowOutcome};

pub struct CashflowForecastWorkflow;

const HORIZON_DAYS: i64 = 30;
const RECURRING_PROJECTION_DAYS: i64 = 15;
const BANK_TX_FETCH_LIMIT: i64 = 1000;

#[async_trait]
impl Workflow for CashflowForecastWorkflow {
    fn run_type(&self) -> &'static str {
        "cashflow_forecast"
    }

    async fn run(&self, ctx: &WorkflowCtx) -> WorkflowOutcome {
        let period = ctx.cursor_in.get("period").and_then(|v| v.as_str()).unwrap_or("this_month");

        let invoices = match ctx.erpx.get_invoices(period).await {
            Ok(r) => r,
            Err(e) => return WorkflowOutcome::failed(vec![format!("fetch erp invoices: {e}")]),
        };

        let bank_txs = match bank_tx::list(
            &ctx.pool,
            &BankTxFilter { run_id: None, match_status: None, limit: BANK_TX_FETCH_LIMIT, offset: 0 },
        )
        .await
        {
            Ok(t) => t,
            Err(e) => return WorkflowOutcome::failed(vec![format!("fetch bank txs: {e:#}")]),
        };

        if invoices.is_empty() && bank_txs.is_empty() {
            return WorkflowOutcome::ok(json!({"period": period}), json!({"forecast_items": 0}));
        }

        let today = Utc::now().date_naive();
        let cutoff = today + Duration::days(HORIZON_DAYS);
        let mut rows = Vec::new();

        for record in &invoices {
            let Some(inv) = InvoiceFields::from_record(record) else { continue };
            if inv.status != "unpaid" {
                continue;
            }
            let Some(due) = inv.due_date.as_deref().and_then(|d| d.parse::<NaiveDate>().ok()) else { continue };
            if due > cutoff {
                continue;
            }
            let forecast_date = due.max(today);
            let (direction, source_type) = if inv.inv_type == "sell" {
                ("inflow", "invoice_receivable")
            } else {
                ("outflow", "invoice_payable")
            };
            let confidence = if due >= today { Decimal::new(8, 1) } else { Decimal::new(6, 1) };

            rows.push(NewCashflowRow {
                forecast_date,
                direction: direction.to_string(),
                amount: inv.amount,
                currency: "VND".to_string(),
                source_type: source_type.to_string(),
                source_ref: Some(inv.invoice_no),
                confidence,
                run_id: ctx.run_id,
            });
        }

        // Recurring-pattern detection: same rounded amount for a counterparty
        // at least twice across the fetched window projects a recurring row.
        let mut by_counterparty: HashMap<String, Vec<Decimal>> = HashMap::new();
        for t in &bank_txs {
            let key = t.counterparty.clone().or_else(|| t.memo.clone()).unwrap_or_else(|| "unknown".to_string());
            by_counterparty.entry(key).or_default().push(t.amount);
        }

        let mut counterparties: Vec<_> = by_counterparty.into_iter().collect();
        counterparties.sort_by(|a, b| a.0.cmp(&b.0));

        for (counterparty, amounts) in counterparties {
            if amounts.len() < 2 {
                continue;
            }
            let mut rounded_counts: HashMap<Decimal, u32> = HashMap::new();
            for a in &amounts {
                *rounded_counts.entry(a.round()).or_insert(0) += 1;
            }
            let mut rounded: Vec<_> = rounded_counts.into_iter().collect();
            rounded.sort_by(|a, b| a.0.cmp(&b.0));

            for (rounded_amt, count) in rounded {
                if count >= 2 && !rounded_amt.is_zero() {
                    let direction = if rounded_amt.is_sign_positive() { "inflow" } else { "outflow" };
                    rows.push(NewCashflowRow {
                        forecast_date: today + Duration::days(RECURRING_PROJECTION_DAYS),
                        direction: direction.to_string(),
                        amount: rounded_amt.abs(),
                        currency: "VND".to_string(),
                        source_type: "recurring".to_string(),
                        source_ref: Some(counterparty.chars().take(128).collect()),
                        confidence: Decimal::new(5, 1),
                        run_id: ctx.run_id,
                    });
                }
            }
        }

        let forecast_items = rows.len();
        let total_inflow: Decimal = rows.iter().filter(|r| r.direction == "inflow").map(|r| r.amount).sum();
        let total_outflow: Decimal = rows.iter().filter(|r| r.direction == "outflow").map(|r| r.amount).sum();

        if let Err(e) = cashflow::insert_many(&ctx.pool, &rows).await {
            return WorkflowOutcome::failed(vec![format!("insert_many cashflow rows: {e:#}")]);
        }

        WorkflowOutcome::ok(
            json!({"period": period}),
            json!({
                "forecast_items": forecast_items,
                "total_inflow": total_inflow,
                "total_outflow": total_outflow,
                "net": total_inflow - total_outflow,
                "horizon_days": HORIZON_DAYS,
            }),
        )
    }
}
