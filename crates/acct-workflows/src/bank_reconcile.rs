//! `bank_reconcile`: score unmatched bank transactions against vouchers and
//! write match decisions (SPEC_FULL §4.3.1). Iteration is over sorted `Vec`s
//! throughout — no hash-map order — so reruns with identical inputs produce
//! identical matches (§8 property: idempotent rerun).

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;

use acct_db::bank_tx::{self, BankTxRow, MatchStatus, NewBankTx};
use acct_db::voucher::{self, VoucherRow};
use acct_schemas::BankTransactionFields;

use crate::engine::{Workflow, WorkflowCtx, WorkflowOutcome};
use crate::parallel::{chunk, map_concurrent};
use crate::rules::string_similarity;

pub struct BankReconcileWorkflow;

const FETCH_LIMIT: i64 = 1000;
const MATCH_THRESHOLD: f64 = 0.85;
const MARGIN_THRESHOLD: f64 = 0.05;
const AMOUNT_TOLERANCE: f64 = 0.01;
const ANOMALY_TOLERANCE: f64 = 0.05;

#[async_trait]
impl Workflow for BankReconcileWorkflow {
    fn run_type(&self) -> &'static str {
        "bank_reconcile"
    }

    async fn run(&self, ctx: &WorkflowCtx) -> WorkflowOutcome {
        let updated_after = ctx.cursor_in.get("updated_after").and_then(|v| v.as_str());
        let erp_records = match ctx.erpx.get_bank_transactions(updated_after).await {
            Ok(r) => r,
            Err(e) => return WorkflowOutcome::failed(vec![format!("fetch erp bank transactions: {e}")]),
        };

        let mut ingest_errors = Vec::new();
        for record in &erp_records {
            let Some(fields) = BankTransactionFields::from_record(record) else {
                ingest_errors.push("bank tx record missing required fields, skipped".to_string());
                continue;
            };
            let Ok(date) = fields.date.parse::<NaiveDate>() else {
                ingest_errors.push(format!("bank tx {} has unparseable date, skipped", fields.bank_tx_ref));
                continue;
            };
            if let Err(e) = bank_tx::insert_if_absent(
                &ctx.pool,
                &NewBankTx {
                    bank_tx_ref: fields.bank_tx_ref,
                    bank_account: fields.bank_account,
                    date,
                    amount: fields.amount,
                    currency: fields.currency,
                    counterparty: fields.counterparty,
                    memo: fields.memo,
                    run_id: ctx.run_id,
                },
            )
            .await
            {
                ingest_errors.push(format!("bank tx mirror insert failed: {e:#}"));
            }
        }

        let txs = match bank_tx::list_unmatched(&ctx.pool, FETCH_LIMIT).await {
            Ok(t) => t,
            Err(e) => return WorkflowOutcome::failed(vec![format!("fetch bank txs: {e:#}")]),
        };

        if txs.is_empty() {
            return WorkflowOutcome::ok(
                json!({"since": ctx.cursor_in}),
                json!({"count_matched": 0, "ingest_errors": ingest_errors}),
            );
        }

        let vouchers = match voucher::list(
            &ctx.pool,
            &voucher::VoucherFilter { run_id: None, limit: 5000, offset: 0 },
        )
        .await
        {
            Ok(v) => v,
            Err(e) => return WorkflowOutcome::failed(vec![format!("fetch vouchers: {e:#}")]),
        };

        let mut matched = 0u64;
        let mut anomalies = 0u64;
        let mut unmatched = 0u64;
        let mut errors = ingest_errors;

        // Chunk granularity ~100 per Design Note 9's `map(fn, items)`
        // reimplementation of the source's optional Ray executor; each
        // chunk's set_match calls run concurrently, chunks run in sequence.
        // Every tx's decision is computed independently from the already-
        // fetched `vouchers` snapshot, so result order never affects the
        // match set (§8 "reconciliation determinism").
        for batch in chunk(txs) {
            let results = map_concurrent(batch, |t: BankTxRow| async move {
                let decision = reconcile_one(&t, &vouchers);
                apply_decision(&ctx.pool, &t, decision).await
            })
            .await;

            for r in results {
                match r {
                    ApplyResult::Matched => matched += 1,
                    ApplyResult::Anomaly => anomalies += 1,
                    ApplyResult::Unmatched => unmatched += 1,
                    ApplyResult::Error(e) => errors.push(e),
                }
            }
        }

        if !errors.is_empty() && matched + anomalies + unmatched == 0 {
            return WorkflowOutcome::failed(errors);
        }

        WorkflowOutcome::ok(
            json!({"since": ctx.cursor_in}),
            json!({
                "count_matched": matched,
                "count_anomaly": anomalies,
                "count_unmatched": unmatched,
                "errors": errors,
            }),
        )
    }
}

enum Decision<'a> {
    Matched(&'a VoucherRow),
    Anomaly,
    Unmatched,
}

enum ApplyResult {
    Matched,
    Anomaly,
    Unmatched,
    Error(String),
}

async fn apply_decision(pool: &sqlx::PgPool, t: &BankTxRow, decision: Decision<'_>) -> ApplyResult {
    let result = match &decision {
        Decision::Matched(v) => bank_tx::set_match(pool, t.id, MatchStatus::Matched, Some(v.id)).await,
        Decision::Anomaly => bank_tx::set_match(pool, t.id, MatchStatus::Anomaly, None).await,
        Decision::Unmatched => bank_tx::set_match(pool, t.id, MatchStatus::Unmatched, None).await,
    };
    match result {
        Ok(()) => match decision {
            Decision::Matched(_) => ApplyResult::Matched,
            Decision::Anomaly => ApplyResult::Anomaly,
            Decision::Unmatched => ApplyResult::Unmatched,
        },
        Err(e) => ApplyResult::Error(format!("bank_tx {}: set_match failed: {e:#}", t.id)),
    }
}

fn reconcile_one<'a>(t: &BankTxRow, vouchers: &'a [VoucherRow]) -> Decision<'a> {
    let mut candidates: Vec<(&VoucherRow, f64)> = vouchers
        .iter()
        .filter(|v| v.currency == t.currency)
        .filter(|v| amount_within(t.amount, v.amount, AMOUNT_TOLERANCE))
        .map(|v| (v, score(t, v)))
        .collect();

    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.id.cmp(&b.0.id)));

    match candidates.as_slice() {
        [] => {
            // No candidate within 1%, but §4.3.1 still marks a near-miss an
            // anomaly rather than unmatched: "if any voucher within 5% but
            // none >= θ". Since none are within 1% here, check the wider band.
            let near_miss = vouchers
                .iter()
                .any(|v| v.currency == t.currency && amount_within(t.amount, v.amount, ANOMALY_TOLERANCE));
            if near_miss {
                Decision::Anomaly
            } else {
                Decision::Unmatched
            }
        }
        [(only, score)] => {
            if *score >= MATCH_THRESHOLD {
                Decision::Matched(only)
            } else {
                Decision::Anomaly
            }
        }
        [(top, top_score), (_, runner_up), ..] => {
            if *top_score >= MATCH_THRESHOLD && (top_score - runner_up) >= MARGIN_THRESHOLD {
                Decision::Matched(top)
            } else if *top_score >= MATCH_THRESHOLD {
                // Top candidate clears θ but the margin over the runner-up
                // doesn't; §4.3.1's anomaly branch only fires when none of
                // the candidates reach θ, so an ambiguous-but-qualifying
                // match falls through to unmatched instead.
                Decision::Unmatched
            } else {
                Decision::Anomaly
            }
        }
    }
}

fn amount_within(a: Decimal, b: Decimal, tolerance: f64) -> bool {
    let denom = a.abs().max(Decimal::ONE);
    ((a - b).abs() / denom).to_f64().unwrap_or(f64::MAX) <= tolerance
}

fn amount_proximity(a: Decimal, b: Decimal) -> f64 {
    let denom = a.abs().max(Decimal::ONE);
    let ratio = ((a - b).abs() / denom).to_f64().unwrap_or(1.0);
    (1.0 - ratio).clamp(0.0, 1.0)
}

fn date_proximity(a: NaiveDate, b: NaiveDate) -> f64 {
    let delta_days = (a - b).num_days().unsigned_abs() as f64;
    (-delta_days / 7.0).exp()
}

fn score(t: &BankTxRow, v: &VoucherRow) -> f64 {
    let amount = amount_proximity(t.amount, v.amount);
    let date = date_proximity(t.date, v.date);
    let name = string_similarity(t.counterparty.as_deref().unwrap_or(""), v.partner_name.as_deref().unwrap_or(""));
    0.6 * amount + 0.3 * date + 0.1 * name
}
