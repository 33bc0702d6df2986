//! `journal_suggestion`: fetch vouchers without a proposal yet, classify each
//! by the account-map rule table, write a pending proposal + 2 balanced
//! lines. Grounded on `original_source/.../flows/journal_suggestion.py`.

use async_trait::async_trait;
use serde_json::json;

use acct_db::journal::{self, NewJournalLine, NewJournalProposal};
use acct_db::voucher;

use crate::engine::{Workflow, WorkflowCtx, WorkflowOutcome};
use crate::rules::{account_map_entry, confidence_for};

pub struct JournalSuggestionWorkflow;

const FETCH_LIMIT: i64 = 500;

#[async_trait]
impl Workflow for JournalSuggestionWorkflow {
    fn run_type(&self) -> &'static str {
        "journal_suggestion"
    }

    async fn run(&self, ctx: &WorkflowCtx) -> WorkflowOutcome {
        let vouchers = match voucher::list_without_proposal(&ctx.pool, FETCH_LIMIT).await {
            Ok(v) => v,
            Err(e) => return WorkflowOutcome::failed(vec![format!("fetch vouchers: {e:#}")]),
        };

        if vouchers.is_empty() {
            return WorkflowOutcome::ok(json!({"since": ctx.cursor_in}), json!({"count_proposals": 0}));
        }

        let mut errors = Vec::new();
        let mut created = 0u64;

        for v in &vouchers {
            let entry = account_map_entry(&v.voucher_type);
            let confidence = confidence_for(&v.voucher_type, v.has_attachment);

            let description = match v.raw_payload.get("description").and_then(|d| d.as_str()) {
                Some(d) if !d.is_empty() => d.to_string(),
                _ => format!("{} {}", v.voucher_type, v.voucher_no),
            };

            let reasoning = format!(
                "rule table match on voucher_type={} (has_attachment={})",
                v.voucher_type, v.has_attachment
            );

            let proposal = NewJournalProposal {
                voucher_id: v.id,
                description,
                confidence,
                reasoning,
                run_id: ctx.run_id,
                lines: vec![
                    NewJournalLine {
                        account_code: entry.debit_code.to_string(),
                        account_name: entry.debit_name.to_string(),
                        debit: v.amount,
                        credit: rust_decimal::Decimal::ZERO,
                    },
                    NewJournalLine {
                        account_code: entry.credit_code.to_string(),
                        account_name: entry.credit_name.to_string(),
                        debit: rust_decimal::Decimal::ZERO,
                        credit: v.amount,
                    },
                ],
            };

            match journal::insert_proposal(&ctx.pool, &proposal).await {
                Ok(_) => created += 1,
                Err(e) => errors.push(format!("voucher {}: insert_proposal failed: {e:#}", v.id)),
            }
        }

        if !errors.is_empty() && created == 0 {
            return WorkflowOutcome::failed(errors);
        }

        WorkflowOutcome::ok(
            json!({"since": ctx.cursor_in}),
            json!({"count_proposals": created, "count_candidates": vouchers.len(), "errors": errors}),
        )
    }
}
