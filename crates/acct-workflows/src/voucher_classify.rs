//! `voucher_classify`: assign a rule-based `classification_tag` to vouchers
//! that don't have one yet, from `(voucher_type, type_hint, description)`.

use async_trait::async_trait;
use serde_json::json;

use acct_db::voucher::{self, VoucherRow};

use crate::engine::{Workflow, WorkflowCtx, WorkflowOutcome};
use crate::parallel::map_concurrent;
use crate::rules::classification_tag;

pub struct VoucherClassifyWorkflow;

const FETCH_LIMIT: i64 = 500;

#[async_trait]
impl Workflow for VoucherClassifyWorkflow {
    fn run_type(&self) -> &'static str {
        "voucher_classify"
    }

    async fn run(&self, ctx: &WorkflowCtx) -> WorkflowOutcome {
        let vouchers = match voucher::list_unclassified(&ctx.pool, FETCH_LIMIT).await {
            Ok(v) => v,
            Err(e) => return WorkflowOutcome::failed(vec![format!("fetch unclassified vouchers: {e:#}")]),
        };

        if vouchers.is_empty() {
            return WorkflowOutcome::ok(json!({"since": ctx.cursor_in}), json!({"count_classified": 0}));
        }

        // Per-item concurrency per Design Note 9's `map(fn, items)`
        // reimplementation of the source's optional Ray executor — each
        // voucher's tag assignment is an independent row write.
        let results = map_concurrent(vouchers.clone(), |v: VoucherRow| async move {
            let description = v.raw_payload.get("description").and_then(|d| d.as_str());
            let tag = classification_tag(&v.voucher_type, v.type_hint.as_deref(), description);
            voucher::set_classification_tag(&ctx.pool, v.id, &tag)
                .await
                .map_err(|e| format!("voucher {}: set_classification_tag failed: {e:#}", v.id))
        })
        .await;

        let mut classified = 0u64;
        let mut errors = Vec::new();
        for r in results {
            match r {
                Ok(()) => classified += 1,
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() && classified == 0 {
            return WorkflowOutcome::failed(errors);
        }

        WorkflowOutcome::ok(
            json!({"since": ctx.cursor_in}),
            json!({"count_classified": classified, "count_candidates": vouchers.len(), "errors": errors}),
        )
    }
}
