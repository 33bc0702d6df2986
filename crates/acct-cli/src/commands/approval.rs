//! `acct-cli approval decide` — record a maker-checker decision from the
//! terminal, going through the same `acct_approval::decide` entry point the
//! HTTP API's `POST /agent/v1/contract/proposals/:id/approvals` handler uses
//! (SPEC_FULL §4.6).

use acct_approval::{decide, ApprovalRequest, Decision};
use acct_audit::AuditWriter;
use anyhow::{anyhow, Result};
use sqlx::PgPool;
use uuid::Uuid;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    pool: &PgPool,
    audit: &mut AuditWriter,
    proposal_id: Uuid,
    approver_id: &str,
    decision: &str,
    evidence_ack: bool,
    idempotency_key: &str,
) -> Result<()> {
    let decision = Decision::parse(decision).ok_or_else(|| anyhow!("invalid --decision '{decision}', expected approve|reject"))?;

    let req = ApprovalRequest {
        proposal_id,
        approver_id: approver_id.to_string(),
        decision,
        evidence_ack,
        idempotency_key: idempotency_key.to_string(),
    };

    let decided = decide(pool, audit, &req).await.map_err(|e| anyhow!(e.to_string()))?;

    println!("proposal_id={}", proposal_id);
    println!("decision={}", decision.as_str());
    println!("proposal_status={}", decided.proposal_status);
    println!("replay={}", decided.replay);
    Ok(())
}
