//! Maker-checker approval engine (SPEC_FULL §4.6).
//!
//! Grounded on the teacher's `mqk-reconcile::gate` pattern of enums that carry
//! their own evidence (`ArmStartGate::Blocked { report }`, generalized here to
//! `ApprovalError` variants), and on `acct-db`'s unique-index idempotent-insert
//! idiom used elsewhere for run creation. `decide` is the single entry point;
//! every other crate (the HTTP API, the CLI) calls through it rather than
//! touching `acct_db::contract_proposal`/`acct_db::approval` directly, so the
//! validation order and the audit-log side effect can never be skipped.

use acct_audit::AuditWriter;
use acct_db::{contract_proposal, is_unique_constraint_violation};
use anyhow::anyhow;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub use acct_db::approval::ApprovalDecisionRow;

const IDEMPOTENCY_KEY_CONSTRAINT: &str = "approval_decisions_idempotency_key_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(Decision::Approve),
            "reject" => Some(Decision::Reject),
            _ => None,
        }
    }

    fn terminal_status(&self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub proposal_id: Uuid,
    pub approver_id: String,
    pub decision: Decision,
    pub evidence_ack: bool,
    pub idempotency_key: String,
}

/// Outcome of a successful `decide` call — either a fresh decision or the
/// replayed prior one (§4.6 step 4, §8 property 5).
#[derive(Debug, Clone)]
pub struct ApprovalDecided {
    pub approval: ApprovalDecisionRow,
    pub proposal_status: String,
    pub replay: bool,
}

/// Typed failure source for `acct-api`'s `AppError::From` conversions (§7).
#[derive(Debug)]
pub enum ApprovalError {
    MissingEvidenceAck,
    MakerIsChecker,
    AlreadyTerminal { proposal_id: Uuid, status: String },
    ProposalNotFound,
    Storage(anyhow::Error),
}

impl std::fmt::Display for ApprovalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalError::MissingEvidenceAck => write!(f, "evidence_ack is required to approve"),
            ApprovalError::MakerIsChecker => write!(f, "approver is also the proposal's creator"),
            ApprovalError::AlreadyTerminal { proposal_id, status } => {
                write!(f, "proposal {proposal_id} is already {status}")
            }
            ApprovalError::ProposalNotFound => write!(f, "proposal not found"),
            ApprovalError::Storage(e) => write!(f, "approval storage error: {e}"),
        }
    }
}

impl std::error::Error for ApprovalError {}

impl From<anyhow::Error> for ApprovalError {
    fn from(e: anyhow::Error) -> Self {
        ApprovalError::Storage(e)
    }
}

fn is_terminal(status: &str) -> bool {
    matches!(status, "approved" | "rejected")
}

/// Validate and record one approval decision (§4.6 validation order 1-5).
///
/// Idempotency-key replay is checked immediately after the evidence-ack
/// check, ahead of the terminal-state check — otherwise a retried request for
/// a proposal the *first* call already finalized would trip the
/// terminal-state guard instead of returning the prior decision, breaking
/// §8 property 5 (idempotent replay) for the common case where replay
/// happens after the proposal has already gone terminal. The literal
/// ordering in §4.6 ("3 before 4") holds for any *new* key; a matching key
/// always short-circuits regardless of proposal state.
pub async fn decide(
    pool: &PgPool,
    audit: &mut AuditWriter,
    req: &ApprovalRequest,
) -> Result<ApprovalDecided, ApprovalError> {
    if req.decision == Decision::Approve && !req.evidence_ack {
        audit_rejection(audit, req, "missing_evidence_ack").await;
        return Err(ApprovalError::MissingEvidenceAck);
    }

    if let Some(prior) = acct_db::approval::fetch_by_idempotency_key(pool, &req.idempotency_key).await? {
        let proposal = contract_proposal::fetch(pool, req.proposal_id).await?;
        return Ok(ApprovalDecided { approval: prior, proposal_status: proposal.status, replay: true });
    }

    let mut tx = pool.begin().await.map_err(anyhow::Error::from)?;

    let proposal = match contract_proposal::fetch_for_update(&mut tx, req.proposal_id).await {
        Ok(p) => p,
        Err(_) => {
            drop(tx);
            audit_rejection(audit, req, "proposal_not_found").await;
            return Err(ApprovalError::ProposalNotFound);
        }
    };

    if req.approver_id == proposal.created_by {
        drop(tx);
        audit_rejection(audit, req, "maker_is_checker").await;
        return Err(ApprovalError::MakerIsChecker);
    }

    if is_terminal(&proposal.status) {
        drop(tx);
        audit_rejection(audit, req, "already_terminal").await;
        return Err(ApprovalError::AlreadyTerminal { proposal_id: req.proposal_id, status: proposal.status });
    }

    let insert_result = acct_db::approval::insert(
        &mut tx,
        req.proposal_id,
        &req.approver_id,
        req.decision.as_str(),
        req.evidence_ack,
        &req.idempotency_key,
        &req.approver_id,
    )
    .await;

    let approval_row = match insert_result {
        Ok(row) => row,
        Err(e) => {
            drop(tx);
            if let Some(sqlx_err) = e.chain().find_map(|cause| cause.downcast_ref::<sqlx::Error>()) {
                if is_unique_constraint_violation(sqlx_err, IDEMPOTENCY_KEY_CONSTRAINT) {
                    // Lost a race against another request using the same key;
                    // the winner already committed, so replay its row.
                    let prior = acct_db::approval::fetch_by_idempotency_key(pool, &req.idempotency_key)
                        .await?
                        .ok_or_else(|| anyhow!("idempotency race lost but no row to replay"))?;
                    let proposal = contract_proposal::fetch(pool, req.proposal_id).await?;
                    return Ok(ApprovalDecided { approval: prior, proposal_status: proposal.status, replay: true });
                }
            }
            return Err(ApprovalError::Storage(e));
        }
    };

    let terminal_status = req.decision.terminal_status();
    contract_proposal::transition_terminal(&mut tx, req.proposal_id, terminal_status).await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    audit
        .append(
            &req.approver_id,
            req.decision.as_str(),
            "contract_proposal",
            &req.proposal_id.to_string(),
            json!({ "idempotency_key": req.idempotency_key, "evidence_ack": req.evidence_ack }),
        )
        .await?;

    Ok(ApprovalDecided { approval: approval_row, proposal_status: terminal_status.to_string(), replay: false })
}

async fn audit_rejection(audit: &mut AuditWriter, req: &ApprovalRequest, reason: &str) {
    let _ = audit
        .append(
            &req.approver_id,
            "approval_rejected",
            "contract_proposal",
            &req.proposal_id.to_string(),
            json!({ "idempotency_key": req.idempotency_key, "reason": reason }),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_round_trips_through_as_str_and_parse() {
        assert_eq!(Decision::parse("approve"), Some(Decision::Approve));
        assert_eq!(Decision::parse("reject"), Some(Decision::Reject));
        assert_eq!(Decision::parse("whatever"), None);
        assert_eq!(Decision::Approve.as_str(), "approve");
        assert_eq!(Decision::Reject.terminal_status(), "rejected");
    }

    #[test]
    fn terminal_states_are_approved_and_rejected_only() {
        assert!(is_terminal("approved"));
        assert!(is_terminal("rejected"));
        assert!(!is_terminal("draft"));
        assert!(!is_terminal("under_review"));
    }
}
