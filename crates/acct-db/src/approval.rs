//! Approval decision rows (§3, §4.6). All mutation happens inside the
//! maker-checker engine's single transaction in `acct-approval`; this module
//! only exposes the raw inserts/reads it composes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ApprovalDecisionRow {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub approver_id: String,
    pub decision: String,
    pub evidence_ack: bool,
    pub decided_at: DateTime<Utc>,
    pub idempotency_key: String,
    pub actor_user_id: String,
}

fn row_to_decision(row: &sqlx::postgres::PgRow) -> Result<ApprovalDecisionRow> {
    Ok(ApprovalDecisionRow {
        id: row.try_get("id")?,
        proposal_id: row.try_get("proposal_id")?,
        approver_id: row.try_get("approver_id")?,
        decision: row.try_get("decision")?,
        evidence_ack: row.try_get("evidence_ack")?,
        decided_at: row.try_get("decided_at")?,
        idempotency_key: row.try_get("idempotency_key")?,
        actor_user_id: row.try_get("actor_user_id")?,
    })
}

pub async fn fetch_by_idempotency_key(pool: &PgPool, key: &str) -> Result<Option<ApprovalDecisionRow>> {
    let row = sqlx::query("select * from approval_decisions where idempotency_key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("approval fetch_by_idempotency_key failed")?;
    row.as_ref().map(row_to_decision).transpose()
}

/// Must run inside the same transaction as the proposal's terminal
/// transition (§4.6 step 5). The unique index on `idempotency_key` is the
/// concurrency guard: a racing duplicate insert fails with a constraint
/// violation the caller maps to "return the prior row" (§4.6 step 4).
pub async fn insert<'e>(
    tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
    proposal_id: Uuid,
    approver_id: &str,
    decision: &str,
    evidence_ack: bool,
    idempotency_key: &str,
    actor_user_id: &str,
) -> Result<ApprovalDecisionRow> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        insert into approval_decisions
            (id, proposal_id, approver_id, decision, evidence_ack, idempotency_key, actor_user_id)
        values ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(proposal_id)
    .bind(approver_id)
    .bind(decision)
    .bind(evidence_ack)
    .bind(idempotency_key)
    .bind(actor_user_id)
    .execute(&mut **tx)
    .await
    .context("approval insert failed")?;

    let row = sqlx::query("select * from approval_decisions where id = $1")
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .context("approval fetch-after-insert failed")?;
    row_to_decision(&row)
}
