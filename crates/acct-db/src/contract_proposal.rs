//! Contract proposal rows — the maker-checker target entity (§3, §4.6).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewContractProposal {
    pub case_id: String,
    pub obligation_id: Option<String>,
    pub proposal_type: String,
    pub title: String,
    pub summary: String,
    pub details: Value,
    pub risk_level: String,
    pub confidence: Decimal,
    pub created_by: String,
    pub tier: i16,
    pub evidence_summary_hash: String,
    pub proposal_key: String,
    pub run_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ContractProposalRow {
    pub proposal_id: Uuid,
    pub case_id: String,
    pub obligation_id: Option<String>,
    pub proposal_type: String,
    pub title: String,
    pub summary: String,
    pub details: Value,
    pub risk_level: String,
    pub confidence: Decimal,
    pub status: String,
    pub created_by: String,
    pub tier: i16,
    pub evidence_summary_hash: String,
    pub proposal_key: String,
    pub run_id: Option<Uuid>,
}

fn row_to_proposal(row: &sqlx::postgres::PgRow) -> Result<ContractProposalRow> {
    Ok(ContractProposalRow {
        proposal_id: row.try_get("proposal_id")?,
        case_id: row.try_get("case_id")?,
        obligation_id: row.try_get("obligation_id")?,
        proposal_type: row.try_get("proposal_type")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        details: row.try_get("details")?,
        risk_level: row.try_get("risk_level")?,
        confidence: row.try_get("confidence")?,
        status: row.try_get("status")?,
        created_by: row.try_get("created_by")?,
        tier: row.try_get("tier")?,
        evidence_summary_hash: row.try_get("evidence_summary_hash")?,
        proposal_key: row.try_get("proposal_key")?,
        run_id: row.try_get("run_id")?,
    })
}

/// `proposal_key` insert-if-absent (dedup per logical target, §3).
pub async fn insert_if_absent(pool: &PgPool, p: &NewContractProposal) -> Result<(ContractProposalRow, bool)> {
    let proposal_id = Uuid::new_v4();
    let inserted = sqlx::query(
        r#"
        insert into contract_proposals
            (proposal_id, case_id, obligation_id, proposal_type, title, summary, details,
             risk_level, confidence, status, created_by, tier, evidence_summary_hash,
             proposal_key, run_id)
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'draft', $10, $11, $12, $13, $14)
        on conflict (proposal_key) do nothing
        "#,
    )
    .bind(proposal_id)
    .bind(&p.case_id)
    .bind(&p.obligation_id)
    .bind(&p.proposal_type)
    .bind(&p.title)
    .bind(&p.summary)
    .bind(&p.details)
    .bind(&p.risk_level)
    .bind(p.confidence)
    .bind(&p.created_by)
    .bind(p.tier)
    .bind(&p.evidence_summary_hash)
    .bind(&p.proposal_key)
    .bind(p.run_id)
    .execute(pool)
    .await
    .context("contract proposal insert_if_absent failed")?
    .rows_affected()
        > 0;

    let row = sqlx::query("select * from contract_proposals where proposal_key = $1")
        .bind(&p.proposal_key)
        .fetch_one(pool)
        .await
        .context("contract proposal fetch-after-insert failed")?;

    Ok((row_to_proposal(&row)?, inserted))
}

pub async fn fetch(pool: &PgPool, proposal_id: Uuid) -> Result<ContractProposalRow> {
    let row = sqlx::query("select * from contract_proposals where proposal_id = $1")
        .bind(proposal_id)
        .fetch_one(pool)
        .await
        .context("contract proposal fetch failed")?;
    row_to_proposal(&row)
}

/// Row-locking fetch used inside the approval transaction (§4.6 concurrency:
/// "row-level locking on the proposal row" — exactly one concurrent approver
/// wins the terminal transition).
pub async fn fetch_for_update<'e>(
    tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
    proposal_id: Uuid,
) -> Result<ContractProposalRow> {
    let row = sqlx::query("select * from contract_proposals where proposal_id = $1 for update")
        .bind(proposal_id)
        .fetch_one(&mut **tx)
        .await
        .context("contract proposal fetch_for_update failed")?;
    row_to_proposal(&row)
}

pub async fn transition_terminal<'e>(
    tx: &mut sqlx::Transaction<'e, sqlx::Postgres>,
    proposal_id: Uuid,
    status: &str,
) -> Result<()> {
    sqlx::query("update contract_proposals set status = $2 where proposal_id = $1")
        .bind(proposal_id)
        .bind(status)
        .execute(&mut **tx)
        .await
        .context("contract proposal transition_terminal failed")?;
    Ok(())
}

pub struct ContractProposalFilter {
    pub run_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list(pool: &PgPool, f: &ContractProposalFilter) -> Result<Vec<ContractProposalRow>> {
    let rows = sqlx::query(
        r#"
        select * from contract_proposals
        where ($1::uuid is null or run_id = $1)
          and ($2::text is null or status = $2)
        order by created_at desc
        limit $3 offset $4
        "#,
    )
    .bind(f.run_id)
    .bind(&f.status)
    .bind(f.limit)
    .bind(f.offset)
    .fetch_all(pool)
    .await
    .context("contract proposal list failed")?;
    rows.iter().map(row_to_proposal).collect()
}
