//! Journal proposal + line rows (`journal_suggestion` workflow output).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewJournalLine {
    pub account_code: String,
    pub account_name: String,
    pub debit: Decimal,
    pub credit: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewJournalProposal {
    pub voucher_id: Uuid,
    pub description: String,
    pub confidence: Decimal,
    pub reasoning: String,
    pub run_id: Uuid,
    pub lines: Vec<NewJournalLine>,
}

#[derive(Debug, Clone)]
pub struct JournalProposalRow {
    pub proposal_id: Uuid,
    pub voucher_id: Uuid,
    pub description: String,
    pub confidence: Decimal,
    pub reasoning: String,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub run_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct JournalLineRow {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub account_code: String,
    pub account_name: String,
    pub debit: Decimal,
    pub credit: Decimal,
}

fn row_to_proposal(row: &sqlx::postgres::PgRow) -> Result<JournalProposalRow> {
    Ok(JournalProposalRow {
        proposal_id: row.try_get("proposal_id")?,
        voucher_id: row.try_get("voucher_id")?,
        description: row.try_get("description")?,
        confidence: row.try_get("confidence")?,
        reasoning: row.try_get("reasoning")?,
        status: row.try_get("status")?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        run_id: row.try_get("run_id")?,
    })
}

fn row_to_line(row: &sqlx::postgres::PgRow) -> Result<JournalLineRow> {
    Ok(JournalLineRow {
        id: row.try_get("id")?,
        proposal_id: row.try_get("proposal_id")?,
        account_code: row.try_get("account_code")?,
        account_name: row.try_get("account_name")?,
        debit: row.try_get("debit")?,
        credit: row.try_get("credit")?,
    })
}

/// Insert a proposal and its lines in one transaction. Caller (the
/// `journal_suggestion` workflow node) must have already verified
/// Σdebit = Σcredit (§3 invariant) — this function does not recompute it.
pub async fn insert_proposal(pool: &PgPool, p: &NewJournalProposal) -> Result<Uuid> {
    let proposal_id = Uuid::new_v4();
    let mut tx = pool.begin().await.context("insert_proposal begin tx failed")?;

    sqlx::query(
        r#"
        insert into journal_proposals
            (proposal_id, voucher_id, description, confidence, reasoning, status, run_id)
        values ($1, $2, $3, $4, $5, 'pending', $6)
        "#,
    )
    .bind(proposal_id)
    .bind(p.voucher_id)
    .bind(&p.description)
    .bind(p.confidence)
    .bind(&p.reasoning)
    .bind(p.run_id)
    .execute(&mut *tx)
    .await
    .context("insert journal_proposals failed")?;

    for line in &p.lines {
        sqlx::query(
            r#"
            insert into journal_proposal_lines (id, proposal_id, account_code, account_name, debit, credit)
            values ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(proposal_id)
        .bind(&line.account_code)
        .bind(&line.account_name)
        .bind(line.debit)
        .bind(line.credit)
        .execute(&mut *tx)
        .await
        .context("insert journal_proposal_lines failed")?;
    }

    tx.commit().await.context("insert_proposal commit failed")?;
    Ok(proposal_id)
}

pub async fn fetch_proposal(pool: &PgPool, proposal_id: Uuid) -> Result<JournalProposalRow> {
    let row = sqlx::query("select * from journal_proposals where proposal_id = $1")
        .bind(proposal_id)
        .fetch_one(pool)
        .await
        .context("fetch_proposal failed")?;
    row_to_proposal(&row)
}

pub async fn fetch_lines(pool: &PgPool, proposal_id: Uuid) -> Result<Vec<JournalLineRow>> {
    let rows = sqlx::query("select * from journal_proposal_lines where proposal_id = $1 order by id")
        .bind(proposal_id)
        .fetch_all(pool)
        .await
        .context("fetch_lines failed")?;
    rows.iter().map(row_to_line).collect()
}

pub struct JournalFilter {
    pub run_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_proposals(pool: &PgPool, f: &JournalFilter) -> Result<Vec<JournalProposalRow>> {
    let rows = sqlx::query(
        r#"
        select * from journal_proposals
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
    .context("list_proposals failed")?;
    rows.iter().map(row_to_proposal).collect()
}

/// Review transition pending → {approved, rejected}. Terminal after.
pub async fn review(pool: &PgPool, proposal_id: Uuid, status: &str, reviewed_by: &str) -> Result<()> {
    sqlx::query(
        r#"
        update journal_proposals
           set status = $2, reviewed_by = $3, reviewed_at = now()
         where proposal_id = $1 and status = 'pending'
        "#,
    )
    .bind(proposal_id)
    .bind(status)
    .bind(reviewed_by)
    .execute(pool)
    .await
    .context("journal proposal review failed")?;
    Ok(())
}
