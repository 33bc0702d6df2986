//! Q&A audit rows (§3 "Q&A Audit", §4.7). One row per templated question
//! answered through the API; append-only in practice (no update/delete
//! helper is exposed, mirroring `acct_audit`'s discipline for this table
//! even though no DB trigger enforces it here).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewQaAudit {
    pub question: String,
    pub question_type: String,
    pub answer: String,
    pub params: Value,
    pub run_id: Option<Uuid>,
    pub asked_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct QaAuditRow {
    pub id: Uuid,
    pub question: String,
    pub question_type: String,
    pub answer: String,
    pub params: Value,
    pub run_id: Option<Uuid>,
    pub asked_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn row_to_qa(row: &sqlx::postgres::PgRow) -> Result<QaAuditRow> {
    Ok(QaAuditRow {
        id: row.try_get("id")?,
        question: row.try_get("question")?,
        question_type: row.try_get("question_type")?,
        answer: row.try_get("answer")?,
        params: row.try_get("params")?,
        run_id: row.try_get("run_id")?,
        asked_by: row.try_get("asked_by")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert(pool: &PgPool, q: &NewQaAudit) -> Result<QaAuditRow> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        insert into qa_audits (id, question, question_type, answer, params, run_id, asked_by)
        values ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(&q.question)
    .bind(&q.question_type)
    .bind(&q.answer)
    .bind(&q.params)
    .bind(q.run_id)
    .bind(&q.asked_by)
    .execute(pool)
    .await
    .context("qa_audits insert failed")?;

    let row = sqlx::query("select * from qa_audits where id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .context("qa_audits fetch-after-insert failed")?;
    row_to_qa(&row)
}

pub struct QaFilter {
    pub question_type: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list(pool: &PgPool, f: &QaFilter) -> Result<Vec<QaAuditRow>> {
    let rows = sqlx::query(
        r#"
        select * from qa_audits
        where ($1::text is null or question_type = $1)
        order by created_at desc
        limit $2 offset $3
        "#,
    )
    .bind(&f.question_type)
    .bind(f.limit)
    .bind(f.offset)
    .fetch_all(pool)
    .await
    .context("qa_audits list failed")?;
    rows.iter().map(row_to_qa).collect()
}
