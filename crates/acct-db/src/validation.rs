//! Validation issue rows (soft-check findings, §3, §4.3.2). Append-only
//! except for the resolution fields.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewValidationIssue {
    pub rule_code: String,
    pub severity: String,
    pub message: String,
    pub erp_ref: Option<String>,
    pub details: Value,
    pub check_result_id: Option<Uuid>,
    pub run_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ValidationIssueRow {
    pub id: Uuid,
    pub rule_code: String,
    pub severity: String,
    pub message: String,
    pub erp_ref: Option<String>,
    pub details: Value,
    pub resolution: String,
    pub run_id: Option<Uuid>,
}

fn row_to_issue(row: &sqlx::postgres::PgRow) -> Result<ValidationIssueRow> {
    Ok(ValidationIssueRow {
        id: row.try_get("id")?,
        rule_code: row.try_get("rule_code")?,
        severity: row.try_get("severity")?,
        message: row.try_get("message")?,
        erp_ref: row.try_get("erp_ref")?,
        details: row.try_get("details")?,
        resolution: row.try_get("resolution")?,
        run_id: row.try_get("run_id")?,
    })
}

pub async fn insert_many(pool: &PgPool, issues: &[NewValidationIssue]) -> Result<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(issues.len());
    let mut tx = pool.begin().await.context("validation insert_many begin tx failed")?;
    for issue in issues {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            insert into validation_issues
                (id, rule_code, severity, message, erp_ref, details, check_result_id, run_id)
            values ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(&issue.rule_code)
        .bind(&issue.severity)
        .bind(&issue.message)
        .bind(&issue.erp_ref)
        .bind(&issue.details)
        .bind(issue.check_result_id)
        .bind(issue.run_id)
        .execute(&mut *tx)
        .await
        .context("validation issue insert failed")?;
        ids.push(id);
    }
    tx.commit().await.context("validation insert_many commit failed")?;
    Ok(ids)
}

pub struct ValidationFilter {
    pub run_id: Option<Uuid>,
    pub severity: Option<String>,
    pub resolution: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list(pool: &PgPool, f: &ValidationFilter) -> Result<Vec<ValidationIssueRow>> {
    let rows = sqlx::query(
        r#"
        select * from validation_issues
        where ($1::uuid is null or run_id = $1)
          and ($2::text is null or severity = $2)
          and ($3::text is null or resolution = $3)
        order by created_at desc
        limit $4 offset $5
        "#,
    )
    .bind(f.run_id)
    .bind(&f.severity)
    .bind(&f.resolution)
    .bind(f.limit)
    .bind(f.offset)
    .fetch_all(pool)
    .await
    .context("validation list failed")?;
    rows.iter().map(row_to_issue).collect()
}

pub async fn resolve(pool: &PgPool, id: Uuid, resolution: &str, resolved_by: &str) -> Result<()> {
    sqlx::query(
        "update validation_issues set resolution = $2, resolved_by = $3, resolved_at = now() where id = $1",
    )
    .bind(id)
    .bind(resolution)
    .bind(resolved_by)
    .execute(pool)
    .await
    .context("validation resolve failed")?;
    Ok(())
}
