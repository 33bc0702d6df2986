//! Soft-check result rows: one per `(period, run_id)` (§3, §4.3.2).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewSoftCheckResult {
    pub period: String,
    pub total_checks: i32,
    pub passed: i32,
    pub warnings: i32,
    pub errors: i32,
    pub score: Decimal,
    pub run_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct SoftCheckResultRow {
    pub id: Uuid,
    pub period: String,
    pub total_checks: i32,
    pub passed: i32,
    pub warnings: i32,
    pub errors: i32,
    pub score: Decimal,
    pub run_id: Option<Uuid>,
}

fn row_to_result(row: &sqlx::postgres::PgRow) -> Result<SoftCheckResultRow> {
    Ok(SoftCheckResultRow {
        id: row.try_get("id")?,
        period: row.try_get("period")?,
        total_checks: row.try_get("total_checks")?,
        passed: row.try_get("passed")?,
        warnings: row.try_get("warnings")?,
        errors: row.try_get("errors")?,
        score: row.try_get("score")?,
        run_id: row.try_get("run_id")?,
    })
}

pub async fn insert(pool: &PgPool, r: &NewSoftCheckResult) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        insert into soft_check_results (id, period, total_checks, passed, warnings, errors, score, run_id)
        values ($1, $2, $3, $4, $5, $6, $7, $8)
        on conflict (period, run_id) do update set
            total_checks = excluded.total_checks,
            passed = excluded.passed,
            warnings = excluded.warnings,
            errors = excluded.errors,
            score = excluded.score
        "#,
    )
    .bind(id)
    .bind(&r.period)
    .bind(r.total_checks)
    .bind(r.passed)
    .bind(r.warnings)
    .bind(r.errors)
    .bind(r.score)
    .bind(r.run_id)
    .execute(pool)
    .await
    .context("soft check insert failed")?;
    Ok(id)
}

pub struct SoftCheckFilter {
    pub run_id: Option<Uuid>,
    pub period: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list(pool: &PgPool, f: &SoftCheckFilter) -> Result<Vec<SoftCheckResultRow>> {
    let rows = sqlx::query(
        r#"
        select * from soft_check_results
        where ($1::uuid is null or run_id = $1)
          and ($2::text is null or period = $2)
        order by created_at desc
        limit $3 offset $4
        "#,
    )
    .bind(f.run_id)
    .bind(&f.period)
    .bind(f.limit)
    .bind(f.offset)
    .fetch_all(pool)
    .await
    .context("soft check list failed")?;
    rows.iter().map(row_to_result).collect()
}
