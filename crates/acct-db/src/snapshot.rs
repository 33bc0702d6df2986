//! Report snapshot rows — monotonic versioning per `(report_type, period)`
//! via in-transaction `MAX(version)+1` (§4.2, §8 property 9).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReportSnapshotRow {
    pub id: Uuid,
    pub report_type: String,
    pub period: String,
    pub version: i32,
    pub file_uri: Option<String>,
    pub summary_json: Value,
    pub run_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

fn row_to_snapshot(row: &sqlx::postgres::PgRow) -> Result<ReportSnapshotRow> {
    Ok(ReportSnapshotRow {
        id: row.try_get("id")?,
        report_type: row.try_get("report_type")?,
        period: row.try_get("period")?,
        version: row.try_get("version")?,
        file_uri: row.try_get("file_uri")?,
        summary_json: row.try_get("summary_json")?,
        run_id: row.try_get("run_id")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Issues the next version by `SELECT MAX(version) + 1` inside the same
/// transaction that inserts the new row (§4.2 versioning contract).
pub async fn insert_next_version(
    pool: &PgPool,
    report_type: &str,
    period: &str,
    file_uri: Option<&str>,
    summary_json: Value,
    run_id: Uuid,
) -> Result<ReportSnapshotRow> {
    let mut tx = pool.begin().await.context("insert_next_version begin tx failed")?;

    let (max_version,): (Option<i32>,) = sqlx::query_as(
        "select max(version) from report_snapshots where report_type = $1 and period = $2 for update",
    )
    .bind(report_type)
    .bind(period)
    .fetch_one(&mut *tx)
    .await
    .context("report_snapshots max(version) query failed")?;

    let next_version = max_version.unwrap_or(0) + 1;
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        insert into report_snapshots (id, report_type, period, version, file_uri, summary_json, run_id)
        values ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(report_type)
    .bind(period)
    .bind(next_version)
    .bind(file_uri)
    .bind(&summary_json)
    .bind(run_id)
    .execute(&mut *tx)
    .await
    .context("report_snapshots insert failed")?;

    let row = sqlx::query("select * from report_snapshots where id = $1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("report_snapshots fetch-after-insert failed")?;

    tx.commit().await.context("insert_next_version commit failed")?;
    row_to_snapshot(&row)
}

/// Attach a late-bound `file_uri` (e.g. once an exported file has been
/// written to disk) to an already-inserted snapshot row. Does not touch
/// `version` or `summary_json`; the versioned content is immutable once
/// inserted, only the pointer to its exported copy is filled in after.
pub async fn update_file_uri(pool: &PgPool, id: Uuid, file_uri: &str) -> Result<()> {
    sqlx::query("update report_snapshots set file_uri = $1 where id = $2")
        .bind(file_uri)
        .bind(id)
        .execute(pool)
        .await
        .context("report_snapshots update_file_uri failed")?;
    Ok(())
}

pub struct SnapshotFilter {
    pub report_type: Option<String>,
    pub period: Option<String>,
    pub run_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list(pool: &PgPool, f: &SnapshotFilter) -> Result<Vec<ReportSnapshotRow>> {
    let rows = sqlx::query(
        r#"
        select * from report_snapshots
        where ($1::text is null or report_type = $1)
          and ($2::text is null or period = $2)
          and ($3::uuid is null or run_id = $3)
        order by report_type, period, version desc
        limit $4 offset $5
        "#,
    )
    .bind(&f.report_type)
    .bind(&f.period)
    .bind(f.run_id)
    .bind(f.limit)
    .bind(f.offset)
    .fetch_all(pool)
    .await
    .context("report_snapshots list failed")?;
    rows.iter().map(row_to_snapshot).collect()
}
