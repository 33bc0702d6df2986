//! Cashflow forecast rows — regenerated per run, never mutated in place (§3).

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewCashflowRow {
    pub forecast_date: NaiveDate,
    pub direction: String,
    pub amount: Decimal,
    pub currency: String,
    pub source_type: String,
    pub source_ref: Option<String>,
    pub confidence: Decimal,
    pub run_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct CashflowRowRecord {
    pub id: Uuid,
    pub forecast_date: NaiveDate,
    pub direction: String,
    pub amount: Decimal,
    pub currency: String,
    pub source_type: String,
    pub source_ref: Option<String>,
    pub confidence: Decimal,
    pub run_id: Option<Uuid>,
}

fn row_to_forecast(row: &sqlx::postgres::PgRow) -> Result<CashflowRowRecord> {
    Ok(CashflowRowRecord {
        id: row.try_get("id")?,
        forecast_date: row.try_get("forecast_date")?,
        direction: row.try_get("direction")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        source_type: row.try_get("source_type")?,
        source_ref: row.try_get("source_ref")?,
        confidence: row.try_get("confidence")?,
        run_id: row.try_get("run_id")?,
    })
}

pub async fn insert_many(pool: &PgPool, rows: &[NewCashflowRow]) -> Result<()> {
    let mut tx = pool.begin().await.context("cashflow insert_many begin tx failed")?;
    for r in rows {
        sqlx::query(
            r#"
            insert into cashflow_forecast_rows
                (id, forecast_date, direction, amount, currency, source_type, source_ref, confidence, run_id)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(r.forecast_date)
        .bind(&r.direction)
        .bind(r.amount)
        .bind(&r.currency)
        .bind(&r.source_type)
        .bind(&r.source_ref)
        .bind(r.confidence)
        .bind(r.run_id)
        .execute(&mut *tx)
        .await
        .context("cashflow row insert failed")?;
    }
    tx.commit().await.context("cashflow insert_many commit failed")?;
    Ok(())
}

pub struct CashflowFilter {
    pub run_id: Option<Uuid>,
    pub direction: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list(pool: &PgPool, f: &CashflowFilter) -> Result<Vec<CashflowRowRecord>> {
    let rows = sqlx::query(
        r#"
        select * from cashflow_forecast_rows
        where ($1::uuid is null or run_id = $1)
          and ($2::text is null or direction = $2)
        order by forecast_date
        limit $3 offset $4
        "#,
    )
    .bind(f.run_id)
    .bind(&f.direction)
    .bind(f.limit)
    .bind(f.offset)
    .fetch_all(pool)
    .await
    .context("cashflow list failed")?;
    rows.iter().map(row_to_forecast).collect()
}
