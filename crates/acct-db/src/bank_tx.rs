//! Bank transaction mirror rows, produced only by `bank_reconcile`.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Unmatched,
    Matched,
    Anomaly,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Unmatched => "unmatched",
            MatchStatus::Matched => "matched",
            MatchStatus::Anomaly => "anomaly",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBankTx {
    pub bank_tx_ref: String,
    pub bank_account: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub counterparty: Option<String>,
    pub memo: Option<String>,
    pub run_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct BankTxRow {
    pub id: Uuid,
    pub bank_tx_ref: String,
    pub bank_account: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub counterparty: Option<String>,
    pub memo: Option<String>,
    pub matched_voucher_id: Option<Uuid>,
    pub match_status: String,
    pub synced_at: DateTime<Utc>,
    pub run_id: Option<Uuid>,
}

fn row_to_tx(row: &sqlx::postgres::PgRow) -> Result<BankTxRow> {
    Ok(BankTxRow {
        id: row.try_get("id")?,
        bank_tx_ref: row.try_get("bank_tx_ref")?,
        bank_account: row.try_get("bank_account")?,
        date: row.try_get("date")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        counterparty: row.try_get("counterparty")?,
        memo: row.try_get("memo")?,
        matched_voucher_id: row.try_get("matched_voucher_id")?,
        match_status: row.try_get("match_status")?,
        synced_at: row.try_get("synced_at")?,
        run_id: row.try_get("run_id")?,
    })
}

/// `bank_tx_ref` insert-if-absent, mirroring the ERP read without a match
/// decision yet (the reconcile workflow updates `match_status` afterwards).
pub async fn insert_if_absent(pool: &PgPool, t: &NewBankTx) -> Result<BankTxRow> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        insert into bank_transactions
            (id, bank_tx_ref, bank_account, date, amount, currency, counterparty, memo, run_id)
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        on conflict (bank_tx_ref) do nothing
        "#,
    )
    .bind(id)
    .bind(&t.bank_tx_ref)
    .bind(&t.bank_account)
    .bind(t.date)
    .bind(t.amount)
    .bind(&t.currency)
    .bind(&t.counterparty)
    .bind(&t.memo)
    .bind(t.run_id)
    .execute(pool)
    .await
    .context("bank_tx insert_if_absent failed")?;

    let row = sqlx::query("select * from bank_transactions where bank_tx_ref = $1")
        .bind(&t.bank_tx_ref)
        .fetch_one(pool)
        .await
        .context("bank_tx fetch-after-insert failed")?;
    row_to_tx(&row)
}

/// Unmatched transactions for a reconcile run to score against vouchers.
pub async fn list_unmatched(pool: &PgPool, limit: i64) -> Result<Vec<BankTxRow>> {
    let rows = sqlx::query("select * from bank_transactions where match_status = 'unmatched' order by date limit $1")
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("list_unmatched failed")?;
    rows.iter().map(row_to_tx).collect()
}

/// §4.3.1: reconcile's match decision. Idempotent — rerunning with the same
/// inputs writes the same `(match_status, matched_voucher_id)`.
pub async fn set_match(
    pool: &PgPool,
    id: Uuid,
    status: MatchStatus,
    matched_voucher_id: Option<Uuid>,
) -> Result<()> {
    sqlx::query("update bank_transactions set match_status = $2, matched_voucher_id = $3 where id = $1")
        .bind(id)
        .bind(status.as_str())
        .bind(matched_voucher_id)
        .execute(pool)
        .await
        .context("bank_tx set_match failed")?;
    Ok(())
}

pub struct BankTxFilter {
    pub run_id: Option<Uuid>,
    pub match_status: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list(pool: &PgPool, f: &BankTxFilter) -> Result<Vec<BankTxRow>> {
    let rows = sqlx::query(
        r#"
        select * from bank_transactions
        where ($1::uuid is null or run_id = $1)
          and ($2::text is null or match_status = $2)
        order by date desc
        limit $3 offset $4
        "#,
    )
    .bind(f.run_id)
    .bind(&f.match_status)
    .bind(f.limit)
    .bind(f.offset)
    .fetch_all(pool)
    .await
    .context("bank_tx list failed")?;
    rows.iter().map(row_to_tx).collect()
}
