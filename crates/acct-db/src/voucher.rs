//! Voucher mirror rows. Ingest dedups on `(voucher_no, source)`; classify
//! updates `classification_tag` in place. Never writes back to the ERP.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewVoucher {
    pub erp_voucher_id: Option<String>,
    pub voucher_no: String,
    pub voucher_type: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub partner_name: Option<String>,
    pub partner_tax_code: Option<String>,
    pub has_attachment: bool,
    pub source: String,
    pub type_hint: Option<String>,
    pub raw_payload: Value,
    pub run_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct VoucherRow {
    pub id: Uuid,
    pub erp_voucher_id: Option<String>,
    pub voucher_no: String,
    pub voucher_type: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub partner_name: Option<String>,
    pub partner_tax_code: Option<String>,
    pub has_attachment: bool,
    pub source: String,
    pub type_hint: Option<String>,
    pub raw_payload: Value,
    pub classification_tag: Option<String>,
    pub run_id: Option<Uuid>,
    pub synced_at: DateTime<Utc>,
}

fn row_to_voucher(row: &sqlx::postgres::PgRow) -> Result<VoucherRow> {
    Ok(VoucherRow {
        id: row.try_get("id")?,
        erp_voucher_id: row.try_get("erp_voucher_id")?,
        voucher_no: row.try_get("voucher_no")?,
        voucher_type: row.try_get("voucher_type")?,
        date: row.try_get("date")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        partner_name: row.try_get("partner_name")?,
        partner_tax_code: row.try_get("partner_tax_code")?,
        has_attachment: row.try_get("has_attachment")?,
        source: row.try_get("source")?,
        type_hint: row.try_get("type_hint")?,
        raw_payload: row.try_get("raw_payload")?,
        classification_tag: row.try_get("classification_tag")?,
        run_id: row.try_get("run_id")?,
        synced_at: row.try_get("synced_at")?,
    })
}

/// `(voucher_no, source)` insert-if-absent. Returns `(row, inserted)` so the
/// ingest workflow can report `skipped_existing` (SPEC_FULL §8 scenario S6).
pub async fn insert_if_absent(pool: &PgPool, v: &NewVoucher) -> Result<(VoucherRow, bool)> {
    let id = Uuid::new_v4();
    let inserted = sqlx::query(
        r#"
        insert into vouchers
            (id, erp_voucher_id, voucher_no, voucher_type, date, amount, currency,
             partner_name, partner_tax_code, has_attachment, source, type_hint,
             raw_payload, run_id)
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        on conflict (voucher_no, source) do nothing
        "#,
    )
    .bind(id)
    .bind(&v.erp_voucher_id)
    .bind(&v.voucher_no)
    .bind(&v.voucher_type)
    .bind(v.date)
    .bind(v.amount)
    .bind(&v.currency)
    .bind(&v.partner_name)
    .bind(&v.partner_tax_code)
    .bind(v.has_attachment)
    .bind(&v.source)
    .bind(&v.type_hint)
    .bind(&v.raw_payload)
    .bind(v.run_id)
    .execute(pool)
    .await
    .context("voucher insert_if_absent failed")?
    .rows_affected()
        > 0;

    let row = fetch_by_voucher_no_source(pool, &v.voucher_no, &v.source)
        .await?
        .context("voucher row vanished immediately after insert-or-fetch")?;

    Ok((row, inserted))
}

pub async fn fetch_by_voucher_no_source(
    pool: &PgPool,
    voucher_no: &str,
    source: &str,
) -> Result<Option<VoucherRow>> {
    let row = sqlx::query("select * from vouchers where voucher_no = $1 and source = $2")
        .bind(voucher_no)
        .bind(source)
        .fetch_optional(pool)
        .await
        .context("fetch_by_voucher_no_source failed")?;
    row.as_ref().map(row_to_voucher).transpose()
}

pub async fn fetch(pool: &PgPool, id: Uuid) -> Result<VoucherRow> {
    let row = sqlx::query("select * from vouchers where id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .context("voucher fetch failed")?;
    row_to_voucher(&row)
}

/// Vouchers with no `classification_tag` yet, for `voucher_classify`.
pub async fn list_unclassified(pool: &PgPool, limit: i64) -> Result<Vec<VoucherRow>> {
    let rows = sqlx::query("select * from vouchers where classification_tag is null order by synced_at limit $1")
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("list_unclassified failed")?;
    rows.iter().map(row_to_voucher).collect()
}

/// Vouchers with no journal proposal yet, for `journal_suggestion`.
pub async fn list_without_proposal(pool: &PgPool, limit: i64) -> Result<Vec<VoucherRow>> {
    let rows = sqlx::query(
        r#"
        select v.* from vouchers v
        left join journal_proposals p on p.voucher_id = v.id
        where p.proposal_id is null
        order by v.synced_at
        limit $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("list_without_proposal failed")?;
    rows.iter().map(row_to_voucher).collect()
}

pub async fn set_classification_tag(pool: &PgPool, id: Uuid, tag: &str) -> Result<()> {
    sqlx::query("update vouchers set classification_tag = $2 where id = $1")
        .bind(id)
        .bind(tag)
        .execute(pool)
        .await
        .context("set_classification_tag failed")?;
    Ok(())
}

pub struct VoucherFilter {
    pub run_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list(pool: &PgPool, f: &VoucherFilter) -> Result<Vec<VoucherRow>> {
    let rows = sqlx::query(
        r#"
        select * from vouchers
        where ($1::uuid is null or run_id = $1)
        order by synced_at desc
        limit $2 offset $3
        "#,
    )
    .bind(f.run_id)
    .bind(f.limit)
    .bind(f.offset)
    .fetch_all(pool)
    .await
    .context("voucher list failed")?;
    rows.iter().map(row_to_voucher).collect()
}

/// Duplicate `voucher_no` pairs within a fetched set, ordered by id ascending
/// (SPEC_FULL §4.3.2 `DUPLICATE_VOUCHER`, deterministic pairing).
pub async fn find_duplicate_voucher_nos(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<(Uuid, Uuid, String)>> {
    let rows = sqlx::query(
        r#"
        select a.id as id_a, b.id as id_b, a.voucher_no
        from vouchers a
        join vouchers b on a.voucher_no = b.voucher_no and a.id < b.id
        where a.id = any($1) and b.id = any($1)
        order by a.id, b.id
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .context("find_duplicate_voucher_nos failed")?;

    rows.into_iter()
        .map(|r| {
            Ok((
                r.try_get::<Uuid, _>("id_a")?,
                r.try_get::<Uuid, _>("id_b")?,
                r.try_get::<String, _>("voucher_no")?,
            ))
        })
        .collect()
}
