//! Tier-B feedback rows — append-only (§3).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewTierBFeedback {
    pub obligation_id: String,
    pub user_id: Option<String>,
    pub feedback_type: String,
    pub delta: Option<Decimal>,
}

pub async fn insert(pool: &PgPool, f: &NewTierBFeedback) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        insert into tier_b_feedback (id, obligation_id, user_id, feedback_type, delta)
        values ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(&f.obligation_id)
    .bind(&f.user_id)
    .bind(&f.feedback_type)
    .bind(f.delta)
    .execute(pool)
    .await
    .context("tier_b_feedback insert failed")?;
    Ok(id)
}
