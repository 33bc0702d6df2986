//! Postgres persistence for runs, mirror tables, proposals, and snapshots
//! (SPEC_FULL.md §3). Every entity gets a thin module of `sqlx` query
//! functions; nothing here knows about HTTP or workflow DAGs.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub mod approval;
pub mod bank_tx;
pub mod cashflow;
pub mod contract_proposal;
pub mod journal;
pub mod qa;
pub mod run;
pub mod snapshot;
pub mod soft_check;
pub mod tier_b;
pub mod validation;
pub mod voucher;

pub const ENV_DB_URL: &str = "ACCT_DATABASE_URL";

/// Connect to Postgres using `ACCT_DATABASE_URL`.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Test helper: connect using `ACCT_DATABASE_URL` and ensure migrations ran.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Connectivity + schema-presence probe for `GET /readyz`.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from information_schema.tables
            where table_schema = 'public' and table_name = 'runs'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        schema_ready: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub schema_ready: bool,
}

/// Detect a Postgres unique constraint violation by name. Carried over from
/// the teacher's `mqk-db` helper of the same name.
pub fn is_unique_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
