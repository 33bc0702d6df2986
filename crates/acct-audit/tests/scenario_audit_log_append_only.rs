//! Scenario: audit log rejects UPDATE and DELETE at the storage layer
//! (SPEC_FULL §4.2, §6, §8 property 6).
//!
//! Skips gracefully when `ACCT_DATABASE_URL` is not set, matching the rest
//! of the corpus's DB-backed scenario tests.

use serde_json::json;
use sqlx::Row;

async fn make_pool(url: &str) -> anyhow::Result<sqlx::PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new().max_connections(4).connect(url).await?;
    sqlx::migrate!("../acct-db/migrations").run(&pool).await?;
    Ok(pool)
}

#[tokio::test]
async fn update_and_delete_on_audit_log_fail() -> anyhow::Result<()> {
    let Ok(url) = std::env::var("ACCT_DATABASE_URL") else {
        eprintln!("skipping: ACCT_DATABASE_URL not set");
        return Ok(());
    };
    let pool = make_pool(&url).await?;

    let mut writer = acct_audit::AuditWriter::connect(pool.clone()).await?;
    let ev = writer
        .append("scheduler", "run.created", "run", "11111111-1111-1111-1111-111111111111", json!({"k": "v"}))
        .await?;

    let update_result = sqlx::query("update audit_log set action = 'tampered' where id = $1")
        .bind(ev.id)
        .execute(&pool)
        .await;
    assert!(update_result.is_err(), "UPDATE on audit_log must fail at the storage layer");

    let delete_result = sqlx::query("delete from audit_log where id = $1").bind(ev.id).execute(&pool).await;
    assert!(delete_result.is_err(), "DELETE on audit_log must fail at the storage layer");

    let (action,): (String,) = sqlx::query_as("select action from audit_log where id = $1")
        .bind(ev.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(action, "run.created", "row must be untouched after failed mutation attempts");

    Ok(())
}

#[tokio::test]
async fn hash_chain_detects_tamper() -> anyhow::Result<()> {
    let Ok(url) = std::env::var("ACCT_DATABASE_URL") else {
        eprintln!("skipping: ACCT_DATABASE_URL not set");
        return Ok(());
    };
    let pool = make_pool(&url).await?;

    let mut writer = acct_audit::AuditWriter::connect(pool.clone()).await?;
    writer.append("scheduler", "run.created", "run", "a", json!({})).await?;
    writer.append("dispatcher", "run.finished", "run", "a", json!({"status": "success"})).await?;

    let verified = acct_audit::verify_hash_chain(&pool).await?;
    assert!(matches!(verified, acct_audit::VerifyResult::Valid { .. }));

    Ok(())
}
