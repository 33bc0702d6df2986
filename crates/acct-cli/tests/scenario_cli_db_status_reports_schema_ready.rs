use assert_cmd::prelude::*;
use predicates::prelude::*;

/// `acct-cli db status` must report both connectivity and schema readiness
/// once migrations have run.
///
/// DB-backed; skipped if ACCT_DATABASE_URL is not set.
#[tokio::test]
async fn cli_db_status_reports_ok_after_migrate() -> anyhow::Result<()> {
    let url = match std::env::var(acct_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: {} not set", acct_db::ENV_DB_URL);
            return Ok(());
        }
    };

    let pool = acct_db::connect(&url).await?;
    acct_db::migrate(&pool).await?;

    let mut cmd = assert_cmd::Command::cargo_bin("acct-cli")?;
    cmd.env(acct_db::ENV_DB_URL, &url)
        .args(["db", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("db_ok=true"))
        .stdout(predicate::str::contains("schema_ready=true"));

    Ok(())
}
