use assert_cmd::prelude::*;
use predicates::prelude::*;
use uuid::Uuid;

/// `acct-cli run start` invoked twice with the same --idempotency-key must
/// return the same run_id both times (SPEC_FULL §8 property 1).
///
/// DB-backed; skipped if ACCT_DATABASE_URL is not set.
#[tokio::test]
async fn cli_run_start_twice_with_same_key_returns_same_run() -> anyhow::Result<()> {
    let url = match std::env::var(acct_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: {} not set", acct_db::ENV_DB_URL);
            return Ok(());
        }
    };

    let pool = acct_db::connect(&url).await?;
    acct_db::migrate(&pool).await?;

    let idempotency_key = format!("cli-test-{}", Uuid::new_v4());

    let mut cmd1 = assert_cmd::Command::cargo_bin("acct-cli")?;
    let out1 = cmd1
        .env(acct_db::ENV_DB_URL, &url)
        .args([
            "run",
            "start",
            "--run-type",
            "voucher_ingest",
            "--trigger-type",
            "manual",
            "--payload",
            "{}",
            "--idempotency-key",
            &idempotency_key,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("created=true"))
        .get_output()
        .stdout
        .clone();

    let mut cmd2 = assert_cmd::Command::cargo_bin("acct-cli")?;
    let out2 = cmd2
        .env(acct_db::ENV_DB_URL, &url)
        .args([
            "run",
            "start",
            "--run-type",
            "voucher_ingest",
            "--trigger-type",
            "manual",
            "--payload",
            "{}",
            "--idempotency-key",
            &idempotency_key,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("created=false"))
        .get_output()
        .stdout
        .clone();

    let run_id_of = |out: &[u8]| -> String {
        String::from_utf8_lossy(out)
            .lines()
            .find_map(|l| l.strip_prefix("run_id=").map(|s| s.to_string()))
            .expect("run_id= line present")
    };

    assert_eq!(run_id_of(&out1), run_id_of(&out2));
    Ok(())
}
