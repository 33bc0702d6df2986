//! `acct-scheduler` entry point (§4.5, §6).
//!
//! Thin by design, matching `acct-api`/`acct-cli`: load config, init tracing,
//! hand off to `acct_scheduler::run`, translate `SIGTERM`/`SIGINT` into the
//! cooperative shutdown signal both loops observe.

use std::path::PathBuf;

use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let schedules_path = std::env::var("SCHEDULES_YAML").unwrap_or_else(|_| "config/schedules.yaml".to_string());
    let cfg = acct_scheduler::config::load(&PathBuf::from(&schedules_path))?;

    let (tx, rx) = watch::channel(false);

    let shutdown_signal = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received; finishing in-flight ticks");
        let _ = tx.send(true);
    });

    acct_scheduler::run(cfg, rx).await?;
    shutdown_signal.abort();

    info!("scheduler stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}
