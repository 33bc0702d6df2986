//! `acct-cli` — operator-facing entry points for the run kernel that don't
//! need the HTTP API: database bootstrap, config hashing, run lifecycle, and
//! maker-checker decisions (SPEC_FULL §4.7).

mod commands;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use commands::load_payload;

#[derive(Parser)]
#[command(name = "acct-cli")]
#[command(about = "Accounting run-orchestration CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run lifecycle commands
    Run {
        #[command(subcommand)]
        cmd: RunCmd,
    },

    /// Maker-checker approval commands
    Approval {
        #[command(subcommand)]
        cmd: ApprovalCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

#[derive(Subcommand)]
enum RunCmd {
    /// Create a queued run row (idempotent on --idempotency-key).
    Start {
        #[arg(long)]
        run_type: String,

        #[arg(long, default_value = "manual")]
        trigger_type: String,

        #[arg(long)]
        payload: Option<String>,

        #[arg(long)]
        payload_file: Option<String>,

        #[arg(long)]
        idempotency_key: String,
    },

    /// Dispatch one queued/running run row synchronously.
    Dispatch {
        run_id: Uuid,
    },

    /// Print one run row.
    Show {
        run_id: Uuid,
    },

    /// List run rows.
    List {
        #[arg(long)]
        run_type: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: i64,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

#[derive(Subcommand)]
enum ApprovalCmd {
    /// Record an approve/reject decision on a contract proposal.
    Decide {
        #[arg(long)]
        proposal_id: Uuid,

        #[arg(long)]
        approver_id: String,

        /// approve | reject
        #[arg(long)]
        decision: String,

        #[arg(long)]
        evidence_ack: bool,

        #[arg(long)]
        idempotency_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = acct_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = acct_db::status(&pool).await?;
                    println!("db_ok={} schema_ready={}", s.ok, s.schema_ready);
                }
                DbCmd::Migrate => {
                    acct_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = acct_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Run { cmd } => match cmd {
            RunCmd::Start { run_type, trigger_type, payload, payload_file, idempotency_key } => {
                let pool = acct_db::connect_from_env().await?;
                let cursor_in = load_payload(payload, payload_file)?;
                commands::run::start(&pool, &run_type, &trigger_type, cursor_in, &idempotency_key).await?;
            }

            RunCmd::Dispatch { run_id } => {
                let pool = acct_db::connect_from_env().await?;
                let erpx = Arc::new(acct_erpx::ErpxClient::new(erpx_settings_from_env())?);
                let registry = acct_workflows::build_registry();
                commands::run::dispatch_one(&pool, erpx, &registry, run_id).await?;
            }

            RunCmd::Show { run_id } => {
                let pool = acct_db::connect_from_env().await?;
                commands::run::show(&pool, run_id).await?;
            }

            RunCmd::List { run_type, status, limit, offset } => {
                let pool = acct_db::connect_from_env().await?;
                commands::run::list(&pool, run_type, status, limit, offset).await?;
            }
        },

        Commands::Approval { cmd } => match cmd {
            ApprovalCmd::Decide { proposal_id, approver_id, decision, evidence_ack, idempotency_key } => {
                let pool = acct_db::connect_from_env().await?;
                let mut audit = acct_audit::AuditWriter::connect(pool.clone()).await?;
                commands::approval::run(&pool, &mut audit, proposal_id, &approver_id, &decision, evidence_ack, &idempotency_key)
                    .await?;
            }
        },
    }

    Ok(())
}

fn erpx_settings_from_env() -> acct_erpx::ErpxSettings {
    let mut settings = acct_erpx::ErpxSettings::default();
    if let Ok(v) = std::env::var("ACCT_ERPX_BASE_URL") {
        settings.base_url = v;
    }
    if let Ok(v) = std::env::var("ACCT_ERPX_TOKEN") {
        settings.token = Some(v);
    }
    if let Ok(v) = std::env::var("ACCT_ERPX_QPS").and_then(|s| s.parse::<f64>().map_err(|_| std::env::VarError::NotPresent)) {
        settings.qps = v;
    }
    settings
}
