//! `acct-api` entry point (SPEC_FULL §4.7).
//!
//! Thin on purpose: load config, connect the DB pool and ERP client, build
//! the workflow registry, spawn the dispatcher's worker pool, then serve the
//! HTTP router built in `routes.rs`. All handler logic lives in `routes.rs`;
//! all shared state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use acct_api::{routes, state::AppState};
use acct_dispatcher::worker::{self, ShutdownFlag, WorkerPoolConfig};
use acct_erpx::{ErpxClient, ErpxSettings};
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience: load .env.local if present; silent if absent since
    // production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let pool = acct_db::connect_from_env().await.context("connect to Postgres")?;
    acct_db::migrate(&pool).await.context("run migrations")?;

    let erpx = Arc::new(ErpxClient::new(erpx_settings_from_env())?);
    let registry = Arc::new(acct_workflows::build_registry());
    let audit = acct_audit::AuditWriter::connect(pool.clone()).await.context("connect audit writer")?;
    let api_key = std::env::var("ACCT_API_KEY").ok().filter(|s| !s.is_empty());

    let shared = Arc::new(AppState::new(pool.clone(), Arc::clone(&erpx), Arc::clone(&registry), audit, api_key));

    // Dispatcher worker pool runs in-process alongside the HTTP server
    // (§5 "parallel workers consume dispatcher tasks from a queue"); the API
    // only ever enqueues a queued run row, never dispatches synchronously.
    let shutdown = ShutdownFlag::new();
    let worker_shutdown = shutdown.clone();
    let worker_pool = pool.clone();
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = worker::run_claim_loop(worker_pool, erpx, registry, WorkerPoolConfig::default(), worker_shutdown).await
        {
            tracing::error!(error = %e, "dispatcher worker pool exited with error");
        }
    });

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("acct-api listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    shutdown.request_stop();
    worker_handle.await.context("dispatcher worker pool task panicked")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received shutdown signal; draining in-flight dispatches");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("ACCT_API_ADDR").ok()?.parse().ok()
}

fn erpx_settings_from_env() -> ErpxSettings {
    let mut settings = ErpxSettings::default();
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

/// CORS: allow only localhost origins (operator UIs run locally; this
/// service has no public browser surface).
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();

    CorsLayer::new().allow_origin(origins).allow_methods([Method::GET, Method::POST]).allow_headers(tower_http::cors::Any)
}
