//! Axum router and every HTTP handler for `acct-api` (SPEC_FULL §6).
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)` so the scenario tests under
//! `tests/` can compose the router directly, matching the teacher's pattern.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    api_types::*,
    error::AppError,
    state::AppState,
};

/// §1 "No multi-tenant isolation beyond API-key gating" — this service's
/// entire auth surface is one shared key. `ACCT_API_KEY` unset (`api_key:
/// None`) disables the check for local/dev use; set, every `/agent/v1/*`
/// request must carry a matching `X-Api-Key` header. `/healthz`, `/readyz`,
/// and `/graphs*` stay open for liveness/readiness probes and introspection.
async fn require_api_key(State(st): State<Arc<AppState>>, headers: HeaderMap, req: Request, next: Next) -> Response {
    let Some(expected) = &st.api_key else {
        return next.run(req).await;
    };

    let provided = headers.get("X-Api-Key").and_then(|v| v.to_str().ok());
    if provided == Some(expected.as_str()) {
        next.run(req).await
    } else {
        AppError::Validation("missing or invalid X-Api-Key".to_string()).into_response()
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let agent_routes = Router::new()
        .route("/agent/v1/runs", post(create_run).get(list_runs))
        .route("/agent/v1/runs/:id", get(get_run))
        .route(
            "/agent/v1/contract/proposals/:id/approvals",
            post(submit_approval),
        )
        .route("/agent/v1/contract-proposals", get(list_contract_proposals))
        .route("/agent/v1/tier-b/feedback", post(submit_tier_b_feedback))
        .route("/agent/v1/qa", post(ask_question).get(list_qa_audits))
        .route("/agent/v1/vouchers", get(list_vouchers))
        .route("/agent/v1/bank-transactions", get(list_bank_transactions))
        .route("/agent/v1/journal-proposals", get(list_journal_proposals))
        .route("/agent/v1/validation-issues", get(list_validation_issues))
        .route("/agent/v1/soft-checks", get(list_soft_checks))
        .route("/agent/v1/snapshots", get(list_snapshots))
        .route("/agent/v1/cashflow-forecast", get(list_cashflow_forecast))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/graphs", get(list_graphs))
        .route("/graphs/:name", get(get_graph))
        .merge(agent_routes)
        .with_state(state)
}

fn idempotency_key(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Validation("missing Idempotency-Key header".to_string()))
}

// ---------------------------------------------------------------------------
// GET /healthz, /readyz
// ---------------------------------------------------------------------------

pub(crate) async fn healthz(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { ok: true, service: st.build.service, version: st.build.version }))
}

pub(crate) async fn readyz(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    match acct_db::status(&st.pool).await {
        Ok(status) => {
            let code = if status.ok && status.schema_ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
            (code, Json(ReadyResponse { ok: status.ok, db_reachable: status.ok, schema_ready: status.schema_ready }))
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse { ok: false, db_reachable: false, schema_ready: false }),
        ),
    }
}

// ---------------------------------------------------------------------------
// GET /graphs, /graphs/{name}
// ---------------------------------------------------------------------------

pub(crate) async fn list_graphs(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(GraphListResponse { run_types: st.registry.run_types() }))
}

pub(crate) async fn get_graph(State(st): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    match st.registry.resolve(&name) {
        Some(_) => (
            StatusCode::OK,
            Json(GraphResponse { run_type: name, shape: "fetch -> guard -> compute -> end" }),
        )
            .into_response(),
        None => AppError::NotFound(format!("no workflow registered for run_type '{name}'")).into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /agent/v1/runs, GET /agent/v1/runs, GET /agent/v1/runs/{id}
// ---------------------------------------------------------------------------

pub(crate) async fn create_run(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateRunRequest>,
) -> Result<Response, AppError> {
    if st.registry.resolve(&body.run_type).is_none() {
        return Err(AppError::Validation(format!("unknown run_type '{}'", body.run_type)));
    }
    let key = idempotency_key(&headers)?;

    let run_id = Uuid::new_v4();
    let (row, inserted) =
        acct_db::run::create_or_get_run(&st.pool, run_id, &body.run_type, &body.trigger_type, &key, body.payload.clone())
            .await?;

    if !inserted && row.cursor_in != body.payload {
        return Err(AppError::Conflict(format!(
            "Idempotency-Key '{key}' was already used with a different payload"
        )));
    }

    if inserted {
        write_run_manifest(&row);
    }

    Ok((StatusCode::OK, Json(CreateRunResponse { run_id: row.run_id, status: row.status.as_str() })).into_response())
}

/// Side-car only (§9 "Run manifest"); never blocks or fails the request —
/// the run row in `acct-db` is the source of truth.
fn write_run_manifest(row: &acct_db::run::RunRow) {
    let exports_root = std::env::var("ACCT_EXPORTS_ROOT").unwrap_or_else(|_| "./exports".to_string());
    let args = acct_artifacts::InitRunArtifactsArgs {
        exports_root: std::path::Path::new(&exports_root),
        schema_version: 1,
        run_id: row.run_id,
        run_type: &row.run_type,
        trigger_type: &row.trigger_type,
        idempotency_key: &row.idempotency_key,
    };
    if let Err(e) = acct_artifacts::init_run_artifacts(args) {
        warn!(run_id = %row.run_id, error = %e, "init_run_artifacts failed");
    }
}

pub(crate) async fn list_runs(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Response, AppError> {
    let filter = acct_db::run::RunFilter { run_type: q.run_type, status: q.status, limit: q.limit(), offset: q.offset() };
    let rows = acct_db::run::list_runs(&st.pool, &filter).await?;
    Ok(Json(rows.into_iter().map(RunDto::from).collect::<Vec<_>>()).into_response())
}

pub(crate) async fn get_run(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Response, AppError> {
    let row = acct_db::run::fetch_run(&st.pool, id).await.map_err(|_| AppError::NotFound(format!("run {id} not found")))?;
    Ok(Json(RunDto::from(row)).into_response())
}

// ---------------------------------------------------------------------------
// POST /agent/v1/contract/proposals/{id}/approvals
// ---------------------------------------------------------------------------

pub(crate) async fn submit_approval(
    State(st): State<Arc<AppState>>,
    Path(proposal_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<ApprovalRequestBody>,
) -> Result<Response, AppError> {
    let key = idempotency_key(&headers)?;
    let decision = acct_approval::Decision::parse(&body.decision)
        .ok_or_else(|| AppError::Validation(format!("unknown decision '{}'", body.decision)))?;

    let req = acct_approval::ApprovalRequest {
        proposal_id,
        approver_id: body.approver_id,
        decision,
        evidence_ack: body.evidence_ack,
        idempotency_key: key,
    };

    let mut audit = st.audit.lock().await;
    let decided = acct_approval::decide(&st.pool, &mut audit, &req).await?;

    Ok((
        StatusCode::OK,
        Json(ApprovalResponse {
            approval_id: decided.approval.id,
            proposal_id: decided.approval.proposal_id,
            decision: decided.approval.decision,
            proposal_status: decided.proposal_status,
            replay: decided.replay,
        }),
    )
        .into_response())
}

pub(crate) async fn list_contract_proposals(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Response, AppError> {
    let filter =
        acct_db::contract_proposal::ContractProposalFilter { run_id: q.run_id, status: q.status, limit: q.limit(), offset: q.offset() };
    let rows = acct_db::contract_proposal::list(&st.pool, &filter).await?;
    Ok(Json(rows.into_iter().map(ContractProposalDto::from).collect::<Vec<_>>()).into_response())
}

// ---------------------------------------------------------------------------
// POST /agent/v1/tier-b/feedback
// ---------------------------------------------------------------------------

pub(crate) async fn submit_tier_b_feedback(
    State(st): State<Arc<AppState>>,
    Json(body): Json<TierBFeedbackRequest>,
) -> Result<Response, AppError> {
    let new_feedback = acct_db::tier_b::NewTierBFeedback {
        obligation_id: body.obligation_id,
        user_id: body.user_id,
        feedback_type: body.feedback_type,
        delta: body.delta,
    };
    let id = acct_db::tier_b::insert(&st.pool, &new_feedback).await?;
    Ok((StatusCode::OK, Json(TierBFeedbackResponse { id })).into_response())
}

// ---------------------------------------------------------------------------
// POST /agent/v1/qa, GET /agent/v1/qa
// ---------------------------------------------------------------------------

pub(crate) async fn ask_question(
    State(st): State<Arc<AppState>>,
    Json(body): Json<QaRequest>,
) -> Result<Response, AppError> {
    let answer = acct_workflows::qa::answer_question(&st.pool, &body.question)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    let row = acct_db::qa::insert(
        &st.pool,
        &acct_db::qa::NewQaAudit {
            question: body.question.clone(),
            question_type: answer.question_type.as_str().to_string(),
            answer: answer.answer.clone(),
            params: serde_json::json!({}),
            run_id: body.run_id,
            asked_by: body.asked_by,
        },
    )
    .await?;

    Ok((StatusCode::OK, Json(QaResponse { id: row.id, question_type: answer.question_type.as_str(), answer: answer.answer }))
        .into_response())
}

pub(crate) async fn list_qa_audits(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Response, AppError> {
    let filter = acct_db::qa::QaFilter { question_type: q.question_type, limit: q.limit(), offset: q.offset() };
    let rows = acct_db::qa::list(&st.pool, &filter).await?;
    Ok(Json(rows.into_iter().map(QaAuditDto::from).collect::<Vec<_>>()).into_response())
}

// ---------------------------------------------------------------------------
// GET listing endpoints over mirror/exception/snapshot/forecast tables
// ---------------------------------------------------------------------------

pub(crate) async fn list_vouchers(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Response, AppError> {
    let filter = acct_db::voucher::VoucherFilter { run_id: q.run_id, limit: q.limit(), offset: q.offset() };
    let rows = acct_db::voucher::list(&st.pool, &filter).await?;
    Ok(Json(rows.into_iter().map(VoucherDto::from).collect::<Vec<_>>()).into_response())
}

pub(crate) async fn list_bank_transactions(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Response, AppError> {
    let filter =
        acct_db::bank_tx::BankTxFilter { run_id: q.run_id, match_status: q.match_status, limit: q.limit(), offset: q.offset() };
    let rows = acct_db::bank_tx::list(&st.pool, &filter).await?;
    Ok(Json(rows.into_iter().map(BankTxDto::from).collect::<Vec<_>>()).into_response())
}

pub(crate) async fn list_journal_proposals(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Response, AppError> {
    let filter = acct_db::journal::JournalFilter { run_id: q.run_id, status: q.status, limit: q.limit(), offset: q.offset() };
    let rows = acct_db::journal::list_proposals(&st.pool, &filter).await?;
    Ok(Json(rows.into_iter().map(JournalProposalDto::from).collect::<Vec<_>>()).into_response())
}

pub(crate) async fn list_validation_issues(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Response, AppError> {
    let filter = acct_db::validation::ValidationFilter {
        run_id: q.run_id,
        severity: q.severity,
        resolution: q.resolution,
        limit: q.limit(),
        offset: q.offset(),
    };
    let rows = acct_db::validation::list(&st.pool, &filter).await?;
    Ok(Json(rows.into_iter().map(ValidationIssueDto::from).collect::<Vec<_>>()).into_response())
}

pub(crate) async fn list_soft_checks(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Response, AppError> {
    let filter = acct_db::soft_check::SoftCheckFilter { run_id: q.run_id, period: q.period, limit: q.limit(), offset: q.offset() };
    let rows = acct_db::soft_check::list(&st.pool, &filter).await?;
    Ok(Json(rows.into_iter().map(SoftCheckResultDto::from).collect::<Vec<_>>()).into_response())
}

pub(crate) async fn list_snapshots(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Response, AppError> {
    let filter = acct_db::snapshot::SnapshotFilter {
        report_type: q.report_type,
        period: q.period,
        run_id: q.run_id,
        limit: q.limit(),
        offset: q.offset(),
    };
    let rows = acct_db::snapshot::list(&st.pool, &filter).await?;
    Ok(Json(rows.into_iter().map(ReportSnapshotDto::from).collect::<Vec<_>>()).into_response())
}

pub(crate) async fn list_cashflow_forecast(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Response, AppError> {
    let filter =
        acct_db::cashflow::CashflowFilter { run_id: q.run_id, direction: q.direction, limit: q.limit(), offset: q.offset() };
    let rows = acct_db::cashflow::list(&st.pool, &filter).await?;
    Ok(Json(rows.into_iter().map(CashflowForecastDto::from).collect::<Vec<_>>()).into_response())
}
