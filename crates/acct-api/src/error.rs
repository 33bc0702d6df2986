//! One error enum for every handler (SPEC_FULL §7 "Rust realization"):
//! `Validation`, `Conflict`, `Upstream`, `Storage`, `Logic`, each mapped to
//! the status codes §7's error taxonomy names, as a JSON `{error, detail}`
//! body — the same shape as the teacher's `GateRefusedResponse`.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Conflict(String),
    NotFound(String),
    Upstream(String),
    Storage(String),
    Logic(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, label, detail) = match self {
            AppError::Validation(d) => (StatusCode::BAD_REQUEST, "VALIDATION", d),
            AppError::Conflict(d) => (StatusCode::CONFLICT, "CONFLICT", d),
            AppError::NotFound(d) => (StatusCode::NOT_FOUND, "NOT_FOUND", d),
            AppError::Upstream(d) => (StatusCode::BAD_GATEWAY, "UPSTREAM", d),
            AppError::Storage(d) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE", d),
            AppError::Logic(d) => (StatusCode::INTERNAL_SERVER_ERROR, "LOGIC", d),
        };
        (status, Json(ErrorBody { error: label.to_string(), detail })).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<acct_approval::ApprovalError> for AppError {
    fn from(e: acct_approval::ApprovalError) -> Self {
        match e {
            acct_approval::ApprovalError::MissingEvidenceAck => AppError::Validation(e.to_string()),
            acct_approval::ApprovalError::MakerIsChecker => AppError::Conflict(e.to_string()),
            acct_approval::ApprovalError::AlreadyTerminal { .. } => AppError::Conflict(e.to_string()),
            acct_approval::ApprovalError::ProposalNotFound => AppError::NotFound(e.to_string()),
            acct_approval::ApprovalError::Storage(err) => AppError::Storage(err.to_string()),
        }
    }
}
