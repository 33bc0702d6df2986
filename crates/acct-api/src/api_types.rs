//! Request and response types for every `acct-api` HTTP endpoint (SPEC_FULL
//! §6). `Serialize + Deserialize` only — no business logic lives here.
//! Row structs in `acct-db` don't derive `Serialize` by design (they're
//! persistence types, not wire types); the `*Dto::from` conversions here are
//! the one allowed seam between the two.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Common
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListQuery {
    pub run_type: Option<String>,
    pub status: Option<String>,
    pub period: Option<String>,
    pub report_type: Option<String>,
    pub match_status: Option<String>,
    pub direction: Option<String>,
    pub severity: Option<String>,
    pub resolution: Option<String>,
    pub question_type: Option<String>,
    pub run_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 500)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

// ---------------------------------------------------------------------------
// GET /healthz, /readyz
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadyResponse {
    pub ok: bool,
    pub db_reachable: bool,
    pub schema_ready: bool,
}

// ---------------------------------------------------------------------------
// GET /graphs, /graphs/{name}
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GraphListResponse {
    pub run_types: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphResponse {
    pub run_type: String,
    /// Every registered workflow follows this shape (§4.3).
    pub shape: &'static str,
}

// ---------------------------------------------------------------------------
// POST /agent/v1/runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRunRequest {
    pub run_type: String,
    pub trigger_type: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRunResponse {
    pub run_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunDto {
    pub run_id: Uuid,
    pub run_type: String,
    pub trigger_type: String,
    pub status: &'static str,
    pub idempotency_key: String,
    pub cursor_in: Value,
    pub cursor_out: Value,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stats: Value,
}

impl From<acct_db::run::RunRow> for RunDto {
    fn from(r: acct_db::run::RunRow) -> Self {
        Self {
            run_id: r.run_id,
            run_type: r.run_type,
            trigger_type: r.trigger_type,
            status: r.status.as_str(),
            idempotency_key: r.idempotency_key,
            cursor_in: r.cursor_in,
            cursor_out: r.cursor_out,
            started_at: r.started_at,
            finished_at: r.finished_at,
            stats: r.stats,
        }
    }
}

// ---------------------------------------------------------------------------
// POST /agent/v1/contract/proposals/{id}/approvals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalRequestBody {
    pub decision: String,
    pub approver_id: String,
    pub evidence_ack: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalResponse {
    pub approval_id: Uuid,
    pub proposal_id: Uuid,
    pub decision: String,
    pub proposal_status: String,
    pub replay: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractProposalDto {
    pub proposal_id: Uuid,
    pub case_id: String,
    pub obligation_id: Option<String>,
    pub proposal_type: String,
    pub title: String,
    pub summary: String,
    pub details: Value,
    pub risk_level: String,
    pub confidence: Decimal,
    pub status: String,
    pub created_by: String,
    pub tier: i16,
    pub evidence_summary_hash: String,
    pub proposal_key: String,
    pub run_id: Option<Uuid>,
}

impl From<acct_db::contract_proposal::ContractProposalRow> for ContractProposalDto {
    fn from(r: acct_db::contract_proposal::ContractProposalRow) -> Self {
        Self {
            proposal_id: r.proposal_id,
            case_id: r.case_id,
            obligation_id: r.obligation_id,
            proposal_type: r.proposal_type,
            title: r.title,
            summary: r.summary,
            details: r.details,
            risk_level: r.risk_level,
            confidence: r.confidence,
            status: r.status,
            created_by: r.created_by,
            tier: r.tier,
            evidence_summary_hash: r.evidence_summary_hash,
            proposal_key: r.proposal_key,
            run_id: r.run_id,
        }
    }
}

// ---------------------------------------------------------------------------
// POST /agent/v1/tier-b/feedback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TierBFeedbackRequest {
    pub obligation_id: String,
    pub feedback_type: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub delta: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierBFeedbackResponse {
    pub id: Uuid,
}

// ---------------------------------------------------------------------------
// POST /agent/v1/qa, GET /agent/v1/qa
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct QaRequest {
    pub question: String,
    #[serde(default)]
    pub run_id: Option<Uuid>,
    #[serde(default)]
    pub asked_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaResponse {
    pub id: Uuid,
    pub question_type: &'static str,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaAuditDto {
    pub id: Uuid,
    pub question: String,
    pub question_type: String,
    pub answer: String,
    pub run_id: Option<Uuid>,
    pub asked_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<acct_db::qa::QaAuditRow> for QaAuditDto {
    fn from(r: acct_db::qa::QaAuditRow) -> Self {
        Self {
            id: r.id,
            question: r.question,
            question_type: r.question_type,
            answer: r.answer,
            run_id: r.run_id,
            asked_by: r.asked_by,
            created_at: r.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Mirror / proposal / exception / snapshot / forecast listing DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct VoucherDto {
    pub id: Uuid,
    pub erp_voucher_id: Option<String>,
    pub voucher_no: String,
    pub voucher_type: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub partner_name: Option<String>,
    pub partner_tax_code: Option<String>,
    pub has_attachment: bool,
    pub source: String,
    pub type_hint: Option<String>,
    pub classification_tag: Option<String>,
    pub run_id: Option<Uuid>,
    pub synced_at: DateTime<Utc>,
}

impl From<acct_db::voucher::VoucherRow> for VoucherDto {
    fn from(r: acct_db::voucher::VoucherRow) -> Self {
        Self {
            id: r.id,
            erp_voucher_id: r.erp_voucher_id,
            voucher_no: r.voucher_no,
            voucher_type: r.voucher_type,
            date: r.date,
            amount: r.amount,
            currency: r.currency,
            partner_name: r.partner_name,
            partner_tax_code: r.partner_tax_code,
            has_attachment: r.has_attachment,
            source: r.source,
            type_hint: r.type_hint,
            classification_tag: r.classification_tag,
            run_id: r.run_id,
            synced_at: r.synced_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BankTxDto {
    pub id: Uuid,
    pub bank_tx_ref: String,
    pub bank_account: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub counterparty: Option<String>,
    pub memo: Option<String>,
    pub matched_voucher_id: Option<Uuid>,
    pub match_status: String,
    pub synced_at: DateTime<Utc>,
}

impl From<acct_db::bank_tx::BankTxRow> for BankTxDto {
    fn from(r: acct_db::bank_tx::BankTxRow) -> Self {
        Self {
            id: r.id,
            bank_tx_ref: r.bank_tx_ref,
            bank_account: r.bank_account,
            date: r.date,
            amount: r.amount,
            currency: r.currency,
            counterparty: r.counterparty,
            memo: r.memo,
            matched_voucher_id: r.matched_voucher_id,
            match_status: r.match_status,
            synced_at: r.synced_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalProposalDto {
    pub proposal_id: Uuid,
    pub voucher_id: Uuid,
    pub description: String,
    pub confidence: Decimal,
    pub reasoning: String,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub run_id: Option<Uuid>,
}

impl From<acct_db::journal::JournalProposalRow> for JournalProposalDto {
    fn from(r: acct_db::journal::JournalProposalRow) -> Self {
        Self {
            proposal_id: r.proposal_id,
            voucher_id: r.voucher_id,
            description: r.description,
            confidence: r.confidence,
            reasoning: r.reasoning,
            status: r.status,
            reviewed_by: r.reviewed_by,
            reviewed_at: r.reviewed_at,
            run_id: r.run_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssueDto {
    pub id: Uuid,
    pub rule_code: String,
    pub severity: String,
    pub message: String,
    pub erp_ref: Option<String>,
    pub details: Value,
    pub resolution: String,
    pub run_id: Option<Uuid>,
}

impl From<acct_db::validation::ValidationIssueRow> for ValidationIssueDto {
    fn from(r: acct_db::validation::ValidationIssueRow) -> Self {
        Self {
            id: r.id,
            rule_code: r.rule_code,
            severity: r.severity,
            message: r.message,
            erp_ref: r.erp_ref,
            details: r.details,
            resolution: r.resolution,
            run_id: r.run_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SoftCheckResultDto {
    pub id: Uuid,
    pub period: String,
    pub total_checks: i32,
    pub passed: i32,
    pub warnings: i32,
    pub errors: i32,
    pub score: Decimal,
    pub run_id: Option<Uuid>,
}

impl From<acct_db::soft_check::SoftCheckResultRow> for SoftCheckResultDto {
    fn from(r: acct_db::soft_check::SoftCheckResultRow) -> Self {
        Self {
            id: r.id,
            period: r.period,
            total_checks: r.total_checks,
            passed: r.passed,
            warnings: r.warnings,
            errors: r.errors,
            score: r.score,
            run_id: r.run_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSnapshotDto {
    pub id: Uuid,
    pub report_type: String,
    pub period: String,
    pub version: i32,
    pub file_uri: Option<String>,
    pub summary_json: Value,
    pub run_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<acct_db::snapshot::ReportSnapshotRow> for ReportSnapshotDto {
    fn from(r: acct_db::snapshot::ReportSnapshotRow) -> Self {
        Self {
            id: r.id,
            report_type: r.report_type,
            period: r.period,
            version: r.version,
            file_uri: r.file_uri,
            summary_json: r.summary_json,
            run_id: r.run_id,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CashflowForecastDto {
    pub id: Uuid,
    pub forecast_date: NaiveDate,
    pub direction: String,
    pub amount: Decimal,
    pub currency: String,
    pub source_type: String,
    pub source_ref: Option<String>,
    pub confidence: Decimal,
    pub run_id: Option<Uuid>,
}

impl From<acct_db::cashflow::CashflowRowRecord> for CashflowForecastDto {
    fn from(r: acct_db::cashflow::CashflowRowRecord) -> Self {
        Self {
            id: r.id,
            forecast_date: r.forecast_date,
            direction: r.direction,
            amount: r.amount,
            currency: r.currency,
            source_type: r.source_type,
            source_ref: r.source_ref,
            confidence: r.confidence,
            run_id: r.run_id,
        }
    }
}
