//! Templated Q&A answering (SPEC_FULL §4.7, §6: "a Q&A POST that answers a
//! small set of templated questions"). Pure read-only queries over the
//! mirror/proposal tables the workflows already populate; no ERP calls, no
//! run row, no LLM — a rule-based template match on the question text, the
//! same "rule-based result is authoritative" posture as `rules.rs`'s
//! journal-classification table (SPEC_FULL Design Note: "LLM refinement is
//! optional augmentation... the rule-based result is authoritative").

use acct_db::{bank_tx, cashflow, journal, validation, voucher};
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// The five templated question shapes named in SPEC_FULL §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    VoucherCounts,
    JournalExplanation,
    AnomalySummary,
    CashflowSummary,
    Fallback,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::VoucherCounts => "voucher_counts",
            QuestionType::JournalExplanation => "journal_explanation",
            QuestionType::AnomalySummary => "anomaly_summary",
            QuestionType::CashflowSummary => "cashflow_summary",
            QuestionType::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QaAnswer {
    pub question_type: QuestionType,
    pub answer: String,
}

/// Classify free-text into one of the five templates by keyword match, then
/// compute the answer from current mirror/proposal state. A question
/// referencing a journal proposal id (a UUID substring) is always routed to
/// `JournalExplanation` regardless of other keywords, since that's the only
/// template with a specific target to look up.
pub async fn answer_question(pool: &PgPool, question: &str) -> anyhow::Result<QaAnswer> {
    let q = question.to_lowercase();

    if let Some(id) = extract_uuid(question) {
        if let Ok(answer) = explain_journal_proposal(pool, id).await {
            return Ok(QaAnswer { question_type: QuestionType::JournalExplanation, answer });
        }
    }

    if q.contains("anomaly") || q.contains("anomalies") || q.contains("suspicious") || q.contains("flagged") {
        return Ok(QaAnswer { question_type: QuestionType::AnomalySummary, answer: anomaly_summary(pool).await? });
    }

    if q.contains("cashflow") || q.contains("cash flow") || q.contains("forecast") || q.contains("inflow") || q.contains("outflow")
    {
        return Ok(QaAnswer { question_type: QuestionType::CashflowSummary, answer: cashflow_summary(pool).await? });
    }

    if q.contains("voucher") && (q.contains("how many") || q.contains("count")) {
        return Ok(QaAnswer { question_type: QuestionType::VoucherCounts, answer: voucher_counts(pool).await? });
    }

    Ok(QaAnswer {
        question_type: QuestionType::Fallback,
        answer: "I can answer questions about voucher counts, journal proposal explanations, \
                 anomaly summaries, and cashflow forecasts. Try rephrasing, or include a journal \
                 proposal id to get an explanation for a specific entry."
            .to_string(),
    })
}

fn extract_uuid(text: &str) -> Option<Uuid> {
    text.split(|c: char| !c.is_ascii_hexdigit() && c != '-').find_map(|tok| Uuid::parse_str(tok).ok())
}

async fn voucher_counts(pool: &PgPool) -> anyhow::Result<String> {
    let vouchers = voucher::list(pool, &voucher::VoucherFilter { run_id: None, limit: 100_000, offset: 0 }).await?;
    let total = vouchers.len();
    let classified = vouchers.iter().filter(|v| v.classification_tag.is_some()).count();
    let with_attachment = vouchers.iter().filter(|v| v.has_attachment).count();
    Ok(format!(
        "There are {total} voucher(s) on file; {classified} classified and {with_attachment} with an attachment."
    ))
}

async fn explain_journal_proposal(pool: &PgPool, proposal_id: Uuid) -> anyhow::Result<String> {
    let proposal = journal::fetch_proposal(pool, proposal_id).await?;
    let lines = journal::fetch_lines(pool, proposal_id).await?;

    let debit_total: Decimal = lines.iter().map(|l| l.debit).sum();
    let credit_total: Decimal = lines.iter().map(|l| l.credit).sum();

    let line_desc: Vec<String> = lines
        .iter()
        .map(|l| format!("{} ({}): debit {} / credit {}", l.account_name, l.account_code, l.debit, l.credit))
        .collect();

    Ok(format!(
        "Proposal {proposal_id} ({status}, confidence {confidence}): {description}. Reasoning: {reasoning}. \
         Lines: {lines}. Debit total {debit_total}, credit total {credit_total}.",
        proposal_id = proposal.proposal_id,
        status = proposal.status,
        confidence = proposal.confidence,
        description = proposal.description,
        reasoning = proposal.reasoning,
        lines = line_desc.join("; "),
    ))
}

async fn anomaly_summary(pool: &PgPool) -> anyhow::Result<String> {
    let anomalies = bank_tx::list(
        pool,
        &bank_tx::BankTxFilter { run_id: None, match_status: Some("anomaly".to_string()), limit: 1000, offset: 0 },
    )
    .await?;

    let open_issues = validation::list(
        pool,
        &validation::ValidationFilter {
            run_id: None,
            severity: None,
            resolution: Some("open".to_string()),
            limit: 1000,
            offset: 0,
        },
    )
    .await?;

    let errors = open_issues.iter().filter(|i| i.severity == "error" || i.severity == "critical").count();
    let warnings = open_issues.iter().filter(|i| i.severity == "warning").count();

    Ok(format!(
        "{anomaly_count} bank transaction(s) flagged as anomalies; {open} open validation issue(s) \
         ({errors} error-or-critical, {warnings} warning).",
        anomaly_count = anomalies.len(),
        open = open_issues.len(),
    ))
}

async fn cashflow_summary(pool: &PgPool) -> anyhow::Result<String> {
    let rows = cashflow::list(pool, &cashflow::CashflowFilter { run_id: None, direction: None, limit: 10_000, offset: 0 })
        .await?;

    let inflow: Decimal = rows.iter().filter(|r| r.direction == "inflow").map(|r| r.amount).sum();
    let outflow: Decimal = rows.iter().filter(|r| r.direction == "outflow").map(|r| r.amount).sum();
    let net = inflow - outflow;

    Ok(format!(
        "Forecast totals: inflow {inflow}, outflow {outflow}, net {net} across {count} row(s) as of {today}.",
        count = rows.len(),
        today = Utc::now().date_naive(),
    ))
}
