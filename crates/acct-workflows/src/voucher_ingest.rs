//! `voucher_ingest`: load documents from `{payload, vn_fixtures,
//! object_store_drop}`, normalize into voucher mirror rows, dedup by
//! `(voucher_no, source)`. Grounded on
//! `original_source/.../flows/voucher_ingest.py`. Currently uses the
//! built-in fixture parser; designed to be plug-compatible with a real OCR
//! engine behind the same `IngestSource` enum later.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use acct_db::voucher::{self, NewVoucher};

use crate::engine::{Workflow, WorkflowCtx, WorkflowOutcome};

pub struct VoucherIngestWorkflow;

/// Distinct from the persisted `source` column (§9 Open Question,
/// resolved): this enum selects where documents come from; the column
/// additionally carries a fixture/document provenance tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestSource {
    VnFixtures,
    Payload,
    ObjectStoreDrop,
}

impl IngestSource {
    fn from_str(s: &str) -> Self {
        match s {
            "payload" => IngestSource::Payload,
            "object_store_drop" | "erpx" | "erpx_mock" => IngestSource::ObjectStoreDrop,
            _ => IngestSource::VnFixtures,
        }
    }
}

struct NormalizedDoc {
    voucher_no: String,
    voucher_type: &'static str,
    date: &'static str,
    amount: Decimal,
    currency: &'static str,
    partner_name: String,
    type_hint: &'static str,
    raw_payload: Value,
}

/// The three-document Vietnamese sample from `original_source`, wired as
/// `IngestSource::VnFixtures`'s document list — the fixture referenced by
/// the ingest idempotency scenario, not invented fresh.
fn vn_fixtures() -> Vec<NormalizedDoc> {
    vec![
        NormalizedDoc {
            voucher_no: "0000123".to_string(),
            voucher_type: "sell_invoice",
            date: "2025-01-15",
            amount: Decimal::new(11_000_000_00, 2),
            currency: "VND",
            partner_name: "CÔNG TY CP XYZ".to_string(),
            type_hint: "invoice_vat",
            raw_payload: json!({
                "invoice_no": "0000123", "issue_date": "2025-01-15",
                "seller_name": "CÔNG TY TNHH ABC", "seller_tax_code": "0312345678",
                "buyer_name": "CÔNG TY CP XYZ", "buyer_tax_code": "0318765432",
                "subtotal": 10_000_000, "vat_rate": 10, "vat_amount": 1_000_000,
                "total_amount": 11_000_000, "currency": "VND", "doc_type": "invoice_vat",
                "description": "Bán hàng hóa theo hợp đồng 01/2025",
            }),
        },
        NormalizedDoc {
            voucher_no: "PC0001".to_string(),
            voucher_type: "payment",
            date: "2025-01-20",
            amount: Decimal::new(2_500_000_00, 2),
            currency: "VND",
            partner_name: "Nguyễn Văn A".to_string(),
            type_hint: "cash_disbursement",
            raw_payload: json!({
                "doc_no": "PC0001", "issue_date": "2025-01-20",
                "payer": "CÔNG TY TNHH ABC", "payee": "Nguyễn Văn A",
                "description": "Chi tiền tiếp khách", "amount": 2_500_000,
                "currency": "VND", "doc_type": "cash_disbursement",
            }),
        },
        NormalizedDoc {
            voucher_no: "PT0001".to_string(),
            voucher_type: "receipt",
            date: "2025-01-22",
            amount: Decimal::new(5_000_000_00, 2),
            currency: "VND",
            partner_name: "Trần Thị B".to_string(),
            type_hint: "cash_receipt",
            raw_payload: json!({
                "doc_no": "PT0001", "issue_date": "2025-01-22",
                "payer": "Trần Thị B", "payee": "CÔNG TY TNHH ABC",
                "description": "Thu tiền thanh toán hóa đơn", "amount": 5_000_000,
                "currency": "VND", "doc_type": "cash_receipt",
            }),
        },
    ]
}

/// No real OCR engine is wired yet, so every source falls back to the
/// built-in fixture set — `Payload`/`ObjectStoreDrop` are accepted inputs
/// for forward compatibility but currently resolve the same way
/// `VnFixtures` does, mirroring the original's "unknown source" fallback.
fn load_documents(_source: IngestSource, _payload: &Value) -> Vec<NormalizedDoc> {
    vn_fixtures()
}

#[async_trait]
impl Workflow for VoucherIngestWorkflow {
    fn run_type(&self) -> &'static str {
        "voucher_ingest"
    }

    async fn run(&self, ctx: &WorkflowCtx) -> WorkflowOutcome {
        let source_str = ctx.cursor_in.get("source").and_then(|v| v.as_str()).unwrap_or("vn_fixtures");
        let source = IngestSource::from_str(source_str);
        let docs = load_documents(source, &ctx.cursor_in);

        let mut created = 0u64;
        let mut skipped = 0u64;
        let mut errors = Vec::new();

        for doc in &docs {
            let date = match doc.date.parse::<NaiveDate>() {
                Ok(d) => d,
                Err(e) => {
                    errors.push(format!("voucher {}: unparseable date: {e}", doc.voucher_no));
                    continue;
                }
            };

            let new_voucher = NewVoucher {
                erp_voucher_id: Some(format!("ingest-{}-{}", doc.voucher_no, ctx.run_id)),
                voucher_no: doc.voucher_no.clone(),
                voucher_type: doc.voucher_type.to_string(),
                date,
                amount: doc.amount,
                currency: doc.currency.to_string(),
                partner_name: Some(doc.partner_name.clone()),
                partner_tax_code: None,
                has_attachment: false,
                source: "mock_vn_fixture".to_string(),
                type_hint: Some(doc.type_hint.to_string()),
                raw_payload: doc.raw_payload.clone(),
                run_id: ctx.run_id,
            };

            match voucher::insert_if_absent(&ctx.pool, &new_voucher).await {
                Ok((_, inserted)) => {
                    if inserted {
                        created += 1;
                    } else {
                        skipped += 1;
                    }
                }
                Err(e) => errors.push(format!("voucher {}: insert_if_absent failed: {e:#}", doc.voucher_no)),
            }
        }

        if !errors.is_empty() && created == 0 && skipped == 0 {
            return WorkflowOutcome::failed(errors);
        }

        WorkflowOutcome::ok(
            json!({"source": source_str}),
            json!({
                "count_new_vouchers": created,
                "skipped_existing": skipped,
                "total_documents": docs.len(),
                "errors": errors,
            }),
        )
    }
}
