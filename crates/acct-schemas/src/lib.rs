//! Shared wire types for ERP records and accounting artifacts.
//!
//! Records returned by the ERP client are semantically opaque at the client
//! boundary (SPEC design note): each workflow reads the fields it needs and
//! ignores the rest, rather than the client committing to one schema per
//! endpoint. `ErpRecord` captures that — a tagged JSON object with typed
//! accessors for the handful of primitive shapes workflows actually pull out.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// One record returned by the ERP client (a voucher, invoice, bank tx, ...).
///
/// Deserializes any JSON object; unknown fields are kept, not rejected, so
/// new ERP fields never break older workflow code reading an older subset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErpRecord(pub Map<String, Value>);

impl ErpRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str()
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key)?.as_bool()
    }

    /// Monetary/numeric fields arrive as either a JSON number or a decimal
    /// string (ERPs vary); both are accepted.
    pub fn decimal(&self, key: &str) -> Option<Decimal> {
        match self.0.get(key)? {
            Value::String(s) => Decimal::from_str(s).ok(),
            Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
            _ => None,
        }
    }
}

/// Fields read by the voucher-ingest/journal-suggestion/classify workflows.
/// A typed convenience view over `ErpRecord`; still tolerant of extra fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherFields {
    pub erp_voucher_id: Option<String>,
    pub voucher_no: String,
    pub voucher_type: String,
    pub date: String,
    pub amount: Decimal,
    pub currency: String,
    pub partner_name: Option<String>,
    pub partner_tax_code: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub has_attachment: bool,
    pub type_hint: Option<String>,
}

/// Fields read by the bank-reconcile workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransactionFields {
    pub bank_tx_ref: String,
    pub bank_account: String,
    pub date: String,
    pub amount: Decimal,
    pub currency: String,
    pub counterparty: Option<String>,
    pub memo: Option<String>,
}

impl BankTransactionFields {
    /// Best-effort parse; records missing a required field are skipped by
    /// the caller rather than failing the whole batch.
    pub fn from_record(r: &ErpRecord) -> Option<Self> {
        Some(Self {
            bank_tx_ref: r.str("bank_tx_ref")?.to_string(),
            bank_account: r.str("bank_account").unwrap_or_default().to_string(),
            date: r.str("date")?.to_string(),
            amount: r.decimal("amount")?,
            currency: r.str("currency").unwrap_or("VND").to_string(),
            counterparty: r.str("counterparty").map(str::to_string),
            memo: r.str("memo").map(str::to_string),
        })
    }
}

/// Fields read by the tax-report/soft-checks workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceFields {
    pub invoice_no: String,
    pub inv_type: String, // "sell" | "buy"
    pub amount: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub due_date: Option<String>,
    pub status: String, // "paid" | "unpaid"
}

impl InvoiceFields {
    pub fn from_record(r: &ErpRecord) -> Option<Self> {
        Some(Self {
            invoice_no: r.str("invoice_no")?.to_string(),
            inv_type: r.str("inv_type").unwrap_or("sell").to_string(),
            amount: r.decimal("amount")?,
            vat_rate: r.decimal("vat_rate").unwrap_or_default(),
            vat_amount: r.decimal("vat_amount").unwrap_or_default(),
            due_date: r.str("due_date").map(str::to_string),
            status: r.str("status").unwrap_or("unpaid").to_string(),
        })
    }
}
