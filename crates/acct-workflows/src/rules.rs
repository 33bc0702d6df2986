//! Static rule tables: the classification → (debit, credit, confidence) map
//! and the soft-check rule codes. Supplemented from
//! `original_source/.../flows/journal_suggestion.py`'s `_ACCOUNT_MAP`, since
//! SPEC_FULL names the mechanism but not the table contents — a simplified
//! VAS chart-of-accounts subset.

use rust_decimal::Decimal;

fn pct(hundredths: i64) -> Decimal {
    Decimal::new(hundredths, 2)
}

#[derive(Debug, Clone, Copy)]
pub struct AccountMapEntry {
    pub debit_code: &'static str,
    pub debit_name: &'static str,
    pub credit_code: &'static str,
    pub credit_name: &'static str,
    pub base_confidence: Decimal,
}

/// `voucher_type` → debit/credit account pair + base confidence.
pub fn account_map_entry(voucher_type: &str) -> AccountMapEntry {
    match voucher_type {
        "sell_invoice" => AccountMapEntry {
            debit_code: "131",
            debit_name: "Phải thu khách hàng",
            credit_code: "511",
            credit_name: "Doanh thu bán hàng",
            base_confidence: pct(92),
        },
        "buy_invoice" => AccountMapEntry {
            debit_code: "621",
            debit_name: "Chi phí NVL trực tiếp",
            credit_code: "331",
            credit_name: "Phải trả người bán",
            base_confidence: pct(88),
        },
        "receipt" => AccountMapEntry {
            debit_code: "111",
            debit_name: "Tiền mặt",
            credit_code: "131",
            credit_name: "Phải thu khách hàng",
            base_confidence: pct(95),
        },
        "payment" => AccountMapEntry {
            debit_code: "331",
            debit_name: "Phải trả người bán",
            credit_code: "112",
            credit_name: "Tiền gửi ngân hàng",
            base_confidence: pct(90),
        },
        _ => AccountMapEntry {
            debit_code: "642",
            debit_name: "Chi phí QLDN",
            credit_code: "111",
            credit_name: "Tiền mặt",
            base_confidence: pct(55),
        },
    }
}

/// Confidence is multiplied by 0.8 when the voucher has no attachment — a
/// voucher without a scanned source document is less certain regardless of
/// type (carried from the original's classifier).
pub fn confidence_for(voucher_type: &str, has_attachment: bool) -> Decimal {
    let entry = account_map_entry(voucher_type);
    if has_attachment {
        entry.base_confidence
    } else {
        entry.base_confidence * pct(80)
    }
}

/// Normalized Levenshtein-ratio similarity in `[0, 1]`, lowercased and
/// whitespace-collapsed first, the same class of deterministic string metric
/// the reconcile matching uses for partner-name comparison.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let norm = |s: &str| s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let a = norm(a);
    let b = norm(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let dist = levenshtein_distance(&a, &b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        1.0
    } else {
        1.0 - (dist as f64 / max_len as f64)
    }
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `voucher_classify`'s rule-based tag, derived from (voucher_type,
/// type_hint, description). Distinct from `journal_suggestion`'s account
/// map: this assigns a free-text provenance tag, not a GL entry.
pub fn classification_tag(voucher_type: &str, type_hint: Option<&str>, description: Option<&str>) -> String {
    if let Some(hint) = type_hint {
        return hint.to_string();
    }
    if let Some(desc) = description {
        let lower = desc.to_lowercase();
        if lower.contains("hợp đồng") || lower.contains("contract") {
            return format!("{voucher_type}:contract_linked");
        }
    }
    voucher_type.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_penalty_applies_to_base_confidence() {
        let with_attachment = confidence_for("sell_invoice", true);
        let without = confidence_for("sell_invoice", false);
        assert_eq!(with_attachment, pct(92));
        assert_eq!(without, pct(92) * pct(80));
    }

    #[test]
    fn unknown_voucher_type_falls_back_to_other() {
        let entry = account_map_entry("not_a_real_type");
        assert_eq!(entry.debit_code, "642");
        assert_eq!(entry.credit_code, "111");
    }

    #[test]
    fn string_similarity_identical_strings_is_one() {
        assert_eq!(string_similarity("CONG TY ABC", "cong ty abc"), 1.0);
    }

    #[test]
    fn string_similarity_empty_vs_nonempty_is_zero() {
        assert_eq!(string_similarity("", "abc"), 0.0);
    }

    #[test]
    fn string_similarity_is_between_zero_and_one() {
        let s = string_similarity("Nguyen Van A", "Nguyen Van B");
        assert!((0.0..1.0).contains(&s));
    }
}
