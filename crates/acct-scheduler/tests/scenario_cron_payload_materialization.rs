//! Cron payload template expansion (§4.5 "Cron loop"): `updated_after_hours`,
//! `period: prev_month | this_month`, `as_of: today`.

use acct_scheduler::cron_loop::materialize_payload;
use chrono::{TimeZone, Utc};
use serde_json::{json, Map};

fn template(pairs: &[(&str, serde_json::Value)]) -> Map<String, serde_json::Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn expands_prev_month_across_a_year_boundary() {
    let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
    let out = materialize_payload(&template(&[("period", json!("prev_month"))]), now);
    assert_eq!(out["period"], json!("2025-12"));
}

#[test]
fn expands_this_month() {
    let now = Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap();
    let out = materialize_payload(&template(&[("period", json!("this_month"))]), now);
    assert_eq!(out["period"], json!("2026-07"));
}

#[test]
fn expands_as_of_today() {
    let now = Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap();
    let out = materialize_payload(&template(&[("as_of", json!("today"))]), now);
    assert_eq!(out["as_of"], json!("2026-07-28"));
}

#[test]
fn expands_updated_after_hours_to_an_iso_timestamp() {
    let now = Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap();
    let out = materialize_payload(&template(&[("updated_after_hours", json!(24))]), now);
    let ts = out["updated_after"].as_str().unwrap();
    let parsed: chrono::DateTime<Utc> = ts.parse().unwrap();
    assert_eq!(parsed, now - chrono::Duration::hours(24));
}

#[test]
fn passes_through_unknown_keys_unchanged() {
    let now = Utc::now();
    let out = materialize_payload(&template(&[("some_literal", json!("x"))]), now);
    assert_eq!(out["some_literal"], json!("x"));
}
