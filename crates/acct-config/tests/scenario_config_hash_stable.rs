//! Config hash stability: reordering keys or splitting a config across layered
//! files must not change `config_hash`, but a changed value must.

use acct_config::load_layered_yaml;
use std::io::Write;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

const BASE_YAML: &str = r#"
erpx:
  base_url: "https://erp.example.com"
  token_env: "ERPX_TOKEN"
db:
  dsn_env: "ACCT_DB_DSN"
"#;

const BASE_YAML_REORDERED: &str = r#"
db:
  dsn_env: "ACCT_DB_DSN"
erpx:
  token_env: "ERPX_TOKEN"
  base_url: "https://erp.example.com"
"#;

const OVERLAY_YAML: &str = r#"
erpx:
  base_url: "https://erp-staging.example.com"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let f1 = write_temp(BASE_YAML);
    let f2 = write_temp(BASE_YAML);
    let a = load_layered_yaml(&[f1.path().to_str().unwrap()]).unwrap();
    let b = load_layered_yaml(&[f2.path().to_str().unwrap()]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let f1 = write_temp(BASE_YAML);
    let f2 = write_temp(BASE_YAML_REORDERED);
    let original = load_layered_yaml(&[f1.path().to_str().unwrap()]).unwrap();
    let reordered = load_layered_yaml(&[f2.path().to_str().unwrap()]).unwrap();

    assert_eq!(original.config_hash, reordered.config_hash);
    assert_eq!(original.canonical_json, reordered.canonical_json);
}

#[test]
fn different_values_produce_different_hash() {
    let f1 = write_temp(BASE_YAML);
    let f2 = write_temp(
        r#"
erpx:
  base_url: "https://different.example.com"
  token_env: "ERPX_TOKEN"
db:
  dsn_env: "ACCT_DB_DSN"
"#,
    );
    let a = load_layered_yaml(&[f1.path().to_str().unwrap()]).unwrap();
    let b = load_layered_yaml(&[f2.path().to_str().unwrap()]).unwrap();

    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn layered_overlay_overrides_base_and_stays_stable() {
    let base = write_temp(BASE_YAML);
    let overlay = write_temp(OVERLAY_YAML);

    let a = load_layered_yaml(&[base.path().to_str().unwrap(), overlay.path().to_str().unwrap()]).unwrap();
    let b = load_layered_yaml(&[base.path().to_str().unwrap(), overlay.path().to_str().unwrap()]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);

    let url = a.config_json.pointer("/erpx/base_url").and_then(|v| v.as_str()).unwrap();
    assert_eq!(url, "https://erp-staging.example.com");

    // token_env from the base layer is preserved, not clobbered by the overlay.
    let token_env = a.config_json.pointer("/erpx/token_env").and_then(|v| v.as_str()).unwrap();
    assert_eq!(token_env, "ERPX_TOKEN");
}

#[test]
fn hash_is_64_hex_chars() {
    let f = write_temp(BASE_YAML);
    let loaded = load_layered_yaml(&[f.path().to_str().unwrap()]).unwrap();

    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn empty_config_produces_stable_hash() {
    let f1 = write_temp("{}");
    let f2 = write_temp("{}");
    let a = load_layered_yaml(&[f1.path().to_str().unwrap()]).unwrap();
    let b = load_layered_yaml(&[f2.path().to_str().unwrap()]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
}
