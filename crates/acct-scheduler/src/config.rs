//! Scheduler configuration (§4.5, §6): a standalone YAML document, not part
//! of `acct-config`'s layered `base.yaml`/`<env>.yaml` chain — the scheduler
//! has exactly one config file, named by `SCHEDULES_YAML`.
//!
//! Grounded on `original_source/.../agent_scheduler/main.py`'s `_load_yaml` +
//! `_expand_env`: `${VAR}` substitution runs over the raw YAML tree before
//! it's deserialized into these structs.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use serde_yaml::Value as YamlValue;

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub agent_base_url: String,
    #[serde(default)]
    pub pollers: HashMap<String, PollerConfig>,
    #[serde(default)]
    pub schedules: HashMap<String, ScheduleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    pub bucket: String,
    pub prefix: String,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    pub run_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub cron: String,
    pub run_type: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_interval_seconds() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Load `path`, expand `${VAR}` scalars against the process environment,
/// then deserialize into [`SchedulerConfig`].
pub fn load(path: &Path) -> Result<SchedulerConfig> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read scheduler config: {}", path.display()))?;
    let mut yaml: YamlValue = serde_yaml::from_str(&raw).with_context(|| format!("parse yaml: {}", path.display()))?;
    expand_env(&mut yaml);
    serde_yaml::from_value(yaml).with_context(|| format!("deserialize scheduler config: {}", path.display()))
}

/// Recursively substitute `${VAR}` occurrences in string scalars with the
/// value of the matching environment variable, or the empty string if unset
/// — mirrors `_expand_env`'s `os.getenv(name, "")` fallback exactly.
fn expand_env(v: &mut YamlValue) {
    match v {
        YamlValue::String(s) => {
            *s = expand_env_str(s);
        }
        YamlValue::Sequence(seq) => {
            for item in seq {
                expand_env(item);
            }
        }
        YamlValue::Mapping(map) => {
            for (_, val) in map.iter_mut() {
                expand_env(val);
            }
        }
        _ => {}
    }
}

fn expand_env_str(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(close) = input[i + 2..].find('}') {
                let name = &input[i + 2..i + 2 + close];
                let is_var_name = !name.is_empty()
                    && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
                if is_var_name {
                    out.push_str(&std::env::var(name).unwrap_or_default());
                    i += 2 + close + 1;
                    continue;
                }
            }
        }
        let ch = input[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_var() {
        std::env::set_var("ACCT_SCHEDULER_TEST_VAR", "resolved");
        assert_eq!(expand_env_str("http://${ACCT_SCHEDULER_TEST_VAR}:8899"), "http://resolved:8899");
    }

    #[test]
    fn unset_var_expands_to_empty_string() {
        std::env::remove_var("ACCT_SCHEDULER_TEST_VAR_UNSET");
        assert_eq!(expand_env_str("x${ACCT_SCHEDULER_TEST_VAR_UNSET}y"), "xy");
    }

    #[test]
    fn leaves_non_var_text_untouched() {
        assert_eq!(expand_env_str("plain text, no vars"), "plain text, no vars");
    }

    #[test]
    fn parses_minimal_document() {
        let yaml = r#"
agent_base_url: "http://localhost:8899"
pollers:
  voucher_drop:
    bucket: acct-vouchers
    prefix: inbox/
    interval_seconds: 15
    run_type: voucher_ingest
schedules:
  tax_report_monthly:
    cron: "0 0 2 * * *"
    run_type: tax_report
    payload:
      period: prev_month
"#;
        let mut v: YamlValue = serde_yaml::from_str(yaml).unwrap();
        expand_env(&mut v);
        let cfg: SchedulerConfig = serde_yaml::from_value(v).unwrap();
        assert_eq!(cfg.agent_base_url, "http://localhost:8899");
        assert!(cfg.pollers["voucher_drop"].enabled);
        assert_eq!(cfg.pollers["voucher_drop"].interval_seconds, 15);
        assert_eq!(cfg.schedules["tax_report_monthly"].run_type, "tax_report");
    }
}
