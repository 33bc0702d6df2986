//! Secrets & auth resolution.
//!
//! This module is the single source of truth for runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only env var *names* (e.g. `"ERPX_TOKEN"`), never values.
//! - At startup, callers invoke [`resolve_secrets`] once.
//! - The returned [`ResolvedSecrets`] is passed into constructors; never scatter
//!   `std::env::var` calls across the codebase.
//! - `Debug` on [`ResolvedSecrets`] redacts values.
//! - Error messages reference the env var NAME, never the value.
//!
//! This service has no run modes (no LIVE/PAPER/BACKTEST) — secrets are simply
//! required or optional by name, matching `/api/auth_mode` and the presence of
//! the corresponding `*_env` pointer in config.

use anyhow::{bail, Result};
use serde_json::Value;

/// All runtime-resolved secrets for one process instantiation.
///
/// Built once at startup via [`resolve_secrets`]. Pass to constructors; do not
/// scatter `std::env::var` calls elsewhere. `Debug` output is redacted.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// ERP bearer token, from the env var named at `/erpx/token_env`. Required.
    pub erpx_token: String,
    /// Postgres DSN, from the env var named at `/db/dsn_env`. Required.
    pub db_dsn: String,
    /// API auth key, from the env var named at `/api/api_key_env`.
    /// `Some` only when `/api/auth_mode == "api_key"`; `None` when `"none"`.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("erpx_token", &"<REDACTED>")
            .field("db_dsn", &"<REDACTED>")
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Read a non-empty string value at `pointer` from a JSON config.
/// Returns `None` if the pointer is absent, not a string, or blank after trim.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Resolve a named environment variable.
/// Returns `None` if the variable is unset or blank. Never returns the value
/// in an error path — callers report the NAME only.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn require_env(pointer: &str, default_var: &str, config_json: &Value) -> Result<String> {
    let var_name = read_str_at(config_json, pointer).unwrap_or_else(|| default_var.to_string());
    resolve_env(&var_name).ok_or_else(|| {
        anyhow::anyhow!(
            "SECRETS_MISSING: required env var '{}' (config pointer {}) is not set or empty",
            var_name,
            pointer,
        )
    })
}

/// Resolve all secrets for this process from the environment.
///
/// `erpx.token_env` and `db.dsn_env` are always required. `api.api_key_env` is
/// required only when `api.auth_mode == "api_key"`; any other value (or an
/// absent pointer, defaulting to `"none"`) leaves `api_key` as `None`.
///
/// # Errors
/// Returns `Err` naming the missing env var (never its value) on the first
/// unresolved required secret, or on an unrecognised `api.auth_mode`.
pub fn resolve_secrets(config_json: &Value) -> Result<ResolvedSecrets> {
    let erpx_token = require_env("/erpx/token_env", "ERPX_TOKEN", config_json)?;
    let db_dsn = require_env("/db/dsn_env", "ACCT_DB_DSN", config_json)?;

    let auth_mode = read_str_at(config_json, "/api/auth_mode").unwrap_or_else(|| "none".to_string());
    let api_key = match auth_mode.as_str() {
        "none" => None,
        "api_key" => Some(require_env("/api/api_key_env", "ACCT_API_KEY", config_json)?),
        other => bail!("SECRETS_UNKNOWN_AUTH_MODE: unrecognised api.auth_mode '{other}'; expected 'none' or 'api_key'"),
    };

    Ok(ResolvedSecrets {
        erpx_token,
        db_dsn,
        api_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Sentinel var names are globally unique so tests never race on real
    // environment state.

    #[test]
    fn fails_when_erpx_token_env_missing() {
        let cfg = json!({
            "erpx": {"token_env": "ACCT_SECRETS_TEST_ERPX_MISSING_A1"},
            "db": {"dsn_env": "ACCT_SECRETS_TEST_DB_MISSING_A1"}
        });
        let err = resolve_secrets(&cfg).unwrap_err().to_string();
        assert!(err.contains("SECRETS_MISSING"));
        assert!(err.contains("ACCT_SECRETS_TEST_ERPX_MISSING_A1"));
    }

    #[test]
    fn api_key_not_required_when_auth_mode_none() {
        std::env::set_var("ACCT_SECRETS_TEST_ERPX_B2", "erpx-token-value");
        std::env::set_var("ACCT_SECRETS_TEST_DB_B2", "postgres://localhost/acct");
        let cfg = json!({
            "erpx": {"token_env": "ACCT_SECRETS_TEST_ERPX_B2"},
            "db": {"dsn_env": "ACCT_SECRETS_TEST_DB_B2"},
            "api": {"auth_mode": "none"}
        });
        let secrets = resolve_secrets(&cfg).unwrap();
        assert!(secrets.api_key.is_none());
    }

    #[test]
    fn api_key_required_when_auth_mode_api_key() {
        std::env::set_var("ACCT_SECRETS_TEST_ERPX_C3", "erpx-token-value");
        std::env::set_var("ACCT_SECRETS_TEST_DB_C3", "postgres://localhost/acct");
        let cfg = json!({
            "erpx": {"token_env": "ACCT_SECRETS_TEST_ERPX_C3"},
            "db": {"dsn_env": "ACCT_SECRETS_TEST_DB_C3"},
            "api": {"auth_mode": "api_key", "api_key_env": "ACCT_SECRETS_TEST_APIKEY_MISSING_C3"}
        });
        let err = resolve_secrets(&cfg).unwrap_err().to_string();
        assert!(err.contains("SECRETS_MISSING"));
        assert!(err.contains("ACCT_SECRETS_TEST_APIKEY_MISSING_C3"));
    }

    #[test]
    fn unknown_auth_mode_rejected() {
        std::env::set_var("ACCT_SECRETS_TEST_ERPX_D4", "erpx-token-value");
        std::env::set_var("ACCT_SECRETS_TEST_DB_D4", "postgres://localhost/acct");
        let cfg = json!({
            "erpx": {"token_env": "ACCT_SECRETS_TEST_ERPX_D4"},
            "db": {"dsn_env": "ACCT_SECRETS_TEST_DB_D4"},
            "api": {"auth_mode": "basic"}
        });
        let err = resolve_secrets(&cfg).unwrap_err().to_string();
        assert!(err.contains("SECRETS_UNKNOWN_AUTH_MODE"));
    }

    #[test]
    fn debug_output_is_redacted() {
        std::env::set_var("ACCT_SECRETS_TEST_ERPX_E5", "super-secret-token");
        std::env::set_var("ACCT_SECRETS_TEST_DB_E5", "postgres://user:pw@host/db");
        let cfg = json!({
            "erpx": {"token_env": "ACCT_SECRETS_TEST_ERPX_E5"},
            "db": {"dsn_env": "ACCT_SECRETS_TEST_DB_E5"}
        });
        let secrets = resolve_secrets(&cfg).unwrap();
        let debug_str = format!("{secrets:?}");
        assert!(!debug_str.contains("super-secret-token"));
        assert!(!debug_str.contains("user:pw"));
        assert!(debug_str.contains("REDACTED"));
    }
}
