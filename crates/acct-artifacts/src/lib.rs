//! Per-run manifest and exported snapshot files (SPEC_FULL.md §4.2, glossary
//! "Run manifest"). `acct-db`/`acct-audit` are the artifact *store* of
//! record; this crate only writes the optional filesystem side-car a run can
//! point at — a JSON descriptor at run start, and, for report snapshots, an
//! exported file a `ReportSnapshot.file_uri` can reference.
//!
//! Grounded on `mqk-artifacts::{RunManifest, init_run_artifacts}` (same
//! shape: create-dir, write placeholders, write a manifest), generalized
//! from the teacher's engine_id/mode/git_hash run identity to this service's
//! run_id/run_type/trigger_type/idempotency_key (SPEC_FULL §3 Run). The
//! teacher's `write_backtest_report` (fills/equity-curve/metrics CSVs) has
//! no counterpart here and was dropped rather than renamed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: i32,
    pub run_id: Uuid,
    pub run_type: String,
    pub trigger_type: String,
    pub idempotency_key: String,
    pub created_at_utc: DateTime<Utc>,
}

pub struct InitRunArtifactsArgs<'a> {
    pub exports_root: &'a Path,
    pub schema_version: i32,
    pub run_id: Uuid,
    pub run_type: &'a str,
    pub trigger_type: &'a str,
    pub idempotency_key: &'a str,
}

pub struct InitRunArtifactsResult {
    pub run_dir: PathBuf,
    pub manifest_path: PathBuf,
}

/// `exports_root/<run_id>/manifest.json`. Called once at run creation;
/// overwriting the manifest on re-invocation is fine since its content is
/// deterministic for a given run row (SPEC_FULL §4.4 idempotency).
pub fn init_run_artifacts(args: InitRunArtifactsArgs<'_>) -> Result<InitRunArtifactsResult> {
    let run_dir = args.exports_root.join(args.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create exports dir failed: {}", run_dir.display()))?;

    let manifest = RunManifest {
        schema_version: args.schema_version,
        run_id: args.run_id,
        run_type: args.run_type.to_string(),
        trigger_type: args.trigger_type.to_string(),
        idempotency_key: args.idempotency_key.to_string(),
        created_at_utc: Utc::now(),
    };

    let manifest_path = run_dir.join("manifest.json");
    let json = serde_json::to_string_pretty(&manifest).context("serialize manifest failed")?;
    fs::write(&manifest_path, format!("{json}\n"))
        .with_context(|| format!("write manifest failed: {}", manifest_path.display()))?;

    Ok(InitRunArtifactsResult { run_dir, manifest_path })
}

/// One exported report-snapshot file, named so a `ReportSnapshot.file_uri`
/// can point straight at it: `<report_type>_<period>_v<version>.json`.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotExport<'a> {
    pub report_type: &'a str,
    pub period: &'a str,
    pub version: i32,
    pub run_id: Uuid,
    pub summary: serde_json::Value,
}

/// Write a report snapshot's summary JSON under `exports_root` and return the
/// `file_uri` (a `file://` path) a caller can store on the snapshot row.
/// Object-storage upload is out of scope (SPEC_FULL §1 Non-goals); this is
/// the local-disk stand-in the original's `file_uri?` column anticipates.
pub fn export_snapshot_file(exports_root: &Path, export: &SnapshotExport<'_>) -> Result<String> {
    fs::create_dir_all(exports_root)
        .with_context(|| format!("create exports root failed: {}", exports_root.display()))?;

    let file_name = format!("{}_{}_v{}.json", export.report_type, export.period, export.version);
    let path = exports_root.join(&file_name);
    let json = serde_json::to_string_pretty(export).context("serialize snapshot export failed")?;
    fs::write(&path, format!("{json}\n")).with_context(|| format!("write snapshot export failed: {}", path.display()))?;

    Ok(format!("file://{}", path.display()))
}

/// Monetary total used when an exported snapshot wants a rounded display
/// value alongside the full-precision `Decimal` stored in Postgres.
pub fn round_2dp(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_run_artifacts_writes_manifest_with_run_identity() {
        let dir = std::env::temp_dir().join(format!("acct-artifacts-test-{}", Uuid::new_v4()));
        let run_id = Uuid::new_v4();

        let result = init_run_artifacts(InitRunArtifactsArgs {
            exports_root: &dir,
            schema_version: 1,
            run_id,
            run_type: "tax_report",
            trigger_type: "manual",
            idempotency_key: "abc123",
        })
        .unwrap();

        let contents = fs::read_to_string(&result.manifest_path).unwrap();
        let manifest: RunManifest = serde_json::from_str(&contents).unwrap();
        assert_eq!(manifest.run_id, run_id);
        assert_eq!(manifest.run_type, "tax_report");
        assert_eq!(manifest.idempotency_key, "abc123");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn export_snapshot_file_names_by_type_period_version() {
        let dir = std::env::temp_dir().join(format!("acct-artifacts-snap-{}", Uuid::new_v4()));
        let uri = export_snapshot_file(
            &dir,
            &SnapshotExport {
                report_type: "vat_list",
                period: "2026-01",
                version: 2,
                run_id: Uuid::new_v4(),
                summary: serde_json::json!({"vat_payable": "100.00"}),
            },
        )
        .unwrap();

        assert!(uri.ends_with("vat_list_2026-01_v2.json"));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn round_2dp_truncates_to_two_decimal_places() {
        let v = Decimal::new(123456, 4); // 12.3456
        assert_eq!(round_2dp(v).scale(), 2);
    }
}
