//! Append-only audit log (SPEC_FULL §4.2, §6). Every write goes through
//! `AuditWriter::append`, the single routine that records
//! `(ts, actor, action, subject_type, subject_id, payload)`. The hash-chain
//! canonicalization and verification logic below is carried over from the
//! teacher's file-backed `AuditWriter` almost unchanged; only the storage
//! target moved from a JSONL file to the `audit_log` table, which the
//! `acct-db` migration guards with `BEFORE UPDATE/DELETE` triggers so mutation
//! fails at the storage layer regardless of what this crate exposes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub subject_type: String,
    pub subject_id: String,
    pub payload: Value,
    pub ts: DateTime<Utc>,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Append-only audit writer. Every `append` call inserts one row into
/// `audit_log`; the hash chain links each new row to the previous one.
pub struct AuditWriter {
    pool: PgPool,
    last_hash: Option<String>,
}

impl AuditWriter {
    /// Construct a writer, loading the current chain tip from storage so the
    /// chain survives process restarts (§4.2).
    pub async fn connect(pool: PgPool) -> Result<Self> {
        let last_hash: Option<String> =
            sqlx::query_scalar("select hash_self from audit_log order by ts desc limit 1")
                .fetch_optional(&pool)
                .await
                .context("audit writer: load chain tip failed")?
                .flatten();

        Ok(Self { pool, last_hash })
    }

    pub fn last_hash(&self) -> Option<String> {
        self.last_hash.clone()
    }

    /// Append one event. The single routine every other crate's audit writes
    /// go through (§4.2).
    pub async fn append(
        &mut self,
        actor: &str,
        action: &str,
        subject_type: &str,
        subject_id: &str,
        payload: Value,
    ) -> Result<AuditEvent> {
        let id = Uuid::new_v4();
        let ts = Utc::now();

        let mut ev = AuditEvent {
            id,
            actor: actor.to_string(),
            action: action.to_string(),
            subject_type: subject_type.to_string(),
            subject_id: subject_id.to_string(),
            payload,
            ts,
            hash_prev: self.last_hash.clone(),
            hash_self: None,
        };

        let self_hash = compute_event_hash(&ev)?;
        ev.hash_self = Some(self_hash.clone());

        sqlx::query(
            r#"
            insert into audit_log (id, actor, action, subject_type, subject_id, payload, ts, hash_prev, hash_self)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(ev.id)
        .bind(&ev.actor)
        .bind(&ev.action)
        .bind(&ev.subject_type)
        .bind(&ev.subject_id)
        .bind(&ev.payload)
        .bind(ev.ts)
        .bind(&ev.hash_prev)
        .bind(&ev.hash_self)
        .execute(&self.pool)
        .await
        .context("audit append insert failed")?;

        self.last_hash = Some(self_hash);
        Ok(ev)
    }
}

/// Canonicalize by sorting keys recursively and emitting compact JSON, so
/// the hash is stable regardless of field insertion order.
fn canonical_json<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit event failed")?;
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Hash chain computed from canonical JSON of the event without `hash_self`
/// (to avoid self-reference).
pub fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let mut clone = ev.clone();
    clone.hash_self = None;

    let canonical = canonical_json(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { rows: usize },
    Broken { at_id: Uuid, reason: String },
}

/// Verify the hash chain over all rows in `audit_log`, ordered by `ts`.
/// Used by operational tooling and the append-only test (§8 property 6) to
/// assert the chain is intact independent of the DB-level mutation triggers.
pub async fn verify_hash_chain(pool: &PgPool) -> Result<VerifyResult> {
    let rows = sqlx::query("select * from audit_log order by ts")
        .fetch_all(pool)
        .await
        .context("verify_hash_chain query failed")?;

    let mut prev_hash: Option<String> = None;
    let mut count = 0usize;

    for row in &rows {
        let ev = AuditEvent {
            id: row.try_get("id")?,
            actor: row.try_get("actor")?,
            action: row.try_get("action")?,
            subject_type: row.try_get("subject_type")?,
            subject_id: row.try_get("subject_id")?,
            payload: row.try_get("payload")?,
            ts: row.try_get("ts")?,
            hash_prev: row.try_get("hash_prev")?,
            hash_self: row.try_get("hash_self")?,
        };

        if ev.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                at_id: ev.id,
                reason: format!("hash_prev mismatch: expected {:?}, got {:?}", prev_hash, ev.hash_prev),
            });
        }

        if let Some(claimed) = ev.hash_self.clone() {
            let recomputed = compute_event_hash(&ev)?;
            if claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    at_id: ev.id,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                });
            }
        }

        prev_hash = ev.hash_self.clone();
        count += 1;
    }

    Ok(VerifyResult::Valid { rows: count })
}
