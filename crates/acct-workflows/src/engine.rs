//! The fetch → guard(has_data) → compute → end DAG shape every workflow
//! follows (SPEC_FULL §4.3). A generic engine over a registry of named
//! workflows, replacing the teacher's optional-graph-runtime design note:
//! Design Note 9 calls for "a single, always-on workflow engine" — no
//! conditional LangGraph import, no fallback branch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use acct_erpx::ErpxClient;

/// State threaded through a workflow's nodes. `errors` accumulates node
/// failures instead of the engine throwing to the dispatcher (§4.3: "The
/// engine never throws to the dispatcher; errors propagate via the `errors`
/// field").
pub struct WorkflowCtx {
    pub pool: PgPool,
    pub erpx: Arc<ErpxClient>,
    pub run_id: Uuid,
    pub cursor_in: Value,
}

#[derive(Debug, Default, Clone)]
pub struct WorkflowOutcome {
    pub cursor_out: Value,
    pub stats: Value,
    pub errors: Vec<String>,
}

impl WorkflowOutcome {
    pub fn ok(cursor_out: Value, stats: Value) -> Self {
        Self { cursor_out, stats, errors: Vec::new() }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self { cursor_out: Value::Null, stats: Value::Null, errors }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A named, compiled DAG: `fetch → guard → compute → end`. Implementors
/// encode `fetch` and `compute` directly in `run`; `guard` is the
/// early-return when fetched data is empty.
#[async_trait]
pub trait Workflow: Send + Sync {
    fn run_type(&self) -> &'static str;
    async fn run(&self, ctx: &WorkflowCtx) -> WorkflowOutcome;
}

/// Registry of named workflows (SPEC_FULL §4.3 table). Statically typed —
/// Design Note's rejected "second generic string-keyed callable registry"
/// doesn't apply here; this one dispatch table *is* the registry.
pub struct WorkflowRegistry {
    workflows: HashMap<&'static str, Arc<dyn Workflow>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self { workflows: HashMap::new() }
    }

    pub fn register(&mut self, wf: Arc<dyn Workflow>) -> &mut Self {
        self.workflows.insert(wf.run_type(), wf);
        self
    }

    pub fn resolve(&self, run_type: &str) -> Option<Arc<dyn Workflow>> {
        self.workflows.get(run_type).cloned()
    }

    pub fn run_types(&self) -> Vec<&'static str> {
        self.workflows.keys().copied().collect()
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `body` inside one DB transaction per SPEC_FULL §4.3 ("Every compute
/// node runs inside one DB transaction; on exception the transaction rolls
/// back and the node returns `{errors: [...]}`"). On error the transaction is
/// dropped (implicit rollback) and the error is folded into `WorkflowOutcome`.
pub async fn in_transaction<F, Fut, T>(pool: &PgPool, body: F) -> Result<T, String>
where
    F: FnOnce(sqlx::Transaction<'_, sqlx::Postgres>) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<(sqlx::Transaction<'_, sqlx::Postgres>, T)>>,
{
    let tx = pool.begin().await.map_err(|e| format!("begin transaction failed: {e}"))?;
    match body(tx).await {
        Ok((tx, value)) => {
            tx.commit().await.map_err(|e| format!("commit failed: {e}"))?;
            Ok(value)
        }
        Err(e) => Err(format!("{e:#}")),
    }
}
