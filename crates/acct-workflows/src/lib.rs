//! The registered workflow set (SPEC_FULL §4.3) plus the DAG engine and
//! parallel-map abstraction they run on.

pub mod bank_reconcile;
pub mod cashflow_forecast;
pub mod engine;
pub mod journal_suggestion;
pub mod parallel;
pub mod qa;
pub mod rules;
pub mod soft_checks;
pub mod tax_report;
pub mod voucher_classify;
pub mod voucher_ingest;

use std::sync::Arc;

pub use engine::{Workflow, WorkflowCtx, WorkflowOutcome, WorkflowRegistry};

/// Builds the statically-registered set of every `run_type` the dispatcher
/// can resolve. Adding a workflow means adding one line here.
pub fn build_registry() -> WorkflowRegistry {
    let mut registry = WorkflowRegistry::new();
    registry
        .register(Arc::new(journal_suggestion::JournalSuggestionWorkflow))
        .register(Arc::new(bank_reconcile::BankReconcileWorkflow))
        .register(Arc::new(soft_checks::SoftChecksWorkflow))
        .register(Arc::new(cashflow_forecast::CashflowForecastWorkflow))
        .register(Arc::new(tax_report::TaxReportWorkflow))
        .register(Arc::new(voucher_ingest::VoucherIngestWorkflow))
        .register(Arc::new(voucher_classify::VoucherClassifyWorkflow));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_all_seven_run_types() {
        let registry = build_registry();
        for rt in [
            "journal_suggestion",
            "bank_reconcile",
            "soft_checks",
            "cashflow_forecast",
            "tax_report",
            "voucher_ingest",
            "voucher_classify",
        ] {
            assert!(registry.resolve(rt).is_some(), "missing workflow registration for {rt}");
        }
        assert_eq!(registry.run_types().len(), 7);
    }

    #[test]
    fn registry_does_not_resolve_unknown_run_type() {
        let registry = build_registry();
        assert!(registry.resolve("not_a_workflow").is_none());
    }
}
