//! Structured observability hooks for evaluation lifecycle events.
//!
//! This module provides:
//! - Report-scoped tracing spans via the `ReportSpan` RAII guard, or
//!   [`report_span`] for instrumenting futures
//! - Emission functions for dispatch, batch and report lifecycle events
//!
//! Events are emitted at `info!` level (configurable via `DMP_EVAL_LOG`);
//! faults that were absorbed or could not be finalized go out at `warn!`.

use tracing::{info, warn};

/// RAII guard that enters a report-scoped span.
///
/// The guard is `!Send`; inside async code use [`report_span`] with
/// `tracing::Instrument` instead.
///
/// ```ignore
/// let _span = ReportSpan::enter("report-123");
/// // tracing calls here carry report_id = "report-123"
/// ```
pub struct ReportSpan {
    _span: tracing::span::EnteredSpan,
}

impl ReportSpan {
    pub fn enter(report_id: &str) -> Self {
        Self {
            _span: report_span(report_id).entered(),
        }
    }
}

/// The span every report-scoped operation runs in.
pub fn report_span(report_id: &str) -> tracing::Span {
    tracing::info_span!("dmp_eval.report", report_id = %report_id)
}

pub fn emit_dispatch_started(report_id: &str, test_id: &str, provenance: &str) {
    info!(
        event = "dispatch.started",
        report_id = %report_id,
        test_id = %test_id,
        provenance = %provenance,
    );
}

pub fn emit_dispatch_finished(report_id: &str, test_id: &str, result: &str, duration_ms: u64) {
    info!(
        event = "dispatch.finished",
        report_id = %report_id,
        test_id = %test_id,
        result = %result,
        duration_ms = duration_ms,
    );
}

/// Emit event: a batch finished, with how many of its results were
/// INDETERMINATE.
pub fn emit_batch_finished(report_id: &str, total: usize, indeterminate: usize, duration_ms: u64) {
    info!(
        event = "batch.finished",
        report_id = %report_id,
        total = total,
        indeterminate = indeterminate,
        duration_ms = duration_ms,
    );
}

pub fn emit_report_created(report_id: &str) {
    info!(event = "report.created", report_id = %report_id);
}

pub fn emit_report_appended(report_id: &str, appended: usize, total: usize) {
    info!(
        event = "report.appended",
        report_id = %report_id,
        appended = appended,
        total = total,
    );
}

/// Emit event: a check fault (timeout, panic, unresolvable function inside a
/// batch) was turned into an INDETERMINATE evaluation.
pub fn emit_check_fault(report_id: &str, test_id: &str, reason: &str) {
    warn!(
        event = "check.indeterminate_fault",
        report_id = %report_id,
        test_id = %test_id,
        reason = %reason,
    );
}

/// Emit event: evaluations were computed but could not be persisted.
pub fn emit_finalize_error(report_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "evaluation.finalize_error", report_id = %report_id, error = %error);
}
