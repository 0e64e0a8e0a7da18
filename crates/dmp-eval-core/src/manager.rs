//! Evaluation manager: expands a request to tests, dispatches them and
//! finalizes the results into a report.
//!
//! Nothing is written before dispatch succeeds. Finalization runs under the
//! per-report lock: create the report if it is new, persist each evaluation,
//! then append the ids that were persisted, in dispatch order.

use std::sync::Arc;

use dmp_eval_state::{
    BenchmarkId, Evaluation, EvaluationId, EvaluationReport, ReportId, TestId, TestRecord,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, Instrument};

use crate::benchmark::expand_benchmark;
use crate::config::{EngineConfig, UnknownReportPolicy};
use crate::dispatch::DispatchEngine;
use crate::document::Document;
use crate::error::{EvalError, Result};
use crate::metrics::METRICS;
use crate::obs;
use crate::registry::SharedRegistry;
use crate::report_lock::ReportLocks;
use crate::stores::Stores;

/// Run an explicit list of tests against a document.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// Report to append to; a new one is started when absent.
    pub report_id: Option<ReportId>,
    pub document: Document,
    /// Tests in the order they should run and be reported.
    pub test_ids: Vec<TestId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub report_id: ReportId,
    pub evaluations: Vec<Evaluation>,
}

/// A report together with its evaluations, in report order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullReport {
    pub report: EvaluationReport,
    pub evaluations: Vec<Evaluation>,
}

/// The report a run will append to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTarget {
    pub report_id: ReportId,
    /// Not persisted yet; created during finalization.
    pub is_new: bool,
}

pub struct EvaluationManager {
    stores: Stores,
    engine: DispatchEngine,
    locks: ReportLocks,
    config: EngineConfig,
}

impl EvaluationManager {
    pub fn new(stores: Stores, registry: Arc<SharedRegistry>, config: EngineConfig) -> Self {
        let engine = DispatchEngine::new(registry, config.dispatch_config());
        Self {
            stores,
            engine,
            locks: ReportLocks::new(),
            config,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decide which report a run appends to.
    ///
    /// No id starts a new report. An id that does not resolve starts a new
    /// report under [`UnknownReportPolicy::CreateNew`] and is `NotFound`
    /// under [`UnknownReportPolicy::Reject`].
    pub async fn resolve_report(&self, report_id: Option<&ReportId>) -> Result<ReportTarget> {
        let Some(report_id) = report_id else {
            return Ok(ReportTarget {
                report_id: ReportId::new(),
                is_new: true,
            });
        };

        if self
            .stores
            .reports
            .find_by_id(report_id.as_str())
            .await?
            .is_some()
        {
            return Ok(ReportTarget {
                report_id: report_id.clone(),
                is_new: false,
            });
        }

        match self.config.unknown_report {
            UnknownReportPolicy::CreateNew => {
                let fresh = ReportId::new();
                debug!(requested = %report_id, report_id = %fresh, "unknown report id, starting a new report");
                Ok(ReportTarget {
                    report_id: fresh,
                    is_new: true,
                })
            }
            UnknownReportPolicy::Reject => Err(EvalError::not_found("report", report_id.as_str())),
        }
    }

    /// Run one catalog test.
    pub async fn evaluate_test(
        &self,
        test_id: &TestId,
        document: &Document,
        report_id: Option<&ReportId>,
    ) -> Result<EvaluationResult> {
        let test = self.stores.tests.get(test_id.as_str()).await?;
        let target = self.resolve_report(report_id).await?;
        let span = obs::report_span(target.report_id.as_str());

        async {
            let evaluation = self
                .engine
                .dispatch_test(document, &target.report_id, &test)
                .await?;
            self.finalize(target, vec![evaluation]).await
        }
        .instrument(span)
        .await
    }

    /// Run every test of a benchmark, in metric-then-test order.
    pub async fn evaluate_benchmark(
        &self,
        benchmark_id: &BenchmarkId,
        document: &Document,
        report_id: Option<&ReportId>,
    ) -> Result<EvaluationResult> {
        let expansion =
            expand_benchmark(&self.stores, benchmark_id, self.config.dedupe_tests).await?;
        let target = self.resolve_report(report_id).await?;
        self.run_batch(target, &expansion.tests, document).await
    }

    /// Run an explicit list of tests. Every id must resolve.
    pub async fn generate_evaluations(&self, request: EvaluationRequest) -> Result<EvaluationResult> {
        let ids: Vec<String> = request.test_ids.iter().map(|t| t.to_string()).collect();
        let tests = self.stores.tests.find_by_id_in(&ids).await?;
        if let Some(missing) = ids
            .iter()
            .find(|id| !tests.iter().any(|t| t.test_id.as_str() == id.as_str()))
        {
            return Err(EvalError::not_found("test", missing.as_str()));
        }

        let target = self.resolve_report(request.report_id.as_ref()).await?;
        self.run_batch(target, &tests, &request.document).await
    }

    /// Every stored evaluation, oldest first.
    pub async fn list_evaluations(&self) -> Result<Vec<Evaluation>> {
        let mut evaluations = self.stores.evaluations.find_all().await?;
        evaluations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(evaluations)
    }

    pub async fn get_full_report(&self, report_id: &ReportId) -> Result<FullReport> {
        let report = self.stores.reports.get(report_id.as_str()).await?;
        let ids: Vec<String> = report.evaluations.iter().map(|e| e.to_string()).collect();
        let evaluations = self.stores.evaluations.find_by_id_in(&ids).await?;
        Ok(FullReport {
            report,
            evaluations,
        })
    }

    async fn run_batch(
        &self,
        target: ReportTarget,
        tests: &[TestRecord],
        document: &Document,
    ) -> Result<EvaluationResult> {
        let span = obs::report_span(target.report_id.as_str());
        async {
            let evaluations = self
                .engine
                .dispatch_all(tests, document, &target.report_id)
                .await;
            self.finalize(target, evaluations).await
        }
        .instrument(span)
        .await
    }

    async fn finalize(
        &self,
        target: ReportTarget,
        evaluations: Vec<Evaluation>,
    ) -> Result<EvaluationResult> {
        let report_id = target.report_id.clone();
        let guard = self.locks.lock(&report_id).await;
        let outcome = self.finalize_locked(target, evaluations).await;
        drop(guard);
        self.locks.release(&report_id);
        outcome
    }

    async fn finalize_locked(
        &self,
        target: ReportTarget,
        evaluations: Vec<Evaluation>,
    ) -> Result<EvaluationResult> {
        let report_id = target.report_id;

        if target.is_new {
            let report = EvaluationReport::with_id(report_id.clone());
            if let Err(err) = self.stores.reports.save(report).await {
                return Err(self.not_finalized(&report_id, err.to_string()));
            }
            METRICS.inc_reports_created();
            obs::emit_report_created(report_id.as_str());
        }

        let mut persisted: Vec<EvaluationId> = Vec::with_capacity(evaluations.len());
        let mut failures = Vec::new();
        for evaluation in &evaluations {
            match self.stores.evaluations.save(evaluation.clone()).await {
                Ok(saved) => persisted.push(saved.evaluation_id),
                Err(err) => failures.push(format!("{}: {err}", evaluation.evaluation_id)),
            }
        }

        if !persisted.is_empty() {
            match self
                .stores
                .reports
                .append_evaluations(&report_id, &persisted)
                .await
            {
                Ok(report) => obs::emit_report_appended(
                    report_id.as_str(),
                    persisted.len(),
                    report.evaluations.len(),
                ),
                Err(err) => return Err(self.not_finalized(&report_id, err.to_string())),
            }
        }

        if !failures.is_empty() {
            return Err(self.not_finalized(&report_id, failures.join("; ")));
        }

        Ok(EvaluationResult {
            report_id,
            evaluations,
        })
    }

    fn not_finalized(&self, report_id: &ReportId, reason: String) -> EvalError {
        let err = EvalError::NotFinalized {
            report_id: report_id.to_string(),
            reason,
        };
        obs::emit_finalize_error(report_id.as_str(), &err);
        err
    }
}
