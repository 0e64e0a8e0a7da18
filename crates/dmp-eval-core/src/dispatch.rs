//! Dispatch engine: resolve a test's plugin function and run it.
//!
//! Single dispatch propagates resolution errors to the caller. Batch dispatch
//! never aborts: every test yields an evaluation, INDETERMINATE when its
//! function cannot be resolved. In both forms a check that panics or exceeds
//! the configured time limit yields INDETERMINATE.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dmp_eval_state::{Evaluation, ReportId, TestRecord, Verdict};
use futures::{stream, FutureExt, StreamExt};

use crate::document::Document;
use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs;
use crate::plugin::{Check, CheckInput};
use crate::registry::{PluginRegistry, SharedRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub check_timeout: Option<Duration>,
    /// Checks of one batch in flight at once; at least 1.
    pub concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            check_timeout: Some(Duration::from_secs(30)),
            concurrency: 1,
        }
    }
}

pub struct DispatchEngine {
    registry: Arc<SharedRegistry>,
    config: DispatchConfig,
}

impl DispatchEngine {
    pub fn new(registry: Arc<SharedRegistry>, config: DispatchConfig) -> Self {
        Self { registry, config }
    }

    /// Engine over a fixed registry with default settings.
    pub fn from_registry(registry: PluginRegistry) -> Self {
        Self::new(Arc::new(registry.into()), DispatchConfig::default())
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    pub fn registry(&self) -> Arc<PluginRegistry> {
        self.registry.snapshot()
    }

    /// Run `plugin_id::function` for `test`.
    ///
    /// Fails with `PluginNotFound`/`FunctionNotFound` before anything runs.
    /// The returned evaluation is exactly what the check produced, except
    /// for timeouts and panics which become INDETERMINATE.
    pub async fn dispatch(
        &self,
        plugin_id: &str,
        function: &str,
        document: &Document,
        report_id: &ReportId,
        test: &TestRecord,
    ) -> Result<Evaluation> {
        let check = self.registry().resolve_function(plugin_id, function)?;
        let provenance = provenance(plugin_id, function);
        Ok(self
            .run_check(check, document, report_id, test, &provenance)
            .await)
    }

    /// Dispatch through the plugin and function named on the test record.
    pub async fn dispatch_test(
        &self,
        document: &Document,
        report_id: &ReportId,
        test: &TestRecord,
    ) -> Result<Evaluation> {
        self.dispatch(&test.evaluator, &test.function, document, report_id, test)
            .await
    }

    /// Dispatch every test, returning one evaluation per test in the order
    /// given, whatever order the checks complete in.
    pub async fn dispatch_all(
        &self,
        tests: &[TestRecord],
        document: &Document,
        report_id: &ReportId,
    ) -> Vec<Evaluation> {
        let started = Instant::now();
        let registry = self.registry();
        let registry = &registry;

        let evaluations: Vec<Evaluation> = stream::iter(tests.iter().map(|test| async move {
            let provenance = provenance(&test.evaluator, &test.function);
            match registry.resolve_function(&test.evaluator, &test.function) {
                Ok(check) => {
                    self.run_check(check, document, report_id, test, &provenance)
                        .await
                }
                Err(err) => {
                    let reason = err.to_string();
                    obs::emit_check_fault(report_id.as_str(), test.test_id.as_str(), &reason);
                    METRICS.inc_evaluations_dispatched();
                    METRICS.inc_indeterminate();
                    Evaluation::new(Verdict::Indeterminate, test, report_id, provenance)
                        .with_log(format!("Test could not be dispatched: {reason}"))
                }
            }
        }))
        .buffered(self.config.concurrency.max(1))
        .collect()
        .await;

        let indeterminate = evaluations
            .iter()
            .filter(|e| e.result == Verdict::Indeterminate)
            .count();
        obs::emit_batch_finished(
            report_id.as_str(),
            evaluations.len(),
            indeterminate,
            elapsed_ms(started),
        );
        evaluations
    }

    async fn run_check(
        &self,
        check: Arc<dyn Check>,
        document: &Document,
        report_id: &ReportId,
        test: &TestRecord,
        provenance: &str,
    ) -> Evaluation {
        let started = Instant::now();
        obs::emit_dispatch_started(report_id.as_str(), test.test_id.as_str(), provenance);
        METRICS.inc_evaluations_dispatched();

        let input = CheckInput {
            document,
            report_id,
            test,
            provenance,
        };
        let guarded = AssertUnwindSafe(check.run(input)).catch_unwind();
        let outcome = match self.config.check_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome.map_err(|panic| Fault::Panic(panic_message(&*panic))),
                Err(_) => Err(Fault::Timeout(limit)),
            },
            None => guarded
                .await
                .map_err(|panic| Fault::Panic(panic_message(&*panic))),
        };

        let evaluation = match outcome {
            Ok(evaluation) => evaluation,
            Err(fault) => {
                match fault {
                    Fault::Timeout(_) => METRICS.inc_check_timeouts(),
                    Fault::Panic(_) => METRICS.inc_check_panics(),
                }
                let reason = fault.to_string();
                obs::emit_check_fault(report_id.as_str(), test.test_id.as_str(), &reason);
                input
                    .evaluation(Verdict::Indeterminate)
                    .with_log(format!("Check could not reach a verdict: {reason}"))
            }
        };

        if evaluation.result == Verdict::Indeterminate {
            METRICS.inc_indeterminate();
        }
        obs::emit_dispatch_finished(
            report_id.as_str(),
            test.test_id.as_str(),
            evaluation.result.as_str(),
            elapsed_ms(started),
        );
        evaluation
    }
}

/// Why a check produced no evaluation of its own.
enum Fault {
    Timeout(Duration),
    Panic(String),
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::Timeout(limit) => write!(f, "timed out after {}ms", limit.as_millis()),
            Fault::Panic(msg) => write!(f, "check panicked: {msg}"),
        }
    }
}

pub fn provenance(plugin_id: &str, function: &str) -> String {
    format!("{plugin_id}::{function}")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::plugin::{FunctionTable, StaticPlugin};
    use async_trait::async_trait;
    use serde_json::json;

    fn pass(input: CheckInput<'_>) -> Evaluation {
        input.evaluation(Verdict::Pass)
    }

    fn boom(_input: CheckInput<'_>) -> Evaluation {
        panic!("malformed rule table")
    }

    struct Sleepy;

    #[async_trait]
    impl Check for Sleepy {
        async fn run(&self, input: CheckInput<'_>) -> Evaluation {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            input.evaluation(Verdict::Pass)
        }
    }

    /// Finishes later the earlier it is listed, to scramble completion order.
    struct Delayed(u64);

    #[async_trait]
    impl Check for Delayed {
        async fn run(&self, input: CheckInput<'_>) -> Evaluation {
            tokio::time::sleep(Duration::from_millis(self.0)).await;
            input.evaluation(Verdict::Pass)
        }
    }

    fn engine(config: DispatchConfig) -> DispatchEngine {
        let registry = PluginRegistry::builder()
            .register(Arc::new(StaticPlugin::new(
                "Demo",
                "demo",
                FunctionTable::new()
                    .with_fn("pass", pass)
                    .with_fn("boom", boom)
                    .with("sleepy", Sleepy)
                    .with("slow", Delayed(30))
                    .with("fast", Delayed(1)),
            )))
            .unwrap()
            .build();
        DispatchEngine::from_registry(registry).with_config(config)
    }

    fn doc() -> Document {
        Document::new(json!({"dmp": {}}))
    }

    #[tokio::test]
    async fn dispatch_returns_one_evaluation_for_the_test() {
        let engine = engine(DispatchConfig::default());
        let test = TestRecord::new("t", "Demo", "pass");
        let report = ReportId::from("r");

        let eval = engine.dispatch_test(&doc(), &report, &test).await.unwrap();
        assert_eq!(eval.output_from_test, test.test_id);
        assert_eq!(eval.generated, "Demo::pass");
        assert_eq!(eval.result, Verdict::Pass);
    }

    #[tokio::test]
    async fn dispatch_propagates_resolution_errors() {
        let engine = engine(DispatchConfig::default());
        let report = ReportId::from("r");

        let missing_fn = TestRecord::new("t", "Demo", "nope");
        assert!(matches!(
            engine.dispatch_test(&doc(), &report, &missing_fn).await,
            Err(EvalError::FunctionNotFound { .. })
        ));

        let missing_plugin = TestRecord::new("t", "Ghost", "pass");
        assert!(matches!(
            engine.dispatch_test(&doc(), &report, &missing_plugin).await,
            Err(EvalError::PluginNotFound(_))
        ));
    }

    #[tokio::test]
    async fn panicking_check_becomes_indeterminate() {
        let engine = engine(DispatchConfig::default());
        let test = TestRecord::new("t", "Demo", "boom");

        let eval = engine
            .dispatch_test(&doc(), &ReportId::from("r"), &test)
            .await
            .unwrap();
        assert_eq!(eval.result, Verdict::Indeterminate);
        assert!(eval.log.contains("malformed rule table"));
        assert_eq!(eval.generated, "Demo::boom");
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_check_becomes_indeterminate() {
        let engine = engine(DispatchConfig {
            check_timeout: Some(Duration::from_secs(2)),
            concurrency: 1,
        });
        let test = TestRecord::new("t", "Demo", "sleepy");

        let eval = engine
            .dispatch_test(&doc(), &ReportId::from("r"), &test)
            .await
            .unwrap();
        assert_eq!(eval.result, Verdict::Indeterminate);
        assert!(eval.log.contains("timed out after 2000ms"));
    }

    #[tokio::test]
    async fn batch_continues_past_unresolvable_tests() {
        let engine = engine(DispatchConfig::default());
        let tests = vec![
            TestRecord::new("a", "Demo", "pass"),
            TestRecord::new("b", "Demo", "missing"),
            TestRecord::new("c", "Demo", "boom"),
            TestRecord::new("d", "Demo", "pass"),
        ];

        let evals = engine.dispatch_all(&tests, &doc(), &ReportId::from("r")).await;
        let results: Vec<Verdict> = evals.iter().map(|e| e.result).collect();
        assert_eq!(
            results,
            vec![
                Verdict::Pass,
                Verdict::Indeterminate,
                Verdict::Indeterminate,
                Verdict::Pass
            ]
        );
        assert!(evals[1].log.contains("missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_batch_keeps_catalog_order() {
        let engine = engine(DispatchConfig {
            check_timeout: None,
            concurrency: 4,
        });
        let tests = vec![
            TestRecord::new("slow", "Demo", "slow"),
            TestRecord::new("fast", "Demo", "fast"),
            TestRecord::new("pass", "Demo", "pass"),
        ];

        let evals = engine.dispatch_all(&tests, &doc(), &ReportId::from("r")).await;
        let order: Vec<&TestRecord> = tests.iter().collect();
        assert_eq!(evals.len(), order.len());
        for (eval, test) in evals.iter().zip(order) {
            assert_eq!(eval.output_from_test, test.test_id);
        }
    }
}
