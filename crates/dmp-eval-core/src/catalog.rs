//! Catalog management: tests, metrics and benchmarks.
//!
//! Updates are partial: only fields present in the update change. Cross
//! references are plain ids, so deleting a metric never touches its tests.

use dmp_eval_state::{BenchmarkId, BenchmarkRecord, MetricId, MetricRecord, TestId, TestRecord};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{EvalError, Result};
use crate::stores::Stores;

/// Partial update of a test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub keyword: Option<String>,
    pub abbreviation: Option<String>,
    pub theme: Option<String>,
    pub status: Option<String>,
    pub version_notes: Option<String>,
    pub creator: Option<Vec<String>>,
}

/// Partial update of a metric.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub keyword: Option<String>,
    pub abbreviation: Option<String>,
    pub landing_page: Option<String>,
    pub theme: Option<String>,
    pub status: Option<String>,
    pub is_applicable_for: Option<String>,
    pub supported_by: Option<String>,
}

/// Partial update of a benchmark.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub keyword: Option<String>,
    pub abbreviation: Option<String>,
    pub landing_page: Option<String>,
    pub theme: Option<String>,
    pub status: Option<String>,
    pub creator: Option<Vec<String>>,
}

/// A whole catalog in one JSON document, ids included.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogBundle {
    pub tests: Vec<TestRecord>,
    pub metrics: Vec<MetricRecord>,
    pub benchmarks: Vec<BenchmarkRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub tests: usize,
    pub metrics: usize,
    pub benchmarks: usize,
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn set_opt<T>(field: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *field = value;
    }
}

fn to_keys<T: std::fmt::Display>(ids: &[T]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[derive(Clone)]
pub struct CatalogService {
    stores: Stores,
}

impl CatalogService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    // -- tests ---------------------------------------------------------------

    /// Store a new test under a fresh id.
    #[instrument(skip_all, fields(title = %test.title))]
    pub async fn create_test(&self, mut test: TestRecord) -> Result<TestRecord> {
        test.test_id = TestId::new();
        Ok(self.stores.tests.save(test).await?)
    }

    pub async fn get_test(&self, id: &TestId) -> Result<TestRecord> {
        Ok(self.stores.tests.get(id.as_str()).await?)
    }

    /// All tests, ordered by id.
    pub async fn list_tests(&self) -> Result<Vec<TestRecord>> {
        let mut tests = self.stores.tests.find_all().await?;
        tests.sort_by(|a, b| a.test_id.cmp(&b.test_id));
        Ok(tests)
    }

    pub async fn list_test_ids(&self) -> Result<Vec<TestId>> {
        Ok(self
            .list_tests()
            .await?
            .into_iter()
            .map(|t| t.test_id)
            .collect())
    }

    pub async fn update_test(&self, id: &TestId, update: TestUpdate) -> Result<TestRecord> {
        let mut test = self.get_test(id).await?;
        set(&mut test.title, update.title);
        set(&mut test.description, update.description);
        set(&mut test.version, update.version);
        set_opt(&mut test.keyword, update.keyword);
        set_opt(&mut test.abbreviation, update.abbreviation);
        set_opt(&mut test.theme, update.theme);
        set_opt(&mut test.status, update.status);
        set_opt(&mut test.version_notes, update.version_notes);
        set(&mut test.creator, update.creator);
        Ok(self.stores.tests.save(test).await?)
    }

    /// Delete a test, returning its id.
    pub async fn delete_test(&self, id: &TestId) -> Result<TestId> {
        if self.stores.tests.delete_by_id(id.as_str()).await? {
            Ok(id.clone())
        } else {
            Err(EvalError::not_found("test", id.as_str()))
        }
    }

    /// Tests that list `metric_id` among their metrics.
    pub async fn tests_by_metric(&self, metric_id: &MetricId) -> Result<Vec<TestRecord>> {
        Ok(self
            .list_tests()
            .await?
            .into_iter()
            .filter(|t| t.metrics.contains(metric_id))
            .collect())
    }

    /// Bind a test to a plugin function and merge in metric ids.
    #[instrument(skip_all, fields(test_id = %test_id, plugin_id = %plugin_id))]
    pub async fn assign_evaluator(
        &self,
        test_id: &TestId,
        plugin_id: &str,
        function: &str,
        metric_ids: &[MetricId],
    ) -> Result<TestRecord> {
        let mut test = self.get_test(test_id).await?;
        test.evaluator = plugin_id.to_string();
        test.function = function.to_string();
        for metric in metric_ids {
            if !test.metrics.contains(metric) {
                test.metrics.push(metric.clone());
            }
        }
        Ok(self.stores.tests.save(test).await?)
    }

    // -- metrics -------------------------------------------------------------

    pub async fn create_metric(&self, mut metric: MetricRecord) -> Result<MetricRecord> {
        metric.metric_id = MetricId::new();
        Ok(self.stores.metrics.save(metric).await?)
    }

    pub async fn get_metric(&self, id: &MetricId) -> Result<MetricRecord> {
        Ok(self.stores.metrics.get(id.as_str()).await?)
    }

    pub async fn list_metrics(&self) -> Result<Vec<MetricRecord>> {
        let mut metrics = self.stores.metrics.find_all().await?;
        metrics.sort_by(|a, b| a.metric_id.cmp(&b.metric_id));
        Ok(metrics)
    }

    pub async fn update_metric(&self, id: &MetricId, update: MetricUpdate) -> Result<MetricRecord> {
        let mut metric = self.get_metric(id).await?;
        set(&mut metric.title, update.title);
        set(&mut metric.description, update.description);
        set(&mut metric.version, update.version);
        set_opt(&mut metric.keyword, update.keyword);
        set_opt(&mut metric.abbreviation, update.abbreviation);
        set_opt(&mut metric.landing_page, update.landing_page);
        set_opt(&mut metric.theme, update.theme);
        set_opt(&mut metric.status, update.status);
        set_opt(&mut metric.is_applicable_for, update.is_applicable_for);
        set_opt(&mut metric.supported_by, update.supported_by);
        Ok(self.stores.metrics.save(metric).await?)
    }

    /// Delete a metric; `None` when it did not exist.
    pub async fn delete_metric(&self, id: &MetricId) -> Result<Option<MetricId>> {
        let existed = self.stores.metrics.delete_by_id(id.as_str()).await?;
        Ok(existed.then(|| id.clone()))
    }

    /// Append tests, keeping insertion order and skipping ones already there.
    pub async fn add_tests(&self, metric_id: &MetricId, tests: &[TestId]) -> Result<MetricRecord> {
        let mut metric = self.get_metric(metric_id).await?;
        metric.add_tests(tests.iter().cloned());
        Ok(self.stores.metrics.save(metric).await?)
    }

    /// Remove tests from a metric. A metric without tests is `NotFound`.
    pub async fn remove_tests(
        &self,
        metric_id: &MetricId,
        tests: &[TestId],
    ) -> Result<MetricRecord> {
        let mut metric = self.get_metric(metric_id).await?;
        if metric.tests.is_empty() {
            return Err(EvalError::not_found("tests of metric", metric_id.as_str()));
        }
        metric.remove_tests(tests);
        Ok(self.stores.metrics.save(metric).await?)
    }

    pub async fn add_benchmarks(
        &self,
        metric_id: &MetricId,
        benchmarks: &[BenchmarkId],
    ) -> Result<MetricRecord> {
        let mut metric = self.get_metric(metric_id).await?;
        metric.add_benchmarks(benchmarks.iter().cloned());
        Ok(self.stores.metrics.save(metric).await?)
    }

    /// Metrics for `ids`, in request order; unknown ids are skipped.
    pub async fn find_metrics(&self, ids: &[MetricId]) -> Result<Vec<MetricRecord>> {
        Ok(self.stores.metrics.find_by_id_in(&to_keys(ids)).await?)
    }

    // -- benchmarks ----------------------------------------------------------

    pub async fn create_benchmark(&self, mut benchmark: BenchmarkRecord) -> Result<BenchmarkRecord> {
        benchmark.benchmark_id = BenchmarkId::new();
        Ok(self.stores.benchmarks.save(benchmark).await?)
    }

    pub async fn get_benchmark(&self, id: &BenchmarkId) -> Result<BenchmarkRecord> {
        Ok(self.stores.benchmarks.get(id.as_str()).await?)
    }

    pub async fn list_benchmarks(&self) -> Result<Vec<BenchmarkRecord>> {
        let mut benchmarks = self.stores.benchmarks.find_all().await?;
        benchmarks.sort_by(|a, b| a.benchmark_id.cmp(&b.benchmark_id));
        Ok(benchmarks)
    }

    pub async fn list_benchmark_ids(&self) -> Result<Vec<BenchmarkId>> {
        Ok(self
            .list_benchmarks()
            .await?
            .into_iter()
            .map(|b| b.benchmark_id)
            .collect())
    }

    pub async fn find_benchmarks(&self, ids: &[BenchmarkId]) -> Result<Vec<BenchmarkRecord>> {
        Ok(self.stores.benchmarks.find_by_id_in(&to_keys(ids)).await?)
    }

    pub async fn update_benchmark(
        &self,
        id: &BenchmarkId,
        update: BenchmarkUpdate,
    ) -> Result<BenchmarkRecord> {
        let mut benchmark = self.get_benchmark(id).await?;
        set(&mut benchmark.title, update.title);
        set(&mut benchmark.description, update.description);
        set(&mut benchmark.version, update.version);
        set_opt(&mut benchmark.keyword, update.keyword);
        set_opt(&mut benchmark.abbreviation, update.abbreviation);
        set_opt(&mut benchmark.landing_page, update.landing_page);
        set_opt(&mut benchmark.theme, update.theme);
        set_opt(&mut benchmark.status, update.status);
        set(&mut benchmark.creator, update.creator);
        Ok(self.stores.benchmarks.save(benchmark).await?)
    }

    /// Delete a benchmark; `None` when it did not exist.
    pub async fn delete_benchmark(&self, id: &BenchmarkId) -> Result<Option<BenchmarkId>> {
        let existed = self.stores.benchmarks.delete_by_id(id.as_str()).await?;
        Ok(existed.then(|| id.clone()))
    }

    /// Attach metrics to a benchmark and record the benchmark on each
    /// existing metric.
    #[instrument(skip_all, fields(benchmark_id = %benchmark_id))]
    pub async fn add_metrics(
        &self,
        benchmark_id: &BenchmarkId,
        metrics: &[MetricId],
    ) -> Result<BenchmarkRecord> {
        let mut benchmark = self.get_benchmark(benchmark_id).await?;
        benchmark.add_metrics(metrics.iter().cloned());
        let benchmark = self.stores.benchmarks.save(benchmark).await?;

        for mut metric in self.find_metrics(metrics).await? {
            if metric.add_benchmarks([benchmark_id.clone()]) > 0 {
                self.stores.metrics.save(metric).await?;
            }
        }
        Ok(benchmark)
    }

    /// Detach metrics from a benchmark, on both sides.
    pub async fn remove_metrics(
        &self,
        benchmark_id: &BenchmarkId,
        metrics: &[MetricId],
    ) -> Result<BenchmarkRecord> {
        let mut benchmark = self.get_benchmark(benchmark_id).await?;
        benchmark.remove_metrics(metrics);
        let benchmark = self.stores.benchmarks.save(benchmark).await?;

        for mut metric in self.find_metrics(metrics).await? {
            let before = metric.benchmarks.len();
            metric.benchmarks.retain(|b| b != benchmark_id);
            if metric.benchmarks.len() != before {
                self.stores.metrics.save(metric).await?;
            }
        }
        Ok(benchmark)
    }

    // -- bulk ----------------------------------------------------------------

    /// Store every record of the bundle under its own id.
    pub async fn import_catalog(&self, bundle: CatalogBundle) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for test in bundle.tests {
            self.stores.tests.save(test).await?;
            summary.tests += 1;
        }
        for metric in bundle.metrics {
            self.stores.metrics.save(metric).await?;
            summary.metrics += 1;
        }
        for benchmark in bundle.benchmarks {
            self.stores.benchmarks.save(benchmark).await?;
            summary.benchmarks += 1;
        }
        info!(
            tests = summary.tests,
            metrics = summary.metrics,
            benchmarks = summary.benchmarks,
            "catalog imported"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CatalogService {
        CatalogService::new(Stores::in_memory())
    }

    #[tokio::test]
    async fn create_assigns_fresh_ids() {
        let c = catalog();
        let a = c
            .create_test(TestRecord::new("a", "P", "f").with_id("client-chosen"))
            .await
            .unwrap();
        assert_ne!(a.test_id.as_str(), "client-chosen");
        assert_eq!(c.get_test(&a.test_id).await.unwrap().title, "a");
    }

    #[tokio::test]
    async fn update_test_changes_only_supplied_fields() {
        let c = catalog();
        let test = c
            .create_test(TestRecord::new("old", "P", "f").with_description("keep me"))
            .await
            .unwrap();

        let updated = c
            .update_test(
                &test.test_id,
                TestUpdate {
                    title: Some("new".into()),
                    status: Some("approved".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "new");
        assert_eq!(updated.description, "keep me");
        assert_eq!(updated.status.as_deref(), Some("approved"));
        assert_eq!(updated.evaluator, "P");
    }

    #[tokio::test]
    async fn delete_semantics_differ_by_entity() {
        let c = catalog();
        assert!(matches!(
            c.delete_test(&TestId::from("ghost")).await,
            Err(EvalError::NotFound { kind: "test", .. })
        ));
        assert_eq!(c.delete_metric(&MetricId::from("ghost")).await.unwrap(), None);
        assert_eq!(
            c.delete_benchmark(&BenchmarkId::from("ghost")).await.unwrap(),
            None
        );

        let metric = c.create_metric(MetricRecord::new("m")).await.unwrap();
        assert_eq!(
            c.delete_metric(&metric.metric_id).await.unwrap(),
            Some(metric.metric_id)
        );
    }

    #[tokio::test]
    async fn assign_evaluator_merges_metrics() {
        let c = catalog();
        let test = c
            .create_test(TestRecord::new("t", "", "").with_metric("m1"))
            .await
            .unwrap();

        let test = c
            .assign_evaluator(
                &test.test_id,
                "QualityOfActionsEvaluator",
                "dmpIdValid",
                &["m1".into(), "m2".into()],
            )
            .await
            .unwrap();
        assert_eq!(test.evaluator, "QualityOfActionsEvaluator");
        assert_eq!(test.function, "dmpIdValid");
        assert_eq!(test.metrics, vec![MetricId::from("m1"), MetricId::from("m2")]);

        let by_metric = c.tests_by_metric(&MetricId::from("m2")).await.unwrap();
        assert_eq!(by_metric.len(), 1);
    }

    #[tokio::test]
    async fn metric_test_membership() {
        let c = catalog();
        let metric = c.create_metric(MetricRecord::new("m")).await.unwrap();

        assert!(matches!(
            c.remove_tests(&metric.metric_id, &["t1".into()]).await,
            Err(EvalError::NotFound { .. })
        ));

        let metric = c
            .add_tests(&metric.metric_id, &["t1".into(), "t2".into(), "t1".into()])
            .await
            .unwrap();
        assert_eq!(metric.tests, vec![TestId::from("t1"), TestId::from("t2")]);

        let metric = c
            .remove_tests(&metric.metric_id, &["t1".into()])
            .await
            .unwrap();
        assert_eq!(metric.tests, vec![TestId::from("t2")]);
    }

    #[tokio::test]
    async fn add_and_remove_metrics_update_both_sides() {
        let c = catalog();
        let m1 = c.create_metric(MetricRecord::new("m1")).await.unwrap();
        let m2 = c.create_metric(MetricRecord::new("m2")).await.unwrap();
        let bench = c
            .create_benchmark(BenchmarkRecord::new("b"))
            .await
            .unwrap();

        let bench = c
            .add_metrics(
                &bench.benchmark_id,
                &[m1.metric_id.clone(), m2.metric_id.clone(), m1.metric_id.clone()],
            )
            .await
            .unwrap();
        assert_eq!(bench.metrics, vec![m1.metric_id.clone(), m2.metric_id.clone()]);
        assert_eq!(
            c.get_metric(&m1.metric_id).await.unwrap().benchmarks,
            vec![bench.benchmark_id.clone()]
        );

        let bench = c
            .remove_metrics(&bench.benchmark_id, &[m1.metric_id.clone()])
            .await
            .unwrap();
        assert_eq!(bench.metrics, vec![m2.metric_id.clone()]);
        assert!(c.get_metric(&m1.metric_id).await.unwrap().benchmarks.is_empty());
    }

    #[tokio::test]
    async fn find_keeps_request_order() {
        let c = catalog();
        let a = c.create_benchmark(BenchmarkRecord::new("a")).await.unwrap();
        let b = c.create_benchmark(BenchmarkRecord::new("b")).await.unwrap();

        let found = c
            .find_benchmarks(&[
                b.benchmark_id.clone(),
                BenchmarkId::from("ghost"),
                a.benchmark_id.clone(),
            ])
            .await
            .unwrap();
        let titles: Vec<&str> = found.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "a"]);
        assert_eq!(c.list_benchmark_ids().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn import_keeps_bundle_ids() {
        let c = catalog();
        let bundle: CatalogBundle = serde_json::from_value(serde_json::json!({
            "tests": [{"test_id": "t1", "title": "DMP id", "evaluator": "QualityOfActionsEvaluator", "function": "dmpIdValid"}],
            "metrics": [{"metric_id": "m1", "title": "ids", "tests": ["t1"]}],
            "benchmarks": [{"benchmark_id": "b1", "title": "basic", "metrics": ["m1"]}]
        }))
        .unwrap();

        let summary = c.import_catalog(bundle).await.unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                tests: 1,
                metrics: 1,
                benchmarks: 1
            }
        );
        assert_eq!(c.list_test_ids().await.unwrap(), vec![TestId::from("t1")]);
        assert_eq!(
            c.get_benchmark(&BenchmarkId::from("b1")).await.unwrap().metrics,
            vec![MetricId::from("m1")]
        );
    }
}
