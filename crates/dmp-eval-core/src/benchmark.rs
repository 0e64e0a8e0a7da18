//! Benchmark expansion into a flat, ordered test list.

use std::collections::HashSet;

use dmp_eval_state::{BenchmarkId, BenchmarkRecord, MetricRecord, TestRecord};
use tracing::{debug, warn};

use crate::error::Result;
use crate::stores::Stores;

/// A benchmark and the tests it runs, in metric-then-test order.
#[derive(Debug, Clone)]
pub struct BenchmarkExpansion {
    pub benchmark: BenchmarkRecord,
    pub tests: Vec<TestRecord>,
}

/// Test ids of `metrics` in metric-then-test order.
///
/// A test listed by several metrics appears once per metric unless `dedupe`
/// is set, in which case only its first occurrence is kept.
pub fn flatten_test_ids(metrics: &[MetricRecord], dedupe: bool) -> Vec<String> {
    let mut seen = HashSet::new();
    metrics
        .iter()
        .flat_map(|m| m.tests.iter())
        .filter(|t| !dedupe || seen.insert(t.as_str()))
        .map(|t| t.to_string())
        .collect()
}

/// Resolve a benchmark and expand it to the tests to run.
///
/// Metric or test ids that no longer resolve are skipped with a warning;
/// an unknown benchmark is `NotFound`.
pub async fn expand_benchmark(
    stores: &Stores,
    benchmark_id: &BenchmarkId,
    dedupe: bool,
) -> Result<BenchmarkExpansion> {
    let benchmark = stores.benchmarks.get(benchmark_id.as_str()).await?;

    let metric_ids: Vec<String> = benchmark.metrics.iter().map(|m| m.to_string()).collect();
    let metrics = stores.metrics.find_by_id_in(&metric_ids).await?;
    warn_missing("metric", &metric_ids, metrics.iter().map(|m| m.metric_id.as_str()));

    let test_ids = flatten_test_ids(&metrics, dedupe);
    let tests = stores.tests.find_by_id_in(&test_ids).await?;
    warn_missing("test", &test_ids, tests.iter().map(|t| t.test_id.as_str()));

    debug!(
        benchmark_id = %benchmark_id,
        metrics = metrics.len(),
        tests = tests.len(),
        dedupe,
        "benchmark expanded"
    );
    Ok(BenchmarkExpansion { benchmark, tests })
}

fn warn_missing<'a>(kind: &str, requested: &[String], found: impl Iterator<Item = &'a str>) {
    let found: HashSet<&str> = found.collect();
    for id in requested {
        if !found.contains(id.as_str()) {
            warn!(kind, id = %id, "benchmark references a missing record, skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;

    async fn seeded() -> Stores {
        let stores = Stores::in_memory();
        for (id, title) in [("t1", "one"), ("t2", "two"), ("t3", "three")] {
            stores
                .tests
                .save(TestRecord::new(title, "P", "f").with_id(id))
                .await
                .unwrap();
        }
        stores
            .metrics
            .save(MetricRecord::new("m1").with_id("m1").with_test("t1").with_test("t2"))
            .await
            .unwrap();
        stores
            .metrics
            .save(MetricRecord::new("m2").with_id("m2").with_test("t2").with_test("t3"))
            .await
            .unwrap();
        stores
            .benchmarks
            .save(
                BenchmarkRecord::new("b")
                    .with_id("b1")
                    .with_metric("m1")
                    .with_metric("m2"),
            )
            .await
            .unwrap();
        stores
    }

    fn ids(expansion: &BenchmarkExpansion) -> Vec<&str> {
        expansion.tests.iter().map(|t| t.test_id.as_str()).collect()
    }

    #[tokio::test]
    async fn expands_in_metric_then_test_order_with_duplicates() {
        let stores = seeded().await;
        let expansion = expand_benchmark(&stores, &BenchmarkId::from("b1"), false)
            .await
            .unwrap();
        assert_eq!(ids(&expansion), vec!["t1", "t2", "t2", "t3"]);
    }

    #[tokio::test]
    async fn dedupe_keeps_first_occurrence() {
        let stores = seeded().await;
        let expansion = expand_benchmark(&stores, &BenchmarkId::from("b1"), true)
            .await
            .unwrap();
        assert_eq!(ids(&expansion), vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn missing_metrics_and_tests_are_skipped() {
        let stores = seeded().await;
        let mut bench = stores.benchmarks.get("b1").await.unwrap();
        bench.add_metrics(["gone".into()]);
        stores.benchmarks.save(bench).await.unwrap();
        stores.tests.delete_by_id("t3").await.unwrap();

        let expansion = expand_benchmark(&stores, &BenchmarkId::from("b1"), false)
            .await
            .unwrap();
        assert_eq!(ids(&expansion), vec!["t1", "t2", "t2"]);
    }

    #[tokio::test]
    async fn unknown_benchmark_is_not_found() {
        let stores = seeded().await;
        let err = expand_benchmark(&stores, &BenchmarkId::from("nope"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::NotFound { kind: "benchmark", .. }));
    }

    #[test]
    fn flatten_without_metrics_is_empty() {
        assert!(flatten_test_ids(&[], false).is_empty());
    }
}
