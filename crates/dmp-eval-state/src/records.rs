//! Catalog, evaluation and report records.
//!
//! These are the persisted entities of the evaluator:
//! - `TestRecord`: one conformance test, bound to a plugin function
//! - `MetricRecord`: a named group of tests
//! - `BenchmarkRecord`: a named group of metrics
//! - `Evaluation`: the immutable outcome of running one test
//! - `EvaluationReport`: the append-only list of evaluation ids of a session

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                $name(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

record_id!(
    /// Identifier of a test in the catalog.
    TestId
);
record_id!(
    /// Identifier of a metric in the catalog.
    MetricId
);
record_id!(
    /// Identifier of a benchmark in the catalog.
    BenchmarkId
);
record_id!(
    /// Identifier of an evaluation; generated once and never reused.
    EvaluationId
);
record_id!(
    /// Identifier of an evaluation report.
    ReportId
);

/// A persisted entity addressable by a string key.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection (table) the record lives in.
    const COLLECTION: &'static str;

    /// The record's primary key.
    fn key(&self) -> &str;

    /// Key of the owning aggregate, indexed for secondary lookups.
    fn owner_key(&self) -> Option<&str> {
        None
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One conformance test and the plugin function that implements it.
///
/// `evaluator`/`function` are resolved against the plugin registry at
/// dispatch time, never at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub test_id: TestId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    /// Plugin identifier of the evaluator that runs this test.
    #[serde(default)]
    pub evaluator: String,
    /// Function name within the evaluator.
    #[serde(default)]
    pub function: String,
    /// Metrics this test implements (weak references).
    #[serde(default)]
    pub metrics: Vec<MetricId>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub version_notes: Option<String>,
    #[serde(default)]
    pub creator: Vec<String>,
}

impl TestRecord {
    pub fn new(title: impl Into<String>, evaluator: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            test_id: TestId::new(),
            title: title.into(),
            description: String::new(),
            version: String::new(),
            evaluator: evaluator.into(),
            function: function.into(),
            metrics: Vec::new(),
            keyword: None,
            abbreviation: None,
            theme: None,
            status: None,
            version_notes: None,
            creator: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<TestId>) -> Self {
        self.test_id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metric(mut self, metric: impl Into<MetricId>) -> Self {
        push_unique(&mut self.metrics, metric.into());
        self
    }
}

impl Record for TestRecord {
    const COLLECTION: &'static str = "tests";

    fn key(&self) -> &str {
        self.test_id.as_str()
    }
}

/// A named group of tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub metric_id: MetricId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub landing_page: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_applicable_for: Option<String>,
    #[serde(default)]
    pub supported_by: Option<String>,
    /// Tests of this metric, insertion ordered, without duplicates.
    #[serde(default)]
    pub tests: Vec<TestId>,
    /// Benchmarks this metric is attached to.
    #[serde(default)]
    pub benchmarks: Vec<BenchmarkId>,
}

impl MetricRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            metric_id: MetricId::new(),
            title: title.into(),
            description: String::new(),
            version: String::new(),
            keyword: None,
            abbreviation: None,
            landing_page: None,
            theme: None,
            status: None,
            is_applicable_for: None,
            supported_by: None,
            tests: Vec::new(),
            benchmarks: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<MetricId>) -> Self {
        self.metric_id = id.into();
        self
    }

    pub fn with_test(mut self, test: impl Into<TestId>) -> Self {
        self.add_tests([test.into()]);
        self
    }

    /// Append tests that are not already present, keeping insertion order.
    ///
    /// Returns the number of tests actually added.
    pub fn add_tests(&mut self, tests: impl IntoIterator<Item = TestId>) -> usize {
        tests
            .into_iter()
            .filter(|t| push_unique(&mut self.tests, t.clone()))
            .count()
    }

    /// Remove the given tests. Returns the number removed.
    pub fn remove_tests(&mut self, tests: &[TestId]) -> usize {
        let before = self.tests.len();
        self.tests.retain(|t| !tests.contains(t));
        before - self.tests.len()
    }

    /// Attach benchmarks that are not already present.
    pub fn add_benchmarks(&mut self, benchmarks: impl IntoIterator<Item = BenchmarkId>) -> usize {
        benchmarks
            .into_iter()
            .filter(|b| push_unique(&mut self.benchmarks, b.clone()))
            .count()
    }
}

impl Record for MetricRecord {
    const COLLECTION: &'static str = "metrics";

    fn key(&self) -> &str {
        self.metric_id.as_str()
    }
}

/// A named group of metrics, i.e. a test suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub benchmark_id: BenchmarkId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub landing_page: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub creator: Vec<String>,
    /// Metrics of this benchmark, in catalog order.
    #[serde(default)]
    pub metrics: Vec<MetricId>,
}

impl BenchmarkRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            benchmark_id: BenchmarkId::new(),
            title: title.into(),
            description: String::new(),
            version: String::new(),
            keyword: None,
            abbreviation: None,
            landing_page: None,
            theme: None,
            status: None,
            creator: Vec::new(),
            metrics: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<BenchmarkId>) -> Self {
        self.benchmark_id = id.into();
        self
    }

    pub fn with_metric(mut self, metric: impl Into<MetricId>) -> Self {
        self.add_metrics([metric.into()]);
        self
    }

    /// Append metrics that are not already present. Returns the number added.
    pub fn add_metrics(&mut self, metrics: impl IntoIterator<Item = MetricId>) -> usize {
        metrics
            .into_iter()
            .filter(|m| push_unique(&mut self.metrics, m.clone()))
            .count()
    }

    /// Remove the given metrics. Returns the number removed.
    pub fn remove_metrics(&mut self, metrics: &[MetricId]) -> usize {
        let before = self.metrics.len();
        self.metrics.retain(|m| !metrics.contains(m));
        before - self.metrics.len()
    }
}

impl Record for BenchmarkRecord {
    const COLLECTION: &'static str = "benchmarks";

    fn key(&self) -> &str {
        self.benchmark_id.as_str()
    }
}

// ---------------------------------------------------------------------------
// Evaluations
// ---------------------------------------------------------------------------

/// Verdict of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
    /// The check could not reach a verdict. Not an error.
    Indeterminate,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Indeterminate => "INDETERMINATE",
        }
    }

    /// Combine two verdicts where FAIL dominates INDETERMINATE, which
    /// dominates PASS.
    pub fn and(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::Fail, _) | (_, Verdict::Fail) => Verdict::Fail,
            (Verdict::Indeterminate, _) | (_, Verdict::Indeterminate) => Verdict::Indeterminate,
            _ => Verdict::Pass,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of running one test against one document.
///
/// Immutable once created: a re-run produces a new `Evaluation` with a new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub evaluation_id: EvaluationId,
    pub result: Verdict,
    pub title: String,
    pub details: String,
    /// Free-text diagnostic log.
    #[serde(default)]
    pub log: String,
    /// Which part of the document the result pertains to.
    #[serde(default)]
    pub affected_elements: Option<String>,
    /// Completion percentage, 0–100. `None` means not reported.
    #[serde(default)]
    pub completion: Option<u8>,
    /// `<pluginId>::<functionName>` of the producing check.
    pub generated: String,
    /// Test this evaluation was produced for.
    pub output_from_test: TestId,
    pub report_id: ReportId,
    pub created_at: DateTime<Utc>,
}

impl Evaluation {
    /// Start an evaluation for `test`, taking title and details from it.
    pub fn new(
        result: Verdict,
        test: &TestRecord,
        report_id: &ReportId,
        generated: impl Into<String>,
    ) -> Self {
        Self {
            evaluation_id: EvaluationId::new(),
            result,
            title: test.title.clone(),
            details: test.description.clone(),
            log: String::new(),
            affected_elements: None,
            completion: None,
            generated: generated.into(),
            output_from_test: test.test_id.clone(),
            report_id: report_id.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_affected_elements(mut self, elements: impl Into<String>) -> Self {
        self.affected_elements = Some(elements.into());
        self
    }

    /// Set the completion percentage, clamped to 100.
    pub fn with_completion(mut self, percent: u8) -> Self {
        self.completion = Some(percent.min(100));
        self
    }
}

impl Record for Evaluation {
    const COLLECTION: &'static str = "evaluations";

    fn key(&self) -> &str {
        self.evaluation_id.as_str()
    }

    fn owner_key(&self) -> Option<&str> {
        Some(self.report_id.as_str())
    }
}

/// Lifecycle state of a report. There is no closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Empty,
    Accumulating,
}

/// Append-only aggregate of evaluation ids for one evaluation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub report_id: ReportId,
    #[serde(default)]
    pub evaluations: Vec<EvaluationId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EvaluationReport {
    /// Create an empty report with a fresh id.
    pub fn new() -> Self {
        Self::with_id(ReportId::new())
    }

    pub fn with_id(report_id: ReportId) -> Self {
        let now = Utc::now();
        Self {
            report_id,
            evaluations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> ReportState {
        if self.evaluations.is_empty() {
            ReportState::Empty
        } else {
            ReportState::Accumulating
        }
    }

    /// Append evaluation ids at the end; prior entries are never touched.
    pub fn append(&mut self, ids: impl IntoIterator<Item = EvaluationId>) {
        self.evaluations.extend(ids);
        self.updated_at = Utc::now();
    }
}

impl Default for EvaluationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl Record for EvaluationReport {
    const COLLECTION: &'static str = "reports";

    fn key(&self) -> &str {
        self.report_id.as_str()
    }
}

/// Push `item` unless already present. Returns whether it was added.
fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        false
    } else {
        items.push(item);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_add_tests_keeps_order_and_suppresses_duplicates() {
        let mut metric = MetricRecord::new("completeness");
        let added = metric.add_tests(["t1".into(), "t2".into(), "t1".into()]);
        assert_eq!(added, 2);
        let added = metric.add_tests(["t3".into(), "t2".into()]);
        assert_eq!(added, 1);
        assert_eq!(
            metric.tests,
            vec![TestId::from("t1"), TestId::from("t2"), TestId::from("t3")]
        );
    }

    #[test]
    fn metric_remove_tests_reports_count() {
        let mut metric = MetricRecord::new("m").with_test("a").with_test("b");
        assert_eq!(metric.remove_tests(&["a".into(), "zzz".into()]), 1);
        assert_eq!(metric.tests, vec![TestId::from("b")]);
    }

    #[test]
    fn benchmark_add_metrics_suppresses_duplicates() {
        let mut bench = BenchmarkRecord::new("b").with_metric("m1");
        assert_eq!(bench.add_metrics(["m1".into(), "m2".into()]), 1);
        assert_eq!(bench.metrics.len(), 2);
    }

    #[test]
    fn verdict_and_prefers_fail_then_indeterminate() {
        assert_eq!(Verdict::Pass.and(Verdict::Pass), Verdict::Pass);
        assert_eq!(Verdict::Pass.and(Verdict::Indeterminate), Verdict::Indeterminate);
        assert_eq!(Verdict::Indeterminate.and(Verdict::Fail), Verdict::Fail);
        assert_eq!(Verdict::Fail.and(Verdict::Pass), Verdict::Fail);
    }

    #[test]
    fn verdict_serializes_upper_case() {
        let json = serde_json::to_string(&Verdict::Indeterminate).unwrap();
        assert_eq!(json, "\"INDETERMINATE\"");
    }

    #[test]
    fn evaluation_new_copies_test_metadata() {
        let test = TestRecord::new("DMP id", "QualityOfActionsEvaluator", "dmpIdValid")
            .with_description("checks dmp_id");
        let report = ReportId::from("r-1");
        let eval = Evaluation::new(Verdict::Pass, &test, &report, "p::f").with_completion(250);

        assert_eq!(eval.output_from_test, test.test_id);
        assert_eq!(eval.title, "DMP id");
        assert_eq!(eval.details, "checks dmp_id");
        assert_eq!(eval.report_id, report);
        assert_eq!(eval.completion, Some(100));
    }

    #[test]
    fn report_state_moves_to_accumulating_on_append() {
        let mut report = EvaluationReport::new();
        assert_eq!(report.state(), ReportState::Empty);
        report.append([EvaluationId::new()]);
        assert_eq!(report.state(), ReportState::Accumulating);
        report.append([EvaluationId::new(), EvaluationId::new()]);
        assert_eq!(report.evaluations.len(), 3);
        assert_eq!(report.state(), ReportState::Accumulating);
    }

    #[test]
    fn test_record_deserializes_with_defaults() {
        let json = serde_json::json!({"test_id": "t-9", "title": "minimal"});
        let test: TestRecord = serde_json::from_value(json).unwrap();
        assert_eq!(test.test_id, TestId::from("t-9"));
        assert!(test.evaluator.is_empty());
        assert!(test.metrics.is_empty());
    }
}
