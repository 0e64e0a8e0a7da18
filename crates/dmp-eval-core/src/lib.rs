//! DMP Evaluator Core Library
//!
//! Runs conformance tests against machine-actionable Data Management Plans.
//! A test names an evaluator plugin and one of its functions; the dispatch
//! engine resolves that pair, runs the check against the parsed plan and the
//! evaluation manager appends the result to an evaluation report.

pub mod benchmark;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod document;
mod error;
pub mod evaluators;
pub mod ingest;
pub mod manager;
pub mod metrics;
pub mod obs;
pub mod plugin;
pub mod registry;
pub mod report_lock;
pub mod reporting;
pub mod stores;
pub mod telemetry;

pub use error::{ErrorCategory, EvalError, Result};

pub use benchmark::{expand_benchmark, flatten_test_ids, BenchmarkExpansion};
pub use catalog::{
    BenchmarkUpdate, CatalogBundle, CatalogService, ImportSummary, MetricUpdate, TestUpdate,
};
pub use config::{EngineConfig, UnknownReportPolicy};
pub use dispatch::{DispatchConfig, DispatchEngine};
pub use document::{Document, SourceMeta};
pub use evaluators::builtin_registry;
pub use ingest::{ingest, ingest_path, require_json_upload};
pub use manager::{EvaluationManager, EvaluationRequest, EvaluationResult, FullReport, ReportTarget};
pub use plugin::{
    Check, CheckInput, EvaluatorPlugin, FunctionTable, PluginInfo, StaticPlugin, SyncCheck,
};
pub use registry::{PluginRegistry, PluginRegistryBuilder, SharedRegistry};
pub use reporting::ReportSummary;
pub use stores::Stores;

pub use dmp_eval_state::{
    BenchmarkId, BenchmarkRecord, Evaluation, EvaluationId, EvaluationReport, MetricId,
    MetricRecord, ReportId, TestId, TestRecord, Verdict,
};
