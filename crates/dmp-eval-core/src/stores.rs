//! The set of stores the core works against.

use std::sync::Arc;

use dmp_eval_state::fakes::MemoryStore;
use dmp_eval_state::{
    BenchmarkRecord, Database, DocumentStore, Evaluation, EvaluationReport, EvaluationStore,
    MetricRecord, ReportStore, SurrealReportStore, SurrealStore, TestRecord,
};

#[derive(Clone)]
pub struct Stores {
    pub tests: Arc<dyn DocumentStore<TestRecord>>,
    pub metrics: Arc<dyn DocumentStore<MetricRecord>>,
    pub benchmarks: Arc<dyn DocumentStore<BenchmarkRecord>>,
    pub evaluations: Arc<dyn EvaluationStore>,
    pub reports: Arc<dyn ReportStore>,
}

impl Stores {
    /// Fresh, empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            tests: Arc::new(MemoryStore::<TestRecord>::new()),
            metrics: Arc::new(MemoryStore::<MetricRecord>::new()),
            benchmarks: Arc::new(MemoryStore::<BenchmarkRecord>::new()),
            evaluations: Arc::new(MemoryStore::<Evaluation>::new()),
            reports: Arc::new(MemoryStore::<EvaluationReport>::new()),
        }
    }

    /// Stores backed by one SurrealDB connection.
    pub fn surreal(db: Database) -> Self {
        Self {
            tests: Arc::new(SurrealStore::<TestRecord>::new(db.clone())),
            metrics: Arc::new(SurrealStore::<MetricRecord>::new(db.clone())),
            benchmarks: Arc::new(SurrealStore::<BenchmarkRecord>::new(db.clone())),
            evaluations: Arc::new(SurrealStore::<Evaluation>::new(db.clone())),
            reports: Arc::new(SurrealReportStore::new(db)),
        }
    }
}
