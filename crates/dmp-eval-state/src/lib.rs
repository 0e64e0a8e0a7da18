//! dmp-eval-state: persistence for the DMP evaluator
//!
//! ## Layer 0 - Data/Persistence
//!
//! Holds the catalog (tests, metrics, benchmarks), evaluation results and
//! the append-only evaluation reports.
//!
//! ## Key Components
//!
//! - `DocumentStore` / `EvaluationStore` / `ReportStore`: backend-agnostic traits
//! - `fakes::MemoryStore`: in-memory implementation for tests and embedding
//! - `SurrealStore` / `SurrealReportStore`: SurrealDB implementation
//! - `handle`: connection setup (`mem://`, `surrealkv://`, remote)

mod error;
pub mod fakes;
pub mod handle;
pub mod migrations;
pub mod records;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::{Database, StoreConfig};
pub use records::{
    BenchmarkId, BenchmarkRecord, Evaluation, EvaluationId, EvaluationReport, MetricId,
    MetricRecord, Record, ReportId, ReportState, TestId, TestRecord, Verdict,
};
pub use storage_traits::{DocumentStore, EvaluationStore, ReportStore, StorageResult};
pub use surreal_store::{SurrealReportStore, SurrealStore};

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
