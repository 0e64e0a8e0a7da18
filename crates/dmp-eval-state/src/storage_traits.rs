//! Storage trait definitions for the DMP evaluator
//!
//! - `DocumentStore<T>`: keyed persistence for every catalog/evaluation record
//! - `EvaluationStore`: evaluations, additionally queryable by report
//! - `ReportStore`: reports with an atomic append of evaluation ids
//!
//! All traits are async and backend-agnostic. In-memory fakes live in the
//! `fakes` module, the SurrealDB implementation in `surreal_store`.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::records::{Evaluation, EvaluationId, EvaluationReport, Record, ReportId};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Keyed store for one record type.
///
/// Guarantees:
/// - `save` is an upsert: saving a record with an existing key replaces it.
/// - `find_by_id_in` returns found records in the order of the requested
///   ids, skipping missing ones and repeating duplicates.
#[async_trait]
pub trait DocumentStore<T: Record>: Send + Sync {
    /// Look up a record by key.
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<T>>;

    /// Insert or replace a record. Returns the stored record.
    async fn save(&self, record: T) -> StorageResult<T>;

    /// All records of this collection, in no particular order.
    async fn find_all(&self) -> StorageResult<Vec<T>>;

    /// Delete a record. Returns whether it existed.
    async fn delete_by_id(&self, id: &str) -> StorageResult<bool>;

    /// Bulk lookup preserving the order of `ids`.
    async fn find_by_id_in(&self, ids: &[String]) -> StorageResult<Vec<T>>;

    /// Like `find_by_id`, but a missing record is `StorageError::NotFound`.
    async fn get(&self, id: &str) -> StorageResult<T> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                collection: T::COLLECTION,
                id: id.to_string(),
            })
    }
}

/// Evaluation persistence.
#[async_trait]
pub trait EvaluationStore: DocumentStore<Evaluation> {
    /// Every evaluation produced for the given report.
    async fn find_by_report(&self, report_id: &ReportId) -> StorageResult<Vec<Evaluation>>;
}

/// Report persistence.
///
/// A report's evaluation list only ever grows; entries are never reordered,
/// replaced or removed by an append.
#[async_trait]
pub trait ReportStore: DocumentStore<EvaluationReport> {
    /// Atomically append `ids` to the end of the report's evaluation list.
    ///
    /// Concurrent appends to the same report never lose entries. Returns the
    /// report after the append, or `StorageError::NotFound` if the report
    /// does not exist.
    async fn append_evaluations(
        &self,
        report_id: &ReportId,
        ids: &[EvaluationId],
    ) -> StorageResult<EvaluationReport>;
}

/// Reorder `found` to follow `ids`, skipping ids with no record and
/// repeating records for repeated ids.
pub fn order_by_ids<T: Record>(ids: &[String], found: Vec<T>) -> Vec<T> {
    let by_key: std::collections::HashMap<String, T> = found
        .into_iter()
        .map(|r| (r.key().to_string(), r))
        .collect();
    ids.iter().filter_map(|id| by_key.get(id).cloned()).collect()
}
