//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryStore<T>` satisfies `DocumentStore<T>` for every record type, plus
//! `EvaluationStore` and `ReportStore` for the matching records.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::records::{Evaluation, EvaluationId, EvaluationReport, Record, ReportId};
use crate::storage_traits::*;

/// In-memory store backed by a `HashMap<key, record>`.
///
/// `set_fail_writes(true)` makes every write fail with
/// `StorageError::Backend`, which lets tests exercise persistence failures.
#[derive(Debug)]
pub struct MemoryStore<T> {
    records: Mutex<HashMap<String, T>>,
    fail_writes: AtomicBool,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, HashMap<String, T>>> {
        self.records
            .lock()
            .map_err(|_| StorageError::Backend(format!("{} store lock poisoned", T::COLLECTION)))
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!(
                "{} store rejected write",
                T::COLLECTION
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Record> DocumentStore<T> for MemoryStore<T> {
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<T>> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn save(&self, record: T) -> StorageResult<T> {
        self.check_writable()?;
        self.lock()?
            .insert(record.key().to_string(), record.clone());
        Ok(record)
    }

    async fn find_all(&self) -> StorageResult<Vec<T>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    async fn delete_by_id(&self, id: &str) -> StorageResult<bool> {
        self.check_writable()?;
        Ok(self.lock()?.remove(id).is_some())
    }

    async fn find_by_id_in(&self, ids: &[String]) -> StorageResult<Vec<T>> {
        let records = self.lock()?;
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore<Evaluation> {
    async fn find_by_report(&self, report_id: &ReportId) -> StorageResult<Vec<Evaluation>> {
        let mut found: Vec<Evaluation> = self
            .lock()?
            .values()
            .filter(|e| &e.report_id == report_id)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.created_at);
        Ok(found)
    }
}

#[async_trait]
impl ReportStore for MemoryStore<EvaluationReport> {
    async fn append_evaluations(
        &self,
        report_id: &ReportId,
        ids: &[EvaluationId],
    ) -> StorageResult<EvaluationReport> {
        self.check_writable()?;
        let mut records = self.lock()?;
        let report = records
            .get_mut(report_id.as_str())
            .ok_or_else(|| StorageError::NotFound {
                collection: EvaluationReport::COLLECTION,
                id: report_id.to_string(),
            })?;
        report.append(ids.iter().cloned());
        Ok(report.clone())
    }
}
