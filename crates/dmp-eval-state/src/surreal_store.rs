//! SurrealDB-backed document stores
//!
//! Uses `schema::DocumentRow` and `schema::ReportEntryRow` for persistence,
//! converting to/from `records` types at the boundary.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::Utc;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::records::{Evaluation, EvaluationId, EvaluationReport, Record, ReportId};
use crate::schema::{DocumentRow, ReportEntryRow};
use crate::storage_traits::{
    order_by_ids, DocumentStore, EvaluationStore, ReportStore, StorageResult,
};

/// Tries an append makes before giving up on a contended report.
const APPEND_ATTEMPTS: u32 = 32;

#[derive(serde::Deserialize)]
struct SeqRow {
    seq: u64,
}

fn backend(e: surrealdb::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// SurrealDB implementation of [`DocumentStore`] for one record type.
pub struct SurrealStore<T> {
    db: Surreal<Any>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for SurrealStore<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> SurrealStore<T> {
    /// Wrap an already connected (and migrated) database handle.
    pub fn new(db: Surreal<Any>) -> Self {
        Self {
            db,
            _record: PhantomData,
        }
    }

    async fn select_rows(
        &self,
        sql: &'static str,
        bind: (&'static str, serde_json::Value),
    ) -> StorageResult<Vec<DocumentRow>> {
        let mut res = self
            .db
            .query(sql)
            .bind(("tb", T::COLLECTION))
            .bind(bind)
            .await
            .map_err(backend)?;
        res.take(0).map_err(backend)
    }

    fn decode_all(rows: Vec<DocumentRow>) -> StorageResult<Vec<T>> {
        rows.iter().map(DocumentRow::decode).collect()
    }
}

#[async_trait]
impl<T: Record> DocumentStore<T> for SurrealStore<T> {
    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<T>> {
        let rows = self
            .select_rows(
                "SELECT * FROM type::table($tb) WHERE key = $key",
                ("key", serde_json::Value::String(id.to_string())),
            )
            .await?;
        rows.first().map(DocumentRow::decode).transpose()
    }

    #[instrument(skip(self, record), fields(collection = T::COLLECTION, key = record.key()))]
    async fn save(&self, record: T) -> StorageResult<T> {
        let row = DocumentRow::encode(&record)?;
        let key = row.key.clone();
        debug!("upserting record");

        self.db
            .query("UPSERT type::thing($tb, $key) CONTENT $row")
            .bind(("tb", T::COLLECTION))
            .bind(("key", key))
            .bind(("row", row))
            .await
            .map_err(backend)?
            .check()
            .map_err(backend)?;
        Ok(record)
    }

    async fn find_all(&self) -> StorageResult<Vec<T>> {
        let mut res = self
            .db
            .query("SELECT * FROM type::table($tb) ORDER BY stored_at ASC")
            .bind(("tb", T::COLLECTION))
            .await
            .map_err(backend)?;
        let rows: Vec<DocumentRow> = res.take(0).map_err(backend)?;
        Self::decode_all(rows)
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    async fn delete_by_id(&self, id: &str) -> StorageResult<bool> {
        let mut res = self
            .db
            .query("DELETE FROM type::table($tb) WHERE key = $key RETURN BEFORE")
            .bind(("tb", T::COLLECTION))
            .bind(("key", id.to_string()))
            .await
            .map_err(backend)?;
        let deleted: Vec<DocumentRow> = res.take(0).map_err(backend)?;
        Ok(!deleted.is_empty())
    }

    async fn find_by_id_in(&self, ids: &[String]) -> StorageResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .select_rows(
                "SELECT * FROM type::table($tb) WHERE key INSIDE $keys",
                ("keys", serde_json::Value::from(ids.to_vec())),
            )
            .await?;
        Ok(order_by_ids(ids, Self::decode_all(rows)?))
    }
}

#[async_trait]
impl EvaluationStore for SurrealStore<Evaluation> {
    async fn find_by_report(&self, report_id: &ReportId) -> StorageResult<Vec<Evaluation>> {
        let rows = self
            .select_rows(
                "SELECT * FROM type::table($tb) WHERE report_key = $rid",
                ("rid", serde_json::Value::String(report_id.to_string())),
            )
            .await?;
        let mut found = Self::decode_all(rows)?;
        found.sort_by_key(|e| e.created_at);
        Ok(found)
    }
}

/// SurrealDB report store.
///
/// The report document holds metadata; its evaluation list is materialized
/// from `report_entries` on every read.
#[derive(Clone)]
pub struct SurrealReportStore {
    docs: SurrealStore<EvaluationReport>,
}

impl SurrealReportStore {
    pub fn new(db: Surreal<Any>) -> Self {
        Self {
            docs: SurrealStore::new(db),
        }
    }

    async fn entries(&self, report_key: &str) -> StorageResult<Vec<EvaluationId>> {
        let mut res = self
            .docs
            .db
            .query(
                "SELECT * FROM report_entries WHERE report_key = $rid ORDER BY seq ASC",
            )
            .bind(("rid", report_key.to_string()))
            .await
            .map_err(backend)?;
        let rows: Vec<ReportEntryRow> = res.take(0).map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|r| EvaluationId(r.evaluation_key))
            .collect())
    }

    /// Sequence number the next appended entry of `report_key` takes.
    async fn next_seq(&self, report_key: &str) -> StorageResult<u64> {
        let mut res = self
            .docs
            .db
            .query(
                "SELECT seq FROM report_entries WHERE report_key = $rid \
                 ORDER BY seq DESC LIMIT 1",
            )
            .bind(("rid", report_key.to_string()))
            .await
            .map_err(backend)?;
        let last: Vec<SeqRow> = res.take(0).map_err(backend)?;
        Ok(last.first().map_or(0, |row| row.seq + 1))
    }

    /// Append `ids` after the current last entry.
    ///
    /// A racing append that takes the same sequence numbers fails on the
    /// unique `(report_key, seq)` index; the loser rereads and retries.
    async fn insert_entries(&self, report_key: &str, ids: &[EvaluationId]) -> StorageResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        let mut attempt = 1;
        loop {
            let next = self.next_seq(report_key).await?;
            let rows = ReportEntryRow::batch(report_key, next, &keys);
            let outcome = self
                .docs
                .db
                .query("INSERT INTO report_entries $rows")
                .bind(("rows", rows))
                .await
                .and_then(|res| res.check());
            match outcome {
                Ok(_) => return Ok(()),
                Err(e) if attempt < APPEND_ATTEMPTS => {
                    debug!(report_key, attempt, error = %e, "report sequence taken, retrying append");
                    attempt += 1;
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(backend(e)),
            }
        }
    }

    async fn materialize(&self, mut report: EvaluationReport) -> StorageResult<EvaluationReport> {
        report.evaluations = self.entries(report.report_id.as_str()).await?;
        Ok(report)
    }

    /// Persist report metadata only; the entry list is never rewritten.
    async fn save_metadata(&self, report: &EvaluationReport) -> StorageResult<()> {
        let mut doc = report.clone();
        doc.evaluations.clear();
        self.docs.save(doc).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore<EvaluationReport> for SurrealReportStore {
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<EvaluationReport>> {
        match self.docs.find_by_id(id).await? {
            Some(report) => Ok(Some(self.materialize(report).await?)),
            None => Ok(None),
        }
    }

    /// Saving a report that has no entries yet records its evaluation list;
    /// for an existing report only metadata changes.
    async fn save(&self, record: EvaluationReport) -> StorageResult<EvaluationReport> {
        let key = record.report_id.to_string();
        let existing = self.entries(&key).await?;
        self.save_metadata(&record).await?;
        if existing.is_empty() {
            self.insert_entries(&key, &record.evaluations).await?;
        }
        self.materialize(record).await
    }

    async fn find_all(&self) -> StorageResult<Vec<EvaluationReport>> {
        let mut reports = Vec::new();
        for report in self.docs.find_all().await? {
            reports.push(self.materialize(report).await?);
        }
        Ok(reports)
    }

    async fn delete_by_id(&self, id: &str) -> StorageResult<bool> {
        let existed = self.docs.delete_by_id(id).await?;
        self.docs
            .db
            .query("DELETE FROM report_entries WHERE report_key = $rid")
            .bind(("rid", id.to_string()))
            .await
            .map_err(backend)?
            .check()
            .map_err(backend)?;
        Ok(existed)
    }

    async fn find_by_id_in(&self, ids: &[String]) -> StorageResult<Vec<EvaluationReport>> {
        let mut reports = Vec::new();
        for report in self.docs.find_by_id_in(ids).await? {
            reports.push(self.materialize(report).await?);
        }
        Ok(reports)
    }
}

#[async_trait]
impl ReportStore for SurrealReportStore {
    #[instrument(skip(self, ids), fields(report_id = %report_id, count = ids.len()))]
    async fn append_evaluations(
        &self,
        report_id: &ReportId,
        ids: &[EvaluationId],
    ) -> StorageResult<EvaluationReport> {
        let mut report = self.docs.get(report_id.as_str()).await?;

        self.insert_entries(report_id.as_str(), ids).await?;

        report.updated_at = Utc::now();
        self.save_metadata(&report).await?;
        debug!("appended evaluations to report");
        self.materialize(report).await
    }
}
