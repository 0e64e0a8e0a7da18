//! SurrealDB row types
//!
//! Records are persisted as a keyed row carrying the record as a JSON
//! payload. Report membership lives in `report_entries`, one row per
//! appended evaluation id, so appends only ever insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::records::Record;

/// Serialize chrono `DateTime<Utc>` as a SurrealDB datetime.
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// One stored record of any collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing)]
    pub id: Option<surrealdb::sql::Thing>,
    /// Record key (`Record::key`)
    pub key: String,
    /// Owning report, set for evaluations only
    #[serde(default)]
    pub report_key: Option<String>,
    /// The record encoded as JSON
    pub payload: String,
    #[serde(with = "surreal_datetime")]
    pub stored_at: DateTime<Utc>,
}

impl DocumentRow {
    pub fn encode<T: Record>(record: &T) -> Result<Self, StorageError> {
        Ok(Self {
            id: None,
            key: record.key().to_string(),
            report_key: record.owner_key().map(str::to_string),
            payload: serde_json::to_string(record)?,
            stored_at: Utc::now(),
        })
    }

    pub fn decode<T: Record>(&self) -> Result<T, StorageError> {
        serde_json::from_str(&self.payload).map_err(|e| {
            StorageError::Serialization(format!("{} {}: {e}", T::COLLECTION, self.key))
        })
    }
}

/// One evaluation id appended to a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntryRow {
    #[serde(default, skip_serializing)]
    pub id: Option<surrealdb::sql::Thing>,
    pub report_key: String,
    pub evaluation_key: String,
    /// Position in the report, dense from 0; unique per report
    pub seq: u64,
    /// Groups the entries written by one append call
    pub batch: String,
    #[serde(with = "surreal_datetime")]
    pub appended_at: DateTime<Utc>,
}

impl ReportEntryRow {
    /// Rows for one append of `evaluation_keys`, numbered from `next_seq`.
    pub fn batch(report_key: &str, next_seq: u64, evaluation_keys: &[String]) -> Vec<Self> {
        let batch = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        evaluation_keys
            .iter()
            .zip(next_seq..)
            .map(|(key, seq)| ReportEntryRow {
                id: None,
                report_key: report_key.to_string(),
                evaluation_key: key.clone(),
                seq,
                batch: batch.clone(),
                appended_at: now,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TestRecord;

    #[test]
    fn document_row_round_trips_payload() {
        let test = TestRecord::new("dmp id", "QualityOfActionsEvaluator", "dmpIdValid").with_id("t1");
        let row = DocumentRow::encode(&test).unwrap();
        assert_eq!(row.key, "t1");
        let back: TestRecord = row.decode().unwrap();
        assert_eq!(back, test);
    }

    #[test]
    fn corrupt_payload_is_serialization_error() {
        let row = DocumentRow {
            id: None,
            key: "t1".into(),
            report_key: None,
            payload: "{not json".into(),
            stored_at: Utc::now(),
        };
        let err = row.decode::<TestRecord>().unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn entry_batch_continues_the_report_sequence() {
        let rows = ReportEntryRow::batch("r1", 3, &["e1".to_string(), "e2".to_string()]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].seq, 3);
        assert_eq!(rows[1].seq, 4);
        assert_eq!(rows[1].evaluation_key, "e2");
        assert_eq!(rows[0].batch, rows[1].batch);
    }
}
