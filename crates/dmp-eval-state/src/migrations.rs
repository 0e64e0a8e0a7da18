//! SurrealDB schema migrations and initialization
//!
//! Safe to call on every connection; `DEFINE ... IF NOT EXISTS` keeps it
//! idempotent.

use crate::error::StateError;
use crate::records::{BenchmarkRecord, Evaluation, EvaluationReport, MetricRecord, Record, TestRecord};
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Table holding report membership rows.
pub const REPORT_ENTRIES: &str = "report_entries";

/// Initialize all evaluator tables.
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing DMP evaluator schema");

    for table in [
        TestRecord::COLLECTION,
        MetricRecord::COLLECTION,
        BenchmarkRecord::COLLECTION,
        Evaluation::COLLECTION,
        EvaluationReport::COLLECTION,
    ] {
        init_document_table(db, table).await?;
    }
    init_report_entries_table(db).await?;

    info!("DMP evaluator schema initialization complete");
    Ok(())
}

/// Initialize one document table.
///
/// Schema:
/// ```text
/// TABLE <collection> {
///   key:         STRING (unique)
///   report_key:  STRING? (indexed, evaluations only)
///   payload:     STRING (record as JSON)
///   stored_at:   DATETIME
/// }
/// ```
async fn init_document_table(db: &Surreal<Any>, table: &str) -> Result<()> {
    debug!(table, "Initializing document table");

    let sql = format!(
        r#"
        DEFINE TABLE IF NOT EXISTS {table} SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS key ON {table} TYPE string;
        DEFINE FIELD IF NOT EXISTS report_key ON {table} TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS payload ON {table} TYPE string;
        DEFINE FIELD IF NOT EXISTS stored_at ON {table} TYPE datetime;
        DEFINE INDEX IF NOT EXISTS idx_{table}_key ON {table} FIELDS key UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_{table}_report ON {table} FIELDS report_key;
        "#
    );

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(format!("{table}: {e}")))?
        .check()
        .map_err(|e| StateError::SchemaSetup(format!("{table}: {e}")))?;
    Ok(())
}

/// Initialize `report_entries`.
///
/// Schema:
/// ```text
/// TABLE report_entries {
///   report_key:      STRING
///   evaluation_key:  STRING
///   seq:             INT (position in the report, unique per report)
///   batch:           STRING (one per append call)
///   appended_at:     DATETIME (informational)
/// }
/// ```
///
/// Rows are insert-only and read back in `seq` order. Two appends racing for
/// the same `seq` collide on the unique index and the loser retries.
async fn init_report_entries_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing report_entries table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS report_entries SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS report_key ON report_entries TYPE string;
        DEFINE FIELD IF NOT EXISTS evaluation_key ON report_entries TYPE string;
        DEFINE FIELD IF NOT EXISTS seq ON report_entries TYPE int;
        DEFINE FIELD IF NOT EXISTS batch ON report_entries TYPE string;
        DEFINE FIELD IF NOT EXISTS appended_at ON report_entries TYPE datetime;
        DEFINE INDEX IF NOT EXISTS idx_entries_report ON report_entries FIELDS report_key;
        DEFINE INDEX IF NOT EXISTS idx_entries_report_seq ON report_entries FIELDS report_key, seq UNIQUE;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(format!("{REPORT_ENTRIES}: {e}")))?
        .check()
        .map_err(|e| StateError::SchemaSetup(format!("{REPORT_ENTRIES}: {e}")))?;
    Ok(())
}
