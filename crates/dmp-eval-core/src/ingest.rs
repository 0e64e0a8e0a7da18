//! Document ingestion: uploaded bytes + file name into a [`Document`].

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::document::{Document, SourceMeta};
use crate::error::{EvalError, Result};

/// Parse an uploaded file into a document.
///
/// The content must be UTF-8 JSON whose top-level value is an object.
pub fn ingest(bytes: &[u8], file_name: &str) -> Result<Document> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| EvalError::InvalidInput(format!("{file_name} is not valid UTF-8: {e}")))?;
    let root: Value = serde_json::from_str(text)
        .map_err(|e| EvalError::InvalidInput(format!("{file_name} is not valid JSON: {e}")))?;
    if !root.is_object() {
        return Err(EvalError::InvalidInput(format!(
            "{file_name} must contain a JSON object at the top level"
        )));
    }

    let source = SourceMeta::from_file_name(file_name);
    debug!(file_name, extension = %source.extension, "document ingested");
    Ok(Document::new(root).with_source(source))
}

/// Reject uploads whose name does not end in `.json`.
pub fn require_json_upload(file_name: &str) -> Result<()> {
    if SourceMeta::from_file_name(file_name).extension == "json" {
        Ok(())
    } else {
        Err(EvalError::InvalidInput(format!(
            "Invalid file type: {file_name}. Only .json files are allowed."
        )))
    }
}

/// Read a file from disk and ingest it.
pub fn ingest_path(path: &Path) -> Result<Document> {
    let bytes = std::fs::read(path)
        .map_err(|e| EvalError::InvalidInput(format!("cannot read {}: {e}", path.display())))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    ingest(&bytes, &file_name)
}
