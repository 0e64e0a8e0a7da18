//! Error taxonomy for the evaluation core.

use dmp_eval_state::StorageError;

/// Coarse class of an [`EvalError`], matching how callers surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unknown id (404-equivalent).
    NotFound,
    /// Malformed document or upload (400-equivalent).
    InvalidInput,
    /// Persistence, registry or configuration failure (500-equivalent).
    Infrastructure,
}

/// Evaluation core errors.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("evaluator plugin not found: {0}")]
    PluginNotFound(String),

    #[error("function {function} not found in plugin {plugin}")]
    FunctionNotFound { plugin: String, function: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("plugin registered twice: {0}")]
    DuplicatePlugin(String),

    #[error("{plugin} does not support {operation}")]
    Unsupported {
        plugin: String,
        operation: &'static str,
    },

    /// Dispatch succeeded but results could not be persisted.
    #[error("evaluation could not be finalized for report {report_id}: {reason}")]
    NotFinalized { report_id: String, reason: String },

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EvalError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EvalError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EvalError::NotFound { .. }
            | EvalError::PluginNotFound(_)
            | EvalError::FunctionNotFound { .. } => ErrorCategory::NotFound,
            EvalError::InvalidInput(_) => ErrorCategory::InvalidInput,
            EvalError::DuplicatePlugin(_)
            | EvalError::Unsupported { .. }
            | EvalError::NotFinalized { .. }
            | EvalError::Storage(_)
            | EvalError::Serialization(_) => ErrorCategory::Infrastructure,
        }
    }
}

impl From<StorageError> for EvalError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { collection, id } => EvalError::NotFound {
                kind: collection_kind(collection),
                id,
            },
            other => EvalError::Storage(other),
        }
    }
}

/// Singular entity name for a storage collection.
fn collection_kind(collection: &'static str) -> &'static str {
    match collection {
        "tests" => "test",
        "metrics" => "metric",
        "benchmarks" => "benchmark",
        "evaluations" => "evaluation",
        "reports" => "report",
        other => other,
    }
}

/// Result type for evaluation core operations.
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(
            EvalError::not_found("test", "t1").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            EvalError::FunctionNotFound {
                plugin: "p".into(),
                function: "f".into()
            }
            .category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            EvalError::InvalidInput("bad".into()).category(),
            ErrorCategory::InvalidInput
        );
        assert_eq!(
            EvalError::NotFinalized {
                report_id: "r".into(),
                reason: "db down".into()
            }
            .category(),
            ErrorCategory::Infrastructure
        );
    }

    #[test]
    fn storage_not_found_becomes_entity_not_found() {
        let err: EvalError = StorageError::NotFound {
            collection: "benchmarks",
            id: "b1".into(),
        }
        .into();
        assert!(matches!(err, EvalError::NotFound { kind: "benchmark", ref id } if id == "b1"));
        assert_eq!(err.to_string(), "benchmark not found: b1");
    }

    #[test]
    fn storage_backend_error_is_infrastructure() {
        let err: EvalError = StorageError::Backend("down".into()).into();
        assert_eq!(err.category(), ErrorCategory::Infrastructure);
    }
}
