//! Error types for dmp-eval-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the database.
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors surfaced by the document-store traits.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No record with this key exists in the collection.
    #[error("{collection} record not found: {id}")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    /// The backing store rejected or failed the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A record could not be encoded or decoded.
    #[error("record serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Whether this error means the requested record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_collection_and_id() {
        let err = StorageError::NotFound {
            collection: "tests",
            id: "t-1".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "tests record not found: t-1");
    }

    #[test]
    fn backend_error_is_not_not_found() {
        let err = StorageError::Backend("socket closed".to_string());
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("socket closed"));
    }
}
