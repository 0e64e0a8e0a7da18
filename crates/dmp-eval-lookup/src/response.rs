//! Result contract shared by every lookup service, and the lookup traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LookupError;

/// Outcome of one external lookup.
///
/// `success == false` always carries an `error`, and a `status` when the
/// service answered at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl LookupResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status: Some(200),
        }
    }

    pub fn failed(error: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            status,
        }
    }

    /// Fold a client result into the contract.
    pub fn from_result(result: Result<Value, LookupError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failed(err.to_string(), err.status()),
        }
    }

    /// Boolean field of `data`, if present and boolean.
    pub fn data_bool(&self, field: &str) -> Option<bool> {
        self.data.as_ref()?.get(field)?.as_bool()
    }

    /// String field of `data`, if present and a string.
    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.data.as_ref()?.get(field)?.as_str()
    }
}

/// Open-access status of a published resource (e.g. Unpaywall).
#[async_trait]
pub trait OpenAccessLookup: Send + Sync {
    /// Look up a DOI. `data.is_oa` carries the verdict on success.
    async fn check_open_access(&self, doi: &str) -> LookupResponse;
}

/// FAIR assessment of a resource (e.g. FAIR Champion).
#[async_trait]
pub trait FairAssessmentLookup: Send + Sync {
    /// Run the named assessment test against a resource identifier.
    async fn assess(&self, test_name: &str, resource: &str) -> LookupResponse;
}
