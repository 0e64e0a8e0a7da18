//! Static lookup fakes (testing only)
//!
//! `StaticLookup` answers both lookup traits from preset tables and records
//! every call it receives.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::response::{FairAssessmentLookup, LookupResponse, OpenAccessLookup};

/// Preset answers keyed by DOI (open access) or `(test, resource)` (FAIR).
///
/// Unknown keys answer with a failed response, status 404.
#[derive(Debug, Default)]
pub struct StaticLookup {
    open_access: HashMap<String, LookupResponse>,
    assessments: HashMap<(String, String), LookupResponse>,
    calls: Mutex<Vec<String>>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `check_open_access(doi)` with `{"is_oa": is_oa}`.
    pub fn with_open_access(mut self, doi: &str, is_oa: bool) -> Self {
        self.open_access.insert(
            doi.to_string(),
            LookupResponse::ok(serde_json::json!({ "doi": doi, "is_oa": is_oa })),
        );
        self
    }

    /// Answer `check_open_access(doi)` with an arbitrary response.
    pub fn with_open_access_response(mut self, doi: &str, response: LookupResponse) -> Self {
        self.open_access.insert(doi.to_string(), response);
        self
    }

    /// Answer `assess(test, resource)` with an arbitrary response.
    pub fn with_assessment(mut self, test: &str, resource: &str, response: LookupResponse) -> Self {
        self.assessments
            .insert((test.to_string(), resource.to_string()), response);
        self
    }

    /// Every lookup received so far, as `oa:<doi>` or `fair:<test>:<resource>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

fn unknown(key: &str) -> LookupResponse {
    LookupResponse::failed(format!("no preset answer for {key}"), Some(404))
}

#[async_trait]
impl OpenAccessLookup for StaticLookup {
    async fn check_open_access(&self, doi: &str) -> LookupResponse {
        self.record(format!("oa:{doi}"));
        self.open_access
            .get(doi)
            .cloned()
            .unwrap_or_else(|| unknown(doi))
    }
}

#[async_trait]
impl FairAssessmentLookup for StaticLookup {
    async fn assess(&self, test_name: &str, resource: &str) -> LookupResponse {
        self.record(format!("fair:{test_name}:{resource}"));
        self.assessments
            .get(&(test_name.to_string(), resource.to_string()))
            .cloned()
            .unwrap_or_else(|| unknown(resource))
    }
}
