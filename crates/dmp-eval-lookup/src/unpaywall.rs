//! Unpaywall open-access client
//!
//! `GET {base}/v2/{doi}?email={email}` returns the Unpaywall record of a
//! DOI; its `is_oa` field is what the open-access check reads.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::LookupError;
use crate::response::{LookupResponse, OpenAccessLookup};

const DEFAULT_URL: &str = "https://api.unpaywall.org";
const DEFAULT_EMAIL: &str = "dmp-evaluator@ostrails.eu";
const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Unpaywall configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpaywallConfig {
    /// API base URL
    pub base_url: String,
    /// Contact email, required by Unpaywall on every request
    pub email: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for UnpaywallConfig {
    fn default() -> Self {
        UnpaywallConfig {
            base_url: std::env::var("UNPAYWALL_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()),
            email: std::env::var("UNPAYWALL_EMAIL").unwrap_or_else(|_| DEFAULT_EMAIL.to_string()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl UnpaywallConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config for a specific server
    pub fn new(base_url: &str, email: &str) -> Self {
        UnpaywallConfig {
            base_url: base_url.to_string(),
            email: email.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Unpaywall client
pub struct UnpaywallClient {
    config: UnpaywallConfig,
    http_client: reqwest::Client,
}

impl UnpaywallClient {
    pub fn new(config: UnpaywallConfig) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("dmp-eval-lookup/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| LookupError::ClientSetup(e.to_string()))?;

        Ok(UnpaywallClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self, LookupError> {
        Self::new(UnpaywallConfig::from_env())
    }

    /// `{base}/v2/{doi}` with each `/`-separated part of the DOI
    /// percent-encoded as its own path segment.
    fn lookup_url(&self, doi: &str) -> Result<reqwest::Url, LookupError> {
        let mut url = reqwest::Url::parse(&self.config.base_url).map_err(|e| {
            LookupError::ClientSetup(format!("invalid base URL '{}': {e}", self.config.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                LookupError::ClientSetup(format!(
                    "base URL '{}' cannot carry a path",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .push("v2")
            .extend(normalize_doi(doi).split('/'));
        Ok(url)
    }

    async fn fetch(&self, doi: &str) -> Result<Value, LookupError> {
        let url = self.lookup_url(doi)?;
        debug!(%url, "querying unpaywall");

        let response = self
            .http_client
            .get(url)
            .query(&[("email", self.config.email.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl OpenAccessLookup for UnpaywallClient {
    #[instrument(skip(self))]
    async fn check_open_access(&self, doi: &str) -> LookupResponse {
        let result = self.fetch(doi).await;
        if let Err(e) = &result {
            warn!(doi, error = %e, "unpaywall lookup failed");
        }
        LookupResponse::from_result(result)
    }
}

/// Strip resolver prefixes so `https://doi.org/10.1/x` and `doi:10.1/x`
/// both query `10.1/x`.
pub fn normalize_doi(doi: &str) -> &str {
    let trimmed = doi.trim();
    for prefix in ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest;
        }
    }
    trimmed
}
