//! FAIR Champion assessment client
//!
//! Runs a single named FAIR test against a resource:
//! `POST {base}/assess/test/{test_name}` with `{"resource_identifier": ..}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::error::LookupError;
use crate::response::{FairAssessmentLookup, LookupResponse};

const DEFAULT_URL: &str = "https://tools.ostrails.eu/champion";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairChampionConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for FairChampionConfig {
    fn default() -> Self {
        FairChampionConfig {
            base_url: std::env::var("FAIR_CHAMPION_URL")
                .unwrap_or_else(|_| DEFAULT_URL.to_string()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl FairChampionConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(base_url: &str) -> Self {
        FairChampionConfig {
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct FairChampionClient {
    config: FairChampionConfig,
    http_client: reqwest::Client,
}

impl FairChampionClient {
    pub fn new(config: FairChampionConfig) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("dmp-eval-lookup/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| LookupError::ClientSetup(e.to_string()))?;

        Ok(FairChampionClient {
            config,
            http_client,
        })
    }

    pub fn from_env() -> Result<Self, LookupError> {
        Self::new(FairChampionConfig::from_env())
    }

    async fn post_assessment(&self, test_name: &str, resource: &str) -> Result<Value, LookupError> {
        let url = format!(
            "{}/assess/test/{}",
            self.config.base_url.trim_end_matches('/'),
            test_name
        );
        debug!(%url, resource, "requesting FAIR assessment");

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({ "resource_identifier": resource }))
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
impl FairAssessmentLookup for FairChampionClient {
    #[instrument(skip(self))]
    async fn assess(&self, test_name: &str, resource: &str) -> LookupResponse {
        let result = self.post_assessment(test_name, resource).await;
        if let Err(e) = &result {
            warn!(test_name, resource, error = %e, "FAIR Champion assessment failed");
        }
        LookupResponse::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fair_champion_config_new() {
        let config = FairChampionConfig::new("http://localhost:1234/")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.base_url, "http://localhost:1234/");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
