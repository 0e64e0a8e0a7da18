//! SurrealDB connection setup
//!
//! Resolution order used by [`connect_from_env`]:
//! 1. `SURREALDB_ENDPOINT` + credentials (remote, authenticated)
//! 2. `SURREALDB_URL` (any engine URL, e.g. `mem://`, `ws://...`)
//! 3. local persistence under `.dmp-eval/db` (`surrealkv://`)

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database as DatabaseAuth, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StateError;
use crate::migrations;
use crate::Result;

/// Connected SurrealDB handle, any engine.
pub type Database = Surreal<Any>;

const DEFAULT_NAMESPACE: &str = "dmp_eval";
const DEFAULT_DATABASE: &str = "main";
const LOCAL_DB_PATH: &str = ".dmp-eval/db";

/// Configuration for an authenticated SurrealDB connection
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "dmp_eval")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl StoreConfig {
    /// Configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "dmp_eval")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace =
            std::env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// Connect to an in-memory database and initialize the schema.
#[instrument(skip_all)]
pub async fn connect_in_memory() -> Result<Database> {
    connect_url("mem://").await
}

/// Connect to any engine URL, select the default namespace/database and
/// initialize the schema.
#[instrument]
pub async fn connect_url(url: &str) -> Result<Database> {
    let db = surrealdb::engine::any::connect(url)
        .await
        .map_err(|e| StateError::Connection(format!("Failed to connect to {url}: {e}")))?;

    db.use_ns(DEFAULT_NAMESPACE)
        .use_db(DEFAULT_DATABASE)
        .await
        .map_err(|e| StateError::Connection(e.to_string()))?;

    migrations::init_schema(&db).await?;
    info!(url, "SurrealDB connected");
    Ok(db)
}

/// Connect with credentials and initialize the schema.
#[instrument(skip_all, fields(endpoint = %config.endpoint))]
pub async fn connect(config: &StoreConfig) -> Result<Database> {
    let db = surrealdb::engine::any::connect(&config.endpoint)
        .await
        .map_err(|e| StateError::Connection(e.to_string()))?;

    if config.is_root {
        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StateError::Connection(format!("Root auth failed: {e}")))?;
    } else {
        db.signin(DatabaseAuth {
            namespace: &config.namespace,
            database: &config.database,
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StateError::Connection(format!("DB auth failed: {e}")))?;
    }

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .map_err(|e| StateError::Connection(e.to_string()))?;

    migrations::init_schema(&db).await?;
    info!(namespace = %config.namespace, "SurrealDB connected (authenticated)");
    Ok(db)
}

/// Connect using environment configuration, falling back to local
/// persistence in `.dmp-eval/db`.
pub async fn connect_from_env() -> Result<Database> {
    if let Ok(config) = StoreConfig::from_env() {
        return connect(&config).await;
    }

    if let Ok(url) = std::env::var("SURREALDB_URL") {
        return connect_url(&url).await;
    }

    std::fs::create_dir_all(LOCAL_DB_PATH).map_err(|e| {
        StateError::Connection(format!(
            "Failed to create database directory {LOCAL_DB_PATH}: {e}"
        ))
    })?;
    info!(
        "No SURREALDB_ENDPOINT or SURREALDB_URL found, using local persistence: {}",
        LOCAL_DB_PATH
    );
    connect_url(&format!("surrealkv://{LOCAL_DB_PATH}")).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_config_builder_overrides_defaults() {
        let config = StoreConfig::new("wss://db.example", "u", "p")
            .with_namespace("ns")
            .with_database("db")
            .with_root(true);
        assert_eq!(config.namespace, "ns");
        assert_eq!(config.database, "db");
        assert!(config.is_root);
    }

    #[test]
    fn store_config_defaults() {
        let config = StoreConfig::new("ws://localhost:8000", "u", "p");
        assert_eq!(config.namespace, "dmp_eval");
        assert_eq!(config.database, "main");
        assert!(!config.is_root);
    }

    #[tokio::test]
    async fn in_memory_connection_initializes_schema_twice() {
        let db = connect_in_memory().await.unwrap();
        migrations::init_schema(&db).await.unwrap();
    }
}
