//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// A named ingestion data source of the knowledge base.
#[derive(Clone, Debug)]
pub struct DataSource {
    /// Stable name callers use to scope a sync (`user-documents`, ...).
    pub name: String,
    /// The backend's identifier for the data source.
    pub id: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,

    // Object storage gateway
    pub object_store_endpoint: String,
    pub object_store_presigned_endpoint: Option<String>,
    pub object_store_token: Option<String>,
    pub object_store_signing_secret: String,
    pub user_documents_bucket: String,
    pub feedback_download_bucket: String,
    pub landing_page_bucket: String,

    // Knowledge-base ingestion API
    pub ingestion_endpoint: String,
    pub ingestion_token: Option<String>,
    pub knowledge_base_id: String,
    pub data_sources: Vec<DataSource>,

    // Search cluster (index bootstrap)
    pub search_endpoint: String,
    pub search_token: Option<String>,
    pub search_index_name: String,
    pub embedding_dimension: u32,
}

fn require(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = require("DATABASE_URL")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Object Storage Settings ---
        let object_store_endpoint = require("OBJECT_STORE_ENDPOINT")?;
        let object_store_presigned_endpoint = std::env::var("OBJECT_STORE_PRESIGNED_ENDPOINT").ok();
        let object_store_token = std::env::var("OBJECT_STORE_TOKEN").ok();
        let object_store_signing_secret = require("OBJECT_STORE_SIGNING_SECRET")?;
        let user_documents_bucket = require("USER_DOCUMENTS_BUCKET")?;
        let feedback_download_bucket = require("FEEDBACK_S3_DOWNLOAD")?;
        let landing_page_bucket = require("LANDING_PAGE_BUCKET")?;

        // --- Load Knowledge-Base Settings ---
        let ingestion_endpoint = require("KB_ENDPOINT")?;
        let ingestion_token = std::env::var("KB_TOKEN").ok();
        let knowledge_base_id = require("KB_ID")?;
        let data_sources = vec![
            DataSource {
                name: "user-documents".to_string(),
                id: require("USER_DOCUMENTS_SOURCE_ID")?,
            },
            DataSource {
                name: "structured-notices".to_string(),
                id: require("STRUCTURED_NOTICES_SOURCE_ID")?,
            },
        ];

        // --- Load Search Cluster Settings ---
        let search_endpoint = require("COLLECTION_ENDPOINT")?;
        let search_token = std::env::var("COLLECTION_TOKEN").ok();
        let search_index_name = require("INDEX_NAME")?;
        let embedding_dim_str = require("EMBEDDING_DIM")?;
        let embedding_dimension = embedding_dim_str.parse::<u32>().map_err(|_| {
            ConfigError::InvalidValue(
                "EMBEDDING_DIM".to_string(),
                format!("'{}' is not a valid dimension", embedding_dim_str),
            )
        })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            object_store_endpoint,
            object_store_presigned_endpoint,
            object_store_token,
            object_store_signing_secret,
            user_documents_bucket,
            feedback_download_bucket,
            landing_page_bucket,
            ingestion_endpoint,
            ingestion_token,
            knowledge_base_id,
            data_sources,
            search_endpoint,
            search_token,
            search_index_name,
            embedding_dimension,
        })
    }
}
