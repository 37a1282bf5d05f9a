//! services/api/src/bin/create_index.rs
//!
//! One-shot bootstrap of the vector index in the managed search cluster.
//! Submits the knn schema, waits for cluster propagation, and verifies the
//! index exists. A pre-existing index is success, not an error.

use api_lib::adapters::SearchClusterAdapter;
use api_lib::config::Config;
use api_lib::error::ApiError;
use grant_assistant_core::ports::SearchIndexAdmin;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fixed delay for the cluster to propagate the new index.
const PROPAGATION_DELAY: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Collection endpoint: {}", config.search_endpoint);
    info!("Index name: {}", config.search_index_name);

    let admin = SearchClusterAdapter::new(
        reqwest::Client::new(),
        config.search_endpoint,
        config.search_token,
        config.search_index_name.clone(),
        config.embedding_dimension,
    );

    let created = admin.create_index().await?;
    if created {
        info!("Index creation submitted: {}", config.search_index_name);
        info!("Waiting {}s for the index to be available...", PROPAGATION_DELAY.as_secs());
        tokio::time::sleep(PROPAGATION_DELAY).await;
    } else {
        info!("Index already exists, treating as success");
    }

    let exists = admin.index_exists().await?;
    info!("Index exists check: {exists}");
    if !exists {
        return Err(ApiError::Internal(format!(
            "index {} not visible after creation",
            config.search_index_name
        )));
    }

    Ok(())
}
