//! services/api/src/adapters/search.rs
//!
//! This module contains the adapter for the managed search cluster. It
//! implements the `SearchIndexAdmin` port used by the one-shot index
//! bootstrap binary.

use async_trait::async_trait;
use grant_assistant_core::ports::{PortError, PortResult, SearchIndexAdmin};
use reqwest::Client;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `SearchIndexAdmin` against an
/// OpenSearch-compatible cluster endpoint.
#[derive(Clone)]
pub struct SearchClusterAdapter {
    client: Client,
    endpoint: String,
    bearer_token: Option<String>,
    index_name: String,
    embedding_dimension: u32,
}

impl SearchClusterAdapter {
    /// Creates a new `SearchClusterAdapter`.
    pub fn new(
        client: Client,
        endpoint: String,
        bearer_token: Option<String>,
        index_name: String,
        embedding_dimension: u32,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bearer_token,
            index_name,
            embedding_dimension,
        }
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.index_name)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// The knn index schema: an HNSW vector field with inner-product
    /// distance, a searchable text field, and a stored-only metadata field.
    fn index_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "settings": {
                "index": {
                    "knn": true,
                    "knn.algo_param.ef_search": 512
                }
            },
            "mappings": {
                "properties": {
                    "vector_field": {
                        "type": "knn_vector",
                        "dimension": self.embedding_dimension,
                        "method": {
                            "name": "hnsw",
                            "space_type": "innerproduct",
                            "engine": "faiss",
                            "parameters": {
                                "ef_construction": 512,
                                "m": 16
                            }
                        }
                    },
                    "metadata_field": { "type": "text", "index": false },
                    "text_field": { "type": "text" }
                }
            }
        })
    }
}

//=========================================================================================
// `SearchIndexAdmin` Trait Implementation
//=========================================================================================

#[async_trait]
impl SearchIndexAdmin for SearchClusterAdapter {
    async fn create_index(&self) -> PortResult<bool> {
        let response = self
            .authed(self.client.put(self.index_url()).json(&self.index_schema()))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }

        // The cluster reports a duplicate index either as a 409 or as a 400
        // carrying resource_already_exists_exception.
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::CONFLICT
            || body.contains("resource_already_exists_exception")
        {
            return Ok(false);
        }
        Err(PortError::Unexpected(format!(
            "index creation failed with {}: {}",
            status, body
        )))
    }

    async fn index_exists(&self) -> PortResult<bool> {
        let response = self
            .authed(self.client.head(self.index_url()))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        match response.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            other => Err(PortError::Unexpected(format!(
                "index existence check failed with {}",
                other
            ))),
        }
    }
}
