//! services/api/src/adapters/ingestion.rs
//!
//! This module contains the adapter for the managed retrieval-index
//! ingestion API. It implements the `KnowledgeIngestion` port from the
//! `core` crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grant_assistant_core::domain::{IngestionJobStatus, IngestionJobSummary};
use grant_assistant_core::ports::{KnowledgeIngestion, PortError, PortResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListJobsRequest<'a> {
    filters: Vec<StatusFilter<'a>>,
}

#[derive(Serialize)]
struct StatusFilter<'a> {
    attribute: &'static str,
    operator: &'static str,
    values: Vec<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListJobsResponse {
    #[serde(default)]
    ingestion_job_summaries: Vec<JobSummaryWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobSummaryWire {
    ingestion_job_id: String,
    status: IngestionJobStatus,
    updated_at: DateTime<Utc>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `KnowledgeIngestion` port against the
/// knowledge-base ingestion HTTP API.
#[derive(Clone)]
pub struct IngestionApiAdapter {
    client: Client,
    endpoint: String,
    bearer_token: Option<String>,
    knowledge_base_id: String,
}

impl IngestionApiAdapter {
    /// Creates a new `IngestionApiAdapter`.
    pub fn new(
        client: Client,
        endpoint: String,
        bearer_token: Option<String>,
        knowledge_base_id: String,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bearer_token,
            knowledge_base_id,
        }
    }

    fn jobs_url(&self, data_source_id: &str) -> String {
        format!(
            "{}/knowledgebases/{}/datasources/{}/ingestionjobs",
            self.endpoint, self.knowledge_base_id, data_source_id
        )
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn map_status(status: StatusCode, context: &str) -> PortError {
        match status {
            StatusCode::CONFLICT => PortError::Conflict(context.to_string()),
            StatusCode::TOO_MANY_REQUESTS => PortError::Throttled,
            StatusCode::NOT_FOUND => PortError::NotFound(context.to_string()),
            other => PortError::Unexpected(format!("ingestion API returned {}: {}", other, context)),
        }
    }
}

//=========================================================================================
// `KnowledgeIngestion` Trait Implementation
//=========================================================================================

#[async_trait]
impl KnowledgeIngestion for IngestionApiAdapter {
    async fn list_jobs(
        &self,
        data_source_id: &str,
        status: IngestionJobStatus,
    ) -> PortResult<Vec<IngestionJobSummary>> {
        let request = ListJobsRequest {
            filters: vec![StatusFilter {
                attribute: "STATUS",
                operator: "EQ",
                values: vec![status.as_str()],
            }],
        };

        let response = self
            .authed(
                self.client
                    .post(format!("{}/list", self.jobs_url(data_source_id)))
                    .json(&request),
            )
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::map_status(response.status(), data_source_id));
        }

        let body: ListJobsResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(body
            .ingestion_job_summaries
            .into_iter()
            .map(|j| IngestionJobSummary {
                job_id: j.ingestion_job_id,
                status: j.status,
                updated_at: j.updated_at,
            })
            .collect())
    }

    async fn start_job(&self, data_source_id: &str) -> PortResult<()> {
        let response = self
            .authed(self.client.put(self.jobs_url(data_source_id)))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::map_status(response.status(), data_source_id));
        }
        Ok(())
    }
}
