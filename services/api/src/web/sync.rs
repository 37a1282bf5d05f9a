//! services/api/src/web/sync.rs
//!
//! Knowledge-base sync orchestration. The service is invoked two ways:
//! directly (fire-and-forget trigger, optionally scoped to one named data
//! source) and over HTTP by admins, where the raw path selects start /
//! status / last-sync by substring match.

use axum::extract::{OriginalUri, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::DataSource;
use crate::error::ApiError;
use crate::web::auth::AuthContext;
use crate::web::state::AppState;
use grant_assistant_core::domain::IngestionJobStatus;
use grant_assistant_core::ports::{KnowledgeIngestion, PortError, PortResult};

//=========================================================================================
// The Sync Service
//=========================================================================================

/// Coordinates ingestion runs across the configured data sources.
pub struct SyncService {
    ingestion: Arc<dyn KnowledgeIngestion>,
    data_sources: Vec<DataSource>,
}

impl SyncService {
    /// Creates a new `SyncService`.
    pub fn new(ingestion: Arc<dyn KnowledgeIngestion>, data_sources: Vec<DataSource>) -> Self {
        Self {
            ingestion,
            data_sources,
        }
    }

    fn sources_for(&self, scope: Option<&str>) -> Vec<&DataSource> {
        match scope {
            Some(name) => self.data_sources.iter().filter(|s| s.name == name).collect(),
            None => self.data_sources.iter().collect(),
        }
    }

    /// Whether any job for the data source is currently starting or running.
    async fn source_running(&self, data_source_id: &str) -> PortResult<bool> {
        let in_progress = self
            .ingestion
            .list_jobs(data_source_id, IngestionJobStatus::InProgress)
            .await?;
        let starting = self
            .ingestion
            .list_jobs(data_source_id, IngestionJobStatus::Starting)
            .await?;
        Ok(!in_progress.is_empty() || !starting.is_empty())
    }

    /// Whether any configured data source currently has a job running.
    pub async fn any_running(&self) -> PortResult<bool> {
        for source in &self.data_sources {
            if self.source_running(&source.id).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Starts ingestion for the scoped sources, skipping any that already
    /// have a running job. The check-then-start sequence has a race window;
    /// the backend's conflict rejection is the safety net and is treated as
    /// a skip, not a failure. Returns how many jobs were started.
    pub async fn start_pending(&self, scope: Option<&str>) -> PortResult<usize> {
        let sources = self.sources_for(scope);
        if sources.is_empty() {
            warn!("No data source matches sync scope {:?}", scope);
            return Ok(0);
        }

        let mut started = 0;
        for source in sources {
            if self.source_running(&source.id).await? {
                info!("Sync already in progress for {}", source.name);
                continue;
            }
            match self.ingestion.start_job(&source.id).await {
                Ok(()) => {
                    info!("Started knowledge base sync for {}", source.name);
                    started += 1;
                }
                Err(PortError::Conflict(_)) => {
                    info!("Sync for {} already queued by a concurrent trigger", source.name);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(started)
    }

    /// The most recent completed-job timestamp across all configured data
    /// sources, or `None` when no sync has ever completed.
    pub async fn last_sync(&self) -> PortResult<Option<DateTime<Utc>>> {
        let mut latest: Option<DateTime<Utc>> = None;
        for source in &self.data_sources {
            let complete = self
                .ingestion
                .list_jobs(&source.id, IngestionJobStatus::Complete)
                .await?;
            for job in complete {
                if latest.map_or(true, |t| job.updated_at > t) {
                    latest = Some(job.updated_at);
                }
            }
        }
        Ok(latest)
    }
}

//=========================================================================================
// Request Types
//=========================================================================================

/// Body of a direct sync trigger.
#[derive(Deserialize, Default, ToSchema)]
pub struct SyncTriggerRequest {
    /// Optional named data source to scope the sync to; absent syncs all.
    #[serde(rename = "syncSource")]
    pub sync_source: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Direct sync trigger, used fire-and-forget by other components.
#[utoipa::path(
    post,
    path = "/sync",
    request_body = SyncTriggerRequest,
    responses(
        (status = 200, description = "Sync evaluated; already-running sources are skipped")
    )
)]
pub async fn trigger_sync_handler(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<SyncTriggerRequest>>,
) -> Result<Response, ApiError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let started = state.sync.start_pending(request.sync_source.as_deref()).await?;
    Ok(Json(serde_json::json!({ "started": started })).into_response())
}

/// Admin sync operations, routed by substring match on the raw path:
/// `sync-kb`, `still-syncing`, or `last-sync`.
pub async fn kb_http_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let Some(claims) = ctx.claims() else {
        // Without forwarded claims the role cannot be checked at all.
        return Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!(
                "Unable to check user role, please ensure the gateway forwards role claims"
            )),
        )
            .into_response());
    };
    if !claims.is_admin() {
        return Err(PortError::Forbidden.into());
    }

    let path = uri.path();
    if path.contains("sync-kb") {
        if state.sync.any_running().await? {
            return Ok(Json(serde_json::json!("STILL SYNCING")).into_response());
        }
        state.sync.start_pending(None).await?;
        Ok(Json(serde_json::json!("STARTED SYNCING")).into_response())
    } else if path.contains("still-syncing") {
        let message = if state.sync.any_running().await? {
            "STILL SYNCING"
        } else {
            "DONE SYNCING"
        };
        Ok(Json(serde_json::json!(message)).into_response())
    } else if path.contains("last-sync") {
        let last = state
            .sync
            .last_sync()
            .await?
            .ok_or_else(|| PortError::NotFound("No completed sync jobs".to_string()))?;
        let formatted = last.format("%B %d, %Y, %I:%M%p UTC").to_string();
        Ok(Json(serde_json::json!(formatted)).into_response())
    } else {
        Err(PortError::InvalidInput(format!("Operation not found/allowed! Path sent: {path}")).into())
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use grant_assistant_core::domain::IngestionJobSummary;
    use std::sync::Mutex;

    /// Scriptable ingestion backend: per-source running flags, recorded
    /// starts, and an optional conflict on start.
    #[derive(Default)]
    struct MockIngestion {
        running: Mutex<Vec<String>>,
        completed: Mutex<Vec<(String, DateTime<Utc>)>>,
        started: Mutex<Vec<String>>,
        conflict_on_start: bool,
    }

    #[async_trait]
    impl KnowledgeIngestion for MockIngestion {
        async fn list_jobs(
            &self,
            data_source_id: &str,
            status: IngestionJobStatus,
        ) -> PortResult<Vec<IngestionJobSummary>> {
            let jobs = match status {
                IngestionJobStatus::InProgress => self
                    .running
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|id| *id == data_source_id)
                    .map(|id| IngestionJobSummary {
                        job_id: format!("job-{id}"),
                        status,
                        updated_at: Utc::now(),
                    })
                    .collect(),
                IngestionJobStatus::Complete => self
                    .completed
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|(id, _)| id == data_source_id)
                    .map(|(id, at)| IngestionJobSummary {
                        job_id: format!("job-{id}"),
                        status,
                        updated_at: *at,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            Ok(jobs)
        }

        async fn start_job(&self, data_source_id: &str) -> PortResult<()> {
            if self.conflict_on_start {
                return Err(PortError::Conflict("already queued".to_string()));
            }
            self.started.lock().unwrap().push(data_source_id.to_string());
            self.running.lock().unwrap().push(data_source_id.to_string());
            Ok(())
        }
    }

    fn service(ingestion: Arc<MockIngestion>) -> SyncService {
        SyncService::new(
            ingestion,
            vec![
                DataSource {
                    name: "user-documents".to_string(),
                    id: "ds-docs".to_string(),
                },
                DataSource {
                    name: "structured-notices".to_string(),
                    id: "ds-notices".to_string(),
                },
            ],
        )
    }

    #[tokio::test]
    async fn starts_all_sources_when_idle() {
        let ingestion = Arc::new(MockIngestion::default());
        let sync = service(ingestion.clone());
        let started = sync.start_pending(None).await.unwrap();
        assert_eq!(started, 2);
        assert_eq!(
            *ingestion.started.lock().unwrap(),
            vec!["ds-docs".to_string(), "ds-notices".to_string()]
        );
    }

    #[tokio::test]
    async fn scoped_trigger_only_touches_the_named_source() {
        let ingestion = Arc::new(MockIngestion::default());
        let sync = service(ingestion.clone());
        let started = sync.start_pending(Some("user-documents")).await.unwrap();
        assert_eq!(started, 1);
        assert_eq!(*ingestion.started.lock().unwrap(), vec!["ds-docs".to_string()]);
    }

    #[tokio::test]
    async fn running_source_is_skipped_idempotently() {
        let ingestion = Arc::new(MockIngestion::default());
        ingestion.running.lock().unwrap().push("ds-docs".to_string());
        let sync = service(ingestion.clone());

        let started = sync.start_pending(None).await.unwrap();
        assert_eq!(started, 1);
        assert_eq!(*ingestion.started.lock().unwrap(), vec!["ds-notices".to_string()]);
    }

    #[tokio::test]
    async fn second_concurrent_trigger_sees_at_most_one_start() {
        let ingestion = Arc::new(MockIngestion::default());
        let sync = service(ingestion.clone());

        let first = sync.start_pending(Some("user-documents")).await.unwrap();
        // The second trigger observes the job the first one recorded.
        let second = sync.start_pending(Some("user-documents")).await.unwrap();
        assert_eq!(first + second, 1);
    }

    #[tokio::test]
    async fn backend_conflict_is_a_non_fatal_skip() {
        let ingestion = Arc::new(MockIngestion {
            conflict_on_start: true,
            ..Default::default()
        });
        let sync = service(ingestion);
        let started = sync.start_pending(None).await.unwrap();
        assert_eq!(started, 0);
    }

    #[tokio::test]
    async fn unknown_scope_starts_nothing() {
        let ingestion = Arc::new(MockIngestion::default());
        let sync = service(ingestion.clone());
        let started = sync.start_pending(Some("nonexistent")).await.unwrap();
        assert_eq!(started, 0);
        assert!(ingestion.started.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_sync_reports_most_recent_across_sources() {
        let ingestion = Arc::new(MockIngestion::default());
        {
            let mut completed = ingestion.completed.lock().unwrap();
            completed.push((
                "ds-docs".to_string(),
                Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            ));
            completed.push((
                "ds-notices".to_string(),
                Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            ));
        }
        let sync = service(ingestion);
        let last = sync.last_sync().await.unwrap().unwrap();
        assert_eq!(last, Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn last_sync_is_none_when_nothing_completed() {
        let ingestion = Arc::new(MockIngestion::default());
        let sync = service(ingestion);
        assert!(sync.last_sync().await.unwrap().is_none());
    }
}
