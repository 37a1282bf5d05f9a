//! services/api/src/web/documents.rs
//!
//! Contains the Axum handler that deletes a user document and its metadata
//! sidecar from object storage, then asynchronously triggers a
//! knowledge-base sync so the deleted content leaves the retrieval index.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::auth::AuthContext;
use crate::web::state::AppState;
use crate::web::sync::SyncService;
use grant_assistant_core::ports::{ObjectStore, PortError};

/// The data source re-synced after a user document disappears.
const USER_DOCUMENTS_SOURCE: &str = "user-documents";

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct DeleteDocumentRequest {
    #[serde(rename = "KEY")]
    pub key: String,
}

//=========================================================================================
// Handler
//=========================================================================================

/// Delete a user document. The caller may only delete keys under their own
/// identity prefix.
#[utoipa::path(
    post,
    path = "/documents/delete",
    request_body = DeleteDocumentRequest,
    responses(
        (status = 200, description = "Document deleted"),
        (status = 401, description = "Caller identity missing from claims"),
        (status = 403, description = "Key does not belong to the caller"),
        (status = 502, description = "Object store failure")
    )
)]
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    payload: Result<Json<DeleteDocumentRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::Port(PortError::InvalidInput(e.body_text())))?;

    let username = ctx
        .claims()
        .and_then(|c| c.username.as_deref())
        .ok_or(PortError::Unauthorized)?
        .to_string();

    delete_document(
        state.objects.clone(),
        state.sync.clone(),
        state.config.user_documents_bucket.clone(),
        &username,
        &request.key,
    )
    .await?;

    Ok(Json(serde_json::json!({ "message": "Document deleted successfully" })).into_response())
}

/// Delete an arbitrary object from the landing-page bucket. Admin only;
/// used by notice-management tooling rather than end users.
#[utoipa::path(
    post,
    path = "/objects/delete",
    request_body = DeleteDocumentRequest,
    responses(
        (status = 200, description = "Object deleted"),
        (status = 403, description = "Caller lacks the admin role"),
        (status = 502, description = "Object store failure")
    )
)]
pub async fn admin_delete_object_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    payload: Result<Json<DeleteDocumentRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    if !ctx.is_admin() {
        return Err(PortError::Forbidden.into());
    }
    let Json(request) = payload
        .map_err(|e| ApiError::Port(PortError::InvalidInput(e.body_text())))?;

    match state
        .objects
        .delete_object(&state.config.landing_page_bucket, &request.key)
        .await
    {
        Ok(()) | Err(PortError::NotFound(_)) => {
            info!("Deleted object: {}", request.key);
            Ok(Json(serde_json::json!({ "message": "Object deleted successfully" }))
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

//=========================================================================================
// Operation
//=========================================================================================

/// Ownership-checked delete of the object and its metadata sidecar. The
/// ownership check runs before any storage call; the sidecar delete and the
/// sync trigger are best-effort.
async fn delete_document(
    objects: Arc<dyn ObjectStore>,
    sync: Arc<SyncService>,
    bucket: String,
    username: &str,
    key: &str,
) -> Result<(), ApiError> {
    if !key.starts_with(&format!("{username}/")) {
        return Err(PortError::Forbidden.into());
    }

    match objects.delete_object(&bucket, key).await {
        Ok(()) => info!("Deleted document: {key}"),
        // The object store treats deleting an absent key as success.
        Err(PortError::NotFound(_)) => info!("Document already absent: {key}"),
        Err(e) => return Err(e.into()),
    }

    let metadata_key = format!("{key}.metadata.json");
    if let Err(e) = objects.delete_object(&bucket, &metadata_key).await {
        info!("Metadata sidecar not deleted ({metadata_key}): {e}");
    }

    // Fire-and-forget: the retrieval index catches up eventually, and a
    // failed trigger must not fail the delete.
    tokio::spawn(async move {
        if let Err(e) = sync.start_pending(Some(USER_DOCUMENTS_SOURCE)).await {
            warn!("KB sync trigger failed (non-critical): {e}");
        }
    });

    Ok(())
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use grant_assistant_core::domain::{IngestionJobStatus, IngestionJobSummary};
    use grant_assistant_core::ports::{KnowledgeIngestion, PortResult};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObjectStore {
        deleted: Mutex<Vec<String>>,
        missing: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingObjectStore {
        async fn get_object(&self, _bucket: &str, key: &str) -> PortResult<Vec<u8>> {
            Err(PortError::NotFound(key.to_string()))
        }

        async fn put_object(
            &self,
            _bucket: &str,
            _key: &str,
            _body: Vec<u8>,
            _content_type: &str,
        ) -> PortResult<()> {
            Ok(())
        }

        async fn delete_object(&self, _bucket: &str, key: &str) -> PortResult<()> {
            if self.missing.lock().unwrap().iter().any(|k| k == key) {
                return Err(PortError::NotFound(key.to_string()));
            }
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn presign_get(
            &self,
            _bucket: &str,
            key: &str,
            _expires_in_secs: u64,
        ) -> PortResult<String> {
            Ok(format!("https://example.invalid/{key}"))
        }
    }

    struct IdleIngestion;

    #[async_trait]
    impl KnowledgeIngestion for IdleIngestion {
        async fn list_jobs(
            &self,
            _data_source_id: &str,
            _status: IngestionJobStatus,
        ) -> PortResult<Vec<IngestionJobSummary>> {
            Ok(Vec::new())
        }

        async fn start_job(&self, _data_source_id: &str) -> PortResult<()> {
            Ok(())
        }
    }

    fn sync() -> Arc<SyncService> {
        Arc::new(SyncService::new(Arc::new(IdleIngestion), Vec::new()))
    }

    #[tokio::test]
    async fn foreign_key_is_forbidden_without_touching_storage() {
        let store = Arc::new(RecordingObjectStore::default());
        let result = delete_document(
            store.clone(),
            sync(),
            "docs".to_string(),
            "alice",
            "bob/report.pdf",
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(store.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deletes_document_and_metadata_sidecar() {
        let store = Arc::new(RecordingObjectStore::default());
        delete_document(
            store.clone(),
            sync(),
            "docs".to_string(),
            "alice",
            "alice/report.pdf",
        )
        .await
        .unwrap();

        let deleted = store.deleted.lock().unwrap().clone();
        assert_eq!(
            deleted,
            vec![
                "alice/report.pdf".to_string(),
                "alice/report.pdf.metadata.json".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_sidecar_is_not_an_error() {
        let store = Arc::new(RecordingObjectStore::default());
        store
            .missing
            .lock()
            .unwrap()
            .push("alice/report.pdf.metadata.json".to_string());

        let result = delete_document(
            store.clone(),
            sync(),
            "docs".to_string(),
            "alice",
            "alice/report.pdf",
        )
        .await;
        assert!(result.is_ok());
    }
}
