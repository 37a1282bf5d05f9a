//! services/api/src/web/storage_events.rs
//!
//! Contains the Axum handler for object-storage event payloads. HTML files
//! uploaded under the pending-conversion prefix are converted to PDF with
//! the pure-software converter, uploaded next to their final location, and
//! the temporary HTML source is deleted. Records are processed
//! independently; one failure never aborts the batch.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::AppState;
use grant_assistant_core::ports::{ObjectStore, PdfRenderer, PortError};

/// Prefix under which uploaded HTML awaits conversion.
const PENDING_PREFIX: &str = "pending-conversion/";
/// File name of the converted PDF within its folder.
const OUTPUT_FILE_NAME: &str = "NOFO-File-PDF";

//=========================================================================================
// Event Payload Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct StorageEventPayload {
    #[serde(rename = "Records", default)]
    pub records: Vec<StorageEventRecord>,
}

#[derive(Deserialize, ToSchema)]
pub struct StorageEventRecord {
    pub s3: StorageEntity,
}

#[derive(Deserialize, ToSchema)]
pub struct StorageEntity {
    pub bucket: StorageBucket,
    pub object: StorageObject,
}

#[derive(Deserialize, ToSchema)]
pub struct StorageBucket {
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct StorageObject {
    pub key: String,
}

//=========================================================================================
// Handler
//=========================================================================================

/// Process a batch of storage event records.
#[utoipa::path(
    post,
    path = "/events/storage",
    request_body = StorageEventPayload,
    responses(
        (status = 200, description = "Batch processed; per-record failures are logged")
    )
)]
pub async fn storage_events_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StorageEventPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(event) = payload
        .map_err(|e| ApiError::Port(PortError::InvalidInput(e.body_text())))?;

    for record in &event.records {
        // Event payloads name the bucket; fall back to the configured
        // landing-page bucket when a trigger omits it.
        let bucket = if record.s3.bucket.name.is_empty() {
            &state.config.landing_page_bucket
        } else {
            &record.s3.bucket.name
        };
        let key = &record.s3.object.key;
        if let Err(e) = convert_record(
            state.objects.as_ref(),
            state.converter.as_ref(),
            bucket,
            key,
        )
        .await
        {
            // Continue with the remaining records.
            error!("Error processing record {key}: {e}");
        }
    }

    Ok(Json(serde_json::json!({ "message": "HTML to PDF conversion completed" })).into_response())
}

//=========================================================================================
// Operations
//=========================================================================================

/// Derives the final PDF key from a pending-conversion HTML key of the form
/// `pending-conversion/{folder}/{name}.html`. Returns `None` for keys that
/// are not conversion candidates.
fn derive_output_key(key: &str) -> Option<String> {
    if !key.starts_with(PENDING_PREFIX) || !key.ends_with(".html") {
        return None;
    }
    let parts: Vec<&str> = key.split('/').collect();
    if parts.len() < 3 {
        return None;
    }
    Some(format!("{}/{}", parts[1], OUTPUT_FILE_NAME))
}

async fn convert_record(
    objects: &dyn ObjectStore,
    converter: &dyn PdfRenderer,
    bucket: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(output_key) = derive_output_key(key) else {
        info!("Skipping {key}: not an HTML file under {PENDING_PREFIX}");
        return Ok(());
    };

    let bytes = objects.get_object(bucket, key).await?;
    let html = String::from_utf8(bytes)
        .map_err(|e| PortError::InvalidInput(format!("Uploaded HTML is not UTF-8: {e}")))?;
    info!("Converting {key} ({} bytes of HTML)", html.len());

    let pdf = converter.render_pdf(&html).await?;
    objects
        .put_object(bucket, &output_key, pdf, "application/pdf")
        .await?;
    info!("Uploaded converted PDF: {output_key}");

    objects.delete_object(bucket, key).await?;
    info!("Deleted temporary HTML file: {key}");
    Ok(())
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use grant_assistant_core::ports::PortResult;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemObjectStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemObjectStore {
        fn with(key: &str, body: &str) -> Self {
            let store = Self::default();
            store
                .objects
                .lock()
                .unwrap()
                .insert(key.to_string(), body.as_bytes().to_vec());
            store
        }

        fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
            keys.sort();
            keys
        }
    }

    #[async_trait]
    impl ObjectStore for MemObjectStore {
        async fn get_object(&self, _bucket: &str, key: &str) -> PortResult<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| PortError::NotFound(key.to_string()))
        }

        async fn put_object(
            &self,
            _bucket: &str,
            key: &str,
            body: Vec<u8>,
            _content_type: &str,
        ) -> PortResult<()> {
            self.objects.lock().unwrap().insert(key.to_string(), body);
            Ok(())
        }

        async fn delete_object(&self, _bucket: &str, key: &str) -> PortResult<()> {
            self.objects.lock().unwrap().remove(key);
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

    struct FakeConverter;

    #[async_trait]
    impl PdfRenderer for FakeConverter {
        async fn render_pdf(&self, _html: &str) -> PortResult<Vec<u8>> {
            Ok(b"%PDF-fake".to_vec())
        }
    }

    #[test]
    fn output_key_comes_from_the_folder_name() {
        assert_eq!(
            derive_output_key("pending-conversion/Safe Streets 2026/NOFO-File-HTML.html"),
            Some("Safe Streets 2026/NOFO-File-PDF".to_string())
        );
    }

    #[test]
    fn non_candidates_are_rejected() {
        // Wrong prefix, wrong extension, missing folder level.
        assert_eq!(derive_output_key("uploads/notice/file.html"), None);
        assert_eq!(derive_output_key("pending-conversion/notice/file.pdf"), None);
        assert_eq!(derive_output_key("pending-conversion/file.html"), None);
    }

    #[tokio::test]
    async fn converts_uploads_and_removes_the_source() {
        let key = "pending-conversion/notice/NOFO-File-HTML.html";
        let store = MemObjectStore::with(key, "<html><body><p>hi</p></body></html>");

        convert_record(&store, &FakeConverter, "landing", key).await.unwrap();

        assert_eq!(store.keys(), vec!["notice/NOFO-File-PDF".to_string()]);
        assert_eq!(
            store.get_object("landing", "notice/NOFO-File-PDF").await.unwrap(),
            b"%PDF-fake".to_vec()
        );
    }

    #[tokio::test]
    async fn skipped_keys_leave_storage_untouched() {
        let key = "other-prefix/notice/file.html";
        let store = MemObjectStore::with(key, "<html></html>");
        convert_record(&store, &FakeConverter, "landing", key).await.unwrap();
        assert_eq!(store.keys(), vec![key.to_string()]);
    }

    #[tokio::test]
    async fn missing_object_surfaces_as_record_error() {
        let store = MemObjectStore::default();
        let err = convert_record(
            &store,
            &FakeConverter,
            "landing",
            "pending-conversion/notice/missing.html",
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }
}
