//! services/api/src/web/drafts.rs
//!
//! Contains the Axum handler for the draft store. A single endpoint accepts
//! an operation-tagged body selecting one of the CRUD/list verbs, mirroring
//! the managed-store adapter it replaces.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::listing::fetch_until_limit;
use crate::web::state::AppState;
use grant_assistant_core::domain::{
    DeletionOutcome, Draft, DraftPatch, DraftStatus, DraftSummary,
};
use grant_assistant_core::ports::{DraftStore, PortError};

/// Default page size for bounded listing.
pub const DEFAULT_LIST_LIMIT: usize = 15;
/// Cap for the unbounded listing variant.
pub const MAX_LIST_LIMIT: usize = 100;

//=========================================================================================
// Request and Response Types
//=========================================================================================

/// The operations the draft endpoint accepts, selected by the `operation`
/// field of the request body.
#[derive(Deserialize, ToSchema)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum DraftOperationRequest {
    AddDraft {
        user_id: String,
        session_id: String,
        title: Option<String>,
        document_identifier: Option<String>,
        #[serde(default)]
        sections: BTreeMap<String, String>,
        #[serde(default)]
        project_basics: BTreeMap<String, String>,
        #[serde(default)]
        questionnaire: BTreeMap<String, String>,
        #[schema(value_type = Option<String>)]
        status: Option<DraftStatus>,
    },
    GetDraft {
        user_id: String,
        session_id: String,
    },
    UpdateDraft {
        user_id: String,
        session_id: String,
        title: Option<String>,
        document_identifier: Option<String>,
        sections: Option<BTreeMap<String, String>>,
        project_basics: Option<BTreeMap<String, String>>,
        questionnaire: Option<BTreeMap<String, String>>,
        #[schema(value_type = Option<String>)]
        status: Option<DraftStatus>,
    },
    ListDraftsByUserId {
        user_id: String,
        document_identifier: Option<String>,
    },
    ListAllDraftsByUserId {
        user_id: String,
        document_identifier: Option<String>,
    },
    DeleteDraft {
        user_id: String,
        session_id: String,
    },
    DeleteUserDrafts {
        user_id: String,
    },
}

/// The projection of a draft returned by add and list operations.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummaryResponse {
    pub session_id: String,
    pub title: String,
    pub document_identifier: String,
    #[schema(value_type = String)]
    pub status: &'static str,
    pub last_modified: DateTime<Utc>,
}

impl From<DraftSummary> for DraftSummaryResponse {
    fn from(s: DraftSummary) -> Self {
        Self {
            session_id: s.session_id,
            title: s.title.trim().to_string(),
            document_identifier: s.document_identifier,
            status: s.status.as_str(),
            last_modified: s.last_modified,
        }
    }
}

/// The full draft shape returned by get and update operations.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DraftResponse {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub document_identifier: String,
    pub sections: BTreeMap<String, String>,
    pub project_basics: BTreeMap<String, String>,
    pub questionnaire: BTreeMap<String, String>,
    #[schema(value_type = String)]
    pub status: &'static str,
    pub last_modified: DateTime<Utc>,
}

impl From<Draft> for DraftResponse {
    fn from(d: Draft) -> Self {
        Self {
            session_id: d.session_id,
            user_id: d.user_id,
            title: d.title,
            document_identifier: d.document_identifier,
            sections: d.sections,
            project_basics: d.project_basics,
            questionnaire: d.questionnaire,
            status: d.status.as_str(),
            last_modified: d.last_modified,
        }
    }
}

/// Outcome of a single-key delete.
#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub id: String,
    pub deleted: bool,
    pub message: String,
}

//=========================================================================================
// Endpoint
//=========================================================================================

/// Execute a draft-store operation.
///
/// The request body carries an `operation` discriminator selecting one of
/// the CRUD/list verbs.
#[utoipa::path(
    post,
    path = "/drafts",
    request_body = DraftOperationRequest,
    responses(
        (status = 200, description = "Operation completed"),
        (status = 400, description = "Malformed request body"),
        (status = 404, description = "No draft under the given key"),
        (status = 429, description = "Backend request limit exceeded"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn draft_operations_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DraftOperationRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::Port(PortError::InvalidInput(e.body_text())))?;

    match request {
        DraftOperationRequest::AddDraft {
            user_id,
            session_id,
            title,
            document_identifier,
            sections,
            project_basics,
            questionnaire,
            status,
        } => {
            let draft = Draft {
                user_id,
                session_id,
                title: title.unwrap_or_else(|| {
                    format!("Draft on {}", Utc::now().format("%Y-%m-%d %H:%M:%S"))
                }),
                document_identifier: document_identifier.unwrap_or_default(),
                sections,
                project_basics,
                questionnaire,
                status: status.unwrap_or(DraftStatus::ProjectBasics),
                last_modified: Utc::now(),
            };
            let summary = DraftSummary {
                session_id: draft.session_id.clone(),
                title: draft.title.clone(),
                document_identifier: draft.document_identifier.clone(),
                status: draft.status,
                last_modified: draft.last_modified,
            };
            state.drafts.put_draft(draft).await?;
            Ok(Json(DraftSummaryResponse::from(summary)).into_response())
        }

        DraftOperationRequest::GetDraft { user_id, session_id } => {
            let draft = state.drafts.get_draft(&user_id, &session_id).await?;
            Ok(Json(DraftResponse::from(draft)).into_response())
        }

        DraftOperationRequest::UpdateDraft {
            user_id,
            session_id,
            title,
            document_identifier,
            sections,
            project_basics,
            questionnaire,
            status,
        } => {
            let patch = DraftPatch {
                title,
                document_identifier,
                sections,
                project_basics,
                questionnaire,
                status,
            };
            let updated = state.drafts.update_draft(&user_id, &session_id, patch).await?;
            Ok(Json(DraftResponse::from(updated)).into_response())
        }

        DraftOperationRequest::ListDraftsByUserId {
            user_id,
            document_identifier,
        } => {
            let items = list_drafts(
                state.drafts.as_ref(),
                &user_id,
                document_identifier.as_deref(),
                DEFAULT_LIST_LIMIT,
            )
            .await?;
            Ok(Json(items).into_response())
        }

        DraftOperationRequest::ListAllDraftsByUserId {
            user_id,
            document_identifier,
        } => {
            let items = list_drafts(
                state.drafts.as_ref(),
                &user_id,
                document_identifier.as_deref(),
                MAX_LIST_LIMIT,
            )
            .await?;
            Ok(Json(items).into_response())
        }

        DraftOperationRequest::DeleteDraft { user_id, session_id } => {
            Ok(delete_draft(state.drafts.as_ref(), &user_id, &session_id).await)
        }

        DraftOperationRequest::DeleteUserDrafts { user_id } => {
            let outcomes = delete_user_drafts(state.drafts.as_ref(), &user_id).await?;
            Ok(Json(outcomes).into_response())
        }
    }
}

//=========================================================================================
// Operations
//=========================================================================================

/// Runs the accumulation loop over the last-modified index, applying the
/// optional document filter per batch, then re-sorts descending and
/// projects to the public shape.
async fn list_drafts(
    store: &dyn DraftStore,
    user_id: &str,
    document_identifier: Option<&str>,
    limit: usize,
) -> Result<Vec<DraftSummaryResponse>, ApiError> {
    let mut items = fetch_until_limit(
        limit,
        |s: &DraftSummary| {
            document_identifier.map_or(true, |doc| s.document_identifier == doc)
        },
        |after, batch_size| async move {
            store.scan_drafts(user_id, after.as_ref(), batch_size).await
        },
    )
    .await?;

    // Re-sort after accumulation; batches are index-ordered but the full
    // set is the contract.
    items.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    Ok(items.into_iter().map(DraftSummaryResponse::from).collect())
}

/// Deletes one draft, translating the result to the delete response shape.
/// A missing key yields a not-found-shaped body rather than an error.
async fn delete_draft(store: &dyn DraftStore, user_id: &str, session_id: &str) -> Response {
    match store.delete_draft(user_id, session_id).await {
        Ok(()) => Json(DeleteResponse {
            id: session_id.to_string(),
            deleted: true,
            message: "Draft deleted successfully".to_string(),
        })
        .into_response(),
        Err(PortError::NotFound(message)) => (
            StatusCode::NOT_FOUND,
            Json(DeleteResponse {
                id: session_id.to_string(),
                deleted: false,
                message,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Caught error: could not delete draft: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DeleteResponse {
                    id: session_id.to_string(),
                    deleted: false,
                    message: format!("Error occurred: {e}"),
                }),
            )
                .into_response()
        }
    }
}

/// Deletes every draft the owner has, reporting per-item success rather
/// than failing the whole batch.
async fn delete_user_drafts(
    store: &dyn DraftStore,
    user_id: &str,
) -> Result<Vec<DeletionOutcome>, ApiError> {
    let drafts = list_drafts(store, user_id, None, MAX_LIST_LIMIT).await?;

    let mut outcomes = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let deleted = match store.delete_draft(user_id, &draft.session_id).await {
            Ok(()) => true,
            Err(e) => {
                error!("Caught error: could not delete draft {}: {e}", draft.session_id);
                false
            }
        };
        outcomes.push(DeletionOutcome {
            id: draft.session_id,
            deleted,
        });
    }
    Ok(outcomes)
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use grant_assistant_core::domain::{Page, PageKey};
    use grant_assistant_core::ports::PortResult;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory draft store mirroring the adapter's keyset-scan semantics,
    /// with optional per-key delete failures for partial-batch tests.
    #[derive(Default)]
    struct MemDraftStore {
        rows: Mutex<HashMap<(String, String), Draft>>,
        failing_deletes: Mutex<Vec<String>>,
    }

    impl MemDraftStore {
        fn insert(&self, draft: Draft) {
            self.rows
                .lock()
                .unwrap()
                .insert((draft.user_id.clone(), draft.session_id.clone()), draft);
        }
    }

    #[async_trait]
    impl DraftStore for MemDraftStore {
        async fn put_draft(&self, draft: Draft) -> PortResult<()> {
            self.insert(draft);
            Ok(())
        }

        async fn get_draft(&self, user_id: &str, session_id: &str) -> PortResult<Draft> {
            self.rows
                .lock()
                .unwrap()
                .get(&(user_id.to_string(), session_id.to_string()))
                .cloned()
                .ok_or_else(|| {
                    PortError::NotFound(format!("No record found with session id: {session_id}"))
                })
        }

        async fn update_draft(
            &self,
            user_id: &str,
            session_id: &str,
            patch: DraftPatch,
        ) -> PortResult<Draft> {
            let mut rows = self.rows.lock().unwrap();
            let draft = rows
                .get_mut(&(user_id.to_string(), session_id.to_string()))
                .ok_or_else(|| {
                    PortError::NotFound(format!("No record found with session id: {session_id}"))
                })?;
            if let Some(title) = patch.title {
                draft.title = title;
            }
            if let Some(doc) = patch.document_identifier {
                draft.document_identifier = doc;
            }
            if let Some(sections) = patch.sections {
                draft.sections = sections;
            }
            if let Some(basics) = patch.project_basics {
                draft.project_basics = basics;
            }
            if let Some(questionnaire) = patch.questionnaire {
                draft.questionnaire = questionnaire;
            }
            if let Some(status) = patch.status {
                draft.status = status;
            }
            draft.last_modified = Utc::now();
            Ok(draft.clone())
        }

        async fn delete_draft(&self, user_id: &str, session_id: &str) -> PortResult<()> {
            if self
                .failing_deletes
                .lock()
                .unwrap()
                .iter()
                .any(|s| s == session_id)
            {
                return Err(PortError::Unexpected("simulated backend failure".to_string()));
            }
            self.rows
                .lock()
                .unwrap()
                .remove(&(user_id.to_string(), session_id.to_string()))
                .map(|_| ())
                .ok_or_else(|| {
                    PortError::NotFound(format!("No record found with session id: {session_id}"))
                })
        }

        async fn scan_drafts(
            &self,
            user_id: &str,
            after: Option<&PageKey>,
            batch_size: i64,
        ) -> PortResult<Page<DraftSummary>> {
            let rows = self.rows.lock().unwrap();
            let mut summaries: Vec<DraftSummary> = rows
                .values()
                .filter(|d| d.user_id == user_id)
                .map(|d| DraftSummary {
                    session_id: d.session_id.clone(),
                    title: d.title.clone(),
                    document_identifier: d.document_identifier.clone(),
                    status: d.status,
                    last_modified: d.last_modified,
                })
                .collect();
            summaries.sort_by(|a, b| {
                (b.last_modified, &b.session_id).cmp(&(a.last_modified, &a.session_id))
            });
            if let Some(key) = after {
                summaries.retain(|s| {
                    (s.last_modified, s.session_id.clone())
                        < (key.timestamp, key.session_id.clone())
                });
            }
            let total = summaries.len();
            summaries.truncate(batch_size as usize);
            let last_key = if total > summaries.len() {
                summaries.last().map(|s| PageKey {
                    timestamp: s.last_modified,
                    session_id: s.session_id.clone(),
                })
            } else {
                None
            };
            Ok(Page {
                items: summaries,
                last_key,
            })
        }
    }

    fn draft(user: &str, session: &str, doc: &str, minute: u32) -> Draft {
        Draft {
            user_id: user.to_string(),
            session_id: session.to_string(),
            title: format!("Draft {session}"),
            document_identifier: doc.to_string(),
            sections: BTreeMap::new(),
            project_basics: BTreeMap::new(),
            questionnaire: BTreeMap::new(),
            status: DraftStatus::ProjectBasics,
            last_modified: Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn add_then_get_returns_stored_fields() {
        let store = MemDraftStore::default();
        let mut sections = BTreeMap::new();
        sections.insert("Narrative".to_string(), "Our project...".to_string());
        let mut added = draft("alice", "s1", "NOFO-1", 0);
        added.sections = sections.clone();
        store.put_draft(added).await.unwrap();

        let got = store.get_draft("alice", "s1").await.unwrap();
        assert_eq!(got.title, "Draft s1");
        assert_eq!(got.document_identifier, "NOFO-1");
        assert_eq!(got.sections, sections);
    }

    #[tokio::test]
    async fn update_with_subset_leaves_other_fields_and_refreshes_timestamp() {
        let store = MemDraftStore::default();
        store.insert(draft("alice", "s1", "NOFO-1", 0));
        let before = store.get_draft("alice", "s1").await.unwrap();

        let patch = DraftPatch {
            title: Some("Updated title".to_string()),
            ..Default::default()
        };
        let updated = store.update_draft("alice", "s1", patch).await.unwrap();
        assert_eq!(updated.title, "Updated title");
        assert_eq!(updated.document_identifier, before.document_identifier);
        assert_eq!(updated.sections, before.sections);
        assert!(updated.last_modified > before.last_modified);
    }

    #[tokio::test]
    async fn listing_is_bounded_and_sorted_descending() {
        let store = MemDraftStore::default();
        for i in 0..30u32 {
            store.insert(draft("alice", &format!("s{i:02}"), "NOFO-1", i));
        }
        let items = list_drafts(&store, "alice", None, DEFAULT_LIST_LIMIT)
            .await
            .unwrap();
        assert_eq!(items.len(), DEFAULT_LIST_LIMIT);
        for pair in items.windows(2) {
            assert!(pair[0].last_modified > pair[1].last_modified);
        }
        // Newest first.
        assert_eq!(items[0].session_id, "s29");
    }

    #[tokio::test]
    async fn listing_filter_spans_multiple_batches() {
        let store = MemDraftStore::default();
        for i in 0..40u32 {
            let doc = if i % 4 == 0 { "NOFO-A" } else { "NOFO-B" };
            store.insert(draft("alice", &format!("s{i:02}"), doc, i));
        }
        let items = list_drafts(&store, "alice", Some("NOFO-A"), DEFAULT_LIST_LIMIT)
            .await
            .unwrap();
        assert_eq!(items.len(), 10);
        assert!(items.iter().all(|s| s.document_identifier == "NOFO-A"));
    }

    #[tokio::test]
    async fn listing_ignores_other_owners() {
        let store = MemDraftStore::default();
        store.insert(draft("alice", "s1", "NOFO-1", 0));
        store.insert(draft("bob", "s2", "NOFO-1", 1));
        let items = list_drafts(&store, "alice", None, DEFAULT_LIST_LIMIT)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].session_id, "s1");
    }

    #[tokio::test]
    async fn delete_missing_draft_is_not_found_shaped() {
        let store = MemDraftStore::default();
        let response = delete_draft(&store, "alice", "missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_all_reports_per_item_outcomes() {
        let store = MemDraftStore::default();
        store.insert(draft("alice", "s1", "NOFO-1", 0));
        store.insert(draft("alice", "s2", "NOFO-1", 1));
        store.insert(draft("alice", "s3", "NOFO-1", 2));
        store
            .failing_deletes
            .lock()
            .unwrap()
            .push("s2".to_string());

        let mut outcomes = delete_user_drafts(&store, "alice").await.unwrap();
        outcomes.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(
            outcomes,
            vec![
                DeletionOutcome { id: "s1".to_string(), deleted: true },
                DeletionOutcome { id: "s2".to_string(), deleted: false },
                DeletionOutcome { id: "s3".to_string(), deleted: true },
            ]
        );
    }
}
