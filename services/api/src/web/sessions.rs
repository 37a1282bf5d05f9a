//! services/api/src/web/sessions.rs
//!
//! Contains the Axum handler for the chat-session store. Same
//! operation-tagged endpoint shape as the draft store; the one behavioral
//! difference is that session updates are append-only chat-history
//! mutations.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::drafts::DeleteResponse;
use crate::web::listing::fetch_until_limit;
use crate::web::state::AppState;
use grant_assistant_core::domain::{ChatEntry, ChatSession, DeletionOutcome, SessionSummary};
use grant_assistant_core::ports::{PortError, SessionStore};

use crate::web::drafts::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};

//=========================================================================================
// Request and Response Types
//=========================================================================================

/// The operations the session endpoint accepts, selected by the
/// `operation` field of the request body.
#[derive(Deserialize, ToSchema)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum SessionOperationRequest {
    AddSession {
        user_id: String,
        session_id: String,
        title: Option<String>,
        document_identifier: Option<String>,
        #[schema(value_type = Option<Vec<Object>>)]
        chat_history: Option<Vec<ChatEntry>>,
        #[schema(value_type = Option<Vec<Object>>)]
        new_chat_entry: Option<Vec<ChatEntry>>,
    },
    GetSession {
        user_id: String,
        session_id: String,
    },
    UpdateSession {
        user_id: String,
        session_id: String,
        #[schema(value_type = Vec<Object>)]
        new_chat_entry: Vec<ChatEntry>,
    },
    ListSessionsByUserId {
        user_id: String,
        document_identifier: Option<String>,
    },
    ListAllSessionsByUserId {
        user_id: String,
        document_identifier: Option<String>,
    },
    DeleteSession {
        user_id: String,
        session_id: String,
    },
    DeleteUserSessions {
        user_id: String,
    },
}

/// The projection of a session returned by listing operations.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummaryResponse {
    pub session_id: String,
    pub title: String,
    pub document_identifier: String,
    pub time_stamp: DateTime<Utc>,
}

impl From<SessionSummary> for SessionSummaryResponse {
    fn from(s: SessionSummary) -> Self {
        Self {
            session_id: s.session_id,
            title: s.title.trim().to_string(),
            document_identifier: s.document_identifier,
            time_stamp: s.time_stamp,
        }
    }
}

/// The full session shape returned by get operations.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub document_identifier: String,
    #[schema(value_type = Vec<Object>)]
    pub chat_history: Vec<ChatEntry>,
    pub time_stamp: DateTime<Utc>,
}

impl From<ChatSession> for SessionResponse {
    fn from(s: ChatSession) -> Self {
        Self {
            session_id: s.session_id,
            user_id: s.user_id,
            title: s.title,
            document_identifier: s.document_identifier,
            chat_history: s.chat_history,
            time_stamp: s.time_stamp,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedHistoryResponse {
    pub session_id: String,
    #[schema(value_type = Vec<Object>)]
    pub chat_history: Vec<ChatEntry>,
}

//=========================================================================================
// Endpoint
//=========================================================================================

/// Execute a session-store operation.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = SessionOperationRequest,
    responses(
        (status = 200, description = "Operation completed"),
        (status = 400, description = "Malformed request body"),
        (status = 404, description = "No session under the given key"),
        (status = 429, description = "Backend request limit exceeded"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn session_operations_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SessionOperationRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::Port(PortError::InvalidInput(e.body_text())))?;

    match request {
        SessionOperationRequest::AddSession {
            user_id,
            session_id,
            title,
            document_identifier,
            chat_history,
            new_chat_entry,
        } => {
            // A fresh session starts from the new entry when one is given,
            // otherwise from the supplied history.
            let chat_history = new_chat_entry.or(chat_history).unwrap_or_default();
            let session = ChatSession {
                user_id,
                session_id,
                title: title.unwrap_or_else(|| {
                    format!("Chat on {}", Utc::now().format("%Y-%m-%d %H:%M:%S"))
                }),
                document_identifier: document_identifier.unwrap_or_default(),
                chat_history,
                time_stamp: Utc::now(),
            };
            state.sessions.put_session(session).await?;
            Ok(Json(serde_json::json!({ "message": "Session created successfully" }))
                .into_response())
        }

        SessionOperationRequest::GetSession { user_id, session_id } => {
            let session = state.sessions.get_session(&user_id, &session_id).await?;
            Ok(Json(SessionResponse::from(session)).into_response())
        }

        SessionOperationRequest::UpdateSession {
            user_id,
            session_id,
            new_chat_entry,
        } => {
            let chat_history = state
                .sessions
                .append_chat_entries(&user_id, &session_id, new_chat_entry)
                .await?;
            Ok(Json(UpdatedHistoryResponse {
                session_id,
                chat_history,
            })
            .into_response())
        }

        SessionOperationRequest::ListSessionsByUserId {
            user_id,
            document_identifier,
        } => {
            let items = list_sessions(
                state.sessions.as_ref(),
                &user_id,
                document_identifier.as_deref(),
                DEFAULT_LIST_LIMIT,
            )
            .await?;
            Ok(Json(items).into_response())
        }

        SessionOperationRequest::ListAllSessionsByUserId {
            user_id,
            document_identifier,
        } => {
            let items = list_sessions(
                state.sessions.as_ref(),
                &user_id,
                document_identifier.as_deref(),
                MAX_LIST_LIMIT,
            )
            .await?;
            Ok(Json(items).into_response())
        }

        SessionOperationRequest::DeleteSession { user_id, session_id } => {
            Ok(delete_session(state.sessions.as_ref(), &user_id, &session_id).await)
        }

        SessionOperationRequest::DeleteUserSessions { user_id } => {
            let outcomes = delete_user_sessions(state.sessions.as_ref(), &user_id).await?;
            Ok(Json(outcomes).into_response())
        }
    }
}

//=========================================================================================
// Operations
//=========================================================================================

/// Same accumulation loop as draft listing, over the session time index.
async fn list_sessions(
    store: &dyn SessionStore,
    user_id: &str,
    document_identifier: Option<&str>,
    limit: usize,
) -> Result<Vec<SessionSummaryResponse>, ApiError> {
    let mut items = fetch_until_limit(
        limit,
        |s: &SessionSummary| {
            document_identifier.map_or(true, |doc| s.document_identifier == doc)
        },
        |after, batch_size| async move {
            store.scan_sessions(user_id, after.as_ref(), batch_size).await
        },
    )
    .await?;

    items.sort_by(|a, b| b.time_stamp.cmp(&a.time_stamp));
    Ok(items.into_iter().map(SessionSummaryResponse::from).collect())
}

async fn delete_session(store: &dyn SessionStore, user_id: &str, session_id: &str) -> Response {
    match store.delete_session(user_id, session_id).await {
        Ok(()) => Json(DeleteResponse {
            id: session_id.to_string(),
            deleted: true,
            message: "Session deleted successfully".to_string(),
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
            error!("Caught error: could not delete session: {e}");
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

async fn delete_user_sessions(
    store: &dyn SessionStore,
    user_id: &str,
) -> Result<Vec<DeletionOutcome>, ApiError> {
    let sessions = list_sessions(store, user_id, None, MAX_LIST_LIMIT).await?;

    let mut outcomes = Vec::with_capacity(sessions.len());
    for session in sessions {
        let deleted = match store.delete_session(user_id, &session.session_id).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Caught error: could not delete session {}: {e}",
                    session.session_id
                );
                false
            }
        };
        outcomes.push(DeletionOutcome {
            id: session.session_id,
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

    #[derive(Default)]
    struct MemSessionStore {
        rows: Mutex<HashMap<(String, String), ChatSession>>,
    }

    #[async_trait]
    impl SessionStore for MemSessionStore {
        async fn put_session(&self, session: ChatSession) -> PortResult<()> {
            self.rows
                .lock()
                .unwrap()
                .insert((session.user_id.clone(), session.session_id.clone()), session);
            Ok(())
        }

        async fn get_session(&self, user_id: &str, session_id: &str) -> PortResult<ChatSession> {
            self.rows
                .lock()
                .unwrap()
                .get(&(user_id.to_string(), session_id.to_string()))
                .cloned()
                .ok_or_else(|| {
                    PortError::NotFound(format!("No record found with session id: {session_id}"))
                })
        }

        async fn append_chat_entries(
            &self,
            user_id: &str,
            session_id: &str,
            entries: Vec<ChatEntry>,
        ) -> PortResult<Vec<ChatEntry>> {
            let mut rows = self.rows.lock().unwrap();
            let session = rows
                .get_mut(&(user_id.to_string(), session_id.to_string()))
                .ok_or_else(|| {
                    PortError::NotFound(format!("No record found with session id: {session_id}"))
                })?;
            session.chat_history.extend(entries);
            Ok(session.chat_history.clone())
        }

        async fn delete_session(&self, user_id: &str, session_id: &str) -> PortResult<()> {
            self.rows
                .lock()
                .unwrap()
                .remove(&(user_id.to_string(), session_id.to_string()))
                .map(|_| ())
                .ok_or_else(|| {
                    PortError::NotFound(format!("No record found with session id: {session_id}"))
                })
        }

        async fn scan_sessions(
            &self,
            user_id: &str,
            after: Option<&PageKey>,
            batch_size: i64,
        ) -> PortResult<Page<SessionSummary>> {
            let rows = self.rows.lock().unwrap();
            let mut summaries: Vec<SessionSummary> = rows
                .values()
                .filter(|s| s.user_id == user_id)
                .map(|s| SessionSummary {
                    session_id: s.session_id.clone(),
                    title: s.title.clone(),
                    document_identifier: s.document_identifier.clone(),
                    time_stamp: s.time_stamp,
                })
                .collect();
            summaries.sort_by(|a, b| {
                (b.time_stamp, &b.session_id).cmp(&(a.time_stamp, &a.session_id))
            });
            if let Some(key) = after {
                summaries.retain(|s| {
                    (s.time_stamp, s.session_id.clone())
                        < (key.timestamp, key.session_id.clone())
                });
            }
            let total = summaries.len();
            summaries.truncate(batch_size as usize);
            let last_key = if total > summaries.len() {
                summaries.last().map(|s| PageKey {
                    timestamp: s.time_stamp,
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

    fn entry(role: &str, content: &str) -> ChatEntry {
        ChatEntry {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: "2026-03-01T10:00:00Z".to_string(),
        }
    }

    fn session(user: &str, id: &str, minute: u32) -> ChatSession {
        ChatSession {
            user_id: user.to_string(),
            session_id: id.to_string(),
            title: format!("Chat {id}"),
            document_identifier: "NOFO-1".to_string(),
            chat_history: vec![entry("user", "hello")],
            time_stamp: Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn updates_append_rather_than_replace() {
        let store = MemSessionStore::default();
        store.put_session(session("alice", "s1", 0)).await.unwrap();

        let updated = store
            .append_chat_entries(
                "alice",
                "s1",
                vec![entry("assistant", "hi"), entry("user", "thanks")],
            )
            .await
            .unwrap();

        assert_eq!(updated.len(), 3);
        assert_eq!(updated[0].content, "hello");
        assert_eq!(updated[2].content, "thanks");
    }

    #[tokio::test]
    async fn append_to_missing_session_is_not_found() {
        let store = MemSessionStore::default();
        let err = store
            .append_chat_entries("alice", "missing", vec![entry("user", "hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn listing_projects_and_sorts_newest_first() {
        let store = MemSessionStore::default();
        for i in 0..20u32 {
            store
                .put_session(session("alice", &format!("s{i:02}"), i))
                .await
                .unwrap();
        }
        let items = list_sessions(&store, "alice", None, DEFAULT_LIST_LIMIT)
            .await
            .unwrap();
        assert_eq!(items.len(), DEFAULT_LIST_LIMIT);
        assert_eq!(items[0].session_id, "s19");
        for pair in items.windows(2) {
            assert!(pair[0].time_stamp > pair[1].time_stamp);
        }
    }

    #[tokio::test]
    async fn delete_missing_session_is_not_found_shaped() {
        let store = MemSessionStore::default();
        let response = delete_session(&store, "alice", "missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
