//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DraftStore`, `SessionStore`, and `FeedbackStore` ports from the `core`
//! crate. It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grant_assistant_core::domain::{
    ChatEntry, ChatSession, Draft, DraftPatch, DraftStatus, DraftSummary, FeedbackEntry,
    FeedbackPage, FeedbackPageKey, FeedbackQuery, Page, PageKey, SessionSummary,
};
use grant_assistant_core::ports::{
    DraftStore, FeedbackStore, PortError, PortResult, SessionStore,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps sqlx failures onto the port taxonomy. SQLSTATE class 22/42 is a
/// malformed query (400), resource-exhaustion states and pool timeouts map
/// to throttling (429), everything else is unexpected (500).
fn map_db_err(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound("Row not found".to_string()),
        sqlx::Error::PoolTimedOut => PortError::Throttled,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(code) if code.starts_with("53") => PortError::Throttled,
            Some(code) if code.starts_with("22") || code.starts_with("42") => {
                PortError::InvalidInput(db.message().to_string())
            }
            _ => PortError::Unexpected(e.to_string()),
        },
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn not_found_session(session_id: &str) -> PortError {
    PortError::NotFound(format!("No record found with session id: {}", session_id))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DraftRecord {
    user_id: String,
    session_id: String,
    title: String,
    document_identifier: String,
    sections: Json<BTreeMap<String, String>>,
    project_basics: Json<BTreeMap<String, String>>,
    questionnaire: Json<BTreeMap<String, String>>,
    status: String,
    last_modified: DateTime<Utc>,
}
impl DraftRecord {
    fn to_domain(self) -> Draft {
        Draft {
            user_id: self.user_id,
            session_id: self.session_id,
            title: self.title,
            document_identifier: self.document_identifier,
            sections: self.sections.0,
            project_basics: self.project_basics.0,
            questionnaire: self.questionnaire.0,
            status: DraftStatus::parse(&self.status).unwrap_or(DraftStatus::ProjectBasics),
            last_modified: self.last_modified,
        }
    }
}

#[derive(FromRow)]
struct DraftSummaryRecord {
    session_id: String,
    title: String,
    document_identifier: String,
    status: String,
    last_modified: DateTime<Utc>,
}
impl DraftSummaryRecord {
    fn to_domain(self) -> DraftSummary {
        DraftSummary {
            session_id: self.session_id,
            title: self.title,
            document_identifier: self.document_identifier,
            status: DraftStatus::parse(&self.status).unwrap_or(DraftStatus::ProjectBasics),
            last_modified: self.last_modified,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    user_id: String,
    session_id: String,
    title: String,
    document_identifier: String,
    chat_history: Json<Vec<ChatEntry>>,
    time_stamp: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> ChatSession {
        ChatSession {
            user_id: self.user_id,
            session_id: self.session_id,
            title: self.title,
            document_identifier: self.document_identifier,
            chat_history: self.chat_history.0,
            time_stamp: self.time_stamp,
        }
    }
}

#[derive(FromRow)]
struct SessionSummaryRecord {
    session_id: String,
    title: String,
    document_identifier: String,
    time_stamp: DateTime<Utc>,
}
impl SessionSummaryRecord {
    fn to_domain(self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            title: self.title,
            document_identifier: self.document_identifier,
            time_stamp: self.time_stamp,
        }
    }
}

#[derive(FromRow)]
struct FeedbackRecord {
    feedback_id: Uuid,
    session_id: String,
    user_prompt: String,
    chatbot_message: String,
    comment: String,
    topic: String,
    problem: String,
    feedback: i16,
    sources: Json<Vec<String>>,
    created_at: DateTime<Utc>,
}
impl FeedbackRecord {
    fn to_domain(self) -> FeedbackEntry {
        FeedbackEntry {
            feedback_id: self.feedback_id,
            session_id: self.session_id,
            prompt: self.user_prompt,
            completion: self.chatbot_message,
            comment: self.comment,
            topic: self.topic,
            problem: self.problem,
            feedback: self.feedback,
            sources: self.sources.0,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `DraftStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DraftStore for DbAdapter {
    async fn put_draft(&self, draft: Draft) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO drafts \
                 (user_id, session_id, title, document_identifier, sections, \
                  project_basics, questionnaire, status, last_modified) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (user_id, session_id) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 document_identifier = EXCLUDED.document_identifier, \
                 sections = EXCLUDED.sections, \
                 project_basics = EXCLUDED.project_basics, \
                 questionnaire = EXCLUDED.questionnaire, \
                 status = EXCLUDED.status, \
                 last_modified = EXCLUDED.last_modified",
        )
        .bind(&draft.user_id)
        .bind(&draft.session_id)
        .bind(draft.title.trim())
        .bind(&draft.document_identifier)
        .bind(Json(&draft.sections))
        .bind(Json(&draft.project_basics))
        .bind(Json(&draft.questionnaire))
        .bind(draft.status.as_str())
        .bind(draft.last_modified)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn get_draft(&self, user_id: &str, session_id: &str) -> PortResult<Draft> {
        let record = sqlx::query_as::<_, DraftRecord>(
            "SELECT user_id, session_id, title, document_identifier, sections, \
                    project_basics, questionnaire, status, last_modified \
             FROM drafts WHERE user_id = $1 AND session_id = $2",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => not_found_session(session_id),
            other => map_db_err(other),
        })?;
        Ok(record.to_domain())
    }

    async fn update_draft(
        &self,
        user_id: &str,
        session_id: &str,
        patch: DraftPatch,
    ) -> PortResult<Draft> {
        // Only the supplied fields are merged; last_modified is refreshed
        // unconditionally.
        let record = sqlx::query_as::<_, DraftRecord>(
            "UPDATE drafts SET \
                 title = COALESCE($3, title), \
                 document_identifier = COALESCE($4, document_identifier), \
                 sections = COALESCE($5, sections), \
                 project_basics = COALESCE($6, project_basics), \
                 questionnaire = COALESCE($7, questionnaire), \
                 status = COALESCE($8, status), \
                 last_modified = $9 \
             WHERE user_id = $1 AND session_id = $2 \
             RETURNING user_id, session_id, title, document_identifier, sections, \
                       project_basics, questionnaire, status, last_modified",
        )
        .bind(user_id)
        .bind(session_id)
        .bind(patch.title.as_deref().map(str::trim))
        .bind(patch.document_identifier)
        .bind(patch.sections.map(Json))
        .bind(patch.project_basics.map(Json))
        .bind(patch.questionnaire.map(Json))
        .bind(patch.status.map(|s| s.as_str()))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => not_found_session(session_id),
            other => map_db_err(other),
        })?;
        Ok(record.to_domain())
    }

    async fn delete_draft(&self, user_id: &str, session_id: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM drafts WHERE user_id = $1 AND session_id = $2")
            .bind(user_id)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found_session(session_id));
        }
        Ok(())
    }

    async fn scan_drafts(
        &self,
        user_id: &str,
        after: Option<&PageKey>,
        batch_size: i64,
    ) -> PortResult<Page<DraftSummary>> {
        let records = sqlx::query_as::<_, DraftSummaryRecord>(
            "SELECT session_id, title, document_identifier, status, last_modified \
             FROM drafts \
             WHERE user_id = $1 \
               AND ($2::timestamptz IS NULL OR (last_modified, session_id) < ($2, $3)) \
             ORDER BY last_modified DESC, session_id DESC \
             LIMIT $4",
        )
        .bind(user_id)
        .bind(after.map(|k| k.timestamp))
        .bind(after.map(|k| k.session_id.clone()))
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let exhausted = (records.len() as i64) < batch_size;
        let items: Vec<DraftSummary> = records.into_iter().map(|r| r.to_domain()).collect();
        let last_key = if exhausted {
            None
        } else {
            items.last().map(|s| PageKey {
                timestamp: s.last_modified,
                session_id: s.session_id.clone(),
            })
        };
        Ok(Page { items, last_key })
    }
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for DbAdapter {
    async fn put_session(&self, session: ChatSession) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_sessions \
                 (user_id, session_id, title, document_identifier, chat_history, time_stamp) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, session_id) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 document_identifier = EXCLUDED.document_identifier, \
                 chat_history = EXCLUDED.chat_history, \
                 time_stamp = EXCLUDED.time_stamp",
        )
        .bind(&session.user_id)
        .bind(&session.session_id)
        .bind(session.title.trim())
        .bind(&session.document_identifier)
        .bind(Json(&session.chat_history))
        .bind(session.time_stamp)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn get_session(&self, user_id: &str, session_id: &str) -> PortResult<ChatSession> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT user_id, session_id, title, document_identifier, chat_history, time_stamp \
             FROM chat_sessions WHERE user_id = $1 AND session_id = $2",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => not_found_session(session_id),
            other => map_db_err(other),
        })?;
        Ok(record.to_domain())
    }

    async fn append_chat_entries(
        &self,
        user_id: &str,
        session_id: &str,
        entries: Vec<ChatEntry>,
    ) -> PortResult<Vec<ChatEntry>> {
        // jsonb || concatenates arrays, so the append happens in one
        // statement instead of a read-modify-write.
        let row = sqlx::query_as::<_, (Json<Vec<ChatEntry>>,)>(
            "UPDATE chat_sessions \
             SET chat_history = chat_history || $3::jsonb \
             WHERE user_id = $1 AND session_id = $2 \
             RETURNING chat_history",
        )
        .bind(user_id)
        .bind(session_id)
        .bind(Json(&entries))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => not_found_session(session_id),
            other => map_db_err(other),
        })?;
        Ok(row.0 .0)
    }

    async fn delete_session(&self, user_id: &str, session_id: &str) -> PortResult<()> {
        let result =
            sqlx::query("DELETE FROM chat_sessions WHERE user_id = $1 AND session_id = $2")
                .bind(user_id)
                .bind(session_id)
                .execute(&self.pool)
                .await
                .map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found_session(session_id));
        }
        Ok(())
    }

    async fn scan_sessions(
        &self,
        user_id: &str,
        after: Option<&PageKey>,
        batch_size: i64,
    ) -> PortResult<Page<SessionSummary>> {
        let records = sqlx::query_as::<_, SessionSummaryRecord>(
            "SELECT session_id, title, document_identifier, time_stamp \
             FROM chat_sessions \
             WHERE user_id = $1 \
               AND ($2::timestamptz IS NULL OR (time_stamp, session_id) < ($2, $3)) \
             ORDER BY time_stamp DESC, session_id DESC \
             LIMIT $4",
        )
        .bind(user_id)
        .bind(after.map(|k| k.timestamp))
        .bind(after.map(|k| k.session_id.clone()))
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let exhausted = (records.len() as i64) < batch_size;
        let items: Vec<SessionSummary> = records.into_iter().map(|r| r.to_domain()).collect();
        let last_key = if exhausted {
            None
        } else {
            items.last().map(|s| PageKey {
                timestamp: s.time_stamp,
                session_id: s.session_id.clone(),
            })
        };
        Ok(Page { items, last_key })
    }
}

//=========================================================================================
// `FeedbackStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl FeedbackStore for DbAdapter {
    async fn put_feedback(&self, entry: FeedbackEntry) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO feedback \
                 (feedback_id, session_id, user_prompt, chatbot_message, comment, \
                  topic, problem, feedback, sources, created_at, any_topic) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'YES')",
        )
        .bind(entry.feedback_id)
        .bind(&entry.session_id)
        .bind(&entry.prompt)
        .bind(&entry.completion)
        .bind(&entry.comment)
        .bind(&entry.topic)
        .bind(&entry.problem)
        .bind(entry.feedback)
        .bind(Json(&entry.sources))
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn query_feedback(&self, query: &FeedbackQuery) -> PortResult<FeedbackPage> {
        // Topic-scoped queries use the (topic, created_at) index; the
        // "any" path rides the (any_topic, created_at) index instead.
        let sql = if query.topic.is_some() {
            "SELECT feedback_id, session_id, user_prompt, chatbot_message, comment, \
                    topic, problem, feedback, sources, created_at \
             FROM feedback \
             WHERE topic = $3 AND created_at BETWEEN $1 AND $2 \
               AND ($4::timestamptz IS NULL OR (created_at, feedback_id) < ($4, $5)) \
             ORDER BY created_at DESC, feedback_id DESC \
             LIMIT $6"
        } else {
            "SELECT feedback_id, session_id, user_prompt, chatbot_message, comment, \
                    topic, problem, feedback, sources, created_at \
             FROM feedback \
             WHERE any_topic = 'YES' AND created_at BETWEEN $1 AND $2 \
               AND ($4::timestamptz IS NULL OR (created_at, feedback_id) < ($4, $5)) \
             ORDER BY created_at DESC, feedback_id DESC \
             LIMIT $6"
        };

        let records = sqlx::query_as::<_, FeedbackRecord>(sql)
            .bind(query.start_time)
            .bind(query.end_time)
            .bind(query.topic.as_deref().unwrap_or("any"))
            .bind(query.after.as_ref().map(|k| k.created_at))
            .bind(query.after.as_ref().map(|k| k.feedback_id))
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        let exhausted = (records.len() as i64) < query.limit;
        let items: Vec<FeedbackEntry> = records.into_iter().map(|r| r.to_domain()).collect();
        let next_key = if exhausted {
            None
        } else {
            items.last().map(|e| FeedbackPageKey {
                created_at: e.created_at,
                feedback_id: e.feedback_id,
            })
        };
        Ok(FeedbackPage { items, next_key })
    }

    async fn delete_feedback(&self, topic: &str, created_at: DateTime<Utc>) -> PortResult<()> {
        // Keyed by (topic, created_at); deleting an absent row is a no-op,
        // matching the backend's delete semantics.
        sqlx::query("DELETE FROM feedback WHERE topic = $1 AND created_at = $2")
            .bind(topic)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }
}
