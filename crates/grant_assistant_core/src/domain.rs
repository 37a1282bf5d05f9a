//! crates/grant_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the platform.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Sentinel topic stored when positive feedback arrives without one.
pub const DEFAULT_FEEDBACK_TOPIC: &str = "N/A (Good Response)";

/// The editing stage a draft is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    ProjectBasics,
    Questionnaire,
    EditingSections,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::ProjectBasics => "project_basics",
            DraftStatus::Questionnaire => "questionnaire",
            DraftStatus::EditingSections => "editing_sections",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project_basics" => Some(DraftStatus::ProjectBasics),
            "questionnaire" => Some(DraftStatus::Questionnaire),
            "editing_sections" => Some(DraftStatus::EditingSections),
            _ => None,
        }
    }
}

/// A saved, editable grant-application document in progress.
///
/// Uniquely keyed by `(user_id, session_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub user_id: String,
    pub session_id: String,
    pub title: String,
    pub document_identifier: String,
    pub sections: BTreeMap<String, String>,
    pub project_basics: BTreeMap<String, String>,
    pub questionnaire: BTreeMap<String, String>,
    pub status: DraftStatus,
    pub last_modified: DateTime<Utc>,
}

/// A partial draft mutation. Only fields that are `Some` are written;
/// `last_modified` is always refreshed by the store.
#[derive(Debug, Clone, Default)]
pub struct DraftPatch {
    pub title: Option<String>,
    pub document_identifier: Option<String>,
    pub sections: Option<BTreeMap<String, String>>,
    pub project_basics: Option<BTreeMap<String, String>>,
    pub questionnaire: Option<BTreeMap<String, String>>,
    pub status: Option<DraftStatus>,
}

/// The projection of a draft returned by listing operations.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSummary {
    pub session_id: String,
    pub title: String,
    pub document_identifier: String,
    pub status: DraftStatus,
    pub last_modified: DateTime<Utc>,
}

/// A single entry in a session's chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

/// A saved chat conversation, keyed by `(user_id, session_id)`.
///
/// `chat_history` is append-only: updates concatenate new entries, full
/// replacement is not supported.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    pub user_id: String,
    pub session_id: String,
    pub title: String,
    pub document_identifier: String,
    pub chat_history: Vec<ChatEntry>,
    pub time_stamp: DateTime<Utc>,
}

/// The projection of a session returned by listing operations.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub title: String,
    pub document_identifier: String,
    pub time_stamp: DateTime<Utc>,
}

/// A captured piece of user feedback. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackEntry {
    pub feedback_id: Uuid,
    pub session_id: String,
    pub prompt: String,
    pub completion: String,
    pub comment: String,
    pub topic: String,
    pub problem: String,
    /// 1 for positive, 0 for negative.
    pub feedback: i16,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// The last-seen key of a listing scan, used to resume index queries.
/// `timestamp` is the index sort key: last-modified for drafts, creation
/// time for sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageKey {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// One batch of index-ordered results plus the key to continue from.
/// `last_key` is `None` once the index is exhausted.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub last_key: Option<PageKey>,
}

/// The last-seen key of a feedback query, round-tripped to clients as an
/// opaque continuation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPageKey {
    pub created_at: DateTime<Utc>,
    pub feedback_id: Uuid,
}

/// Parameters of a time-range feedback query.
#[derive(Debug, Clone)]
pub struct FeedbackQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `None` queries across all topics via the any-topic index.
    pub topic: Option<String>,
    pub after: Option<FeedbackPageKey>,
    pub limit: i64,
}

/// One page of feedback entries.
#[derive(Debug, Clone)]
pub struct FeedbackPage {
    pub items: Vec<FeedbackEntry>,
    pub next_key: Option<FeedbackPageKey>,
}

/// Per-item result of a delete-all-for-owner batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletionOutcome {
    pub id: String,
    pub deleted: bool,
}

/// Lifecycle state of an asynchronous ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionJobStatus {
    Starting,
    InProgress,
    Complete,
    Failed,
}

impl IngestionJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionJobStatus::Starting => "STARTING",
            IngestionJobStatus::InProgress => "IN_PROGRESS",
            IngestionJobStatus::Complete => "COMPLETE",
            IngestionJobStatus::Failed => "FAILED",
        }
    }
}

/// Summary of an ingestion job as reported by the retrieval backend.
#[derive(Debug, Clone)]
pub struct IngestionJobSummary {
    pub job_id: String,
    pub status: IngestionJobStatus,
    pub updated_at: DateTime<Utc>,
}
