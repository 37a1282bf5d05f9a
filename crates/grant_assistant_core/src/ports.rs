//! crates/grant_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the platform's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases,
//! object stores, or the retrieval backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    ChatEntry, ChatSession, Draft, DraftPatch, DraftSummary, FeedbackEntry, FeedbackPage,
    FeedbackQuery, IngestionJobStatus, IngestionJobSummary, Page, PageKey, SessionSummary,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network)
/// into the taxonomy the transport layer translates to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Caller is not authenticated")]
    Unauthorized,
    #[error("Caller is not allowed to perform this action")]
    Forbidden,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Backend request limit exceeded")]
    Throttled,
    #[error("Operation conflicts with backend state: {0}")]
    Conflict(String),
    #[error("Upstream storage failure: {0}")]
    Gateway(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Storage contract for application drafts.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Creates the draft, or replaces it wholesale if the key already exists.
    async fn put_draft(&self, draft: Draft) -> PortResult<()>;

    async fn get_draft(&self, user_id: &str, session_id: &str) -> PortResult<Draft>;

    /// Applies a partial mutation and returns the full updated row.
    /// `last_modified` is refreshed regardless of which fields are present.
    async fn update_draft(
        &self,
        user_id: &str,
        session_id: &str,
        patch: DraftPatch,
    ) -> PortResult<Draft>;

    /// Fails with `PortError::NotFound` when no such row exists.
    async fn delete_draft(&self, user_id: &str, session_id: &str) -> PortResult<()>;

    /// Fetches one index-ordered batch of summaries for the owner, newest
    /// first, resuming after `after` when present. The batch is unfiltered;
    /// callers apply any document filter and drive the accumulation loop.
    async fn scan_drafts(
        &self,
        user_id: &str,
        after: Option<&PageKey>,
        batch_size: i64,
    ) -> PortResult<Page<DraftSummary>>;
}

/// Storage contract for chat sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put_session(&self, session: ChatSession) -> PortResult<()>;

    async fn get_session(&self, user_id: &str, session_id: &str) -> PortResult<ChatSession>;

    /// Appends entries to the existing history and returns the updated
    /// history. Full replacement is intentionally not part of the contract.
    async fn append_chat_entries(
        &self,
        user_id: &str,
        session_id: &str,
        entries: Vec<ChatEntry>,
    ) -> PortResult<Vec<ChatEntry>>;

    /// Fails with `PortError::NotFound` when no such row exists.
    async fn delete_session(&self, user_id: &str, session_id: &str) -> PortResult<()>;

    async fn scan_sessions(
        &self,
        user_id: &str,
        after: Option<&PageKey>,
        batch_size: i64,
    ) -> PortResult<Page<SessionSummary>>;
}

/// Storage contract for user feedback.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn put_feedback(&self, entry: FeedbackEntry) -> PortResult<()>;

    /// Time-range query, newest first, limited to `query.limit` rows.
    async fn query_feedback(&self, query: &FeedbackQuery) -> PortResult<FeedbackPage>;

    async fn delete_feedback(&self, topic: &str, created_at: DateTime<Utc>) -> PortResult<()>;
}

/// Contract for the object-storage backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> PortResult<Vec<u8>>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> PortResult<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> PortResult<()>;

    /// Issues a time-limited, credential-free download URL for the object.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in_secs: u64)
        -> PortResult<String>;
}

/// Contract for the managed retrieval-index ingestion API.
#[async_trait]
pub trait KnowledgeIngestion: Send + Sync {
    /// Lists jobs for the data source currently in the given status.
    async fn list_jobs(
        &self,
        data_source_id: &str,
        status: IngestionJobStatus,
    ) -> PortResult<Vec<IngestionJobSummary>>;

    /// Starts an ingestion run. The backend rejects concurrent runs for the
    /// same data source with `PortError::Conflict`.
    async fn start_job(&self, data_source_id: &str) -> PortResult<()>;
}

/// Contract for rendering an HTML document to PDF bytes.
///
/// Implemented both by the per-request headless-browser renderer and by the
/// pure-software converter used for storage-event conversion.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render_pdf(&self, html: &str) -> PortResult<Vec<u8>>;
}

/// Administrative contract for the managed search cluster.
#[async_trait]
pub trait SearchIndexAdmin: Send + Sync {
    /// Submits the vector index schema. Returns `false` when the index was
    /// already present (treated as success by callers).
    async fn create_index(&self) -> PortResult<bool>;

    async fn index_exists(&self) -> PortResult<bool>;
}
