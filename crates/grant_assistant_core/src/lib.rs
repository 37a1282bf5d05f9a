pub mod domain;
pub mod ports;

pub use domain::{
    ChatEntry, ChatSession, DeletionOutcome, Draft, DraftPatch, DraftStatus, DraftSummary,
    FeedbackEntry, FeedbackPage, FeedbackPageKey, FeedbackQuery, IngestionJobStatus,
    IngestionJobSummary, Page, PageKey, SessionSummary,
};
pub use ports::{
    DraftStore, FeedbackStore, KnowledgeIngestion, ObjectStore, PdfRenderer, PortError,
    PortResult, SearchIndexAdmin, SessionStore,
};
