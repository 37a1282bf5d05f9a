//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::sync::SyncService;
use grant_assistant_core::ports::{
    DraftStore, FeedbackStore, ObjectStore, PdfRenderer, SessionStore,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// Backend clients are constructed explicitly at startup and injected here,
/// so every handler can be exercised against substitute implementations.
#[derive(Clone)]
pub struct AppState {
    pub drafts: Arc<dyn DraftStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub feedback: Arc<dyn FeedbackStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub sync: Arc<SyncService>,
    /// Per-request headless-browser renderer for draft PDFs.
    pub browser_renderer: Arc<dyn PdfRenderer>,
    /// Pure-software converter for storage-event HTML conversion.
    pub converter: Arc<dyn PdfRenderer>,
    pub config: Arc<Config>,
}
