pub mod auth;
pub mod documents;
pub mod drafts;
pub mod feedback;
pub mod listing;
pub mod pdf;
pub mod sessions;
pub mod state;
pub mod storage_events;
pub mod sync;

// Re-export the handlers the server binary wires into the router.
pub use auth::attach_claims;
pub use documents::{admin_delete_object_handler, delete_document_handler};
pub use drafts::draft_operations_handler;
pub use feedback::{
    delete_feedback_handler, download_feedback_handler, get_feedback_handler,
    post_feedback_handler,
};
pub use pdf::generate_pdf_handler;
pub use sessions::session_operations_handler;
pub use storage_events::storage_events_handler;
pub use sync::{kb_http_handler, trigger_sync_handler};

use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        drafts::draft_operations_handler,
        sessions::session_operations_handler,
        feedback::post_feedback_handler,
        feedback::get_feedback_handler,
        feedback::delete_feedback_handler,
        feedback::download_feedback_handler,
        documents::delete_document_handler,
        documents::admin_delete_object_handler,
        sync::trigger_sync_handler,
        pdf::generate_pdf_handler,
        storage_events::storage_events_handler,
    ),
    components(
        schemas(
            drafts::DraftOperationRequest,
            drafts::DraftSummaryResponse,
            drafts::DraftResponse,
            drafts::DeleteResponse,
            sessions::SessionOperationRequest,
            sessions::SessionSummaryResponse,
            sessions::SessionResponse,
            feedback::PostFeedbackRequest,
            feedback::FeedbackPageResponse,
            documents::DeleteDocumentRequest,
            sync::SyncTriggerRequest,
            pdf::GeneratePdfRequest,
            storage_events::StorageEventPayload,
        )
    ),
    tags(
        (name = "Grant Assistant API", description = "Request handlers backing the grant-application chatbot platform.")
    )
)]
pub struct ApiDoc;
