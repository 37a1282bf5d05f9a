//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        ChromiumPdfRenderer, DbAdapter, HttpObjectStore, IngestionApiAdapter,
        SoftwarePdfConverter,
    },
    config::Config,
    error::ApiError,
    web::{
        admin_delete_object_handler, attach_claims, delete_document_handler, delete_feedback_handler,
        download_feedback_handler, draft_operations_handler, generate_pdf_handler,
        get_feedback_handler, kb_http_handler, post_feedback_handler,
        session_operations_handler, storage_events_handler, sync::SyncService,
        state::AppState, trigger_sync_handler, ApiDoc,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{any, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter
        .run_migrations()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Database migrations complete.");

    // --- 3. Initialize Backend Adapters ---
    let http_client = reqwest::Client::new();

    let object_store = Arc::new(HttpObjectStore::new(
        http_client.clone(),
        config.object_store_endpoint.clone(),
        config.object_store_presigned_endpoint.clone(),
        config.object_store_token.clone(),
        config.object_store_signing_secret.clone(),
    ));

    let ingestion = Arc::new(IngestionApiAdapter::new(
        http_client.clone(),
        config.ingestion_endpoint.clone(),
        config.ingestion_token.clone(),
        config.knowledge_base_id.clone(),
    ));
    let sync_service = Arc::new(SyncService::new(ingestion, config.data_sources.clone()));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        drafts: db_adapter.clone(),
        sessions: db_adapter.clone(),
        feedback: db_adapter,
        objects: object_store,
        sync: sync_service,
        browser_renderer: Arc::new(ChromiumPdfRenderer::new()),
        converter: Arc::new(SoftwarePdfConverter::new()),
        config: config.clone(),
    });

    // Responses are consumed cross-origin by the web client.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/drafts", post(draft_operations_handler))
        .route("/sessions", post(session_operations_handler))
        .route(
            "/user-feedback",
            post(post_feedback_handler)
                .get(get_feedback_handler)
                .delete(delete_feedback_handler),
        )
        .route("/user-feedback/download-feedback", post(download_feedback_handler))
        .route("/documents/delete", post(delete_document_handler))
        .route("/objects/delete", post(admin_delete_object_handler))
        .route("/sync", post(trigger_sync_handler))
        // Admin sync operations route by substring on the raw path.
        .route("/kb/{*path}", any(kb_http_handler))
        .route("/pdf/generate", post(generate_pdf_handler))
        .route("/events/storage", post(storage_events_handler))
        .layer(axum_middleware::from_fn(attach_claims))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
