//! services/api/src/web/feedback.rs
//!
//! Contains the Axum handlers for feedback capture, admin-gated query and
//! delete, and CSV export through a presigned download URL. Submission is
//! open to any caller; everything else requires the admin role.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::auth::AuthContext;
use crate::web::state::AppState;
use grant_assistant_core::domain::{
    FeedbackEntry, FeedbackPageKey, FeedbackQuery, DEFAULT_FEEDBACK_TOPIC,
};
use grant_assistant_core::ports::{FeedbackStore, ObjectStore, PortError};

/// Page size for feedback queries.
const QUERY_PAGE_SIZE: i64 = 10;
/// Batch size while collecting rows for CSV export.
const EXPORT_BATCH_SIZE: i64 = 100;
/// Validity window of the presigned download link, in seconds.
const DOWNLOAD_URL_TTL_SECS: u64 = 3600;

//=========================================================================================
// Request and Response Types
//=========================================================================================

/// A submitted piece of feedback.
#[derive(Deserialize, ToSchema)]
pub struct FeedbackData {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub prompt: String,
    pub completion: String,
    /// 1 for positive, 0 for negative.
    pub feedback: i16,
    pub comment: Option<String>,
    pub topic: Option<String>,
    pub problem: Option<String>,
    pub sources: Option<Vec<String>>,
}

#[derive(Deserialize, ToSchema)]
pub struct PostFeedbackRequest {
    #[serde(rename = "feedbackData")]
    pub feedback_data: FeedbackData,
}

#[derive(Deserialize, ToSchema)]
pub struct FeedbackQueryParams {
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: String,
    pub topic: Option<String>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct DownloadFeedbackRequest {
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: String,
    pub topic: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct FeedbackDeleteParams {
    pub topic: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// A stored feedback row, in the shape admin tooling expects.
#[derive(Serialize, ToSchema)]
pub struct FeedbackItemResponse {
    #[serde(rename = "FeedbackID")]
    pub feedback_id: Uuid,
    #[serde(rename = "SessionID")]
    pub session_id: String,
    #[serde(rename = "UserPrompt")]
    pub prompt: String,
    #[serde(rename = "FeedbackComments")]
    pub comment: String,
    #[serde(rename = "Topic")]
    pub topic: String,
    #[serde(rename = "Problem")]
    pub problem: String,
    #[serde(rename = "Feedback")]
    pub feedback: i16,
    #[serde(rename = "ChatbotMessage")]
    pub completion: String,
    #[serde(rename = "Sources")]
    pub sources: Vec<String>,
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
}

impl From<FeedbackEntry> for FeedbackItemResponse {
    fn from(e: FeedbackEntry) -> Self {
        Self {
            feedback_id: e.feedback_id,
            session_id: e.session_id,
            prompt: e.prompt,
            comment: e.comment,
            topic: e.topic,
            problem: e.problem,
            feedback: e.feedback,
            completion: e.completion,
            sources: e.sources,
            created_at: e.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FeedbackPageResponse {
    #[serde(rename = "Items")]
    pub items: Vec<FeedbackItemResponse>,
    #[serde(rename = "NextPageToken", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

//=========================================================================================
// Continuation Tokens
//=========================================================================================

/// Round-trips the backend's last-seen key as an opaque base64url token.
fn encode_page_token(key: &FeedbackPageKey) -> String {
    let json = serde_json::to_vec(key).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_page_token(token: &str) -> Result<FeedbackPageKey, PortError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| PortError::InvalidInput("Invalid pagination token".to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|_| PortError::InvalidInput("Invalid pagination token".to_string()))
}

fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>, PortError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| PortError::InvalidInput(format!("{field} must be an RFC 3339 timestamp")))
}

fn require_admin(ctx: &AuthContext) -> Result<(), PortError> {
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(PortError::Forbidden)
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Submit feedback. Open to any caller.
#[utoipa::path(
    post,
    path = "/user-feedback",
    request_body = PostFeedbackRequest,
    responses(
        (status = 200, description = "Feedback stored"),
        (status = 400, description = "Missing or invalid fields")
    )
)]
pub async fn post_feedback_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PostFeedbackRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::Port(PortError::InvalidInput(e.body_text())))?;
    let entry = build_entry(request.feedback_data)?;
    let feedback_id = entry.feedback_id;
    state.feedback.put_feedback(entry).await?;
    Ok(Json(serde_json::json!({ "FeedbackID": feedback_id })).into_response())
}

/// Query feedback over a time range. Admin only.
#[utoipa::path(
    get,
    path = "/user-feedback",
    params(
        ("startTime" = String, Query, description = "Inclusive range start (RFC 3339)"),
        ("endTime" = String, Query, description = "Inclusive range end (RFC 3339)"),
        ("topic" = Option<String>, Query, description = "Topic filter; omitted or 'any' queries all topics"),
        ("nextPageToken" = Option<String>, Query, description = "Continuation token from a previous page")
    ),
    responses(
        (status = 200, description = "One page of feedback", body = FeedbackPageResponse),
        (status = 403, description = "Caller lacks the admin role")
    )
)]
pub async fn get_feedback_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<FeedbackQueryParams>,
) -> Result<Response, ApiError> {
    require_admin(&ctx)?;
    let page = query_page(state.feedback.as_ref(), &params).await?;
    Ok(Json(page).into_response())
}

/// Delete one feedback entry by (topic, createdAt). Admin only.
#[utoipa::path(
    delete,
    path = "/user-feedback",
    params(
        ("topic" = String, Query, description = "Topic of the entry"),
        ("createdAt" = String, Query, description = "Creation timestamp of the entry (RFC 3339)")
    ),
    responses(
        (status = 200, description = "Feedback deleted"),
        (status = 403, description = "Caller lacks the admin role")
    )
)]
pub async fn delete_feedback_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<FeedbackDeleteParams>,
) -> Result<Response, ApiError> {
    require_admin(&ctx)?;
    let created_at = parse_time("createdAt", &params.created_at)?;
    state.feedback.delete_feedback(&params.topic, created_at).await?;
    Ok(Json(serde_json::json!({ "message": "Feedback deleted successfully" })).into_response())
}

/// Export feedback for a time range as CSV and return a presigned download
/// link. Admin only.
#[utoipa::path(
    post,
    path = "/user-feedback/download-feedback",
    request_body = DownloadFeedbackRequest,
    responses(
        (status = 200, description = "Presigned URL for the generated CSV"),
        (status = 403, description = "Caller lacks the admin role")
    )
)]
pub async fn download_feedback_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    payload: Result<Json<DownloadFeedbackRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    require_admin(&ctx)?;
    let Json(request) = payload
        .map_err(|e| ApiError::Port(PortError::InvalidInput(e.body_text())))?;

    let start_time = parse_time("startTime", &request.start_time)?;
    let end_time = parse_time("endTime", &request.end_time)?;
    let topic = normalize_topic(request.topic);

    let rows = collect_all(state.feedback.as_ref(), start_time, end_time, topic).await?;
    let csv = render_csv(&rows);

    let file_name = format!(
        "feedback-{}-{}.csv",
        start_time.format("%Y-%m-%dT%H:%M:%SZ"),
        end_time.format("%Y-%m-%dT%H:%M:%SZ")
    );
    let bucket = &state.config.feedback_download_bucket;
    state
        .objects
        .put_object(bucket, &file_name, csv.into_bytes(), "text/csv")
        .await?;
    let download_url = state
        .objects
        .presign_get(bucket, &file_name, DOWNLOAD_URL_TTL_SECS)
        .await?;

    Ok(Json(serde_json::json!({ "download_url": download_url })).into_response())
}

//=========================================================================================
// Operations
//=========================================================================================

/// Validates a submission and stamps it with its generated id and UTC
/// creation time.
fn build_entry(data: FeedbackData) -> Result<FeedbackEntry, PortError> {
    if data.session_id.is_empty() {
        return Err(PortError::InvalidInput("sessionId is required".to_string()));
    }
    if data.prompt.is_empty() {
        return Err(PortError::InvalidInput("prompt is required".to_string()));
    }
    if !(0..=1).contains(&data.feedback) {
        return Err(PortError::InvalidInput("feedback must be 0 or 1".to_string()));
    }
    Ok(FeedbackEntry {
        feedback_id: Uuid::new_v4(),
        session_id: data.session_id,
        prompt: data.prompt,
        completion: data.completion,
        comment: data.comment.unwrap_or_default(),
        topic: data
            .topic
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_FEEDBACK_TOPIC.to_string()),
        problem: data.problem.unwrap_or_default(),
        feedback: data.feedback,
        sources: data.sources.unwrap_or_default(),
        created_at: Utc::now(),
    })
}

/// The literal topic "any" selects the all-topics index, like an absent one.
fn normalize_topic(topic: Option<String>) -> Option<String> {
    topic.filter(|t| !t.is_empty() && t != "any")
}

async fn query_page(
    store: &dyn FeedbackStore,
    params: &FeedbackQueryParams,
) -> Result<FeedbackPageResponse, ApiError> {
    let after = params
        .next_page_token
        .as_deref()
        .map(decode_page_token)
        .transpose()?;
    let query = FeedbackQuery {
        start_time: parse_time("startTime", &params.start_time)?,
        end_time: parse_time("endTime", &params.end_time)?,
        topic: normalize_topic(params.topic.clone()),
        after,
        limit: QUERY_PAGE_SIZE,
    };
    let page = store.query_feedback(&query).await?;
    Ok(FeedbackPageResponse {
        items: page.items.into_iter().map(FeedbackItemResponse::from).collect(),
        next_page_token: page.next_key.as_ref().map(encode_page_token),
    })
}

/// Drains every page of the range for export.
async fn collect_all(
    store: &dyn FeedbackStore,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    topic: Option<String>,
) -> Result<Vec<FeedbackEntry>, ApiError> {
    let mut rows = Vec::new();
    let mut after: Option<FeedbackPageKey> = None;
    loop {
        let query = FeedbackQuery {
            start_time,
            end_time,
            topic: topic.clone(),
            after: after.take(),
            limit: EXPORT_BATCH_SIZE,
        };
        let page = store.query_feedback(&query).await?;
        rows.extend(page.items);
        match page.next_key {
            Some(key) => after = Some(key),
            None => break,
        }
    }
    Ok(rows)
}

/// Strips the characters that would break CSV row/column structure. The
/// export favors a fixed column count over preserving punctuation.
fn sanitize_csv_field(field: &str) -> String {
    field
        .chars()
        .filter(|c| *c != '"' && *c != '\n' && *c != '\r' && *c != ',')
        .collect()
}

fn render_csv(rows: &[FeedbackEntry]) -> String {
    let mut csv = String::from(
        "FeedbackID, SessionID, UserPrompt, FeedbackComment, Topic, Problem, Feedback, ChatbotMessage, CreatedAt\n",
    );
    for row in rows {
        csv.push_str(&format!(
            "{}, {}, {}, {}, {}, {}, {}, {}, {}\n",
            sanitize_csv_field(&row.feedback_id.to_string()),
            sanitize_csv_field(&row.session_id),
            sanitize_csv_field(&row.prompt),
            sanitize_csv_field(&row.comment),
            sanitize_csv_field(&row.topic),
            sanitize_csv_field(&row.problem),
            row.feedback,
            sanitize_csv_field(&row.completion),
            sanitize_csv_field(&row.created_at.to_rfc3339()),
        ));
    }
    csv
}

//=========================================================================================
// Tests
//=========================================================================================
