use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    pagination::{PageParams, Paginated, Pagination},
    routes::models::{CreateThreadRequest, Message, SendMessageRequest, ThreadSummary},
    services::messaging::{self as messaging_service, CreatedThread, ThreadDetail},
    util::require_bearer,
    validation::ValidJson,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: Message,
}

#[utoipa::path(
    get,
    path = "/api/messages/threads",
    tag = "Messaging",
    security(("bearerAuth" = [])),
    params(PageParams),
    responses(
        (status = 200, description = "Threads the caller participates in, most recent activity first", body = crate::pagination::ThreadPage),
        (status = 400, description = "Invalid pagination", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_threads(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<ThreadSummary>>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;
    let pagination = Pagination::resolve(&page, &state.config().pagination)?;

    let threads = messaging_service::list_threads(&session, pagination).await?;
    Ok(Json(pagination.wrap(threads)))
}

#[utoipa::path(
    post,
    path = "/api/messages/threads",
    tag = "Messaging",
    security(("bearerAuth" = [])),
    request_body = CreateThreadRequest,
    responses(
        (status = 201, description = "Thread started with its first message", body = CreatedThread),
        (status = 400, description = "Invalid thread payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<CreateThreadRequest>,
) -> Result<(StatusCode, Json<CreatedThread>), ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let created = messaging_service::create_thread(&session, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/messages/threads/{thread_id}",
    tag = "Messaging",
    security(("bearerAuth" = [])),
    params(
        ("thread_id" = Uuid, Path, description = "Thread identifier"),
        PageParams
    ),
    responses(
        (status = 200, description = "Thread with participants and a page of messages", body = ThreadDetail),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a participant in this thread", body = crate::error::ErrorResponse),
        (status = 404, description = "Thread not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
) -> Result<Json<ThreadDetail>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;
    let pagination = Pagination::resolve(&page, &state.config().pagination)?;

    let detail = messaging_service::get_thread(&session, thread_id, pagination).await?;
    Ok(Json(detail))
}

#[utoipa::path(
    post,
    path = "/api/messages/threads/{thread_id}/messages",
    tag = "Messaging",
    security(("bearerAuth" = [])),
    params(
        ("thread_id" = Uuid, Path, description = "Thread identifier")
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = MessageResponse),
        (status = 400, description = "Invalid message", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a participant in this thread", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let message = messaging_service::send_message(&session, thread_id, req).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}

#[utoipa::path(
    post,
    path = "/api/messages/threads/{thread_id}/read",
    tag = "Messaging",
    security(("bearerAuth" = [])),
    params(
        ("thread_id" = Uuid, Path, description = "Thread identifier")
    ),
    responses(
        (status = 204, description = "Thread marked as read"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a participant in this thread", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    messaging_service::mark_read(&session, thread_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
