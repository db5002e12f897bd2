use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    pagination::{PageParams, Paginated, Pagination},
    routes::models::{Announcement, CreateAnnouncementRequest, UpdateAnnouncementRequest},
    services::announcement::{self as announcement_service, AnnouncementFilters},
    util::require_bearer,
    validation::ValidJson,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct AnnouncementResponse {
    pub announcement: Announcement,
}

#[utoipa::path(
    get,
    path = "/api/announcements",
    tag = "Announcements",
    security(("bearerAuth" = [])),
    params(PageParams, AnnouncementFilters),
    responses(
        (status = 200, description = "Announcements visible to the caller, newest first", body = crate::pagination::AnnouncementPage),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_announcements(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
    Query(filters): Query<AnnouncementFilters>,
) -> Result<Json<Paginated<Announcement>>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;
    let pagination = Pagination::resolve(&page, &state.config().pagination)?;

    let announcements =
        announcement_service::list_announcements(&session, &filters, pagination).await?;
    Ok(Json(pagination.wrap(announcements)))
}

#[utoipa::path(
    post,
    path = "/api/announcements",
    tag = "Announcements",
    security(("bearerAuth" = [])),
    request_body = CreateAnnouncementRequest,
    responses(
        (status = 201, description = "Announcement published", body = AnnouncementResponse),
        (status = 400, description = "Invalid announcement payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not publish to this audience", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_announcement(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<AnnouncementResponse>), ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let announcement = announcement_service::create_announcement(&session, req).await?;
    Ok((StatusCode::CREATED, Json(AnnouncementResponse { announcement })))
}

#[utoipa::path(
    get,
    path = "/api/announcements/{announcement_id}",
    tag = "Announcements",
    security(("bearerAuth" = [])),
    params(
        ("announcement_id" = Uuid, Path, description = "Announcement identifier")
    ),
    responses(
        (status = 200, description = "Announcement fetched", body = AnnouncementResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Announcement belongs to another department", body = crate::error::ErrorResponse),
        (status = 404, description = "Announcement not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_announcement(
    State(state): State<AppState>,
    Path(announcement_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<AnnouncementResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let announcement = announcement_service::get_announcement(&session, announcement_id).await?;
    Ok(Json(AnnouncementResponse { announcement }))
}

#[utoipa::path(
    patch,
    path = "/api/announcements/{announcement_id}",
    tag = "Announcements",
    security(("bearerAuth" = [])),
    params(
        ("announcement_id" = Uuid, Path, description = "Announcement identifier")
    ),
    request_body = UpdateAnnouncementRequest,
    responses(
        (status = 200, description = "Announcement updated", body = AnnouncementResponse),
        (status = 400, description = "Invalid update payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not edit this announcement", body = crate::error::ErrorResponse),
        (status = 404, description = "Announcement not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_announcement(
    State(state): State<AppState>,
    Path(announcement_id): Path<Uuid>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<UpdateAnnouncementRequest>,
) -> Result<Json<AnnouncementResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let announcement =
        announcement_service::update_announcement(&session, announcement_id, req).await?;
    Ok(Json(AnnouncementResponse { announcement }))
}

#[utoipa::path(
    delete,
    path = "/api/announcements/{announcement_id}",
    tag = "Announcements",
    security(("bearerAuth" = [])),
    params(
        ("announcement_id" = Uuid, Path, description = "Announcement identifier")
    ),
    responses(
        (status = 204, description = "Announcement deleted"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not delete this announcement", body = crate::error::ErrorResponse),
        (status = 404, description = "Announcement not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_announcement(
    State(state): State<AppState>,
    Path(announcement_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    announcement_service::delete_announcement(&session, state.config(), announcement_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/announcements/{announcement_id}/memo",
    tag = "Announcements",
    security(("bearerAuth" = [])),
    params(
        ("announcement_id" = Uuid, Path, description = "Announcement identifier")
    ),
    request_body(
        content = crate::routes::models::FileUploadForm,
        content_type = "multipart/form-data",
        description = "Memo file in the `file` part"
    ),
    responses(
        (status = 200, description = "Memo attached", body = AnnouncementResponse),
        (status = 400, description = "Missing or rejected file", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not edit this announcement", body = crate::error::ErrorResponse),
        (status = 404, description = "Announcement not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn upload_memo(
    State(state): State<AppState>,
    Path(announcement_id): Path<Uuid>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<AnnouncementResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let announcement =
        announcement_service::upload_memo(&session, state.config(), announcement_id, multipart)
            .await?;
    Ok(Json(AnnouncementResponse { announcement }))
}

#[utoipa::path(
    get,
    path = "/api/announcements/{announcement_id}/memo",
    tag = "Announcements",
    security(("bearerAuth" = [])),
    params(
        ("announcement_id" = Uuid, Path, description = "Announcement identifier")
    ),
    responses(
        (status = 200, description = "Memo file; PDFs are watermarked", content_type = "application/octet-stream"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 404, description = "Announcement or memo not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn download_memo(
    State(state): State<AppState>,
    Path(announcement_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let download =
        announcement_service::download_memo(&session, state.config(), announcement_id).await?;
    Ok(download.into_response())
}
