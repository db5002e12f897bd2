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
    routes::models::{CreateIncidentRequest, Incident, IncidentFile, UpdateIncidentStatusRequest},
    services::incident::{self as incident_service, IncidentFilters},
    util::require_bearer,
    validation::ValidJson,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct IncidentResponse {
    pub incident: Incident,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IncidentFileResponse {
    pub file: IncidentFile,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IncidentFilesResponse {
    pub files: Vec<IncidentFile>,
}

#[utoipa::path(
    post,
    path = "/api/incidents",
    tag = "Incidents",
    security(("bearerAuth" = [])),
    request_body = CreateIncidentRequest,
    responses(
        (status = 201, description = "Incident reported", body = IncidentResponse),
        (status = 400, description = "Invalid SBAR report", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_incident(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<CreateIncidentRequest>,
) -> Result<(StatusCode, Json<IncidentResponse>), ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let incident = incident_service::create_incident(&session, req).await?;
    Ok((StatusCode::CREATED, Json(IncidentResponse { incident })))
}

#[utoipa::path(
    get,
    path = "/api/incidents",
    tag = "Incidents",
    security(("bearerAuth" = [])),
    params(PageParams, IncidentFilters),
    responses(
        (status = 200, description = "Incidents the caller reported or oversees", body = crate::pagination::IncidentPage),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_incidents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
    Query(filters): Query<IncidentFilters>,
) -> Result<Json<Paginated<Incident>>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;
    let pagination = Pagination::resolve(&page, &state.config().pagination)?;

    let incidents = incident_service::list_incidents(&session, &filters, pagination).await?;
    Ok(Json(pagination.wrap(incidents)))
}

#[utoipa::path(
    get,
    path = "/api/incidents/{incident_id}",
    tag = "Incidents",
    security(("bearerAuth" = [])),
    params(
        ("incident_id" = Uuid, Path, description = "Incident identifier")
    ),
    responses(
        (status = 200, description = "Incident fetched", body = IncidentResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not view this incident", body = crate::error::ErrorResponse),
        (status = 404, description = "Incident not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<IncidentResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let incident = incident_service::get_incident(&session, incident_id).await?;
    Ok(Json(IncidentResponse { incident }))
}

#[utoipa::path(
    patch,
    path = "/api/incidents/{incident_id}/status",
    tag = "Incidents",
    security(("bearerAuth" = [])),
    params(
        ("incident_id" = Uuid, Path, description = "Incident identifier")
    ),
    request_body = UpdateIncidentStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = IncidentResponse),
        (status = 400, description = "Invalid transition or missing resolution notes", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Department head or administrator required", body = crate::error::ErrorResponse),
        (status = 404, description = "Incident not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(incident_id): Path<Uuid>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<UpdateIncidentStatusRequest>,
) -> Result<Json<IncidentResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let incident = incident_service::update_status(&session, incident_id, req).await?;
    Ok(Json(IncidentResponse { incident }))
}

#[utoipa::path(
    post,
    path = "/api/incidents/{incident_id}/files",
    tag = "Incidents",
    security(("bearerAuth" = [])),
    params(
        ("incident_id" = Uuid, Path, description = "Incident identifier")
    ),
    request_body(
        content = crate::routes::models::FileUploadForm,
        content_type = "multipart/form-data",
        description = "Evidence file in the `file` part"
    ),
    responses(
        (status = 201, description = "File attached", body = IncidentFileResponse),
        (status = 400, description = "Missing or rejected file", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not attach files to this incident", body = crate::error::ErrorResponse),
        (status = 404, description = "Incident not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Path(incident_id): Path<Uuid>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<IncidentFileResponse>), ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let file =
        incident_service::upload_file(&session, state.config(), incident_id, multipart).await?;
    Ok((StatusCode::CREATED, Json(IncidentFileResponse { file })))
}

#[utoipa::path(
    get,
    path = "/api/incidents/{incident_id}/files",
    tag = "Incidents",
    security(("bearerAuth" = [])),
    params(
        ("incident_id" = Uuid, Path, description = "Incident identifier")
    ),
    responses(
        (status = 200, description = "Files attached to the incident", body = IncidentFilesResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not view this incident", body = crate::error::ErrorResponse),
        (status = 404, description = "Incident not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_files(
    State(state): State<AppState>,
    Path(incident_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<IncidentFilesResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let files = incident_service::list_files(&session, incident_id).await?;
    Ok(Json(IncidentFilesResponse { files }))
}

#[utoipa::path(
    get,
    path = "/api/incidents/{incident_id}/files/{file_id}",
    tag = "Incidents",
    security(("bearerAuth" = [])),
    params(
        ("incident_id" = Uuid, Path, description = "Incident identifier"),
        ("file_id" = Uuid, Path, description = "Attached file identifier")
    ),
    responses(
        (status = 200, description = "File contents; PDFs are watermarked", content_type = "application/octet-stream"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not view this incident", body = crate::error::ErrorResponse),
        (status = 404, description = "Incident or file not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path((incident_id, file_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let download =
        incident_service::download_file(&session, state.config(), incident_id, file_id).await?;
    Ok(download.into_response())
}
