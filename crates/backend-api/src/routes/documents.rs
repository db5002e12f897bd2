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
    routes::models::Document,
    services::document::{self as document_service, DocumentFilters},
    util::require_bearer,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentResponse {
    pub document: Document,
}

#[utoipa::path(
    post,
    path = "/api/documents",
    tag = "Documents",
    security(("bearerAuth" = [])),
    request_body(
        content = crate::routes::models::DocumentUploadForm,
        content_type = "multipart/form-data",
        description = "Fields `title`, `description`, `category`, optional `department_id`, and the `file` part"
    ),
    responses(
        (status = 201, description = "Document stored", body = DocumentResponse),
        (status = 400, description = "Missing field or rejected file", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not publish to this scope", body = crate::error::ErrorResponse)
    )
)]
pub async fn upload_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let document = document_service::upload_document(&session, state.config(), multipart).await?;
    Ok((StatusCode::CREATED, Json(DocumentResponse { document })))
}

#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(PageParams, DocumentFilters),
    responses(
        (status = 200, description = "Documents visible to the caller", body = crate::pagination::DocumentPage),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
    Query(filters): Query<DocumentFilters>,
) -> Result<Json<Paginated<Document>>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;
    let pagination = Pagination::resolve(&page, &state.config().pagination)?;

    let documents = document_service::list_documents(&session, &filters, pagination).await?;
    Ok(Json(pagination.wrap(documents)))
}

#[utoipa::path(
    get,
    path = "/api/documents/{document_id}",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(
        ("document_id" = Uuid, Path, description = "Document identifier")
    ),
    responses(
        (status = 200, description = "Document metadata", body = DocumentResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Document belongs to another department", body = crate::error::ErrorResponse),
        (status = 404, description = "Document not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<DocumentResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let document = document_service::get_document(&session, document_id).await?;
    Ok(Json(DocumentResponse { document }))
}

#[utoipa::path(
    get,
    path = "/api/documents/{document_id}/download",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(
        ("document_id" = Uuid, Path, description = "Document identifier")
    ),
    responses(
        (status = 200, description = "File contents; PDFs are watermarked", content_type = "application/octet-stream"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Document belongs to another department", body = crate::error::ErrorResponse),
        (status = 404, description = "Document not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn download_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let download =
        document_service::download_document(&session, state.config(), document_id).await?;
    Ok(download.into_response())
}

#[utoipa::path(
    delete,
    path = "/api/documents/{document_id}",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(
        ("document_id" = Uuid, Path, description = "Document identifier")
    ),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not delete this document", body = crate::error::ErrorResponse),
        (status = 404, description = "Document not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    document_service::delete_document(&session, state.config(), document_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
