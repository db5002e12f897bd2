use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};

use crate::{
    pagination::{PageParams, Paginated, Pagination},
    routes::models::AuditLogEntry,
    services::audit::{AuditFilter, AuditLog},
    util::require_bearer,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/audit-logs",
    tag = "Audit",
    security(("bearerAuth" = [])),
    params(PageParams, AuditFilter),
    responses(
        (status = 200, description = "Audit trail, newest first", body = crate::pagination::AuditLogPage),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
    Query(filter): Query<AuditFilter>,
) -> Result<Json<Paginated<AuditLogEntry>>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;
    session.access.require_admin()?;
    let pagination = Pagination::resolve(&page, &state.config().pagination)?;

    let entries = AuditLog::list(&session.db, &filter, pagination).await?;
    Ok(Json(pagination.wrap(entries)))
}
