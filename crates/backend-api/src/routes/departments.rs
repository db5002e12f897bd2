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
    routes::models::{
        AddMemberRequest, CreateDepartmentRequest, Department, DepartmentMembership,
        UpdateDepartmentRequest,
    },
    services::department as department_service,
    util::require_bearer,
    validation::ValidJson,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct DepartmentResponse {
    pub department: Department,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MembersResponse {
    pub members: Vec<DepartmentMembership>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberResponse {
    pub member: DepartmentMembership,
}

#[utoipa::path(
    get,
    path = "/api/departments",
    tag = "Departments",
    security(("bearerAuth" = [])),
    params(PageParams),
    responses(
        (status = 200, description = "Active departments", body = crate::pagination::DepartmentPage),
        (status = 400, description = "Invalid pagination", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_departments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<Department>>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;
    let pagination = Pagination::resolve(&page, &state.config().pagination)?;

    let departments = department_service::list_departments(&session, pagination).await?;
    Ok(Json(pagination.wrap(departments)))
}

#[utoipa::path(
    get,
    path = "/api/departments/{department_id}",
    tag = "Departments",
    security(("bearerAuth" = [])),
    params(
        ("department_id" = Uuid, Path, description = "Department identifier")
    ),
    responses(
        (status = 200, description = "Department fetched", body = DepartmentResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 404, description = "Department not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_department(
    State(state): State<AppState>,
    Path(department_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<DepartmentResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let department = department_service::get_department(&session, department_id).await?;
    Ok(Json(DepartmentResponse { department }))
}

#[utoipa::path(
    post,
    path = "/api/departments",
    tag = "Departments",
    security(("bearerAuth" = [])),
    request_body = CreateDepartmentRequest,
    responses(
        (status = 201, description = "Department created", body = DepartmentResponse),
        (status = 400, description = "Invalid department payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_department(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<CreateDepartmentRequest>,
) -> Result<(StatusCode, Json<DepartmentResponse>), ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let department = department_service::create_department(&session, req).await?;
    Ok((StatusCode::CREATED, Json(DepartmentResponse { department })))
}

#[utoipa::path(
    patch,
    path = "/api/departments/{department_id}",
    tag = "Departments",
    security(("bearerAuth" = [])),
    params(
        ("department_id" = Uuid, Path, description = "Department identifier")
    ),
    request_body = UpdateDepartmentRequest,
    responses(
        (status = 200, description = "Department updated", body = DepartmentResponse),
        (status = 400, description = "Invalid update payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorResponse),
        (status = 404, description = "Department not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_department(
    State(state): State<AppState>,
    Path(department_id): Path<Uuid>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<UpdateDepartmentRequest>,
) -> Result<Json<DepartmentResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let department = department_service::update_department(&session, department_id, req).await?;
    Ok(Json(DepartmentResponse { department }))
}

#[utoipa::path(
    get,
    path = "/api/departments/{department_id}/members",
    tag = "Departments",
    security(("bearerAuth" = [])),
    params(
        ("department_id" = Uuid, Path, description = "Department identifier")
    ),
    responses(
        (status = 200, description = "Department members", body = MembersResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a member of this department", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    Path(department_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<MembersResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let members = department_service::list_members(&session, department_id).await?;
    Ok(Json(MembersResponse { members }))
}

#[utoipa::path(
    post,
    path = "/api/departments/{department_id}/members",
    tag = "Departments",
    security(("bearerAuth" = [])),
    params(
        ("department_id" = Uuid, Path, description = "Department identifier")
    ),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Membership created or updated", body = MemberResponse),
        (status = 400, description = "Invalid membership payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Department head or administrator required", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_member(
    State(state): State<AppState>,
    Path(department_id): Path<Uuid>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<AddMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let member = department_service::add_member(&session, department_id, req).await?;
    Ok((StatusCode::CREATED, Json(MemberResponse { member })))
}

#[utoipa::path(
    delete,
    path = "/api/departments/{department_id}/members/{user_id}",
    tag = "Departments",
    security(("bearerAuth" = [])),
    params(
        ("department_id" = Uuid, Path, description = "Department identifier"),
        ("user_id" = Uuid, Path, description = "Member user identifier")
    ),
    responses(
        (status = 204, description = "Membership removed"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Department head or administrator required", body = crate::error::ErrorResponse)
    )
)]
pub async fn remove_member(
    State(state): State<AppState>,
    Path((department_id, user_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    department_service::remove_member(&session, department_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
