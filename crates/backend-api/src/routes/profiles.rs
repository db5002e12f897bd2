use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    pagination::{PageParams, Paginated, Pagination},
    routes::models::{Profile, UpdateMeRequest, UpdateProfileRequest},
    services::{access::Membership, profile as profile_service},
    util::require_bearer,
    validation::ValidJson,
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub profile: Profile,
    pub memberships: Vec<Membership>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub profile: Profile,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProfileFilters {
    /// Case-insensitive match on name or email.
    pub search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Profiles",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current profile and department memberships", body = MeResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Profile missing or disabled", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    Ok(Json(MeResponse {
        memberships: session.access.memberships().to_vec(),
        profile: session.profile,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/me",
    tag = "Profiles",
    security(("bearerAuth" = [])),
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Invalid payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<UpdateMeRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let profile = profile_service::update_me(&session, req).await?;
    Ok(Json(ProfileResponse { profile }))
}

#[utoipa::path(
    get,
    path = "/api/profiles",
    tag = "Profiles",
    security(("bearerAuth" = [])),
    params(PageParams, ProfileFilters),
    responses(
        (status = 200, description = "Profiles page", body = crate::pagination::ProfilePage),
        (status = 400, description = "Invalid pagination", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_profiles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
    Query(filters): Query<ProfileFilters>,
) -> Result<Json<Paginated<Profile>>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;
    let pagination = Pagination::resolve(&page, &state.config().pagination)?;

    let profiles =
        profile_service::list_profiles(&session, filters.search.as_deref(), pagination).await?;
    Ok(Json(pagination.wrap(profiles)))
}

#[utoipa::path(
    patch,
    path = "/api/profiles/{profile_id}",
    tag = "Profiles",
    security(("bearerAuth" = [])),
    params(
        ("profile_id" = Uuid, Path, description = "Profile identifier")
    ),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Invalid payload or self-demotion", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorResponse),
        (status = 404, description = "Profile not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let session = state.authenticate(&token).await?;

    let profile = profile_service::update_profile(&session, profile_id, req).await?;
    Ok(Json(ProfileResponse { profile }))
}
