use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;
use wardline_supabase::Page;

use crate::pagination::Pagination;
use crate::routes::models::{Profile, Role, UpdateMeRequest, UpdateProfileRequest};
use crate::services::{audit::AuditLog, search_term, ServiceError};
use crate::state::Session;

#[derive(Debug, Serialize)]
struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_active: Option<bool>,
    updated_at: chrono::DateTime<Utc>,
}

pub async fn update_me(session: &Session, req: UpdateMeRequest) -> Result<Profile, ServiceError> {
    let patch = ProfilePatch {
        full_name: Some(req.full_name.trim().to_string()),
        role: None,
        is_active: None,
        updated_at: Utc::now(),
    };

    let profile = session
        .db
        .from("profiles")
        .eq("id", session.user_id())
        .update(&patch)
        .await?;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "profile.update_self",
        "profile",
        Some(session.user_id().to_string()),
        json!({ "fields": ["full_name"] }),
    )
    .await;

    Ok(profile)
}

pub async fn list_profiles(
    session: &Session,
    search: Option<&str>,
    pagination: Pagination,
) -> Result<Page<Profile>, ServiceError> {
    session.access.require_admin()?;

    let mut query = session.db.from("profiles").select("*");
    if let Some(term) = search.and_then(search_term) {
        query = query.or(format!(
            "full_name.ilike.*{term}*,email.ilike.*{term}*"
        ));
    }

    let page = pagination
        .apply(query.order("full_name", true))
        .fetch_page()
        .await?;
    Ok(page)
}

pub async fn update_profile(
    session: &Session,
    profile_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<Profile, ServiceError> {
    session.access.require_admin()?;

    if profile_id == session.user_id() {
        if req.is_active == Some(false) {
            return Err(ServiceError::bad_request(
                "is_active: administrators cannot deactivate their own account",
            ));
        }
        if req.role.is_some_and(|role| role != Role::Admin) {
            return Err(ServiceError::bad_request(
                "role: administrators cannot remove their own administrator role",
            ));
        }
    }

    let patch = ProfilePatch {
        full_name: None,
        role: req.role,
        is_active: req.is_active,
        updated_at: Utc::now(),
    };

    let profile: Profile = session
        .db
        .from("profiles")
        .eq("id", profile_id)
        .update(&patch)
        .await?;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "profile.update",
        "profile",
        Some(profile_id.to_string()),
        json!({ "role": req.role, "is_active": req.is_active }),
    )
    .await;

    Ok(profile)
}
