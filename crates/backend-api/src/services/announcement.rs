use axum::extract::Multipart;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use utoipa::IntoParams;
use uuid::Uuid;
use wardline_config::AppConfig;
use wardline_supabase::{in_filter, Page};

use crate::pagination::Pagination;
use crate::routes::models::{
    check_announcement_scope, check_expiry, Announcement, CreateAnnouncementRequest, Priority,
    UpdateAnnouncementRequest,
};
use crate::services::uploads::{self, MultipartForm};
use crate::services::{audit::AuditLog, quoted_timestamp, watermark, ServiceError};
use crate::state::Session;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnnouncementFilters {
    pub department_id: Option<Uuid>,
    pub priority: Option<Priority>,
    /// Include announcements whose `expires_at` has passed.
    pub include_expired: Option<bool>,
}

#[derive(Debug, Serialize)]
struct NewAnnouncement<'a> {
    title: &'a str,
    body: &'a str,
    priority: Priority,
    is_system_wide: bool,
    department_id: Option<Uuid>,
    author_id: Uuid,
    published_at: chrono::DateTime<Utc>,
    expires_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct MemoPatch<'a> {
    memo_path: &'a str,
    memo_file_name: &'a str,
    memo_mime_type: &'a str,
    updated_at: chrono::DateTime<Utc>,
}

pub async fn list_announcements(
    session: &Session,
    filters: &AnnouncementFilters,
    pagination: Pagination,
) -> Result<Page<Announcement>, ServiceError> {
    let mut query = session.db.from("announcements").select("*");
    let mut groups = Vec::new();

    match session.access.visible_departments() {
        Some(departments) if departments.is_empty() => query = query.is_true("is_system_wide"),
        Some(departments) => groups.push(format!(
            "is_system_wide.is.true,{}",
            in_filter("department_id", departments)
        )),
        None => {}
    }

    if !filters.include_expired.unwrap_or(false) {
        groups.push(format!(
            "expires_at.is.null,expires_at.gt.{}",
            quoted_timestamp(Utc::now())
        ));
    }

    query = match groups.len() {
        0 => query,
        1 => query.or(groups.remove(0)),
        _ => query.and(
            groups
                .iter()
                .map(|group| format!("or({group})"))
                .collect::<Vec<_>>()
                .join(","),
        ),
    };

    if let Some(department_id) = filters.department_id {
        query = query.eq("department_id", department_id);
    }
    if let Some(priority) = filters.priority {
        query = query.eq("priority", priority.as_str());
    }

    let page = pagination
        .apply(query.order("published_at", false).order("created_at", false))
        .fetch_page()
        .await?;
    Ok(page)
}

pub async fn get_announcement(
    session: &Session,
    announcement_id: Uuid,
) -> Result<Announcement, ServiceError> {
    let announcement: Announcement = session
        .db
        .from("announcements")
        .select("*")
        .eq("id", announcement_id)
        .fetch_one()
        .await?;

    let visible = announcement.is_system_wide
        || announcement
            .department_id
            .is_some_and(|department_id| session.access.can_view(department_id));
    if !visible {
        return Err(ServiceError::forbidden(
            "announcement belongs to another department",
        ));
    }
    Ok(announcement)
}

fn require_publish(session: &Session, is_system_wide: bool, department_id: Option<Uuid>) -> Result<(), ServiceError> {
    match (is_system_wide, department_id) {
        (true, _) => session.access.require_org_wide(),
        (false, Some(department_id)) => session.access.require_manage(department_id),
        (false, None) => Err(ServiceError::bad_request(
            "department_id: is required unless the announcement is system-wide",
        )),
    }
}

fn require_edit(session: &Session, announcement: &Announcement) -> Result<(), ServiceError> {
    let allowed = announcement.author_id == session.user_id()
        || session.access.is_admin()
        || announcement
            .department_id
            .is_some_and(|department_id| session.access.can_manage(department_id));
    if !allowed {
        return Err(ServiceError::forbidden(
            "only the author, a department head or an administrator may change this announcement",
        ));
    }
    Ok(())
}

pub async fn create_announcement(
    session: &Session,
    req: CreateAnnouncementRequest,
) -> Result<Announcement, ServiceError> {
    require_publish(session, req.is_system_wide, req.department_id)?;

    let row = NewAnnouncement {
        title: req.title.trim(),
        body: &req.body,
        priority: req.priority,
        is_system_wide: req.is_system_wide,
        department_id: req.department_id,
        author_id: session.user_id(),
        published_at: req.published_at.unwrap_or_else(Utc::now),
        expires_at: req.expires_at,
    };
    let announcement: Announcement = session.db.from("announcements").insert(&row).await?;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "announcement.create",
        "announcement",
        Some(announcement.id.to_string()),
        json!({
            "is_system_wide": announcement.is_system_wide,
            "department_id": announcement.department_id,
            "priority": announcement.priority,
        }),
    )
    .await;

    Ok(announcement)
}

pub async fn update_announcement(
    session: &Session,
    announcement_id: Uuid,
    req: UpdateAnnouncementRequest,
) -> Result<Announcement, ServiceError> {
    let existing = get_announcement(session, announcement_id).await?;
    require_edit(session, &existing)?;

    let is_system_wide = req.is_system_wide.unwrap_or(existing.is_system_wide);
    let department_id = if is_system_wide {
        check_announcement_scope(true, req.department_id)?;
        None
    } else {
        req.department_id.or(existing.department_id)
    };
    check_announcement_scope(is_system_wide, department_id)?;

    let scope_changed =
        is_system_wide != existing.is_system_wide || department_id != existing.department_id;
    if scope_changed {
        require_publish(session, is_system_wide, department_id)?;
    }

    let published_at = req.published_at.unwrap_or(existing.published_at);
    let expires_at = req.expires_at.or(existing.expires_at);
    check_expiry(published_at, expires_at)?;

    let mut patch = Map::new();
    if let Some(title) = &req.title {
        patch.insert("title".into(), Value::from(title.trim()));
    }
    if let Some(body) = &req.body {
        patch.insert("body".into(), Value::from(body.as_str()));
    }
    if let Some(priority) = req.priority {
        patch.insert("priority".into(), Value::from(priority.as_str()));
    }
    if scope_changed {
        patch.insert("is_system_wide".into(), Value::from(is_system_wide));
        patch.insert("department_id".into(), json!(department_id));
    }
    if let Some(published_at) = req.published_at {
        patch.insert("published_at".into(), json!(published_at));
    }
    if let Some(expires_at) = req.expires_at {
        patch.insert("expires_at".into(), json!(expires_at));
    }
    let changed: Vec<String> = patch.keys().cloned().collect();
    patch.insert("updated_at".into(), json!(Utc::now()));

    let announcement: Announcement = session
        .db
        .from("announcements")
        .eq("id", announcement_id)
        .update(&patch)
        .await?;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "announcement.update",
        "announcement",
        Some(announcement_id.to_string()),
        json!({ "fields": changed }),
    )
    .await;

    Ok(announcement)
}

pub async fn delete_announcement(
    session: &Session,
    config: &AppConfig,
    announcement_id: Uuid,
) -> Result<(), ServiceError> {
    let existing = get_announcement(session, announcement_id).await?;
    require_edit(session, &existing)?;

    session
        .db
        .from("announcements")
        .eq("id", announcement_id)
        .delete()
        .await?;

    if let Some(memo_path) = &existing.memo_path {
        let bucket = session.db.storage(&config.storage.memos_bucket);
        uploads::remove_quietly(&bucket, memo_path).await;
    }

    AuditLog::record(
        &session.db,
        session.user_id(),
        "announcement.delete",
        "announcement",
        Some(announcement_id.to_string()),
        json!({ "title": existing.title }),
    )
    .await;

    Ok(())
}

pub async fn upload_memo(
    session: &Session,
    config: &AppConfig,
    announcement_id: Uuid,
    multipart: Multipart,
) -> Result<Announcement, ServiceError> {
    let existing = get_announcement(session, announcement_id).await?;
    require_edit(session, &existing)?;

    let mut form = MultipartForm::read(multipart).await?;
    let file = form.take_file()?;
    file.validate(&config.storage)?;

    let bucket = session.db.storage(&config.storage.memos_bucket);
    let path = uploads::object_path(&format!("announcements/{announcement_id}"), &file.file_name);
    let patch = MemoPatch {
        memo_path: &path,
        memo_file_name: &file.file_name,
        memo_mime_type: &file.content_type,
        updated_at: Utc::now(),
    };

    let announcement: Announcement = uploads::store_then_insert(&bucket, &path, &file, || {
        session
            .db
            .from("announcements")
            .eq("id", announcement_id)
            .update(&patch)
    })
    .await?;

    if let Some(previous) = existing.memo_path.as_deref().filter(|old| *old != path) {
        uploads::remove_quietly(&bucket, previous).await;
    }

    AuditLog::record(
        &session.db,
        session.user_id(),
        "announcement.memo_upload",
        "announcement",
        Some(announcement_id.to_string()),
        json!({ "file_name": file.file_name, "size_bytes": file.size() }),
    )
    .await;

    Ok(announcement)
}

pub async fn download_memo(
    session: &Session,
    config: &AppConfig,
    announcement_id: Uuid,
) -> Result<uploads::Download, ServiceError> {
    let announcement = get_announcement(session, announcement_id).await?;
    let Some(memo_path) = announcement.memo_path.as_deref() else {
        return Err(ServiceError::not_found("announcement has no memo"));
    };

    let content_type = announcement
        .memo_mime_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let file_name = announcement
        .memo_file_name
        .clone()
        .unwrap_or_else(|| "memo".to_string());

    let data = session
        .db
        .storage(&config.storage.memos_bucket)
        .download(memo_path)
        .await?;
    let data = watermark::prepare_download(data, &content_type, &config.watermark, session.email());

    AuditLog::record(
        &session.db,
        session.user_id(),
        "announcement.memo_download",
        "announcement",
        Some(announcement_id.to_string()),
        json!({ "file_name": file_name }),
    )
    .await;

    Ok(uploads::Download {
        data,
        content_type,
        file_name,
    })
}
