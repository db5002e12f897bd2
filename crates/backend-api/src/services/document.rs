use axum::extract::Multipart;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::IntoParams;
use uuid::Uuid;
use wardline_config::AppConfig;
use wardline_supabase::{in_filter, Page};

use crate::pagination::Pagination;
use crate::routes::models::{Document, DocumentCategory};
use crate::services::uploads::{self, Download, MultipartForm};
use crate::services::{audit::AuditLog, search_term, watermark, ServiceError};
use crate::state::Session;
use crate::validation::Validator;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentFilters {
    pub category: Option<DocumentCategory>,
    pub department_id: Option<Uuid>,
    /// Case-insensitive match on the title.
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewDocument<'a> {
    title: &'a str,
    description: Option<&'a str>,
    category: DocumentCategory,
    department_id: Option<Uuid>,
    storage_path: &'a str,
    file_name: &'a str,
    mime_type: &'a str,
    size_bytes: i64,
    uploaded_by: Uuid,
}

pub async fn upload_document(
    session: &Session,
    config: &AppConfig,
    multipart: Multipart,
) -> Result<Document, ServiceError> {
    let mut form = MultipartForm::read(multipart).await?;

    let title = form.required_text("title")?.to_string();
    Validator::required_text("title", &title, 200)?;
    let description = form.text("description").map(str::to_string);
    Validator::optional_text("description", description.as_deref(), 2000)?;
    let category = form
        .required_text("category")
        .and_then(|value| {
            DocumentCategory::parse(value).ok_or_else(|| {
                ServiceError::bad_request(
                    "category: must be one of policy, procedure, form, report, training, other",
                )
            })
        })?;
    let department_id = form.uuid("department_id")?;

    match department_id {
        Some(department_id) => session.access.require_contribute(department_id)?,
        None => session.access.require_org_wide()?,
    }

    let file = form.take_file()?;
    file.validate(&config.storage)?;

    let prefix = match department_id {
        Some(department_id) => format!("departments/{department_id}"),
        None => "hospital".to_string(),
    };
    let path = uploads::object_path(&prefix, &file.file_name);
    let bucket = session.db.storage(&config.storage.documents_bucket);
    let row = NewDocument {
        title: &title,
        description: description.as_deref(),
        category,
        department_id,
        storage_path: &path,
        file_name: &file.file_name,
        mime_type: &file.content_type,
        size_bytes: file.size(),
        uploaded_by: session.user_id(),
    };

    let document: Document = uploads::store_then_insert(&bucket, &path, &file, || {
        session.db.from("documents").insert(&row)
    })
    .await?;

    tracing::info!(document_id = %document.id, size = file.size(), "document uploaded");
    AuditLog::record(
        &session.db,
        session.user_id(),
        "document.upload",
        "document",
        Some(document.id.to_string()),
        json!({
            "file_name": document.file_name,
            "department_id": document.department_id,
            "size_bytes": document.size_bytes,
        }),
    )
    .await;

    Ok(document)
}

pub async fn list_documents(
    session: &Session,
    filters: &DocumentFilters,
    pagination: Pagination,
) -> Result<Page<Document>, ServiceError> {
    let mut query = session.db.from("documents").select("*");

    match session.access.visible_departments() {
        Some(departments) if departments.is_empty() => query = query.is_null("department_id"),
        Some(departments) => {
            query = query.or(format!(
                "department_id.is.null,{}",
                in_filter("department_id", departments)
            ))
        }
        None => {}
    }

    if let Some(category) = filters.category {
        query = query.eq("category", category.as_str());
    }
    if let Some(department_id) = filters.department_id {
        query = query.eq("department_id", department_id);
    }
    if let Some(term) = filters.search.as_deref().and_then(search_term) {
        query = query.ilike_contains("title", &term);
    }

    Ok(pagination
        .apply(query.order("created_at", false))
        .fetch_page()
        .await?)
}

pub async fn get_document(session: &Session, document_id: Uuid) -> Result<Document, ServiceError> {
    let document: Document = session
        .db
        .from("documents")
        .select("*")
        .eq("id", document_id)
        .fetch_one()
        .await?;

    if let Some(department_id) = document.department_id {
        session.access.require_view(department_id)?;
    }
    Ok(document)
}

pub async fn download_document(
    session: &Session,
    config: &AppConfig,
    document_id: Uuid,
) -> Result<Download, ServiceError> {
    let document = get_document(session, document_id).await?;

    let data = session
        .db
        .storage(&config.storage.documents_bucket)
        .download(&document.storage_path)
        .await?;
    let data = watermark::prepare_download(
        data,
        &document.mime_type,
        &config.watermark,
        session.email(),
    );

    AuditLog::record(
        &session.db,
        session.user_id(),
        "document.download",
        "document",
        Some(document.id.to_string()),
        json!({ "file_name": document.file_name }),
    )
    .await;

    Ok(Download {
        data,
        content_type: document.mime_type,
        file_name: document.file_name,
    })
}

pub async fn delete_document(
    session: &Session,
    config: &AppConfig,
    document_id: Uuid,
) -> Result<(), ServiceError> {
    let document = get_document(session, document_id).await?;

    let allowed = document.uploaded_by == session.user_id()
        || session.access.is_admin()
        || document
            .department_id
            .is_some_and(|department_id| session.access.can_manage(department_id));
    if !allowed {
        return Err(ServiceError::forbidden(
            "only the uploader, a department head or an administrator may delete this document",
        ));
    }

    session
        .db
        .from("documents")
        .eq("id", document_id)
        .delete()
        .await?;

    let bucket = session.db.storage(&config.storage.documents_bucket);
    uploads::remove_quietly(&bucket, &document.storage_path).await;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "document.delete",
        "document",
        Some(document_id.to_string()),
        json!({ "file_name": document.file_name }),
    )
    .await;

    Ok(())
}
