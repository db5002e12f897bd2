use axum::extract::Multipart;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::IntoParams;
use uuid::Uuid;
use wardline_config::AppConfig;
use wardline_supabase::{in_filter, Page};

use crate::pagination::Pagination;
use crate::routes::models::{
    CreateIncidentRequest, Incident, IncidentFile, IncidentStatus, Severity,
    UpdateIncidentStatusRequest,
};
use crate::services::uploads::{self, Download, MultipartForm};
use crate::services::{audit::AuditLog, watermark, ServiceError};
use crate::state::Session;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IncidentFilters {
    pub status: Option<IncidentStatus>,
    pub severity: Option<Severity>,
    pub department_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct NewIncident<'a> {
    reporter_id: Uuid,
    department_id: Uuid,
    title: &'a str,
    severity: Severity,
    status: IncidentStatus,
    occurred_at: DateTime<Utc>,
    location: Option<&'a str>,
    situation: &'a str,
    background: &'a str,
    assessment: &'a str,
    recommendation: &'a str,
    patient_involved: bool,
}

#[derive(Debug, Serialize)]
struct StatusPatch<'a> {
    status: IncidentStatus,
    reviewed_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution_notes: Option<&'a str>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct NewIncidentFile<'a> {
    incident_id: Uuid,
    storage_path: &'a str,
    file_name: &'a str,
    mime_type: &'a str,
    size_bytes: i64,
    uploaded_by: Uuid,
}

pub async fn create_incident(
    session: &Session,
    req: CreateIncidentRequest,
) -> Result<Incident, ServiceError> {
    let row = NewIncident {
        reporter_id: session.user_id(),
        department_id: req.department_id,
        title: req.title.trim(),
        severity: req.severity,
        status: IncidentStatus::Submitted,
        occurred_at: req.occurred_at,
        location: req.location.as_deref().map(str::trim),
        situation: &req.situation,
        background: &req.background,
        assessment: &req.assessment,
        recommendation: &req.recommendation,
        patient_involved: req.patient_involved,
    };
    let incident: Incident = session.db.from("incidents").insert(&row).await?;

    tracing::info!(
        incident_id = %incident.id,
        severity = incident.severity.as_str(),
        "incident reported"
    );
    AuditLog::record(
        &session.db,
        session.user_id(),
        "incident.create",
        "incident",
        Some(incident.id.to_string()),
        json!({
            "department_id": incident.department_id,
            "severity": incident.severity,
            "patient_involved": incident.patient_involved,
        }),
    )
    .await;

    Ok(incident)
}

pub async fn list_incidents(
    session: &Session,
    filters: &IncidentFilters,
    pagination: Pagination,
) -> Result<Page<Incident>, ServiceError> {
    let mut query = session.db.from("incidents").select("*");

    if !session.access.is_org_wide() {
        let headed = session.access.headed_department_ids();
        query = if headed.is_empty() {
            query.eq("reporter_id", session.user_id())
        } else {
            query.or(format!(
                "reporter_id.eq.{},{}",
                session.user_id(),
                in_filter("department_id", headed)
            ))
        };
    }

    if let Some(status) = filters.status {
        query = query.eq("status", status.as_str());
    }
    if let Some(severity) = filters.severity {
        query = query.eq("severity", severity.as_str());
    }
    if let Some(department_id) = filters.department_id {
        query = query.eq("department_id", department_id);
    }

    Ok(pagination
        .apply(query.order("occurred_at", false))
        .fetch_page()
        .await?)
}

pub async fn get_incident(session: &Session, incident_id: Uuid) -> Result<Incident, ServiceError> {
    let incident: Incident = session
        .db
        .from("incidents")
        .select("*")
        .eq("id", incident_id)
        .fetch_one()
        .await?;

    let visible = session.access.is_org_wide()
        || incident.reporter_id == session.user_id()
        || session.access.heads(incident.department_id);
    if !visible {
        return Err(ServiceError::forbidden(
            "incident is only visible to its reporter and department heads",
        ));
    }
    Ok(incident)
}

pub async fn update_status(
    session: &Session,
    incident_id: Uuid,
    req: UpdateIncidentStatusRequest,
) -> Result<Incident, ServiceError> {
    let existing = get_incident(session, incident_id).await?;
    session.access.require_manage(existing.department_id)?;

    if !existing.status.can_transition_to(req.status) {
        return Err(ServiceError::bad_request(format!(
            "status: cannot move an incident from {} to {}",
            existing.status.as_str(),
            req.status.as_str()
        )));
    }

    let patch = StatusPatch {
        status: req.status,
        reviewed_by: session.user_id(),
        resolution_notes: req
            .resolution_notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty()),
        updated_at: Utc::now(),
    };
    let incident: Incident = session
        .db
        .from("incidents")
        .eq("id", incident_id)
        .update(&patch)
        .await?;

    tracing::info!(
        incident_id = %incident_id,
        from = existing.status.as_str(),
        to = req.status.as_str(),
        "incident status changed"
    );
    AuditLog::record(
        &session.db,
        session.user_id(),
        "incident.status_change",
        "incident",
        Some(incident_id.to_string()),
        json!({ "from": existing.status, "to": req.status }),
    )
    .await;

    Ok(incident)
}

pub async fn upload_file(
    session: &Session,
    config: &AppConfig,
    incident_id: Uuid,
    multipart: Multipart,
) -> Result<IncidentFile, ServiceError> {
    let incident = get_incident(session, incident_id).await?;
    let allowed = incident.reporter_id == session.user_id()
        || session.access.can_manage(incident.department_id);
    if !allowed {
        return Err(ServiceError::forbidden(
            "only the reporter or a department head may attach files",
        ));
    }

    let mut form = MultipartForm::read(multipart).await?;
    let file = form.take_file()?;
    file.validate(&config.storage)?;

    let bucket = session.db.storage(&config.storage.incidents_bucket);
    let path = uploads::object_path(&format!("incidents/{incident_id}"), &file.file_name);
    let row = NewIncidentFile {
        incident_id,
        storage_path: &path,
        file_name: &file.file_name,
        mime_type: &file.content_type,
        size_bytes: file.size(),
        uploaded_by: session.user_id(),
    };

    let stored: IncidentFile = uploads::store_then_insert(&bucket, &path, &file, || {
        session.db.from("incident_files").insert(&row)
    })
    .await?;

    AuditLog::record(
        &session.db,
        session.user_id(),
        "incident.file_upload",
        "incident",
        Some(incident_id.to_string()),
        json!({ "file_id": stored.id, "file_name": stored.file_name }),
    )
    .await;

    Ok(stored)
}

pub async fn list_files(
    session: &Session,
    incident_id: Uuid,
) -> Result<Vec<IncidentFile>, ServiceError> {
    get_incident(session, incident_id).await?;

    Ok(session
        .db
        .from("incident_files")
        .select("*")
        .eq("incident_id", incident_id)
        .order("created_at", true)
        .fetch()
        .await?)
}

pub async fn download_file(
    session: &Session,
    config: &AppConfig,
    incident_id: Uuid,
    file_id: Uuid,
) -> Result<Download, ServiceError> {
    get_incident(session, incident_id).await?;

    let file: IncidentFile = session
        .db
        .from("incident_files")
        .select("*")
        .eq("id", file_id)
        .eq("incident_id", incident_id)
        .fetch_one()
        .await?;

    let data = session
        .db
        .storage(&config.storage.incidents_bucket)
        .download(&file.storage_path)
        .await?;
    let data =
        watermark::prepare_download(data, &file.mime_type, &config.watermark, session.email());

    AuditLog::record(
        &session.db,
        session.user_id(),
        "incident.file_download",
        "incident",
        Some(incident_id.to_string()),
        json!({ "file_id": file_id }),
    )
    .await;

    Ok(Download {
        data,
        content_type: file.mime_type,
        file_name: file.file_name,
    })
}
