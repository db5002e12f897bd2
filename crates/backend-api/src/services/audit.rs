use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use utoipa::IntoParams;
use uuid::Uuid;
use wardline_supabase::{Page, UserClient};

use crate::pagination::Pagination;
use crate::routes::models::AuditLogEntry;
use crate::services::ServiceError;

#[derive(Debug, Serialize)]
struct NewAuditLog<'a> {
    actor_id: Uuid,
    action: &'a str,
    entity_type: &'a str,
    entity_id: Option<String>,
    metadata: Value,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
}

pub struct AuditLog;

impl AuditLog {
    /// Append an audit entry. Failures are logged and swallowed so a broken
    /// audit table never fails the request that triggered it.
    pub async fn record(
        db: &UserClient,
        actor: Uuid,
        action: &str,
        entity_type: &str,
        entity_id: Option<String>,
        metadata: Value,
    ) {
        let entry = NewAuditLog {
            actor_id: actor,
            action,
            entity_type,
            entity_id,
            metadata,
        };

        if let Err(error) = db.from("audit_logs").insert_only(&entry).await {
            warn!(
                action,
                entity_type,
                error = %error,
                "failed to write audit log entry"
            );
        }
    }

    pub async fn list(
        db: &UserClient,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<Page<AuditLogEntry>, ServiceError> {
        let mut query = db.from("audit_logs").select("*");
        if let Some(entity_type) = &filter.entity_type {
            query = query.eq("entity_type", entity_type);
        }
        if let Some(actor_id) = filter.actor_id {
            query = query.eq("actor_id", actor_id);
        }
        if let Some(action) = &filter.action {
            query = query.eq("action", action);
        }

        let page = pagination
            .apply(query.order("created_at", false))
            .fetch_page()
            .await?;
        Ok(page)
    }
}
