use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::profiles::get_me,
        crate::routes::profiles::update_me,
        crate::routes::profiles::list_profiles,
        crate::routes::profiles::update_profile,
        crate::routes::departments::list_departments,
        crate::routes::departments::get_department,
        crate::routes::departments::create_department,
        crate::routes::departments::update_department,
        crate::routes::departments::list_members,
        crate::routes::departments::add_member,
        crate::routes::departments::remove_member,
        crate::routes::announcements::list_announcements,
        crate::routes::announcements::create_announcement,
        crate::routes::announcements::get_announcement,
        crate::routes::announcements::update_announcement,
        crate::routes::announcements::delete_announcement,
        crate::routes::announcements::upload_memo,
        crate::routes::announcements::download_memo,
        crate::routes::documents::upload_document,
        crate::routes::documents::list_documents,
        crate::routes::documents::get_document,
        crate::routes::documents::download_document,
        crate::routes::documents::delete_document,
        crate::routes::incidents::create_incident,
        crate::routes::incidents::list_incidents,
        crate::routes::incidents::get_incident,
        crate::routes::incidents::update_status,
        crate::routes::incidents::upload_file,
        crate::routes::incidents::list_files,
        crate::routes::incidents::download_file,
        crate::routes::metrics::upsert_daily,
        crate::routes::metrics::list_daily,
        crate::routes::metrics::create_transaction,
        crate::routes::metrics::list_transactions,
        crate::routes::metrics::summary,
        crate::routes::messaging::list_threads,
        crate::routes::messaging::create_thread,
        crate::routes::messaging::get_thread,
        crate::routes::messaging::send_message,
        crate::routes::messaging::mark_read,
        crate::routes::audit::list_audit_logs
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::routes::health::HealthResponse,
            crate::routes::models::Role,
            crate::routes::models::MembershipRole,
            crate::routes::models::Priority,
            crate::routes::models::DocumentCategory,
            crate::routes::models::Severity,
            crate::routes::models::IncidentStatus,
            crate::routes::models::Profile,
            crate::routes::models::Department,
            crate::routes::models::DepartmentMembership,
            crate::routes::models::Announcement,
            crate::routes::models::Document,
            crate::routes::models::Incident,
            crate::routes::models::IncidentFile,
            crate::routes::models::MessageThread,
            crate::routes::models::ThreadParticipant,
            crate::routes::models::ThreadSummary,
            crate::routes::models::Message,
            crate::routes::models::DailyMetric,
            crate::routes::models::TransactionEntry,
            crate::routes::models::AuditLogEntry,
            crate::routes::models::UpdateMeRequest,
            crate::routes::models::UpdateProfileRequest,
            crate::routes::models::CreateDepartmentRequest,
            crate::routes::models::UpdateDepartmentRequest,
            crate::routes::models::AddMemberRequest,
            crate::routes::models::CreateAnnouncementRequest,
            crate::routes::models::UpdateAnnouncementRequest,
            crate::routes::models::CreateIncidentRequest,
            crate::routes::models::UpdateIncidentStatusRequest,
            crate::routes::models::DailyMetricRequest,
            crate::routes::models::TransactionRequest,
            crate::routes::models::CreateThreadRequest,
            crate::routes::models::SendMessageRequest,
            crate::routes::models::FileUploadForm,
            crate::routes::models::DocumentUploadForm,
            crate::routes::profiles::MeResponse,
            crate::routes::profiles::ProfileResponse,
            crate::routes::departments::DepartmentResponse,
            crate::routes::departments::MembersResponse,
            crate::routes::departments::MemberResponse,
            crate::routes::announcements::AnnouncementResponse,
            crate::routes::documents::DocumentResponse,
            crate::routes::incidents::IncidentResponse,
            crate::routes::incidents::IncidentFileResponse,
            crate::routes::incidents::IncidentFilesResponse,
            crate::routes::metrics::DailyMetricResponse,
            crate::routes::metrics::TransactionResponse,
            crate::routes::messaging::MessageResponse,
            crate::services::access::Membership,
            crate::services::metrics::CategoryTotal,
            crate::services::metrics::MonthSummary,
            crate::services::metrics::SummaryTotals,
            crate::services::metrics::SummaryScopeKind,
            crate::services::metrics::MetricsSummary,
            crate::services::messaging::CreatedThread,
            crate::services::messaging::ThreadDetail,
            crate::pagination::AnnouncementPage,
            crate::pagination::AuditLogPage,
            crate::pagination::DailyMetricPage,
            crate::pagination::DepartmentPage,
            crate::pagination::DocumentPage,
            crate::pagination::IncidentPage,
            crate::pagination::MessagePage,
            crate::pagination::ProfilePage,
            crate::pagination::ThreadPage,
            crate::pagination::TransactionPage
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Profiles", description = "Staff profiles and roles"),
        (name = "Departments", description = "Departments and memberships"),
        (name = "Announcements", description = "Hospital and department announcements with memos"),
        (name = "Documents", description = "Policy and reference document library"),
        (name = "Incidents", description = "SBAR incident reporting and review"),
        (name = "Metrics", description = "Daily operational figures and monthly summaries"),
        (name = "Messaging", description = "Direct message threads between staff"),
        (name = "Audit", description = "Administrative audit trail")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);

        let mut scheme = SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer));
        if let SecurityScheme::Http(http) = &mut scheme {
            http.bearer_format = Some("JWT".to_string());
            http.description = Some("Supabase access token".to_string());
        }

        components
            .security_schemes
            .insert("bearerAuth".to_string(), scheme);
    }
}
