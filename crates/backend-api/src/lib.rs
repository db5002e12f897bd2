mod docs;
mod error;
mod state;
mod util;

pub mod pagination;
pub mod routes;
pub mod services;
pub mod validation;

pub use docs::ApiDoc;
pub use error::{ApiError, ErrorResponse};
pub use state::{AppState, Session};

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{delete, get, patch, post},
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use wardline_config::HttpConfig;

/// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config()
        .storage
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);
    let cors = cors_layer(&state.config().http);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/openapi.json", get(openapi_json))
        // Profiles
        .route(
            "/api/me",
            get(routes::profiles::get_me).patch(routes::profiles::update_me),
        )
        .route("/api/profiles", get(routes::profiles::list_profiles))
        .route(
            "/api/profiles/:profile_id",
            patch(routes::profiles::update_profile),
        )
        // Departments
        .route(
            "/api/departments",
            get(routes::departments::list_departments).post(routes::departments::create_department),
        )
        .route(
            "/api/departments/:department_id",
            get(routes::departments::get_department)
                .patch(routes::departments::update_department),
        )
        .route(
            "/api/departments/:department_id/members",
            get(routes::departments::list_members).post(routes::departments::add_member),
        )
        .route(
            "/api/departments/:department_id/members/:user_id",
            delete(routes::departments::remove_member),
        )
        // Announcements
        .route(
            "/api/announcements",
            get(routes::announcements::list_announcements)
                .post(routes::announcements::create_announcement),
        )
        .route(
            "/api/announcements/:announcement_id",
            get(routes::announcements::get_announcement)
                .patch(routes::announcements::update_announcement)
                .delete(routes::announcements::delete_announcement),
        )
        .route(
            "/api/announcements/:announcement_id/memo",
            get(routes::announcements::download_memo).post(routes::announcements::upload_memo),
        )
        // Documents
        .route(
            "/api/documents",
            get(routes::documents::list_documents).post(routes::documents::upload_document),
        )
        .route(
            "/api/documents/:document_id",
            get(routes::documents::get_document).delete(routes::documents::delete_document),
        )
        .route(
            "/api/documents/:document_id/download",
            get(routes::documents::download_document),
        )
        // Incidents
        .route(
            "/api/incidents",
            get(routes::incidents::list_incidents).post(routes::incidents::create_incident),
        )
        .route(
            "/api/incidents/:incident_id",
            get(routes::incidents::get_incident),
        )
        .route(
            "/api/incidents/:incident_id/status",
            patch(routes::incidents::update_status),
        )
        .route(
            "/api/incidents/:incident_id/files",
            get(routes::incidents::list_files).post(routes::incidents::upload_file),
        )
        .route(
            "/api/incidents/:incident_id/files/:file_id",
            get(routes::incidents::download_file),
        )
        // Metrics
        .route(
            "/api/metrics/daily",
            get(routes::metrics::list_daily).post(routes::metrics::upsert_daily),
        )
        .route(
            "/api/metrics/transactions",
            get(routes::metrics::list_transactions).post(routes::metrics::create_transaction),
        )
        .route("/api/metrics/summary", get(routes::metrics::summary))
        // Messaging
        .route(
            "/api/messages/threads",
            get(routes::messaging::list_threads).post(routes::messaging::create_thread),
        )
        .route(
            "/api/messages/threads/:thread_id",
            get(routes::messaging::get_thread),
        )
        .route(
            "/api/messages/threads/:thread_id/messages",
            post(routes::messaging::send_message),
        )
        .route(
            "/api/messages/threads/:thread_id/read",
            post(routes::messaging::mark_read),
        )
        // Audit
        .route("/api/audit-logs", get(routes::audit::list_audit_logs))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(http: &HttpConfig) -> CorsLayer {
    let origins = util::cors_origins(&http.cors_allowed_origins);
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
