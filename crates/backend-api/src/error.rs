use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;
use wardline_supabase::SupabaseError;

use crate::validation::ValidationError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::bad_request(error.to_string())
    }
}

impl From<SupabaseError> for ApiError {
    fn from(error: SupabaseError) -> Self {
        if let SupabaseError::Auth { status, message } = &error {
            warn!(status, message = %message, "access token rejected");
            return Self::unauthorized("invalid or expired access token");
        }
        if error.status() == Some(401) {
            warn!(error = %error, "supabase rejected credentials");
            return Self::unauthorized("invalid or expired access token");
        }
        if error.is_permission_denied() {
            warn!(error = %error, "row-level security denied request");
            return Self::forbidden("permission denied");
        }
        if error.is_not_found() {
            return Self::not_found("resource not found");
        }
        if matches!(error, SupabaseError::Storage { status: 403, .. }) {
            warn!(error = %error, "storage policy denied request");
            return Self::forbidden("permission denied");
        }

        error!(error = ?error, "supabase error");
        Self::internal_server_error("internal server error")
    }
}
