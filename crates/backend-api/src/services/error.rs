use wardline_supabase::SupabaseError;

use crate::validation::ValidationError;

#[derive(Debug)]
pub enum ServiceError {
    NotFound(String),
    Forbidden(String),
    BadRequest(String),
    Supabase(SupabaseError),
}

impl ServiceError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl From<ServiceError> for crate::ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => crate::ApiError::not_found(msg),
            ServiceError::Forbidden(msg) => crate::ApiError::forbidden(msg),
            ServiceError::BadRequest(msg) => crate::ApiError::bad_request(msg),
            ServiceError::Supabase(err) => crate::ApiError::from(err),
        }
    }
}

impl From<SupabaseError> for ServiceError {
    fn from(err: SupabaseError) -> Self {
        Self::Supabase(err)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::ApiError;

    #[test]
    fn service_errors_map_to_status_codes() {
        assert_eq!(
            ApiError::from(ServiceError::not_found("incident not found")).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ServiceError::forbidden("nope")).status,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(ServiceError::from(ValidationError::new("title", "must not be empty")))
                .status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn unexpected_supabase_errors_hide_details() {
        let error = ApiError::from(ServiceError::from(SupabaseError::Storage {
            status: 500,
            message: "storage backend unavailable".to_string(),
        }));
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message, "internal server error");
    }
}
