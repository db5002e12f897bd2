use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::warn;

use crate::ApiError;

/// Pull the Supabase access token out of `Authorization: Bearer <jwt>`.
pub fn require_bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(ApiError::unauthorized("invalid authorization scheme"));
    }

    let token = parts.next().unwrap_or_default();
    if token.is_empty() {
        return Err(ApiError::unauthorized("missing bearer token"));
    }
    if parts.next().is_some() {
        return Err(ApiError::unauthorized("malformed authorization header"));
    }

    Ok(token.to_string())
}

/// Configured CORS origins as header values. Entries that are not valid
/// header values are skipped with a warning.
pub fn cors_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn with_authorization(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let token = require_bearer(&with_authorization("bearer eyJhbGciOi.jwt"))
            .expect("token should be extracted");
        assert_eq!(token, "eyJhbGciOi.jwt");
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let error = require_bearer(&HeaderMap::new()).expect_err("should reject");
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);
        assert!(error.message.contains("missing authorization header"));
    }

    #[test]
    fn basic_scheme_is_rejected() {
        let error = require_bearer(&with_authorization("Basic dXNlcjpwYXNz"))
            .expect_err("should reject basic auth");
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn empty_or_split_tokens_are_rejected() {
        let error = require_bearer(&with_authorization("Bearer")).expect_err("no token");
        assert!(error.message.contains("missing bearer token"));

        let error = require_bearer(&with_authorization("Bearer abc def")).expect_err("two tokens");
        assert!(error.message.contains("malformed"));
    }

    #[test]
    fn cors_origins_trim_and_skip_blanks() {
        let origins = cors_origins(&[
            "https://portal.example.org/".to_string(),
            "  ".to_string(),
            "http://localhost:5173".to_string(),
        ]);
        assert_eq!(
            origins,
            vec![
                HeaderValue::from_static("https://portal.example.org"),
                HeaderValue::from_static("http://localhost:5173"),
            ]
        );
    }
}
