//! Request validation.
//!
//! Payloads are deserialized with serde and then checked by their
//! [`Validate`] implementation. [`ValidJson`] runs both steps and turns any
//! failure into a 400 response.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::ApiError;

static DEPARTMENT_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{2,10}$").expect("department code pattern is valid"));

/// Upper bound of a Postgres `integer` column.
pub const MAX_COUNT: i64 = i32::MAX as i64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// JSON body extractor that rejects malformed or invalid payloads with 400.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

pub struct Validator;

impl Validator {
    /// Non-blank text of at most `max` characters.
    pub fn required_text(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "must not be empty"));
        }
        Self::max_length(field, value, max)
    }

    pub fn optional_text(
        field: &str,
        value: Option<&str>,
        max: usize,
    ) -> Result<(), ValidationError> {
        match value {
            Some(value) => Self::max_length(field, value, max),
            None => Ok(()),
        }
    }

    fn max_length(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
        if value.chars().count() > max {
            return Err(ValidationError::new(
                field,
                format!("must be at most {max} characters"),
            ));
        }
        Ok(())
    }

    /// Count stored in an `integer` column.
    pub fn non_negative(field: &str, value: i64) -> Result<(), ValidationError> {
        if value < 0 {
            return Err(ValidationError::new(field, "must not be negative"));
        }
        if value > MAX_COUNT {
            return Err(ValidationError::new(
                field,
                format!("must be at most {MAX_COUNT}"),
            ));
        }
        Ok(())
    }

    /// Finite, non-negative monetary amount.
    pub fn amount(field: &str, value: f64) -> Result<(), ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::new(field, "must be a finite number"));
        }
        if value < 0.0 {
            return Err(ValidationError::new(field, "must not be negative"));
        }
        Ok(())
    }

    pub fn not_future_date(field: &str, date: NaiveDate) -> Result<(), ValidationError> {
        if date > Utc::now().date_naive() {
            return Err(ValidationError::new(field, "must not be in the future"));
        }
        Ok(())
    }

    /// Timestamps may run ahead of the server clock by `skew`.
    pub fn not_future_instant(
        field: &str,
        at: DateTime<Utc>,
        skew: Duration,
    ) -> Result<(), ValidationError> {
        if at > Utc::now() + skew {
            return Err(ValidationError::new(field, "must not be in the future"));
        }
        Ok(())
    }

    pub fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), ValidationError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ValidationError::new("from", "must not be after `to`"));
            }
        }
        Ok(())
    }

    pub fn department_code(code: &str) -> Result<(), ValidationError> {
        if !DEPARTMENT_CODE.is_match(code) {
            return Err(ValidationError::new(
                "code",
                "must be 2-10 uppercase letters or digits",
            ));
        }
        Ok(())
    }

    pub fn file_name(file_name: &str) -> Result<(), ValidationError> {
        Self::required_text("file", file_name, 255)?;

        let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
        if let Some(found) = file_name.chars().find(|c| invalid_chars.contains(c)) {
            return Err(ValidationError::new(
                "file",
                format!("file name contains invalid character: {found}"),
            ));
        }
        Ok(())
    }

    pub fn file_size(size_bytes: usize, max_size_bytes: u64) -> Result<(), ValidationError> {
        if size_bytes == 0 {
            return Err(ValidationError::new("file", "must not be empty"));
        }
        if size_bytes as u64 > max_size_bytes {
            return Err(ValidationError::new(
                "file",
                format!("exceeds the {} MB upload limit", max_size_bytes / (1024 * 1024)),
            ));
        }
        Ok(())
    }

    pub fn mime_type(mime_type: &str, allowed: &[String]) -> Result<(), ValidationError> {
        if !allowed.iter().any(|candidate| candidate == mime_type) {
            return Err(ValidationError::new(
                "file",
                format!("file type {mime_type} is not allowed"),
            ));
        }
        Ok(())
    }

    pub fn id_list(field: &str, ids: &[Uuid], min: usize, max: usize) -> Result<(), ValidationError> {
        if ids.len() < min {
            return Err(ValidationError::new(
                field,
                format!("must contain at least {min} entries"),
            ));
        }
        if ids.len() > max {
            return Err(ValidationError::new(
                field,
                format!("must contain at most {max} entries"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_rejects_blank_and_long_values() {
        assert!(Validator::required_text("title", "Ward round", 20).is_ok());
        assert_eq!(
            Validator::required_text("title", "   ", 20),
            Err(ValidationError::new("title", "must not be empty"))
        );
        let error = Validator::required_text("title", &"x".repeat(21), 20).unwrap_err();
        assert_eq!(error.message, "must be at most 20 characters");
    }

    #[test]
    fn amount_rejects_nan_and_negative() {
        assert!(Validator::amount("revenue", 0.0).is_ok());
        assert!(Validator::amount("revenue", 1250.5).is_ok());
        assert!(Validator::amount("revenue", f64::NAN).is_err());
        assert!(Validator::amount("revenue", f64::INFINITY).is_err());
        assert!(Validator::amount("revenue", -1.0).is_err());
    }

    #[test]
    fn counts_are_bounded_by_integer_column() {
        assert!(Validator::non_negative("admissions", 0).is_ok());
        assert!(Validator::non_negative("admissions", MAX_COUNT).is_ok());
        assert!(Validator::non_negative("admissions", -1).is_err());
        let error = Validator::non_negative("admissions", MAX_COUNT + 1).unwrap_err();
        assert_eq!(error.message, "must be at most 2147483647");
    }

    #[test]
    fn future_dates_are_rejected() {
        let tomorrow = Utc::now().date_naive() + Duration::days(2);
        assert!(Validator::not_future_date("metric_date", tomorrow).is_err());
        assert!(Validator::not_future_date("metric_date", Utc::now().date_naive()).is_ok());
    }

    #[test]
    fn future_instants_allow_small_skew() {
        let skew = Duration::minutes(5);
        assert!(Validator::not_future_instant("occurred_at", Utc::now() + Duration::minutes(1), skew).is_ok());
        assert!(Validator::not_future_instant("occurred_at", Utc::now() + Duration::hours(1), skew).is_err());
    }

    #[test]
    fn department_code_format() {
        assert!(Validator::department_code("ER").is_ok());
        assert!(Validator::department_code("ICU2").is_ok());
        assert!(Validator::department_code("e").is_err());
        assert!(Validator::department_code("er").is_err());
        assert!(Validator::department_code("TOOLONGCODE1").is_err());
    }

    #[test]
    fn file_name_rejects_path_separators() {
        assert!(Validator::file_name("policy.pdf").is_ok());
        assert!(Validator::file_name("../etc/passwd").is_err());
        assert!(Validator::file_name("").is_err());
    }

    #[test]
    fn file_size_enforces_limit() {
        assert!(Validator::file_size(10, 1024).is_ok());
        assert!(Validator::file_size(0, 1024).is_err());
        assert!(Validator::file_size(2048, 1024).is_err());
    }

    #[test]
    fn date_range_requires_ordered_bounds() {
        let early = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let late = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(Validator::date_range(Some(early), Some(late)).is_ok());
        assert!(Validator::date_range(Some(late), Some(early)).is_err());
        assert!(Validator::date_range(None, Some(early)).is_ok());
    }
}
