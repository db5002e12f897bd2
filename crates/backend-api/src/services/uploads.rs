//! Multipart parsing and object storage plumbing shared by documents,
//! announcement memos and incident files.

use std::collections::HashMap;
use std::future::Future;

use axum::{
    body::Body,
    extract::Multipart,
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue,
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;
use wardline_config::StorageConfig;
use wardline_supabase::{StorageBucket, SupabaseError};

use crate::services::ServiceError;
use crate::validation::Validator;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> i64 {
        self.data.len() as i64
    }

    pub fn validate(&self, config: &StorageConfig) -> Result<(), ServiceError> {
        Validator::file_name(&self.file_name)?;
        Validator::file_size(self.data.len(), config.max_upload_bytes)?;
        Validator::mime_type(&self.content_type, &config.allowed_mime_types)?;
        Ok(())
    }
}

/// A stored object ready to be streamed back to the caller.
pub struct Download {
    pub data: Bytes,
    pub content_type: String,
    pub file_name: String,
}

impl IntoResponse for Download {
    fn into_response(self) -> Response {
        file_response(self.data, &self.content_type, &self.file_name)
    }
}

#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    file: Option<UploadedFile>,
}

impl MultipartForm {
    /// Collect text fields and the part named `file`.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ServiceError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServiceError::bad_request(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == "file" {
                let file_name = field.file_name().unwrap_or_default().trim().to_string();
                let declared = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::bad_request(e.body_text()))?;
                let content_type = resolve_content_type(declared.as_deref(), &file_name);
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    data,
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServiceError::bad_request(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Trimmed value of a text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn required_text(&self, name: &str) -> Result<&str, ServiceError> {
        self.text(name)
            .ok_or_else(|| ServiceError::bad_request(format!("{name}: must not be empty")))
    }

    pub fn uuid(&self, name: &str) -> Result<Option<Uuid>, ServiceError> {
        self.text(name)
            .map(|value| {
                Uuid::parse_str(value)
                    .map_err(|_| ServiceError::bad_request(format!("{name}: must be a UUID")))
            })
            .transpose()
    }

    pub fn take_file(&mut self) -> Result<UploadedFile, ServiceError> {
        self.file
            .take()
            .ok_or_else(|| ServiceError::bad_request("file: a file part is required"))
    }
}

/// Browsers frequently send `application/octet-stream`; fall back to the
/// extension in that case.
fn resolve_content_type(declared: Option<&str>, file_name: &str) -> String {
    match declared {
        Some(value) if !value.is_empty() && value != "application/octet-stream" => {
            value.split(';').next().unwrap_or(value).trim().to_string()
        }
        _ => guess_content_type(file_name).to_string(),
    }
}

fn guess_content_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// `<prefix>/<uuid>-<sanitised name>`, unique per upload.
pub fn object_path(prefix: &str, file_name: &str) -> String {
    let sanitised: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{prefix}/{}-{sanitised}", Uuid::new_v4())
}

/// Upload first, then run `insert`. If the insert fails the new object is
/// removed again before the error is returned.
pub async fn store_then_insert<T, F, Fut>(
    bucket: &StorageBucket,
    path: &str,
    file: &UploadedFile,
    insert: F,
) -> Result<T, ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, SupabaseError>>,
{
    bucket
        .upload(path, &file.content_type, file.data.clone())
        .await?;

    match insert().await {
        Ok(row) => Ok(row),
        Err(error) => {
            remove_quietly(bucket, path).await;
            Err(error.into())
        }
    }
}

pub async fn remove_quietly(bucket: &StorageBucket, path: &str) {
    if let Err(error) = bucket.remove(&[path.to_string()]).await {
        warn!(
            bucket = bucket.bucket(),
            path,
            error = %error,
            "failed to remove stored object"
        );
    }
}

pub fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

pub fn file_response(data: Bytes, content_type: &str, file_name: &str) -> Response {
    let mut response = Body::from(data).into_response();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(value) = HeaderValue::from_str(&content_disposition(file_name)) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_is_prefixed_and_sanitised() {
        let path = object_path("departments/abc", "Q3 report (final).pdf");
        assert!(path.starts_with("departments/abc/"));
        assert!(path.ends_with("-Q3_report__final_.pdf"));
    }

    #[test]
    fn octet_stream_falls_back_to_extension() {
        assert_eq!(
            resolve_content_type(Some("application/octet-stream"), "memo.PDF"),
            "application/pdf"
        );
        assert_eq!(resolve_content_type(None, "census.csv"), "text/csv");
        assert_eq!(
            resolve_content_type(Some("text/plain; charset=utf-8"), "notes.txt"),
            "text/plain"
        );
    }

    #[test]
    fn content_disposition_escapes_quotes() {
        assert_eq!(
            content_disposition("say \"hi\".pdf"),
            "attachment; filename=\"say _hi_.pdf\""
        );
    }

    #[test]
    fn uploaded_file_validation_uses_storage_limits() {
        let config = StorageConfig {
            max_upload_bytes: 4,
            ..StorageConfig::default()
        };
        let file = UploadedFile {
            file_name: "a.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: Bytes::from_static(b"%PDF-1.7"),
        };
        assert!(matches!(
            file.validate(&config),
            Err(ServiceError::BadRequest(_))
        ));

        let zip = UploadedFile {
            file_name: "a.zip".to_string(),
            content_type: "application/zip".to_string(),
            data: Bytes::from_static(b"PK"),
        };
        assert!(zip.validate(&StorageConfig::default()).is_err());
    }
}
