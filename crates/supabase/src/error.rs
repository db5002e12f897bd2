use serde::Deserialize;
use thiserror::Error;

/// PostgREST code for an RLS or privilege rejection raised by Postgres.
pub const PERMISSION_DENIED: &str = "42501";
/// PostgREST code for a singular request that matched zero (or many) rows.
pub const NO_ROWS: &str = "PGRST116";
/// PostgREST code for an offset beyond the last row.
pub const RANGE_NOT_SATISFIABLE: &str = "PGRST103";

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("invalid supabase configuration: {0}")]
    Config(String),
    #[error("supabase auth rejected the request ({status}): {message}")]
    Auth { status: u16, message: String },
    #[error("postgrest request failed ({status}): {message}")]
    Postgrest {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<String>,
        hint: Option<String>,
    },
    #[error("storage request failed ({status}): {message}")]
    Storage { status: u16, message: String },
    #[error("supabase http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid supabase response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SupabaseError {
    /// Postgres / PostgREST error code, when the failure carried one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Postgrest { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. }
            | Self::Postgrest { status, .. }
            | Self::Storage { status, .. } => Some(*status),
            Self::Http(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        self.code() == Some(PERMISSION_DENIED)
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Postgrest { code, .. } => code.as_deref() == Some(NO_ROWS),
            Self::Storage { status, .. } => *status == 404,
            _ => false,
        }
    }
}

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PostgrestErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Error body returned by GoTrue and the storage API. Both services have
/// used several field names over time.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServiceErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    /// Storage reports the real status here, as a string or a number,
    /// while answering 400 on the wire.
    #[serde(default, rename = "statusCode")]
    pub status_code: Option<serde_json::Value>,
}

impl ServiceErrorBody {
    pub(crate) fn reported_status(&self) -> Option<u16> {
        match self.status_code.as_ref()? {
            serde_json::Value::String(code) => code.trim().parse().ok(),
            serde_json::Value::Number(code) => {
                code.as_u64().and_then(|code| u16::try_from(code).ok())
            }
            _ => None,
        }
    }

    pub(crate) fn into_message(self, fallback: &str) -> String {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| fallback.to_string())
    }
}

pub(crate) fn postgrest_error(status: u16, body: &str) -> SupabaseError {
    let parsed: PostgrestErrorBody = serde_json::from_str(body).unwrap_or_default();
    SupabaseError::Postgrest {
        status,
        code: parsed.code,
        message: parsed
            .message
            .unwrap_or_else(|| fallback_message(status, body)),
        details: parsed.details,
        hint: parsed.hint,
    }
}

pub(crate) fn auth_error(status: u16, body: &str) -> SupabaseError {
    let parsed: ServiceErrorBody = serde_json::from_str(body).unwrap_or_default();
    SupabaseError::Auth {
        status,
        message: parsed.into_message(&fallback_message(status, body)),
    }
}

pub(crate) fn storage_error(status: u16, body: &str) -> SupabaseError {
    let parsed: ServiceErrorBody = serde_json::from_str(body).unwrap_or_default();
    let status = parsed
        .reported_status()
        .filter(|reported| (400..600).contains(reported))
        .unwrap_or(status);
    SupabaseError::Storage {
        status,
        message: parsed.into_message(&fallback_message(status, body)),
    }
}

fn fallback_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("http status {status}")
    } else {
        trimmed.chars().take(200).collect()
    }
}
