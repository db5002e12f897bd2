//! Thin typed client over the Supabase services the portal treats as its
//! system of record: GoTrue (auth), PostgREST (tables guarded by RLS) and
//! object storage.
//!
//! Every table or storage call goes through a [`UserClient`], which forwards
//! the caller's access token so row-level security is evaluated for the
//! signed-in user rather than for the service.

mod auth;
mod error;
mod postgrest;
mod storage;

use std::{sync::Arc, time::Duration};

use reqwest::Client;
use wardline_config::SupabaseConfig;

pub use auth::AuthUser;
pub use error::{SupabaseError, NO_ROWS, PERMISSION_DENIED, RANGE_NOT_SATISFIABLE};
pub use postgrest::{in_filter, parse_content_range, Page, QueryBuilder};
pub use storage::StorageBucket;

#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: Arc<str>,
    anon_key: Arc<str>,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        let base_url = config.url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(SupabaseError::Config("supabase.url is empty".to_string()));
        }
        if config.anon_key.trim().is_empty() {
            return Err(SupabaseError::Config(
                "supabase.anon_key is empty".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()?;

        Ok(Self {
            http,
            base_url: Arc::from(base_url),
            anon_key: Arc::from(config.anon_key.trim()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Client whose requests run as the owner of `access_token`.
    pub fn for_user(&self, access_token: &str) -> UserClient {
        UserClient {
            inner: self.clone(),
            access_token: Arc::from(access_token),
        }
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub(crate) fn endpoint(&self, service_path: &str) -> String {
        format!("{}/{}", self.base_url, service_path.trim_start_matches('/'))
    }
}

#[derive(Clone)]
pub struct UserClient {
    inner: SupabaseClient,
    access_token: Arc<str>,
}

impl UserClient {
    /// Start a PostgREST query against `table`.
    pub fn from(&self, table: &str) -> QueryBuilder {
        QueryBuilder::new(
            self.inner.http().clone(),
            self.inner.endpoint(&format!("rest/v1/{table}")),
            self.inner.anon_key().to_string(),
            self.access_token.to_string(),
        )
    }

    pub fn storage(&self, bucket: &str) -> StorageBucket {
        StorageBucket::new(
            self.inner.clone(),
            bucket.to_string(),
            self.access_token.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str, key: &str) -> SupabaseConfig {
        SupabaseConfig {
            url: url.to_string(),
            anon_key: key.to_string(),
            request_timeout_seconds: 5,
        }
    }

    #[test]
    fn new_rejects_missing_url() {
        let error = SupabaseClient::new(&config("  ", "anon")).err().expect("should fail");
        assert!(matches!(error, SupabaseError::Config(_)));
    }

    #[test]
    fn new_rejects_missing_anon_key() {
        let error = SupabaseClient::new(&config("http://localhost:54321", ""))
            .err()
            .expect("should fail");
        assert!(error.to_string().contains("anon_key"));
    }

    #[test]
    fn endpoint_joins_without_duplicate_slashes() {
        let client = SupabaseClient::new(&config("http://localhost:54321/", "anon"))
            .expect("client should build");
        assert_eq!(client.base_url(), "http://localhost:54321");
        assert_eq!(
            client.endpoint("/rest/v1/profiles"),
            "http://localhost:54321/rest/v1/profiles"
        );
    }
}
