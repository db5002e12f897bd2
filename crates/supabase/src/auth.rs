use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::{error::auth_error, SupabaseClient, SupabaseError};

/// The subset of the GoTrue user object the portal relies on.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl SupabaseClient {
    /// Resolve the user that owns `access_token`. Any rejection from GoTrue
    /// (expired, malformed, revoked) comes back as [`SupabaseError::Auth`].
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, SupabaseError> {
        let response = self
            .http()
            .get(self.endpoint("auth/v1/user"))
            .header("apikey", self.anon_key())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "supabase auth rejected access token");
            return Err(auth_error(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    pub async fn health(&self) -> Result<(), SupabaseError> {
        let response = self
            .http()
            .get(self.endpoint("auth/v1/health"))
            .header("apikey", self.anon_key())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(auth_error(status.as_u16(), &body))
        }
    }
}
