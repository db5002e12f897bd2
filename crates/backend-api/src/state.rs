use std::sync::Arc;

use tracing::warn;
use wardline_config::AppConfig;
use wardline_supabase::{AuthUser, SupabaseClient, UserClient};

use crate::routes::models::Profile;
use crate::services::access::{Access, Membership};
use crate::ApiError;

#[derive(Clone)]
pub struct AppState {
    supabase: SupabaseClient,
    config: Arc<AppConfig>,
}

/// An authenticated caller: the Supabase user, their portal profile, the
/// derived role rules, and a database client that runs as them.
pub struct Session {
    pub user: AuthUser,
    pub profile: Profile,
    pub access: Access,
    pub db: UserClient,
}

impl Session {
    pub fn user_id(&self) -> uuid::Uuid {
        self.user.id
    }

    /// Address stamped on watermarked downloads.
    pub fn email(&self) -> &str {
        self.user
            .email
            .as_deref()
            .or(self.profile.email.as_deref())
            .unwrap_or("unknown user")
    }
}

impl AppState {
    pub fn new(supabase: SupabaseClient, config: Arc<AppConfig>) -> Self {
        Self { supabase, config }
    }

    pub fn supabase(&self) -> &SupabaseClient {
        &self.supabase
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn authenticate(&self, token: &str) -> Result<Session, ApiError> {
        let user = self.supabase.get_user(token).await?;
        let db = self.supabase.for_user(token);

        let profile: Option<Profile> = db
            .from("profiles")
            .select("*")
            .eq("id", user.id)
            .fetch_optional()
            .await?;
        let Some(profile) = profile else {
            warn!(user_id = %user.id, "authenticated user has no profile");
            return Err(ApiError::forbidden("profile not provisioned"));
        };
        if !profile.is_active {
            return Err(ApiError::forbidden("account disabled"));
        }

        let memberships: Vec<Membership> = db
            .from("department_memberships")
            .select("department_id,membership_role")
            .eq("user_id", user.id)
            .fetch()
            .await?;

        let access = Access::new(profile.role, memberships);
        Ok(Session {
            user,
            profile,
            access,
            db,
        })
    }
}
