use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use wardline_backend_api::AppState;
use wardline_config::AppConfig;
use wardline_supabase::SupabaseClient;

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::EnvFilter;
    use wardline_config::{LogFormat, TelemetryConfig};

    pub fn init_tracing(config: &TelemetryConfig) -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
        let installed = match config.format {
            LogFormat::Pretty => builder.try_init(),
            LogFormat::Json => builder.json().with_current_span(false).try_init(),
        };

        installed.map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub supabase: SupabaseClient,
    pub config: Arc<AppConfig>,
    /// Whether the Supabase auth service answered its health probe at startup.
    pub supabase_reachable: bool,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let supabase =
            SupabaseClient::new(&config.supabase).context("failed to build supabase client")?;

        // The portal can still start while Supabase is down; requests will
        // fail individually until it comes back.
        let supabase_reachable = match supabase.health().await {
            Ok(()) => {
                info!(url = supabase.base_url(), "supabase reachable");
                true
            }
            Err(error) => {
                warn!(
                    url = supabase.base_url(),
                    error = %error,
                    "supabase health probe failed, proceeding anyway"
                );
                false
            }
        };

        Ok(Self {
            supabase,
            config: Arc::new(config.clone()),
            supabase_reachable,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.supabase.clone(), self.config.clone())
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
