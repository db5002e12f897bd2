use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "wardline.toml",
    "config/wardline.toml",
    "crates/config/wardline.toml",
    "../wardline.toml",
    "../config/wardline.toml",
];

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub supabase: SupabaseConfig,
    pub storage: StorageConfig,
    pub pagination: PaginationConfig,
    pub watermark: WatermarkConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
    /// Origins allowed by CORS. Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Connection settings for the hosted Supabase project.
///
/// ```
/// use wardline_config::SupabaseConfig;
///
/// let supabase = SupabaseConfig::default();
/// assert_eq!(supabase.url, "http://127.0.0.1:54321");
/// assert_eq!(supabase.request_timeout_seconds, 15);
/// assert!(supabase.anon_key.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub request_timeout_seconds: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:54321".to_string(),
            anon_key: String::new(),
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub documents_bucket: String,
    pub memos_bucket: String,
    pub incidents_bucket: String,
    pub max_upload_bytes: u64,
    pub allowed_mime_types: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            documents_bucket: "documents".to_string(),
            memos_bucket: "memos".to_string(),
            incidents_bucket: "incident-files".to_string(),
            max_upload_bytes: 25 * MIB,
            allowed_mime_types: [
                "application/pdf",
                "image/png",
                "image/jpeg",
                "text/plain",
                "text/csv",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ]
            .iter()
            .map(|mime| mime.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub enabled: bool,
    pub label: String,
    pub font_size: u32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            label: "CONFIDENTIAL".to_string(),
            font_size: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub format: LogFormat,
}

impl AppConfig {
    /// Copy of the configuration that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.supabase.anon_key.is_empty() {
            copy.supabase.anon_key = "<redacted>".to_string();
        }
        copy
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use wardline_config::load;
///
/// std::env::remove_var("WARDLINE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = config::Config::try_from(&AppConfig::default())
        .context("unable to build default configuration")?;

    let mut builder = config::Config::builder().add_source(defaults);

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("WARDLINE_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via WARDLINE_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WARDLINE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("http.cors_allowed_origins")
            .with_list_parse_key("storage.allowed_mime_types"),
    );

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.pagination.max_page_size == 0 {
        config.pagination.max_page_size = PaginationConfig::default().max_page_size;
    }
    if config.pagination.default_page_size == 0
        || config.pagination.default_page_size > config.pagination.max_page_size
    {
        config.pagination.default_page_size = config
            .pagination
            .max_page_size
            .min(PaginationConfig::default().default_page_size);
    }

    debug!(config = ?config.redacted(), "loaded backend configuration");
    Ok(config)
}
