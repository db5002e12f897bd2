//! Loader tests for `wardline-config`: defaults, file discovery, the
//! `WARDLINE__` environment layer, and post-load normalisation.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use wardline_config::{
    load, AppConfig, HttpConfig, LogFormat, PaginationConfig, StorageConfig, WatermarkConfig,
};

const MANAGED_VARS: &[&str] = &[
    "WARDLINE_CONFIG",
    "WARDLINE__HTTP__ADDRESS",
    "WARDLINE__HTTP__PORT",
    "WARDLINE__HTTP__CORS_ALLOWED_ORIGINS",
    "WARDLINE__SUPABASE__URL",
    "WARDLINE__SUPABASE__ANON_KEY",
    "WARDLINE__SUPABASE__REQUEST_TIMEOUT_SECONDS",
    "WARDLINE__STORAGE__MAX_UPLOAD_BYTES",
    "WARDLINE__PAGINATION__DEFAULT_PAGE_SIZE",
    "WARDLINE__PAGINATION__MAX_PAGE_SIZE",
    "WARDLINE__WATERMARK__ENABLED",
    "WARDLINE__TELEMETRY__FORMAT",
];

/// Scratch directory used as the working directory for one test. The
/// managed environment variables and the previous working directory are
/// restored on drop.
struct Workspace {
    dir: TempDir,
    saved_vars: Vec<(&'static str, Option<String>)>,
    saved_cwd: PathBuf,
}

impl Workspace {
    fn enter() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let saved_cwd = std::env::current_dir().expect("current dir");
        let saved_vars = MANAGED_VARS
            .iter()
            .map(|key| (*key, std::env::var(key).ok()))
            .collect();
        for key in MANAGED_VARS {
            std::env::remove_var(key);
        }
        std::env::set_current_dir(dir.path()).expect("enter temp dir");

        Self {
            dir,
            saved_vars,
            saved_cwd,
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn env(&self, key: &'static str, value: impl AsRef<str>) {
        assert!(MANAGED_VARS.contains(&key), "{key} is not restored on drop");
        std::env::set_var(key, value.as_ref());
    }

    fn file(&self, relative: &str, toml: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("config dir");
        }
        fs::write(&path, toml).expect("config file");
        path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.saved_cwd);
        for (key, value) in self.saved_vars.drain(..) {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
}

#[test]
#[serial]
fn empty_directory_yields_built_in_defaults() {
    let _ws = Workspace::enter();

    let config = load().expect("defaults load");
    let defaults = AppConfig::default();

    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.http.port, defaults.http.port);
    assert_eq!(config.supabase.url, defaults.supabase.url);
    assert_eq!(
        config.storage.allowed_mime_types,
        defaults.storage.allowed_mime_types
    );
    assert_eq!(config.pagination.max_page_size, 100);
    assert!(config.watermark.enabled);
    assert_eq!(config.telemetry.format, LogFormat::Pretty);
}

#[test]
#[serial]
fn root_wardline_toml_wins_over_config_directory() {
    let ws = Workspace::enter();
    ws.file("wardline.toml", "[http]\nport = 4242\n");
    ws.file("config/wardline.toml", "[http]\nport = 5151\n");

    let config = load().expect("load");
    assert_eq!(config.http.port, 4242);
}

#[test]
#[serial]
fn config_directory_is_used_when_root_file_is_absent() {
    let ws = Workspace::enter();
    ws.file("config/wardline.toml", "[http]\nport = 5151\n");

    let config = load().expect("load");
    assert_eq!(config.http.port, 5151);
}

#[test]
#[serial]
fn partial_file_keeps_remaining_defaults() {
    let ws = Workspace::enter();
    ws.file(
        "wardline.toml",
        r#"
        [supabase]
        url = "https://project.supabase.co"
        anon_key = "anon-key"

        [storage]
        documents_bucket = "policies"
        "#,
    );

    let config = load().expect("load");
    let defaults = AppConfig::default();

    assert_eq!(config.supabase.url, "https://project.supabase.co");
    assert_eq!(config.supabase.anon_key, "anon-key");
    assert_eq!(
        config.supabase.request_timeout_seconds,
        defaults.supabase.request_timeout_seconds
    );
    assert_eq!(config.storage.documents_bucket, "policies");
    assert_eq!(config.storage.memos_bucket, defaults.storage.memos_bucket);
    assert_eq!(config.http.port, defaults.http.port);
}

#[test]
#[serial]
fn environment_layer_overrides_file_values() {
    let ws = Workspace::enter();
    ws.file("wardline.toml", "[http]\nport = 3030\n");
    ws.env("WARDLINE__HTTP__PORT", "8080");
    ws.env("WARDLINE__TELEMETRY__FORMAT", "json");
    ws.env("WARDLINE__STORAGE__MAX_UPLOAD_BYTES", "1048576");

    let config = load().expect("load");
    assert_eq!(config.http.port, 8080);
    assert_eq!(config.telemetry.format, LogFormat::Json);
    assert_eq!(config.storage.max_upload_bytes, 1_048_576);
}

#[test]
#[serial]
fn comma_separated_origins_become_a_list() {
    let ws = Workspace::enter();
    ws.env(
        "WARDLINE__HTTP__CORS_ALLOWED_ORIGINS",
        "https://portal.example.org,https://staff.example.org",
    );

    let config = load().expect("load");
    assert_eq!(
        config.http.cors_allowed_origins,
        ["https://portal.example.org", "https://staff.example.org"]
    );
}

#[test]
#[serial]
fn explicit_path_from_wardline_config_is_honoured() {
    let ws = Workspace::enter();
    let explicit = ws.file(
        "elsewhere/portal.toml",
        "[watermark]\nenabled = false\nlabel = \"INTERNAL\"\n",
    );
    ws.env("WARDLINE_CONFIG", explicit.display().to_string());

    let config = load().expect("load");
    assert!(!config.watermark.enabled);
    assert_eq!(config.watermark.label, "INTERNAL");
    assert_eq!(config.watermark.font_size, WatermarkConfig::default().font_size);
}

#[test]
#[serial]
fn oversized_default_page_size_falls_back() {
    let ws = Workspace::enter();
    ws.env("WARDLINE__PAGINATION__DEFAULT_PAGE_SIZE", "500");
    ws.env("WARDLINE__PAGINATION__MAX_PAGE_SIZE", "50");

    let config = load().expect("load");
    assert_eq!(config.pagination.max_page_size, 50);
    assert_eq!(config.pagination.default_page_size, 20);
}

#[test]
#[serial]
fn malformed_toml_is_reported() {
    let ws = Workspace::enter();
    ws.file("wardline.toml", "[http]\nport = \"not-a-number\n");

    let message = load().expect_err("malformed file").to_string();
    assert!(
        message.contains("invalid configuration")
            || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn redacted_copy_masks_anon_key_only() {
    let mut config = AppConfig::default();
    config.supabase.anon_key = "secret-anon-key".to_string();
    config.supabase.url = "https://project.supabase.co".to_string();

    let redacted = config.redacted();
    assert_eq!(redacted.supabase.anon_key, "<redacted>");
    assert_eq!(redacted.supabase.url, "https://project.supabase.co");
    assert_eq!(config.supabase.anon_key, "secret-anon-key");
}

#[test]
fn storage_defaults_cover_three_buckets_and_pdf() {
    let storage = StorageConfig::default();
    assert_eq!(storage.documents_bucket, "documents");
    assert_eq!(storage.memos_bucket, "memos");
    assert_eq!(storage.incidents_bucket, "incident-files");
    assert!(storage
        .allowed_mime_types
        .iter()
        .any(|mime| mime == "application/pdf"));
}

#[test]
fn pagination_and_http_defaults() {
    let pagination = PaginationConfig::default();
    assert_eq!(pagination.default_page_size, 20);
    assert_eq!(pagination.max_page_size, 100);

    let http = HttpConfig::default();
    assert_eq!(http.address, "127.0.0.1");
    assert_eq!(http.port, 7070);
    assert!(http.cors_allowed_origins.is_empty());
}
