use std::time::Duration;

use anyhow::Result;
use httpmock::prelude::*;
use tokio::time::{sleep, timeout};
use wardline_backend_runtime::BackendServices;
use wardline_config::{AppConfig, LogFormat, TelemetryConfig};

fn build_config(url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.supabase.url = url;
    config.supabase.anon_key = "anon-test-key".into();
    config.supabase.request_timeout_seconds = 2;
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_probes_supabase_health() -> Result<()> {
    let server = MockServer::start_async().await;
    let health = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/auth/v1/health")
                .header("apikey", "anon-test-key");
            then.status(200)
                .json_body(serde_json::json!({ "name": "GoTrue" }));
        })
        .await;

    let config = build_config(server.base_url());
    let services = BackendServices::initialise(&config).await?;

    health.assert_async().await;
    assert!(services.supabase_reachable);
    assert_eq!(services.supabase.base_url(), server.base_url());
    assert_eq!(
        services.app_state().config().storage.documents_bucket,
        "documents"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_tolerates_unhealthy_supabase() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/auth/v1/health");
            then.status(503).body("upstream unavailable");
        })
        .await;

    let services = BackendServices::initialise(&build_config(server.base_url())).await?;
    assert!(
        !services.supabase_reachable,
        "a failed health probe should be logged, not fatal"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_rejects_missing_anon_key() -> Result<()> {
    let mut config = build_config("http://127.0.0.1:54321".into());
    config.supabase.anon_key = String::new();

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => panic!("expected initialisation to fail without an anon key"),
        Err(error) => error,
    };
    let message = format!("{error:?}");
    assert!(
        message.contains("failed to build supabase client"),
        "expected client construction context, got {message}"
    );
    assert!(message.contains("supabase.anon_key is empty"));
    Ok(())
}

#[test]
fn telemetry_init_tracing_sets_global_subscriber() {
    let config = TelemetryConfig {
        format: LogFormat::Json,
    };
    wardline_backend_runtime::telemetry::init_tracing(&config)
        .expect("first initialisation should succeed");

    let second = wardline_backend_runtime::telemetry::init_tracing(&TelemetryConfig::default());
    assert!(
        second.is_err(),
        "initialising telemetry twice should fail with global subscriber already set"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(unix), ignore = "requires Unix signal handling")]
async fn shutdown_signal_completes_on_ctrl_c_notification() -> Result<()> {
    let shutdown_task = tokio::spawn(async { wardline_backend_runtime::shutdown_signal().await });

    sleep(Duration::from_millis(50)).await;
    #[cfg(unix)]
    unsafe {
        libc::raise(libc::SIGINT);
    }

    timeout(Duration::from_secs(2), shutdown_task).await??;
    Ok(())
}
