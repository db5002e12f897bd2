use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use utoipa::OpenApi;
use wardline_backend_api::{build_router, ApiDoc};
use wardline_backend_runtime::{shutdown_signal, telemetry, BackendServices};
use wardline_config::load as load_config;

#[derive(Parser)]
#[command(name = "wardline-backend")]
#[command(about = "Wardline hospital operations portal backend (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Print the effective configuration with secrets redacted
    Config,
    /// Check that the configured Supabase project answers
    Health,
    /// Print the OpenAPI document
    Openapi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::Config => print_config(),
        Commands::Health => check_health().await,
        Commands::Openapi => print_openapi(),
    }
}

async fn run_server() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    telemetry::init_tracing(&config.telemetry).context("failed to initialise tracing")?;

    info!("starting Wardline backend");

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;
    let app = build_router(services.app_state());

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

fn print_config() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    let rendered = serde_json::to_string_pretty(&config.redacted())
        .context("failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}

async fn check_health() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    telemetry::init_tracing(&config.telemetry).context("failed to initialise tracing")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;
    if !services.supabase_reachable {
        anyhow::bail!("supabase at {} is not reachable", config.supabase.url);
    }

    println!("supabase at {} is reachable", config.supabase.url);
    Ok(())
}

fn print_openapi() -> anyhow::Result<()> {
    let rendered = ApiDoc::openapi()
        .to_pretty_json()
        .context("failed to render openapi document")?;
    println!("{rendered}");
    Ok(())
}
