//! DeepSearch-RS: multi-provider research search aggregation
//!
//! This is the main entry point for the application.

use anyhow::Result;
use deepsearch_rs::{
    config,
    network::HttpClient,
    web::{create_router, AppState},
};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().skip(1).any(|arg| arg == "-h" || arg == "--help") {
        print_usage();
        return Ok(());
    }

    // Load configuration
    let settings = config::load()?;

    // Initialize logging; RUST_LOG takes precedence over the debug switch
    let default_level = if settings.general.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting DeepSearch-RS v{}", deepsearch_rs::VERSION);
    info!("Loaded configuration for instance: {}", settings.general.instance_name);

    let enabled: Vec<String> = settings
        .providers
        .enabled()
        .iter()
        .map(|kind| kind.to_string())
        .collect();
    info!("Enabled providers: {}", enabled.join(", "));

    // Initialize HTTP client
    let client = HttpClient::with_settings(&settings.outgoing)?;
    info!("HTTP client initialized");

    // Create application state
    let state = AppState::new(settings.clone(), client)?;
    info!("Application state initialized for {}", state.instance_name());

    // Create router
    let app = create_router(state);

    // Bind address
    let addr = SocketAddr::new(
        settings.server.bind_address.parse()?,
        settings.server.port,
    );

    info!("Starting server on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
DeepSearch-RS v{}
Multi-provider research search aggregation

USAGE:
    deepsearch-rs [OPTIONS]

OPTIONS:
    -h, --help             Print help information

ENVIRONMENT VARIABLES:
    DEEPSEARCH_SETTINGS_PATH  Path to settings.yml
    DEEPSEARCH_DEBUG          Enable debug logging (true/false)
    DEEPSEARCH_PORT           Server port
    DEEPSEARCH_BIND_ADDRESS   Bind address
    TAVILY_API_KEY            Tavily API key
    EXA_API_KEY               Exa API key
    PERPLEXITY_API_KEY        Perplexity API key
    PUBMED_API_KEY            NCBI API key (optional)
"#,
        deepsearch_rs::VERSION
    );
}
