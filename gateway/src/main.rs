use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::info;

use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;

use anyhow::anyhow;

use gguf_tts_gateway::{ServerConfig, init, routes, state::AppState};

/// GGUF TTS Gateway - OpenAI-compatible speech server for local GGUF models
#[derive(Parser, Debug)]
#[command(name = "gguf-tts-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// GGUF model file (overrides MODEL_PATH)
    #[arg(short = 'm', long = "model", value_name = "FILE")]
    model: Option<PathBuf>,

    /// Bind host (overrides HOST)
    #[arg(long = "host")]
    host: Option<String>,

    /// Bind port (overrides PORT)
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert the GGUF model into the cache without starting the server
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file or environment
    let mut config = if let Some(config_path) = &cli.config {
        println!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    // Command line flags take precedence over every other source
    if let Some(model) = cli.model {
        config.model_path = Some(model);
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    // Handle subcommands
    if let Some(Commands::Init) = cli.command {
        let converted = init::run(config).await?;
        println!("Converted model cached at {}", converted.path().display());
        return Ok(());
    }

    let address = config.address();
    let tls_config = config.tls.clone();
    let cors_origins = config.cors_allowed_origins.clone();
    println!("Starting server on {address}");

    // Create application state
    let app_state = AppState::new(config)
        .await
        .map_err(|e| anyhow!("Failed to initialize model state: {}", e))?;

    if !app_state.models.capabilities().generation_available() {
        tracing::warn!(
            "No speech engine configured; /v1/audio/speech will report the missing dependency"
        );
    }

    // Load the model in the background so health checks answer during conversion
    let bootstrap = app_state
        .models
        .spawn_load()
        .map_err(|e| anyhow!("Failed to start model load: {}", e))?;
    tokio::spawn(async move {
        match bootstrap.await {
            Ok(Ok(_)) => info!("Model loaded, speech generation available"),
            Ok(Err(e)) => tracing::warn!("Model not loaded: {}", e),
            Err(e) => tracing::error!("Model load task failed: {}", e),
        }
    });

    // Configure CORS
    let cors_layer = routes::cors_layer(&cors_origins);

    // Security headers
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ));

    let app = routes::create_router(app_state)
        .layer(cors_layer)
        .layer(security_headers);

    // Parse socket address
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    // Start server with or without TLS
    if let Some(tls) = tls_config {
        // Initialize crypto provider before loading certificates
        rustls::crypto::ring::default_provider()
            .install_default()
            .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        println!("Server listening on https://{} (TLS enabled)", socket_addr);

        axum_server::bind_rustls(socket_addr, rustls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        println!("Server listening on http://{}", socket_addr);

        let listener = TcpListener::bind(&socket_addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}
