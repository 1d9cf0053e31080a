use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use anyhow::anyhow;

use voicebridge_gateway::{
    ServerConfig, core::heartbeat::spawn_heartbeat, core::session::SessionRegistry, routes,
    state::AppState,
};

/// Grace period for in-flight connections after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Voice bridge gateway - telephony audio to realtime speech backends
#[derive(Parser, Debug)]
#[command(name = "voicebridge-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    if !config.backend_config().has_credentials() {
        warn!("Realtime backend URL, deployment or API key missing; sessions will stay silent");
    }

    let address = config.address();
    let tls_config = config.tls.clone();
    let heartbeat_interval = config.heartbeat_interval();

    // Create application state
    let app_state = AppState::new(config);

    let cancel = CancellationToken::new();
    let heartbeat = spawn_heartbeat(
        app_state.sessions.clone(),
        heartbeat_interval,
        cancel.clone(),
    );

    let app = routes::create_app(app_state.clone());

    // Parse socket address
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    // Start server with or without TLS
    if let Some(tls) = tls_config {
        // Load TLS configuration from certificate and key files
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

        info!("Server listening on https://{} (TLS enabled)", socket_addr);

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        let sessions = app_state.sessions.clone();
        let shutdown_cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal(sessions, shutdown_cancel).await;
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        axum_server::bind_rustls(socket_addr, rustls_config)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        info!("Server listening on http://{}", socket_addr);

        let listener = TcpListener::bind(&socket_addr).await?;
        let sessions = app_state.sessions.clone();
        let shutdown_cancel = cancel.clone();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal(sessions, shutdown_cancel))
        .await?;
    }

    cancel.cancel();
    if let Err(e) = heartbeat.await {
        warn!("Heartbeat task ended abnormally: {}", e);
    }
    info!("Server stopped");

    Ok(())
}

/// Wait for Ctrl-C, then tear down every session and stop background tasks.
async fn shutdown_signal(sessions: Arc<SessionRegistry>, cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!(sessions = sessions.len(), "Shutdown signal received");
    sessions.shutdown_all();
    cancel.cancel();
}
