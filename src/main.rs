use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use clap::Parser;
use http::{Method, header::CONTENT_TYPE};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use anyhow::anyhow;

use rev_gateway::{ServerConfig, routes, state::AppState};

/// Rev Gateway - Real-time voice relay server
#[derive(Parser, Debug)]
#[command(name = "rev-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Listen host override
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Listen port override
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Directory to serve the browser client bundle from
    #[arg(long = "static-dir", value_name = "DIR")]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    // Parse CLI arguments and apply overrides on top of the environment
    let cli = Cli::parse();
    let mut config = ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(static_dir) = cli.static_dir {
        config.static_dir = static_dir;
    }

    if !config.has_gemini_credential() {
        tracing::warn!(
            "GEMINI_API_KEY is not set; upstream sessions will fail until it is configured"
        );
    }

    let address = config.address();
    let cors_origins = config.cors_allowed_origins.clone();
    let static_dir = config.static_dir.clone();
    println!("Starting server on {address}");

    // Create application state
    let app_state = AppState::new(config);

    let api_routes = routes::api::create_api_router();
    let ws_routes = routes::relay::create_relay_router();

    // Browser client bundle; `/` resolves to its index.html
    let static_service = ServeDir::new(&static_dir);

    // Configure CORS
    let cors_layer = if let Some(ref origins) = cors_origins {
        if origins == "*" {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(false)
        } else {
            // Parse comma-separated origins
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(true)
        }
    } else {
        // No CORS configured - strict same-origin only. Cross-origin
        // requests will be blocked unless CORS_ALLOWED_ORIGINS is set.
        info!(
            "CORS not configured, defaulting to same-origin only. \
             Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
        );
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE])
            .allow_credentials(false)
    };

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

    // Combine all routes: API + WebSocket, falling back to the client bundle
    let app: Router = api_routes
        .merge(ws_routes)
        .fallback_service(static_service)
        .with_state(app_state)
        .layer(cors_layer)
        .layer(security_headers);

    // Parse socket address
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    println!("Server listening on http://{}", socket_addr);

    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
