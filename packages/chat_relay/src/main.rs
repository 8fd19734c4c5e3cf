use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::prelude::*;

use chat_relay::config::{ConfigOverrides, RelayConfig};
use chat_relay::{ChatHub, LoggingHook, RelayState, create_routes};

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(about = "Broadcast chat relay over websockets")]
struct Args {
    /// Config file (defaults to ./chat_relay.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the HTTP server (0 for automatic)
    #[arg(short, long)]
    port: Option<u16>,

    /// Frames a client may have queued before it is dropped as too slow
    #[arg(long)]
    outbox_capacity: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let default_directive = if args.debug {
        "chat_relay=debug,tower_http=debug,info"
    } else {
        "chat_relay=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let overrides = ConfigOverrides {
        host: args.host,
        port: args.port,
        outbox_capacity: args.outbox_capacity,
    };
    let config = RelayConfig::load(args.config, &overrides)?;

    let hub = Arc::new(ChatHub::new(config.outbox_capacity).with_hook(Arc::new(LoggingHook)));
    let app = create_routes(RelayState { hub })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    // Get the actual bound address (important when port was 0)
    let actual_addr = listener.local_addr()?;

    // Machine-readable first
    println!("CHAT_RELAY_ADDR={}", actual_addr);

    info!("Chat relay listening on http://{}", actual_addr);
    info!("Endpoints:");
    info!("  GET /ws     - WebSocket chat (first frame = display name)");
    info!("  GET /health - Health and metrics");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received shutdown signal, exiting gracefully");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}
