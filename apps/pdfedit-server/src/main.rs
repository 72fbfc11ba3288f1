//! pdfedit Server
//!
//! Accepts a PDF and a JSON list of region edits, redacts each region and
//! writes replacement text into it, and returns the edited PDF.
//!
//! ## Architecture
//!
//! - Rate limiting via tower-governor
//! - Upload size limit via axum's `DefaultBodyLimit`
//! - PDF work runs on the blocking pool so the runtime stays responsive

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;

/// Command-line arguments for the pdfedit server
#[derive(Parser, Debug)]
#[command(name = "pdfedit-server")]
#[command(about = "HTTP service that redacts PDF regions and writes replacement text")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PDFEDIT_PORT", default_value = "5000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "PDFEDIT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Maximum request body size in megabytes
    #[arg(long, env = "PDFEDIT_MAX_UPLOAD_MB", default_value = "50")]
    max_upload_mb: usize,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "PDFEDIT_RATE_LIMIT", default_value = "10")]
    rate_limit: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Runtime settings shared with the router
#[derive(Clone, Debug)]
pub struct AppState {
    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn with_max_upload_mb(megabytes: usize) -> Self {
        Self {
            max_upload_bytes: megabytes.saturating_mul(1024 * 1024),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pdfedit server on {}:{}", args.host, args.port);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit.saturating_mul(2))
            .finish()
            .ok_or_else(|| {
                anyhow::anyhow!("Invalid rate limit configuration: {}", args.rate_limit)
            })?,
    );

    let state = AppState::with_max_upload_mb(args.max_upload_mb);
    let app = api::router(state).layer(GovernorLayer {
        config: governor_conf,
    });

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);
    info!("Upload limit: {} MB", args.max_upload_mb);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
