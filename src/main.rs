//! Reverse proxy CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rewrite_proxy::{ProxyConfig, ReverseProxy};

#[derive(Parser, Debug)]
#[command(name = "rewrite-proxy")]
#[command(
    author,
    version,
    about = "URL-rewriting reverse proxy that fronts a backend under a different host and path prefix"
)]
struct Args {
    /// Port to listen on.
    #[arg(short = 'p', long, env = "PORT", default_value = "8080")]
    port: String,

    /// Upstream absolute URL to forward requests to.
    #[arg(short = 'f', long, env = "FORWARDED_URL")]
    forwarded_url: Option<String>,

    /// Public-facing path prefix stripped before forwarding and re-added
    /// on the way back.
    #[arg(short = 'x', long, env = "PATH_PREFIX", default_value = "")]
    path_prefix: String,

    /// Skip upstream certificate validation.
    #[arg(short = 'k', long, env = "SKIP_SSL_VALIDATION")]
    skip_ssl_validation: bool,

    /// Copy this inbound header into X-Forwarded-Host.
    #[arg(long, env = "X_FORWARDED_HOST_HEADER")]
    x_forwarded_host_header: Option<String>,

    /// Copy this inbound header into X-Forwarded-Path.
    #[arg(long, env = "X_FORWARDED_PATH_HEADER")]
    x_forwarded_path_header: Option<String>,

    /// Output logs as JSON.
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    // Validate configuration before binding anything
    let mut config = ProxyConfig::new(args.forwarded_url.as_deref().unwrap_or_default())
        .context("FORWARDED_URL must be set to a valid absolute URL")?
        .with_path_prefix(&args.path_prefix)
        .with_skip_tls_validation(args.skip_ssl_validation);
    if let Some(header) = &args.x_forwarded_host_header {
        config = config.with_forwarded_host_header(header);
    }
    if let Some(header) = &args.x_forwarded_path_header {
        config = config.with_forwarded_path_header(header);
    }

    let proxy = ReverseProxy::from_config(&config)
        .context("failed to initialize upstream transport")?;

    let address = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    info!(
        address = %address,
        forwarded_url = %config.forwarded_url,
        path_prefix = %config.path_prefix,
        skip_tls_validation = config.skip_tls_validation,
        "reverse proxy listening"
    );

    proxy.run(listener).await.context("server error")?;

    info!("shutdown complete");
    Ok(())
}
