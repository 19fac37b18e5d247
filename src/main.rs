//! Database browser - Main entry point.
//!
//! Serves the browser API over HTTP. Database connection settings arrive
//! with each request; nothing is connected at startup.

use clap::Parser;
use db_browser::config::Config;
use db_browser::service::BrowserService;
use db_browser::transport::{HttpTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(
        host = %config.http_host,
        port = config.http_port,
        annotator = config.annotator_url.is_some(),
        "Starting database browser v{}",
        env!("CARGO_PKG_VERSION")
    );

    let service = Arc::new(BrowserService::from_config(&config)?);
    let transport = HttpTransport::new(service, &config.http_host, config.http_port);

    if let Err(e) = transport.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
