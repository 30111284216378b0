#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zipdepot_server::handler;
use zipdepot_server::middleware::{RouterBodyLimitExt, RouterObservabilityExt};
use zipdepot_server::service::ServiceState;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "zipdepot_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "zipdepot_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "zipdepot_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing();
    log_startup_info();
    log_config(&cli);

    cli.server
        .validate()
        .context("invalid server configuration")?;
    cli.service
        .validate()
        .context("invalid service configuration")?;

    let state = ServiceState::from_config(&cli.service)
        .await
        .context("failed to create service state")?;
    let router = create_router(state, cli.service.max_upload_bytes);

    server::serve(router, cli.server).await?;

    Ok(())
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Observability (outermost) - request tracing spans
/// 2. Body limit - caps upload sizes
/// 3. Routes (innermost) - actual request handlers
fn create_router(state: ServiceState, max_upload_bytes: usize) -> Router {
    handler::routes(state)
        .with_body_limit(max_upload_bytes)
        .with_observability()
}

/// Initializes tracing with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Logs startup information.
fn log_startup_info() {
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "starting zipdepot server"
    );

    tracing::debug!(
        target: TRACING_TARGET_SERVER_STARTUP,
        pid = process::id(),
        arch = std::env::consts::ARCH,
        os = std::env::consts::OS,
        "build information"
    );
}

/// Logs the effective configuration.
fn log_config(cli: &Cli) {
    tracing::info!(
        target: TRACING_TARGET_CONFIG,
        host = %cli.server.host,
        port = cli.server.port,
        storage_dir = %cli.service.storage_dir.display(),
        max_upload_bytes = cli.service.max_upload_bytes,
        "configuration loaded"
    );
}
