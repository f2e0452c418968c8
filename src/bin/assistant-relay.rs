// ABOUTME: Server binary for the assistant relay
// ABOUTME: Loads configuration, initializes logging, and serves the chat routes until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Assistant Relay Server Binary
//!
//! Starts the HTTP server exposing `/chat`, `/chat/stream`, `/chat/messages`,
//! thread deletion, and health endpoints.

use anyhow::{Context, Result};
use assistant_relay::{
    config::environment::ServerConfig,
    logging,
    routes::{build_router, ServerResources},
};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "assistant-relay")]
#[command(about = "Assistant Relay - streaming chat relay for hosted assistant runs")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting Assistant Relay");
    info!("{}", config.summary());

    let missing = config.assistant.missing_credentials();
    if !missing.is_empty() {
        warn!(
            missing = ?missing,
            "Chat endpoints will answer CONFIG_MISSING until credentials are set"
        );
    }

    let port = config.http_port;
    let shutdown = CancellationToken::new();
    let resources =
        Arc::new(ServerResources::from_config(config)?.with_shutdown(shutdown.clone()));
    let app = build_router(resources);

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{port}", args.host))?;

    display_available_endpoints(&args.host, port);
    info!("Server listening on {}:{port}", args.host);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open streams end with an error event instead of holding the drain
            shutdown.cancel();
        })
        .await
    {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}

/// Display all available API endpoints
#[allow(clippy::cognitive_complexity)]
fn display_available_endpoints(host: &str, port: u16) {
    info!("=== Available API Endpoints ===");
    info!("Chat:");
    info!("   Ask:               POST   http://{host}:{port}/chat");
    info!("   Ask (streamed):    POST   http://{host}:{port}/chat/stream");
    info!("   History:           POST   http://{host}:{port}/chat/messages");
    info!("   Delete Thread:     DELETE http://{host}:{port}/chat/threads/{{thread_id}}");
    info!("Monitoring:");
    info!("   Health Check:      GET    http://{host}:{port}/health");
    info!("   Readiness:         GET    http://{host}:{port}/ready");
    info!("=== End of Endpoint List ===");
}
