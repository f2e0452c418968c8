// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides quiet logging, test configuration, and a local mock HTTP server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `assistant_relay`

use assistant_relay::config::{
    AssistantConfig, EmissionUnit, OrchestrationConfig, RelayConfig, ServerConfig,
};
use axum::Router;
use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        // Check for TEST_LOG environment variable to control test logging level
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN, // Default to WARN for quiet tests
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Configuration with credentials, fast polling, and no relay delay
pub fn test_config() -> ServerConfig {
    ServerConfig {
        assistant: AssistantConfig {
            api_key: Some("sk-test".to_owned()),
            assistant_id: Some("asst_test".to_owned()),
            ..AssistantConfig::default()
        },
        orchestration: OrchestrationConfig {
            poll_interval_ms: 5,
            poll_timeout_secs: 5,
            cancel_on_disconnect: true,
        },
        relay: RelayConfig {
            char_delay_ms: 0,
            emission_unit: EmissionUnit::Char,
        },
        ..ServerConfig::default()
    }
}

/// Configuration without assistant credentials
pub fn unconfigured_config() -> ServerConfig {
    ServerConfig {
        assistant: AssistantConfig::default(),
        ..test_config()
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_mock_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock server address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{addr}")
}

/// Base URL nothing listens on
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind throwaway listener");
    let addr = listener.local_addr().expect("throwaway listener address");
    drop(listener);
    format!("http://{addr}")
}
