// ABOUTME: Main library entry point for the assistant relay
// ABOUTME: Streams hosted assistant runs to browsers and answers the assistant's tool calls
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Assistant Relay
//!
//! Server-side core of a chat assistant backed by a hosted assistants API.
//! A stateless "ask a question" request becomes a turn on a durable thread:
//! the relay posts the question, drives the upstream run to completion,
//! answers `web_search` tool calls mid-run, and republishes the reply either
//! as one JSON value or as a paced server-sent event stream.
//!
//! ## Architecture
//!
//! - **assistant**: typed upstream client ([`assistant::AssistantApi`]) and SSE decoding
//! - **tools**: tool dispatcher and the web search provider
//! - **orchestrator**: run state machine in poll and stream modes
//! - **relay**: normalized client event stream with configurable pacing
//! - **routes**: axum handlers and router assembly
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use assistant_relay::config::environment::ServerConfig;
//! use assistant_relay::routes::{build_router, ServerResources};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let port = config.http_port;
//!     let resources = Arc::new(ServerResources::from_config(config)?);
//!     let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
//!     axum::serve(listener, build_router(resources)).await?;
//!     Ok(())
//! }
//! ```

/// Upstream assistant service client and wire types
pub mod assistant;

/// Environment configuration
pub mod config;

/// Application constants
pub mod constants;

/// Unified error handling
pub mod errors;

/// Logging setup and structured log helpers
pub mod logging;

/// HTTP middleware
pub mod middleware;

/// Run orchestration
pub mod orchestrator;

/// Client event stream relay
pub mod relay;

/// HTTP routes
pub mod routes;

/// Tool dispatch and web search
pub mod tools;
