// ABOUTME: Route module organization for the assistant relay HTTP endpoints
// ABOUTME: Holds shared server resources and assembles the router with its middleware stack
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module for the assistant relay
//!
//! Each domain module contains route definitions and thin handler functions
//! that delegate to the orchestrator and the assistant client.

use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::assistant::{AssistantApi, AssistantClient};
use crate::config::ServerConfig;
use crate::constants::env_vars;
use crate::errors::{AppError, AppResult};
use crate::middleware::{create_request_span, setup_cors, MakeRequestUuid};
use crate::orchestrator::{OrchestratorSettings, RunOrchestrator};
use crate::relay::{Pacer, StreamRelay};
use crate::tools::{SearchProvider, ToolDispatcher, WebSearchClient};

/// Chat turn, history, and thread routes
pub mod chat;
/// Liveness and readiness routes
pub mod health;

pub use chat::{
    ChatRequest, ChatResponse, ChatRoutes, DeleteThreadResponse, HistoryMessage,
    MessagesRequest, MessagesResponse,
};
pub use health::HealthRoutes;

/// Shared state handed to every handler
pub struct ServerResources {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
    /// Pacing relay for streamed turns
    pub relay: StreamRelay,
    assistant: Option<Arc<dyn AssistantApi>>,
    orchestrator: Option<Arc<RunOrchestrator>>,
    missing: Vec<&'static str>,
}

impl ServerResources {
    /// Wire resources from parts
    ///
    /// `assistant` is `None` when credentials are absent; chat requests then
    /// fail with `CONFIG_MISSING`.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        assistant: Option<Arc<dyn AssistantApi>>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        let missing = if assistant.is_some() {
            if config.assistant.assistant_id.is_some() {
                Vec::new()
            } else {
                vec![env_vars::ASSISTANT_ID]
            }
        } else {
            config.assistant.missing_credentials()
        };

        let orchestrator = match (&assistant, &config.assistant.assistant_id) {
            (Some(api), Some(assistant_id)) => Some(Arc::new(RunOrchestrator::new(
                Arc::clone(api),
                ToolDispatcher::new(search),
                OrchestratorSettings::new(assistant_id.clone(), &config.orchestration),
            ))),
            _ => None,
        };

        Self {
            relay: StreamRelay::new(Pacer::from_config(&config.relay)),
            config: Arc::new(config),
            assistant,
            orchestrator,
            missing,
        }
    }

    /// Build production resources: HTTP assistant client and web search
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn from_config(config: ServerConfig) -> AppResult<Self> {
        let assistant: Option<Arc<dyn AssistantApi>> = if config.assistant.api_key.is_some() {
            Some(Arc::new(AssistantClient::new(&config.assistant)?))
        } else {
            None
        };
        let search: Arc<dyn SearchProvider> = Arc::new(WebSearchClient::new(&config.search)?);
        Ok(Self::new(config, assistant, search))
    }

    /// Replace the relay pacing policy
    #[must_use]
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.relay = self.relay.with_pacer(pacer);
        self
    }

    /// Token whose cancellation ends open streams and in-flight turns
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.relay = self.relay.with_shutdown(shutdown);
        self
    }

    /// Server-wide shutdown token
    #[must_use]
    pub const fn shutdown_token(&self) -> &CancellationToken {
        self.relay.shutdown_token()
    }

    /// Assistant client, or `CONFIG_MISSING`
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` naming the absent variables.
    pub fn assistant(&self) -> AppResult<&Arc<dyn AssistantApi>> {
        match (&self.assistant, self.missing.is_empty()) {
            (Some(api), true) => Ok(api),
            _ => Err(AppError::config_missing(&self.missing)),
        }
    }

    /// Run orchestrator, or `CONFIG_MISSING`
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` naming the absent variables.
    pub fn orchestrator(&self) -> AppResult<&Arc<RunOrchestrator>> {
        self.orchestrator
            .as_ref()
            .ok_or_else(|| AppError::config_missing(&self.missing))
    }

    /// Required variables that are unset
    #[must_use]
    pub fn missing_credentials(&self) -> &[&'static str] {
        &self.missing
    }
}

/// Assemble the full router with tracing, request-id, and CORS layers
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let cors = setup_cors(&resources.config.cors);

    Router::new()
        .merge(HealthRoutes::routes(Arc::clone(&resources)))
        .merge(ChatRoutes::routes(resources))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(create_request_span::<axum::body::Body>),
                )
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        )
}
