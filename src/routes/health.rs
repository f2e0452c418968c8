// ABOUTME: Health check route handlers for service monitoring and status endpoints
// ABOUTME: Provides liveness and credential-aware readiness endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Health check routes for service monitoring
//!
//! `/health` answers as long as the process is serving. `/ready` returns 503
//! until the assistant credentials are configured.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;

use crate::constants::service_names;
use crate::routes::ServerResources;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        async fn health_handler() -> Json<serde_json::Value> {
            Json(serde_json::json!({
                "status": "healthy",
                "service": service_names::ASSISTANT_RELAY,
                "version": service_names::SERVICE_VERSION,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }))
        }

        async fn ready_handler(
            State(resources): State<Arc<ServerResources>>,
        ) -> (StatusCode, Json<serde_json::Value>) {
            let missing = resources.missing_credentials();
            if missing.is_empty() {
                (
                    StatusCode::OK,
                    Json(serde_json::json!({
                        "status": "ready",
                        "assistantConfigured": true,
                        "timestamp": chrono::Utc::now().to_rfc3339()
                    })),
                )
            } else {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(serde_json::json!({
                        "status": "not_ready",
                        "assistantConfigured": false,
                        "missing": missing,
                        "timestamp": chrono::Utc::now().to_rfc3339()
                    })),
                )
            }
        }

        Router::new()
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .with_state(resources)
    }
}
