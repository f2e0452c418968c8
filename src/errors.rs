// ABOUTME: Unified error type, error codes, and HTTP error response formatting
// ABOUTME: Maps configuration, validation, upstream, and run failures onto status codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Unified Error Handling
//!
//! Every fallible operation in the relay returns [`AppResult`]. The [`ErrorCode`]
//! carries the error category (configuration, validation, upstream, run failure)
//! and decides the HTTP status when the error reaches a request handler.
//!
//! Errors raised before a streaming response starts are rendered as JSON through
//! the axum [`IntoResponse`] implementation below. Errors raised after streaming
//! has started are converted to a terminal `error` event by the stream relay.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Validation (3000-3999)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,
    #[serde(rename = "MISSING_REQUIRED_FIELD")]
    MissingRequiredField = 3001,

    // Upstream assistant service (5000-5999)
    #[serde(rename = "UPSTREAM_ERROR")]
    UpstreamError = 5000,
    #[serde(rename = "UPSTREAM_UNAVAILABLE")]
    UpstreamUnavailable = 5001,
    #[serde(rename = "RUN_FAILED")]
    RunFailed = 5100,
    #[serde(rename = "RUN_CANCELLED")]
    RunCancelled = 5101,
    #[serde(rename = "STREAM_PROTOCOL")]
    StreamProtocol = 5200,

    // Configuration (6000-6999)
    #[serde(rename = "CONFIG_MISSING")]
    ConfigMissing = 6001,
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid = 6002,

    // Internal Errors (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError = 9003,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput | Self::MissingRequiredField => 400,

            // Upstream failures end the turn; the browser only distinguishes 400 from 500
            Self::UpstreamError
            | Self::UpstreamUnavailable
            | Self::RunFailed
            | Self::RunCancelled
            | Self::StreamProtocol
            | Self::ConfigMissing
            | Self::ConfigInvalid
            | Self::InternalError
            | Self::SerializationError => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidInput => "The provided input is invalid",
            Self::MissingRequiredField => "A required field is missing from the request",
            Self::UpstreamError => "The assistant service returned an error",
            Self::UpstreamUnavailable => "The assistant service could not be reached",
            Self::RunFailed => "The assistant run did not complete",
            Self::RunCancelled => "The assistant run was cancelled",
            Self::StreamProtocol => "The assistant event stream was malformed",
            Self::ConfigMissing => "Required configuration is missing",
            Self::ConfigInvalid => "Configuration is invalid",
            Self::InternalError => "An internal server error occurred",
            Self::SerializationError => "Data serialization/deserialization failed",
        }
    }
}

/// Additional context that can be attached to errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Request ID for tracing
    pub request_id: Option<String>,
    /// Additional key-value context
    pub details: Value,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            request_id: None,
            details: Value::Null,
        }
    }
}

/// Unified error type for the relay
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    pub context: ErrorContext,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add a request ID to the error context
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.context.request_id = Some(request_id.into());
        self
    }

    /// Add details to the error context
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.context.details = details;
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorResponseDetails,
}

/// Body of an [`ErrorResponse`]
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Machine readable code
    pub code: ErrorCode,
    /// Human readable message
    pub message: String,
    /// Request correlation id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Structured details (upstream status, run id, ...)
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
                request_id: error.context.request_id,
                details: error.context.details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = ?self.code, error = %self, details = %self.context.details, "Request failed");
        } else {
            tracing::debug!(code = ?self.code, error = %self, "Request rejected");
        }
        (status, Json(ErrorResponse::from(self))).into_response()
    }
}

/// Convenience functions for creating common errors
impl AppError {
    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// A required request field is missing or blank
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("'{field}' is required"),
        )
        .with_details(json!({ "field": field }))
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Required configuration values are absent
    pub fn config_missing(variables: &[&str]) -> Self {
        Self::new(
            ErrorCode::ConfigMissing,
            format!("Missing required configuration: {}", variables.join(", ")),
        )
        .with_details(json!({ "missing": variables }))
    }

    /// A configuration value is present but unusable
    pub fn config_invalid(variable: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ConfigInvalid,
            format!("{variable}: {}", message.into()),
        )
        .with_details(json!({ "variable": variable }))
    }

    /// An identifier that cannot be used as a single URL path segment
    pub fn invalid_id(field: &str) -> Self {
        Self::new(
            ErrorCode::InvalidInput,
            format!("'{field}' may only contain letters, digits, '_' and '-'"),
        )
        .with_details(json!({ "field": field }))
    }

    /// Non-2xx response from the assistant service
    pub fn upstream(operation: &str, http_status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(
            ErrorCode::UpstreamError,
            format!("{operation} failed with HTTP {http_status}"),
        )
        .with_details(json!({
            "operation": operation,
            "http_status": http_status,
            "body": body,
        }))
    }

    /// Transport-level failure reaching the assistant service
    pub fn upstream_unavailable(operation: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UpstreamUnavailable,
            format!("{operation}: {}", message.into()),
        )
        .with_details(json!({ "operation": operation }))
    }

    /// The upstream run reached a failure terminal state
    pub fn run_failed(run_id: &str, status: &str, last_error: Option<&str>) -> Self {
        let message = last_error.map_or_else(
            || format!("Run {run_id} ended with status {status}"),
            |reason| format!("Run {run_id} ended with status {status}: {reason}"),
        );
        Self::new(ErrorCode::RunFailed, message).with_details(json!({
            "run_id": run_id,
            "status": status,
            "last_error": last_error,
        }))
    }

    /// The run was abandoned because the caller went away
    pub fn run_cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RunCancelled, message)
    }

    /// A malformed upstream stream frame
    pub fn stream_protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StreamProtocol, message)
    }

    /// Serialization failure
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string()).with_source(error)
    }
}
