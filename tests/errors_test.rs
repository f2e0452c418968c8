// ABOUTME: Unit tests for errors functionality
// ABOUTME: Validates status mapping and the JSON error body produced for handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use assistant_relay::errors::{AppError, ErrorCode, ErrorResponse};
use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::Value;

async fn render(error: AppError) -> (StatusCode, Value) {
    let response = error.into_response();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[test]
fn test_error_code_http_status() {
    assert_eq!(ErrorCode::InvalidInput.http_status(), 400);
    assert_eq!(ErrorCode::MissingRequiredField.http_status(), 400);
    assert_eq!(ErrorCode::ConfigMissing.http_status(), 500);
    assert_eq!(ErrorCode::UpstreamUnavailable.http_status(), 500);
    assert_eq!(ErrorCode::RunCancelled.http_status(), 500);
}

#[test]
fn test_error_response_serialization() {
    let error = AppError::run_failed("run_1", "expired", None);
    let response = ErrorResponse::from(error);

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("RUN_FAILED"));
    assert!(json.contains("run_1"));
}

#[tokio::test]
async fn test_missing_field_renders_bad_request() {
    let (status, body) = render(AppError::missing_field("question").with_request_id("req_1")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELD");
    assert_eq!(body["error"]["message"], "'question' is required");
    assert_eq!(body["error"]["request_id"], "req_1");
}

#[tokio::test]
async fn test_config_missing_names_variables() {
    let (status, body) = render(AppError::config_missing(&["OPENAI_API_KEY"])).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["details"]["missing"][0], "OPENAI_API_KEY");
}

#[tokio::test]
async fn test_upstream_error_keeps_status_and_body() {
    let (status, body) = render(AppError::upstream("createRun", 429, "slow down")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
    assert_eq!(body["error"]["details"]["http_status"], 429);
    assert_eq!(body["error"]["details"]["body"], "slow down");
}

#[tokio::test]
async fn test_plain_error_omits_optional_fields() {
    let (_, body) = render(AppError::internal("boom")).await;

    let error = body["error"].as_object().unwrap();
    assert!(!error.contains_key("request_id"));
    assert!(!error.contains_key("details"));
}

#[test]
fn test_display_includes_description_and_message() {
    let error = AppError::run_failed("run_9", "failed", Some("quota exceeded"));
    let rendered = error.to_string();

    assert!(rendered.starts_with("The assistant run did not complete"));
    assert!(rendered.contains("quota exceeded"));
}

#[test]
fn test_serde_error_converts_to_serialization_error() {
    let parse_error = serde_json::from_str::<Value>("{nope").unwrap_err();
    let error: AppError = parse_error.into();

    assert_eq!(error.code, ErrorCode::SerializationError);
}
