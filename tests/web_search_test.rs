// ABOUTME: Integration tests for the web search client and tool dispatcher over HTTP
// ABOUTME: Verifies extracted answers and that every failure mode degrades to the fallback result
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use assistant_relay::assistant::ToolCall;
use assistant_relay::config::SearchConfig;
use assistant_relay::tools::{SearchProvider, SearchResult, ToolDispatcher, WebSearchClient};
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;

fn client_for(base_url: String) -> WebSearchClient {
    common::init_test_logging();
    WebSearchClient::new(&SearchConfig {
        base_url,
        timeout_secs: 2,
    })
    .unwrap()
}

async fn serve(status: StatusCode, body: &'static str) -> String {
    let router = Router::new().route("/", get(move || async move { (status, body) }));
    common::spawn_mock_server(router).await
}

#[tokio::test]
async fn test_abstract_answer_is_returned() {
    let router = Router::new().route(
        "/",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            assert_eq!(params["format"], "json");
            format!(
                r#"{{"AbstractText":"Answer for {}","AbstractSource":"Wikipedia","AbstractURL":"https://en.wikipedia.org/wiki/Rust"}}"#,
                params["q"]
            )
        }),
    );
    let client = client_for(common::spawn_mock_server(router).await);

    let result = client.search("rust language").await;

    assert_eq!(result.source, "Wikipedia");
    assert_eq!(result.content, "Answer for rust language");
    assert_eq!(result.url, "https://en.wikipedia.org/wiki/Rust");
}

#[tokio::test]
async fn test_server_error_falls_back() {
    let client = client_for(serve(StatusCode::INTERNAL_SERVER_ERROR, "oops").await);

    assert_eq!(
        client.search("pto policy").await,
        SearchResult::fallback("pto policy")
    );
}

#[tokio::test]
async fn test_malformed_body_falls_back() {
    let client = client_for(serve(StatusCode::OK, "<html>not json</html>").await);

    assert_eq!(
        client.search("pto policy").await,
        SearchResult::fallback("pto policy")
    );
}

#[tokio::test]
async fn test_empty_answer_falls_back() {
    let client = client_for(serve(StatusCode::OK, r#"{"AbstractText":"","RelatedTopics":[]}"#).await);

    let result = client.search("obscure thing").await;

    assert_eq!(result, SearchResult::fallback("obscure thing"));
    assert!(result.url.contains("obscure%20thing"));
}

#[tokio::test]
async fn test_unreachable_service_falls_back() {
    let client = client_for(common::unreachable_base_url().await);

    assert_eq!(
        client.search("holidays").await,
        SearchResult::fallback("holidays")
    );
}

/// Whatever the search does, the dispatcher answers every call id
#[tokio::test]
async fn test_dispatcher_answers_every_call_with_failing_search() {
    let client = client_for(common::unreachable_base_url().await);
    let dispatcher = ToolDispatcher::new(Arc::new(client));
    let calls = vec![
        ToolCall::function("call_1", "web_search", r#"{"query":"first"}"#),
        ToolCall::function("call_2", "web_search", "not json at all"),
        ToolCall::function("call_3", "lookup_weather", "{}"),
    ];

    let outputs = dispatcher.dispatch_all(&calls).await;

    let ids: Vec<_> = outputs.iter().map(|o| o.tool_call_id.as_str()).collect();
    assert_eq!(ids, vec!["call_1", "call_2", "call_3"]);

    let first: SearchResult = serde_json::from_str(&outputs[0].output).unwrap();
    assert_eq!(first, SearchResult::fallback("first"));
    let second: SearchResult = serde_json::from_str(&outputs[1].output).unwrap();
    assert_eq!(second, SearchResult::fallback("not json at all"));
    assert!(outputs[2].output.contains("unsupported tool"));
}
