// ABOUTME: External tool dispatcher answering assistant function calls
// ABOUTME: Routes web_search to the search provider and guarantees one output per tool call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # External Tool Dispatcher
//!
//! Turns the tool calls of a `requires_action` run into tool outputs. The
//! dispatcher is total: every call yields exactly one [`ToolOutput`] with the
//! same id, whatever happens while executing it.
//!
//! - `web_search` runs the configured [`SearchProvider`]; failures become a
//!   fallback [`SearchResult`].
//! - Unknown function names get an `{"error":"unsupported tool: <name>"}` output
//!   so the run is never left waiting on a missing id.

use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::assistant::{ToolCall, ToolOutput};
use crate::constants::tools;
use crate::logging::AppLogger;

/// DuckDuckGo backed web search
pub mod web_search;

pub use web_search::{SearchProvider, SearchResult, ToolDispatchError, WebSearchClient};

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
}

/// Executes assistant tool calls
#[derive(Clone)]
pub struct ToolDispatcher {
    search: Arc<dyn SearchProvider>,
}

impl ToolDispatcher {
    /// Create a dispatcher over a search provider
    #[must_use]
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }

    /// Answer one tool call
    pub async fn dispatch(&self, call: &ToolCall) -> ToolOutput {
        let started = Instant::now();
        let (output, fallback) = match call.function.name.as_str() {
            tools::WEB_SEARCH => {
                let query = Self::search_query(&call.function.arguments);
                let result = self.search.search(&query).await;
                let fallback = result == SearchResult::fallback(&query);
                (Self::encode(&result), fallback)
            }
            other => {
                warn!(tool.name = %other, tool.call_id = %call.id, "Unsupported tool requested");
                (
                    json!({ "error": format!("unsupported tool: {other}") }).to_string(),
                    true,
                )
            }
        };

        AppLogger::log_tool_dispatch(
            &call.function.name,
            &call.id,
            fallback,
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        );

        ToolOutput {
            tool_call_id: call.id.clone(),
            output,
        }
    }

    /// Answer every call concurrently, preserving call order in the result
    pub async fn dispatch_all(&self, calls: &[ToolCall]) -> Vec<ToolOutput> {
        join_all(calls.iter().map(|call| self.dispatch(call))).await
    }

    /// Extract the query, falling back to the raw argument text
    fn search_query(arguments: &str) -> String {
        serde_json::from_str::<WebSearchArgs>(arguments).map_or_else(
            |e| {
                warn!(error = %e, "Malformed web_search arguments, using raw text as query");
                arguments.trim().to_owned()
            },
            |args| args.query,
        )
    }

    fn encode(result: &SearchResult) -> String {
        serde_json::to_string(result).unwrap_or_else(|_| "{}".to_owned())
    }
}
