// ABOUTME: HTTP client for the hosted assistant service (threads, messages, runs)
// ABOUTME: Adds bearer auth and the beta header, maps non-2xx responses to upstream errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Assistant HTTP Client
//!
//! Thin typed wrapper over the assistants REST API. Every request carries the
//! bearer token and the `OpenAI-Beta` header. No request is retried.
//!
//! Ids are validated and appended as single path segments, never formatted
//! into the path. Plain calls carry a whole-request deadline; streamed runs
//! are only bounded by the idle read timeout so long answers are not cut off.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};
use url::Url;

use super::sse_parser::create_run_event_stream;
use super::{
    validate_resource_id, AssistantApi, MessageRole, Run, RunEventStream, Thread, ThreadMessage,
    ToolOutput,
};
use crate::config::AssistantConfig;
use crate::constants::{defaults, env_vars, upstream};
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct SubmitToolOutputsRequest<'a> {
    tool_outputs: &'a [ToolOutput],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP implementation of [`AssistantApi`]
#[derive(Clone)]
pub struct AssistantClient {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
    api_key: String,
    beta_header: String,
}

impl AssistantClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` when the API key is absent, `CONFIG_INVALID`
    /// when the base URL cannot carry a path, or an internal error if the HTTP
    /// client cannot be built.
    pub fn new(config: &AssistantConfig) -> AppResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::config_missing(&config.missing_credentials()))?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            AppError::config_invalid(env_vars::OPENAI_BASE_URL, e.to_string()).with_source(e)
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::config_invalid(
                env_vars::OPENAI_BASE_URL,
                format!("'{base_url}' cannot be used as a base URL"),
            ));
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(defaults::UPSTREAM_CONNECT_TIMEOUT_SECS))
            .read_timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            request_timeout: timeout,
            api_key,
            beta_header: config.beta_header.clone(),
        })
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment
    fn api_url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::config_invalid(env_vars::OPENAI_BASE_URL, "cannot be used as a base URL")
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn thread_url(&self, thread_id: &str, rest: &[&str]) -> AppResult<Url> {
        validate_resource_id(thread_id, "threadId")?;
        let mut segments = vec!["threads", thread_id];
        segments.extend_from_slice(rest);
        self.api_url(&segments)
    }

    fn run_url(&self, thread_id: &str, run_id: &str, rest: &[&str]) -> AppResult<Url> {
        validate_resource_id(run_id, "runId")?;
        let mut segments = vec!["runs", run_id];
        segments.extend_from_slice(rest);
        self.thread_url(thread_id, &segments)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api_key)
            .header(upstream::BETA_HEADER_NAME, &self.beta_header)
    }

    /// Send a request and return the response if it is 2xx
    async fn send(&self, operation: &'static str, request: RequestBuilder) -> AppResult<Response> {
        let started = Instant::now();
        let response = self.authorized(request).send().await.map_err(|e| {
            AppLogger::log_upstream_call(operation, false, elapsed_ms(started), None);
            AppError::upstream_unavailable(operation, e.to_string()).with_source(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            AppLogger::log_upstream_call(
                operation,
                false,
                elapsed_ms(started),
                Some(status.as_u16()),
            );
            return Err(AppError::upstream(operation, status.as_u16(), body));
        }

        AppLogger::log_upstream_call(operation, true, elapsed_ms(started), Some(status.as_u16()));
        Ok(response)
    }

    /// Send a request under the whole-request deadline and decode the JSON body
    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> AppResult<T> {
        let response = self
            .send(operation, request.timeout(self.request_timeout))
            .await?;
        let body = response.text().await.map_err(|e| {
            AppError::upstream_unavailable(operation, format!("Failed to read response: {e}"))
        })?;
        serde_json::from_str(&body).map_err(|e| {
            AppError::serialization(format!("{operation}: unexpected response body: {e}"))
        })
    }

    /// Send a streaming request and decode the SSE body
    async fn send_stream(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> AppResult<RunEventStream> {
        let response = self
            .send(operation, request.header("Accept", "text/event-stream"))
            .await?;
        Ok(create_run_event_stream(response.bytes_stream(), operation))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl AssistantApi for AssistantClient {
    #[instrument(skip(self))]
    async fn create_thread(&self) -> AppResult<Thread> {
        let request = self
            .client
            .post(self.api_url(&["threads"])?)
            .json(&serde_json::json!({}));
        let thread: Thread = self.send_json("createThread", request).await?;
        debug!(thread_id = %thread.id, "Created thread");
        Ok(thread)
    }

    #[instrument(skip(self, content), fields(content_len = content.len()))]
    async fn post_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> AppResult<ThreadMessage> {
        let request = self
            .client
            .post(self.thread_url(thread_id, &["messages"])?)
            .json(&CreateMessageRequest {
                role: role.as_str(),
                content,
            });
        self.send_json("postMessage", request).await
    }

    #[instrument(skip(self))]
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> AppResult<Run> {
        let request = self
            .client
            .post(self.thread_url(thread_id, &["runs"])?)
            .json(&CreateRunRequest {
                assistant_id,
                stream: false,
            });
        self.send_json("createRun", request).await
    }

    #[instrument(skip(self))]
    async fn create_run_stream(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> AppResult<RunEventStream> {
        let request = self
            .client
            .post(self.thread_url(thread_id, &["runs"])?)
            .json(&CreateRunRequest {
                assistant_id,
                stream: true,
            });
        self.send_stream("createRun", request).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_run(&self, thread_id: &str, run_id: &str) -> AppResult<Run> {
        let request = self.client.get(self.run_url(thread_id, run_id, &[])?);
        self.send_json("getRunStatus", request).await
    }

    #[instrument(skip(self, outputs), fields(outputs = outputs.len()))]
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> AppResult<Run> {
        let request = self
            .client
            .post(self.run_url(thread_id, run_id, &["submit_tool_outputs"])?)
            .json(&SubmitToolOutputsRequest {
                tool_outputs: outputs,
                stream: false,
            });
        self.send_json("submitToolOutputs", request).await
    }

    #[instrument(skip(self, outputs), fields(outputs = outputs.len()))]
    async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> AppResult<RunEventStream> {
        let request = self
            .client
            .post(self.run_url(thread_id, run_id, &["submit_tool_outputs"])?)
            .json(&SubmitToolOutputsRequest {
                tool_outputs: outputs,
                stream: true,
            });
        self.send_stream("submitToolOutputs", request).await
    }

    #[instrument(skip(self))]
    async fn list_messages(&self, thread_id: &str) -> AppResult<Vec<ThreadMessage>> {
        let limit = defaults::MESSAGE_PAGE_LIMIT.to_string();
        let mut messages = Vec::new();
        let mut after: Option<String> = None;
        let url = self.thread_url(thread_id, &["messages"])?;

        // Newest first from upstream, paged with the `after` cursor
        loop {
            let mut query = vec![("order", "desc".to_owned()), ("limit", limit.clone())];
            if let Some(cursor) = after.take() {
                query.push(("after", cursor));
            }
            let request = self.client.get(url.clone()).query(&query);
            let page: MessageList = self.send_json("getMessages", request).await?;

            let next_cursor = page
                .last_id
                .clone()
                .or_else(|| page.data.last().map(|m| m.id.clone()));
            let page_len = page.data.len();
            messages.extend(page.data);

            match next_cursor {
                Some(cursor) if page.has_more && page_len > 0 => after = Some(cursor),
                _ => break,
            }
        }

        messages.reverse();
        debug!(count = messages.len(), "Fetched thread messages");
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn delete_thread(&self, thread_id: &str) -> AppResult<()> {
        let request = self
            .client
            .delete(self.thread_url(thread_id, &[])?)
            .timeout(self.request_timeout);
        self.send("deleteThread", request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> AppResult<Run> {
        let request = self
            .client
            .post(self.run_url(thread_id, run_id, &["cancel"])?);
        self.send_json("cancelRun", request).await
    }
}
