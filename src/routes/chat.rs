// ABOUTME: Chat route handlers for single-shot, streamed, and history requests
// ABOUTME: Validates input, delegates to the run orchestrator, and shapes JSON or SSE responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Chat routes
//!
//! | Route | Method | Response |
//! |---|---|---|
//! | `/chat` | POST | `{text, threadId}` |
//! | `/chat/stream` | POST | `text/event-stream` of client stream events |
//! | `/chat/messages` | POST | `{messages: [{sender, text, id, createdAt}]}` oldest first |
//! | `/chat/threads/:thread_id` | DELETE | `{deleted, threadId}` |
//!
//! Validation and upstream setup happen before any response bytes are sent,
//! so those failures are JSON error responses. Once a stream has started,
//! failures arrive as a single `error` event. Thread ids must be a single
//! `[A-Za-z0-9_-]` token; anything else is `INVALID_INPUT`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

use crate::assistant::{validate_resource_id, MessageRole, ThreadMessage};
use crate::errors::{AppError, AppResult};
use crate::middleware::{create_turn_span, request_id_from_headers};
use crate::routes::ServerResources;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `/chat` and `/chat/stream`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's question
    #[serde(default)]
    pub question: Option<String>,
    /// Existing thread to continue
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Result of a completed turn
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Assistant reply
    pub text: String,
    /// Thread to pass on the next turn
    pub thread_id: String,
}

/// Body of `/chat/messages`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesRequest {
    /// Thread whose history is requested
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// One entry of a thread's history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    /// `user` or `bot`
    pub sender: String,
    /// Message text
    pub text: String,
    /// Upstream message id
    pub id: String,
    /// Creation time (unix seconds)
    pub created_at: i64,
}

impl From<&ThreadMessage> for HistoryMessage {
    fn from(message: &ThreadMessage) -> Self {
        let sender = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "bot",
        };
        Self {
            sender: sender.to_owned(),
            text: message.text(),
            id: message.id.clone(),
            created_at: message.created_at,
        }
    }
}

/// Thread history, oldest first
#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Messages in chronological order
    pub messages: Vec<HistoryMessage>,
}

/// Result of deleting a thread
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteThreadResponse {
    /// Always `true` on success
    pub deleted: bool,
    /// Thread that was removed
    pub thread_id: String,
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/chat", post(Self::chat))
            .route("/chat/stream", post(Self::chat_stream))
            .route("/chat/messages", post(Self::messages))
            .route("/chat/threads/:thread_id", delete(Self::delete_thread))
            .with_state(resources)
    }

    /// Run one turn and return the full reply
    async fn chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Result<Json<ChatRequest>, JsonRejection>,
    ) -> Result<Json<ChatResponse>, AppError> {
        let request_id = request_id_from_headers(&headers);
        Self::run_turn(&resources, body)
            .await
            .map(Json)
            .map_err(|e| attach_request_id(e, request_id))
    }

    async fn run_turn(
        resources: &ServerResources,
        body: Result<Json<ChatRequest>, JsonRejection>,
    ) -> AppResult<ChatResponse> {
        let request = parse_body(body)?;
        let question = required(request.question, "question")?;
        let thread_id = optional_thread_id(request.thread_id)?;
        let orchestrator = Arc::clone(resources.orchestrator()?);

        let span = create_turn_span("poll", thread_id.as_deref());
        let turn = orchestrator
            .prepare_turn(&question, thread_id.as_deref())
            .instrument(span.clone())
            .await?;

        // The turn runs detached so a dropped request or server shutdown can
        // still cancel the run
        let cancel = resources.shutdown_token().child_token();
        let guard = cancel.clone().drop_guard();
        let task = tokio::spawn(
            async move { orchestrator.complete_turn(&turn, &cancel).await }.instrument(span),
        );
        let result = task
            .await
            .map_err(|e| AppError::internal(format!("Turn task failed: {e}")))?;
        let _token = guard.disarm();

        let result = result?;
        info!(thread_id = %result.thread_id, reply_len = result.text.len(), "Turn completed");
        Ok(ChatResponse {
            text: result.text,
            thread_id: result.thread_id,
        })
    }

    /// Run one turn and stream the reply as server-sent events
    async fn chat_stream(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Result<Json<ChatRequest>, JsonRejection>,
    ) -> Result<Response, AppError> {
        let request_id = request_id_from_headers(&headers);
        Self::start_stream(&resources, body)
            .await
            .map_err(|e| attach_request_id(e, request_id))
    }

    async fn start_stream(
        resources: &ServerResources,
        body: Result<Json<ChatRequest>, JsonRejection>,
    ) -> AppResult<Response> {
        let request = parse_body(body)?;
        let question = required(request.question, "question")?;
        let thread_id = optional_thread_id(request.thread_id)?;
        let orchestrator = resources.orchestrator()?;

        let span = create_turn_span("stream", thread_id.as_deref());
        let turn = orchestrator
            .prepare_turn(&question, thread_id.as_deref())
            .instrument(span)
            .await?;

        let cancel = CancellationToken::new();
        let thread_id = turn.thread_id.clone();
        let events = ReceiverStream::new(orchestrator.stream_turn(turn, cancel.clone()));
        let stream = resources
            .relay
            .relay(thread_id, events, cancel)
            .map(|event| Ok::<Event, Infallible>(event.to_sse_event()));

        Ok((
            [(header::CACHE_CONTROL, "no-cache")],
            Sse::new(stream).keep_alive(KeepAlive::default()),
        )
            .into_response())
    }

    /// Fetch a thread's history in chronological order
    async fn messages(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Result<Json<MessagesRequest>, JsonRejection>,
    ) -> Result<Json<MessagesResponse>, AppError> {
        let request_id = request_id_from_headers(&headers);
        let result: AppResult<MessagesResponse> = async {
            let request = parse_body(body)?;
            let thread_id = required_thread_id(request.thread_id)?;
            let messages = resources.assistant()?.list_messages(&thread_id).await?;
            Ok(MessagesResponse {
                messages: messages.iter().map(HistoryMessage::from).collect(),
            })
        }
        .await;
        result.map(Json).map_err(|e| attach_request_id(e, request_id))
    }

    /// Delete a thread upstream
    async fn delete_thread(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(thread_id): Path<String>,
    ) -> Result<Json<DeleteThreadResponse>, AppError> {
        let request_id = request_id_from_headers(&headers);
        let result: AppResult<DeleteThreadResponse> = async {
            let thread_id = required_thread_id(Some(thread_id))?;
            resources.assistant()?.delete_thread(&thread_id).await?;
            info!(thread_id = %thread_id, "Thread deleted");
            Ok(DeleteThreadResponse {
                deleted: true,
                thread_id,
            })
        }
        .await;
        result.map(Json).map_err(|e| attach_request_id(e, request_id))
    }
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::invalid_input(rejection.body_text()))
}

/// Non-blank field value, or `MISSING_REQUIRED_FIELD`
fn required(value: Option<String>, field: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::missing_field(field))
}

fn required_thread_id(value: Option<String>) -> AppResult<String> {
    let thread_id = required(value, "threadId")?;
    validate_resource_id(&thread_id, "threadId")?;
    Ok(thread_id)
}

/// Blank or absent means "start a new thread"
fn optional_thread_id(value: Option<String>) -> AppResult<Option<String>> {
    let thread_id = value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty());
    if let Some(id) = &thread_id {
        validate_resource_id(id, "threadId")?;
    }
    Ok(thread_id)
}

fn attach_request_id(error: AppError, request_id: Option<String>) -> AppError {
    match request_id {
        Some(id) => error.with_request_id(id),
        None => error,
    }
}
