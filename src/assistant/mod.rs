// ABOUTME: Upstream assistant service abstraction with threads, messages, and runs
// ABOUTME: Defines wire types, run statuses, stream events, and the AssistantApi trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Upstream Assistant Client
//!
//! Typed access to a hosted assistant service that keeps conversation state in
//! threads and processes them with asynchronous runs.
//!
//! ## Design
//!
//! - [`AssistantApi`] is the seam the orchestrator depends on. [`AssistantClient`]
//!   implements it over HTTP; tests substitute scripted implementations.
//! - Every operation fails with an `UPSTREAM_ERROR` carrying the operation name,
//!   HTTP status and response body. Nothing here retries: creating messages and
//!   runs is not idempotent.
//! - [`AssistantApi::list_messages`] always returns messages oldest first.

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::pin::Pin;

use crate::errors::{AppError, AppResult};

/// HTTP implementation of [`AssistantApi`]
pub mod client;
/// SSE line buffering and run event decoding
pub mod sse_parser;

pub use client::AssistantClient;
pub use sse_parser::{create_run_event_stream, SseFrame, SseLineBuffer};

// ============================================================================
// Identifiers
// ============================================================================

/// Check that an upstream id (thread, run) is one opaque path segment
///
/// Ids are interpolated into upstream URLs, so anything outside
/// `[A-Za-z0-9_-]` is rejected with `INVALID_INPUT`.
///
/// # Errors
///
/// Returns `INVALID_INPUT` naming `field` when `id` is empty or contains
/// any other character.
pub fn validate_resource_id(id: &str, field: &str) -> AppResult<()> {
    let valid = !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(AppError::invalid_id(field))
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Author of a thread message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End user
    User,
    /// The assistant
    Assistant,
}

impl MessageRole {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Upstream conversation thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    /// Opaque thread identifier
    pub id: String,
    /// Creation time (unix seconds)
    #[serde(default)]
    pub created_at: i64,
}

/// Text payload of a message content part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    /// The text itself
    pub value: String,
    /// Citations and file references, passed through untouched
    #[serde(default)]
    pub annotations: Vec<Value>,
}

/// One content part of a thread message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text
    Text {
        /// Text payload
        text: TextContent,
    },
    /// Images and other non-text parts
    #[serde(other)]
    Other,
}

/// A message stored on a thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// Message identifier
    pub id: String,
    /// Author
    pub role: MessageRole,
    /// Content parts
    #[serde(default)]
    pub content: Vec<MessageContent>,
    /// Creation time (unix seconds)
    #[serde(default)]
    pub created_at: i64,
    /// Run that produced the message (assistant messages only)
    #[serde(default)]
    pub run_id: Option<String>,
}

impl ThreadMessage {
    /// Build a single-part text message
    #[must_use]
    pub fn text_message(
        id: impl Into<String>,
        role: MessageRole,
        text: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            content: vec![MessageContent::Text {
                text: TextContent {
                    value: text.into(),
                    annotations: Vec::new(),
                },
            }],
            created_at,
            run_id: None,
        }
    }

    /// Concatenated text of all text parts
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Runs
// ============================================================================

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting to start
    Queued,
    /// Being processed
    InProgress,
    /// Waiting for tool outputs
    RequiresAction,
    /// Cancellation requested
    Cancelling,
    /// Cancelled
    Cancelled,
    /// Failed
    Failed,
    /// Finished successfully
    Completed,
    /// Ended early (token limits)
    Incomplete,
    /// Timed out upstream
    Expired,
    /// Status this client does not know yet
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }

    /// Terminal statuses other than `completed`
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Cancelled | Self::Expired | Self::Incomplete
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Function invocation requested by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,
    /// JSON encoded arguments
    pub arguments: String,
}

/// A tool call embedded in a `requires_action` run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, echoed back in the output
    pub id: String,
    /// Always `function` today
    #[serde(rename = "type", default = "function_call_type")]
    pub call_type: String,
    /// Function and arguments
    pub function: FunctionCall,
}

fn function_call_type() -> String {
    "function".to_owned()
}

impl ToolCall {
    /// Build a function tool call
    #[must_use]
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: function_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Result submitted for one tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Matches [`ToolCall::id`]
    pub tool_call_id: String,
    /// JSON encoded result
    pub output: String,
}

/// Tool calls awaiting outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitToolOutputs {
    /// Calls to answer, all in one batch
    pub tool_calls: Vec<ToolCall>,
}

/// Action the run is blocked on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredAction {
    /// `submit_tool_outputs`
    #[serde(rename = "type", default)]
    pub action_type: String,
    /// Pending tool calls
    pub submit_tool_outputs: SubmitToolOutputs,
}

/// Failure reason reported on a failed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLastError {
    /// Upstream error code
    #[serde(default)]
    pub code: String,
    /// Upstream message
    #[serde(default)]
    pub message: String,
}

/// An assistant run over a thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Run identifier
    pub id: String,
    /// Owning thread
    #[serde(default)]
    pub thread_id: String,
    /// Current status
    pub status: RunStatus,
    /// Present when `status == requires_action`
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    /// Present when the run failed
    #[serde(default)]
    pub last_error: Option<RunLastError>,
}

impl Run {
    /// Tool calls the run is waiting on (empty unless `requires_action`)
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match &self.required_action {
            Some(action) => &action.submit_tool_outputs.tool_calls,
            None => &[],
        }
    }

    /// Upstream failure message if any
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.last_error.as_ref().map(|e| e.message.as_str())
    }
}

// ============================================================================
// Streaming
// ============================================================================

/// Decoded event from a streamed run
#[derive(Debug, Clone)]
pub enum AssistantStreamEvent {
    /// Any `thread.run.*` event carrying the run object
    RunUpdated(Run),
    /// Incremental assistant text
    MessageDelta {
        /// Message being written
        message_id: String,
        /// New text
        text: String,
    },
    /// Upstream reported an error inside the stream
    Error(String),
    /// `[DONE]` terminator
    Done,
}

/// Stream of decoded run events
pub type RunEventStream = Pin<Box<dyn Stream<Item = AppResult<AssistantStreamEvent>> + Send>>;

// ============================================================================
// Client trait
// ============================================================================

/// Operations the relay needs from the assistant service
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Create an empty thread
    async fn create_thread(&self) -> AppResult<Thread>;

    /// Append a message to a thread
    async fn post_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> AppResult<ThreadMessage>;

    /// Start a run and return its initial state
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> AppResult<Run>;

    /// Start a run with streaming enabled
    async fn create_run_stream(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> AppResult<RunEventStream>;

    /// Fetch the current run state
    async fn get_run(&self, thread_id: &str, run_id: &str) -> AppResult<Run>;

    /// Submit one output per pending tool call
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> AppResult<Run>;

    /// Submit tool outputs and continue the run as a stream
    async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> AppResult<RunEventStream>;

    /// All messages of a thread, oldest first
    async fn list_messages(&self, thread_id: &str) -> AppResult<Vec<ThreadMessage>>;

    /// Delete a thread
    async fn delete_thread(&self, thread_id: &str) -> AppResult<()>;

    /// Request cancellation of an in-flight run
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> AppResult<Run>;
}
