// ABOUTME: Run orchestrator driving one chat turn against the assistant service
// ABOUTME: Prepares the thread, then completes the run by polling or by following its event stream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Run Orchestrator
//!
//! A chat turn is: ensure a thread exists, post the user's question, start a
//! run, and keep it moving until it reaches a terminal state. Whenever the run
//! enters `requires_action` every pending tool call is answered through the
//! [`ToolDispatcher`] and the outputs are submitted in one request.
//!
//! Two completion modes share the same state machine ([`RunPhase`]):
//!
//! - [`RunOrchestrator::complete_turn`] polls the run on a fixed interval and
//!   returns the final assistant text.
//! - [`RunOrchestrator::stream_turn`] follows the upstream event stream in a
//!   background task and forwards text deltas over a channel.
//!
//! Both observe a [`CancellationToken`]. Once it fires no further upstream
//! call is started, and the in-flight run is cancelled when
//! `cancel_on_disconnect` is set.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::assistant::{AssistantApi, MessageRole};
use crate::config::OrchestrationConfig;
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use crate::tools::ToolDispatcher;

mod poll;
/// Run status state machine
pub mod state;
mod stream;

pub use state::{RunPhase, RunTracker};
pub use stream::RunEventReceiver;

/// Settings for driving runs
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Assistant that executes runs
    pub assistant_id: String,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Give up on a run after this long
    pub poll_timeout: Duration,
    /// Cancel the upstream run when the caller goes away
    pub cancel_on_disconnect: bool,
}

impl OrchestratorSettings {
    /// Build settings from orchestration config
    #[must_use]
    pub fn new(assistant_id: impl Into<String>, config: &OrchestrationConfig) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            poll_interval: config.poll_interval(),
            poll_timeout: config.poll_timeout(),
            cancel_on_disconnect: config.cancel_on_disconnect,
        }
    }
}

/// Thread ready for a run: the question has been posted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTurn {
    /// Thread the run executes on
    pub thread_id: String,
    /// Whether the thread was created for this turn
    pub created_thread: bool,
}

/// Outcome of a polled turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    /// Final assistant reply
    pub text: String,
    /// Thread the conversation lives on
    pub thread_id: String,
}

/// Progress of a streamed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A fragment of assistant text, in arrival order
    TextDelta(String),
    /// The run completed; nothing follows
    Completed,
}

/// Drives runs to completion
pub struct RunOrchestrator {
    api: Arc<dyn AssistantApi>,
    dispatcher: ToolDispatcher,
    settings: OrchestratorSettings,
}

impl RunOrchestrator {
    /// Create an orchestrator
    #[must_use]
    pub fn new(
        api: Arc<dyn AssistantApi>,
        dispatcher: ToolDispatcher,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            api,
            dispatcher,
            settings,
        }
    }

    /// Settings in use
    #[must_use]
    pub const fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Ensure a thread exists and post the question to it
    ///
    /// A missing or blank `thread_id` creates a new thread.
    ///
    /// # Errors
    ///
    /// Returns the upstream error if the thread cannot be created or the
    /// message cannot be posted.
    #[instrument(skip(self, question), fields(question_len = question.len()))]
    pub async fn prepare_turn(
        &self,
        question: &str,
        thread_id: Option<&str>,
    ) -> AppResult<PreparedTurn> {
        let existing = thread_id.map(str::trim).filter(|id| !id.is_empty());
        let (thread_id, created_thread) = match existing {
            Some(id) => (id.to_owned(), false),
            None => (self.api.create_thread().await?.id, true),
        };

        self.api
            .post_message(&thread_id, MessageRole::User, question)
            .await?;
        debug!(thread_id = %thread_id, created_thread, "Question posted");

        Ok(PreparedTurn {
            thread_id,
            created_thread,
        })
    }

    /// Best-effort upstream cancellation after the caller went away
    async fn abandon(&self, thread_id: &str, run_id: Option<&str>) {
        let cancel_upstream = self.settings.cancel_on_disconnect && run_id.is_some();
        AppLogger::log_client_disconnect(thread_id, run_id, cancel_upstream);

        if let (true, Some(run_id)) = (cancel_upstream, run_id) {
            if let Err(e) = self.api.cancel_run(thread_id, run_id).await {
                warn!(thread_id = %thread_id, run_id = %run_id, error = %e, "Run cancellation failed");
            }
        }
    }
}

/// Await `future` unless `cancel` fires first
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AppError::run_cancelled("Turn cancelled by the client")),
        result = future => result,
    }
}
