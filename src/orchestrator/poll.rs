// ABOUTME: Poll-mode run completion that checks run status on a fixed interval
// ABOUTME: Dispatches tool calls on requires_action and returns the final assistant text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::{until_cancelled, PreparedTurn, RunOrchestrator, RunPhase, RunTracker, TurnResult};
use crate::assistant::{MessageRole, ThreadMessage};
use crate::errors::{AppError, AppResult, ErrorCode};

impl RunOrchestrator {
    /// Run the assistant on a prepared thread and wait for its reply
    ///
    /// # Errors
    ///
    /// - `RUN_FAILED` when the run ends in a failure status or exceeds the poll timeout
    /// - `RUN_CANCELLED` when `cancel` fires first
    /// - upstream errors from any call made along the way
    #[instrument(skip(self, turn, cancel), fields(thread_id = %turn.thread_id))]
    pub async fn complete_turn(
        &self,
        turn: &PreparedTurn,
        cancel: &CancellationToken,
    ) -> AppResult<TurnResult> {
        let thread_id = turn.thread_id.as_str();
        let run = until_cancelled(
            cancel,
            self.api.create_run(thread_id, &self.settings.assistant_id),
        )
        .await?;

        let mut tracker = RunTracker::new(thread_id, &run.id);
        let mut phase = tracker.observe(&run);
        let deadline = Instant::now() + self.settings.poll_timeout;

        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            match phase {
                RunPhase::Completed => {
                    let text = self.final_text(thread_id, tracker.run_id(), cancel).await?;
                    return Ok(TurnResult {
                        text,
                        thread_id: thread_id.to_owned(),
                    });
                }
                RunPhase::Failed { status, reason } => {
                    return Err(AppError::run_failed(
                        tracker.run_id(),
                        status.as_str(),
                        reason.as_deref(),
                    ));
                }
                RunPhase::RequiresAction(calls) => {
                    let outputs = self.dispatcher.dispatch_all(&calls).await;
                    let run = match until_cancelled(
                        cancel,
                        self.api
                            .submit_tool_outputs(thread_id, tracker.run_id(), &outputs),
                    )
                    .await
                    {
                        Ok(run) => run,
                        Err(e) if e.code == ErrorCode::RunCancelled => {
                            self.abandon(thread_id, Some(tracker.run_id())).await;
                            return Err(e);
                        }
                        Err(e) => return Err(e),
                    };
                    phase = tracker.observe(&run);
                }
                RunPhase::Pending => {
                    if Instant::now() >= deadline {
                        info!(run_id = %tracker.run_id(), "Run poll timeout reached, cancelling");
                        self.abandon(thread_id, Some(tracker.run_id())).await;
                        return Err(AppError::run_failed(
                            tracker.run_id(),
                            "timeout",
                            Some(&format!(
                                "run did not finish within {}s",
                                self.settings.poll_timeout.as_secs()
                            )),
                        ));
                    }

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            self.abandon(thread_id, Some(tracker.run_id())).await;
                            return Err(AppError::run_cancelled("Turn cancelled by the client"));
                        }
                        _ = ticker.tick() => {}
                    }

                    let run = until_cancelled(cancel, self.api.get_run(thread_id, tracker.run_id()))
                        .await?;
                    phase = tracker.observe(&run);
                }
            }
        }
    }

    /// Text of the assistant reply written by `run_id`
    async fn final_text(
        &self,
        thread_id: &str,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<String> {
        let messages = until_cancelled(cancel, self.api.list_messages(thread_id)).await?;
        reply_text(&messages, run_id).ok_or_else(|| {
            AppError::new(
                ErrorCode::UpstreamError,
                format!("Run {run_id} completed without an assistant message"),
            )
        })
    }
}

/// Pick the reply from chronological thread messages
///
/// Messages tagged with the run win; otherwise the latest assistant message.
fn reply_text(messages: &[ThreadMessage], run_id: &str) -> Option<String> {
    let from_run: Vec<String> = messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant && m.run_id.as_deref() == Some(run_id))
        .map(ThreadMessage::text)
        .collect();
    if !from_run.is_empty() {
        return Some(from_run.join("\n\n"));
    }

    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::Assistant)
        .map(ThreadMessage::text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant(id: &str, text: &str, run_id: Option<&str>) -> ThreadMessage {
        let mut message = ThreadMessage::text_message(id, MessageRole::Assistant, text, 0);
        message.run_id = run_id.map(str::to_owned);
        message
    }

    #[test]
    fn test_reply_prefers_run_messages() {
        let messages = vec![
            assistant("m1", "old answer", Some("run_0")),
            ThreadMessage::text_message("m2", MessageRole::User, "question", 1),
            assistant("m3", "part one", Some("run_1")),
            assistant("m4", "part two", Some("run_1")),
        ];
        assert_eq!(
            reply_text(&messages, "run_1").as_deref(),
            Some("part one\n\npart two")
        );
    }

    #[test]
    fn test_reply_falls_back_to_latest_assistant_message() {
        let messages = vec![
            assistant("m1", "first", None),
            ThreadMessage::text_message("m2", MessageRole::User, "q", 1),
            assistant("m3", "latest", None),
        ];
        assert_eq!(reply_text(&messages, "run_9").as_deref(), Some("latest"));
    }

    #[test]
    fn test_reply_missing() {
        let messages = vec![ThreadMessage::text_message("m1", MessageRole::User, "q", 0)];
        assert!(reply_text(&messages, "run_1").is_none());
    }
}
