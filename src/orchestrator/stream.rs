// ABOUTME: Stream-mode run driver that follows upstream run events in a background task
// ABOUTME: Forwards text deltas over a channel and splices tool-output continuations into the stream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

use super::{until_cancelled, PreparedTurn, RunEvent, RunOrchestrator, RunPhase, RunTracker};
use crate::assistant::{AssistantStreamEvent, RunEventStream};
use crate::errors::{AppError, AppResult, ErrorCode};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Receiving half of a streamed turn
///
/// Yields text deltas, then exactly one of `Ok(RunEvent::Completed)` or an
/// error. The channel closes after that.
pub type RunEventReceiver = mpsc::Receiver<AppResult<RunEvent>>;

/// Per-turn driver state
struct StreamSession<'a> {
    orchestrator: &'a RunOrchestrator,
    turn: &'a PreparedTurn,
    cancel: &'a CancellationToken,
    events: &'a mpsc::Sender<AppResult<RunEvent>>,
    tracker: Option<RunTracker>,
}

impl RunOrchestrator {
    /// Start a streamed run on a prepared thread
    ///
    /// The run is driven by a spawned task. Dropping the receiver or firing
    /// `cancel` stops it; the upstream run is then cancelled when
    /// `cancel_on_disconnect` is set.
    #[must_use]
    pub fn stream_turn(
        self: &Arc<Self>,
        turn: PreparedTurn,
        cancel: CancellationToken,
    ) -> RunEventReceiver {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let orchestrator = Arc::clone(self);
        let span = tracing::info_span!("stream_turn", thread_id = %turn.thread_id);

        tokio::spawn(
            async move {
                orchestrator.drive_stream(&turn, &cancel, &tx).await;
            }
            .instrument(span),
        );

        rx
    }

    async fn drive_stream(
        &self,
        turn: &PreparedTurn,
        cancel: &CancellationToken,
        events: &mpsc::Sender<AppResult<RunEvent>>,
    ) {
        let mut session = StreamSession {
            orchestrator: self,
            turn,
            cancel,
            events,
            tracker: None,
        };

        match session.run().await {
            Ok(()) => debug!("Streamed run completed"),
            Err(e) if e.code == ErrorCode::RunCancelled || events.is_closed() => {
                let run_id = session.tracker.as_ref().map(RunTracker::run_id);
                self.abandon(&turn.thread_id, run_id).await;
            }
            Err(e) => {
                // Receiver may already be gone; nothing else to report to
                let _ = events.send(Err(e)).await;
            }
        }
    }
}

impl StreamSession<'_> {
    async fn run(&mut self) -> AppResult<()> {
        let api = &self.orchestrator.api;
        let thread_id = self.turn.thread_id.as_str();

        let mut upstream = until_cancelled(
            self.cancel,
            api.create_run_stream(thread_id, &self.orchestrator.settings.assistant_id),
        )
        .await?;

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return Err(AppError::run_cancelled("Turn cancelled by the client"));
                }
                item = upstream.next() => item,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    return Err(AppError::run_failed(self.run_id(), "failed", Some(&e.message)));
                }
                None => {
                    return Err(AppError::run_failed(
                        self.run_id(),
                        "incomplete",
                        Some("event stream ended before the run completed"),
                    ));
                }
            };

            match event {
                AssistantStreamEvent::RunUpdated(run) => {
                    let tracker = self
                        .tracker
                        .get_or_insert_with(|| RunTracker::new(thread_id, &run.id));
                    match tracker.observe(&run) {
                        RunPhase::Pending => {}
                        RunPhase::RequiresAction(calls) => {
                            upstream = self.continue_with_tool_outputs(&run.id, &calls).await?;
                        }
                        RunPhase::Completed => {
                            self.emit(RunEvent::Completed).await?;
                            return Ok(());
                        }
                        RunPhase::Failed { status, reason } => {
                            return Err(AppError::run_failed(
                                &run.id,
                                status.as_str(),
                                reason.as_deref(),
                            ));
                        }
                    }
                }
                AssistantStreamEvent::MessageDelta { text, .. } => {
                    self.emit(RunEvent::TextDelta(text)).await?;
                }
                AssistantStreamEvent::Error(message) => {
                    return Err(AppError::run_failed(self.run_id(), "failed", Some(&message)));
                }
                // Ending without a terminal run event is caught when the stream closes
                AssistantStreamEvent::Done => {}
            }
        }
    }

    /// Answer tool calls and switch to the continuation stream
    async fn continue_with_tool_outputs(
        &self,
        run_id: &str,
        calls: &[crate::assistant::ToolCall],
    ) -> AppResult<RunEventStream> {
        let outputs = self.orchestrator.dispatcher.dispatch_all(calls).await;
        until_cancelled(
            self.cancel,
            self.orchestrator.api.submit_tool_outputs_stream(
                &self.turn.thread_id,
                run_id,
                &outputs,
            ),
        )
        .await
    }

    async fn emit(&self, event: RunEvent) -> AppResult<()> {
        self.events
            .send(Ok(event))
            .await
            .map_err(|_| AppError::run_cancelled("Stream consumer went away"))
    }

    fn run_id(&self) -> &str {
        self.tracker.as_ref().map_or("unknown", RunTracker::run_id)
    }
}
