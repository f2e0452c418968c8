// ABOUTME: Stream relay turning orchestrator run events into client stream events
// ABOUTME: Guarantees start first, paced message events, and exactly one terminal done or error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Stream Relay
//!
//! The client never sees the upstream wire format. It receives:
//!
//! ```text
//! data: {"type":"start","threadId":"thread_abc"}
//! data: {"type":"message","text":"H"}
//! data: {"type":"message","text":"i"}
//! data: {"type":"done"}
//! ```
//!
//! `start` always comes first, the stream always ends with exactly one of
//! `done` or `error`, and nothing follows the terminal event. The [`Pacer`]
//! decides how text is cut up and how fast it is released.
//!
//! Server shutdown ends every open relay with an `error` event, so graceful
//! shutdown never waits on an idle, kept-alive stream.

use axum::response::sse::Event;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::AppResult;
use crate::orchestrator::RunEvent;

/// Emission pacing policy
pub mod pacing;

pub use pacing::Pacer;

/// Event delivered to the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientStreamEvent {
    /// First event of every turn
    Start {
        /// Thread the turn runs on
        #[serde(rename = "threadId")]
        thread_id: String,
    },
    /// One unit of assistant text
    Message {
        /// Text to append
        text: String,
    },
    /// The reply is complete
    Done,
    /// The turn failed
    Error {
        /// Description of the failure
        error: String,
    },
}

impl ClientStreamEvent {
    /// Render as an SSE `data:` frame
    #[must_use]
    pub fn to_sse_event(&self) -> Event {
        let payload = serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","error":"failed to encode stream event"}"#.to_owned()
        });
        Event::default().data(payload)
    }
}

/// Message of the terminal event sent when the server stops mid-turn
pub const SHUTDOWN_MESSAGE: &str = "Server is shutting down";

/// Re-emits orchestrator events as client stream events
#[derive(Debug, Clone, Default)]
pub struct StreamRelay {
    pacer: Pacer,
    shutdown: CancellationToken,
}

impl StreamRelay {
    /// Create a relay with a pacing policy
    #[must_use]
    pub fn new(pacer: Pacer) -> Self {
        Self {
            pacer,
            shutdown: CancellationToken::new(),
        }
    }

    /// End relays with an `error` event once `shutdown` is cancelled
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Replace the pacing policy, keeping the shutdown token
    #[must_use]
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Server-wide shutdown token
    #[must_use]
    pub const fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Relay one turn
    ///
    /// `cancel` is fired when the returned stream is dropped before its
    /// terminal event, or when the server shuts down mid-turn, which stops
    /// the orchestrator driving the run.
    pub fn relay<S>(
        &self,
        thread_id: String,
        mut source: S,
        cancel: CancellationToken,
    ) -> impl Stream<Item = ClientStreamEvent> + Send + 'static
    where
        S: Stream<Item = AppResult<RunEvent>> + Send + Unpin + 'static,
    {
        let pacer = self.pacer;
        let shutdown = self.shutdown.clone();

        async_stream::stream! {
            let guard = cancel.drop_guard();

            yield ClientStreamEvent::Start { thread_id };

            let mut interrupted = false;
            let terminal = loop {
                let next = tokio::select! {
                    biased;
                    () = shutdown.cancelled() => {
                        interrupted = true;
                        break ClientStreamEvent::Error {
                            error: SHUTDOWN_MESSAGE.to_owned(),
                        };
                    }
                    next = source.next() => next,
                };
                match next {
                    Some(Ok(RunEvent::TextDelta(text))) => {
                        for unit in pacer.units(&text) {
                            yield ClientStreamEvent::Message { text: unit };
                            pacer.pause().await;
                        }
                    }
                    Some(Ok(RunEvent::Completed)) => break ClientStreamEvent::Done,
                    Some(Err(e)) => break ClientStreamEvent::Error { error: e.to_string() },
                    None => {
                        break ClientStreamEvent::Error {
                            error: "Run event stream ended unexpectedly".to_owned(),
                        }
                    }
                }
            };

            if interrupted {
                drop(guard);
            } else {
                // Turn is over; dropping the stream now must not cancel anything
                let _token = guard.disarm();
            }
            yield terminal;
        }
    }
}
