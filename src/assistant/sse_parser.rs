// ABOUTME: SSE (Server-Sent Events) line-buffering parser for streamed assistant runs
// ABOUTME: Handles partial lines across TCP boundaries and decodes run and message delta events
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # SSE Stream Parser
//!
//! Streamed runs arrive as Server-Sent Events:
//!
//! ```text
//! event: thread.message.delta
//! data: {"id":"msg_1","object":"thread.message.delta","delta":{...}}
//!
//! event: done
//! data: [DONE]
//! ```
//!
//! Network chunks do not line up with event boundaries. [`SseLineBuffer`]
//! accumulates bytes and only emits frames for complete lines, keeping the
//! trailing fragment for the next read. [`create_run_event_stream`] wraps a
//! byte stream with the buffer and decodes each frame into an
//! [`AssistantStreamEvent`]. Frames that fail to decode are logged and skipped
//! so a heartbeat or garbled fragment never aborts the run.

use std::collections::VecDeque;
use std::fmt::Display;
use std::mem;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use super::{AssistantStreamEvent, Run, RunEventStream};
use crate::constants::upstream;
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;

/// A complete SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A `data:` payload and the most recent `event:` name, if any
    Data {
        /// Value of the preceding `event:` field
        event: Option<String>,
        /// Payload with the `data:` prefix stripped
        data: String,
    },
    /// The `[DONE]` terminator
    Done,
}

/// Line-buffering SSE parser that handles partial lines across TCP chunk boundaries
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    /// Bytes not yet terminated by a newline
    buffer: String,
    /// Incomplete UTF-8 sequence carried over from the previous chunk
    pending_bytes: Vec<u8>,
    /// `event:` field of the frame being assembled
    current_event: Option<String>,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from a network chunk, returning every frame completed by it
    ///
    /// Any trailing partial line remains buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.push_utf8(bytes);

        let mut frames = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_owned();
            self.buffer.drain(..=newline_pos);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush whatever is left when the byte stream ends
    pub fn flush(&mut self) -> Vec<SseFrame> {
        if !self.pending_bytes.is_empty() {
            let tail = mem::take(&mut self.pending_bytes);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let remaining = mem::take(&mut self.buffer);
        let frame = self.process_line(remaining.trim_end_matches('\r'));
        self.current_event = None;
        frame.into_iter().collect()
    }

    /// Append bytes, holding back a split multi-byte character until it completes
    fn push_utf8(&mut self, bytes: &[u8]) {
        let mut data = mem::take(&mut self.pending_bytes);
        data.extend_from_slice(bytes);

        match std::str::from_utf8(&data) {
            Ok(text) => self.buffer.push_str(text),
            Err(e) if e.error_len().is_none() => {
                // Incomplete sequence at the end: keep it for the next chunk
                let valid = e.valid_up_to();
                self.buffer
                    .push_str(&String::from_utf8_lossy(&data[..valid]));
                self.pending_bytes = data[valid..].to_vec();
            }
            Err(_) => self.buffer.push_str(&String::from_utf8_lossy(&data)),
        }
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.trim().is_empty() {
            // Blank line ends the current event
            self.current_event = None;
            return None;
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line.split_once(':').map_or((line, ""), |(field, value)| {
            (field, value.strip_prefix(' ').unwrap_or(value))
        });

        match field {
            "event" => {
                self.current_event = Some(value.trim().to_owned());
                None
            }
            "data" => {
                if value.trim() == upstream::DONE_SENTINEL {
                    Some(SseFrame::Done)
                } else if value.trim().is_empty() {
                    None
                } else {
                    Some(SseFrame::Data {
                        event: self.current_event.clone(),
                        data: value.to_owned(),
                    })
                }
            }
            // id:, retry: and unknown fields
            _ => None,
        }
    }
}

// ============================================================================
// Frame decoding
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessageDeltaPayload {
    id: String,
    delta: MessageDeltaBody,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    content: Vec<DeltaContentPart>,
}

#[derive(Debug, Deserialize)]
struct DeltaContentPart {
    #[serde(rename = "type", default)]
    part_type: String,
    #[serde(default)]
    text: Option<DeltaText>,
}

#[derive(Debug, Deserialize)]
struct DeltaText {
    #[serde(default)]
    value: Option<String>,
}

/// Decode one frame into a run event
///
/// Returns `Ok(None)` for events the relay does not act on (run steps,
/// message lifecycle events) and `Err` for frames that cannot be decoded.
///
/// # Errors
///
/// Returns a `STREAM_PROTOCOL` error when the payload is not valid JSON or
/// does not match the shape its event name announces.
pub fn decode_frame(frame: SseFrame) -> AppResult<Option<AssistantStreamEvent>> {
    let (event, data) = match frame {
        SseFrame::Done => return Ok(Some(AssistantStreamEvent::Done)),
        SseFrame::Data { event, data } => (event, data),
    };
    if event.as_deref() == Some(upstream::DONE_EVENT) {
        return Ok(Some(AssistantStreamEvent::Done));
    }

    let payload: Value = serde_json::from_str(&data)
        .map_err(|e| AppError::stream_protocol(format!("invalid JSON payload: {e}")))?;

    // Fall back to the payload's `object` field when no event name was sent
    let name = event.unwrap_or_else(|| {
        payload
            .get("object")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    });

    if name == upstream::ERROR_EVENT {
        let message = payload
            .pointer("/error/message")
            .or_else(|| payload.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("unknown stream error")
            .to_owned();
        return Ok(Some(AssistantStreamEvent::Error(message)));
    }

    if name == upstream::MESSAGE_DELTA_EVENT {
        let delta: MessageDeltaPayload = serde_json::from_value(payload)
            .map_err(|e| AppError::stream_protocol(format!("invalid message delta: {e}")))?;
        let text: String = delta
            .delta
            .content
            .into_iter()
            .filter(|part| part.part_type == "text")
            .filter_map(|part| part.text.and_then(|t| t.value))
            .collect();
        if text.is_empty() {
            return Ok(None);
        }
        return Ok(Some(AssistantStreamEvent::MessageDelta {
            message_id: delta.id,
            text,
        }));
    }

    let is_run_event = (name.starts_with(upstream::RUN_EVENT_PREFIX)
        && !name.starts_with(upstream::RUN_STEP_EVENT_PREFIX))
        || name == "thread.run";
    if is_run_event {
        let run: Run = serde_json::from_value(payload)
            .map_err(|e| AppError::stream_protocol(format!("invalid run payload: {e}")))?;
        return Ok(Some(AssistantStreamEvent::RunUpdated(run)));
    }

    Ok(None)
}

// ============================================================================
// Stream construction
// ============================================================================

type ByteStream<E> = Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>;

/// Internal state for the event stream unfold
struct RunStreamState<E> {
    bytes: ByteStream<E>,
    parser: SseLineBuffer,
    pending: VecDeque<AppResult<AssistantStreamEvent>>,
    stream_ended: bool,
    operation: &'static str,
}

impl<E> RunStreamState<E> {
    fn enqueue(&mut self, frames: Vec<SseFrame>) {
        for frame in frames {
            let raw = match &frame {
                SseFrame::Data { data, .. } => data.clone(),
                SseFrame::Done => String::new(),
            };
            match decode_frame(frame) {
                Ok(Some(event)) => self.pending.push_back(Ok(event)),
                Ok(None) => {}
                Err(e) => AppLogger::log_stream_protocol_error(&e.message, &raw),
            }
        }
    }
}

/// Create a decoded run event stream from a raw SSE byte stream
///
/// `operation` names the upstream call for error messages. A transport error
/// ends the stream after yielding one `UPSTREAM_UNAVAILABLE` error.
pub fn create_run_event_stream<S, E>(byte_stream: S, operation: &'static str) -> RunEventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = RunStreamState {
        bytes: Box::pin(byte_stream) as ByteStream<E>,
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        stream_ended: false,
        operation,
    };

    let stream = unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.stream_ended {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.parser.feed(&chunk);
                    state.enqueue(frames);
                }
                Some(Err(e)) => {
                    state.stream_ended = true;
                    let error = AppError::upstream_unavailable(
                        state.operation,
                        format!("stream read error: {e}"),
                    );
                    return Some((Err(error), state));
                }
                None => {
                    state.stream_ended = true;
                    let frames = state.parser.flush();
                    state.enqueue(frames);
                }
            }
        }
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_attaches_to_data() {
        let mut parser = SseLineBuffer::new();
        let frames = parser.feed(b"event: thread.run.created\ndata: {\"id\":\"run_1\"}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame::Data {
                event: Some("thread.run.created".to_owned()),
                data: "{\"id\":\"run_1\"}".to_owned(),
            }]
        );
    }

    #[test]
    fn test_partial_line_is_retained() {
        let mut parser = SseLineBuffer::new();
        assert!(parser.feed(b"data: {\"a\":").is_empty());
        let frames = parser.feed(b"1}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame::Data {
                event: None,
                data: "{\"a\":1}".to_owned(),
            }]
        );
    }

    #[test]
    fn test_done_and_comments() {
        let mut parser = SseLineBuffer::new();
        let frames = parser.feed(b": keep-alive\n\nevent: done\ndata: [DONE]\n\n");
        assert_eq!(frames, vec![SseFrame::Done]);
    }

    #[test]
    fn test_split_multibyte_character() {
        let mut parser = SseLineBuffer::new();
        let bytes = "data: café\n".as_bytes();
        // Split inside the two-byte 'é'
        let split = bytes.len() - 2;
        assert!(parser.feed(&bytes[..split]).is_empty());
        let frames = parser.feed(&bytes[split..]);
        assert_eq!(
            frames,
            vec![SseFrame::Data {
                event: None,
                data: "café".to_owned(),
            }]
        );
    }

    #[test]
    fn test_flush_emits_unterminated_line() {
        let mut parser = SseLineBuffer::new();
        assert!(parser.feed(b"data: [DONE]").is_empty());
        assert_eq!(parser.flush(), vec![SseFrame::Done]);
    }

    #[test]
    fn test_decode_message_delta() {
        let frame = SseFrame::Data {
            event: Some("thread.message.delta".to_owned()),
            data: r#"{"id":"msg_1","object":"thread.message.delta","delta":{"content":[{"index":0,"type":"text","text":{"value":"Hi"}}]}}"#.to_owned(),
        };
        match decode_frame(frame).unwrap() {
            Some(AssistantStreamEvent::MessageDelta { message_id, text }) => {
                assert_eq!(message_id, "msg_1");
                assert_eq!(text, "Hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decode_uses_object_field_without_event_name() {
        let frame = SseFrame::Data {
            event: None,
            data: r#"{"id":"run_1","object":"thread.run","status":"completed"}"#.to_owned(),
        };
        assert!(matches!(
            decode_frame(frame).unwrap(),
            Some(AssistantStreamEvent::RunUpdated(run)) if run.id == "run_1"
        ));
    }

    #[test]
    fn test_decode_ignores_run_steps() {
        let frame = SseFrame::Data {
            event: Some("thread.run.step.created".to_owned()),
            data: r#"{"id":"step_1","object":"thread.run.step"}"#.to_owned(),
        };
        assert!(decode_frame(frame).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let frame = SseFrame::Data {
            event: Some("thread.message.delta".to_owned()),
            data: "{not json".to_owned(),
        };
        let error = decode_frame(frame).unwrap_err();
        assert_eq!(error.code, crate::errors::ErrorCode::StreamProtocol);
    }
}
