// ABOUTME: Scripted in-memory assistant service for orchestrator and route tests
// ABOUTME: Replays queued run states and event streams and records every call made

use assistant_relay::assistant::{
    AssistantApi, AssistantStreamEvent, MessageRole, Run, RunEventStream, Thread,
    ThreadMessage, ToolOutput,
};
use assistant_relay::errors::{AppError, AppResult};
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// One recorded upstream call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateThread,
    PostMessage { thread_id: String, content: String },
    CreateRun { thread_id: String, stream: bool },
    GetRun { run_id: String },
    SubmitToolOutputs {
        run_id: String,
        outputs: Vec<ToolOutput>,
        stream: bool,
    },
    ListMessages { thread_id: String },
    DeleteThread { thread_id: String },
    CancelRun { run_id: String },
}

/// Step of a scripted event stream
#[derive(Debug, Clone)]
pub enum StreamStep {
    /// Yield a decoded event
    Event(AssistantStreamEvent),
    /// Yield a transport error
    Fail(String),
    /// Never yield again
    Hang,
}

/// Scripted implementation of [`AssistantApi`]
#[derive(Default)]
pub struct ScriptedAssistant {
    calls: Mutex<Vec<Call>>,
    runs: Mutex<VecDeque<Run>>,
    streams: Mutex<VecDeque<Vec<StreamStep>>>,
    messages: Mutex<Vec<ThreadMessage>>,
    failures: Mutex<HashMap<&'static str, (u16, String)>>,
}

impl ScriptedAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue run snapshots: `create_run` returns the first, each later
    /// `get_run`/`submit_tool_outputs` the next; the last one repeats
    pub fn with_runs(self, runs: Vec<Run>) -> Self {
        self.runs.lock().unwrap().extend(runs);
        self
    }

    /// Queue an event stream for the next streaming call
    pub fn with_stream(self, steps: Vec<StreamStep>) -> Self {
        self.streams.lock().unwrap().push_back(steps);
        self
    }

    /// Seed thread history, oldest first
    pub fn with_messages(self, messages: Vec<ThreadMessage>) -> Self {
        self.messages.lock().unwrap().extend(messages);
        self
    }

    /// Make `operation` fail with an upstream HTTP error
    pub fn fail_on(self, operation: &'static str, status: u16, body: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(operation, (status, body.to_owned()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until a call matching `pred` has been recorded
    pub async fn wait_for_call(&self, pred: impl Fn(&Call) -> bool) -> bool {
        for _ in 0..200 {
            if self.calls().iter().any(&pred) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, operation: &'static str) -> AppResult<()> {
        match self.failures.lock().unwrap().get(operation) {
            Some((status, body)) => Err(AppError::upstream(operation, *status, body.clone())),
            None => Ok(()),
        }
    }

    fn next_run(&self) -> AppResult<Run> {
        let mut runs = self.runs.lock().unwrap();
        if runs.len() > 1 {
            Ok(runs.pop_front().unwrap())
        } else {
            runs.front()
                .cloned()
                .ok_or_else(|| AppError::internal("no scripted run"))
        }
    }

    fn next_stream(&self) -> AppResult<RunEventStream> {
        let steps = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::internal("no scripted stream"))?;

        let hang = matches!(steps.last(), Some(StreamStep::Hang));
        let items: Vec<AppResult<AssistantStreamEvent>> = steps
            .into_iter()
            .filter_map(|step| match step {
                StreamStep::Event(event) => Some(Ok(event)),
                StreamStep::Fail(message) => {
                    Some(Err(AppError::upstream_unavailable("stream", message)))
                }
                StreamStep::Hang => None,
            })
            .collect();

        let events = stream::iter(items);
        if hang {
            Ok(Box::pin(events.chain(stream::pending())))
        } else {
            Ok(Box::pin(events))
        }
    }
}

#[async_trait]
impl AssistantApi for ScriptedAssistant {
    async fn create_thread(&self) -> AppResult<Thread> {
        self.record(Call::CreateThread);
        self.check("createThread")?;
        Ok(Thread {
            id: "thread_new".to_owned(),
            created_at: 1_700_000_000,
        })
    }

    async fn post_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> AppResult<ThreadMessage> {
        self.record(Call::PostMessage {
            thread_id: thread_id.to_owned(),
            content: content.to_owned(),
        });
        self.check("postMessage")?;
        Ok(ThreadMessage::text_message("msg_posted", role, content, 1_700_000_001))
    }

    async fn create_run(&self, thread_id: &str, _assistant_id: &str) -> AppResult<Run> {
        self.record(Call::CreateRun {
            thread_id: thread_id.to_owned(),
            stream: false,
        });
        self.check("createRun")?;
        self.next_run()
    }

    async fn create_run_stream(
        &self,
        thread_id: &str,
        _assistant_id: &str,
    ) -> AppResult<RunEventStream> {
        self.record(Call::CreateRun {
            thread_id: thread_id.to_owned(),
            stream: true,
        });
        self.check("createRun")?;
        self.next_stream()
    }

    async fn get_run(&self, _thread_id: &str, run_id: &str) -> AppResult<Run> {
        self.record(Call::GetRun {
            run_id: run_id.to_owned(),
        });
        self.check("getRunStatus")?;
        self.next_run()
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> AppResult<Run> {
        self.record(Call::SubmitToolOutputs {
            run_id: run_id.to_owned(),
            outputs: outputs.to_vec(),
            stream: false,
        });
        self.check("submitToolOutputs")?;
        self.next_run()
    }

    async fn submit_tool_outputs_stream(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> AppResult<RunEventStream> {
        self.record(Call::SubmitToolOutputs {
            run_id: run_id.to_owned(),
            outputs: outputs.to_vec(),
            stream: true,
        });
        self.check("submitToolOutputs")?;
        self.next_stream()
    }

    async fn list_messages(&self, thread_id: &str) -> AppResult<Vec<ThreadMessage>> {
        self.record(Call::ListMessages {
            thread_id: thread_id.to_owned(),
        });
        self.check("getMessages")?;
        Ok(self.messages.lock().unwrap().clone())
    }

    async fn delete_thread(&self, thread_id: &str) -> AppResult<()> {
        self.record(Call::DeleteThread {
            thread_id: thread_id.to_owned(),
        });
        self.check("deleteThread")
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> AppResult<Run> {
        self.record(Call::CancelRun {
            run_id: run_id.to_owned(),
        });
        self.check("cancelRun")?;
        Ok(run(run_id, "cancelling"))
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Run snapshot with a status
pub fn run(id: &str, status: &str) -> Run {
    serde_json::from_value(json!({
        "id": id,
        "object": "thread.run",
        "thread_id": "thread_1",
        "status": status
    }))
    .unwrap()
}

/// `requires_action` run asking for `web_search` calls, one per `(id, query)`
pub fn requires_search(id: &str, calls: &[(&str, &str)]) -> Run {
    let tool_calls: Vec<_> = calls
        .iter()
        .map(|(call_id, query)| {
            json!({
                "id": call_id,
                "type": "function",
                "function": {
                    "name": "web_search",
                    "arguments": json!({ "query": query }).to_string()
                }
            })
        })
        .collect();
    serde_json::from_value(json!({
        "id": id,
        "thread_id": "thread_1",
        "status": "requires_action",
        "required_action": {
            "type": "submit_tool_outputs",
            "submit_tool_outputs": { "tool_calls": tool_calls }
        }
    }))
    .unwrap()
}

/// Failed run with an upstream reason
pub fn failed_run(id: &str, message: &str) -> Run {
    serde_json::from_value(json!({
        "id": id,
        "thread_id": "thread_1",
        "status": "failed",
        "last_error": { "code": "server_error", "message": message }
    }))
    .unwrap()
}

/// Assistant reply tagged with its run
pub fn assistant_reply(id: &str, run_id: &str, text: &str, created_at: i64) -> ThreadMessage {
    let mut message = ThreadMessage::text_message(id, MessageRole::Assistant, text, created_at);
    message.run_id = Some(run_id.to_owned());
    message
}

pub fn user_message(id: &str, text: &str, created_at: i64) -> ThreadMessage {
    ThreadMessage::text_message(id, MessageRole::User, text, created_at)
}

/// Stream step for a run status event
pub fn run_event(run: Run) -> StreamStep {
    StreamStep::Event(AssistantStreamEvent::RunUpdated(run))
}

/// Stream step for a text delta
pub fn delta(text: &str) -> StreamStep {
    StreamStep::Event(AssistantStreamEvent::MessageDelta {
        message_id: "msg_reply".to_owned(),
        text: text.to_owned(),
    })
}
