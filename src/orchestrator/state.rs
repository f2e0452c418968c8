// ABOUTME: Run lifecycle state machine shared by poll and stream modes
// ABOUTME: Collapses upstream run statuses into phases and logs every transition
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::assistant::{Run, RunStatus, ToolCall};
use crate::logging::AppLogger;

/// What the orchestrator has to do next for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    /// `queued`, `in_progress` or an unrecognised status: keep waiting
    Pending,
    /// Tool outputs are needed before the run can continue
    RequiresAction(Vec<ToolCall>),
    /// Terminal success
    Completed,
    /// Terminal failure
    Failed {
        /// Upstream status that ended the run
        status: RunStatus,
        /// Upstream failure message, if any
        reason: Option<String>,
    },
}

impl RunPhase {
    /// Classify a run snapshot
    #[must_use]
    pub fn from_run(run: &Run) -> Self {
        match run.status {
            RunStatus::Completed => Self::Completed,
            RunStatus::RequiresAction if run.tool_calls().is_empty() => Self::Failed {
                status: run.status,
                reason: Some("requires_action without tool calls".to_owned()),
            },
            RunStatus::RequiresAction => Self::RequiresAction(run.tool_calls().to_vec()),
            status if status.is_failure() => Self::Failed {
                status,
                reason: run.failure_reason().map(str::to_owned),
            },
            _ => Self::Pending,
        }
    }
}

/// Follows one run and reports status changes
#[derive(Debug)]
pub struct RunTracker {
    thread_id: String,
    run_id: String,
    last_status: Option<RunStatus>,
}

impl RunTracker {
    /// Start tracking a run
    #[must_use]
    pub fn new(thread_id: &str, run_id: &str) -> Self {
        Self {
            thread_id: thread_id.to_owned(),
            run_id: run_id.to_owned(),
            last_status: None,
        }
    }

    /// Run being tracked
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Record a snapshot and classify it
    pub fn observe(&mut self, run: &Run) -> RunPhase {
        if self.last_status != Some(run.status) {
            AppLogger::log_run_transition(
                &self.thread_id,
                &self.run_id,
                self.last_status.map_or("new", RunStatus::as_str),
                run.status.as_str(),
            );
            self.last_status = Some(run.status);
        }
        RunPhase::from_run(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(status: &str) -> Run {
        serde_json::from_value(serde_json::json!({"id": "run_1", "status": status})).unwrap()
    }

    #[test]
    fn test_pending_statuses() {
        for status in ["queued", "in_progress", "cancelling", "brand_new_status"] {
            assert_eq!(RunPhase::from_run(&run(status)), RunPhase::Pending, "{status}");
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert_eq!(RunPhase::from_run(&run("completed")), RunPhase::Completed);
        for status in ["failed", "cancelled", "expired", "incomplete"] {
            let phase = RunPhase::from_run(&run(status));
            assert!(matches!(phase, RunPhase::Failed { .. }), "{status}");
        }
    }

    #[test]
    fn test_requires_action_without_calls_fails() {
        assert!(matches!(
            RunPhase::from_run(&run("requires_action")),
            RunPhase::Failed { .. }
        ));
    }

    #[test]
    fn test_failure_reason_is_kept() {
        let failed: Run = serde_json::from_value(serde_json::json!({
            "id": "run_1",
            "status": "failed",
            "last_error": {"code": "server_error", "message": "boom"}
        }))
        .unwrap();
        assert_eq!(
            RunPhase::from_run(&failed),
            RunPhase::Failed {
                status: RunStatus::Failed,
                reason: Some("boom".to_owned())
            }
        );
    }
}
