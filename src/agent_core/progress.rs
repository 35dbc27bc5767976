//! Progress Tracker: an append-only record of one orchestration run.
//!
//! The tracker never decides anything. It mirrors the events the
//! orchestrator emits so the UI can render the current phase and a per-call
//! audit log. Every operation is infallible; out-of-order calls (completing
//! a call that never started, adding a call outside an iteration) are
//! ignored.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::capabilities::types::CapabilityDomain;

use super::types::ProgressEvent;

/// Maximum characters kept from a tool result for display.
pub const PREVIEW_CHARS: usize = 120;

/// Truncate to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn preview(message: &str) -> String {
    let message = message.trim();
    match message.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

// ─── Types ──────────────────────────────────────────────────────────────────

/// Coarse state surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ProcessPhase {
    Idle,
    LoadingTools,
    Thinking,
    CallingTool { name: String },
    ProcessingResult { name: String },
    /// Stopped until the user confirms or cancels held actions.
    AwaitingConfirmation { count: usize },
    Completed,
    Error { message: String },
}

impl ProcessPhase {
    fn is_terminal(&self) -> bool {
        matches!(self, ProcessPhase::Completed | ProcessPhase::Error { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    /// Provider call id, when the caller supplied one.
    pub call_id: Option<String>,
    pub name: String,
    pub domain: Option<CapabilityDomain>,
    pub status: ToolCallStatus,
    /// First `PREVIEW_CHARS` characters of the result.
    pub preview: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ToolCallRecord {
    fn finish(&mut self, success: bool, message: &str) {
        self.status = if success {
            ToolCallStatus::Success
        } else {
            ToolCallStatus::Failed
        };
        self.preview = Some(preview(message));
        self.ended_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessIteration {
    pub number: usize,
    pub tool_calls: Vec<ToolCallRecord>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

// ─── Tracker ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ProgressTracker {
    phase: ProcessPhase,
    tool_names: Vec<String>,
    iterations: Vec<ProcessIteration>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            phase: ProcessPhase::Idle,
            tool_names: Vec::new(),
            iterations: Vec::new(),
        }
    }

    pub fn phase(&self) -> &ProcessPhase {
        &self.phase
    }

    pub fn iterations(&self) -> &[ProcessIteration] {
        &self.iterations
    }

    pub fn tool_names(&self) -> &[String] {
        &self.tool_names
    }

    /// Every recorded call across all iterations.
    pub fn tool_call_count(&self) -> usize {
        self.iterations.iter().map(|i| i.tool_calls.len()).sum()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Mark the start of tool discovery for a new run.
    pub fn loading_tools(&mut self) {
        if self.phase == ProcessPhase::Idle {
            self.phase = ProcessPhase::LoadingTools;
        }
    }

    pub fn tools_loaded(&mut self, names: &[String]) {
        if self.phase.is_terminal() {
            return;
        }
        self.tool_names = names.to_vec();
    }

    /// Open iteration `number`. Numbers must increase; anything else is ignored.
    pub fn start_iteration(&mut self, number: usize) {
        if self.phase.is_terminal() {
            return;
        }
        if self.iterations.last().is_some_and(|last| last.number >= number) {
            return;
        }
        self.close_open_iteration();
        self.iterations.push(ProcessIteration {
            number,
            tool_calls: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        });
        self.phase = ProcessPhase::Thinking;
    }

    pub fn add_tool_call(&mut self, name: &str, domain: Option<CapabilityDomain>) {
        self.push_call(None, name, domain);
    }

    pub fn add_tool_call_with_id(&mut self, call_id: &str, name: &str, domain: Option<CapabilityDomain>) {
        self.push_call(Some(call_id.to_string()), name, domain);
    }

    /// Complete the most recent running call named `name`.
    ///
    /// Two concurrent calls to the same tool are indistinguishable here; use
    /// `complete_tool_call_by_id` when the call id is known.
    pub fn complete_tool_call(&mut self, name: &str, success: bool, message: &str) {
        let Some(record) = self.open_iteration_mut().and_then(|iteration| {
            iteration
                .tool_calls
                .iter_mut()
                .rev()
                .find(|c| c.name == name && c.status == ToolCallStatus::Running)
        }) else {
            return;
        };
        record.finish(success, message);
        self.phase = ProcessPhase::ProcessingResult {
            name: name.to_string(),
        };
    }

    /// Complete the running call with this id.
    pub fn complete_tool_call_by_id(&mut self, call_id: &str, success: bool, message: &str) {
        let Some(record) = self.open_iteration_mut().and_then(|iteration| {
            iteration.tool_calls.iter_mut().find(|c| {
                c.call_id.as_deref() == Some(call_id) && c.status == ToolCallStatus::Running
            })
        }) else {
            return;
        };
        record.finish(success, message);
        let name = record.name.clone();
        self.phase = ProcessPhase::ProcessingResult { name };
    }

    pub fn complete_iteration(&mut self) {
        if let Some(iteration) = self.open_iteration_mut() {
            iteration.ended_at = Some(Utc::now());
            self.phase = ProcessPhase::Thinking;
        }
    }

    /// Park the run while `count` actions wait for a decision.
    pub fn awaiting_confirmation(&mut self, count: usize) {
        if self.phase.is_terminal() {
            return;
        }
        self.close_open_iteration();
        self.phase = ProcessPhase::AwaitingConfirmation { count };
    }

    pub fn set_completed(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        self.close_open_iteration();
        self.phase = ProcessPhase::Completed;
    }

    pub fn set_error(&mut self, message: &str) {
        self.close_open_iteration();
        self.phase = ProcessPhase::Error {
            message: message.to_string(),
        };
    }

    /// Feed one orchestrator event.
    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::ToolsLoaded { tool_names } => self.tools_loaded(tool_names),
            ProgressEvent::IterationStarted { iteration } => self.start_iteration(*iteration),
            ProgressEvent::ToolCallStarted {
                call_id,
                tool_name,
                domain,
            } => self.add_tool_call_with_id(call_id, tool_name, *domain),
            ProgressEvent::ToolCallCompleted {
                call_id,
                success,
                message,
                ..
            } => self.complete_tool_call_by_id(call_id, *success, message),
            ProgressEvent::IterationCompleted { .. } => self.complete_iteration(),
            ProgressEvent::AwaitingConfirmation { count } => self.awaiting_confirmation(*count),
            ProgressEvent::Completed => self.set_completed(),
            ProgressEvent::Failed { message } => self.set_error(message),
        }
    }

    fn push_call(&mut self, call_id: Option<String>, name: &str, domain: Option<CapabilityDomain>) {
        if self.phase.is_terminal() {
            return;
        }
        let Some(iteration) = self.open_iteration_mut() else {
            return;
        };
        iteration.tool_calls.push(ToolCallRecord {
            call_id,
            name: name.to_string(),
            domain,
            status: ToolCallStatus::Running,
            preview: None,
            started_at: Utc::now(),
            ended_at: None,
        });
        self.phase = ProcessPhase::CallingTool {
            name: name.to_string(),
        };
    }

    fn open_iteration_mut(&mut self) -> Option<&mut ProcessIteration> {
        self.iterations.last_mut().filter(|i| i.ended_at.is_none())
    }

    fn close_open_iteration(&mut self) {
        if let Some(iteration) = self.open_iteration_mut() {
            iteration.ended_at = Some(Utc::now());
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_phases() {
        let mut t = ProgressTracker::new();
        t.loading_tools();
        assert_eq!(t.phase(), &ProcessPhase::LoadingTools);
        t.tools_loaded(&["create_event".to_string()]);
        t.start_iteration(1);
        assert_eq!(t.phase(), &ProcessPhase::Thinking);
        t.add_tool_call("create_event", Some(CapabilityDomain::Calendar));
        assert_eq!(
            t.phase(),
            &ProcessPhase::CallingTool {
                name: "create_event".into()
            }
        );
        t.complete_tool_call("create_event", true, "Created event [evt-1] Lunch");
        assert_eq!(
            t.phase(),
            &ProcessPhase::ProcessingResult {
                name: "create_event".into()
            }
        );
        t.complete_iteration();
        t.start_iteration(2);
        t.set_completed();

        assert_eq!(t.phase(), &ProcessPhase::Completed);
        assert_eq!(t.iterations().len(), 2);
        let record = &t.iterations()[0].tool_calls[0];
        assert_eq!(record.status, ToolCallStatus::Success);
        assert_eq!(record.preview.as_deref(), Some("Created event [evt-1] Lunch"));
        assert!(t.iterations().iter().all(|i| i.ended_at.is_some()));
    }

    #[test]
    fn test_invalid_sequences_are_noops() {
        let mut t = ProgressTracker::new();
        t.add_tool_call("list_events", None);
        t.complete_tool_call("list_events", true, "ok");
        t.complete_iteration();
        assert_eq!(t.phase(), &ProcessPhase::Idle);
        assert_eq!(t.tool_call_count(), 0);

        t.start_iteration(2);
        t.start_iteration(1);
        assert_eq!(t.iterations().len(), 1);

        t.complete_tool_call("never_started", false, "boom");
        assert_eq!(t.phase(), &ProcessPhase::Thinking);
    }

    #[test]
    fn test_name_matching_is_last_write_wins() {
        let mut t = ProgressTracker::new();
        t.start_iteration(1);
        t.add_tool_call("list_events", None);
        t.add_tool_call("list_events", None);
        t.complete_tool_call("list_events", false, "second");
        let calls = &t.iterations()[0].tool_calls;
        assert_eq!(calls[0].status, ToolCallStatus::Running);
        assert_eq!(calls[1].status, ToolCallStatus::Failed);
    }

    #[test]
    fn test_id_matching_disambiguates_same_name() {
        let mut t = ProgressTracker::new();
        t.apply(&ProgressEvent::IterationStarted { iteration: 1 });
        for id in ["call_a", "call_b"] {
            t.apply(&ProgressEvent::ToolCallStarted {
                call_id: id.into(),
                tool_name: "list_events".into(),
                domain: Some(CapabilityDomain::Calendar),
            });
        }
        t.apply(&ProgressEvent::ToolCallCompleted {
            call_id: "call_a".into(),
            tool_name: "list_events".into(),
            success: true,
            message: "first".into(),
        });
        let calls = &t.iterations()[0].tool_calls;
        assert_eq!(calls[0].status, ToolCallStatus::Success);
        assert_eq!(calls[0].preview.as_deref(), Some("first"));
        assert_eq!(calls[1].status, ToolCallStatus::Running);
    }

    #[test]
    fn test_awaiting_confirmation_is_not_terminal() {
        let mut t = ProgressTracker::new();
        t.apply(&ProgressEvent::IterationStarted { iteration: 1 });
        t.apply(&ProgressEvent::IterationCompleted { iteration: 1 });
        assert_eq!(t.phase(), &ProcessPhase::Thinking);

        t.apply(&ProgressEvent::AwaitingConfirmation { count: 2 });
        assert_eq!(t.phase(), &ProcessPhase::AwaitingConfirmation { count: 2 });
        assert!(t.iterations()[0].ended_at.is_some());

        t.set_completed();
        assert_eq!(t.phase(), &ProcessPhase::Completed);
    }

    #[test]
    fn test_terminal_phase_freezes_history() {
        let mut t = ProgressTracker::new();
        t.start_iteration(1);
        t.set_error("Unable to reach the AI service.");
        t.start_iteration(2);
        t.add_tool_call("list_events", None);
        assert_eq!(t.iterations().len(), 1);
        assert!(matches!(t.phase(), ProcessPhase::Error { .. }));

        t.reset();
        assert_eq!(t.phase(), &ProcessPhase::Idle);
        assert!(t.iterations().is_empty());
    }

    #[test]
    fn test_preview_truncated() {
        let long = "é".repeat(300);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn test_truncate_utf8_char_boundary() {
        assert_eq!(truncate_utf8("héllo", 2), "h");
        assert_eq!(truncate_utf8("abc", 10), "abc");
    }
}
