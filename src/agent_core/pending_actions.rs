//! Pending Action Gate: holds destructive tool calls back until the user
//! confirms or cancels them.
//!
//! - Static rule table from tool name to `ActionKind`
//! - Human-readable confirmation prompts built from the call arguments
//! - Batch resolution: confirm executes every action through the router,
//!   cancel discards them without touching any provider

use crate::capabilities::registry::CapabilityRouter;
use crate::capabilities::types::CapabilityDomain;
use crate::inference::types::{arguments_to_json, ToolCall, ToolResult};

use super::errors::AgentError;
use super::progress::truncate_utf8;
use super::types::{ActionKind, PendingAction};

/// Tool names that require an explicit user decision before execution.
const CONFIRMATION_RULES: &[(&str, ActionKind)] = &[
    ("delete_event", ActionKind::Delete),
    ("delete_reminder", ActionKind::Delete),
    ("update_event", ActionKind::Update),
    ("update_reminder", ActionKind::Update),
    ("complete_reminder", ActionKind::Complete),
];

const FALLBACK_PREVIEW_CHARS: usize = 100;

/// Confirmation prompt text for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescription {
    pub title: String,
    pub details: String,
}

/// Outcome of resolving a batch of pending actions.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Every action was executed; individual results may be errors.
    Executed {
        results: Vec<ToolResult>,
        summary: String,
    },
    /// Nothing was executed.
    Cancelled { count: usize, message: String },
}

impl Resolution {
    /// Text appended to the conversation after resolution.
    pub fn message(&self) -> &str {
        match self {
            Resolution::Executed { summary, .. } => summary,
            Resolution::Cancelled { message, .. } => message,
        }
    }

    /// Report calls from the same batch that already ran before the gate
    /// stopped the loop. Their side effects stand whatever the user decided.
    pub fn with_executed(mut self, executed: &[ToolResult]) -> Self {
        if executed.is_empty() {
            return self;
        }
        let lines: Vec<String> = executed
            .iter()
            .map(|r| {
                if r.is_error {
                    format!("- Failed: {}", r.content)
                } else {
                    format!("- {}", r.content)
                }
            })
            .collect();
        let note = format!("\n\nAlso done:\n{}", lines.join("\n"));
        match &mut self {
            Resolution::Executed { summary, .. } => summary.push_str(&note),
            Resolution::Cancelled { message, .. } => message.push_str(&note),
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PendingActionGate;

impl PendingActionGate {
    pub fn new() -> Self {
        Self
    }

    /// Action kind for calls that need confirmation; `None` for reads and creates.
    pub fn classify(&self, call: &ToolCall) -> Option<ActionKind> {
        CONFIRMATION_RULES
            .iter()
            .find(|(name, _)| *name == call.name)
            .map(|(_, kind)| *kind)
    }

    /// Build the confirmation prompt from the call's arguments.
    pub fn describe(&self, call: &ToolCall) -> ActionDescription {
        let arg = |key: &str| call.str_arg(key).map(str::trim).filter(|s| !s.is_empty());

        let (title, details) = match call.name.as_str() {
            "delete_event" => {
                let details = match (arg("title"), arg("start")) {
                    (Some(title), Some(start)) => format!("'{title}' at {start}"),
                    (Some(title), None) => format!("'{title}'"),
                    _ => format!("Event {}", arg("event_id").unwrap_or("<unknown>")),
                };
                ("Delete event", details)
            }
            "update_event" => {
                let target = arg("event_id").unwrap_or("<unknown>");
                ("Update event", describe_changes(target, call, &["title", "start", "end", "location"]))
            }
            "delete_reminder" => {
                let details = match arg("title") {
                    Some(title) => format!("'{title}'"),
                    None => format!("Reminder {}", arg("reminder_id").unwrap_or("<unknown>")),
                };
                ("Delete reminder", details)
            }
            "update_reminder" => {
                let target = arg("reminder_id").unwrap_or("<unknown>");
                ("Update reminder", describe_changes(target, call, &["title", "due", "notes"]))
            }
            "complete_reminder" => {
                let details = match arg("title") {
                    Some(title) => format!("Mark '{title}' as done"),
                    None => format!(
                        "Mark reminder {} as done",
                        arg("reminder_id").unwrap_or("<unknown>")
                    ),
                };
                ("Complete reminder", details)
            }
            other => {
                let json = arguments_to_json(&call.arguments).to_string();
                let details = if json.len() > FALLBACK_PREVIEW_CHARS {
                    format!("{}...", truncate_utf8(&json, FALLBACK_PREVIEW_CHARS))
                } else {
                    json
                };
                return ActionDescription {
                    title: format!("Run {other}"),
                    details,
                };
            }
        };

        ActionDescription {
            title: title.to_string(),
            details,
        }
    }

    /// Wrap a call in a `PendingAction` if it needs confirmation.
    pub fn pending(&self, call: &ToolCall, domain: Option<CapabilityDomain>) -> Option<PendingAction> {
        let kind = self.classify(call)?;
        let ActionDescription { title, details } = self.describe(call);
        tracing::info!(
            tool = %call.name,
            call_id = %call.id,
            kind = kind.as_str(),
            "tool call held for confirmation"
        );
        Some(PendingAction {
            id: call.id.clone(),
            call: call.clone(),
            title,
            details,
            domain,
            kind,
        })
    }

    /// Confirm or cancel a batch of pending actions.
    ///
    /// On confirm every action runs through the router in order, and a failed
    /// action does not stop the rest. On cancel no provider is touched.
    pub async fn resolve(
        &self,
        actions: &[PendingAction],
        confirm: bool,
        router: &CapabilityRouter,
    ) -> Resolution {
        if !confirm {
            let cancelled = AgentError::ActionCancelled {
                count: actions.len(),
            };
            tracing::info!(outcome = %cancelled, "pending actions cancelled");
            return Resolution::Cancelled {
                count: actions.len(),
                message: cancelled.user_message(),
            };
        }

        let mut results = Vec::with_capacity(actions.len());
        let mut lines = Vec::with_capacity(actions.len());
        for action in actions {
            let result = router.dispatch(&action.call).await;
            if result.is_error {
                tracing::warn!(
                    tool = %action.call.name,
                    call_id = %action.id,
                    error = %result.content,
                    "confirmed action failed"
                );
                lines.push(format!("- {} failed: {}", action.title, result.content));
            } else {
                lines.push(format!("- {}", result.content));
            }
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| !r.is_error).count();
        tracing::info!(
            total = results.len(),
            succeeded,
            "pending actions executed"
        );
        let summary = format!(
            "Completed {succeeded} of {} action(s):\n{}",
            results.len(),
            lines.join("\n")
        );
        Resolution::Executed { results, summary }
    }
}

fn describe_changes(target: &str, call: &ToolCall, fields: &[&str]) -> String {
    let changes: Vec<String> = fields
        .iter()
        .filter_map(|field| {
            call.str_arg(field)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{field} → {v}"))
        })
        .collect();
    if changes.is_empty() {
        target.to_string()
    } else {
        format!("{target}: {}", changes.join(", "))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::args::parse_datetime;
    use crate::capabilities::{CalendarProvider, RemindersProvider};
    use crate::inference::types::{ArgValue, ToolArguments};
    use std::sync::Arc;

    fn call(id: &str, name: &str, pairs: &[(&str, &str)]) -> ToolCall {
        let args: ToolArguments = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ArgValue::String(v.to_string())))
            .collect();
        ToolCall::new(id, name, args)
    }

    #[test]
    fn test_classify_rule_table() {
        let gate = PendingActionGate::new();
        assert_eq!(gate.classify(&call("1", "delete_event", &[])), Some(ActionKind::Delete));
        assert_eq!(gate.classify(&call("1", "delete_reminder", &[])), Some(ActionKind::Delete));
        assert_eq!(gate.classify(&call("1", "update_event", &[])), Some(ActionKind::Update));
        assert_eq!(gate.classify(&call("1", "update_reminder", &[])), Some(ActionKind::Update));
        assert_eq!(
            gate.classify(&call("1", "complete_reminder", &[])),
            Some(ActionKind::Complete)
        );
        assert_eq!(gate.classify(&call("1", "create_event", &[])), None);
        assert_eq!(gate.classify(&call("1", "list_events", &[])), None);
    }

    #[test]
    fn test_describe_delete_event() {
        let gate = PendingActionGate::new();
        let d = gate.describe(&call(
            "1",
            "delete_event",
            &[("event_id", "evt-3"), ("title", "Team sync"), ("start", "2026-10-19 15:00")],
        ));
        assert_eq!(d.title, "Delete event");
        assert_eq!(d.details, "'Team sync' at 2026-10-19 15:00");

        let bare = gate.describe(&call("1", "delete_event", &[("event_id", "evt-3")]));
        assert_eq!(bare.details, "Event evt-3");
    }

    #[test]
    fn test_describe_update_lists_changes() {
        let gate = PendingActionGate::new();
        let d = gate.describe(&call(
            "1",
            "update_event",
            &[("event_id", "evt-1"), ("start", "2026-10-20 16:00")],
        ));
        assert_eq!(d.title, "Update event");
        assert_eq!(d.details, "evt-1: start → 2026-10-20 16:00");
    }

    #[test]
    fn test_pending_only_for_destructive() {
        let gate = PendingActionGate::new();
        assert!(gate.pending(&call("1", "create_event", &[]), None).is_none());
        let action = gate
            .pending(
                &call("call_9", "complete_reminder", &[("reminder_id", "rem-1"), ("title", "Milk")]),
                Some(CapabilityDomain::Reminders),
            )
            .unwrap();
        assert_eq!(action.id, "call_9");
        assert_eq!(action.kind, ActionKind::Complete);
        assert_eq!(action.details, "Mark 'Milk' as done");
    }

    #[tokio::test]
    async fn test_cancel_has_no_side_effects() {
        let calendar = Arc::new(CalendarProvider::new());
        let id = calendar.add_event("Sync", parse_datetime("2026-10-19 15:00").unwrap(), 30);
        let router = CapabilityRouter::new().with_provider(calendar.clone());
        let gate = PendingActionGate::new();
        let action = gate
            .pending(&call("c1", "delete_event", &[("event_id", id.as_str())]), None)
            .unwrap();

        let resolution = gate.resolve(&[action], false, &router).await;
        assert!(matches!(resolution, Resolution::Cancelled { count: 1, .. }));
        assert_eq!(resolution.message(), "Okay, I didn't make any changes.");
        assert_eq!(calendar.execution_count(), 0);
        assert_eq!(calendar.events().len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_continues_after_partial_failure() {
        let calendar = Arc::new(CalendarProvider::new());
        let reminders = Arc::new(RemindersProvider::new());
        let evt = calendar.add_event("Sync", parse_datetime("2026-10-19 15:00").unwrap(), 30);
        let rem = reminders.add_reminder("Milk", None);
        let router = CapabilityRouter::new()
            .with_provider(calendar.clone())
            .with_provider(reminders.clone());
        let gate = PendingActionGate::new();

        let actions: Vec<PendingAction> = [
            call("c1", "delete_event", &[("event_id", "evt-404")]),
            call("c2", "delete_event", &[("event_id", evt.as_str())]),
            call("c3", "complete_reminder", &[("reminder_id", rem.as_str())]),
        ]
        .iter()
        .filter_map(|c| gate.pending(c, None))
        .collect();
        assert_eq!(actions.len(), 3);

        let resolution = gate.resolve(&actions, true, &router).await;
        let Resolution::Executed { results, summary } = resolution else {
            panic!("expected executed resolution");
        };
        assert_eq!(results.len(), 3);
        assert!(results[0].is_error);
        assert!(!results[1].is_error);
        assert!(!results[2].is_error);
        assert!(summary.starts_with("Completed 2 of 3 action(s):"));
        assert!(calendar.events().is_empty());
        assert!(reminders.reminders()[0].completed);
    }

    #[test]
    fn test_with_executed_reports_earlier_calls() {
        let executed = vec![
            ToolResult::success("c1", "Created reminder [ ] [rem-2] Buy milk"),
            ToolResult::failure("c2", "permission denied: calendar access not granted"),
        ];

        let cancelled = Resolution::Cancelled {
            count: 1,
            message: "Okay, I didn't make any changes.".into(),
        }
        .with_executed(&executed);
        assert_eq!(
            cancelled.message(),
            "Okay, I didn't make any changes.\n\nAlso done:\n\
             - Created reminder [ ] [rem-2] Buy milk\n\
             - Failed: permission denied: calendar access not granted"
        );

        let executed_only = Resolution::Executed {
            results: Vec::new(),
            summary: "Completed 1 of 1 action(s):\n- Deleted reminder 'Old milk'".into(),
        };
        assert_eq!(executed_only.clone().with_executed(&[]), executed_only);
    }
}
