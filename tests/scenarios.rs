//! End-to-end conversations through `ChatSession` with a scripted provider
//! and the in-memory capability providers.

use std::sync::Arc;

use chatpilot::agent_core::{
    ActionKind, AgentError, AgentEvent, ChatSession, ProcessPhase, ProgressEvent, Resolution,
    RunOutcome, ToolCallStatus, MAX_ITERATIONS,
};
use chatpilot::capabilities::{CalendarProvider, CapabilityRouter, RemindersProvider};
use chatpilot::inference::{
    ArgValue, ChatConfig, ProviderReply, Role, ScriptedProvider, ToolArguments, ToolCall,
};
use chrono::NaiveDate;
use tokio::sync::mpsc::unbounded_channel;

struct Fixture {
    session: ChatSession,
    provider: ScriptedProvider,
    calendar: Arc<CalendarProvider>,
    reminders: Arc<RemindersProvider>,
}

fn fixture(provider: ScriptedProvider) -> Fixture {
    let calendar = Arc::new(CalendarProvider::new());
    let reminders = Arc::new(RemindersProvider::new());
    let router = CapabilityRouter::new()
        .with_provider(calendar.clone())
        .with_provider(reminders.clone());
    let session = ChatSession::new(
        Arc::new(provider.clone()),
        Arc::new(router),
        ChatConfig::default(),
    );
    Fixture {
        session,
        provider,
        calendar,
        reminders,
    }
}

fn call(id: &str, name: &str, pairs: &[(&str, &str)]) -> ToolCall {
    let args: ToolArguments = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), ArgValue::String(v.to_string())))
        .collect();
    ToolCall::new(id, name, args)
}

#[tokio::test]
async fn scenario_a_plain_answer() -> anyhow::Result<()> {
    let mut f = fixture(ScriptedProvider::new().with_text("2 + 2 = 4."));

    let outcome = f.session.send("What's 2+2?").await?;

    assert_eq!(
        outcome,
        RunOutcome::Answer {
            text: "2 + 2 = 4.".into(),
            iterations: 1
        }
    );
    assert_eq!(f.session.progress().tool_call_count(), 0);
    assert_eq!(f.session.progress().phase(), &ProcessPhase::Completed);
    assert_eq!(f.provider.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn scenario_b_delete_waits_for_confirmation() -> anyhow::Result<()> {
    let mut f = fixture(ScriptedProvider::new().with_tool_calls(vec![call(
        "call_del",
        "delete_event",
        &[("event_id", "evt-1"), ("title", "Design review"), ("start", "2026-10-19 15:00")],
    )]));
    let start = NaiveDate::from_ymd_opt(2026, 10, 19)
        .and_then(|d| d.and_hms_opt(15, 0, 0))
        .ok_or_else(|| anyhow::anyhow!("bad date"))?;
    f.calendar.add_event("Design review", start, 60);

    let (tx, mut rx) = unbounded_channel();
    f.session = f.session.with_observer(tx);

    let outcome = f.session.send("Delete my 3pm meeting").await?;
    let pending = match outcome {
        RunOutcome::AwaitingConfirmation { pending, .. } => pending,
        other => anyhow::bail!("expected pending confirmation, got {other:?}"),
    };
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, ActionKind::Delete);
    assert_eq!(pending[0].details, "'Design review' at 2026-10-19 15:00");
    assert_eq!(f.calendar.execution_count(), 0);
    assert_eq!(
        f.session.progress().phase(),
        &ProcessPhase::AwaitingConfirmation { count: 1 }
    );

    let mut pending_events = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, AgentEvent::PendingAction(_)) {
            pending_events += 1;
        }
    }
    assert_eq!(pending_events, 1);

    let resolution = f.session.resolve_pending(true).await?;
    assert!(matches!(resolution, Resolution::Executed { ref results, .. } if results.len() == 1));
    assert_eq!(f.calendar.execution_count(), 1);
    assert!(f.calendar.events().is_empty());
    assert_eq!(f.session.progress().phase(), &ProcessPhase::Completed);
    Ok(())
}

#[tokio::test]
async fn scenario_b_cancel_has_no_side_effects() -> anyhow::Result<()> {
    let mut f = fixture(ScriptedProvider::new().with_tool_calls(vec![call(
        "call_del",
        "delete_event",
        &[("event_id", "evt-1")],
    )]));
    let start = NaiveDate::from_ymd_opt(2026, 10, 19)
        .and_then(|d| d.and_hms_opt(15, 0, 0))
        .ok_or_else(|| anyhow::anyhow!("bad date"))?;
    f.calendar.add_event("Design review", start, 60);

    f.session.send("Delete my 3pm meeting").await?;
    let resolution = f.session.resolve_pending(false).await?;

    assert!(matches!(resolution, Resolution::Cancelled { count: 1, .. }));
    assert_eq!(f.calendar.execution_count(), 0);
    assert_eq!(f.calendar.events().len(), 1);
    let last = f
        .session
        .messages()
        .last()
        .ok_or_else(|| anyhow::anyhow!("no messages"))?;
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, resolution.message());
    Ok(())
}

#[tokio::test]
async fn scenario_c_create_then_confirm_in_two_iterations() -> anyhow::Result<()> {
    let mut f = fixture(
        ScriptedProvider::new()
            .with_tool_calls(vec![call(
                "call_new",
                "create_event",
                &[("title", "Lunch"), ("start", "2026-10-20 12:00")],
            )])
            .with_text("Done! Lunch is booked for tomorrow at noon."),
    );

    let outcome = f.session.send("Schedule lunch tomorrow").await?;

    assert!(matches!(outcome, RunOutcome::Answer { iterations: 2, .. }));
    assert_eq!(f.calendar.events().len(), 1);
    assert_eq!(f.calendar.events()[0].title, "Lunch");

    let iterations = f.session.progress().iterations();
    assert_eq!(iterations.len(), 2);
    let record = &iterations[0].tool_calls[0];
    assert_eq!(record.name, "create_event");
    assert_eq!(record.call_id.as_deref(), Some("call_new"));
    assert_eq!(record.status, ToolCallStatus::Success);
    Ok(())
}

#[tokio::test]
async fn scenario_d_permission_denied_is_folded_into_history() -> anyhow::Result<()> {
    let mut f = fixture(
        ScriptedProvider::new()
            .with_tool_calls(vec![call(
                "call_new",
                "create_event",
                &[("title", "Lunch"), ("start", "2026-10-20 12:00")],
            )])
            .with_text("I couldn't add it: calendar access is turned off."),
    );
    f.calendar.set_access(false);

    let outcome = f.session.send("Schedule lunch tomorrow").await?;
    assert!(matches!(outcome, RunOutcome::Answer { iterations: 2, .. }));

    let requests = f.provider.requests();
    let tool_msg = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .ok_or_else(|| anyhow::anyhow!("no tool result sent back"))?;
    assert!(tool_msg.is_error);
    assert!(tool_msg.content.contains("permission denied"));

    let record = &f.session.progress().iterations()[0].tool_calls[0];
    assert_eq!(record.status, ToolCallStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn loop_stops_after_max_iterations() -> anyhow::Result<()> {
    let looping = ProviderReply::tool_calls(vec![call("call_loop", "list_events", &[])]);
    let mut f = fixture(ScriptedProvider::new().repeating(looping));

    let err = match f.session.send("What's on today?").await {
        Ok(outcome) => anyhow::bail!("expected failure, got {outcome:?}"),
        Err(e) => e,
    };
    assert!(matches!(err, AgentError::MaxIterationsExceeded { .. }));
    assert_eq!(f.provider.call_count(), MAX_ITERATIONS);

    let last = f
        .session
        .messages()
        .last()
        .ok_or_else(|| anyhow::anyhow!("no messages"))?;
    assert!(last.is_error);
    assert_eq!(last.content, err.user_message());
    assert!(matches!(
        f.session.progress().phase(),
        ProcessPhase::Error { .. }
    ));
    Ok(())
}

#[tokio::test]
async fn progress_events_reach_the_observer_in_order() -> anyhow::Result<()> {
    let mut f = fixture(
        ScriptedProvider::new()
            .with_tool_calls(vec![call("call_list", "list_events", &[])])
            .with_text("Your calendar is empty."),
    );
    let (tx, mut rx) = unbounded_channel();
    f.session = f.session.with_observer(tx);

    f.session.send("What's on my calendar?").await?;

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let AgentEvent::Progress(p) = event {
            kinds.push(match p {
                ProgressEvent::ToolsLoaded { .. } => "tools_loaded",
                ProgressEvent::IterationStarted { .. } => "iteration_started",
                ProgressEvent::ToolCallStarted { .. } => "tool_call_started",
                ProgressEvent::ToolCallCompleted { .. } => "tool_call_completed",
                ProgressEvent::IterationCompleted { .. } => "iteration_completed",
                ProgressEvent::AwaitingConfirmation { .. } => "awaiting_confirmation",
                ProgressEvent::Completed => "completed",
                ProgressEvent::Failed { .. } => "failed",
            });
        }
    }
    assert_eq!(
        kinds,
        vec![
            "tools_loaded",
            "iteration_started",
            "tool_call_started",
            "tool_call_completed",
            "iteration_completed",
            "iteration_started",
            "iteration_completed",
            "completed",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn mixed_batch_summary_reports_calls_that_already_ran() -> anyhow::Result<()> {
    let mut f = fixture(ScriptedProvider::new().with_tool_calls(vec![
        call("call_new", "create_reminder", &[("title", "Buy milk")]),
        call("call_del", "delete_reminder", &[("reminder_id", "rem-1")]),
    ]));
    f.reminders.add_reminder("Old milk", None);

    let outcome = f.session.send("Add milk and remove the old one").await?;
    assert!(matches!(outcome, RunOutcome::AwaitingConfirmation { ref executed, .. } if executed.len() == 1));

    let resolution = f.session.resolve_pending(true).await?;
    let titles: Vec<String> = f.reminders.reminders().into_iter().map(|r| r.title).collect();
    assert_eq!(titles, vec!["Buy milk".to_string()]);

    let summary = resolution.message();
    assert!(summary.starts_with("Completed 1 of 1 action(s):\n- Deleted reminder 'Old milk'"));
    assert!(summary.contains("\n\nAlso done:\n- Created reminder"));
    assert!(summary.contains("Buy milk"));
    let last = f
        .session
        .messages()
        .last()
        .ok_or_else(|| anyhow::anyhow!("no messages"))?;
    assert_eq!(last.content, summary);
    Ok(())
}

#[tokio::test]
async fn mixed_batch_cancel_still_reports_calls_that_already_ran() -> anyhow::Result<()> {
    let mut f = fixture(ScriptedProvider::new().with_tool_calls(vec![
        call("call_new", "create_reminder", &[("title", "Buy milk")]),
        call("call_del", "delete_reminder", &[("reminder_id", "rem-1")]),
    ]));
    f.reminders.add_reminder("Old milk", None);

    f.session.send("Add milk and remove the old one").await?;
    let resolution = f.session.resolve_pending(false).await?;

    assert!(matches!(resolution, Resolution::Cancelled { count: 1, .. }));
    assert_eq!(f.reminders.reminders().len(), 2);
    assert!(resolution.message().contains("Also done:\n- Created reminder"));
    Ok(())
}

#[tokio::test]
async fn overflowing_duration_is_folded_as_tool_error() -> anyhow::Result<()> {
    let mut args = ToolArguments::new();
    args.insert("title".into(), ArgValue::String("Forever".into()));
    args.insert("start".into(), ArgValue::String("2026-10-20 12:00".into()));
    args.insert("duration_minutes".into(), ArgValue::Integer(1_000_000_000_000));
    let mut f = fixture(
        ScriptedProvider::new()
            .with_tool_calls(vec![ToolCall::new("call_new", "create_event", args)])
            .with_text("That event is too long to add."),
    );

    let outcome = f.session.send("Add an endless event").await?;
    assert!(matches!(outcome, RunOutcome::Answer { iterations: 2, .. }));
    assert!(f.calendar.events().is_empty());

    let requests = f.provider.requests();
    let tool_msg = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .ok_or_else(|| anyhow::anyhow!("no tool result sent back"))?;
    assert!(tool_msg.is_error);
    assert!(tool_msg.content.contains("'duration_minutes' is out of range"));
    Ok(())
}
