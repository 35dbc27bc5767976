//! In-memory calendar capability.
//!
//! Stands in for the platform event store. Access can be revoked to exercise
//! the permission-denied path, and every `execute` call is counted.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::args::{
    mentions_any, optional_bool, optional_datetime, optional_i64, optional_str,
    required_datetime, required_str, shifted, DISPLAY_FORMAT,
};
use super::errors::CapabilityError;
use super::provider::CapabilityProvider;
use super::types::{CapabilityDomain, ParameterType, Tool};
use crate::inference::types::ToolArguments;

const DEFAULT_DURATION_MINUTES: i64 = 60;

const HINT_KEYWORDS: &[&str] = &[
    "calendar",
    "event",
    "meeting",
    "schedule",
    "appointment",
    "lunch",
    "dinner",
    "busy",
    "free",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub location: Option<String>,
    pub all_day: bool,
}

impl CalendarEvent {
    fn summary(&self) -> String {
        let when = if self.all_day {
            format!("{} (all day)", self.start.format("%Y-%m-%d"))
        } else {
            format!(
                "{} to {}",
                self.start.format(DISPLAY_FORMAT),
                self.end.format("%H:%M")
            )
        };
        match &self.location {
            Some(loc) => format!("[{}] {}, {when} at {loc}", self.id, self.title),
            None => format!("[{}] {}, {when}", self.id, self.title),
        }
    }
}

/// Calendar backed by a `Vec` of events.
pub struct CalendarProvider {
    events: Mutex<Vec<CalendarEvent>>,
    access_granted: AtomicBool,
    next_id: AtomicU64,
    executions: AtomicUsize,
}

impl Default for CalendarProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CalendarProvider {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            access_granted: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            executions: AtomicUsize::new(0),
        }
    }

    /// Seed an event. Returns its id.
    pub fn add_event(&self, title: &str, start: NaiveDateTime, duration_minutes: i64) -> String {
        let id = self.allocate_id();
        self.lock().push(CalendarEvent {
            id: id.clone(),
            title: title.to_string(),
            start,
            end: shifted("add_event", start, Duration::try_minutes(duration_minutes), "duration_minutes")
                .unwrap_or(start),
            location: None,
            all_day: false,
        });
        id
    }

    /// Grant or revoke platform access.
    pub fn set_access(&self, granted: bool) {
        self.access_granted.store(granted, Ordering::SeqCst);
    }

    /// Number of `execute` calls received, successful or not.
    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Snapshot of the stored events.
    pub fn events(&self) -> Vec<CalendarEvent> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CalendarEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_id(&self) -> String {
        format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn tools() -> Vec<Tool> {
        vec![
            Tool::new(
                "list_events",
                "List calendar events, optionally limited to a date range.",
            )
            .optional_param("start_date", ParameterType::String, "First day to include (YYYY-MM-DD)")
            .optional_param("end_date", ParameterType::String, "Last day to include (YYYY-MM-DD)"),
            Tool::new("create_event", "Create a new calendar event.")
                .param("title", ParameterType::String, "Event title")
                .param("start", ParameterType::String, "Start time (YYYY-MM-DD HH:MM)")
                .optional_param("end", ParameterType::String, "End time (YYYY-MM-DD HH:MM)")
                .optional_param(
                    "duration_minutes",
                    ParameterType::Integer,
                    "Length in minutes when no end time is given (default 60)",
                )
                .optional_param("location", ParameterType::String, "Where the event takes place")
                .optional_param("all_day", ParameterType::Boolean, "Whether the event lasts all day"),
            Tool::new(
                "update_event",
                "Change the title, time or location of an existing event.",
            )
            .param("event_id", ParameterType::String, "Identifier from list_events")
            .optional_param("title", ParameterType::String, "New title")
            .optional_param("start", ParameterType::String, "New start time (YYYY-MM-DD HH:MM)")
            .optional_param("end", ParameterType::String, "New end time (YYYY-MM-DD HH:MM)")
            .optional_param("location", ParameterType::String, "New location"),
            Tool::new("delete_event", "Delete an existing calendar event.")
                .param("event_id", ParameterType::String, "Identifier from list_events")
                .optional_param("title", ParameterType::String, "Event title, shown to the user for confirmation")
                .optional_param("start", ParameterType::String, "Event start time, shown to the user for confirmation"),
        ]
    }

    fn check_access(&self) -> Result<(), CapabilityError> {
        if self.access_granted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CapabilityError::PermissionDenied {
                reason: "calendar access not granted".into(),
            })
        }
    }

    fn list_events(&self, args: &ToolArguments) -> Result<String, CapabilityError> {
        let from = optional_datetime("list_events", args, "start_date")?;
        let until = optional_datetime("list_events", args, "end_date")?
            .map(|d| d.date().and_hms_opt(23, 59, 59).unwrap_or(d));

        let mut events: Vec<CalendarEvent> = self
            .lock()
            .iter()
            .filter(|e| from.map_or(true, |f| e.end >= f))
            .filter(|e| until.map_or(true, |u| e.start <= u))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start);

        if events.is_empty() {
            return Ok("No events found.".to_string());
        }
        let lines: Vec<String> = events.iter().map(|e| format!("- {}", e.summary())).collect();
        Ok(format!("Found {} event(s):\n{}", events.len(), lines.join("\n")))
    }

    fn create_event(&self, args: &ToolArguments) -> Result<String, CapabilityError> {
        let title = required_str("create_event", args, "title")?;
        let start = required_datetime("create_event", args, "start")?;
        let all_day = optional_bool(args, "all_day").unwrap_or(false);

        let end = match optional_datetime("create_event", args, "end")? {
            Some(end) => end,
            None if all_day => shifted("create_event", start, Duration::try_days(1), "start")?,
            None => {
                let minutes = optional_i64("create_event", args, "duration_minutes")?
                    .unwrap_or(DEFAULT_DURATION_MINUTES);
                if minutes <= 0 {
                    return Err(CapabilityError::InvalidArgument {
                        tool: "create_event".into(),
                        reason: "'duration_minutes' must be positive".into(),
                    });
                }
                shifted("create_event", start, Duration::try_minutes(minutes), "duration_minutes")?
            }
        };
        if end < start {
            return Err(CapabilityError::InvalidArgument {
                tool: "create_event".into(),
                reason: "'end' is before 'start'".into(),
            });
        }

        let event = CalendarEvent {
            id: self.allocate_id(),
            title: title.to_string(),
            start,
            end,
            location: optional_str(args, "location").map(String::from),
            all_day,
        };
        let summary = event.summary();
        self.lock().push(event);
        Ok(format!("Created event {summary}"))
    }

    fn update_event(&self, args: &ToolArguments) -> Result<String, CapabilityError> {
        let id = required_str("update_event", args, "event_id")?;
        let new_start = optional_datetime("update_event", args, "start")?;
        let new_end = optional_datetime("update_event", args, "end")?;

        let mut events = self.lock();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CapabilityError::NotFound {
                kind: "event".into(),
                id: id.to_string(),
            })?;

        let mut updated = event.clone();
        if let Some(title) = optional_str(args, "title") {
            updated.title = title.to_string();
        }
        if let Some(location) = optional_str(args, "location") {
            updated.location = Some(location.to_string());
        }
        if let Some(start) = new_start {
            // Moving the start keeps the duration unless an end is given.
            let duration = updated.end - updated.start;
            updated.start = start;
            updated.end = shifted("update_event", start, Some(duration), "start")?;
        }
        if let Some(end) = new_end {
            updated.end = end;
        }
        if updated.end < updated.start {
            return Err(CapabilityError::InvalidArgument {
                tool: "update_event".into(),
                reason: "'end' is before 'start'".into(),
            });
        }

        *event = updated;
        Ok(format!("Updated event {}", event.summary()))
    }

    fn delete_event(&self, args: &ToolArguments) -> Result<String, CapabilityError> {
        let id = required_str("delete_event", args, "event_id")?;
        let mut events = self.lock();
        let position = events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CapabilityError::NotFound {
                kind: "event".into(),
                id: id.to_string(),
            })?;
        let removed = events.remove(position);
        Ok(format!("Deleted event '{}' ({})", removed.title, removed.start.format(DISPLAY_FORMAT)))
    }
}

#[async_trait]
impl CapabilityProvider for CalendarProvider {
    fn name(&self) -> &str {
        "calendar"
    }

    fn domain(&self) -> CapabilityDomain {
        CapabilityDomain::Calendar
    }

    async fn list_tools(&self) -> Result<Vec<Tool>, CapabilityError> {
        Ok(Self::tools())
    }

    async fn execute(&self, tool_name: &str, args: &ToolArguments) -> Result<String, CapabilityError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.check_access()?;
        match tool_name {
            "list_events" => self.list_events(args),
            "create_event" => self.create_event(args),
            "update_event" => self.update_event(args),
            "delete_event" => self.delete_event(args),
            other => Err(CapabilityError::UnknownTool {
                name: other.to_string(),
            }),
        }
    }

    fn can_handle(&self, message: &str) -> bool {
        mentions_any(message, HINT_KEYWORDS)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
