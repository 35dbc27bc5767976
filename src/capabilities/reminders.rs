//! In-memory reminders capability.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::args::{
    mentions_any, optional_bool, optional_datetime, optional_str, required_str, DISPLAY_FORMAT,
};
use super::errors::CapabilityError;
use super::provider::CapabilityProvider;
use super::types::{CapabilityDomain, ParameterType, Tool};
use crate::inference::types::ToolArguments;

const HINT_KEYWORDS: &[&str] = &["remind", "reminder", "todo", "to-do", "task", "errand"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub due: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub completed: bool,
}

impl Reminder {
    fn summary(&self) -> String {
        let mark = if self.completed { "x" } else { " " };
        let mut line = format!("[{mark}] [{}] {}", self.id, self.title);
        if let Some(due) = self.due {
            line.push_str(&format!(", due {}", due.format(DISPLAY_FORMAT)));
        }
        if let Some(notes) = &self.notes {
            line.push_str(&format!(" ({notes})"));
        }
        line
    }
}

/// Reminders list backed by a `Vec`.
pub struct RemindersProvider {
    reminders: Mutex<Vec<Reminder>>,
    access_granted: AtomicBool,
    next_id: AtomicU64,
    executions: AtomicUsize,
}

impl Default for RemindersProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RemindersProvider {
    pub fn new() -> Self {
        Self {
            reminders: Mutex::new(Vec::new()),
            access_granted: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            executions: AtomicUsize::new(0),
        }
    }

    /// Seed a reminder. Returns its id.
    pub fn add_reminder(&self, title: &str, due: Option<NaiveDateTime>) -> String {
        let id = self.allocate_id();
        self.lock().push(Reminder {
            id: id.clone(),
            title: title.to_string(),
            due,
            notes: None,
            completed: false,
        });
        id
    }

    pub fn set_access(&self, granted: bool) {
        self.access_granted.store(granted, Ordering::SeqCst);
    }

    /// Number of `execute` calls received, successful or not.
    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn reminders(&self) -> Vec<Reminder> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Reminder>> {
        self.reminders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_id(&self) -> String {
        format!("rem-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn tools() -> Vec<Tool> {
        vec![
            Tool::new("list_reminders", "List reminders.").optional_param(
                "include_completed",
                ParameterType::Boolean,
                "Also list completed reminders (default false)",
            ),
            Tool::new("create_reminder", "Create a new reminder.")
                .param("title", ParameterType::String, "What to be reminded about")
                .optional_param("due", ParameterType::String, "Due time (YYYY-MM-DD HH:MM)")
                .optional_param("notes", ParameterType::String, "Additional notes"),
            Tool::new("update_reminder", "Change the title, due time or notes of a reminder.")
                .param("reminder_id", ParameterType::String, "Identifier from list_reminders")
                .optional_param("title", ParameterType::String, "New title")
                .optional_param("due", ParameterType::String, "New due time (YYYY-MM-DD HH:MM)")
                .optional_param("notes", ParameterType::String, "New notes"),
            Tool::new("complete_reminder", "Mark a reminder as completed.")
                .param("reminder_id", ParameterType::String, "Identifier from list_reminders")
                .optional_param("title", ParameterType::String, "Reminder title, shown to the user for confirmation"),
            Tool::new("delete_reminder", "Delete a reminder.")
                .param("reminder_id", ParameterType::String, "Identifier from list_reminders")
                .optional_param("title", ParameterType::String, "Reminder title, shown to the user for confirmation"),
        ]
    }

    fn check_access(&self) -> Result<(), CapabilityError> {
        if self.access_granted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CapabilityError::PermissionDenied {
                reason: "reminders access not granted".into(),
            })
        }
    }

    fn not_found(id: &str) -> CapabilityError {
        CapabilityError::NotFound {
            kind: "reminder".into(),
            id: id.to_string(),
        }
    }

    fn list_reminders(&self, args: &ToolArguments) -> Result<String, CapabilityError> {
        let include_completed = optional_bool(args, "include_completed").unwrap_or(false);
        let reminders = self.lock();
        let lines: Vec<String> = reminders
            .iter()
            .filter(|r| include_completed || !r.completed)
            .map(|r| format!("- {}", r.summary()))
            .collect();
        if lines.is_empty() {
            return Ok("No reminders found.".to_string());
        }
        Ok(format!("Found {} reminder(s):\n{}", lines.len(), lines.join("\n")))
    }

    fn create_reminder(&self, args: &ToolArguments) -> Result<String, CapabilityError> {
        let title = required_str("create_reminder", args, "title")?;
        let due = optional_datetime("create_reminder", args, "due")?;
        let reminder = Reminder {
            id: self.allocate_id(),
            title: title.to_string(),
            due,
            notes: optional_str(args, "notes").map(String::from),
            completed: false,
        };
        let summary = reminder.summary();
        self.lock().push(reminder);
        Ok(format!("Created reminder {summary}"))
    }

    fn update_reminder(&self, args: &ToolArguments) -> Result<String, CapabilityError> {
        let id = required_str("update_reminder", args, "reminder_id")?;
        let due = optional_datetime("update_reminder", args, "due")?;
        let mut reminders = self.lock();
        let reminder = reminders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        if let Some(title) = optional_str(args, "title") {
            reminder.title = title.to_string();
        }
        if due.is_some() {
            reminder.due = due;
        }
        if let Some(notes) = optional_str(args, "notes") {
            reminder.notes = Some(notes.to_string());
        }
        Ok(format!("Updated reminder {}", reminder.summary()))
    }

    fn complete_reminder(&self, args: &ToolArguments) -> Result<String, CapabilityError> {
        let id = required_str("complete_reminder", args, "reminder_id")?;
        let mut reminders = self.lock();
        let reminder = reminders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        if reminder.completed {
            return Ok(format!("Reminder '{}' was already completed", reminder.title));
        }
        reminder.completed = true;
        Ok(format!("Completed reminder '{}'", reminder.title))
    }

    fn delete_reminder(&self, args: &ToolArguments) -> Result<String, CapabilityError> {
        let id = required_str("delete_reminder", args, "reminder_id")?;
        let mut reminders = self.lock();
        let position = reminders
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        let removed = reminders.remove(position);
        Ok(format!("Deleted reminder '{}'", removed.title))
    }
}

#[async_trait]
impl CapabilityProvider for RemindersProvider {
    fn name(&self) -> &str {
        "reminders"
    }

    fn domain(&self) -> CapabilityDomain {
        CapabilityDomain::Reminders
    }

    async fn list_tools(&self) -> Result<Vec<Tool>, CapabilityError> {
        Ok(Self::tools())
    }

    async fn execute(&self, tool_name: &str, args: &ToolArguments) -> Result<String, CapabilityError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.check_access()?;
        match tool_name {
            "list_reminders" => self.list_reminders(args),
            "create_reminder" => self.create_reminder(args),
            "update_reminder" => self.update_reminder(args),
            "complete_reminder" => self.complete_reminder(args),
            "delete_reminder" => self.delete_reminder(args),
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
