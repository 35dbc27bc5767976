//! Capabilities: the tools the assistant can call.
//!
//! Each provider wraps one platform resource (calendar, reminders) and
//! exposes its operations as `Tool`s. The `CapabilityRouter` merges the
//! listings and routes every call to the provider that owns the tool name.

pub(crate) mod args;
pub mod calendar;
pub mod errors;
pub mod provider;
pub mod registry;
pub mod reminders;
pub mod types;

pub use calendar::{CalendarEvent, CalendarProvider};
pub use errors::CapabilityError;
pub use provider::CapabilityProvider;
pub use registry::CapabilityRouter;
pub use reminders::{Reminder, RemindersProvider};
pub use types::{CapabilityDomain, ParameterType, Tool, ToolParameter};
