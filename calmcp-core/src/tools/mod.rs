//! Named operations over the engine.
//!
//! Each operation takes a JSON argument object and produces either a sorted,
//! pretty-printed JSON document or a short error message.

mod calendars;
mod events;
pub mod params;
mod reminders;
pub mod views;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::engine::Engine;
use crate::error::{CalMcpError, CalMcpResult};
use crate::store::CalendarStore;

/// Every operation callers can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    ListCalendars,
    CreateCalendar,
    UpdateCalendar,
    DeleteCalendar,
    ListEvents,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    SearchEvents,
    ListEventsQuick,
    CheckConflicts,
    CopyEvent,
    CreateEventsBatch,
    MoveEventsBatch,
    DeleteEventsBatch,
    FindDuplicateEvents,
    ListReminders,
    CreateReminder,
    UpdateReminder,
    CompleteReminder,
    DeleteReminder,
    SearchReminders,
    CreateRemindersBatch,
    DeleteRemindersBatch,
}

impl Tool {
    pub const ALL: [Tool; 24] = [
        Tool::ListCalendars,
        Tool::CreateCalendar,
        Tool::UpdateCalendar,
        Tool::DeleteCalendar,
        Tool::ListEvents,
        Tool::CreateEvent,
        Tool::UpdateEvent,
        Tool::DeleteEvent,
        Tool::SearchEvents,
        Tool::ListEventsQuick,
        Tool::CheckConflicts,
        Tool::CopyEvent,
        Tool::CreateEventsBatch,
        Tool::MoveEventsBatch,
        Tool::DeleteEventsBatch,
        Tool::FindDuplicateEvents,
        Tool::ListReminders,
        Tool::CreateReminder,
        Tool::UpdateReminder,
        Tool::CompleteReminder,
        Tool::DeleteReminder,
        Tool::SearchReminders,
        Tool::CreateRemindersBatch,
        Tool::DeleteRemindersBatch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::ListCalendars => "list_calendars",
            Tool::CreateCalendar => "create_calendar",
            Tool::UpdateCalendar => "update_calendar",
            Tool::DeleteCalendar => "delete_calendar",
            Tool::ListEvents => "list_events",
            Tool::CreateEvent => "create_event",
            Tool::UpdateEvent => "update_event",
            Tool::DeleteEvent => "delete_event",
            Tool::SearchEvents => "search_events",
            Tool::ListEventsQuick => "list_events_quick",
            Tool::CheckConflicts => "check_conflicts",
            Tool::CopyEvent => "copy_event",
            Tool::CreateEventsBatch => "create_events_batch",
            Tool::MoveEventsBatch => "move_events_batch",
            Tool::DeleteEventsBatch => "delete_events_batch",
            Tool::FindDuplicateEvents => "find_duplicate_events",
            Tool::ListReminders => "list_reminders",
            Tool::CreateReminder => "create_reminder",
            Tool::UpdateReminder => "update_reminder",
            Tool::CompleteReminder => "complete_reminder",
            Tool::DeleteReminder => "delete_reminder",
            Tool::SearchReminders => "search_reminders",
            Tool::CreateRemindersBatch => "create_reminders_batch",
            Tool::DeleteRemindersBatch => "delete_reminders_batch",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = CalMcpError;

    fn from_str(s: &str) -> CalMcpResult<Self> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.name() == s)
            .ok_or_else(|| CalMcpError::UnknownOperation(s.to_string()))
    }
}

/// What an operation hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    fn success(value: &Value) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => ToolOutput {
                text,
                is_error: false,
            },
            Err(e) => ToolOutput::error(&CalMcpError::from(e)),
        }
    }

    fn error(err: &CalMcpError) -> Self {
        ToolOutput {
            text: format!("Error: {err}"),
            is_error: true,
        }
    }
}

/// Run the operation `name` with `args`. Failures never escape as `Err`;
/// they come back as an error output.
pub async fn call_tool<S: CalendarStore>(
    engine: &Engine<S>,
    name: &str,
    args: &Map<String, Value>,
) -> ToolOutput {
    let result = match name.parse::<Tool>() {
        Ok(tool) => dispatch(engine, tool, args).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(value) => ToolOutput::success(&value),
        Err(e) => {
            tracing::debug!(tool = name, error = %e, "Tool call failed");
            ToolOutput::error(&e)
        }
    }
}

async fn dispatch<S: CalendarStore>(
    engine: &Engine<S>,
    tool: Tool,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    match tool {
        Tool::ListCalendars => calendars::list(engine, args).await,
        Tool::CreateCalendar => calendars::create(engine, args).await,
        Tool::UpdateCalendar => calendars::update(engine, args).await,
        Tool::DeleteCalendar => calendars::delete(engine, args).await,
        Tool::ListEvents => events::list(engine, args).await,
        Tool::CreateEvent => events::create(engine, args).await,
        Tool::UpdateEvent => events::update(engine, args).await,
        Tool::DeleteEvent => events::delete(engine, args).await,
        Tool::SearchEvents => events::search(engine, args).await,
        Tool::ListEventsQuick => events::list_quick(engine, args).await,
        Tool::CheckConflicts => events::check_conflicts(engine, args).await,
        Tool::CopyEvent => events::copy(engine, args).await,
        Tool::CreateEventsBatch => events::create_batch(engine, args).await,
        Tool::MoveEventsBatch => events::move_batch(engine, args).await,
        Tool::DeleteEventsBatch => events::delete_batch(engine, args).await,
        Tool::FindDuplicateEvents => events::find_duplicates(engine, args).await,
        Tool::ListReminders => reminders::list(engine, args).await,
        Tool::CreateReminder => reminders::create(engine, args).await,
        Tool::UpdateReminder => reminders::update(engine, args).await,
        Tool::CompleteReminder => reminders::complete(engine, args).await,
        Tool::DeleteReminder => reminders::delete(engine, args).await,
        Tool::SearchReminders => reminders::search(engine, args).await,
        Tool::CreateRemindersBatch => reminders::create_batch(engine, args).await,
        Tool::DeleteRemindersBatch => reminders::delete_batch(engine, args).await,
    }
}
