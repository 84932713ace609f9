//! Error types for the calmcp engine.

use thiserror::Error;

use crate::calendar::EntityKind;

/// Errors that can occur while serving a calendar or reminder operation.
///
/// The `Display` text is what callers see, so every message has to be
/// enough for them to fix the request on their own.
#[derive(Error, Debug)]
pub enum CalMcpError {
    #[error(
        "{} access denied. Please grant permission in System Settings > Privacy & Security > {}",
        .0.access_label(),
        .0.access_label()
    )]
    AccessDenied(EntityKind),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Calendar '{name}' not found in source '{calendar_source}'")]
    CalendarNotFoundInSource {
        name: String,
        calendar_source: String,
    },

    #[error(
        "Multiple calendars named '{name}' exist in sources: {}. Pass calendar_source to pick one.",
        .sources.join(", ")
    )]
    AmbiguousCalendar { name: String, sources: Vec<String> },

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Reminder not found: {0}")]
    ReminderNotFound(String),

    #[error("calendar_name is required: name the calendar or list to create the item in")]
    CalendarNameRequired,

    #[error("Invalid time range: start ({start}) must be before end ({end})")]
    InvalidTimeRange { start: String, end: String },

    #[error(
        "Invalid date '{0}'. Use 2026-02-06T14:00:00+08:00, 2026-02-06T14:00:00, 2026-02-06 or 14:00"
    )]
    InvalidDate(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown tool: {0}")]
    UnknownOperation(String),

    #[error("Calendar '{0}' is read-only")]
    ReadOnlyCalendar(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for calmcp operations.
pub type CalMcpResult<T> = Result<T, CalMcpError>;

impl From<serde_json::Error> for CalMcpError {
    fn from(err: serde_json::Error) -> Self {
        CalMcpError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_calendar_lists_every_source() {
        let err = CalMcpError::AmbiguousCalendar {
            name: "Work".into(),
            sources: vec!["A".into(), "B".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'Work'"));
        assert!(msg.contains("A, B"));
        assert!(msg.contains("calendar_source"));
    }

    #[test]
    fn access_denied_names_the_settings_pane() {
        let msg = CalMcpError::AccessDenied(EntityKind::Reminder).to_string();
        assert!(msg.starts_with("Reminders access denied"));
        assert!(msg.ends_with("> Reminders"));
    }
}
