//! Calendars and reminder lists as the store exposes them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CalMcpError, CalMcpResult};

/// What a calendar holds: events or reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Event,
    Reminder,
}

impl EntityKind {
    /// Name of the privacy pane that controls access to this kind.
    pub fn access_label(&self) -> &'static str {
        match self {
            EntityKind::Event => "Calendar",
            EntityKind::Reminder => "Reminders",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Event => "event",
            EntityKind::Reminder => "reminder",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CalMcpError;

    fn from_str(s: &str) -> CalMcpResult<Self> {
        match s {
            "event" => Ok(EntityKind::Event),
            "reminder" => Ok(EntityKind::Reminder),
            other => Err(CalMcpError::InvalidParameter(format!(
                "type must be 'event' or 'reminder', got '{other}'"
            ))),
        }
    }
}

/// A calendar or reminder list owned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    pub title: String,
    pub kind: EntityKind,
    /// Account/provider the calendar lives in (e.g. "iCloud", "Google").
    pub source: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub subscribed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Calendar {
    pub fn new(title: &str, kind: EntityKind, source: &str) -> Self {
        Calendar {
            id: String::new(),
            title: title.to_string(),
            kind,
            source: source.to_string(),
            read_only: false,
            subscribed: false,
            color: None,
        }
    }

    /// Whether items in this calendar may be created, changed or removed.
    pub fn allows_modifications(&self) -> bool {
        !self.read_only && !self.subscribed
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.source)
    }
}

/// Normalize a hex color ("#ff5733", "FF5733") to "#FF5733".
pub fn parse_color(input: &str) -> CalMcpResult<String> {
    let hex = input.trim().trim_start_matches('#');

    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CalMcpError::InvalidParameter(format!(
            "color must be a hex code like '#FF5733', got '{input}'"
        )));
    }

    Ok(format!("#{}", hex.to_ascii_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_color_normalizes_case_and_hash() {
        assert_eq!(parse_color("#ff5733").unwrap(), "#FF5733");
        assert_eq!(parse_color("00aaFF").unwrap(), "#00AAFF");
        assert_eq!(parse_color("  #123abc ").unwrap(), "#123ABC");
    }

    #[test]
    fn parse_color_rejects_garbage() {
        assert!(parse_color("#FFF").is_err());
        assert!(parse_color("zzzzzz").is_err());
        assert!(parse_color("").is_err());
    }

    #[test]
    fn entity_kind_from_str_fails_fast() {
        assert_eq!("event".parse::<EntityKind>().unwrap(), EntityKind::Event);
        assert_eq!(
            "reminder".parse::<EntityKind>().unwrap(),
            EntityKind::Reminder
        );
        assert!("calendar".parse::<EntityKind>().is_err());
    }

    #[test]
    fn subscribed_calendars_are_not_modifiable() {
        let mut cal = Calendar::new("Holidays", EntityKind::Event, "Subscribed");
        assert!(cal.allows_modifications());
        cal.subscribed = true;
        assert!(!cal.allows_modifications());
    }
}
