//! Calendar events, their locations and alarms.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CalMcpError, CalMcpResult};
use crate::recurrence::{RecurrenceRule, StoreRule};
use crate::resolver::CalendarRef;

/// A geographic point with a display title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredLocation {
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Geofence radius in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

impl StructuredLocation {
    pub fn validate(&self) -> CalMcpResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(CalMcpError::InvalidParameter(format!(
                "location '{}' has out-of-range coordinates ({}, {})",
                self.title, self.latitude, self.longitude
            )));
        }
        if self.radius.is_some_and(|r| r <= 0.0) {
            return Err(CalMcpError::InvalidParameter(
                "location radius must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Text(String),
    Structured(StructuredLocation),
}

impl Location {
    pub fn text(&self) -> &str {
        match self {
            Location::Text(text) => text,
            Location::Structured(s) => &s.title,
        }
    }
}

/// Entering or leaving a geofence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proximity {
    Enter,
    Leave,
}

impl Proximity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Proximity::Enter => "enter",
            Proximity::Leave => "leave",
        }
    }
}

impl fmt::Display for Proximity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Proximity {
    type Err = CalMcpError;

    fn from_str(s: &str) -> CalMcpResult<Self> {
        match s {
            "enter" => Ok(Proximity::Enter),
            "leave" => Ok(Proximity::Leave),
            other => Err(CalMcpError::InvalidParameter(format!(
                "proximity must be 'enter' or 'leave', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alarm {
    /// Signed offset from the start; negative fires before.
    Relative { offset_minutes: i64 },
    Proximity {
        proximity: Proximity,
        location: StructuredLocation,
    },
}

impl Alarm {
    pub fn minutes_before(minutes: i64) -> CalMcpResult<Self> {
        let offset_minutes = minutes.checked_neg().ok_or_else(|| {
            CalMcpError::InvalidParameter(format!("alarm offset {minutes} is out of range"))
        })?;
        Ok(Alarm::Relative { offset_minutes })
    }
}

/// Build relative alarms from "minutes before start" offsets.
pub fn alarms_from_offsets(offsets: &[i64]) -> CalMcpResult<Vec<Alarm>> {
    offsets.iter().map(|m| Alarm::minutes_before(*m)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Absent until the store commits the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub calendar_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alarms: Vec<Alarm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<StoreRule>,
    /// Start of this occurrence, set only on occurrences expanded from a series.
    #[serde(skip)]
    pub occurrence_date: Option<DateTime<Utc>>,
}

impl Event {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    /// Timed events must start before they end; all-day events may not end
    /// before they start.
    pub fn validate_times(&self) -> CalMcpResult<()> {
        let valid = if self.all_day {
            self.end >= self.start
        } else {
            self.start < self.end
        };
        if valid {
            Ok(())
        } else {
            Err(CalMcpError::InvalidTimeRange {
                start: self.start.to_rfc3339(),
                end: self.end.to_rfc3339(),
            })
        }
    }

    /// The occurrence of this series starting at `start`.
    pub fn occurrence_at(&self, start: DateTime<Utc>) -> Event {
        Event {
            start,
            end: start + self.duration(),
            occurrence_date: Some(start),
            ..self.clone()
        }
    }

    /// Uncommitted copy of this event placed in another calendar.
    pub fn copy_to(&self, calendar_id: &str) -> Event {
        Event {
            id: None,
            calendar_id: calendar_id.to_string(),
            occurrence_date: None,
            ..self.clone()
        }
    }

    /// Text matched by keyword search.
    pub fn search_text(&self) -> String {
        let mut text = self.title.to_lowercase();
        for part in [
            self.notes.as_deref(),
            self.location.as_ref().map(|l| l.text()),
        ]
        .into_iter()
        .flatten()
        {
            text.push('\n');
            text.push_str(&part.to_lowercase());
        }
        text
    }
}

/// A fully parsed request to create an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub notes: Option<String>,
    pub location: Option<Location>,
    pub url: Option<String>,
    pub calendar: CalendarRef,
    pub alarms: Vec<Alarm>,
    pub recurrence: Option<RecurrenceRule>,
}

impl NewEvent {
    pub fn into_event(self, calendar_id: &str) -> Event {
        Event {
            id: None,
            title: self.title,
            start: self.start,
            end: self.end,
            all_day: self.all_day,
            notes: self.notes,
            location: self.location,
            url: self.url,
            calendar_id: calendar_id.to_string(),
            alarms: self.alarms,
            recurrence: self.recurrence.map(|r| r.to_store_rule()),
            occurrence_date: None,
        }
    }
}

/// Partial update. `None` leaves a field unchanged; clearing the recurrence
/// takes the explicit flag.
#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    pub notes: Option<String>,
    pub location: Option<Location>,
    pub url: Option<String>,
    pub calendar: Option<CalendarRef>,
    pub alarms: Option<Vec<Alarm>>,
    pub recurrence: Option<RecurrenceRule>,
    pub clear_recurrence: bool,
}

impl EventUpdate {
    /// Apply everything except the calendar move, which needs a resolved
    /// calendar. A new start without a new end keeps the event's duration.
    pub fn apply_to(&self, event: &mut Event) -> CalMcpResult<()> {
        let duration = event.duration();

        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        match (self.start, self.end) {
            (Some(start), Some(end)) => {
                event.start = start;
                event.end = end;
            }
            (Some(start), None) => {
                event.start = start;
                event.end = start + duration;
            }
            (None, Some(end)) => event.end = end,
            (None, None) => {}
        }
        if let Some(all_day) = self.all_day {
            event.all_day = all_day;
        }
        if let Some(notes) = &self.notes {
            event.notes = Some(notes.clone());
        }
        if let Some(location) = &self.location {
            event.location = Some(location.clone());
        }
        if let Some(url) = &self.url {
            event.url = Some(url.clone());
        }
        if let Some(alarms) = &self.alarms {
            event.alarms = alarms.clone();
        }
        if self.clear_recurrence {
            event.recurrence = None;
        } else if let Some(rule) = &self.recurrence {
            event.recurrence = Some(rule.to_store_rule());
        }

        event.validate_times()
    }
}
