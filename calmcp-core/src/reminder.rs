//! Reminders and their priorities.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CalMcpError, CalMcpResult};
use crate::event::{Alarm, Proximity, StructuredLocation};
use crate::recurrence::{RecurrenceRule, StoreRule};
use crate::resolver::CalendarRef;

/// Reminder priority, stored with the usual numeric encoding
/// (0 none, 1 high, 5 medium, 9 low).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Priority {
    #[default]
    None,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Accepts 0..=9: 1-4 are high, 5 medium, 6-9 low.
    pub fn from_value(value: i64) -> CalMcpResult<Self> {
        match value {
            0 => Ok(Priority::None),
            1..=4 => Ok(Priority::High),
            5 => Ok(Priority::Medium),
            6..=9 => Ok(Priority::Low),
            other => Err(CalMcpError::InvalidParameter(format!(
                "priority must be 0 to 9 (0 none, 1-4 high, 5 medium, 6-9 low), got {other}"
            ))),
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            Priority::None => 0,
            Priority::High => 1,
            Priority::Medium => 5,
            Priority::Low => 9,
        }
    }

    /// Ordering key where no priority sorts after every explicit one.
    pub fn sort_key(&self) -> u8 {
        match self {
            Priority::None => 10,
            other => other.value(),
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.value()
    }
}

impl TryFrom<u8> for Priority {
    type Error = CalMcpError;

    fn try_from(value: u8) -> CalMcpResult<Self> {
        Priority::from_value(value as i64)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Priority::None => "none",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(label)
    }
}

/// Fire when entering or leaving a place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationTrigger {
    pub location: StructuredLocation,
    pub proximity: Proximity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<DateTime<Utc>>,
    pub calendar_id: String,
    pub creation_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<StoreRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_trigger: Option<LocationTrigger>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alarms: Vec<Alarm>,
}

impl Reminder {
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    /// Keeps `completion_date` set exactly when `completed` is true.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if completed && !self.completed {
            self.completion_date = Some(now);
        } else if !completed {
            self.completion_date = None;
        }
        self.completed = completed;
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due.is_some_and(|due| due < now)
    }

    pub fn search_text(&self) -> String {
        let mut text = self.title.to_lowercase();
        if let Some(notes) = &self.notes {
            text.push('\n');
            text.push_str(&notes.to_lowercase());
        }
        text
    }
}

/// Due dates are kept to the minute.
pub fn truncate_due(due: DateTime<Utc>) -> DateTime<Utc> {
    due.duration_trunc(TimeDelta::minutes(1)).unwrap_or(due)
}

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub title: String,
    pub notes: Option<String>,
    pub due: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub calendar: CalendarRef,
    pub alarms: Vec<Alarm>,
    pub recurrence: Option<RecurrenceRule>,
    pub location_trigger: Option<LocationTrigger>,
}

impl NewReminder {
    pub fn into_reminder(self, calendar_id: &str, now: DateTime<Utc>) -> Reminder {
        Reminder {
            id: None,
            title: self.title,
            notes: self.notes,
            due: self.due.map(truncate_due),
            priority: self.priority,
            completed: false,
            completion_date: None,
            calendar_id: calendar_id.to_string(),
            creation_date: now,
            recurrence: self.recurrence.map(|r| r.to_store_rule()),
            location_trigger: self.location_trigger,
            alarms: self.alarms,
        }
    }
}

/// Partial update; the `clear_*` flags remove a value rather than leave it.
#[derive(Debug, Clone, Default)]
pub struct ReminderUpdate {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due: Option<DateTime<Utc>>,
    pub clear_due: bool,
    pub priority: Option<Priority>,
    pub calendar: Option<CalendarRef>,
    pub alarms: Option<Vec<Alarm>>,
    pub recurrence: Option<RecurrenceRule>,
    pub clear_recurrence: bool,
    pub location_trigger: Option<LocationTrigger>,
    pub clear_location_trigger: bool,
}

impl ReminderUpdate {
    pub fn apply_to(&self, reminder: &mut Reminder) {
        if let Some(title) = &self.title {
            reminder.title = title.clone();
        }
        if let Some(notes) = &self.notes {
            reminder.notes = Some(notes.clone());
        }
        if self.clear_due {
            reminder.due = None;
        } else if let Some(due) = self.due {
            reminder.due = Some(truncate_due(due));
        }
        if let Some(priority) = self.priority {
            reminder.priority = priority;
        }
        if let Some(alarms) = &self.alarms {
            reminder.alarms = alarms.clone();
        }
        if self.clear_recurrence {
            reminder.recurrence = None;
        } else if let Some(rule) = &self.recurrence {
            reminder.recurrence = Some(rule.to_store_rule());
        }
        if self.clear_location_trigger {
            reminder.location_trigger = None;
        } else if let Some(trigger) = &self.location_trigger {
            reminder.location_trigger = Some(trigger.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn reminder() -> Reminder {
        Reminder {
            id: Some("r1".into()),
            title: "Pay rent".into(),
            notes: None,
            due: Some(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()),
            priority: Priority::High,
            completed: false,
            completion_date: None,
            calendar_id: "home".into(),
            creation_date: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            recurrence: None,
            location_trigger: None,
            alarms: vec![],
        }
    }

    #[test]
    fn priority_values_map_to_buckets() {
        assert_eq!(Priority::from_value(0).unwrap(), Priority::None);
        assert_eq!(Priority::from_value(1).unwrap(), Priority::High);
        assert_eq!(Priority::from_value(3).unwrap(), Priority::High);
        assert_eq!(Priority::from_value(5).unwrap(), Priority::Medium);
        assert_eq!(Priority::from_value(9).unwrap(), Priority::Low);
        assert!(Priority::from_value(10).is_err());
        assert!(Priority::from_value(-1).is_err());
    }

    #[test]
    fn priority_error_names_the_accepted_range() {
        let message = Priority::from_value(12).unwrap_err().to_string();
        assert!(message.contains("0 to 9"));
        assert!(message.contains("1-4 high"));
    }

    #[test]
    fn no_priority_sorts_last() {
        let mut all = vec![Priority::None, Priority::Low, Priority::High, Priority::Medium];
        all.sort_by_key(|p| p.sort_key());
        assert_eq!(
            all,
            vec![Priority::High, Priority::Medium, Priority::Low, Priority::None]
        );
    }

    #[test]
    fn completion_date_tracks_completed_flag() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let mut r = reminder();

        r.set_completed(true, now);
        assert!(r.completed);
        assert_eq!(r.completion_date, Some(now));

        r.set_completed(false, now);
        assert!(!r.completed);
        assert_eq!(r.completion_date, None);
    }

    #[test]
    fn overdue_requires_incomplete_and_past_due() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let mut r = reminder();
        assert!(r.is_overdue(now));
        r.set_completed(true, now);
        assert!(!r.is_overdue(now));
        r.set_completed(false, now);
        r.due = None;
        assert!(!r.is_overdue(now));
    }

    #[test]
    fn due_dates_drop_seconds() {
        let due = Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 45).unwrap();
        assert_eq!(truncate_due(due).second(), 0);
        assert_eq!(truncate_due(due).minute(), 30);
    }

    #[test]
    fn clear_flags_win_over_values() {
        let mut r = reminder();
        let update = ReminderUpdate {
            due: Some(Utc::now()),
            clear_due: true,
            ..Default::default()
        };
        update.apply_to(&mut r);
        assert_eq!(r.due, None);
    }

    #[test]
    fn priority_serializes_as_number() {
        let json = serde_json::to_value(Priority::Medium).unwrap();
        assert_eq!(json, serde_json::json!(5));
    }
}
