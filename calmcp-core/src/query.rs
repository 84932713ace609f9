//! Filter, sort and limit over fetched events and reminders.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

use crate::error::{CalMcpError, CalMcpResult};
use crate::event::Event;
use crate::reminder::Reminder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    /// Ended before now.
    Past,
    /// Starts after now.
    Future,
    AllDay,
}

impl EventFilter {
    pub fn matches(&self, event: &Event, now: DateTime<Utc>) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Past => event.end < now,
            EventFilter::Future => event.start > now,
            EventFilter::AllDay => event.all_day,
        }
    }
}

impl FromStr for EventFilter {
    type Err = CalMcpError;

    fn from_str(s: &str) -> CalMcpResult<Self> {
        match s {
            "all" => Ok(EventFilter::All),
            "past" => Ok(EventFilter::Past),
            "future" => Ok(EventFilter::Future),
            "all_day" => Ok(EventFilter::AllDay),
            other => Err(CalMcpError::InvalidParameter(format!(
                "filter must be one of all, past, future, all_day; got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReminderFilter {
    #[default]
    All,
    Incomplete,
    Completed,
    /// Incomplete with a due date already past.
    Overdue,
}

impl ReminderFilter {
    /// `filter` wins over the legacy `completed` flag when both are given.
    pub fn from_args(filter: Option<&str>, completed: Option<bool>) -> CalMcpResult<Self> {
        match (filter, completed) {
            (Some(f), _) => f.parse(),
            (None, Some(true)) => Ok(ReminderFilter::Completed),
            (None, Some(false)) => Ok(ReminderFilter::Incomplete),
            (None, None) => Ok(ReminderFilter::All),
        }
    }

    pub fn matches(&self, reminder: &Reminder, now: DateTime<Utc>) -> bool {
        match self {
            ReminderFilter::All => true,
            ReminderFilter::Incomplete => !reminder.completed,
            ReminderFilter::Completed => reminder.completed,
            ReminderFilter::Overdue => reminder.is_overdue(now),
        }
    }
}

impl FromStr for ReminderFilter {
    type Err = CalMcpError;

    fn from_str(s: &str) -> CalMcpResult<Self> {
        match s {
            "all" => Ok(ReminderFilter::All),
            "incomplete" => Ok(ReminderFilter::Incomplete),
            "completed" => Ok(ReminderFilter::Completed),
            "overdue" => Ok(ReminderFilter::Overdue),
            other => Err(CalMcpError::InvalidParameter(format!(
                "filter must be one of all, incomplete, completed, overdue; got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReminderSort {
    /// Undated reminders last.
    #[default]
    DueDate,
    CreationDate,
    /// High first, no priority last.
    Priority,
    /// Case-insensitive.
    Title,
}

impl FromStr for ReminderSort {
    type Err = CalMcpError;

    fn from_str(s: &str) -> CalMcpResult<Self> {
        match s {
            "due_date" => Ok(ReminderSort::DueDate),
            "creation_date" => Ok(ReminderSort::CreationDate),
            "priority" => Ok(ReminderSort::Priority),
            "title" => Ok(ReminderSort::Title),
            other => Err(CalMcpError::InvalidParameter(format!(
                "sort_by must be one of due_date, creation_date, priority, title; got '{other}'"
            ))),
        }
    }
}

impl ReminderSort {
    pub fn sort(&self, reminders: &mut [Reminder]) {
        match self {
            ReminderSort::DueDate => {
                reminders.sort_by_key(|r| (r.due.is_none(), r.due));
            }
            ReminderSort::CreationDate => reminders.sort_by_key(|r| r.creation_date),
            ReminderSort::Priority => reminders.sort_by_key(|r| r.priority.sort_key()),
            ReminderSort::Title => reminders.sort_by_cached_key(|r| r.title.to_lowercase()),
        }
    }
}

/// How multiple keywords combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Any,
    All,
}

impl FromStr for MatchMode {
    type Err = CalMcpError;

    fn from_str(s: &str) -> CalMcpResult<Self> {
        match s {
            "any" => Ok(MatchMode::Any),
            "all" => Ok(MatchMode::All),
            other => Err(CalMcpError::InvalidParameter(format!(
                "match_mode must be 'any' or 'all', got '{other}'"
            ))),
        }
    }
}

/// Lower-cased keywords matched against a lower-cased haystack.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    mode: MatchMode,
}

impl KeywordMatcher {
    pub fn new(keywords: Vec<String>, mode: MatchMode) -> CalMcpResult<Self> {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Err(CalMcpError::InvalidParameter(
                "keyword or keywords is required".into(),
            ));
        }
        Ok(KeywordMatcher { keywords, mode })
    }

    pub fn matches(&self, haystack: &str) -> bool {
        match self.mode {
            MatchMode::Any => self.keywords.iter().any(|k| haystack.contains(k.as_str())),
            MatchMode::All => self.keywords.iter().all(|k| haystack.contains(k.as_str())),
        }
    }
}

/// Counts that let callers tell "nothing in range" from "all filtered out".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryMeta {
    pub total_in_range: usize,
    pub total_matched: usize,
    pub returned: usize,
}

#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub items: Vec<T>,
    pub meta: QueryMeta,
}

/// Filter, sort by start and limit.
pub fn refine_events(
    events: Vec<Event>,
    filter: EventFilter,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> QueryResult<Event> {
    let total_in_range = events.len();
    let mut items: Vec<Event> = events
        .into_iter()
        .filter(|e| filter.matches(e, now))
        .collect();
    items.sort_by_key(|e| e.start);
    finish(items, total_in_range, limit)
}

/// Filter, sort and limit.
pub fn refine_reminders(
    reminders: Vec<Reminder>,
    filter: ReminderFilter,
    sort: ReminderSort,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> QueryResult<Reminder> {
    let total_in_range = reminders.len();
    let mut items: Vec<Reminder> = reminders
        .into_iter()
        .filter(|r| filter.matches(r, now))
        .collect();
    sort.sort(&mut items);
    finish(items, total_in_range, limit)
}

fn finish<T>(mut items: Vec<T>, total_in_range: usize, limit: Option<usize>) -> QueryResult<T> {
    let total_matched = items.len();
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    QueryResult {
        meta: QueryMeta {
            total_in_range,
            total_matched,
            returned: items.len(),
        },
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::Priority;
    use chrono::TimeZone;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, d, 9, 0, 0).unwrap()
    }

    fn event(title: &str, day: u32, all_day: bool) -> Event {
        Event {
            id: Some(title.into()),
            title: title.into(),
            start: at(day),
            end: at(day) + chrono::Duration::hours(1),
            all_day,
            notes: None,
            location: None,
            url: None,
            calendar_id: "c".into(),
            alarms: vec![],
            recurrence: None,
            occurrence_date: None,
        }
    }

    fn reminder(title: &str, due: Option<u32>, priority: Priority, completed: bool) -> Reminder {
        Reminder {
            id: Some(title.into()),
            title: title.into(),
            notes: None,
            due: due.map(at),
            priority,
            completed,
            completion_date: completed.then(|| at(1)),
            calendar_id: "l".into(),
            creation_date: at(1),
            recurrence: None,
            location_trigger: None,
            alarms: vec![],
        }
    }

    #[test]
    fn events_filter_then_sort_then_limit() {
        let events = vec![event("c", 20, false), event("a", 5, false), event("b", 15, true)];
        let result = refine_events(events, EventFilter::Future, Some(1), at(10));
        assert_eq!(result.items[0].title, "b");
        assert_eq!(
            result.meta,
            QueryMeta {
                total_in_range: 3,
                total_matched: 2,
                returned: 1
            }
        );
    }

    #[test]
    fn everything_filtered_out_is_distinguishable() {
        let events = vec![event("a", 5, false)];
        let result = refine_events(events, EventFilter::AllDay, None, at(10));
        assert_eq!(result.meta.total_in_range, 1);
        assert_eq!(result.meta.total_matched, 0);
    }

    #[test]
    fn due_date_sort_puts_undated_last() {
        let mut list = vec![
            reminder("none", None, Priority::None, false),
            reminder("late", Some(20), Priority::None, false),
            reminder("early", Some(3), Priority::None, false),
        ];
        ReminderSort::DueDate.sort(&mut list);
        let titles: Vec<_> = list.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["early", "late", "none"]);
    }

    #[test]
    fn title_sort_ignores_case() {
        let mut list = vec![
            reminder("banana", None, Priority::None, false),
            reminder("Apple", None, Priority::None, false),
            reminder("cherry", None, Priority::None, false),
        ];
        ReminderSort::Title.sort(&mut list);
        assert_eq!(list[0].title, "Apple");
        assert_eq!(list[2].title, "cherry");
    }

    #[test]
    fn overdue_filter() {
        let list = vec![
            reminder("late", Some(2), Priority::High, false),
            reminder("done", Some(2), Priority::High, true),
            reminder("later", Some(25), Priority::High, false),
        ];
        let result = refine_reminders(
            list,
            ReminderFilter::Overdue,
            ReminderSort::DueDate,
            None,
            at(10),
        );
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].title, "late");
    }

    #[test]
    fn filter_supersedes_legacy_completed_flag() {
        assert_eq!(
            ReminderFilter::from_args(Some("overdue"), Some(true)).unwrap(),
            ReminderFilter::Overdue
        );
        assert_eq!(
            ReminderFilter::from_args(None, Some(false)).unwrap(),
            ReminderFilter::Incomplete
        );
        assert!(ReminderFilter::from_args(Some("pending"), None).is_err());
    }

    #[test]
    fn keyword_modes() {
        let any = KeywordMatcher::new(vec!["Lunch".into(), "gym".into()], MatchMode::Any).unwrap();
        let all = KeywordMatcher::new(vec!["lunch".into(), "GYM".into()], MatchMode::All).unwrap();
        assert!(any.matches("team lunch"));
        assert!(!all.matches("team lunch"));
        assert!(all.matches("lunch then gym"));
        assert!(KeywordMatcher::new(vec!["  ".into()], MatchMode::Any).is_err());
    }
}
