//! Conflict and duplicate detection over fetched events.

use chrono::{DateTime, Duration, Utc};

use crate::event::Event;

/// Events overlapping `[start, end)`. Back-to-back events do not conflict.
pub fn find_conflicts<'a>(
    events: &'a [Event],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_id: Option<&str>,
) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|e| e.start < end && e.end > start)
        .filter(|e| exclude_id.is_none_or(|id| e.id.as_deref() != Some(id)))
        .collect()
}

/// Two events on different calendars that look like the same thing.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatePair {
    pub first: Event,
    pub second: Event,
    /// Absolute difference between the two starts.
    pub time_difference_seconds: i64,
}

/// Pairs of events from different calendars with case-insensitively equal
/// titles whose starts and ends each lie within `tolerance`.
pub fn find_duplicates(events: &[Event], tolerance: Duration) -> Vec<DuplicatePair> {
    let titles: Vec<String> = events.iter().map(|e| e.title.to_lowercase()).collect();
    let mut pairs = Vec::new();

    for i in 0..events.len() {
        for j in (i + 1)..events.len() {
            let (a, b) = (&events[i], &events[j]);
            if a.calendar_id == b.calendar_id || titles[i] != titles[j] {
                continue;
            }

            let start_diff = (a.start - b.start).abs();
            let end_diff = (a.end - b.end).abs();
            if start_diff <= tolerance && end_diff <= tolerance {
                pairs.push(DuplicatePair {
                    first: a.clone(),
                    second: b.clone(),
                    time_difference_seconds: start_diff.num_seconds(),
                });
            }
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 26, h, m, 0).unwrap()
    }

    fn event(id: &str, title: &str, calendar: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Event {
        Event {
            id: Some(id.into()),
            title: title.into(),
            start,
            end,
            all_day: false,
            notes: None,
            location: None,
            url: None,
            calendar_id: calendar.into(),
            alarms: vec![],
            recurrence: None,
            occurrence_date: None,
        }
    }

    #[test]
    fn touching_events_do_not_conflict() {
        let existing = vec![event("a", "A", "c", at(10, 0), at(11, 0))];
        assert!(find_conflicts(&existing, at(11, 0), at(12, 0), None).is_empty());
    }

    #[test]
    fn overlapping_events_conflict() {
        let existing = vec![event("a", "A", "c", at(10, 0), at(11, 30))];
        let hits = find_conflicts(&existing, at(11, 0), at(12, 0), None);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn excluded_event_is_skipped() {
        let existing = vec![event("a", "A", "c", at(10, 0), at(11, 30))];
        assert!(find_conflicts(&existing, at(11, 0), at(12, 0), Some("a")).is_empty());
    }

    #[test]
    fn standups_four_minutes_apart_are_duplicates() {
        let events = vec![
            event("1", "Standup", "work-a", at(9, 0), at(9, 15)),
            event("2", "standup", "work-b", at(9, 4), at(9, 19)),
        ];
        let pairs = find_duplicates(&events, Duration::minutes(5));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].time_difference_seconds, 240);
    }

    #[test]
    fn same_calendar_is_never_a_duplicate() {
        let events = vec![
            event("1", "Standup", "work", at(9, 0), at(9, 15)),
            event("2", "Standup", "work", at(9, 0), at(9, 15)),
        ];
        assert!(find_duplicates(&events, Duration::minutes(60)).is_empty());
    }

    #[test]
    fn outside_tolerance_is_not_a_duplicate() {
        let events = vec![
            event("1", "Standup", "a", at(9, 0), at(9, 15)),
            event("2", "Standup", "b", at(9, 6), at(9, 21)),
        ];
        assert!(find_duplicates(&events, Duration::minutes(5)).is_empty());
    }

    #[test]
    fn end_must_also_be_within_tolerance() {
        let events = vec![
            event("1", "Standup", "a", at(9, 0), at(9, 15)),
            event("2", "Standup", "b", at(9, 0), at(10, 0)),
        ];
        assert!(find_duplicates(&events, Duration::minutes(5)).is_empty());
    }
}
