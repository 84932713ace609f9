use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{CalendarStore, Consent, Span};
use crate::calendar::{Calendar, EntityKind};
use crate::constants::{DEFAULT_EVENT_CALENDAR, DEFAULT_REMINDER_LIST, DEFAULT_SOURCE};
use crate::date_range::DateRange;
use crate::error::{CalMcpError, CalMcpResult};
use crate::event::Event;
use crate::recurrence::{expand_occurrences, first_occurrence};
use crate::reminder::Reminder;

/// Everything the store holds, in its persisted form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub calendars: Vec<Calendar>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_event_calendar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_reminder_list: Option<String>,
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Snapshot,
    consent: Consent,
    access_requests: Arc<AtomicUsize>,
    refreshes: usize,
}

impl MemoryStore {
    /// An empty store with no calendars at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding one default calendar and one default reminder list.
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        store.seed_defaults();
        store
    }

    pub fn from_snapshot(data: Snapshot) -> Self {
        MemoryStore {
            data,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.data
    }

    pub fn replace_snapshot(&mut self, data: Snapshot) {
        self.data = data;
    }

    pub fn with_consent(mut self, consent: Consent) -> Self {
        self.consent = consent;
        self
    }

    pub fn set_consent(&mut self, consent: Consent) {
        self.consent = consent;
    }

    /// How many times access has been requested.
    pub fn access_requests(&self) -> usize {
        self.access_requests.load(Ordering::SeqCst)
    }

    /// How many times sources have been refreshed.
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    /// Insert a calendar as-is (keeping read-only and subscription flags).
    pub fn insert_calendar(&mut self, mut calendar: Calendar) -> Calendar {
        if calendar.id.is_empty() {
            calendar.id = new_id();
        }
        self.data.calendars.push(calendar.clone());
        calendar
    }

    fn seed_defaults(&mut self) {
        if self.data.default_event_calendar.is_none() {
            let cal = self.insert_calendar(Calendar::new(
                DEFAULT_EVENT_CALENDAR,
                EntityKind::Event,
                DEFAULT_SOURCE,
            ));
            self.data.default_event_calendar = Some(cal.id);
        }
        if self.data.default_reminder_list.is_none() {
            let list = self.insert_calendar(Calendar::new(
                DEFAULT_REMINDER_LIST,
                EntityKind::Reminder,
                DEFAULT_SOURCE,
            ));
            self.data.default_reminder_list = Some(list.id);
        }
    }

    /// The calendar `id`, checked to hold `kind` and accept writes.
    fn writable_calendar(&self, id: &str, kind: EntityKind) -> CalMcpResult<&Calendar> {
        let calendar = self
            .data
            .calendars
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CalMcpError::CalendarNotFound(id.to_string()))?;

        if calendar.kind != kind {
            return Err(CalMcpError::Store(format!(
                "Calendar '{}' holds {}s, not {}s",
                calendar.title, calendar.kind, kind
            )));
        }
        if !calendar.allows_modifications() {
            return Err(CalMcpError::ReadOnlyCalendar(calendar.title.clone()));
        }
        Ok(calendar)
    }

    fn in_calendars(calendar_id: &str, calendar_ids: Option<&[String]>) -> bool {
        calendar_ids.is_none_or(|ids| ids.iter().any(|id| id == calendar_id))
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string().to_uppercase()
}

/// Whether `occurrence` is an actual occurrence of the series.
fn is_occurrence(series: &Event, occurrence: DateTime<Utc>) -> CalMcpResult<bool> {
    let Some(rule) = &series.recurrence else {
        return Ok(series.start == occurrence);
    };
    let window = DateRange::new(occurrence, occurrence + Duration::seconds(1))?;
    let hits = expand_occurrences(series.start, series.duration(), rule, &window)?;
    Ok(hits.contains(&occurrence))
}

impl CalendarStore for MemoryStore {
    fn request_access(&self, kind: EntityKind) -> impl Future<Output = CalMcpResult<bool>> + 'static {
        let requests = Arc::clone(&self.access_requests);
        let allowed = self.consent.allows(kind);
        async move {
            requests.fetch_add(1, Ordering::SeqCst);
            Ok(allowed)
        }
    }

    fn refresh_sources(&mut self) -> CalMcpResult<()> {
        self.refreshes += 1;
        Ok(())
    }

    fn calendars(&self, kind: Option<EntityKind>) -> Vec<Calendar> {
        self.data
            .calendars
            .iter()
            .filter(|c| kind.is_none_or(|k| c.kind == k))
            .cloned()
            .collect()
    }

    fn calendar(&self, id: &str) -> Option<Calendar> {
        self.data.calendars.iter().find(|c| c.id == id).cloned()
    }

    fn default_calendar(&self, kind: EntityKind) -> Option<Calendar> {
        let id = match kind {
            EntityKind::Event => self.data.default_event_calendar.as_deref(),
            EntityKind::Reminder => self.data.default_reminder_list.as_deref(),
        }?;
        self.calendar(id)
    }

    fn save_calendar(&mut self, calendar: Calendar) -> CalMcpResult<Calendar> {
        if calendar.title.trim().is_empty() {
            return Err(CalMcpError::InvalidParameter(
                "calendar title must not be empty".into(),
            ));
        }

        if calendar.id.is_empty() {
            let saved = self.insert_calendar(calendar);
            tracing::debug!(id = %saved.id, title = %saved.title, "Created calendar");
            return Ok(saved);
        }

        let existing = self
            .data
            .calendars
            .iter_mut()
            .find(|c| c.id == calendar.id)
            .ok_or_else(|| CalMcpError::CalendarNotFound(calendar.id.clone()))?;
        if !existing.allows_modifications() {
            return Err(CalMcpError::ReadOnlyCalendar(existing.title.clone()));
        }
        existing.title = calendar.title;
        existing.color = calendar.color;
        tracing::debug!(id = %existing.id, title = %existing.title, "Updated calendar");
        Ok(existing.clone())
    }

    fn remove_calendar(&mut self, id: &str) -> CalMcpResult<()> {
        let before = self.data.calendars.len();
        self.data.calendars.retain(|c| c.id != id);
        if self.data.calendars.len() == before {
            return Err(CalMcpError::CalendarNotFound(id.to_string()));
        }

        self.data.events.retain(|e| e.calendar_id != id);
        self.data.reminders.retain(|r| r.calendar_id != id);
        for default in [
            &mut self.data.default_event_calendar,
            &mut self.data.default_reminder_list,
        ] {
            if default.as_deref() == Some(id) {
                *default = None;
            }
        }
        tracing::debug!(id, "Removed calendar");
        Ok(())
    }

    fn events(
        &self,
        range: &DateRange,
        calendar_ids: Option<&[String]>,
    ) -> CalMcpResult<Vec<Event>> {
        let mut found = Vec::new();

        for event in &self.data.events {
            if !Self::in_calendars(&event.calendar_id, calendar_ids) {
                continue;
            }
            match &event.recurrence {
                Some(rule) => match expand_occurrences(event.start, event.duration(), rule, range) {
                    Ok(starts) => {
                        found.extend(starts.into_iter().map(|start| event.occurrence_at(start)));
                    }
                    Err(e) => {
                        tracing::warn!(id = %event.id_str(), error = %e, "Skipping series that failed to expand");
                    }
                },
                None => {
                    if range.overlaps(event.start, event.end) {
                        found.push(event.clone());
                    }
                }
            }
        }

        found.sort_by_key(|e| e.start);
        Ok(found)
    }

    fn event(&self, id: &str) -> Option<Event> {
        self.data
            .events
            .iter()
            .find(|e| e.id.as_deref() == Some(id))
            .cloned()
    }

    fn save_event(&mut self, mut event: Event) -> CalMcpResult<Event> {
        self.writable_calendar(&event.calendar_id, EntityKind::Event)?;
        event.validate_times()?;
        event.occurrence_date = None;
        if let Some(rule) = &event.recurrence {
            if !matches!(first_occurrence(event.start, rule), Ok(Some(_))) {
                return Err(CalMcpError::InvalidParameter(format!(
                    "recurrence of '{}' has no occurrence on or after its start {}",
                    event.title,
                    event.start.to_rfc3339()
                )));
            }
        }

        let existing = event
            .id
            .as_deref()
            .and_then(|id| self.data.events.iter().position(|e| e.id.as_deref() == Some(id)));

        match existing {
            Some(index) => {
                let previous = self.data.events[index].calendar_id.clone();
                if previous != event.calendar_id {
                    self.writable_calendar(&previous, EntityKind::Event)?;
                }
                self.data.events[index] = event.clone();
                tracing::debug!(id = %event.id_str(), "Updated event");
            }
            None => {
                if event.id.is_none() {
                    event.id = Some(new_id());
                }
                self.data.events.push(event.clone());
                tracing::debug!(id = %event.id_str(), calendar = %event.calendar_id, "Created event");
            }
        }

        Ok(event)
    }

    fn remove_event(
        &mut self,
        id: &str,
        span: Span,
        occurrence: Option<DateTime<Utc>>,
    ) -> CalMcpResult<()> {
        let index = self
            .data
            .events
            .iter()
            .position(|e| e.id.as_deref() == Some(id))
            .ok_or_else(|| CalMcpError::EventNotFound(id.to_string()))?;
        let calendar_id = self.data.events[index].calendar_id.clone();
        self.writable_calendar(&calendar_id, EntityKind::Event)?;

        if let Some(occ) = occurrence {
            if !is_occurrence(&self.data.events[index], occ)? {
                return Err(CalMcpError::InvalidParameter(format!(
                    "{} is not an occurrence of event {id}",
                    occ.to_rfc3339()
                )));
            }
        }

        let series = &mut self.data.events[index];
        let Some(rule) = series.recurrence.clone() else {
            self.data.events.remove(index);
            tracing::debug!(id, "Removed event");
            return Ok(());
        };

        let first = first_occurrence(series.start, &rule)?;
        let remove_series = match span {
            Span::This => match occurrence.or(first) {
                Some(target) => {
                    let mut updated = rule;
                    updated.exdates.push(target);
                    let remaining = first_occurrence(series.start, &updated)?;
                    series.recurrence = Some(updated);
                    remaining.is_none()
                }
                None => true,
            },
            Span::Future => match occurrence {
                Some(occ) if first.is_some_and(|f| occ > f) => {
                    series.recurrence = Some(rule.truncated_before(occ)?);
                    false
                }
                _ => true,
            },
        };

        if remove_series {
            self.data.events.remove(index);
            tracing::debug!(id, %span, "Removed recurring series");
        } else {
            tracing::debug!(id, %span, "Removed occurrences from series");
        }
        Ok(())
    }

    fn reminders(&self, calendar_ids: Option<&[String]>) -> Vec<Reminder> {
        self.data
            .reminders
            .iter()
            .filter(|r| Self::in_calendars(&r.calendar_id, calendar_ids))
            .cloned()
            .collect()
    }

    fn reminder(&self, id: &str) -> Option<Reminder> {
        self.data
            .reminders
            .iter()
            .find(|r| r.id.as_deref() == Some(id))
            .cloned()
    }

    fn save_reminder(&mut self, mut reminder: Reminder) -> CalMcpResult<Reminder> {
        self.writable_calendar(&reminder.calendar_id, EntityKind::Reminder)?;

        let existing = reminder
            .id
            .as_deref()
            .and_then(|id| self.data.reminders.iter().position(|r| r.id.as_deref() == Some(id)));

        match existing {
            Some(index) => {
                let previous = self.data.reminders[index].calendar_id.clone();
                if previous != reminder.calendar_id {
                    self.writable_calendar(&previous, EntityKind::Reminder)?;
                }
                self.data.reminders[index] = reminder.clone();
                tracing::debug!(id = %reminder.id_str(), "Updated reminder");
            }
            None => {
                if reminder.id.is_none() {
                    reminder.id = Some(new_id());
                }
                self.data.reminders.push(reminder.clone());
                tracing::debug!(id = %reminder.id_str(), list = %reminder.calendar_id, "Created reminder");
            }
        }

        Ok(reminder)
    }

    fn remove_reminder(&mut self, id: &str) -> CalMcpResult<()> {
        let index = self
            .data
            .reminders
            .iter()
            .position(|r| r.id.as_deref() == Some(id))
            .ok_or_else(|| CalMcpError::ReminderNotFound(id.to_string()))?;
        let list = self.data.reminders[index].calendar_id.clone();
        self.writable_calendar(&list, EntityKind::Reminder)?;
        self.data.reminders.remove(index);
        tracing::debug!(id, "Removed reminder");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::StoreRule;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, d, h, 0, 0).unwrap()
    }

    fn store_with_calendar() -> (MemoryStore, String) {
        let mut store = MemoryStore::new();
        let cal = store.insert_calendar(Calendar::new("Work", EntityKind::Event, "iCloud"));
        (store, cal.id)
    }

    fn daily(calendar_id: &str) -> Event {
        Event {
            id: None,
            title: "Standup".into(),
            start: at(1, 9),
            end: at(1, 10),
            all_day: false,
            notes: None,
            location: None,
            url: None,
            calendar_id: calendar_id.into(),
            alarms: vec![],
            recurrence: Some(StoreRule {
                rrule: "FREQ=DAILY;INTERVAL=1;COUNT=10".into(),
                tzid: None,
                exdates: vec![],
            }),
            occurrence_date: None,
        }
    }

    fn january() -> DateRange {
        DateRange::new(at(1, 0), at(31, 0)).unwrap()
    }

    #[test]
    fn first_save_assigns_an_id() {
        let (mut store, cal) = store_with_calendar();
        let saved = store.save_event(daily(&cal)).unwrap();
        assert!(saved.id.is_some());
        assert_eq!(store.event(saved.id_str()).unwrap().title, "Standup");
    }

    #[test]
    fn read_only_calendar_refuses_writes() {
        let mut store = MemoryStore::new();
        let mut holidays = Calendar::new("Holidays", EntityKind::Event, "Subscribed");
        holidays.subscribed = true;
        let holidays = store.insert_calendar(holidays);
        assert!(matches!(
            store.save_event(daily(&holidays.id)),
            Err(CalMcpError::ReadOnlyCalendar(_))
        ));
    }

    #[test]
    fn reminder_list_refuses_events() {
        let mut store = MemoryStore::with_defaults();
        let list = store.default_calendar(EntityKind::Reminder).unwrap();
        assert!(matches!(
            store.save_event(daily(&list.id)),
            Err(CalMcpError::Store(_))
        ));
    }

    #[test]
    fn series_expand_into_occurrences() {
        let (mut store, cal) = store_with_calendar();
        let saved = store.save_event(daily(&cal)).unwrap();
        let events = store.events(&january(), None).unwrap();
        assert_eq!(events.len(), 10);
        assert!(events.iter().all(|e| e.id == saved.id));
        assert_eq!(events[3].occurrence_date, Some(at(4, 9)));
    }

    #[test]
    fn removing_this_occurrence_excludes_it() {
        let (mut store, cal) = store_with_calendar();
        let id = store.save_event(daily(&cal)).unwrap().id.unwrap();
        store.remove_event(&id, Span::This, Some(at(3, 9))).unwrap();

        let starts: Vec<_> = store
            .events(&january(), None)
            .unwrap()
            .iter()
            .map(|e| e.start)
            .collect();
        assert_eq!(starts.len(), 9);
        assert!(!starts.contains(&at(3, 9)));
    }

    #[test]
    fn removing_this_without_occurrence_drops_the_first() {
        let (mut store, cal) = store_with_calendar();
        let id = store.save_event(daily(&cal)).unwrap().id.unwrap();
        store.remove_event(&id, Span::This, None).unwrap();
        let events = store.events(&january(), None).unwrap();
        assert_eq!(events[0].start, at(2, 9));
    }

    #[test]
    fn removing_future_truncates_the_series() {
        let (mut store, cal) = store_with_calendar();
        let id = store.save_event(daily(&cal)).unwrap().id.unwrap();
        store.remove_event(&id, Span::Future, Some(at(5, 9))).unwrap();
        assert_eq!(store.events(&january(), None).unwrap().len(), 4);
    }

    #[test]
    fn removing_future_from_the_first_removes_everything() {
        let (mut store, cal) = store_with_calendar();
        let id = store.save_event(daily(&cal)).unwrap().id.unwrap();
        store.remove_event(&id, Span::Future, Some(at(1, 9))).unwrap();
        assert!(store.event(&id).is_none());
    }

    #[test]
    fn unknown_occurrence_is_rejected() {
        let (mut store, cal) = store_with_calendar();
        let id = store.save_event(daily(&cal)).unwrap().id.unwrap();
        assert!(matches!(
            store.remove_event(&id, Span::This, Some(at(3, 10))),
            Err(CalMcpError::InvalidParameter(_))
        ));
    }

    #[test]
    fn removing_a_calendar_removes_its_items() {
        let (mut store, cal) = store_with_calendar();
        let id = store.save_event(daily(&cal)).unwrap().id.unwrap();
        store.remove_calendar(&cal).unwrap();
        assert!(store.event(&id).is_none());
        assert!(store.calendar(&cal).is_none());
    }

    #[test]
    fn defaults_are_seeded_once() {
        let mut store = MemoryStore::with_defaults();
        store.seed_defaults();
        assert_eq!(store.calendars(None).len(), 2);
        assert_eq!(
            store.default_calendar(EntityKind::Event).unwrap().title,
            DEFAULT_EVENT_CALENDAR
        );
    }

    #[tokio::test]
    async fn consent_follows_configuration() {
        let store = MemoryStore::new().with_consent(Consent {
            events: true,
            reminders: false,
        });
        assert!(store.request_access(EntityKind::Event).await.unwrap());
        assert!(!store.request_access(EntityKind::Reminder).await.unwrap());
        assert_eq!(store.access_requests(), 2);
    }

    #[test]
    fn series_ending_before_its_start_is_refused() {
        let (mut store, cal) = store_with_calendar();
        let mut series = daily(&cal);
        series.recurrence = Some(StoreRule {
            rrule: "FREQ=DAILY;INTERVAL=1;UNTIL=20251231T000000Z".into(),
            tzid: None,
            exdates: vec![],
        });
        assert!(matches!(
            store.save_event(series),
            Err(CalMcpError::InvalidParameter(_))
        ));
        assert!(store.snapshot().events.is_empty());
    }

    #[test]
    fn broken_series_does_not_hide_other_events() {
        let (mut store, cal) = store_with_calendar();
        let mut single = daily(&cal);
        single.title = "Dentist".into();
        single.recurrence = None;
        store.save_event(single).unwrap();

        let mut broken = daily(&cal);
        broken.id = Some("broken".into());
        broken.recurrence = Some(StoreRule {
            rrule: "FREQ=DAILY;INTERVAL=1;UNTIL=20251231T000000Z".into(),
            tzid: None,
            exdates: vec![],
        });
        let mut snapshot = store.snapshot().clone();
        snapshot.events.push(broken);
        store.replace_snapshot(snapshot);

        let events = store.events(&january(), None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Dentist");
    }
}
