use chrono::{DateTime, Duration, Utc};

use super::{Engine, resolve_filter, resolve_one};
use crate::analyze::{self, DuplicatePair};
use crate::calendar::EntityKind;
use crate::date_range::{DateRange, QuickRange, WeekStart};
use crate::error::{CalMcpError, CalMcpResult};
use crate::event::{Event, EventUpdate, NewEvent};
use crate::query::{self, EventFilter, KeywordMatcher, QueryResult};
use crate::resolver::{self, CalendarRef};
use crate::store::{CalendarStore, Span};

/// Create one event in an already locked store.
pub(super) fn create_in<S: CalendarStore>(store: &mut S, new: NewEvent) -> CalMcpResult<Event> {
    let calendar = resolve_one(store, &new.calendar, EntityKind::Event)?;
    let event = new.into_event(&calendar.id);
    event.validate_times()?;
    store.save_event(event)
}

/// Copy an event into `target`, removing the original when moving.
pub(super) fn copy_in<S: CalendarStore>(
    store: &mut S,
    id: &str,
    target: &CalendarRef,
    delete_original: bool,
) -> CalMcpResult<Event> {
    let original = store
        .event(id)
        .ok_or_else(|| CalMcpError::EventNotFound(id.to_string()))?;
    let calendar = resolve_one(store, target, EntityKind::Event)?;

    if delete_original && original.calendar_id == calendar.id {
        return Ok(original);
    }

    let copy = store.save_event(original.copy_to(&calendar.id))?;
    if delete_original {
        store.remove_event(id, Span::Future, None)?;
    }
    Ok(copy)
}

impl<S: CalendarStore> Engine<S> {
    pub async fn list_events(
        &self,
        range: DateRange,
        calendar: Option<&CalendarRef>,
        filter: EventFilter,
        limit: Option<usize>,
    ) -> CalMcpResult<QueryResult<Event>> {
        let store = self.read(EntityKind::Event).await?;
        let ids = resolve_filter(&*store, calendar, EntityKind::Event)?;
        let events = store.events(&range, ids.as_deref())?;
        Ok(query::refine_events(events, filter, limit, Utc::now()))
    }

    /// Resolve a named range, then list it. Returns the concrete range too.
    pub async fn list_events_quick(
        &self,
        quick: QuickRange,
        week_start: WeekStart,
        calendar: Option<&CalendarRef>,
        filter: EventFilter,
        limit: Option<usize>,
    ) -> CalMcpResult<(DateRange, QueryResult<Event>)> {
        let first_day = week_start.first_day(self.settings.week_start_default);
        let range = quick.resolve(Utc::now(), &self.settings.zone, first_day)?;
        let result = self.list_events(range, calendar, filter, limit).await?;
        Ok((range, result))
    }

    pub async fn create_event(&self, new: NewEvent) -> CalMcpResult<Event> {
        let mut store = self.write(EntityKind::Event).await?;
        let event = create_in(&mut *store, new)?;
        self.gate.mark_stale();
        Ok(event)
    }

    /// Apply a partial update. Nothing is saved if the result is invalid.
    pub async fn update_event(&self, id: &str, update: &EventUpdate) -> CalMcpResult<Event> {
        let mut store = self.write(EntityKind::Event).await?;
        let mut event = store
            .event(id)
            .ok_or_else(|| CalMcpError::EventNotFound(id.to_string()))?;

        update.apply_to(&mut event)?;
        if let Some(reference) = &update.calendar {
            event.calendar_id = resolve_one(&*store, reference, EntityKind::Event)?.id;
        }

        let saved = store.save_event(event)?;
        self.gate.mark_stale();
        Ok(saved)
    }

    pub async fn delete_event(
        &self,
        id: &str,
        span: Span,
        occurrence: Option<DateTime<Utc>>,
    ) -> CalMcpResult<Event> {
        let mut store = self.write(EntityKind::Event).await?;
        let event = store
            .event(id)
            .ok_or_else(|| CalMcpError::EventNotFound(id.to_string()))?;
        store.remove_event(id, span, occurrence)?;
        self.gate.mark_stale();
        Ok(event)
    }

    /// Keyword search. Without a range, searches the configured window
    /// around now.
    pub async fn search_events(
        &self,
        matcher: &KeywordMatcher,
        range: Option<DateRange>,
        calendar: Option<&CalendarRef>,
        limit: Option<usize>,
    ) -> CalMcpResult<QueryResult<Event>> {
        let now = Utc::now();
        let range = match range {
            Some(range) => range,
            None => DateRange::around(now, self.search_window()?)?,
        };

        let store = self.read(EntityKind::Event).await?;
        let ids = resolve_filter(&*store, calendar, EntityKind::Event)?;
        let events: Vec<Event> = store
            .events(&range, ids.as_deref())?
            .into_iter()
            .filter(|e| matcher.matches(&e.search_text()))
            .collect();
        Ok(query::refine_events(events, EventFilter::All, limit, now))
    }

    /// Events overlapping `[start, end)`, other than `exclude_id`.
    pub async fn check_conflicts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        calendar: Option<&CalendarRef>,
        exclude_id: Option<&str>,
    ) -> CalMcpResult<Vec<Event>> {
        let range = DateRange::new(start, end)?;
        let store = self.read(EntityKind::Event).await?;
        let ids = resolve_filter(&*store, calendar, EntityKind::Event)?;
        let events = store.events(&range, ids.as_deref())?;
        Ok(analyze::find_conflicts(&events, start, end, exclude_id)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn copy_event(
        &self,
        id: &str,
        target: &CalendarRef,
        delete_original: bool,
    ) -> CalMcpResult<Event> {
        let mut store = self.write(EntityKind::Event).await?;
        let result = copy_in(&mut *store, id, target, delete_original);
        self.gate.mark_stale();
        let copy = result?;
        tracing::info!(from = id, to = %copy.id_str(), moved = delete_original, "Copied event");
        Ok(copy)
    }

    /// Same-titled events on different calendars starting and ending within
    /// the tolerance of each other. Every calendar sharing a requested name
    /// takes part.
    pub async fn find_duplicate_events(
        &self,
        range: DateRange,
        calendar_names: Option<&[String]>,
        calendar_source: Option<&str>,
        tolerance_minutes: Option<i64>,
    ) -> CalMcpResult<Vec<DuplicatePair>> {
        let tolerance_minutes =
            tolerance_minutes.unwrap_or(self.settings.duplicate_tolerance_minutes);
        let tolerance = Duration::try_minutes(tolerance_minutes)
            .filter(|_| tolerance_minutes >= 0)
            .ok_or_else(|| {
                CalMcpError::InvalidParameter(format!(
                    "tolerance_minutes must be between 0 and {}, got {tolerance_minutes}",
                    Duration::MAX.num_minutes()
                ))
            })?;

        let store = self.read(EntityKind::Event).await?;
        let ids = match calendar_names {
            Some(names) if !names.is_empty() => {
                let calendars = store.calendars(Some(EntityKind::Event));
                let mut ids = Vec::new();
                for name in names {
                    let found =
                        resolver::resolve_all(&calendars, name, calendar_source, EntityKind::Event)?;
                    ids.extend(found.iter().map(|c| c.id.clone()));
                }
                Some(ids)
            }
            _ => None,
        };

        let events = store.events(&range, ids.as_deref())?;
        Ok(analyze::find_duplicates(&events, tolerance))
    }
}
