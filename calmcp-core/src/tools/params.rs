//! Arguments of each operation, as callers send them.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::date_range::DateRange;
use crate::dates::DateParser;
use crate::error::{CalMcpError, CalMcpResult};
use crate::event::{
    EventUpdate, Location, NewEvent, StructuredLocation, alarms_from_offsets,
};
use crate::query::{KeywordMatcher, MatchMode};
use crate::recurrence::{RecurrenceInput, RecurrenceRule};
use crate::reminder::{LocationTrigger, NewReminder, Priority, ReminderUpdate};
use crate::resolver::CalendarRef;

/// Deserialize an argument object, turning serde's complaint into a
/// parameter error.
pub fn parse<T: DeserializeOwned>(args: &Map<String, Value>) -> CalMcpResult<T> {
    parse_value(Value::Object(args.clone()))
}

pub fn parse_value<T: DeserializeOwned>(value: Value) -> CalMcpResult<T> {
    serde_json::from_value(value).map_err(|e| CalMcpError::InvalidParameter(e.to_string()))
}

/// Parse an optional tag, failing fast on unknown values.
pub fn parse_opt<T: std::str::FromStr<Err = CalMcpError>>(
    value: Option<&str>,
) -> CalMcpResult<Option<T>> {
    value.map(str::parse).transpose()
}

pub fn calendar_ref(name: Option<String>, source: Option<String>) -> Option<CalendarRef> {
    name.map(|name| CalendarRef::new(name, source))
}

pub fn parse_range(parser: &DateParser, start: &str, end: &str) -> CalMcpResult<DateRange> {
    DateRange::new(parser.parse(start)?, parser.parse(end)?)
}

fn location(text: Option<String>, structured: Option<StructuredLocation>) -> CalMcpResult<Option<Location>> {
    match structured {
        Some(s) => {
            s.validate()?;
            Ok(Some(Location::Structured(s)))
        }
        None => Ok(text.map(Location::Text)),
    }
}

fn recurrence(
    input: Option<RecurrenceInput>,
    parser: &DateParser,
) -> CalMcpResult<Option<RecurrenceRule>> {
    input.map(|r| r.into_rule(parser)).transpose()
}

fn keywords(keyword: Option<String>, keywords: Option<Vec<String>>, mode: Option<&str>) -> CalMcpResult<KeywordMatcher> {
    let mut all: Vec<String> = keyword.into_iter().collect();
    all.extend(keywords.unwrap_or_default());
    let mode: MatchMode = parse_opt(mode)?.unwrap_or_default();
    KeywordMatcher::new(all, mode)
}

fn require_title(title: &str) -> CalMcpResult<()> {
    if title.trim().is_empty() {
        return Err(CalMcpError::InvalidParameter("title must not be empty".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListCalendarsParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCalendarParams {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub color: Option<String>,
}

/// Selects an existing calendar for update or delete.
#[derive(Debug, Deserialize)]
pub struct CalendarTargetParams {
    pub calendar_id: Option<String>,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub new_name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsParams {
    pub start_date: String,
    pub end_date: String,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    pub filter: Option<String>,
    pub limit: Option<usize>,
}

impl ListEventsParams {
    pub fn range(&self, parser: &DateParser) -> CalMcpResult<DateRange> {
        parse_range(parser, &self.start_date, &self.end_date)
    }

    pub fn calendar(&self) -> Option<CalendarRef> {
        calendar_ref(self.calendar_name.clone(), self.calendar_source.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateEventParams {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub structured_location: Option<StructuredLocation>,
    pub url: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    pub alarms_minutes_offsets: Option<Vec<i64>>,
    pub recurrence: Option<RecurrenceInput>,
}

impl CreateEventParams {
    pub fn into_new_event(self, parser: &DateParser) -> CalMcpResult<NewEvent> {
        require_title(&self.title)?;
        let calendar = calendar_ref(self.calendar_name, self.calendar_source)
            .ok_or(CalMcpError::CalendarNameRequired)?;

        Ok(NewEvent {
            title: self.title,
            start: parser.parse(&self.start_time)?,
            end: parser.parse(&self.end_time)?,
            all_day: self.all_day,
            notes: self.notes,
            location: location(self.location, self.structured_location)?,
            url: self.url,
            calendar,
            alarms: alarms_from_offsets(&self.alarms_minutes_offsets.unwrap_or_default())?,
            recurrence: recurrence(self.recurrence, parser)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateEventParams {
    pub event_id: String,
    pub title: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub structured_location: Option<StructuredLocation>,
    pub url: Option<String>,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    pub all_day: Option<bool>,
    pub alarms_minutes_offsets: Option<Vec<i64>>,
    pub recurrence: Option<RecurrenceInput>,
    #[serde(default)]
    pub clear_recurrence: bool,
}

impl UpdateEventParams {
    pub fn into_update(self, parser: &DateParser) -> CalMcpResult<(String, EventUpdate)> {
        if let Some(title) = &self.title {
            require_title(title)?;
        }
        let update = EventUpdate {
            title: self.title,
            start: self.start_time.as_deref().map(|s| parser.parse(s)).transpose()?,
            end: self.end_time.as_deref().map(|s| parser.parse(s)).transpose()?,
            all_day: self.all_day,
            notes: self.notes,
            location: location(self.location, self.structured_location)?,
            url: self.url,
            calendar: calendar_ref(self.calendar_name, self.calendar_source),
            alarms: self
                .alarms_minutes_offsets
                .map(|o| alarms_from_offsets(&o))
                .transpose()?,
            recurrence: recurrence(self.recurrence, parser)?,
            clear_recurrence: self.clear_recurrence,
        };
        Ok((self.event_id, update))
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteEventParams {
    pub event_id: String,
    pub span: Option<String>,
    pub occurrence_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchEventsParams {
    pub keyword: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub match_mode: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    pub limit: Option<usize>,
}

impl SearchEventsParams {
    pub fn matcher(&self) -> CalMcpResult<KeywordMatcher> {
        keywords(
            self.keyword.clone(),
            self.keywords.clone(),
            self.match_mode.as_deref(),
        )
    }

    /// The explicit range, if any. A missing end runs the configured window
    /// past the start; a missing start runs it back from the end.
    pub fn range(
        &self,
        parser: &DateParser,
        window: chrono::Duration,
    ) -> CalMcpResult<Option<DateRange>> {
        let start = self.start_date.as_deref().map(|s| parser.parse(s)).transpose()?;
        let end = self.end_date.as_deref().map(|s| parser.parse(s)).transpose()?;
        match (start, end) {
            (None, None) => Ok(None),
            (Some(s), Some(e)) => DateRange::new(s, e).map(Some),
            (Some(s), None) => DateRange::following(s, window).map(Some),
            (None, Some(e)) => DateRange::preceding(e, window).map(Some),
        }
    }

    pub fn calendar(&self) -> Option<CalendarRef> {
        calendar_ref(self.calendar_name.clone(), self.calendar_source.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct QuickRangeParams {
    pub range: String,
    pub week_starts_on: Option<String>,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    pub filter: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CheckConflictsParams {
    pub start_time: String,
    pub end_time: String,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    pub exclude_event_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CopyEventParams {
    pub event_id: String,
    pub target_calendar_name: String,
    pub target_calendar_source: Option<String>,
    #[serde(default)]
    pub delete_original: bool,
}

/// Items stay raw so each one can fail on its own.
#[derive(Debug, Deserialize)]
pub struct CreateEventsBatchParams {
    pub events: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct MoveEventsBatchParams {
    pub event_ids: Vec<String>,
    pub target_calendar_name: String,
    pub target_calendar_source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteEventsBatchParams {
    pub event_ids: Option<Vec<String>>,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub before_date: Option<String>,
    pub dry_run: Option<bool>,
}

/// What a batch delete of events targets.
pub enum EventDeletion {
    Ids { ids: Vec<String>, dry_run: bool },
    Range {
        calendar: CalendarRef,
        range: DateRange,
        dry_run: bool,
    },
}

impl DeleteEventsBatchParams {
    /// Explicit ids win. Range mode needs a calendar and an end (`end_date`
    /// or `before_date`), defaults its start to the search window before the
    /// end, and is a dry run unless told otherwise.
    pub fn into_deletion(
        self,
        parser: &DateParser,
        window: chrono::Duration,
    ) -> CalMcpResult<EventDeletion> {
        if let Some(ids) = self.event_ids {
            return Ok(EventDeletion::Ids {
                ids,
                dry_run: self.dry_run.unwrap_or(false),
            });
        }

        let calendar = calendar_ref(self.calendar_name, self.calendar_source).ok_or_else(|| {
            CalMcpError::InvalidParameter(
                "give event_ids, or calendar_name with end_date or before_date".into(),
            )
        })?;
        let end_text = self.end_date.or(self.before_date).ok_or_else(|| {
            CalMcpError::InvalidParameter("end_date or before_date is required".into())
        })?;
        let end: DateTime<Utc> = parser.parse(&end_text)?;
        let range = match &self.start_date {
            Some(s) => DateRange::new(parser.parse(s)?, end)?,
            None => DateRange::preceding(end, window)?,
        };

        Ok(EventDeletion::Range {
            calendar,
            range,
            dry_run: self.dry_run.unwrap_or(true),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct FindDuplicatesParams {
    pub start_date: String,
    pub end_date: String,
    pub calendar_names: Option<Vec<String>>,
    pub calendar_source: Option<String>,
    pub tolerance_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListRemindersParams {
    pub completed: Option<bool>,
    pub filter: Option<String>,
    pub sort_by: Option<String>,
    pub limit: Option<usize>,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocationTriggerParams {
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: Option<f64>,
    pub proximity: String,
}

impl LocationTriggerParams {
    fn into_trigger(self) -> CalMcpResult<LocationTrigger> {
        let location = StructuredLocation {
            title: self.title,
            latitude: self.latitude,
            longitude: self.longitude,
            radius: self.radius,
        };
        location.validate()?;
        Ok(LocationTrigger {
            location,
            proximity: self.proximity.parse()?,
        })
    }
}

fn priority(value: Option<i64>) -> CalMcpResult<Option<Priority>> {
    value.map(Priority::from_value).transpose()
}

#[derive(Debug, Deserialize)]
pub struct CreateReminderParams {
    pub title: String,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    pub notes: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<i64>,
    pub alarms_minutes_offsets: Option<Vec<i64>>,
    pub recurrence: Option<RecurrenceInput>,
    pub location_trigger: Option<LocationTriggerParams>,
}

impl CreateReminderParams {
    pub fn into_new_reminder(self, parser: &DateParser) -> CalMcpResult<NewReminder> {
        require_title(&self.title)?;
        let calendar = calendar_ref(self.calendar_name, self.calendar_source)
            .ok_or(CalMcpError::CalendarNameRequired)?;

        Ok(NewReminder {
            title: self.title,
            notes: self.notes,
            due: self.due_date.as_deref().map(|d| parser.parse(d)).transpose()?,
            priority: priority(self.priority)?.unwrap_or_default(),
            calendar,
            alarms: alarms_from_offsets(&self.alarms_minutes_offsets.unwrap_or_default())?,
            recurrence: recurrence(self.recurrence, parser)?,
            location_trigger: self
                .location_trigger
                .map(LocationTriggerParams::into_trigger)
                .transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateReminderParams {
    pub reminder_id: String,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due_date: Option<String>,
    #[serde(default)]
    pub clear_due_date: bool,
    pub priority: Option<i64>,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    pub alarms_minutes_offsets: Option<Vec<i64>>,
    pub recurrence: Option<RecurrenceInput>,
    #[serde(default)]
    pub clear_recurrence: bool,
    pub location_trigger: Option<LocationTriggerParams>,
    #[serde(default)]
    pub clear_location_trigger: bool,
}

impl UpdateReminderParams {
    pub fn into_update(self, parser: &DateParser) -> CalMcpResult<(String, ReminderUpdate)> {
        if let Some(title) = &self.title {
            require_title(title)?;
        }
        let update = ReminderUpdate {
            title: self.title,
            notes: self.notes,
            due: self.due_date.as_deref().map(|d| parser.parse(d)).transpose()?,
            clear_due: self.clear_due_date,
            priority: priority(self.priority)?,
            calendar: calendar_ref(self.calendar_name, self.calendar_source),
            alarms: self
                .alarms_minutes_offsets
                .map(|o| alarms_from_offsets(&o))
                .transpose()?,
            recurrence: recurrence(self.recurrence, parser)?,
            clear_recurrence: self.clear_recurrence,
            location_trigger: self
                .location_trigger
                .map(LocationTriggerParams::into_trigger)
                .transpose()?,
            clear_location_trigger: self.clear_location_trigger,
        };
        Ok((self.reminder_id, update))
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteReminderParams {
    pub reminder_id: String,
    pub completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ReminderIdParams {
    pub reminder_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRemindersParams {
    pub keyword: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub match_mode: Option<String>,
    pub filter: Option<String>,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    pub limit: Option<usize>,
}

impl SearchRemindersParams {
    pub fn matcher(&self) -> CalMcpResult<KeywordMatcher> {
        keywords(
            self.keyword.clone(),
            self.keywords.clone(),
            self.match_mode.as_deref(),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRemindersBatchParams {
    pub reminders: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRemindersBatchParams {
    pub reminder_ids: Option<Vec<String>>,
    pub calendar_name: Option<String>,
    pub calendar_source: Option<String>,
    pub filter: Option<String>,
    pub dry_run: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::Zone;
    use serde_json::json;

    fn parser() -> DateParser {
        DateParser::new(Zone::from_name("UTC").unwrap())
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_title_names_the_field() {
        let err = parse::<CreateEventParams>(&args(json!({
            "start_time": "2026-01-01T09:00:00Z",
            "end_time": "2026-01-01T10:00:00Z",
            "calendar_name": "Work"
        })))
        .unwrap_err();
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn creation_requires_a_calendar_name() {
        let params: CreateEventParams = parse(&args(json!({
            "title": "Review",
            "start_time": "2026-01-01T09:00:00Z",
            "end_time": "2026-01-01T10:00:00Z"
        })))
        .unwrap();
        assert!(matches!(
            params.into_new_event(&parser()),
            Err(CalMcpError::CalendarNameRequired)
        ));
    }

    #[test]
    fn structured_location_wins_over_text() {
        let params: CreateEventParams = parse(&args(json!({
            "title": "Offsite",
            "start_time": "2026-01-01T09:00:00Z",
            "end_time": "2026-01-01T10:00:00Z",
            "calendar_name": "Work",
            "location": "somewhere",
            "structured_location": {"title": "HQ", "latitude": 25.0, "longitude": 121.5}
        })))
        .unwrap();
        let new = params.into_new_event(&parser()).unwrap();
        assert!(matches!(new.location, Some(Location::Structured(_))));
    }

    #[test]
    fn keyword_and_keywords_combine() {
        let params: SearchEventsParams = parse(&args(json!({
            "keyword": "lunch",
            "keywords": ["gym"],
            "match_mode": "all"
        })))
        .unwrap();
        let matcher = params.matcher().unwrap();
        assert!(matcher.matches("lunch at the gym"));
        assert!(!matcher.matches("lunch"));
    }

    #[test]
    fn range_delete_defaults_to_dry_run() {
        let params: DeleteEventsBatchParams = parse(&args(json!({
            "calendar_name": "Work",
            "before_date": "2026-01-01"
        })))
        .unwrap();
        match params
            .into_deletion(&parser(), chrono::Duration::days(730))
            .unwrap()
        {
            EventDeletion::Range { dry_run, .. } => assert!(dry_run),
            EventDeletion::Ids { .. } => panic!("expected range mode"),
        }
    }

    #[test]
    fn bad_priority_is_rejected() {
        let params: CreateReminderParams = parse(&args(json!({
            "title": "x",
            "calendar_name": "Reminders",
            "priority": 12
        })))
        .unwrap();
        assert!(params.into_new_reminder(&parser()).is_err());
    }

    #[test]
    fn unknown_proximity_fails_fast() {
        let params: CreateReminderParams = parse(&args(json!({
            "title": "Buy milk",
            "calendar_name": "Reminders",
            "location_trigger": {
                "title": "Store", "latitude": 1.0, "longitude": 2.0, "proximity": "near"
            }
        })))
        .unwrap();
        assert!(matches!(
            params.into_new_reminder(&parser()),
            Err(CalMcpError::InvalidParameter(_))
        ));
    }
}
