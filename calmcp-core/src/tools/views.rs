//! JSON views of engine results.

use serde_json::{Map, Value, json};
use std::collections::HashMap;

use crate::analyze::DuplicatePair;
use crate::batch::BatchReport;
use crate::calendar::{Calendar, EntityKind};
use crate::dates::Zone;
use crate::engine::{DeleteOutcome, Engine};
use crate::error::CalMcpResult;
use crate::event::{Alarm, Event, Location};
use crate::query::QueryMeta;
use crate::recurrence::{RecurrenceEnd, RecurrenceRule, StoreRule};
use crate::reminder::Reminder;
use crate::store::CalendarStore;

fn put(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value);
    }
}

pub fn calendar(cal: &Calendar) -> Value {
    let mut map = Map::new();
    map.insert("id".into(), json!(cal.id));
    map.insert("title".into(), json!(cal.title));
    map.insert("type".into(), json!(cal.kind.as_str()));
    map.insert("source".into(), json!(cal.source));
    map.insert("allows_modifications".into(), json!(cal.allows_modifications()));
    map.insert("is_subscribed".into(), json!(cal.subscribed));
    put(&mut map, "color", cal.color.as_ref().map(|c| json!(c)));
    Value::Object(map)
}

pub fn meta(meta: &QueryMeta) -> Value {
    json!({
        "total_in_range": meta.total_in_range,
        "total_matched": meta.total_matched,
        "returned": meta.returned,
    })
}

pub fn report(report: &BatchReport) -> CalMcpResult<Value> {
    Ok(serde_json::to_value(report)?)
}

/// A dry run lists the items under `key`; an executed delete is its report.
pub fn deletion<T>(
    outcome: DeleteOutcome<T>,
    key: &str,
    render: impl Fn(&[T]) -> Value,
) -> CalMcpResult<Value> {
    let mut map = Map::new();
    match outcome {
        DeleteOutcome::Preview(items) => {
            map.insert("dry_run".into(), json!(true));
            map.insert("count".into(), json!(items.len()));
            map.insert(key.to_string(), render(&items));
            map.insert(
                "message".into(),
                json!(format!(
                    "Dry run: {} item(s) would be deleted. Pass dry_run=false to delete them.",
                    items.len()
                )),
            );
        }
        DeleteOutcome::Executed(done) => {
            if let Value::Object(fields) = report(&done)? {
                map = fields;
            }
            map.insert("dry_run".into(), json!(false));
        }
    }
    Ok(Value::Object(map))
}

/// Renders items with local times and calendar names.
pub struct Renderer<'a> {
    pub zone: &'a Zone,
    pub calendars: HashMap<String, Calendar>,
}

/// A renderer naming the engine's calendars of `kind`.
pub async fn renderer<S: CalendarStore>(
    engine: &Engine<S>,
    kind: EntityKind,
) -> CalMcpResult<Renderer<'_>> {
    Ok(Renderer {
        zone: engine.zone(),
        calendars: engine.calendar_index(kind).await?,
    })
}

impl Renderer<'_> {
    fn calendar_fields(&self, map: &mut Map<String, Value>, calendar_id: &str) {
        match self.calendars.get(calendar_id) {
            Some(cal) => {
                map.insert("calendar".into(), json!(cal.title));
                map.insert("calendar_source".into(), json!(cal.source));
            }
            None => {
                map.insert("calendar".into(), json!(calendar_id));
            }
        }
    }

    fn recurrence(&self, rule: &StoreRule) -> Value {
        let Ok(described) = RecurrenceRule::describe(rule) else {
            return json!({ "rrule": rule.rrule });
        };

        let mut map = Map::new();
        map.insert("frequency".into(), json!(described.frequency.as_str()));
        map.insert("interval".into(), json!(described.interval));
        match described.end {
            RecurrenceEnd::Never => {}
            RecurrenceEnd::Until(until) => {
                map.insert("end_date".into(), json!(self.zone.render(until)));
            }
            RecurrenceEnd::Count(count) => {
                map.insert("occurrence_count".into(), json!(count));
            }
        }
        if !described.days_of_week.is_empty() {
            map.insert("days_of_week".into(), json!(described.days_of_week));
        }
        if !described.days_of_month.is_empty() {
            map.insert("days_of_month".into(), json!(described.days_of_month));
        }
        Value::Object(map)
    }

    fn alarms(&self, map: &mut Map<String, Value>, alarms: &[Alarm]) {
        let offsets: Vec<i64> = alarms
            .iter()
            .filter_map(|a| match a {
                Alarm::Relative { offset_minutes } => offset_minutes.checked_neg(),
                Alarm::Proximity { .. } => None,
            })
            .collect();
        if !offsets.is_empty() {
            map.insert("alarms_minutes_offsets".into(), json!(offsets));
        }
    }

    pub fn event(&self, event: &Event) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), json!(event.id_str()));
        map.insert("title".into(), json!(event.title));
        map.insert("start_date".into(), json!(self.zone.render(event.start)));
        map.insert("end_date".into(), json!(self.zone.render(event.end)));
        map.insert("is_all_day".into(), json!(event.all_day));
        map.insert("is_recurring".into(), json!(event.is_recurring()));
        self.calendar_fields(&mut map, &event.calendar_id);

        put(&mut map, "notes", event.notes.as_ref().map(|n| json!(n)));
        put(&mut map, "url", event.url.as_ref().map(|u| json!(u)));
        match &event.location {
            Some(Location::Text(text)) => {
                map.insert("location".into(), json!(text));
            }
            Some(Location::Structured(s)) => {
                map.insert("location".into(), json!(s.title));
                map.insert("structured_location".into(), json!(s));
            }
            None => {}
        }
        self.alarms(&mut map, &event.alarms);
        put(
            &mut map,
            "recurrence",
            event.recurrence.as_ref().map(|r| self.recurrence(r)),
        );
        put(
            &mut map,
            "occurrence_date",
            event.occurrence_date.map(|d| json!(self.zone.render(d))),
        );
        Value::Object(map)
    }

    pub fn events(&self, events: &[Event]) -> Value {
        Value::Array(events.iter().map(|e| self.event(e)).collect())
    }

    pub fn reminder(&self, reminder: &Reminder) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), json!(reminder.id_str()));
        map.insert("title".into(), json!(reminder.title));
        map.insert("is_completed".into(), json!(reminder.completed));
        map.insert("priority".into(), json!(reminder.priority.value()));
        map.insert(
            "creation_date".into(),
            json!(self.zone.render(reminder.creation_date)),
        );
        self.calendar_fields(&mut map, &reminder.calendar_id);

        put(&mut map, "notes", reminder.notes.as_ref().map(|n| json!(n)));
        put(
            &mut map,
            "due_date",
            reminder.due.map(|d| json!(self.zone.render(d))),
        );
        put(
            &mut map,
            "completion_date",
            reminder.completion_date.map(|d| json!(self.zone.render(d))),
        );
        put(
            &mut map,
            "recurrence",
            reminder.recurrence.as_ref().map(|r| self.recurrence(r)),
        );
        put(
            &mut map,
            "location_trigger",
            reminder.location_trigger.as_ref().map(|t| {
                json!({
                    "title": t.location.title,
                    "latitude": t.location.latitude,
                    "longitude": t.location.longitude,
                    "radius": t.location.radius,
                    "proximity": t.proximity.as_str(),
                })
            }),
        );
        self.alarms(&mut map, &reminder.alarms);
        Value::Object(map)
    }

    pub fn reminders(&self, reminders: &[Reminder]) -> Value {
        Value::Array(reminders.iter().map(|r| self.reminder(r)).collect())
    }

    fn summary(&self, event: &Event) -> Value {
        let calendar = self
            .calendars
            .get(&event.calendar_id)
            .map(|c| c.title.as_str())
            .unwrap_or(event.calendar_id.as_str());
        json!({
            "id": event.id_str(),
            "title": event.title,
            "calendar": calendar,
            "start_date": self.zone.render(event.start),
        })
    }

    pub fn duplicate(&self, pair: &DuplicatePair) -> Value {
        json!({
            "first": self.summary(&pair.first),
            "second": self.summary(&pair.second),
            "time_difference_seconds": pair.time_difference_seconds,
        })
    }
}
