//! Batch operations. Items run one at a time under a single write lock;
//! a failing item is recorded and the batch moves on.

use chrono::{DateTime, Utc};

use super::events::{copy_in, create_in as create_event_in};
use super::reminders::create_in as create_reminder_in;
use super::{Engine, resolve_filter};
use crate::batch::BatchReport;
use crate::calendar::EntityKind;
use crate::date_range::DateRange;
use crate::error::CalMcpResult;
use crate::event::{Event, NewEvent};
use crate::query::ReminderFilter;
use crate::reminder::{NewReminder, Reminder};
use crate::resolver::CalendarRef;
use crate::store::{CalendarStore, Span};

/// Result of a selection-based delete.
#[derive(Debug)]
pub enum DeleteOutcome<T> {
    /// Dry run: what would be deleted. Nothing was changed.
    Preview(Vec<T>),
    Executed(BatchReport),
}

impl<S: CalendarStore> Engine<S> {
    /// Create each event independently. Items that could not even be parsed
    /// arrive as errors and are recorded as failures.
    pub async fn create_events_batch(
        &self,
        items: Vec<CalMcpResult<NewEvent>>,
    ) -> CalMcpResult<BatchReport> {
        let mut store = self.write(EntityKind::Event).await?;
        let mut report = BatchReport::new();

        for item in items {
            let outcome = item
                .and_then(|new| create_event_in(&mut *store, new))
                .map(|e| e.id_str().to_string());
            report.record(None, outcome);
        }

        self.finish(&report, "create_events_batch");
        Ok(report)
    }

    pub async fn move_events_batch(
        &self,
        ids: &[String],
        target: &CalendarRef,
    ) -> CalMcpResult<BatchReport> {
        let mut store = self.write(EntityKind::Event).await?;
        let mut report = BatchReport::new();

        for id in ids {
            let outcome = copy_in(&mut *store, id, target, true).map(|e| e.id_str().to_string());
            report.record(Some(id.clone()), outcome);
        }

        self.finish(&report, "move_events_batch");
        Ok(report)
    }

    /// Delete events by id, whole series included. With `dry_run` the
    /// events found are returned and nothing is changed.
    pub async fn delete_events_batch(
        &self,
        ids: &[String],
        dry_run: bool,
    ) -> CalMcpResult<DeleteOutcome<Event>> {
        if dry_run {
            let store = self.read(EntityKind::Event).await?;
            let found = ids.iter().filter_map(|id| store.event(id)).collect();
            return Ok(DeleteOutcome::Preview(found));
        }

        let targets: Vec<(String, Option<DateTime<Utc>>)> =
            ids.iter().map(|id| (id.clone(), None)).collect();
        Ok(DeleteOutcome::Executed(
            self.delete_event_targets(&targets).await?,
        ))
    }

    /// Delete the events of a calendar that fall in `range`. Occurrences of
    /// recurring events are removed one by one. With `dry_run` nothing is
    /// changed and the affected events are returned instead.
    pub async fn delete_events_in_range(
        &self,
        calendar: &CalendarRef,
        range: DateRange,
        dry_run: bool,
    ) -> CalMcpResult<DeleteOutcome<Event>> {
        let selected = {
            let store = self.read(EntityKind::Event).await?;
            let ids = resolve_filter(&*store, Some(calendar), EntityKind::Event)?;
            store.events(&range, ids.as_deref())?
        };

        if dry_run {
            tracing::info!(count = selected.len(), "Dry run: events that would be deleted");
            return Ok(DeleteOutcome::Preview(selected));
        }

        let targets: Vec<(String, Option<DateTime<Utc>>)> = selected
            .iter()
            .map(|e| (e.id_str().to_string(), e.occurrence_date))
            .collect();
        Ok(DeleteOutcome::Executed(
            self.delete_event_targets(&targets).await?,
        ))
    }

    async fn delete_event_targets(
        &self,
        targets: &[(String, Option<DateTime<Utc>>)],
    ) -> CalMcpResult<BatchReport> {
        let mut store = self.write(EntityKind::Event).await?;
        let mut report = BatchReport::new();

        for (id, occurrence) in targets {
            let span = if occurrence.is_some() {
                Span::This
            } else {
                Span::Future
            };
            let outcome = store
                .remove_event(id, span, *occurrence)
                .map(|_| id.clone());
            report.record(Some(id.clone()), outcome);
        }

        self.finish(&report, "delete_events_batch");
        Ok(report)
    }

    pub async fn create_reminders_batch(
        &self,
        items: Vec<CalMcpResult<NewReminder>>,
    ) -> CalMcpResult<BatchReport> {
        let mut store = self.write(EntityKind::Reminder).await?;
        let mut report = BatchReport::new();

        for item in items {
            let outcome = item
                .and_then(|new| create_reminder_in(&mut *store, new))
                .map(|r| r.id_str().to_string());
            report.record(None, outcome);
        }

        self.finish(&report, "create_reminders_batch");
        Ok(report)
    }

    /// Delete reminders by id. With `dry_run` the reminders found are
    /// returned and nothing is changed.
    pub async fn delete_reminders_batch(
        &self,
        ids: &[String],
        dry_run: bool,
    ) -> CalMcpResult<DeleteOutcome<Reminder>> {
        if dry_run {
            let store = self.read(EntityKind::Reminder).await?;
            let found = ids.iter().filter_map(|id| store.reminder(id)).collect();
            return Ok(DeleteOutcome::Preview(found));
        }
        Ok(DeleteOutcome::Executed(self.delete_reminder_ids(ids).await?))
    }

    async fn delete_reminder_ids(&self, ids: &[String]) -> CalMcpResult<BatchReport> {
        let mut store = self.write(EntityKind::Reminder).await?;
        let mut report = BatchReport::new();

        for id in ids {
            let outcome = store.remove_reminder(id).map(|_| id.clone());
            report.record(Some(id.clone()), outcome);
        }

        self.finish(&report, "delete_reminders_batch");
        Ok(report)
    }

    /// Delete the reminders matching `filter`, optionally in one list.
    pub async fn delete_reminders_matching(
        &self,
        calendar: Option<&CalendarRef>,
        filter: ReminderFilter,
        dry_run: bool,
    ) -> CalMcpResult<DeleteOutcome<Reminder>> {
        let now = Utc::now();
        let selected: Vec<Reminder> = {
            let store = self.read(EntityKind::Reminder).await?;
            let ids = resolve_filter(&*store, calendar, EntityKind::Reminder)?;
            store
                .reminders(ids.as_deref())
                .into_iter()
                .filter(|r| filter.matches(r, now))
                .collect()
        };

        if dry_run {
            tracing::info!(count = selected.len(), "Dry run: reminders that would be deleted");
            return Ok(DeleteOutcome::Preview(selected));
        }

        let ids: Vec<String> = selected.iter().map(|r| r.id_str().to_string()).collect();
        Ok(DeleteOutcome::Executed(self.delete_reminder_ids(&ids).await?))
    }

    fn finish(&self, report: &BatchReport, operation: &str) {
        if report.succeeded > 0 {
            self.gate.mark_stale();
        }
        report.log_summary(operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use crate::error::CalMcpError;
    use crate::recurrence::{Frequency, RecurrenceEnd, RecurrenceRule};
    use crate::reminder::Priority;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, d, h, 0, 0).unwrap()
    }

    fn engine() -> Engine<MemoryStore> {
        Engine::new(MemoryStore::with_defaults(), EngineSettings::default())
    }

    fn calendar() -> CalendarRef {
        CalendarRef::new("Calendar", None)
    }

    fn new_event(title: &str, day: u32) -> NewEvent {
        NewEvent {
            title: title.into(),
            start: at(day, 9),
            end: at(day, 10),
            all_day: false,
            notes: None,
            location: None,
            url: None,
            calendar: calendar(),
            alarms: vec![],
            recurrence: None,
        }
    }

    #[tokio::test]
    async fn one_bad_item_does_not_stop_the_batch() {
        let engine = engine();
        let items = vec![
            Ok(new_event("One", 2)),
            Err(CalMcpError::InvalidParameter("missing field `title`".into())),
            Ok(new_event("Three", 4)),
        ];
        let report = engine.create_events_batch(items).await.unwrap();

        assert_eq!((report.total, report.succeeded, report.failed), (3, 2, 1));
        assert_eq!(report.failures[0].index, 1);
        assert!(report.failures[0].error.contains("title"));

        let range = DateRange::new(at(1, 0), at(28, 0)).unwrap();
        let stored = engine.store().read().await.events(&range, None).unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn range_delete_defaults_to_a_preview() {
        let engine = engine();
        for day in [3, 5, 20] {
            engine.create_event(new_event("Shift", day)).await.unwrap();
        }
        let range = DateRange::new(at(1, 0), at(10, 0)).unwrap();

        match engine.delete_events_in_range(&calendar(), range, true).await.unwrap() {
            DeleteOutcome::Preview(events) => assert_eq!(events.len(), 2),
            DeleteOutcome::Executed(_) => panic!("dry run must not execute"),
        }
        let all = DateRange::new(at(1, 0), at(28, 0)).unwrap();
        assert_eq!(engine.store().read().await.events(&all, None).unwrap().len(), 3);

        match engine.delete_events_in_range(&calendar(), range, false).await.unwrap() {
            DeleteOutcome::Executed(report) => assert_eq!(report.succeeded, 2),
            DeleteOutcome::Preview(_) => panic!("expected execution"),
        }
        assert_eq!(engine.store().read().await.events(&all, None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn range_delete_removes_only_occurrences_in_range() {
        let engine = engine();
        let mut series = new_event("Daily", 1);
        series.recurrence = Some(RecurrenceRule {
            frequency: Frequency::Daily,
            interval: 1,
            days_of_week: vec![],
            days_of_month: vec![],
            end: RecurrenceEnd::Count(10),
            tzid: None,
        });
        engine.create_event(series).await.unwrap();

        let range = DateRange::new(at(3, 0), at(5, 0)).unwrap();
        engine.delete_events_in_range(&calendar(), range, false).await.unwrap();

        let all = DateRange::new(at(1, 0), at(28, 0)).unwrap();
        assert_eq!(engine.store().read().await.events(&all, None).unwrap().len(), 8);
    }

    #[tokio::test]
    async fn move_batch_reports_unknown_ids() {
        let engine = engine();
        let created = engine.create_event(new_event("Lunch", 2)).await.unwrap();
        engine.create_calendar("Team", EntityKind::Event, None).await.unwrap();

        let ids = vec![created.id_str().to_string(), "missing".to_string()];
        let report = engine
            .move_events_batch(&ids, &CalendarRef::new("Team", None))
            .await
            .unwrap();
        assert_eq!((report.succeeded, report.failed), (1, 1));
        assert_eq!(report.failures[0].id.as_deref(), Some("missing"));
    }

    #[tokio::test]
    async fn reminder_filter_delete_previews_then_executes() {
        let engine = engine();
        for title in ["a", "b"] {
            engine
                .create_reminder(NewReminder {
                    title: title.into(),
                    notes: None,
                    due: None,
                    priority: Priority::None,
                    calendar: CalendarRef::new("Reminders", None),
                    alarms: vec![],
                    recurrence: None,
                    location_trigger: None,
                })
                .await
                .unwrap();
        }
        let done = engine
            .list_reminders(None, ReminderFilter::All, Default::default(), None)
            .await
            .unwrap()
            .items[0]
            .clone();
        engine.complete_reminder(done.id_str(), true).await.unwrap();

        match engine
            .delete_reminders_matching(None, ReminderFilter::Completed, true)
            .await
            .unwrap()
        {
            DeleteOutcome::Preview(items) => assert_eq!(items.len(), 1),
            DeleteOutcome::Executed(_) => panic!("dry run must not execute"),
        }
        assert_eq!(engine.store().read().await.reminders(None).len(), 2);

        engine
            .delete_reminders_matching(None, ReminderFilter::Completed, false)
            .await
            .unwrap();
        assert_eq!(engine.store().read().await.reminders(None).len(), 1);
    }
}
