use chrono::Utc;

use super::{Engine, resolve_filter, resolve_one};
use crate::calendar::EntityKind;
use crate::error::{CalMcpError, CalMcpResult};
use crate::query::{self, KeywordMatcher, QueryResult, ReminderFilter, ReminderSort};
use crate::reminder::{NewReminder, Reminder, ReminderUpdate};
use crate::resolver::CalendarRef;
use crate::store::CalendarStore;

pub(super) fn create_in<S: CalendarStore>(
    store: &mut S,
    new: NewReminder,
) -> CalMcpResult<Reminder> {
    let list = resolve_one(store, &new.calendar, EntityKind::Reminder)?;
    store.save_reminder(new.into_reminder(&list.id, Utc::now()))
}

impl<S: CalendarStore> Engine<S> {
    pub async fn list_reminders(
        &self,
        calendar: Option<&CalendarRef>,
        filter: ReminderFilter,
        sort: ReminderSort,
        limit: Option<usize>,
    ) -> CalMcpResult<QueryResult<Reminder>> {
        let store = self.read(EntityKind::Reminder).await?;
        let ids = resolve_filter(&*store, calendar, EntityKind::Reminder)?;
        let reminders = store.reminders(ids.as_deref());
        Ok(query::refine_reminders(reminders, filter, sort, limit, Utc::now()))
    }

    pub async fn create_reminder(&self, new: NewReminder) -> CalMcpResult<Reminder> {
        let mut store = self.write(EntityKind::Reminder).await?;
        let reminder = create_in(&mut *store, new)?;
        self.gate.mark_stale();
        Ok(reminder)
    }

    pub async fn update_reminder(
        &self,
        id: &str,
        update: &ReminderUpdate,
    ) -> CalMcpResult<Reminder> {
        let mut store = self.write(EntityKind::Reminder).await?;
        let mut reminder = store
            .reminder(id)
            .ok_or_else(|| CalMcpError::ReminderNotFound(id.to_string()))?;

        update.apply_to(&mut reminder);
        if let Some(reference) = &update.calendar {
            reminder.calendar_id = resolve_one(&*store, reference, EntityKind::Reminder)?.id;
        }

        let saved = store.save_reminder(reminder)?;
        self.gate.mark_stale();
        Ok(saved)
    }

    /// Mark complete or incomplete, keeping the completion date in step.
    pub async fn complete_reminder(&self, id: &str, completed: bool) -> CalMcpResult<Reminder> {
        let mut store = self.write(EntityKind::Reminder).await?;
        let mut reminder = store
            .reminder(id)
            .ok_or_else(|| CalMcpError::ReminderNotFound(id.to_string()))?;

        reminder.set_completed(completed, Utc::now());
        let saved = store.save_reminder(reminder)?;
        self.gate.mark_stale();
        Ok(saved)
    }

    pub async fn delete_reminder(&self, id: &str) -> CalMcpResult<Reminder> {
        let mut store = self.write(EntityKind::Reminder).await?;
        let reminder = store
            .reminder(id)
            .ok_or_else(|| CalMcpError::ReminderNotFound(id.to_string()))?;
        store.remove_reminder(id)?;
        self.gate.mark_stale();
        Ok(reminder)
    }

    /// Keyword search over titles and notes.
    pub async fn search_reminders(
        &self,
        matcher: &KeywordMatcher,
        filter: ReminderFilter,
        calendar: Option<&CalendarRef>,
        limit: Option<usize>,
    ) -> CalMcpResult<QueryResult<Reminder>> {
        let store = self.read(EntityKind::Reminder).await?;
        let ids = resolve_filter(&*store, calendar, EntityKind::Reminder)?;
        let matching: Vec<Reminder> = store
            .reminders(ids.as_deref())
            .into_iter()
            .filter(|r| matcher.matches(&r.search_text()))
            .collect();
        Ok(query::refine_reminders(
            matching,
            filter,
            ReminderSort::DueDate,
            limit,
            Utc::now(),
        ))
    }
}
