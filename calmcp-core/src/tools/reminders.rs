use serde_json::{Map, Value, json};

use super::params::{
    CompleteReminderParams, CreateReminderParams, CreateRemindersBatchParams,
    DeleteRemindersBatchParams, ListRemindersParams, ReminderIdParams, SearchRemindersParams,
    UpdateReminderParams, calendar_ref, parse, parse_opt, parse_value,
};
use super::views;
use crate::calendar::EntityKind;
use crate::engine::Engine;
use crate::error::{CalMcpError, CalMcpResult};
use crate::query::{ReminderFilter, ReminderSort};
use crate::reminder::NewReminder;
use crate::store::CalendarStore;

pub(super) async fn list<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: ListRemindersParams = parse(args)?;
    let filter = ReminderFilter::from_args(params.filter.as_deref(), params.completed)?;
    let sort: ReminderSort = parse_opt(params.sort_by.as_deref())?.unwrap_or_default();
    let calendar = calendar_ref(params.calendar_name, params.calendar_source);

    let result = engine
        .list_reminders(calendar.as_ref(), filter, sort, params.limit)
        .await?;
    let render = views::renderer(engine, EntityKind::Reminder).await?;

    Ok(json!({
        "reminders": render.reminders(&result.items),
        "meta": views::meta(&result.meta),
    }))
}

pub(super) async fn create<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: CreateReminderParams = parse(args)?;
    let reminder = engine
        .create_reminder(params.into_new_reminder(engine.parser())?)
        .await?;
    let render = views::renderer(engine, EntityKind::Reminder).await?;

    Ok(json!({
        "success": true,
        "message": format!("Created reminder '{}'", reminder.title),
        "reminder": render.reminder(&reminder),
    }))
}

pub(super) async fn update<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: UpdateReminderParams = parse(args)?;
    let (id, update) = params.into_update(engine.parser())?;
    let reminder = engine.update_reminder(&id, &update).await?;
    let render = views::renderer(engine, EntityKind::Reminder).await?;

    Ok(json!({
        "success": true,
        "message": format!("Updated reminder '{}'", reminder.title),
        "reminder": render.reminder(&reminder),
    }))
}

pub(super) async fn complete<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: CompleteReminderParams = parse(args)?;
    let completed = params.completed.unwrap_or(true);
    let reminder = engine
        .complete_reminder(&params.reminder_id, completed)
        .await?;
    let render = views::renderer(engine, EntityKind::Reminder).await?;

    let state = if completed { "completed" } else { "incomplete" };
    Ok(json!({
        "success": true,
        "message": format!("Marked reminder '{}' as {state}", reminder.title),
        "reminder": render.reminder(&reminder),
    }))
}

pub(super) async fn delete<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: ReminderIdParams = parse(args)?;
    let reminder = engine.delete_reminder(&params.reminder_id).await?;
    Ok(json!({
        "success": true,
        "message": format!("Deleted reminder '{}'", reminder.title),
        "reminder_id": params.reminder_id,
    }))
}

pub(super) async fn search<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: SearchRemindersParams = parse(args)?;
    let matcher = params.matcher()?;
    let filter: ReminderFilter = parse_opt(params.filter.as_deref())?.unwrap_or_default();
    let calendar = calendar_ref(params.calendar_name, params.calendar_source);

    let result = engine
        .search_reminders(&matcher, filter, calendar.as_ref(), params.limit)
        .await?;
    let render = views::renderer(engine, EntityKind::Reminder).await?;

    Ok(json!({
        "reminders": render.reminders(&result.items),
        "meta": views::meta(&result.meta),
    }))
}

pub(super) async fn create_batch<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: CreateRemindersBatchParams = parse(args)?;
    let items: Vec<CalMcpResult<NewReminder>> = params
        .reminders
        .into_iter()
        .map(|item| {
            parse_value::<CreateReminderParams>(item)
                .and_then(|p| p.into_new_reminder(engine.parser()))
        })
        .collect();

    let report = engine.create_reminders_batch(items).await?;
    views::report(&report)
}

/// Explicit ids delete right away unless `dry_run` is set; a filter
/// selection is a dry run unless `dry_run=false`.
pub(super) async fn delete_batch<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: DeleteRemindersBatchParams = parse(args)?;
    let outcome = match params.reminder_ids {
        Some(ids) => {
            engine
                .delete_reminders_batch(&ids, params.dry_run.unwrap_or(false))
                .await?
        }
        None => {
            let filter: ReminderFilter = parse_opt(params.filter.as_deref())?.ok_or_else(|| {
                CalMcpError::InvalidParameter("give reminder_ids, or a filter".into())
            })?;
            let calendar = calendar_ref(params.calendar_name, params.calendar_source);
            engine
                .delete_reminders_matching(calendar.as_ref(), filter, params.dry_run.unwrap_or(true))
                .await?
        }
    };

    let render = views::renderer(engine, EntityKind::Reminder).await?;
    views::deletion(outcome, "reminders", |reminders| render.reminders(reminders))
}
