use serde_json::{Map, Value, json};

use super::params::{
    CheckConflictsParams, CopyEventParams, CreateEventParams, CreateEventsBatchParams,
    DeleteEventParams, DeleteEventsBatchParams, EventDeletion, FindDuplicatesParams,
    ListEventsParams, MoveEventsBatchParams, QuickRangeParams, SearchEventsParams,
    UpdateEventParams, calendar_ref, parse, parse_opt, parse_range, parse_value,
};
use super::views;
use crate::calendar::EntityKind;
use crate::date_range::{QuickRange, WeekStart};
use crate::engine::Engine;
use crate::error::CalMcpResult;
use crate::event::NewEvent;
use crate::query::EventFilter;
use crate::resolver::CalendarRef;
use crate::store::{CalendarStore, Span};

pub(super) async fn list<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: ListEventsParams = parse(args)?;
    let range = params.range(engine.parser())?;
    let filter: EventFilter = parse_opt(params.filter.as_deref())?.unwrap_or_default();

    let result = engine
        .list_events(range, params.calendar().as_ref(), filter, params.limit)
        .await?;
    let render = views::renderer(engine, EntityKind::Event).await?;

    Ok(json!({
        "events": render.events(&result.items),
        "meta": views::meta(&result.meta),
    }))
}

pub(super) async fn create<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: CreateEventParams = parse(args)?;
    let event = engine
        .create_event(params.into_new_event(engine.parser())?)
        .await?;
    let render = views::renderer(engine, EntityKind::Event).await?;

    Ok(json!({
        "success": true,
        "message": format!("Created event '{}'", event.title),
        "event": render.event(&event),
    }))
}

pub(super) async fn update<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: UpdateEventParams = parse(args)?;
    let (id, update) = params.into_update(engine.parser())?;
    let event = engine.update_event(&id, &update).await?;
    let render = views::renderer(engine, EntityKind::Event).await?;

    Ok(json!({
        "success": true,
        "message": format!("Updated event '{}'", event.title),
        "event": render.event(&event),
    }))
}

pub(super) async fn delete<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: DeleteEventParams = parse(args)?;
    let span: Span = parse_opt(params.span.as_deref())?.unwrap_or_default();
    let occurrence = params
        .occurrence_date
        .as_deref()
        .map(|d| engine.parser().parse(d))
        .transpose()?;

    let event = engine.delete_event(&params.event_id, span, occurrence).await?;
    Ok(json!({
        "success": true,
        "message": format!("Deleted event '{}'", event.title),
        "event_id": params.event_id,
        "span": span.to_string(),
    }))
}

pub(super) async fn search<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: SearchEventsParams = parse(args)?;
    let matcher = params.matcher()?;
    let range = params.range(engine.parser(), engine.search_window()?)?;

    let result = engine
        .search_events(&matcher, range, params.calendar().as_ref(), params.limit)
        .await?;
    let render = views::renderer(engine, EntityKind::Event).await?;

    Ok(json!({
        "events": render.events(&result.items),
        "meta": views::meta(&result.meta),
    }))
}

pub(super) async fn list_quick<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: QuickRangeParams = parse(args)?;
    let quick: QuickRange = params.range.parse()?;
    let week_start: WeekStart = parse_opt(params.week_starts_on.as_deref())?.unwrap_or_default();
    let filter: EventFilter = parse_opt(params.filter.as_deref())?.unwrap_or_default();
    let calendar = calendar_ref(params.calendar_name, params.calendar_source);

    let (range, result) = engine
        .list_events_quick(quick, week_start, calendar.as_ref(), filter, params.limit)
        .await?;
    let render = views::renderer(engine, EntityKind::Event).await?;

    Ok(json!({
        "range": quick.as_str(),
        "start_date": engine.zone().render(range.start),
        "end_date": engine.zone().render(range.end),
        "events": render.events(&result.items),
        "meta": views::meta(&result.meta),
    }))
}

pub(super) async fn check_conflicts<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: CheckConflictsParams = parse(args)?;
    let range = parse_range(engine.parser(), &params.start_time, &params.end_time)?;
    let calendar = calendar_ref(params.calendar_name, params.calendar_source);

    let conflicts = engine
        .check_conflicts(
            range.start,
            range.end,
            calendar.as_ref(),
            params.exclude_event_id.as_deref(),
        )
        .await?;
    let render = views::renderer(engine, EntityKind::Event).await?;

    Ok(json!({
        "has_conflicts": !conflicts.is_empty(),
        "conflict_count": conflicts.len(),
        "conflicts": render.events(&conflicts),
    }))
}

pub(super) async fn copy<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: CopyEventParams = parse(args)?;
    let target = CalendarRef::new(params.target_calendar_name, params.target_calendar_source);

    let event = engine
        .copy_event(&params.event_id, &target, params.delete_original)
        .await?;
    let render = views::renderer(engine, EntityKind::Event).await?;

    let verb = if params.delete_original { "Moved" } else { "Copied" };
    Ok(json!({
        "success": true,
        "message": format!("{verb} event '{}' to '{}'", event.title, target.name),
        "original_event_id": params.event_id,
        "event": render.event(&event),
    }))
}

pub(super) async fn create_batch<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: CreateEventsBatchParams = parse(args)?;
    let items: Vec<CalMcpResult<NewEvent>> = params
        .events
        .into_iter()
        .map(|item| {
            parse_value::<CreateEventParams>(item).and_then(|p| p.into_new_event(engine.parser()))
        })
        .collect();

    let report = engine.create_events_batch(items).await?;
    views::report(&report)
}

pub(super) async fn move_batch<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: MoveEventsBatchParams = parse(args)?;
    let target = CalendarRef::new(params.target_calendar_name, params.target_calendar_source);
    let report = engine.move_events_batch(&params.event_ids, &target).await?;
    views::report(&report)
}

pub(super) async fn delete_batch<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: DeleteEventsBatchParams = parse(args)?;
    let outcome = match params.into_deletion(engine.parser(), engine.search_window()?)? {
        EventDeletion::Ids { ids, dry_run } => engine.delete_events_batch(&ids, dry_run).await?,
        EventDeletion::Range {
            calendar,
            range,
            dry_run,
        } => {
            engine
                .delete_events_in_range(&calendar, range, dry_run)
                .await?
        }
    };

    let render = views::renderer(engine, EntityKind::Event).await?;
    views::deletion(outcome, "events", |events| render.events(events))
}

pub(super) async fn find_duplicates<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: FindDuplicatesParams = parse(args)?;
    let range = parse_range(engine.parser(), &params.start_date, &params.end_date)?;
    let tolerance = params
        .tolerance_minutes
        .unwrap_or(engine.settings().duplicate_tolerance_minutes);

    let pairs = engine
        .find_duplicate_events(
            range,
            params.calendar_names.as_deref(),
            params.calendar_source.as_deref(),
            Some(tolerance),
        )
        .await?;
    let render = views::renderer(engine, EntityKind::Event).await?;

    Ok(json!({
        "tolerance_minutes": tolerance,
        "duplicate_count": pairs.len(),
        "duplicates": pairs.iter().map(|p| render.duplicate(p)).collect::<Vec<_>>(),
    }))
}
