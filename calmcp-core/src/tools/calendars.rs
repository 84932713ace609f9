use serde_json::{Map, Value, json};

use super::params::{
    CalendarTargetParams, CreateCalendarParams, ListCalendarsParams, parse, parse_opt,
};
use super::views;
use crate::calendar::{EntityKind, parse_color};
use crate::engine::{CalendarSelector, Engine};
use crate::error::{CalMcpError, CalMcpResult};
use crate::resolver::CalendarRef;
use crate::store::CalendarStore;

fn selector(params: &CalendarTargetParams) -> CalMcpResult<CalendarSelector> {
    if let Some(id) = &params.calendar_id {
        return Ok(CalendarSelector::Id(id.clone()));
    }
    let name = params.calendar_name.clone().ok_or_else(|| {
        CalMcpError::InvalidParameter("calendar_id or calendar_name is required".into())
    })?;
    Ok(CalendarSelector::Named {
        reference: CalendarRef::new(name, params.calendar_source.clone()),
        kind: parse_opt(params.kind.as_deref())?,
    })
}

pub(super) async fn list<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: ListCalendarsParams = parse(args)?;
    let kind: Option<EntityKind> = parse_opt(params.kind.as_deref())?;
    let calendars = engine.list_calendars(kind).await?;

    Ok(json!({
        "count": calendars.len(),
        "calendars": calendars.iter().map(views::calendar).collect::<Vec<_>>(),
    }))
}

pub(super) async fn create<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: CreateCalendarParams = parse(args)?;
    if params.title.trim().is_empty() {
        return Err(CalMcpError::InvalidParameter("title must not be empty".into()));
    }
    let kind: EntityKind = params.kind.parse()?;
    let color = params.color.as_deref().map(parse_color).transpose()?;

    let calendar = engine.create_calendar(&params.title, kind, color).await?;
    Ok(json!({
        "success": true,
        "message": format!("Created {} calendar '{}'", kind, calendar.title),
        "calendar": views::calendar(&calendar),
    }))
}

pub(super) async fn update<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: CalendarTargetParams = parse(args)?;
    let selector = selector(&params)?;
    let color = params.color.as_deref().map(parse_color).transpose()?;

    let calendar = engine
        .update_calendar(&selector, params.new_name, color)
        .await?;
    Ok(json!({
        "success": true,
        "calendar": views::calendar(&calendar),
    }))
}

pub(super) async fn delete<S: CalendarStore>(
    engine: &Engine<S>,
    args: &Map<String, Value>,
) -> CalMcpResult<Value> {
    let params: CalendarTargetParams = parse(args)?;
    let calendar = engine.delete_calendar(&selector(&params)?).await?;
    Ok(json!({
        "success": true,
        "message": format!("Deleted calendar '{}' ({})", calendar.title, calendar.source),
        "calendar_id": calendar.id,
    }))
}
