//! Resolve a calendar name (and optional source) to calendars.
//!
//! Two accounts can each hold a calendar called "Work"; the source name is
//! what tells them apart.

use crate::calendar::{Calendar, EntityKind};
use crate::error::{CalMcpError, CalMcpResult};

/// A calendar as callers name it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarRef {
    pub name: String,
    pub source: Option<String>,
}

impl CalendarRef {
    pub fn new(name: impl Into<String>, source: Option<String>) -> Self {
        CalendarRef {
            name: name.into(),
            source,
        }
    }
}

/// Every calendar of `kind` titled `name` (and in `source`, if given).
pub fn resolve_all<'a>(
    calendars: &'a [Calendar],
    name: &str,
    source: Option<&str>,
    kind: EntityKind,
) -> CalMcpResult<Vec<&'a Calendar>> {
    let matches: Vec<&Calendar> = calendars
        .iter()
        .filter(|c| c.kind == kind && c.title == name)
        .filter(|c| source.is_none_or(|s| c.source == s))
        .collect();

    if matches.is_empty() {
        return Err(match source {
            Some(s) => CalMcpError::CalendarNotFoundInSource {
                name: name.to_string(),
                calendar_source: s.to_string(),
            },
            None => CalMcpError::CalendarNotFound(name.to_string()),
        });
    }

    Ok(matches)
}

/// The single calendar a name refers to; ambiguous names are an error that
/// lists the candidate sources.
pub fn resolve<'a>(
    calendars: &'a [Calendar],
    name: &str,
    source: Option<&str>,
    kind: EntityKind,
) -> CalMcpResult<&'a Calendar> {
    let mut matches = resolve_all(calendars, name, source, kind)?;

    if matches.len() > 1 {
        return Err(CalMcpError::AmbiguousCalendar {
            name: name.to_string(),
            sources: matches.iter().map(|c| c.source.clone()).collect(),
        });
    }

    Ok(matches.remove(0))
}
