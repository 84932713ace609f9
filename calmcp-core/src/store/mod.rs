//! The calendar store the engine runs against.
//!
//! The store owns calendars, events and reminders and decides whether the
//! user consents to access. Recurring events are kept once per series and
//! expanded into occurrences by range queries.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::{MemoryStore, Snapshot};

use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::str::FromStr;

use crate::calendar::{Calendar, EntityKind};
use crate::date_range::DateRange;
use crate::error::{CalMcpError, CalMcpResult};
use crate::event::Event;
use crate::reminder::Reminder;

/// Which occurrences of a recurring event a removal covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Span {
    /// Only the selected occurrence.
    #[default]
    This,
    /// The selected occurrence and everything after it.
    Future,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Span::This => "this",
            Span::Future => "future",
        })
    }
}

impl FromStr for Span {
    type Err = CalMcpError;

    fn from_str(s: &str) -> CalMcpResult<Self> {
        match s {
            "this" => Ok(Span::This),
            "future" => Ok(Span::Future),
            other => Err(CalMcpError::InvalidParameter(format!(
                "span must be 'this' or 'future', got '{other}'"
            ))),
        }
    }
}

/// The user's answer to an access request, per entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consent {
    pub events: bool,
    pub reminders: bool,
}

impl Default for Consent {
    fn default() -> Self {
        Consent {
            events: true,
            reminders: true,
        }
    }
}

impl Consent {
    pub fn allows(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Event => self.events,
            EntityKind::Reminder => self.reminders,
        }
    }
}

pub trait CalendarStore {
    /// Ask for access to one entity kind. May wait on the user for as long
    /// as they take to answer. The request does not borrow the store, so
    /// the store stays usable while it is pending.
    fn request_access(&self, kind: EntityKind) -> impl Future<Output = CalMcpResult<bool>> + 'static;

    /// Re-read calendars whose contents may have changed elsewhere.
    fn refresh_sources(&mut self) -> CalMcpResult<()>;

    /// All calendars, or only those holding `kind`.
    fn calendars(&self, kind: Option<EntityKind>) -> Vec<Calendar>;

    fn calendar(&self, id: &str) -> Option<Calendar>;

    /// Where new items of `kind` go when nothing else is said.
    fn default_calendar(&self, kind: EntityKind) -> Option<Calendar>;

    /// Create (empty id) or rename/recolor a calendar.
    fn save_calendar(&mut self, calendar: Calendar) -> CalMcpResult<Calendar>;

    /// Remove a calendar together with everything in it.
    fn remove_calendar(&mut self, id: &str) -> CalMcpResult<()>;

    /// Events overlapping `range`, recurring series expanded into occurrences.
    fn events(&self, range: &DateRange, calendar_ids: Option<&[String]>)
    -> CalMcpResult<Vec<Event>>;

    /// A stored event (the series, for recurring events).
    fn event(&self, id: &str) -> Option<Event>;

    /// Commit an event, assigning an id on first save.
    fn save_event(&mut self, event: Event) -> CalMcpResult<Event>;

    /// Remove an event, or part of a recurring series selected by `span`
    /// and `occurrence`.
    fn remove_event(
        &mut self,
        id: &str,
        span: Span,
        occurrence: Option<DateTime<Utc>>,
    ) -> CalMcpResult<()>;

    fn reminders(&self, calendar_ids: Option<&[String]>) -> Vec<Reminder>;

    fn reminder(&self, id: &str) -> Option<Reminder>;

    fn save_reminder(&mut self, reminder: Reminder) -> CalMcpResult<Reminder>;

    fn remove_reminder(&mut self, id: &str) -> CalMcpResult<()>;
}
