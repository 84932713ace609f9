//! The engine: consent, calendar resolution and store access for every
//! operation.
//!
//! The store sits behind one `RwLock`. Writes, including whole batches,
//! hold the write half, so two operations never interleave writes; reads
//! share the read half and wait for any write in flight.

mod batch;
mod calendars;
mod events;
mod reminders;

pub use batch::DeleteOutcome;
pub use calendars::CalendarSelector;

use chrono::{Duration, Weekday};
use std::collections::HashMap;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::access::AccessGate;
use crate::calendar::{Calendar, EntityKind};
use crate::constants::{DEFAULT_DUPLICATE_TOLERANCE_MINUTES, DEFAULT_SEARCH_WINDOW_DAYS};
use crate::dates::{DateParser, Zone};
use crate::error::{CalMcpError, CalMcpResult};
use crate::resolver::{self, CalendarRef};
use crate::store::CalendarStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Zone that "local time" means for parsing and rendering.
    pub zone: Zone,
    /// What `week_starts_on = "system"` resolves to.
    pub week_start_default: Weekday,
    pub duplicate_tolerance_minutes: i64,
    pub search_window_days: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            zone: Zone::System,
            week_start_default: Weekday::Mon,
            duplicate_tolerance_minutes: DEFAULT_DUPLICATE_TOLERANCE_MINUTES,
            search_window_days: DEFAULT_SEARCH_WINDOW_DAYS,
        }
    }
}

pub struct Engine<S> {
    store: RwLock<S>,
    gate: AccessGate,
    settings: EngineSettings,
    parser: DateParser,
}

impl<S: CalendarStore> Engine<S> {
    pub fn new(store: S, settings: EngineSettings) -> Self {
        Engine {
            store: RwLock::new(store),
            gate: AccessGate::new(),
            parser: DateParser::new(settings.zone),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn parser(&self) -> &DateParser {
        &self.parser
    }

    pub fn zone(&self) -> &Zone {
        &self.settings.zone
    }

    /// Direct access to the store, bypassing consent.
    pub fn store(&self) -> &RwLock<S> {
        &self.store
    }

    /// Half-width of the window searched when no dates are given.
    pub fn search_window(&self) -> CalMcpResult<Duration> {
        let days = self.settings.search_window_days;
        Duration::try_days(days)
            .filter(|_| days > 0)
            .ok_or_else(|| CalMcpError::Config(format!("search_window_days {days} is out of range")))
    }

    /// Make sure the user has granted access to `kind`. A grant is asked
    /// for once per process; a denial is asked again next time.
    pub async fn ensure_access(&self, kind: EntityKind) -> CalMcpResult<()> {
        let store = &self.store;
        let allowed = self
            .gate
            .ensure_with(kind, || async move {
                let pending = store.read().await.request_access(kind);
                pending.await
            })
            .await?;

        if allowed {
            Ok(())
        } else {
            Err(CalMcpError::AccessDenied(kind))
        }
    }

    /// Read access, refreshing the store first if anything was written since
    /// the last read.
    async fn read(&self, kind: EntityKind) -> CalMcpResult<RwLockReadGuard<'_, S>> {
        self.ensure_access(kind).await?;
        if self.gate.take_stale() {
            self.store.write().await.refresh_sources()?;
            tracing::debug!("Refreshed store sources after write");
        }
        Ok(self.store.read().await)
    }

    /// Exclusive access for writes. Callers mark the store stale once done.
    async fn write(&self, kind: EntityKind) -> CalMcpResult<RwLockWriteGuard<'_, S>> {
        self.ensure_access(kind).await?;
        Ok(self.store.write().await)
    }

    /// Calendars of `kind` keyed by id, for rendering items.
    pub async fn calendar_index(&self, kind: EntityKind) -> CalMcpResult<HashMap<String, Calendar>> {
        let store = self.read(kind).await?;
        Ok(store
            .calendars(Some(kind))
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect())
    }
}

/// The single calendar a reference names.
fn resolve_one<S: CalendarStore>(
    store: &S,
    reference: &CalendarRef,
    kind: EntityKind,
) -> CalMcpResult<Calendar> {
    let calendars = store.calendars(Some(kind));
    resolver::resolve(&calendars, &reference.name, reference.source.as_deref(), kind).cloned()
}

/// Ids of every calendar a reference names, or `None` for no restriction.
fn resolve_filter<S: CalendarStore>(
    store: &S,
    reference: Option<&CalendarRef>,
    kind: EntityKind,
) -> CalMcpResult<Option<Vec<String>>> {
    let Some(reference) = reference else {
        return Ok(None);
    };
    let calendars = store.calendars(Some(kind));
    let matches =
        resolver::resolve_all(&calendars, &reference.name, reference.source.as_deref(), kind)?;
    Ok(Some(matches.iter().map(|c| c.id.clone()).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Consent, MemoryStore};

    #[tokio::test]
    async fn access_is_requested_once() {
        let engine = Engine::new(MemoryStore::with_defaults(), EngineSettings::default());
        for _ in 0..3 {
            engine.ensure_access(EntityKind::Event).await.unwrap();
        }
        assert_eq!(engine.store().read().await.access_requests(), 1);
    }

    #[tokio::test]
    async fn denied_access_names_the_kind() {
        let store = MemoryStore::with_defaults().with_consent(Consent {
            events: true,
            reminders: false,
        });
        let engine = Engine::new(store, EngineSettings::default());
        match engine.ensure_access(EntityKind::Reminder).await {
            Err(CalMcpError::AccessDenied(EntityKind::Reminder)) => {}
            other => panic!("expected denial, got {other:?}"),
        }
        assert_eq!(engine.store().read().await.access_requests(), 1);
        assert!(engine.ensure_access(EntityKind::Reminder).await.is_err());
        assert_eq!(engine.store().read().await.access_requests(), 2);
    }

    #[tokio::test]
    async fn reads_after_writes_refresh_sources() {
        let engine = Engine::new(MemoryStore::with_defaults(), EngineSettings::default());
        engine.calendar_index(EntityKind::Event).await.unwrap();
        assert_eq!(engine.store().read().await.refreshes(), 0);

        engine
            .create_calendar("Gym", EntityKind::Event, None)
            .await
            .unwrap();
        engine.calendar_index(EntityKind::Event).await.unwrap();
        engine.calendar_index(EntityKind::Event).await.unwrap();
        assert_eq!(engine.store().read().await.refreshes(), 1);
    }
}
