use super::Engine;
use crate::calendar::{Calendar, EntityKind};
use crate::constants::DEFAULT_SOURCE;
use crate::error::{CalMcpError, CalMcpResult};
use crate::resolver::{self, CalendarRef};
use crate::store::CalendarStore;

/// How a caller picks an existing calendar.
#[derive(Debug, Clone)]
pub enum CalendarSelector {
    Id(String),
    /// By name, optionally narrowed to one kind.
    Named {
        reference: CalendarRef,
        kind: Option<EntityKind>,
    },
}

const BOTH_KINDS: [EntityKind; 2] = [EntityKind::Event, EntityKind::Reminder];

fn kinds(kind: Option<EntityKind>) -> Vec<EntityKind> {
    kind.map(|k| vec![k]).unwrap_or_else(|| BOTH_KINDS.to_vec())
}

impl<S: CalendarStore> Engine<S> {
    pub async fn list_calendars(&self, kind: Option<EntityKind>) -> CalMcpResult<Vec<Calendar>> {
        for k in kinds(kind) {
            self.ensure_access(k).await?;
        }
        // Access for every kind asked for is settled above.
        let store = self.read(kind.unwrap_or(EntityKind::Event)).await?;
        Ok(store.calendars(kind))
    }

    /// Create a calendar in the same source as the default calendar of its kind.
    pub async fn create_calendar(
        &self,
        title: &str,
        kind: EntityKind,
        color: Option<String>,
    ) -> CalMcpResult<Calendar> {
        let mut store = self.write(kind).await?;

        let source = store
            .default_calendar(kind)
            .map(|c| c.source)
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
        let mut calendar = Calendar::new(title, kind, &source);
        calendar.color = color;

        let saved = store.save_calendar(calendar)?;
        self.gate.mark_stale();
        tracing::info!(id = %saved.id, title = %saved.title, "Created calendar");
        Ok(saved)
    }

    pub async fn update_calendar(
        &self,
        selector: &CalendarSelector,
        new_name: Option<String>,
        color: Option<String>,
    ) -> CalMcpResult<Calendar> {
        if new_name.is_none() && color.is_none() {
            return Err(CalMcpError::InvalidParameter(
                "give new_name or color to update".into(),
            ));
        }

        let mut calendar = self.select_calendar(selector).await?;
        let mut store = self.write(calendar.kind).await?;

        if let Some(name) = new_name {
            calendar.title = name;
        }
        if color.is_some() {
            calendar.color = color;
        }

        let saved = store.save_calendar(calendar)?;
        self.gate.mark_stale();
        Ok(saved)
    }

    /// Delete a calendar and everything in it.
    pub async fn delete_calendar(&self, selector: &CalendarSelector) -> CalMcpResult<Calendar> {
        let calendar = self.select_calendar(selector).await?;
        let mut store = self.write(calendar.kind).await?;
        store.remove_calendar(&calendar.id)?;
        self.gate.mark_stale();
        tracing::info!(id = %calendar.id, title = %calendar.title, "Deleted calendar");
        Ok(calendar)
    }

    async fn select_calendar(&self, selector: &CalendarSelector) -> CalMcpResult<Calendar> {
        match selector {
            // Only kinds the user granted are searched. A miss with a
            // denied kind reports the denial.
            CalendarSelector::Id(id) => {
                let mut denied = None;
                for k in BOTH_KINDS {
                    match self.read(k).await {
                        Ok(store) => {
                            let found = store.calendars(Some(k)).into_iter().find(|c| c.id == *id);
                            if let Some(calendar) = found {
                                return Ok(calendar);
                            }
                        }
                        Err(e @ CalMcpError::AccessDenied(_)) => denied = Some(e),
                        Err(other) => return Err(other),
                    }
                }
                Err(denied.unwrap_or_else(|| CalMcpError::CalendarNotFound(id.clone())))
            }
            CalendarSelector::Named { reference, kind } => {
                let mut matches = Vec::new();
                for k in kinds(*kind) {
                    let store = self.read(k).await?;
                    let calendars = store.calendars(Some(k));
                    let source = reference.source.as_deref();
                    match resolver::resolve_all(&calendars, &reference.name, source, k) {
                        Ok(found) => matches.extend(found.into_iter().cloned()),
                        Err(CalMcpError::CalendarNotFound(_))
                        | Err(CalMcpError::CalendarNotFoundInSource { .. }) => {}
                        Err(other) => return Err(other),
                    }
                }

                match matches.len() {
                    0 => Err(match &reference.source {
                        Some(source) => CalMcpError::CalendarNotFoundInSource {
                            name: reference.name.clone(),
                            calendar_source: source.clone(),
                        },
                        None => CalMcpError::CalendarNotFound(reference.name.clone()),
                    }),
                    1 => Ok(matches.remove(0)),
                    _ => Err(CalMcpError::AmbiguousCalendar {
                        name: reference.name.clone(),
                        sources: matches.iter().map(|c| c.source.clone()).collect(),
                    }),
                }
            }
        }
    }
}
