use chrono::{DateTime, Utc};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use super::{CalendarStore, Consent, MemoryStore, Snapshot, Span};
use crate::calendar::{Calendar, EntityKind};
use crate::date_range::DateRange;
use crate::error::CalMcpResult;
use crate::event::Event;
use crate::reminder::Reminder;

/// A [`MemoryStore`] persisted as a JSON snapshot. Every write is committed
/// to disk before it returns.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open the snapshot at `path`, creating it with a default calendar and
    /// reminder list if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>, consent: Consent) -> CalMcpResult<Self> {
        let path = path.into();

        let mut inner = if path.exists() {
            MemoryStore::from_snapshot(read_snapshot(&path)?)
        } else {
            MemoryStore::with_defaults()
        };
        inner.set_consent(consent);

        let store = FileStore { path, inner };
        if !store.path.exists() {
            store.persist()?;
            tracing::info!(path = %store.path.display(), "Created new store");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> CalMcpResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self.inner.snapshot())?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Run a write against the in-memory state and commit it. If the write
    /// or the commit fails, the in-memory state is rolled back.
    fn commit<T>(&mut self, op: impl FnOnce(&mut MemoryStore) -> CalMcpResult<T>) -> CalMcpResult<T> {
        let before = self.inner.snapshot().clone();
        let value = match op(&mut self.inner) {
            Ok(value) => value,
            Err(e) => {
                self.inner.replace_snapshot(before);
                return Err(e);
            }
        };
        if let Err(e) = self.persist() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to commit store, rolling back");
            self.inner.replace_snapshot(before);
            return Err(e);
        }
        Ok(value)
    }
}

fn read_snapshot(path: &Path) -> CalMcpResult<Snapshot> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

impl CalendarStore for FileStore {
    fn request_access(&self, kind: EntityKind) -> impl Future<Output = CalMcpResult<bool>> + 'static {
        self.inner.request_access(kind)
    }

    /// Pick up changes other processes made to the snapshot.
    fn refresh_sources(&mut self) -> CalMcpResult<()> {
        if self.path.exists() {
            let snapshot = read_snapshot(&self.path)?;
            self.inner.replace_snapshot(snapshot);
            tracing::debug!(path = %self.path.display(), "Reloaded store");
        }
        self.inner.refresh_sources()
    }

    fn calendars(&self, kind: Option<EntityKind>) -> Vec<Calendar> {
        self.inner.calendars(kind)
    }

    fn calendar(&self, id: &str) -> Option<Calendar> {
        self.inner.calendar(id)
    }

    fn default_calendar(&self, kind: EntityKind) -> Option<Calendar> {
        self.inner.default_calendar(kind)
    }

    fn save_calendar(&mut self, calendar: Calendar) -> CalMcpResult<Calendar> {
        self.commit(|store| store.save_calendar(calendar))
    }

    fn remove_calendar(&mut self, id: &str) -> CalMcpResult<()> {
        self.commit(|store| store.remove_calendar(id))
    }

    fn events(
        &self,
        range: &DateRange,
        calendar_ids: Option<&[String]>,
    ) -> CalMcpResult<Vec<Event>> {
        self.inner.events(range, calendar_ids)
    }

    fn event(&self, id: &str) -> Option<Event> {
        self.inner.event(id)
    }

    fn save_event(&mut self, event: Event) -> CalMcpResult<Event> {
        self.commit(|store| store.save_event(event))
    }

    fn remove_event(
        &mut self,
        id: &str,
        span: Span,
        occurrence: Option<DateTime<Utc>>,
    ) -> CalMcpResult<()> {
        self.commit(|store| store.remove_event(id, span, occurrence))
    }

    fn reminders(&self, calendar_ids: Option<&[String]>) -> Vec<Reminder> {
        self.inner.reminders(calendar_ids)
    }

    fn reminder(&self, id: &str) -> Option<Reminder> {
        self.inner.reminder(id)
    }

    fn save_reminder(&mut self, reminder: Reminder) -> CalMcpResult<Reminder> {
        self.commit(|store| store.save_reminder(reminder))
    }

    fn remove_reminder(&mut self, id: &str) -> CalMcpResult<()> {
        self.commit(|store| store.remove_reminder(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn event(calendar_id: &str) -> Event {
        Event {
            id: None,
            title: "Dentist".into(),
            start: Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 3, 2, 16, 0, 0).unwrap(),
            all_day: false,
            notes: None,
            location: None,
            url: None,
            calendar_id: calendar_id.into(),
            alarms: vec![],
            recurrence: None,
            occurrence_date: None,
        }
    }

    #[test]
    fn open_creates_snapshot_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let store = FileStore::open(&path, Consent::default()).unwrap();
        assert!(path.exists());
        assert_eq!(store.calendars(None).len(), 2);
    }

    #[test]
    fn writes_survive_reopening() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let mut store = FileStore::open(&path, Consent::default()).unwrap();
        let cal = store.default_calendar(EntityKind::Event).unwrap();
        let saved = store.save_event(event(&cal.id)).unwrap();

        let reopened = FileStore::open(&path, Consent::default()).unwrap();
        assert_eq!(reopened.event(saved.id_str()).unwrap().title, "Dentist");
    }

    #[test]
    fn refresh_picks_up_external_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let mut first = FileStore::open(&path, Consent::default()).unwrap();
        let mut second = FileStore::open(&path, Consent::default()).unwrap();

        let cal = second.default_calendar(EntityKind::Event).unwrap();
        let saved = second.save_event(event(&cal.id)).unwrap();

        assert!(first.event(saved.id_str()).is_none());
        first.refresh_sources().unwrap();
        assert!(first.event(saved.id_str()).is_some());
    }

    #[test]
    fn failed_write_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut store = FileStore::open(&path, Consent::default()).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        assert!(store.save_event(event("missing")).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn failed_commit_rolls_back_memory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut store = FileStore::open(&path, Consent::default()).unwrap();
        let cal = store.default_calendar(EntityKind::Event).unwrap();

        // The temporary file cannot be written over a directory
        fs::create_dir(path.with_extension("json.tmp")).unwrap();
        assert!(store.save_event(event(&cal.id)).is_err());

        let march = DateRange::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap(),
        )
        .unwrap();
        assert!(store.events(&march, None).unwrap().is_empty());
    }
}
