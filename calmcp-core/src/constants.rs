//! Shared defaults.

/// Default window for duplicate detection, in minutes.
pub const DEFAULT_DUPLICATE_TOLERANCE_MINUTES: i64 = 5;

/// Half-width of the window searched when a search gives no dates.
pub const DEFAULT_SEARCH_WINDOW_DAYS: i64 = 730;

/// Largest configurable search window, in days.
pub const MAX_SEARCH_WINDOW_DAYS: i64 = 36_500;

/// Upper bound on occurrences expanded from one recurring series per query.
pub const MAX_OCCURRENCES: u16 = 1000;

/// Source name given to calendars the store seeds itself.
pub const DEFAULT_SOURCE: &str = "Local";

pub const DEFAULT_EVENT_CALENDAR: &str = "Calendar";
pub const DEFAULT_REMINDER_LIST: &str = "Reminders";
