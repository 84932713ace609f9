//! Date ranges for querying events, and the named quick ranges.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use std::str::FromStr;

use crate::dates::Zone;
use crate::error::{CalMcpError, CalMcpResult};

/// Half-open range `[start, end)` of absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CalMcpResult<Self> {
        if start >= end {
            return Err(CalMcpError::InvalidTimeRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(DateRange { start, end })
    }

    /// `now ± window`, used when a search gives no dates.
    pub fn around(now: DateTime<Utc>, window: Duration) -> CalMcpResult<Self> {
        Self::new(shift(now, -window)?, shift(now, window)?)
    }

    /// `[start, start + window)`.
    pub fn following(start: DateTime<Utc>, window: Duration) -> CalMcpResult<Self> {
        Self::new(start, shift(start, window)?)
    }

    /// `[end - window, end)`.
    pub fn preceding(end: DateTime<Utc>, window: Duration) -> CalMcpResult<Self> {
        Self::new(shift(end, -window)?, end)
    }

    /// Whether an item spanning `[start, end)` shows up in this range.
    /// Zero-length items count when their instant lies inside the range.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if start == end {
            return start >= self.start && start < self.end;
        }
        start < self.end && end > self.start
    }
}

fn shift(instant: DateTime<Utc>, by: Duration) -> CalMcpResult<DateTime<Utc>> {
    instant.checked_add_signed(by).ok_or_else(|| {
        CalMcpError::InvalidParameter(format!(
            "{} shifted by {} days is out of range",
            instant.to_rfc3339(),
            by.num_days()
        ))
    })
}

/// Which day a week starts on for week-bounded quick ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeekStart {
    /// Defer to the configured default.
    #[default]
    System,
    Monday,
    Sunday,
    Saturday,
}

impl WeekStart {
    pub fn first_day(&self, system_default: Weekday) -> Weekday {
        match self {
            WeekStart::System => system_default,
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Sunday => Weekday::Sun,
            WeekStart::Saturday => Weekday::Sat,
        }
    }
}

impl FromStr for WeekStart {
    type Err = CalMcpError;

    fn from_str(s: &str) -> CalMcpResult<Self> {
        match s {
            "system" => Ok(WeekStart::System),
            "monday" => Ok(WeekStart::Monday),
            "sunday" => Ok(WeekStart::Sunday),
            "saturday" => Ok(WeekStart::Saturday),
            other => Err(CalMcpError::InvalidParameter(format!(
                "week_starts_on must be one of system, monday, sunday, saturday; got '{other}'"
            ))),
        }
    }
}

/// Named ranges relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickRange {
    Today,
    Tomorrow,
    ThisWeek,
    NextWeek,
    ThisMonth,
    Next7Days,
    Next30Days,
}

impl QuickRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuickRange::Today => "today",
            QuickRange::Tomorrow => "tomorrow",
            QuickRange::ThisWeek => "this_week",
            QuickRange::NextWeek => "next_week",
            QuickRange::ThisMonth => "this_month",
            QuickRange::Next7Days => "next_7_days",
            QuickRange::Next30Days => "next_30_days",
        }
    }

    /// Resolve to local-midnight boundaries. Weeks are always 7 days long,
    /// whatever day they start on.
    pub fn resolve(
        &self,
        now: DateTime<Utc>,
        zone: &Zone,
        first_day: Weekday,
    ) -> CalMcpResult<DateRange> {
        let today = zone.today(now);

        let (from, to) = match self {
            QuickRange::Today => (today, today + Duration::days(1)),
            QuickRange::Tomorrow => (today + Duration::days(1), today + Duration::days(2)),
            QuickRange::ThisWeek => {
                let start = week_start(today, first_day);
                (start, start + Duration::days(7))
            }
            QuickRange::NextWeek => {
                let start = week_start(today, first_day) + Duration::days(7);
                (start, start + Duration::days(7))
            }
            QuickRange::ThisMonth => month_bounds(today)?,
            QuickRange::Next7Days => (today, today + Duration::days(7)),
            QuickRange::Next30Days => (today, today + Duration::days(30)),
        };

        DateRange::new(zone.start_of_day(from)?, zone.start_of_day(to)?)
    }
}

impl FromStr for QuickRange {
    type Err = CalMcpError;

    fn from_str(s: &str) -> CalMcpResult<Self> {
        match s {
            "today" => Ok(QuickRange::Today),
            "tomorrow" => Ok(QuickRange::Tomorrow),
            "this_week" => Ok(QuickRange::ThisWeek),
            "next_week" => Ok(QuickRange::NextWeek),
            "this_month" => Ok(QuickRange::ThisMonth),
            "next_7_days" => Ok(QuickRange::Next7Days),
            "next_30_days" => Ok(QuickRange::Next30Days),
            other => Err(CalMcpError::InvalidParameter(format!(
                "range must be one of today, tomorrow, this_week, next_week, this_month, \
                 next_7_days, next_30_days; got '{other}'"
            ))),
        }
    }
}

/// The first day of the week containing `date`.
pub fn week_start(date: NaiveDate, first_day: Weekday) -> NaiveDate {
    let offset = (date.weekday().num_days_from_sunday() + 7 - first_day.num_days_from_sunday()) % 7;
    date - Duration::days(offset as i64)
}

fn month_bounds(date: NaiveDate) -> CalMcpResult<(NaiveDate, NaiveDate)> {
    let invalid = || CalMcpError::InvalidDate(date.to_string());
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).ok_or_else(invalid)?;
    let next = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
    .ok_or_else(invalid)?;
    Ok((first, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc_zone() -> Zone {
        Zone::from_name("UTC").unwrap()
    }

    #[test]
    fn around_spans_both_sides() {
        let now = Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap();
        let range = DateRange::around(now, Duration::days(2)).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2026, 2, 4, 12, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).unwrap());
    }

    #[test]
    fn windows_past_the_calendar_are_errors() {
        let huge = Duration::days(300_000 * 365);
        assert!(DateRange::around(Utc::now(), huge).is_err());
        assert!(DateRange::following(DateTime::<Utc>::MAX_UTC, Duration::days(1)).is_err());
        assert!(DateRange::preceding(DateTime::<Utc>::MIN_UTC, Duration::days(1)).is_err());
    }

    #[test]
    fn week_start_honours_first_day() {
        // Thursday, January 29, 2026
        let thursday = date(2026, 1, 29);
        assert_eq!(week_start(thursday, Weekday::Mon), date(2026, 1, 26));
        assert_eq!(week_start(thursday, Weekday::Sun), date(2026, 1, 25));
        assert_eq!(week_start(thursday, Weekday::Sat), date(2026, 1, 24));
    }

    #[test]
    fn week_start_on_the_first_day_is_that_day() {
        assert_eq!(week_start(date(2026, 1, 26), Weekday::Mon), date(2026, 1, 26));
        assert_eq!(week_start(date(2026, 1, 25), Weekday::Sun), date(2026, 1, 25));
    }

    #[test]
    fn week_start_crosses_year_boundary() {
        assert_eq!(week_start(date(2026, 1, 2), Weekday::Mon), date(2025, 12, 29));
    }

    #[test]
    fn next_week_follows_this_week() {
        let now = Utc.with_ymd_and_hms(2026, 1, 29, 12, 0, 0).unwrap();
        let zone = utc_zone();

        let next_mon = QuickRange::NextWeek.resolve(now, &zone, Weekday::Mon).unwrap();
        assert_eq!(next_mon.start.date_naive(), date(2026, 2, 2));

        let next_sun = QuickRange::NextWeek.resolve(now, &zone, Weekday::Sun).unwrap();
        assert_eq!(next_sun.start.date_naive(), date(2026, 2, 1));
    }

    #[test]
    fn weeks_are_seven_days_whatever_the_start() {
        let now = Utc.with_ymd_and_hms(2026, 1, 29, 12, 0, 0).unwrap();
        for first in [Weekday::Sun, Weekday::Mon, Weekday::Sat] {
            let range = QuickRange::ThisWeek.resolve(now, &utc_zone(), first).unwrap();
            assert_eq!(range.end - range.start, Duration::days(7));
        }
    }

    #[test]
    fn this_month_in_december_rolls_the_year() {
        let now = Utc.with_ymd_and_hms(2026, 12, 15, 9, 0, 0).unwrap();
        let range = QuickRange::ThisMonth.resolve(now, &utc_zone(), Weekday::Mon).unwrap();
        assert_eq!(range.start.date_naive(), date(2026, 12, 1));
        assert_eq!(range.end.date_naive(), date(2027, 1, 1));
    }

    #[test]
    fn today_uses_local_midnight() {
        let zone = Zone::from_name("Asia/Taipei").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 2, 6, 20, 0, 0).unwrap(); // Feb 7 local
        let range = QuickRange::Today.resolve(now, &zone, Weekday::Mon).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2026, 2, 6, 16, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2026, 2, 7, 16, 0, 0).unwrap());
    }

    #[test]
    fn unknown_tags_fail_fast() {
        assert!("yesterday".parse::<QuickRange>().is_err());
        assert!("friday".parse::<WeekStart>().is_err());
        assert_eq!("system".parse::<WeekStart>().unwrap(), WeekStart::System);
    }

    #[test]
    fn overlap_excludes_touching_boundaries() {
        let t = |h| Utc.with_ymd_and_hms(2026, 1, 1, h, 0, 0).unwrap();
        let range = DateRange::new(t(10), t(12)).unwrap();
        assert!(range.overlaps(t(9), t(11)));
        assert!(!range.overlaps(t(8), t(10)));
        assert!(!range.overlaps(t(12), t(13)));
        assert!(range.overlaps(t(10), t(10)));
        assert!(!range.overlaps(t(12), t(12)));
    }

    #[test]
    fn empty_range_is_rejected() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        assert!(DateRange::new(t, t).is_err());
    }
}
