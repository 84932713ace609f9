//! Flexible date parsing and canonical rendering.
//!
//! Callers send dates in whatever shape is handy. Four formats are accepted,
//! tried strictly in this order:
//!
//! 1. full timestamp with an offset or `Z` (`2026-02-06T14:00:00+08:00`)
//! 2. timestamp without offset, read in the local zone (`2026-02-06T14:00:00`)
//! 3. date only, midnight in the local zone (`2026-02-06`)
//! 4. time only, today in the local zone (`14:00`, `14:00:30`)
//!
//! Output always goes through [`Zone::render`], whose result parses back to
//! the same instant through rule 1.

use chrono::{
    DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::{CalMcpError, CalMcpResult};

/// Offset-bearing formats that RFC 3339 parsing rejects but callers send anyway.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// The zone "local time" refers to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Zone {
    /// Whatever zone the process runs in.
    #[default]
    System,
    /// A fixed IANA zone, configured explicitly.
    Named(Tz),
}

impl Zone {
    pub fn from_name(name: &str) -> CalMcpResult<Self> {
        name.parse::<Tz>()
            .map(Zone::Named)
            .map_err(|_| CalMcpError::Config(format!("Unknown time zone '{name}'")))
    }

    /// IANA name of the zone. The system zone is looked up from the OS and
    /// has no name if the lookup fails.
    pub fn iana_name(&self) -> Option<String> {
        match self {
            Zone::Named(tz) => Some(tz.name().to_string()),
            Zone::System => match iana_time_zone::get_timezone() {
                Ok(name) if name.parse::<Tz>().is_ok() => Some(name),
                Ok(name) => {
                    tracing::warn!(zone = %name, "System time zone unknown to tz database, repeating in UTC");
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not determine system time zone, repeating in UTC");
                    None
                }
            },
        }
    }

    /// Interpret a wall-clock time in this zone.
    ///
    /// Times that fall into a DST gap are moved forward by an hour; ambiguous
    /// times resolve to the earlier instant.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Zone::System => localize_in(&Local, naive),
            Zone::Named(tz) => localize_in(tz, naive),
        }
    }

    /// Wall-clock time of an instant in this zone.
    pub fn local_naive(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Zone::System => instant.with_timezone(&Local).naive_local(),
            Zone::Named(tz) => instant.with_timezone(tz).naive_local(),
        }
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_naive(now).date()
    }

    /// Local midnight starting the given day.
    pub fn start_of_day(&self, date: NaiveDate) -> CalMcpResult<DateTime<Utc>> {
        self.localize(date.and_time(NaiveTime::MIN))
            .ok_or_else(|| CalMcpError::InvalidDate(date.to_string()))
    }

    /// Canonical full-timestamp rendering, with the local offset.
    pub fn render(&self, instant: DateTime<Utc>) -> String {
        match self {
            Zone::System => instant
                .with_timezone(&Local)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Zone::Named(tz) => instant
                .with_timezone(tz)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

fn localize_in<T: TimeZone>(tz: &T, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Normalizes the accepted date/time shapes into absolute instants.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateParser {
    zone: Zone,
}

impl DateParser {
    pub fn new(zone: Zone) -> Self {
        DateParser { zone }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn parse(&self, input: &str) -> CalMcpResult<DateTime<Utc>> {
        self.parse_at(input, Utc::now())
    }

    /// Like [`parse`](Self::parse), with "today" taken from `now`.
    pub fn parse_at(&self, input: &str, now: DateTime<Utc>) -> CalMcpResult<DateTime<Utc>> {
        let s = input.trim();
        let invalid = || CalMcpError::InvalidDate(input.to_string());

        // 1. Explicit offset or UTC marker
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Ok(dt.with_timezone(&Utc));
            }
        }

        // 2. Date and time, no offset
        if has_time_part(s) {
            let naive = NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .ok_or_else(invalid)?;
            return self.zone.localize(naive).ok_or_else(invalid);
        }

        // 3. Date only
        if s.len() == 10 && s.contains('-') {
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid())?;
            return self.zone.start_of_day(date).map_err(|_| invalid());
        }

        // 4. Time only
        if !s.contains('-') && s.contains(':') {
            let time = parse_time_only(s).ok_or_else(invalid)?;
            let today = self.zone.today(now);
            return self.zone.localize(today.and_time(time)).ok_or_else(invalid);
        }

        Err(invalid())
    }
}

/// A date followed by a time, separated by `T` or a space.
fn has_time_part(s: &str) -> bool {
    s.contains('T') || (s.len() > 10 && s.as_bytes()[10] == b' ')
}

fn parse_time_only(s: &str) -> Option<NaiveTime> {
    match s.split(':').count() {
        2 => NaiveTime::parse_from_str(s, "%H:%M").ok(),
        3 => NaiveTime::parse_from_str(s, "%H:%M:%S").ok(),
        _ => None,
    }
}
