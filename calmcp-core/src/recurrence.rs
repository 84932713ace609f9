//! Recurrence rules: caller-facing description, stored RRULE form, and
//! expansion of a series into occurrences.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::MAX_OCCURRENCES;
use crate::date_range::DateRange;
use crate::dates::DateParser;
use crate::error::{CalMcpError, CalMcpResult};

const UNTIL_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Weekday tokens indexed by `day - 1`, where 1 is Sunday.
const WEEKDAY_TOKENS: [&str; 7] = ["SU", "MO", "TU", "WE", "TH", "FR", "SA"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    fn rrule_token(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    fn from_rrule_token(token: &str) -> Option<Self> {
        match token {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = CalMcpError;

    fn from_str(s: &str) -> CalMcpResult<Self> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(CalMcpError::InvalidParameter(format!(
                "recurrence frequency must be daily, weekly, monthly or yearly, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceEnd {
    Never,
    Until(DateTime<Utc>),
    Count(u32),
}

/// A validated recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    /// 1 = Sunday through 7 = Saturday.
    pub days_of_week: Vec<u8>,
    /// 1..=31, or -31..=-1 counting back from the end of the month.
    pub days_of_month: Vec<i8>,
    pub end: RecurrenceEnd,
    /// IANA zone whose wall clock the series repeats on. `None` repeats in UTC.
    pub tzid: Option<String>,
}

/// Recurrence as callers send it.
#[derive(Debug, Clone, Deserialize)]
pub struct RecurrenceInput {
    pub frequency: String,
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub occurrence_count: Option<u32>,
    #[serde(default)]
    pub days_of_week: Option<Vec<u8>>,
    #[serde(default)]
    pub days_of_month: Option<Vec<i8>>,
}

impl RecurrenceInput {
    pub fn into_rule(self, parser: &DateParser) -> CalMcpResult<RecurrenceRule> {
        let frequency: Frequency = self.frequency.parse()?;

        let interval = self.interval.unwrap_or(1);
        if interval == 0 {
            return Err(CalMcpError::InvalidParameter(
                "recurrence interval must be at least 1".into(),
            ));
        }

        let end = match (self.end_date, self.occurrence_count) {
            (Some(_), Some(_)) => {
                return Err(CalMcpError::InvalidParameter(
                    "recurrence takes either end_date or occurrence_count, not both".into(),
                ));
            }
            (Some(date), None) => RecurrenceEnd::Until(parser.parse(&date)?),
            (None, Some(0)) => {
                return Err(CalMcpError::InvalidParameter(
                    "recurrence occurrence_count must be at least 1".into(),
                ));
            }
            (None, Some(count)) => RecurrenceEnd::Count(count),
            (None, None) => RecurrenceEnd::Never,
        };

        let days_of_week = self.days_of_week.unwrap_or_default();
        if let Some(day) = days_of_week.iter().find(|d| !(1..=7).contains(*d)) {
            return Err(CalMcpError::InvalidParameter(format!(
                "days_of_week values run from 1 (Sunday) to 7 (Saturday), got {day}"
            )));
        }

        let days_of_month = self.days_of_month.unwrap_or_default();
        if let Some(day) = days_of_month
            .iter()
            .find(|d| **d == 0 || !(-31..=31).contains(*d))
        {
            return Err(CalMcpError::InvalidParameter(format!(
                "days_of_month values run from 1 to 31 or -31 to -1, got {day}"
            )));
        }

        Ok(RecurrenceRule {
            frequency,
            interval,
            days_of_week,
            days_of_month,
            end,
            tzid: parser.zone().iana_name(),
        })
    }
}

/// Recurrence as the store keeps it: an RFC 5545 RRULE value plus the
/// starts of excluded occurrences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRule {
    pub rrule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tzid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exdates: Vec<DateTime<Utc>>,
}

impl RecurrenceRule {
    /// Encode as an RRULE. Day-of-week sets only apply to weekly rules and
    /// day-of-month sets only to monthly ones; any other combination is
    /// accepted and dropped.
    pub fn to_store_rule(&self) -> StoreRule {
        let mut parts = vec![
            format!("FREQ={}", self.frequency.rrule_token()),
            format!("INTERVAL={}", self.interval),
        ];

        if !self.days_of_week.is_empty() {
            if self.frequency == Frequency::Weekly {
                let days: Vec<&str> = self
                    .days_of_week
                    .iter()
                    .map(|d| WEEKDAY_TOKENS[(*d as usize - 1) % 7])
                    .collect();
                parts.push(format!("BYDAY={}", days.join(",")));
            } else {
                tracing::debug!(frequency = %self.frequency, "Ignoring days_of_week on non-weekly rule");
            }
        }

        if !self.days_of_month.is_empty() {
            if self.frequency == Frequency::Monthly {
                let days: Vec<String> = self.days_of_month.iter().map(|d| d.to_string()).collect();
                parts.push(format!("BYMONTHDAY={}", days.join(",")));
            } else {
                tracing::debug!(frequency = %self.frequency, "Ignoring days_of_month on non-monthly rule");
            }
        }

        match self.end {
            RecurrenceEnd::Never => {}
            RecurrenceEnd::Until(until) => parts.push(format!("UNTIL={}", until.format(UNTIL_FORMAT))),
            RecurrenceEnd::Count(count) => parts.push(format!("COUNT={count}")),
        }

        StoreRule {
            rrule: parts.join(";"),
            tzid: self.tzid.clone(),
            exdates: Vec::new(),
        }
    }

    /// Decode a stored RRULE back into its description.
    pub fn describe(rule: &StoreRule) -> CalMcpResult<Self> {
        let bad = |what: &str| CalMcpError::Store(format!("Malformed RRULE '{}': {what}", rule.rrule));

        let mut frequency = None;
        let mut interval = 1;
        let mut days_of_week = Vec::new();
        let mut days_of_month = Vec::new();
        let mut end = RecurrenceEnd::Never;

        for part in rule.rrule.split(';').filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| bad(part))?;
            match key {
                "FREQ" => frequency = Frequency::from_rrule_token(value),
                "INTERVAL" => interval = value.parse().map_err(|_| bad(part))?,
                "BYDAY" => {
                    for token in value.split(',') {
                        let index = WEEKDAY_TOKENS
                            .iter()
                            .position(|t| *t == token)
                            .ok_or_else(|| bad(part))?;
                        days_of_week.push(index as u8 + 1);
                    }
                }
                "BYMONTHDAY" => {
                    for day in value.split(',') {
                        days_of_month.push(day.parse().map_err(|_| bad(part))?);
                    }
                }
                "UNTIL" => {
                    let naive = NaiveDateTime::parse_from_str(value, UNTIL_FORMAT)
                        .map_err(|_| bad(part))?;
                    end = RecurrenceEnd::Until(naive.and_utc());
                }
                "COUNT" => end = RecurrenceEnd::Count(value.parse().map_err(|_| bad(part))?),
                _ => {}
            }
        }

        Ok(RecurrenceRule {
            frequency: frequency.ok_or_else(|| bad("missing FREQ"))?,
            interval,
            days_of_week,
            days_of_month,
            end,
            tzid: rule.tzid.clone(),
        })
    }
}

impl StoreRule {
    /// Stop the series before `occurrence`, keeping the exclusions.
    pub fn truncated_before(&self, occurrence: DateTime<Utc>) -> CalMcpResult<StoreRule> {
        let mut rule = RecurrenceRule::describe(self)?;
        rule.end = RecurrenceEnd::Until(occurrence - Duration::seconds(1));
        let mut truncated = rule.to_store_rule();
        truncated.exdates = self
            .exdates
            .iter()
            .filter(|d| **d < occurrence)
            .copied()
            .collect();
        Ok(truncated)
    }
}

/// DTSTART carries the series zone so BYDAY and daily steps follow local
/// wall-clock time; UNTIL and EXDATE stay in UTC.
fn build_rrule_string(start: DateTime<Utc>, rule: &StoreRule) -> CalMcpResult<String> {
    let dtstart = match &rule.tzid {
        Some(name) => {
            let tz: Tz = name.parse().map_err(|_| {
                CalMcpError::Store(format!("Unknown TZID '{name}' on RRULE '{}'", rule.rrule))
            })?;
            format!(
                "DTSTART;TZID={name}:{}",
                start.with_timezone(&tz).format(LOCAL_FORMAT)
            )
        }
        None => format!("DTSTART:{}", start.format(UNTIL_FORMAT)),
    };

    let mut lines = vec![dtstart, format!("RRULE:{}", rule.rrule)];
    for exdate in &rule.exdates {
        lines.push(format!("EXDATE:{}", exdate.format(UNTIL_FORMAT)));
    }
    Ok(lines.join("\n"))
}

fn rrule_set(start: DateTime<Utc>, rule: &StoreRule) -> CalMcpResult<RRuleSet> {
    build_rrule_string(start, rule)?
        .parse()
        .map_err(|e| CalMcpError::Store(format!("Failed to parse RRULE '{}': {e}", rule.rrule)))
}

/// Starts of the occurrences of a series beginning at `start` whose
/// `[occurrence, occurrence + duration)` shows up in `range`.
pub fn expand_occurrences(
    start: DateTime<Utc>,
    duration: Duration,
    rule: &StoreRule,
    range: &DateRange,
) -> CalMcpResult<Vec<DateTime<Utc>>> {
    let rrule_set = rrule_set(start, rule)?;

    // after/before are exclusive, so widen by a second on each side
    let tz: rrule::Tz = Utc.into();
    let after = (range.start - duration - Duration::seconds(1)).with_timezone(&tz);
    let before = (range.end + Duration::seconds(1)).with_timezone(&tz);

    let result = rrule_set.after(after).before(before).all(MAX_OCCURRENCES);

    Ok(result
        .dates
        .iter()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|occ| range.overlaps(*occ, *occ + duration))
        .collect())
}

/// The first occurrence of a series, honoring its exclusions.
pub fn first_occurrence(start: DateTime<Utc>, rule: &StoreRule) -> CalMcpResult<Option<DateTime<Utc>>> {
    let rrule_set = rrule_set(start, rule)?;
    Ok(rrule_set.all(1).dates.first().map(|dt| dt.with_timezone(&Utc)))
}
