//! Structured recurrence rules.
//!
//! A [`RecurrenceRule`] describes cadence only: how often, on which days, and
//! when to stop. Where the cadence is placed on the calendar comes from the
//! schedule's start time and bounding window (see [`crate::expander`]).
//!
//! Rules are parsed from, and rendered to, RFC 5545 RRULE text such as
//! `FREQ=WEEKLY;INTERVAL=1;BYDAY=MO,WE`. Parsing validates everything up front,
//! so a `RecurrenceRule` value is always well-formed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimetableError};

const UNTIL_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Recurrence frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = TimetableError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            other => Err(invalid(format!("unsupported frequency '{}'", other))),
        }
    }
}

/// When a recurrence stops. `Count` and `Until` are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// Run until the end of the bounding window.
    Window,
    /// Stop after this many occurrences.
    Count(u32),
    /// Stop after this instant (inclusive).
    Until(DateTime<Utc>),
}

/// A validated recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecurrenceRule {
    frequency: Frequency,
    interval: u32,
    stop: Stop,
    by_weekday: Vec<Weekday>,
    by_month_day: Vec<i8>,
}

impl RecurrenceRule {
    /// Start building a rule with the given frequency.
    pub fn builder(frequency: Frequency) -> RuleBuilder {
        RuleBuilder {
            frequency,
            interval: 1,
            stop: Stop::Window,
            by_weekday: Vec::new(),
            by_month_day: Vec::new(),
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn stop(&self) -> Stop {
        self.stop
    }

    /// Weekday filter, Monday first. Empty means no filter.
    pub fn by_weekday(&self) -> &[Weekday] {
        &self.by_weekday
    }

    /// Month-day filter, ascending. Negative values count from month end.
    pub fn by_month_day(&self) -> &[i8] {
        &self.by_month_day
    }

    /// Whether `date` passes the rule's day filters.
    pub fn admits(&self, date: NaiveDate) -> bool {
        let weekday_ok = self.by_weekday.is_empty() || self.by_weekday.contains(&date.weekday());
        let month_day_ok = self.by_month_day.is_empty()
            || self
                .by_month_day
                .iter()
                .any(|&d| resolve_month_day(date, d) == Some(date.day()));
        weekday_ok && month_day_ok
    }

    /// RRULE parts describing cadence and filters, without any stop condition.
    pub(crate) fn cadence_parts(&self) -> Vec<String> {
        let mut parts = vec![
            format!("FREQ={}", self.frequency.as_str()),
            format!("INTERVAL={}", self.interval),
        ];
        if !self.by_weekday.is_empty() {
            let days: Vec<&str> = self.by_weekday.iter().map(|d| weekday_token(*d)).collect();
            parts.push(format!("BYDAY={}", days.join(",")));
        }
        if !self.by_month_day.is_empty() {
            let days: Vec<String> = self.by_month_day.iter().map(|d| d.to_string()).collect();
            parts.push(format!("BYMONTHDAY={}", days.join(",")));
        }
        parts
    }
}

/// Builder for [`RecurrenceRule`]; validation happens in [`RuleBuilder::build`].
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    frequency: Frequency,
    interval: u32,
    stop: Stop,
    by_weekday: Vec<Weekday>,
    by_month_day: Vec<i8>,
}

impl RuleBuilder {
    pub fn interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.stop = Stop::Count(count);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.stop = Stop::Until(until);
        self
    }

    pub fn on_weekdays(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.by_weekday.extend(days);
        self
    }

    pub fn on_month_days(mut self, days: impl IntoIterator<Item = i8>) -> Self {
        self.by_month_day.extend(days);
        self
    }

    /// Validate and produce the rule.
    ///
    /// # Errors
    /// Returns `TimetableError::Validation` for a zero interval, a month day
    /// outside `-31..=-1` / `1..=31`, or a month-day filter on a weekly rule.
    pub fn build(self) -> Result<RecurrenceRule> {
        if self.interval == 0 {
            return Err(invalid("INTERVAL must be at least 1"));
        }

        let mut by_weekday = self.by_weekday;
        by_weekday.sort_by_key(|d| d.num_days_from_monday());
        by_weekday.dedup();

        let mut by_month_day = self.by_month_day;
        if let Some(bad) = by_month_day.iter().find(|d| **d == 0 || d.abs() > 31) {
            return Err(invalid(format!("BYMONTHDAY value {} out of range", bad)));
        }
        if !by_month_day.is_empty() && self.frequency == Frequency::Weekly {
            return Err(invalid("BYMONTHDAY cannot be combined with FREQ=WEEKLY"));
        }
        by_month_day.sort_unstable();
        by_month_day.dedup();

        Ok(RecurrenceRule {
            frequency: self.frequency,
            interval: self.interval,
            stop: self.stop,
            by_weekday,
            by_month_day,
        })
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = self.cadence_parts();
        let stop = match self.stop {
            Stop::Window => None,
            Stop::Count(n) => Some(format!("COUNT={}", n)),
            Stop::Until(until) => Some(format!("UNTIL={}", until.format(UNTIL_FORMAT))),
        };
        // Canonical order: FREQ, INTERVAL, stop condition, filters.
        if let Some(stop) = stop {
            parts.insert(2, stop);
        }
        f.write_str(&parts.join(";"))
    }
}

impl FromStr for RecurrenceRule {
    type Err = TimetableError;

    /// Parse RRULE text, with or without a leading `RRULE:`.
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let text = match text.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("RRULE:") => &text[6..],
            _ => text,
        };
        if text.is_empty() {
            return Err(invalid("empty RRULE string"));
        }

        let mut frequency = None;
        let mut interval = None;
        let mut count = None;
        let mut until = None;
        let mut by_weekday = None;
        let mut by_month_day = None;

        for part in text.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("malformed rule part '{}'", part)))?;
            let key = key.trim().to_ascii_uppercase();
            let value = value.trim();
            match key.as_str() {
                "FREQ" => set_once(&mut frequency, &key, value.parse::<Frequency>()?)?,
                "INTERVAL" => set_once(&mut interval, &key, parse_number::<u32>(&key, value)?)?,
                "COUNT" => set_once(&mut count, &key, parse_number::<u32>(&key, value)?)?,
                "UNTIL" => set_once(&mut until, &key, parse_until(value)?)?,
                "BYDAY" => set_once(&mut by_weekday, &key, parse_weekdays(value)?)?,
                "BYMONTHDAY" => set_once(&mut by_month_day, &key, parse_month_days(value)?)?,
                other => return Err(invalid(format!("unsupported rule part '{}'", other))),
            }
        }

        let frequency = frequency.ok_or_else(|| invalid("missing FREQ"))?;
        let mut builder = RecurrenceRule::builder(frequency)
            .interval(interval.unwrap_or(1))
            .on_weekdays(by_weekday.unwrap_or_default())
            .on_month_days(by_month_day.unwrap_or_default());
        builder = match (count, until) {
            (Some(_), Some(_)) => return Err(invalid("COUNT and UNTIL are mutually exclusive")),
            (Some(n), None) => builder.count(n),
            (None, Some(u)) => builder.until(u),
            (None, None) => builder,
        };
        builder.build()
    }
}

impl TryFrom<String> for RecurrenceRule {
    type Error = TimetableError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecurrenceRule> for String {
    fn from(rule: RecurrenceRule) -> Self {
        rule.to_string()
    }
}

pub(crate) fn weekday_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn invalid(message: impl Into<String>) -> TimetableError {
    TimetableError::Validation(format!("Invalid RRULE: {}", message.into()))
}

fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> Result<()> {
    if slot.is_some() {
        return Err(invalid(format!("{} given more than once", key)));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| invalid(format!("{} value '{}' is not a valid number", key, value)))
}

/// `UNTIL` accepts `YYYYMMDDTHHMMSSZ`, a floating `YYYYMMDDTHHMMSS` (read as
/// UTC), or a bare `YYYYMMDD` (start of that day, UTC).
fn parse_until(value: &str) -> Result<DateTime<Utc>> {
    let bare = value.strip_suffix('Z').unwrap_or(value);
    if let Ok(dt) = NaiveDateTime::parse_from_str(bare, "%Y%m%dT%H%M%S") {
        return Ok(dt.and_utc());
    }
    NaiveDate::parse_from_str(bare, "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| invalid(format!("UNTIL value '{}' is not a valid date-time", value)))
}

fn parse_weekdays(value: &str) -> Result<Vec<Weekday>> {
    value
        .split(',')
        .map(|token| match token.trim().to_ascii_uppercase().as_str() {
            "MO" => Ok(Weekday::Mon),
            "TU" => Ok(Weekday::Tue),
            "WE" => Ok(Weekday::Wed),
            "TH" => Ok(Weekday::Thu),
            "FR" => Ok(Weekday::Fri),
            "SA" => Ok(Weekday::Sat),
            "SU" => Ok(Weekday::Sun),
            other => Err(invalid(format!("unsupported BYDAY value '{}'", other))),
        })
        .collect()
}

fn parse_month_days(value: &str) -> Result<Vec<i8>> {
    value
        .split(',')
        .map(|token| parse_number::<i8>("BYMONTHDAY", token.trim()))
        .collect()
}

/// Resolve a possibly negative month-day against the month containing `date`.
fn resolve_month_day(date: NaiveDate, day: i8) -> Option<u32> {
    if day > 0 {
        return Some(day as u32);
    }
    let days_in_month = days_in_month(date)?;
    let resolved = i64::from(days_in_month) + 1 + i64::from(day);
    u32::try_from(resolved).ok().filter(|d| *d >= 1)
}

fn days_in_month(date: NaiveDate) -> Option<u32> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(year, month, 1)?;
    first_of_next.pred_opt().map(|d| d.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_day_of_month_resolves() {
        let feb = NaiveDate::from_ymd_opt(2028, 2, 29).unwrap();
        assert_eq!(resolve_month_day(feb, -1), Some(29));
        let apr = NaiveDate::from_ymd_opt(2026, 4, 10).unwrap();
        assert_eq!(resolve_month_day(apr, -1), Some(30));
        assert_eq!(resolve_month_day(apr, -31), None);
    }

    #[test]
    fn days_in_december_wraps_year() {
        let dec = NaiveDate::from_ymd_opt(2025, 12, 5).unwrap();
        assert_eq!(days_in_month(dec), Some(31));
    }
}
