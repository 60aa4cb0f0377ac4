//! Recurrence expansion -- turns a schedule spec into concrete occurrences.
//!
//! Wraps the `rrule` crate (v0.13). The rule supplies cadence; the spec's
//! bounding window supplies placement: the expansion anchor is always the
//! window's first day at the schedule's start time, and only occurrences that
//! begin inside the closed window `[window_start, window_end]` are returned.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimetableError};
use crate::model::ScheduleSpec;
use crate::options::EngineOptions;
use crate::rule::Stop;
use crate::zone::Zone;

/// Default cap on the number of occurrences a single expansion may produce.
pub const DEFAULT_MAX_OCCURRENCES: u16 = 1000;

const ICAL_LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
const ICAL_UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// A single concrete occurrence of a recurring schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Local calendar date of the occurrence; exceptions are keyed on it.
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Occurrence {
    /// Half-open overlap test: intervals that merely touch do not overlap.
    pub fn overlaps(&self, other: &Occurrence) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Expands schedule specs in a fixed zone with a fixed size cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expander {
    zone: Zone,
    max_occurrences: u16,
}

impl Default for Expander {
    fn default() -> Self {
        Self {
            zone: Zone::UTC,
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
        }
    }
}

impl Expander {
    /// # Errors
    /// Returns `TimetableError::Validation` if `max_occurrences` is zero.
    pub fn new(zone: Zone, max_occurrences: u16) -> Result<Self> {
        if max_occurrences == 0 {
            return Err(TimetableError::Validation(
                "max_occurrences must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            zone,
            max_occurrences,
        })
    }

    /// Build an expander from engine options.
    ///
    /// # Errors
    /// Returns `TimetableError::Validation` if the configured timezone is unknown
    /// or the occurrence cap is zero.
    pub fn from_options(options: &EngineOptions) -> Result<Self> {
        Self::new(Zone::parse(&options.timezone)?, options.max_occurrences)
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn max_occurrences(&self) -> u16 {
        self.max_occurrences
    }

    /// Expand `spec` into its occurrences, ascending by start.
    ///
    /// The result is a pure function of the spec and the expander settings.
    ///
    /// # Errors
    /// Returns `TimetableError::Validation` if the spec is invalid, the rule is
    /// rejected by the recurrence engine, or the window holds more occurrences
    /// than the configured cap.
    pub fn expand(&self, spec: &ScheduleSpec) -> Result<Vec<Occurrence>> {
        spec.validate()?;

        // Short-circuit: the rule explicitly asks for zero instances.
        if spec.rule.stop() == Stop::Count(0) {
            return Ok(Vec::new());
        }

        let window_start = self.zone.start_of_day(spec.window_start);
        let day_after = spec.window_end.succ_opt().ok_or_else(|| {
            TimetableError::Validation(format!("window end {} is out of range", spec.window_end))
        })?;
        let window_end = self.zone.start_of_day(day_after);
        let anchor = self.zone.combine(spec.window_start, spec.start_time);

        // The window always bounds the expansion; an explicit UNTIL may only
        // shorten it.
        let last_instant = window_end - Duration::seconds(1);
        let until = match spec.rule.stop() {
            Stop::Count(_) => None,
            Stop::Until(until) => Some(until.min(last_instant)),
            Stop::Window => Some(last_instant),
        };
        if until.is_some_and(|u| u < anchor) {
            return Ok(Vec::new());
        }

        let rrule_text = self.rrule_text(spec, anchor, until);
        let rrule_set: RRuleSet = rrule_text
            .parse()
            .map_err(|e| TimetableError::Validation(format!("Invalid RRULE: {}", e)))?;

        let limit = self.max_occurrences.saturating_add(1);
        let raw = rrule_set.all(limit).dates;

        // Hitting the limit is only a problem if the cut happened inside the window.
        if raw.len() >= usize::from(limit) {
            if let Some(last) = raw.last() {
                if last.with_timezone(&Utc) < window_end {
                    return Err(TimetableError::Validation(format!(
                        "recurrence produces more than {} occurrences in {}..={}",
                        self.max_occurrences, spec.window_start, spec.window_end
                    )));
                }
            }
        }

        let duration = spec.duration();
        let mut occurrences: Vec<Occurrence> = raw
            .into_iter()
            .filter_map(|dt| {
                let start = dt.with_timezone(&Utc);
                let date = dt.date_naive();
                let inside = start >= window_start && start < window_end;
                (inside && spec.rule.admits(date)).then(|| Occurrence {
                    date,
                    start,
                    end: start + duration,
                })
            })
            .collect();

        occurrences.sort_by_key(|o| o.start);
        occurrences.dedup_by_key(|o| o.start);

        tracing::debug!(
            rule = %spec.rule,
            window_start = %spec.window_start,
            window_end = %spec.window_end,
            count = occurrences.len(),
            "expanded recurrence"
        );
        Ok(occurrences)
    }

    /// Build the iCalendar text block handed to the `rrule` crate.
    ///
    /// DTSTART carries the configured zone as TZID. UNTIL is always written in
    /// UTC with a "Z" suffix, the only form the crate accepts alongside a TZID.
    fn rrule_text(
        &self,
        spec: &ScheduleSpec,
        anchor: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> String {
        let mut parts = spec.rule.cadence_parts();
        match spec.rule.stop() {
            Stop::Count(n) => parts.push(format!("COUNT={}", n)),
            Stop::Until(_) | Stop::Window => {
                if let Some(until) = until {
                    parts.push(format!("UNTIL={}", until.format(ICAL_UTC_FORMAT)));
                }
            }
        }

        format!(
            "DTSTART;TZID={}:{}\nRRULE:{}",
            self.zone.name(),
            self.zone.local(anchor).format(ICAL_LOCAL_FORMAT),
            parts.join(";")
        )
    }
}

/// Expand `spec` in UTC with the default occurrence cap.
///
/// # Errors
/// See [`Expander::expand`].
pub fn expand(spec: &ScheduleSpec) -> Result<Vec<Occurrence>> {
    Expander::default().expand(spec)
}
