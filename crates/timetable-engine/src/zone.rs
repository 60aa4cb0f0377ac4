//! Normalisation of naive wall-clock input to UTC instants.
//!
//! Every naive date or time that enters the engine is turned into a
//! `DateTime<Utc>` here and nowhere else. Downstream comparisons only ever see
//! normalised instants.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Result, TimetableError};

/// Longest stretch of wall-clock time a DST gap can remove.
const MAX_GAP_MINUTES: i64 = 180;
const GAP_STEP_MINUTES: i64 = 15;

/// The zone in which naive dates and times are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone(Tz);

impl Default for Zone {
    fn default() -> Self {
        Zone::UTC
    }
}

impl Zone {
    pub const UTC: Zone = Zone(Tz::UTC);

    /// Parse an IANA zone name such as `"Africa/Lagos"`.
    ///
    /// # Errors
    /// Returns `TimetableError::Validation` if the name is not a known zone.
    pub fn parse(name: &str) -> Result<Self> {
        name.parse::<Tz>()
            .map(Zone)
            .map_err(|_| TimetableError::Validation(format!("Invalid timezone: {}", name)))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Normalise a naive wall-clock datetime to UTC.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant. Times
    /// inside a DST gap move forward to the first wall-clock time that exists.
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let mut shift = 0;
        while shift <= MAX_GAP_MINUTES {
            let probe = local + Duration::minutes(shift);
            match self.0.from_local_datetime(&probe) {
                LocalResult::Single(dt) => return dt.with_timezone(&Utc),
                LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
                LocalResult::None => shift += GAP_STEP_MINUTES,
            }
        }
        // No zone in the tz database has a gap this long.
        local.and_utc()
    }

    /// Combine a calendar date with a wall-clock time and normalise.
    pub fn combine(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        self.to_utc(date.and_time(time))
    }

    /// The instant at which `date` begins in this zone.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.combine(date, NaiveTime::MIN)
    }

    /// Wall-clock reading of `instant` in this zone.
    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.0).naive_local()
    }
}
