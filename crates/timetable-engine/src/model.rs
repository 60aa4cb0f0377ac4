//! Identifiers and records shared by every layer of the engine.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TimetableError};
use crate::rule::RecurrenceRule;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Identity of a course that owns schedules.
    CourseId
);
id_type!(
    /// Identity of a venue, the constrained resource conflicts are computed over.
    VenueId
);
id_type!(
    /// Identity of a semester record.
    SemesterId
);
id_type!(
    /// Identity of a persisted schedule.
    ScheduleId
);

/// Which half of an academic session a semester covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemesterTerm {
    FirstSemester,
    SecondSemester,
}

impl fmt::Display for SemesterTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemesterTerm::FirstSemester => f.write_str("first_semester"),
            SemesterTerm::SecondSemester => f.write_str("second_semester"),
        }
    }
}

/// A semester: the bounding window every schedule in it is expanded over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    pub id: SemesterId,
    /// Academic session label, e.g. "2025/2026".
    pub session: String,
    pub term: SemesterTerm,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Everything needed to place a recurring schedule on the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSpec {
    pub venue_id: VenueId,
    /// Wall-clock start of every occurrence.
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub rule: RecurrenceRule,
    /// First day of the bounding window (inclusive).
    pub window_start: NaiveDate,
    /// Last day of the bounding window (inclusive).
    pub window_end: NaiveDate,
}

impl ScheduleSpec {
    /// Build a spec, rejecting a zero duration or an inverted window.
    pub fn new(
        venue_id: VenueId,
        start_time: NaiveTime,
        duration_minutes: u32,
        rule: RecurrenceRule,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Self> {
        let spec = Self {
            venue_id,
            start_time,
            duration_minutes,
            rule,
            window_start,
            window_end,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check the spec's invariants.
    pub fn validate(&self) -> Result<()> {
        validate_duration(self.duration_minutes)?;
        if self.window_start > self.window_end {
            return Err(TimetableError::Validation(format!(
                "window start {} is after window end {}",
                self.window_start, self.window_end
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }
}

pub(crate) fn validate_duration(duration_minutes: u32) -> Result<()> {
    if duration_minutes == 0 {
        return Err(TimetableError::Validation(
            "duration_minutes must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

/// The durable form of a schedule.
///
/// The rule is kept as canonical RRULE text; it is parsed back into a
/// [`RecurrenceRule`] whenever the schedule takes part in a conflict check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSchedule {
    pub id: ScheduleId,
    pub course_id: CourseId,
    pub venue_id: VenueId,
    pub semester_id: SemesterId,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub rrule: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

impl PersistedSchedule {
    /// Rebuild the spec this schedule was created from.
    ///
    /// # Errors
    /// Returns `TimetableError::Validation` if the stored rule text or the
    /// stored window no longer validates.
    pub fn spec(&self) -> Result<ScheduleSpec> {
        let rule: RecurrenceRule = self.rrule.parse()?;
        ScheduleSpec::new(
            self.venue_id,
            self.start_time,
            self.duration_minutes,
            rule,
            self.window_start,
            self.window_end,
        )
    }
}

/// A per-date override of one occurrence of a persisted schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleException {
    pub schedule_id: ScheduleId,
    /// Local calendar date of the affected occurrence.
    pub exception_date: NaiveDate,
    #[serde(default)]
    pub is_cancelled: bool,
    #[serde(default)]
    pub is_rescheduled: bool,
    #[serde(default)]
    pub new_venue_id: Option<VenueId>,
}

impl ScheduleException {
    pub fn cancelled(schedule_id: ScheduleId, exception_date: NaiveDate) -> Self {
        Self {
            schedule_id,
            exception_date,
            is_cancelled: true,
            is_rescheduled: false,
            new_venue_id: None,
        }
    }

    pub fn rescheduled(
        schedule_id: ScheduleId,
        exception_date: NaiveDate,
        new_venue_id: Option<VenueId>,
    ) -> Self {
        Self {
            schedule_id,
            exception_date,
            is_cancelled: false,
            is_rescheduled: true,
            new_venue_id,
        }
    }
}

/// A request to create or replace a schedule, as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub course_id: CourseId,
    pub venue_id: VenueId,
    /// Academic session label of the semester, e.g. "2025/2026".
    pub session: String,
    pub term: SemesterTerm,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub rule: RecurrenceRule,
}
