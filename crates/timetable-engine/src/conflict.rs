//! Detect venue double-booking between a candidate schedule and the schedules
//! already stored for the same venue.
//!
//! Existing schedules are expanded over their own bounding windows, excepted
//! occurrences are dropped, and every remaining occurrence is compared against
//! every candidate occurrence. Adjacent occurrences (one ends exactly when the
//! other starts) are NOT conflicts. The earliest conflicting candidate
//! occurrence is reported and the scan stops there.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError, TimetableError};
use crate::exceptions::ExceptionIndex;
use crate::expander::{Expander, Occurrence};
use crate::model::{PersistedSchedule, ScheduleId, VenueId};

/// A closed-open time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl From<&Occurrence> for TimeRange {
    fn from(o: &Occurrence) -> Self {
        Self {
            start: o.start,
            end: o.end,
        }
    }
}

/// Details of the first overlap found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDescriptor {
    /// The stored schedule whose occurrence is overlapped.
    pub schedule_id: ScheduleId,
    /// Local date of the overlapped occurrence.
    pub date: NaiveDate,
    /// Wall-clock start and end of the overlapped occurrence in the engine's zone.
    pub local_start: NaiveTime,
    pub local_end: NaiveTime,
    pub existing: TimeRange,
    pub candidate: TimeRange,
    pub overlap_minutes: i64,
}

impl fmt::Display for ConflictDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timetable conflict with existing timetable {} on {} from {} to {}",
            self.schedule_id,
            self.date.format("%Y-%m-%d"),
            self.local_start.format("%H:%M"),
            self.local_end.format("%H:%M"),
        )
    }
}

/// Overlap duration in minutes; zero or negative when the ranges don't overlap.
pub fn overlap_minutes(a: &Occurrence, b: &Occurrence) -> i64 {
    let overlap_start = a.start.max(b.start);
    let overlap_end = a.end.min(b.end);
    (overlap_end - overlap_start).num_minutes()
}

/// Scans a venue's stored schedules for overlaps with a candidate.
#[derive(Debug, Clone, Copy)]
pub struct ConflictDetector<'a> {
    expander: &'a Expander,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(expander: &'a Expander) -> Self {
        Self { expander }
    }

    /// Find the first conflict between `candidates` and the occurrences of the
    /// `existing` schedules bound to `venue_id`.
    ///
    /// Schedules bound to other venues are skipped. Occurrences vacated by an
    /// exception in `exceptions` never conflict.
    ///
    /// # Errors
    /// Returns `TimetableError::Storage` if a stored schedule cannot be
    /// expanded. A broken record is never treated as "no conflict".
    pub fn find_conflict(
        &self,
        venue_id: VenueId,
        candidates: &[Occurrence],
        existing: &[PersistedSchedule],
        exceptions: &ExceptionIndex,
    ) -> Result<Option<ConflictDescriptor>> {
        let occupied = self.occupied(venue_id, existing, exceptions)?;
        tracing::debug!(
            venue_id = %venue_id,
            candidates = candidates.len(),
            occupied = occupied.len(),
            "scanning for conflicts"
        );

        let mut ordered: Vec<&Occurrence> = candidates.iter().collect();
        ordered.sort_by_key(|o| o.start);

        for candidate in ordered {
            for (schedule_id, occurrence) in &occupied {
                if candidate.overlaps(occurrence) {
                    let zone = self.expander.zone();
                    return Ok(Some(ConflictDescriptor {
                        schedule_id: *schedule_id,
                        date: occurrence.date,
                        local_start: zone.local(occurrence.start).time(),
                        local_end: zone.local(occurrence.end).time(),
                        existing: occurrence.into(),
                        candidate: candidate.into(),
                        overlap_minutes: overlap_minutes(candidate, occurrence),
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Every non-vacated occurrence of the venue's stored schedules.
    fn occupied(
        &self,
        venue_id: VenueId,
        existing: &[PersistedSchedule],
        exceptions: &ExceptionIndex,
    ) -> Result<Vec<(ScheduleId, Occurrence)>> {
        let mut occupied = Vec::new();
        for schedule in existing.iter().filter(|s| s.venue_id == venue_id) {
            let occurrences = schedule
                .spec()
                .and_then(|spec| self.expander.expand(&spec))
                .map_err(|e| corrupt(schedule.id, e))?;

            let before = occurrences.len();
            occupied.extend(
                occurrences
                    .into_iter()
                    .filter(|o| !exceptions.vacates(schedule.id, o.date))
                    .map(|o| (schedule.id, o)),
            );
            tracing::debug!(
                schedule_id = %schedule.id,
                expanded = before,
                "expanded existing schedule"
            );
        }
        Ok(occupied)
    }
}

pub(crate) fn corrupt(schedule_id: ScheduleId, cause: TimetableError) -> TimetableError {
    tracing::error!(
        schedule_id = %schedule_id,
        error = %cause,
        "stored schedule cannot be expanded"
    );
    TimetableError::Storage(StoreError::Corrupt {
        schedule_id,
        reason: cause.to_string(),
    })
}
