//! Read-side view of a schedule as the list of class sessions it produces.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::exceptions::ExceptionIndex;
use crate::expander::Occurrence;
use crate::model::{PersistedSchedule, ScheduleId};
use crate::zone::Zone;

/// One class meeting, in local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSession {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// A schedule together with the sessions that actually take place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub schedule: PersistedSchedule,
    pub sessions: Vec<ClassSession>,
    pub session_count: usize,
}

impl TimetableEntry {
    /// Build the entry, dropping occurrences vacated by an exception.
    pub fn new(
        schedule: PersistedSchedule,
        occurrences: &[Occurrence],
        exceptions: &ExceptionIndex,
        zone: Zone,
    ) -> Self {
        let sessions = sessions(schedule.id, occurrences, exceptions, zone);
        Self {
            session_count: sessions.len(),
            schedule,
            sessions,
        }
    }
}

fn sessions(
    schedule_id: ScheduleId,
    occurrences: &[Occurrence],
    exceptions: &ExceptionIndex,
    zone: Zone,
) -> Vec<ClassSession> {
    occurrences
        .iter()
        .filter(|o| !exceptions.vacates(schedule_id, o.date))
        .map(|o| ClassSession {
            date: o.date,
            start_time: zone.local(o.start).time(),
            end_time: zone.local(o.end).time(),
        })
        .collect()
}
