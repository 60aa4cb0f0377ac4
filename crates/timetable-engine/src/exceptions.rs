//! Per-occurrence exception lookup.
//!
//! The index is built once per conflict check from a single bulk fetch and
//! answers "is this occurrence of this schedule excepted?" in O(1).

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::model::{ScheduleException, ScheduleId, VenueId};

/// What an exception does to the occurrence it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    /// The occurrence does not take place.
    Cancelled,
    /// The occurrence moves away from its original venue. Where it lands is
    /// not tracked; it only vacates the original slot.
    Rescheduled { new_venue_id: Option<VenueId> },
}

/// Exceptions keyed by `(schedule, occurrence date)`.
#[derive(Debug, Clone, Default)]
pub struct ExceptionIndex {
    entries: HashMap<(ScheduleId, NaiveDate), ExceptionKind>,
}

impl ExceptionIndex {
    /// Index the exceptions belonging to `schedule_ids`.
    ///
    /// Exceptions for other schedules, and records carrying neither flag, are
    /// ignored. If one `(schedule, date)` pair appears twice, cancellation wins.
    pub fn build<'a>(
        schedule_ids: &HashSet<ScheduleId>,
        exceptions: impl IntoIterator<Item = &'a ScheduleException>,
    ) -> Self {
        let mut entries = HashMap::new();
        for exc in exceptions {
            if !schedule_ids.contains(&exc.schedule_id) {
                continue;
            }
            let kind = if exc.is_cancelled {
                ExceptionKind::Cancelled
            } else if exc.is_rescheduled {
                ExceptionKind::Rescheduled {
                    new_venue_id: exc.new_venue_id,
                }
            } else {
                tracing::debug!(
                    schedule_id = %exc.schedule_id,
                    date = %exc.exception_date,
                    "ignoring exception with no effect"
                );
                continue;
            };

            let key = (exc.schedule_id, exc.exception_date);
            match entries.get(&key) {
                Some(ExceptionKind::Cancelled) => {}
                Some(_) => {
                    tracing::warn!(
                        schedule_id = %exc.schedule_id,
                        date = %exc.exception_date,
                        "duplicate exception for the same occurrence"
                    );
                    if kind == ExceptionKind::Cancelled {
                        entries.insert(key, kind);
                    }
                }
                None => {
                    entries.insert(key, kind);
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, schedule_id: ScheduleId, date: NaiveDate) -> Option<ExceptionKind> {
        self.entries.get(&(schedule_id, date)).copied()
    }

    pub fn is_cancelled(&self, schedule_id: ScheduleId, date: NaiveDate) -> bool {
        self.get(schedule_id, date) == Some(ExceptionKind::Cancelled)
    }

    pub fn is_rescheduled(&self, schedule_id: ScheduleId, date: NaiveDate) -> bool {
        matches!(
            self.get(schedule_id, date),
            Some(ExceptionKind::Rescheduled { .. })
        )
    }

    /// Whether the occurrence no longer occupies its original venue.
    pub fn vacates(&self, schedule_id: ScheduleId, date: NaiveDate) -> bool {
        self.get(schedule_id, date).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
