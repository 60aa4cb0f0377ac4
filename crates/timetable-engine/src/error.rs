//! Error types for timetable-engine operations.

use std::fmt;

use thiserror::Error;

use crate::conflict::ConflictDescriptor;
use crate::model::ScheduleId;

/// The kind of entity a [`TimetableError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Course,
    Venue,
    Semester,
    Schedule,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Course => "Course",
            Entity::Venue => "Venue",
            Entity::Semester => "Semester",
            Entity::Schedule => "Timetable",
        };
        f.write_str(name)
    }
}

/// Errors raised by the schedule storage collaborators.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A persisted record holds data the engine cannot interpret.
    #[error("corrupt schedule {schedule_id}: {reason}")]
    Corrupt {
        schedule_id: ScheduleId,
        reason: String,
    },

    /// A uniqueness constraint rejected the write.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

/// Errors returned by the timetable engine.
#[derive(Error, Debug)]
pub enum TimetableError {
    /// Malformed rule, non-positive duration, inverted date range.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced course, venue, semester or schedule does not exist.
    #[error("{entity} {id} does not exist")]
    NotFound { entity: Entity, id: String },

    /// An occurrence overlaps a non-cancelled occurrence in the same venue.
    #[error("{0}")]
    Conflict(Box<ConflictDescriptor>),

    /// Persistence failure. The message is deliberately opaque; the cause is
    /// kept as the error source and logged where the failure is observed.
    #[error("internal storage failure")]
    Storage(#[source] StoreError),
}

impl TimetableError {
    pub(crate) fn not_found(entity: Entity, id: impl ToString) -> Self {
        TimetableError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns `true` for errors caused by the caller's input rather than by
    /// the operator's infrastructure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, TimetableError::Storage(_))
    }
}

impl From<StoreError> for TimetableError {
    fn from(err: StoreError) -> Self {
        TimetableError::Storage(err)
    }
}

pub type Result<T> = std::result::Result<T, TimetableError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
