//! Contracts for the collaborators the engine reads from and writes to.
//!
//! Every method is a single round trip. Each write is atomic on its own; the
//! service serialises check-then-write spans per venue on top of that.

use crate::error::StoreResult;
use crate::model::{
    CourseId, PersistedSchedule, ScheduleException, ScheduleId, Semester, SemesterTerm, VenueId,
};

/// Existence lookups for the entities a schedule references.
pub trait Catalog: Send + Sync {
    fn course_exists(&self, id: CourseId) -> StoreResult<bool>;

    fn venue_exists(&self, id: VenueId) -> StoreResult<bool>;

    /// Find the semester with the given session label and term.
    fn find_semester(&self, session: &str, term: SemesterTerm) -> StoreResult<Option<Semester>>;
}

/// Durable storage for schedules and their exceptions.
pub trait ScheduleStore: Send + Sync {
    fn fetch_schedule(&self, id: ScheduleId) -> StoreResult<Option<PersistedSchedule>>;

    fn fetch_schedules_for_venue(&self, venue_id: VenueId) -> StoreResult<Vec<PersistedSchedule>>;

    /// Fetch every exception belonging to any of `schedule_ids` in one call.
    fn fetch_exceptions_for_schedules(
        &self,
        schedule_ids: &[ScheduleId],
    ) -> StoreResult<Vec<ScheduleException>>;

    /// Insert a new schedule. Fails with `StoreError::Duplicate` if the id is taken.
    fn insert_schedule(&self, schedule: PersistedSchedule) -> StoreResult<()>;

    /// Replace a schedule wholesale. Returns `false` if it no longer exists.
    fn replace_schedule(&self, schedule: PersistedSchedule) -> StoreResult<bool>;

    /// Delete a schedule together with its exceptions. Returns `false` if absent.
    fn delete_schedule(&self, id: ScheduleId) -> StoreResult<bool>;

    /// Insert an exception. Fails with `StoreError::Duplicate` if the
    /// `(schedule, date)` pair already has one.
    fn insert_exception(&self, exception: ScheduleException) -> StoreResult<()>;
}
