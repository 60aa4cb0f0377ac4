//! Create, update and delete schedules with conflict checking.
//!
//! Each write runs: existence checks -> candidate expansion -> (venue lock) ->
//! bulk fetch of the venue's schedules and exceptions -> conflict scan ->
//! single atomic write -> (unlock). Expansion happens before the lock is taken;
//! only the read-check-write span is serialised, so two racing requests for
//! the same venue cannot both observe "no conflict" and both commit.

use std::collections::HashSet;

use crate::conflict::{corrupt, ConflictDetector};
use crate::error::{Entity, Result, StoreError, TimetableError};
use crate::exceptions::ExceptionIndex;
use crate::expander::{Expander, Occurrence};
use crate::locks::{lock_all, VenueLocks};
use crate::model::{
    validate_duration, PersistedSchedule, ScheduleException, ScheduleId, ScheduleRequest,
    ScheduleSpec, Semester, VenueId,
};
use crate::options::EngineOptions;
use crate::store::{Catalog, ScheduleStore};
use crate::timetable::TimetableEntry;

/// The transactional front door to the schedule store.
#[derive(Debug)]
pub struct ScheduleService<C, S> {
    catalog: C,
    store: S,
    expander: Expander,
    locks: VenueLocks,
}

impl<C: Catalog, S: ScheduleStore> ScheduleService<C, S> {
    /// # Errors
    /// Returns `TimetableError::Validation` if the options are invalid.
    pub fn new(catalog: C, store: S, options: &EngineOptions) -> Result<Self> {
        Ok(Self::with_expander(
            catalog,
            store,
            Expander::from_options(options)?,
        ))
    }

    pub fn with_expander(catalog: C, store: S, expander: Expander) -> Self {
        Self {
            catalog,
            store,
            expander,
            locks: VenueLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a schedule if none of its occurrences collide with the venue's
    /// existing bookings.
    ///
    /// # Errors
    /// `Validation` for bad input, `NotFound` for a missing course, venue or
    /// semester, `Conflict` on the first overlap, `Storage` on store failure.
    /// Nothing is written unless the call succeeds.
    pub fn create(&self, request: &ScheduleRequest) -> Result<PersistedSchedule> {
        tracing::info!(
            course_id = %request.course_id,
            venue_id = %request.venue_id,
            "creating timetable"
        );
        validate_duration(request.duration_minutes)?;
        let (semester, spec) = self.resolve(request)?;
        let candidates = self.expander.expand(&spec)?;

        let handles = self
            .locks
            .handles(&[spec.venue_id])
            .map_err(|e| storage_failure("lock venue", e))?;
        let _guards = lock_all(&handles).map_err(|e| storage_failure("lock venue", e))?;

        let existing = self
            .store
            .fetch_schedules_for_venue(spec.venue_id)
            .map_err(|e| storage_failure("fetch venue schedules", e))?;
        self.ensure_no_conflict(&spec, &candidates, &existing)?;

        let schedule = persisted(ScheduleId::new(), request, &semester, &spec);
        self.store
            .insert_schedule(schedule.clone())
            .map_err(|e| storage_failure("insert schedule", e))?;

        tracing::info!(
            schedule_id = %schedule.id,
            course_id = %schedule.course_id,
            venue_id = %schedule.venue_id,
            occurrences = candidates.len(),
            "created timetable"
        );
        Ok(schedule)
    }

    /// Replace schedule `id` wholesale, re-running the full check. The
    /// schedule's own previous occurrences never count as conflicts.
    ///
    /// # Errors
    /// As [`ScheduleService::create`], plus `NotFound` if `id` does not exist.
    pub fn update(&self, id: ScheduleId, request: &ScheduleRequest) -> Result<PersistedSchedule> {
        tracing::info!(schedule_id = %id, venue_id = %request.venue_id, "updating timetable");
        validate_duration(request.duration_minutes)?;
        let current = self.get(id)?;
        let (semester, spec) = self.resolve(request)?;
        let candidates = self.expander.expand(&spec)?;

        let handles = self
            .locks
            .handles(&[current.venue_id, spec.venue_id])
            .map_err(|e| storage_failure("lock venue", e))?;
        let _guards = lock_all(&handles).map_err(|e| storage_failure("lock venue", e))?;

        let existing: Vec<PersistedSchedule> = self
            .store
            .fetch_schedules_for_venue(spec.venue_id)
            .map_err(|e| storage_failure("fetch venue schedules", e))?
            .into_iter()
            .filter(|s| s.id != id)
            .collect();
        self.ensure_no_conflict(&spec, &candidates, &existing)?;

        let schedule = persisted(id, request, &semester, &spec);
        let replaced = self
            .store
            .replace_schedule(schedule.clone())
            .map_err(|e| storage_failure("replace schedule", e))?;
        if !replaced {
            tracing::warn!(schedule_id = %id, "timetable disappeared during update");
            return Err(TimetableError::not_found(Entity::Schedule, id));
        }

        tracing::info!(schedule_id = %id, "updated timetable");
        Ok(schedule)
    }

    /// Delete schedule `id` and its exceptions.
    ///
    /// # Errors
    /// `NotFound` if `id` does not exist, `Storage` on store failure.
    pub fn delete(&self, id: ScheduleId) -> Result<()> {
        let current = self.get(id)?;
        let handles = self
            .locks
            .handles(&[current.venue_id])
            .map_err(|e| storage_failure("lock venue", e))?;
        let _guards = lock_all(&handles).map_err(|e| storage_failure("lock venue", e))?;

        let deleted = self
            .store
            .delete_schedule(id)
            .map_err(|e| storage_failure("delete schedule", e))?;
        if !deleted {
            return Err(TimetableError::not_found(Entity::Schedule, id));
        }
        tracing::info!(schedule_id = %id, "deleted timetable");
        Ok(())
    }

    /// # Errors
    /// `NotFound` if `id` does not exist, `Storage` on store failure.
    pub fn get(&self, id: ScheduleId) -> Result<PersistedSchedule> {
        self.store
            .fetch_schedule(id)
            .map_err(|e| storage_failure("fetch schedule", e))?
            .ok_or_else(|| {
                tracing::warn!(schedule_id = %id, "timetable not found");
                TimetableError::not_found(Entity::Schedule, id)
            })
    }

    /// # Errors
    /// `Storage` on store failure.
    pub fn list_for_venue(&self, venue_id: VenueId) -> Result<Vec<PersistedSchedule>> {
        self.store
            .fetch_schedules_for_venue(venue_id)
            .map_err(|e| storage_failure("fetch venue schedules", e))
    }

    /// Record a cancellation or reschedule of one occurrence.
    ///
    /// # Errors
    /// `Validation` if the record neither cancels nor reschedules, names a
    /// date that is not an occurrence of the schedule, or duplicates an
    /// existing exception. `NotFound` for a missing schedule or replacement
    /// venue. `Storage` on store failure.
    pub fn record_exception(&self, exception: ScheduleException) -> Result<()> {
        if !exception.is_cancelled && !exception.is_rescheduled {
            return Err(TimetableError::Validation(
                "an exception must cancel or reschedule the occurrence".to_string(),
            ));
        }
        if exception.new_venue_id.is_some() && !exception.is_rescheduled {
            return Err(TimetableError::Validation(
                "only a rescheduled occurrence can name a new venue".to_string(),
            ));
        }

        let schedule = self.get(exception.schedule_id)?;
        if let Some(venue_id) = exception.new_venue_id {
            self.require_venue(venue_id)?;
        }

        let occurrences = self.expand_stored(&schedule)?;
        if !occurrences
            .iter()
            .any(|o| o.date == exception.exception_date)
        {
            return Err(TimetableError::Validation(format!(
                "{} is not an occurrence of timetable {}",
                exception.exception_date, schedule.id
            )));
        }

        let handles = self
            .locks
            .handles(&[schedule.venue_id])
            .map_err(|e| storage_failure("lock venue", e))?;
        let _guards = lock_all(&handles).map_err(|e| storage_failure("lock venue", e))?;

        let (schedule_id, date) = (exception.schedule_id, exception.exception_date);
        match self.store.insert_exception(exception) {
            Ok(()) => {
                tracing::info!(schedule_id = %schedule_id, date = %date, "recorded exception");
                Ok(())
            }
            Err(StoreError::Duplicate(_)) => Err(TimetableError::Validation(format!(
                "timetable {} already has an exception on {}",
                schedule_id, date
            ))),
            Err(e) => Err(storage_failure("insert exception", e)),
        }
    }

    /// The sessions schedule `id` actually holds, exceptions applied.
    ///
    /// # Errors
    /// `NotFound` if `id` does not exist, `Storage` on store failure or if the
    /// stored schedule cannot be expanded.
    pub fn timetable(&self, id: ScheduleId) -> Result<TimetableEntry> {
        let schedule = self.get(id)?;
        let occurrences = self.expand_stored(&schedule)?;
        let exceptions = self
            .store
            .fetch_exceptions_for_schedules(&[id])
            .map_err(|e| storage_failure("fetch exceptions", e))?;
        let index = ExceptionIndex::build(&HashSet::from([id]), &exceptions);
        Ok(TimetableEntry::new(
            schedule,
            &occurrences,
            &index,
            self.expander.zone(),
        ))
    }

    fn resolve(&self, request: &ScheduleRequest) -> Result<(Semester, ScheduleSpec)> {
        let course_exists = self
            .catalog
            .course_exists(request.course_id)
            .map_err(|e| storage_failure("lookup course", e))?;
        if !course_exists {
            tracing::warn!(course_id = %request.course_id, "course does not exist");
            return Err(TimetableError::not_found(Entity::Course, request.course_id));
        }

        self.require_venue(request.venue_id)?;

        let semester = self
            .catalog
            .find_semester(&request.session, request.term)
            .map_err(|e| storage_failure("lookup semester", e))?
            .ok_or_else(|| {
                tracing::warn!(session = %request.session, term = %request.term, "semester not found");
                TimetableError::not_found(
                    Entity::Semester,
                    format!("{} {}", request.session, request.term),
                )
            })?;

        let spec = ScheduleSpec::new(
            request.venue_id,
            request.start_time,
            request.duration_minutes,
            request.rule.clone(),
            semester.start_date,
            semester.end_date,
        )?;
        Ok((semester, spec))
    }

    fn require_venue(&self, venue_id: VenueId) -> Result<()> {
        let exists = self
            .catalog
            .venue_exists(venue_id)
            .map_err(|e| storage_failure("lookup venue", e))?;
        if !exists {
            tracing::warn!(venue_id = %venue_id, "venue does not exist");
            return Err(TimetableError::not_found(Entity::Venue, venue_id));
        }
        Ok(())
    }

    fn expand_stored(&self, schedule: &PersistedSchedule) -> Result<Vec<Occurrence>> {
        schedule
            .spec()
            .and_then(|spec| self.expander.expand(&spec))
            .map_err(|e| corrupt(schedule.id, e))
    }

    fn ensure_no_conflict(
        &self,
        spec: &ScheduleSpec,
        candidates: &[Occurrence],
        existing: &[PersistedSchedule],
    ) -> Result<()> {
        if candidates.is_empty() || existing.is_empty() {
            return Ok(());
        }

        // One bulk fetch for every schedule in the venue.
        let ids: Vec<ScheduleId> = existing.iter().map(|s| s.id).collect();
        let exceptions = self
            .store
            .fetch_exceptions_for_schedules(&ids)
            .map_err(|e| storage_failure("fetch exceptions", e))?;
        let id_set: HashSet<ScheduleId> = ids.iter().copied().collect();
        let index = ExceptionIndex::build(&id_set, &exceptions);

        let detector = ConflictDetector::new(&self.expander);
        match detector.find_conflict(spec.venue_id, candidates, existing, &index)? {
            Some(conflict) => {
                tracing::warn!(
                    venue_id = %spec.venue_id,
                    schedule_id = %conflict.schedule_id,
                    date = %conflict.date,
                    "{}",
                    conflict
                );
                Err(TimetableError::Conflict(Box::new(conflict)))
            }
            None => {
                tracing::debug!(venue_id = %spec.venue_id, "no conflicts found");
                Ok(())
            }
        }
    }
}

fn persisted(
    id: ScheduleId,
    request: &ScheduleRequest,
    semester: &Semester,
    spec: &ScheduleSpec,
) -> PersistedSchedule {
    PersistedSchedule {
        id,
        course_id: request.course_id,
        venue_id: spec.venue_id,
        semester_id: semester.id,
        start_time: spec.start_time,
        duration_minutes: spec.duration_minutes,
        rrule: spec.rule.to_string(),
        window_start: spec.window_start,
        window_end: spec.window_end,
    }
}

fn storage_failure(operation: &'static str, err: StoreError) -> TimetableError {
    tracing::error!(operation, error = %err, "storage failure");
    TimetableError::Storage(err)
}
