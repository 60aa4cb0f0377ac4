//! In-memory catalog and schedule store.
//!
//! Used by the CLI to run checks against a JSON snapshot, and by tests. Each
//! method takes the lock once, so every call is atomic.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    CourseId, PersistedSchedule, ScheduleException, ScheduleId, Semester, SemesterTerm, VenueId,
};
use crate::store::{Catalog, ScheduleStore};

/// A serialisable picture of everything the engine reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub courses: Vec<CourseId>,
    #[serde(default)]
    pub venues: Vec<VenueId>,
    #[serde(default)]
    pub semesters: Vec<Semester>,
    #[serde(default)]
    pub schedules: Vec<PersistedSchedule>,
    #[serde(default)]
    pub exceptions: Vec<ScheduleException>,
}

impl Snapshot {
    /// Load the snapshot into fresh stores.
    ///
    /// # Errors
    /// Returns `StoreError::Duplicate` if two schedules share an id or two
    /// exceptions share a `(schedule, date)` pair.
    pub fn into_stores(self) -> StoreResult<(InMemoryCatalog, InMemoryStore)> {
        let catalog = InMemoryCatalog::new(self.courses, self.venues, self.semesters);
        let store = InMemoryStore::default();
        for schedule in self.schedules {
            store.insert_schedule(schedule)?;
        }
        for exception in self.exceptions {
            store.insert_exception(exception)?;
        }
        Ok((catalog, store))
    }
}

/// Fixed set of courses, venues and semesters.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    courses: HashSet<CourseId>,
    venues: HashSet<VenueId>,
    semesters: Vec<Semester>,
}

impl InMemoryCatalog {
    pub fn new(
        courses: impl IntoIterator<Item = CourseId>,
        venues: impl IntoIterator<Item = VenueId>,
        semesters: impl IntoIterator<Item = Semester>,
    ) -> Self {
        Self {
            courses: courses.into_iter().collect(),
            venues: venues.into_iter().collect(),
            semesters: semesters.into_iter().collect(),
        }
    }
}

impl Catalog for InMemoryCatalog {
    fn course_exists(&self, id: CourseId) -> StoreResult<bool> {
        Ok(self.courses.contains(&id))
    }

    fn venue_exists(&self, id: VenueId) -> StoreResult<bool> {
        Ok(self.venues.contains(&id))
    }

    fn find_semester(&self, session: &str, term: SemesterTerm) -> StoreResult<Option<Semester>> {
        Ok(self
            .semesters
            .iter()
            .find(|s| s.session == session && s.term == term)
            .cloned())
    }
}

#[derive(Debug, Default)]
struct Tables {
    schedules: BTreeMap<ScheduleId, PersistedSchedule>,
    exceptions: BTreeMap<(ScheduleId, NaiveDate), ScheduleException>,
}

/// Schedules and exceptions held behind a single `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.schedules.len())
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::LockPoisoned("schedule tables"))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::LockPoisoned("schedule tables"))
    }
}

impl ScheduleStore for InMemoryStore {
    fn fetch_schedule(&self, id: ScheduleId) -> StoreResult<Option<PersistedSchedule>> {
        Ok(self.read()?.schedules.get(&id).cloned())
    }

    fn fetch_schedules_for_venue(&self, venue_id: VenueId) -> StoreResult<Vec<PersistedSchedule>> {
        Ok(self
            .read()?
            .schedules
            .values()
            .filter(|s| s.venue_id == venue_id)
            .cloned()
            .collect())
    }

    fn fetch_exceptions_for_schedules(
        &self,
        schedule_ids: &[ScheduleId],
    ) -> StoreResult<Vec<ScheduleException>> {
        let wanted: HashSet<&ScheduleId> = schedule_ids.iter().collect();
        Ok(self
            .read()?
            .exceptions
            .values()
            .filter(|e| wanted.contains(&e.schedule_id))
            .cloned()
            .collect())
    }

    fn insert_schedule(&self, schedule: PersistedSchedule) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.schedules.contains_key(&schedule.id) {
            return Err(StoreError::Duplicate(format!("schedule {}", schedule.id)));
        }
        tables.schedules.insert(schedule.id, schedule);
        Ok(())
    }

    fn replace_schedule(&self, schedule: PersistedSchedule) -> StoreResult<bool> {
        let mut tables = self.write()?;
        match tables.schedules.get_mut(&schedule.id) {
            Some(slot) => {
                *slot = schedule;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_schedule(&self, id: ScheduleId) -> StoreResult<bool> {
        let mut tables = self.write()?;
        if tables.schedules.remove(&id).is_none() {
            return Ok(false);
        }
        tables.exceptions.retain(|(schedule_id, _), _| *schedule_id != id);
        Ok(true)
    }

    fn insert_exception(&self, exception: ScheduleException) -> StoreResult<()> {
        let mut tables = self.write()?;
        let key = (exception.schedule_id, exception.exception_date);
        if tables.exceptions.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "exception for schedule {} on {}",
                exception.schedule_id, exception.exception_date
            )));
        }
        tables.exceptions.insert(key, exception);
        Ok(())
    }
}
