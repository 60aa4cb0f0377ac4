//! # timetable-engine
//!
//! Recurring-schedule conflict detection for school timetables.
//!
//! Given a recurrence rule, a start time, a duration and a semester window, the
//! engine materialises every concrete class occurrence, compares them against
//! every other schedule booked into the same venue (honouring per-occurrence
//! cancellations and reschedules), and refuses the new schedule if any
//! occurrence would double-book the venue.
//!
//! ## Quick start
//!
//! ```rust
//! use chrono::{NaiveDate, NaiveTime};
//! use timetable_engine::{expand, RecurrenceRule, ScheduleSpec, VenueId};
//!
//! let rule: RecurrenceRule = "FREQ=WEEKLY;BYDAY=MO,WE".parse().unwrap();
//! let spec = ScheduleSpec::new(
//!     VenueId::new(),
//!     NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
//!     60,
//!     rule,
//!     NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2025, 9, 7).unwrap(),
//! )
//! .unwrap();
//!
//! let occurrences = expand(&spec).unwrap();
//! assert_eq!(occurrences.len(), 2); // Mon 1st, Wed 3rd
//! ```
//!
//! ## Modules
//!
//! - [`rule`]: Structured recurrence rules, parsed from and rendered to RRULE text
//! - [`zone`]: The single point where naive dates and times become UTC instants
//! - [`expander`]: Schedule spec → ordered list of concrete occurrences
//! - [`exceptions`]: O(1) lookup of cancelled / rescheduled occurrences
//! - [`conflict`]: First-conflict scan of a venue's stored schedules
//! - [`transaction`]: Create / update / delete with venue-scoped locking
//! - [`timetable`]: Sessions a schedule actually holds, exceptions applied
//! - [`store`]: collaborator contracts, with an in-memory implementation in [`memory`]
//! - [`locks`]: Per-venue mutexes
//! - [`error`]: Error types

pub mod conflict;
pub mod error;
pub mod exceptions;
pub mod expander;
pub mod locks;
pub mod memory;
pub mod model;
pub mod options;
pub mod rule;
pub mod store;
pub mod timetable;
pub mod transaction;
pub mod zone;

pub use conflict::{ConflictDescriptor, ConflictDetector, TimeRange};
pub use error::{Entity, StoreError, TimetableError};
pub use exceptions::{ExceptionIndex, ExceptionKind};
pub use expander::{expand, Expander, Occurrence};
pub use memory::{InMemoryCatalog, InMemoryStore, Snapshot};
pub use model::{
    CourseId, PersistedSchedule, ScheduleException, ScheduleId, ScheduleRequest, ScheduleSpec,
    Semester, SemesterId, SemesterTerm, VenueId,
};
pub use options::EngineOptions;
pub use rule::{Frequency, RecurrenceRule, Stop};
pub use store::{Catalog, ScheduleStore};
pub use timetable::{ClassSession, TimetableEntry};
pub use transaction::ScheduleService;
pub use zone::Zone;
