use std::collections::HashSet;
use std::hint::black_box;

use chrono::{NaiveDate, NaiveTime};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use timetable_engine::{
    ConflictDetector, CourseId, ExceptionIndex, Expander, PersistedSchedule, ScheduleException,
    ScheduleId, ScheduleSpec, SemesterId, VenueId,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A venue booked hourly from 08:00 on Mon/Wed/Fri, one schedule per slot.
fn booked_venue(venue: VenueId, slots: u32) -> Vec<PersistedSchedule> {
    (0..slots)
        .map(|i| PersistedSchedule {
            id: ScheduleId::new(),
            course_id: CourseId::new(),
            venue_id: venue,
            semester_id: SemesterId::new(),
            start_time: NaiveTime::from_hms_opt(8 + i, 0, 0).unwrap(),
            duration_minutes: 60,
            rrule: "FREQ=WEEKLY;INTERVAL=1;BYDAY=MO,WE,FR".to_string(),
            window_start: date(2025, 9, 1),
            window_end: date(2025, 12, 31),
        })
        .collect()
}

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand");
    let expander = Expander::default();

    for rule in ["FREQ=WEEKLY;BYDAY=MO,WE", "FREQ=DAILY"] {
        let spec = ScheduleSpec::new(
            VenueId::new(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            60,
            rule.parse().unwrap(),
            date(2025, 9, 1),
            date(2025, 12, 31),
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::new("semester", rule), &spec, |b, spec| {
            b.iter(|| expander.expand(black_box(spec)).unwrap());
        });
    }

    group.finish();
}

fn bench_conflict_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("conflict_scan");
    let expander = Expander::default();
    let venue = VenueId::new();

    // Candidate sits after every booked slot, so the scan never short-circuits.
    let candidate = ScheduleSpec::new(
        venue,
        NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        60,
        "FREQ=WEEKLY;BYDAY=MO,WE,FR".parse().unwrap(),
        date(2025, 9, 1),
        date(2025, 12, 31),
    )
    .unwrap();
    let occurrences = expander.expand(&candidate).unwrap();

    for slots in [1u32, 4, 12] {
        let existing = booked_venue(venue, slots);
        let ids: HashSet<ScheduleId> = existing.iter().map(|s| s.id).collect();
        let cancelled: Vec<ScheduleException> = existing
            .iter()
            .map(|s| ScheduleException::cancelled(s.id, date(2025, 10, 1)))
            .collect();
        let index = ExceptionIndex::build(&ids, &cancelled);

        group.bench_with_input(BenchmarkId::new("slots", slots), &existing, |b, existing| {
            b.iter(|| {
                ConflictDetector::new(&expander)
                    .find_conflict(venue, black_box(&occurrences), existing, &index)
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_expand, bench_conflict_scan);
criterion_main!(benches);
