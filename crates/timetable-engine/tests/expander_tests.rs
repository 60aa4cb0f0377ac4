//! Tests for recurrence expansion over a bounding window.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use timetable_engine::{
    expand, EngineOptions, Expander, Occurrence, RecurrenceRule, ScheduleSpec, TimetableError,
    VenueId, Zone,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Helper: build a spec from rule text, a start time and an inclusive window.
fn spec(rule: &str, start: NaiveTime, minutes: u32, from: NaiveDate, to: NaiveDate) -> ScheduleSpec {
    let rule: RecurrenceRule = rule.parse().expect("rule should parse");
    ScheduleSpec::new(VenueId::new(), start, minutes, rule, from, to).expect("spec should validate")
}

fn dates(occurrences: &[Occurrence]) -> Vec<(i32, u32, u32)> {
    occurrences
        .iter()
        .map(|o| (o.date.year(), o.date.month(), o.date.day()))
        .collect()
}

// ---------------------------------------------------------------------------
// Semester scenarios
// ---------------------------------------------------------------------------

#[test]
fn weekly_mon_wed_across_semester() {
    let result = expand(&spec(
        "FREQ=WEEKLY;BYDAY=MO,WE",
        time(9, 0),
        60,
        date(2025, 9, 1),
        date(2025, 12, 31),
    ))
    .expect("should expand successfully");

    // 18 Mondays + 18 Wednesdays between Mon Sep 1 and Wed Dec 31.
    assert_eq!(result.len(), 36);

    assert_eq!(
        result[0].start,
        Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap()
    );
    assert_eq!(
        result[0].end,
        Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap()
    );
    assert_eq!(
        result[1].start,
        Utc.with_ymd_and_hms(2025, 9, 3, 9, 0, 0).unwrap()
    );

    for occurrence in &result {
        let weekday = occurrence.date.weekday();
        assert!(
            weekday == Weekday::Mon || weekday == Weekday::Wed,
            "{} is a {:?}",
            occurrence.date,
            weekday
        );
    }
}

#[test]
fn final_day_of_window_is_included() {
    // Dec 31 2025 is a Wednesday: the closed window keeps it.
    let result = expand(&spec(
        "FREQ=WEEKLY;BYDAY=MO,WE",
        time(9, 0),
        60,
        date(2025, 9, 1),
        date(2025, 12, 31),
    ))
    .unwrap();

    let last = result.last().expect("non-empty");
    assert_eq!(last.date, date(2025, 12, 31));
    assert_eq!(last.start, Utc.with_ymd_and_hms(2025, 12, 31, 9, 0, 0).unwrap());
}

#[test]
fn window_starting_midweek_skips_to_first_matching_day() {
    // Window opens on Tuesday Sep 2: first Mon/Wed is Wed Sep 3.
    let result = expand(&spec(
        "FREQ=WEEKLY;BYDAY=MO,WE",
        time(9, 0),
        60,
        date(2025, 9, 2),
        date(2025, 9, 14),
    ))
    .unwrap();

    assert_eq!(dates(&result), vec![(2025, 9, 3), (2025, 9, 8), (2025, 9, 10)]);
}

#[test]
fn weekly_without_byday_uses_window_start_weekday() {
    // Window opens on a Thursday.
    let result = expand(&spec(
        "FREQ=WEEKLY",
        time(14, 0),
        90,
        date(2025, 9, 4),
        date(2025, 9, 30),
    ))
    .unwrap();

    assert_eq!(
        dates(&result),
        vec![(2025, 9, 4), (2025, 9, 11), (2025, 9, 18), (2025, 9, 25)]
    );
    assert_eq!(result[0].end - result[0].start, Duration::minutes(90));
}

// ---------------------------------------------------------------------------
// Stop conditions
// ---------------------------------------------------------------------------

#[test]
fn daily_count_five() {
    let result = expand(&spec(
        "FREQ=DAILY;COUNT=5",
        time(8, 0),
        30,
        date(2025, 9, 1),
        date(2025, 9, 30),
    ))
    .unwrap();

    assert_eq!(
        dates(&result),
        vec![
            (2025, 9, 1),
            (2025, 9, 2),
            (2025, 9, 3),
            (2025, 9, 4),
            (2025, 9, 5)
        ]
    );
}

#[test]
fn count_is_clipped_by_window() {
    let result = expand(&spec(
        "FREQ=DAILY;COUNT=50",
        time(8, 0),
        30,
        date(2025, 9, 1),
        date(2025, 9, 10),
    ))
    .unwrap();

    assert_eq!(result.len(), 10);
    assert_eq!(result.last().unwrap().date, date(2025, 9, 10));
}

#[test]
fn until_inside_window_stops_early() {
    let result = expand(&spec(
        "FREQ=WEEKLY;BYDAY=MO;UNTIL=20250915T235959Z",
        time(9, 0),
        60,
        date(2025, 9, 1),
        date(2025, 12, 31),
    ))
    .unwrap();

    assert_eq!(dates(&result), vec![(2025, 9, 1), (2025, 9, 8), (2025, 9, 15)]);
}

#[test]
fn until_before_window_is_empty() {
    let result = expand(&spec(
        "FREQ=WEEKLY;BYDAY=MO;UNTIL=20250801T000000Z",
        time(9, 0),
        60,
        date(2025, 9, 1),
        date(2025, 12, 31),
    ))
    .unwrap();

    assert!(result.is_empty());
}

#[test]
fn count_zero_is_empty() {
    let result = expand(&spec(
        "FREQ=WEEKLY;BYDAY=MO;COUNT=0",
        time(9, 0),
        60,
        date(2025, 9, 1),
        date(2025, 12, 31),
    ))
    .unwrap();

    assert!(result.is_empty());
}

// ---------------------------------------------------------------------------
// Filters and intervals
// ---------------------------------------------------------------------------

#[test]
fn biweekly_monday() {
    let result = expand(&spec(
        "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO",
        time(9, 0),
        60,
        date(2025, 9, 1),
        date(2025, 12, 31),
    ))
    .unwrap();

    assert_eq!(
        dates(&result),
        vec![
            (2025, 9, 1),
            (2025, 9, 15),
            (2025, 9, 29),
            (2025, 10, 13),
            (2025, 10, 27),
            (2025, 11, 10),
            (2025, 11, 24),
            (2025, 12, 8),
            (2025, 12, 22)
        ]
    );
}

#[test]
fn monthly_last_day() {
    let result = expand(&spec(
        "FREQ=MONTHLY;BYMONTHDAY=-1",
        time(16, 0),
        120,
        date(2025, 9, 1),
        date(2025, 12, 31),
    ))
    .unwrap();

    assert_eq!(
        dates(&result),
        vec![(2025, 9, 30), (2025, 10, 31), (2025, 11, 30), (2025, 12, 31)]
    );
}

#[test]
fn byday_missing_from_window_is_empty() {
    // Mon Sep 1 .. Fri Sep 5 has no Saturday.
    let result = expand(&spec(
        "FREQ=WEEKLY;BYDAY=SA",
        time(9, 0),
        60,
        date(2025, 9, 1),
        date(2025, 9, 5),
    ))
    .unwrap();

    assert!(result.is_empty());
}

#[test]
fn single_day_window() {
    let monday = expand(&spec(
        "FREQ=WEEKLY;BYDAY=MO",
        time(9, 0),
        60,
        date(2025, 9, 1),
        date(2025, 9, 1),
    ))
    .unwrap();
    assert_eq!(dates(&monday), vec![(2025, 9, 1)]);

    let tuesday = expand(&spec(
        "FREQ=WEEKLY;BYDAY=MO",
        time(9, 0),
        60,
        date(2025, 9, 2),
        date(2025, 9, 2),
    ))
    .unwrap();
    assert!(tuesday.is_empty());
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

#[test]
fn wall_clock_normalised_to_utc() {
    let expander = Expander::new(Zone::parse("Africa/Lagos").unwrap(), 1000).unwrap();
    let result = expander
        .expand(&spec(
            "FREQ=WEEKLY;BYDAY=MO",
            time(9, 0),
            60,
            date(2025, 9, 1),
            date(2025, 9, 8),
        ))
        .unwrap();

    assert_eq!(result.len(), 2);
    // 09:00 WAT = 08:00 UTC
    assert_eq!(result[0].start, Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap());
    assert_eq!(result[0].date, date(2025, 9, 1));
}

#[test]
fn dst_change_keeps_wall_clock() {
    // New York leaves DST on Nov 2 2025.
    let expander = Expander::new(Zone::parse("America/New_York").unwrap(), 1000).unwrap();
    let result = expander
        .expand(&spec(
            "FREQ=WEEKLY;BYDAY=MO",
            time(9, 0),
            60,
            date(2025, 10, 27),
            date(2025, 11, 10),
        ))
        .unwrap();

    assert_eq!(result.len(), 3);
    // 09:00 EDT (UTC-4)
    assert_eq!(result[0].start, Utc.with_ymd_and_hms(2025, 10, 27, 13, 0, 0).unwrap());
    // 09:00 EST (UTC-5)
    assert_eq!(result[1].start, Utc.with_ymd_and_hms(2025, 11, 3, 14, 0, 0).unwrap());
    assert_eq!(result[2].start, Utc.with_ymd_and_hms(2025, 11, 10, 14, 0, 0).unwrap());
}

#[test]
fn window_bound_holds_outside_utc() {
    let expander = Expander::new(Zone::parse("America/New_York").unwrap(), 1000).unwrap();
    let result = expander
        .expand(&spec(
            "FREQ=WEEKLY;BYDAY=MO",
            time(9, 0),
            60,
            date(2025, 9, 1),
            date(2025, 12, 29),
        ))
        .unwrap();

    assert_eq!(result.len(), 18);
    assert_eq!(result[0].start, Utc.with_ymd_and_hms(2025, 9, 1, 13, 0, 0).unwrap());
    assert_eq!(result[17].date, date(2025, 12, 29));
    assert_eq!(result[17].start, Utc.with_ymd_and_hms(2025, 12, 29, 14, 0, 0).unwrap());
}

#[test]
fn until_rule_expands_outside_utc() {
    let expander = Expander::new(Zone::parse("Africa/Lagos").unwrap(), 1000).unwrap();
    let result = expander
        .expand(&spec(
            "FREQ=WEEKLY;BYDAY=MO;UNTIL=20250915T235959Z",
            time(9, 0),
            60,
            date(2025, 9, 1),
            date(2025, 12, 31),
        ))
        .unwrap();

    assert_eq!(dates(&result), vec![(2025, 9, 1), (2025, 9, 8), (2025, 9, 15)]);
}

// ---------------------------------------------------------------------------
// Limits, validation, determinism
// ---------------------------------------------------------------------------

#[test]
fn zero_cap_rejected() {
    assert!(matches!(
        Expander::new(Zone::UTC, 0),
        Err(TimetableError::Validation(_))
    ));
    let options = EngineOptions {
        max_occurrences: 0,
        ..EngineOptions::default()
    };
    assert!(matches!(
        Expander::from_options(&options),
        Err(TimetableError::Validation(_))
    ));
}

#[test]
fn cap_exceeded_inside_window_is_an_error() {
    let expander = Expander::new(Zone::UTC, 10).unwrap();
    let result = expander.expand(&spec(
        "FREQ=DAILY",
        time(9, 0),
        60,
        date(2025, 9, 1),
        date(2025, 9, 30),
    ));
    assert!(matches!(result, Err(TimetableError::Validation(_))));
}

#[test]
fn cap_reached_outside_window_is_fine() {
    let expander = Expander::new(Zone::UTC, 10).unwrap();
    let result = expander
        .expand(&spec(
            "FREQ=DAILY;COUNT=50",
            time(9, 0),
            60,
            date(2025, 9, 1),
            date(2025, 9, 5),
        ))
        .unwrap();
    assert_eq!(result.len(), 5);
}

#[test]
fn invalid_specs_rejected() {
    let rule: RecurrenceRule = "FREQ=DAILY".parse().unwrap();
    let zero = ScheduleSpec::new(
        VenueId::new(),
        time(9, 0),
        0,
        rule.clone(),
        date(2025, 9, 1),
        date(2025, 9, 2),
    );
    assert!(matches!(zero, Err(TimetableError::Validation(_))));

    let inverted = ScheduleSpec::new(
        VenueId::new(),
        time(9, 0),
        60,
        rule,
        date(2025, 9, 2),
        date(2025, 9, 1),
    );
    assert!(matches!(inverted, Err(TimetableError::Validation(_))));
}

#[test]
fn expansion_is_deterministic() {
    let s = spec(
        "FREQ=WEEKLY;BYDAY=TU,TH",
        time(11, 0),
        50,
        date(2026, 1, 12),
        date(2026, 5, 1),
    );
    let first = expand(&s).unwrap();
    let second = expand(&s).unwrap();
    assert_eq!(first, second);
    assert!(first.windows(2).all(|w| w[0].start < w[1].start));
}
