//! Tests for occurrence expansion: frequency stepping, clamping, COUNT and
//! UNTIL termination, window clipping, and the strictly-after mode.

use cadence_engine::{
    expand_in_window, is_occurrence_start, next_occurrence, EngineError, ExpandOptions,
    RecurrenceRule,
};
use chrono::{DateTime, TimeZone, Utc};

fn dt(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

fn rule(text: &str) -> RecurrenceRule {
    RecurrenceRule::parse(text).expect("test rule should parse")
}

// ---------------------------------------------------------------------------
// Daily
// ---------------------------------------------------------------------------

#[test]
fn daily_count_three_inside_window() {
    // Scenario: DAILY, COUNT=3, anchor 2025-01-01T09:00, 30 minutes.
    let occurrences = expand_in_window(
        &rule("FREQ=DAILY;COUNT=3"),
        dt(2025, 1, 1, 9, 0),
        dt(2025, 1, 1, 9, 30),
        dt(2025, 1, 1, 0, 0),
        dt(2025, 1, 10, 0, 0),
        &ExpandOptions::default(),
    )
    .expect("should expand");

    assert_eq!(occurrences.len(), 3);
    for (i, occurrence) in occurrences.iter().enumerate() {
        let day = 1 + i as u32;
        assert_eq!(occurrence.start, dt(2025, 1, day, 9, 0), "day {day} start");
        assert_eq!(occurrence.end, dt(2025, 1, day, 9, 30), "day {day} end");
    }
}

#[test]
fn first_occurrence_equals_the_anchor() {
    let occurrences = expand_in_window(
        &rule("FREQ=DAILY;INTERVAL=3;COUNT=4"),
        dt(2025, 2, 10, 8, 15),
        dt(2025, 2, 10, 9, 15),
        dt(2025, 1, 1, 0, 0),
        dt(2026, 1, 1, 0, 0),
        &ExpandOptions::default(),
    )
    .expect("should expand");

    assert_eq!(occurrences[0].start, dt(2025, 2, 10, 8, 15));
    assert_eq!(occurrences[1].start, dt(2025, 2, 13, 8, 15));
}

#[test]
fn occurrences_before_the_window_consume_the_count_budget() {
    // COUNT=5 from Jan 1; the window starts at Jan 4, so Jan 1-3 are skipped
    // but still charged, leaving Jan 4 and Jan 5 only.
    let occurrences = expand_in_window(
        &rule("FREQ=DAILY;COUNT=5"),
        dt(2025, 1, 1, 9, 0),
        dt(2025, 1, 1, 10, 0),
        dt(2025, 1, 4, 0, 0),
        dt(2025, 1, 20, 0, 0),
        &ExpandOptions::default(),
    )
    .expect("should expand");

    let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();
    assert_eq!(starts, vec![dt(2025, 1, 4, 9, 0), dt(2025, 1, 5, 9, 0)]);
}

// ---------------------------------------------------------------------------
// Weekly
// ---------------------------------------------------------------------------

#[test]
fn weekly_byday_count_five() {
    // Scenario: WEEKLY, BYDAY=MO,WE,FR, COUNT=5, anchor Monday 2025-01-06.
    let occurrences = expand_in_window(
        &rule("FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=5"),
        dt(2025, 1, 6, 9, 0),
        dt(2025, 1, 6, 9, 30),
        dt(2025, 1, 6, 0, 0),
        dt(2025, 1, 20, 0, 0),
        &ExpandOptions::default(),
    )
    .expect("should expand");

    let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();
    assert_eq!(
        starts,
        vec![
            dt(2025, 1, 6, 9, 0),  // Mon
            dt(2025, 1, 8, 9, 0),  // Wed
            dt(2025, 1, 10, 9, 0), // Fri
            dt(2025, 1, 13, 9, 0), // Mon
            dt(2025, 1, 15, 9, 0), // Wed
        ]
    );
}

#[test]
fn weekly_byday_midweek_anchor_skips_earlier_days_of_its_week() {
    // Anchor Wednesday 2025-01-08; Monday Jan 6 matches BYDAY but precedes
    // the anchor, so the series starts on the anchor itself.
    let occurrences = expand_in_window(
        &rule("FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=3"),
        dt(2025, 1, 8, 9, 0),
        dt(2025, 1, 8, 10, 0),
        dt(2025, 1, 1, 0, 0),
        dt(2025, 2, 1, 0, 0),
        &ExpandOptions::default(),
    )
    .expect("should expand");

    let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();
    assert_eq!(
        starts,
        vec![
            dt(2025, 1, 8, 9, 0),  // Wed (anchor)
            dt(2025, 1, 10, 9, 0), // Fri
            dt(2025, 1, 13, 9, 0), // Mon of the next block
        ]
    );
}

#[test]
fn biweekly_without_byday_steps_on_the_anchor_weekday() {
    let occurrences = expand_in_window(
        &rule("FREQ=WEEKLY;INTERVAL=2;COUNT=3"),
        dt(2025, 1, 7, 11, 0), // Tuesday
        dt(2025, 1, 7, 12, 0),
        dt(2025, 1, 1, 0, 0),
        dt(2025, 3, 1, 0, 0),
        &ExpandOptions::default(),
    )
    .expect("should expand");

    let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();
    assert_eq!(
        starts,
        vec![
            dt(2025, 1, 7, 11, 0),
            dt(2025, 1, 21, 11, 0),
            dt(2025, 2, 4, 11, 0),
        ]
    );
}

#[test]
fn biweekly_byday_enumerates_within_alternating_blocks() {
    let occurrences = expand_in_window(
        &rule("FREQ=WEEKLY;INTERVAL=2;BYDAY=TU,TH;COUNT=4"),
        dt(2025, 1, 7, 11, 0), // Tuesday
        dt(2025, 1, 7, 12, 0),
        dt(2025, 1, 1, 0, 0),
        dt(2025, 3, 1, 0, 0),
        &ExpandOptions::default(),
    )
    .expect("should expand");

    let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();
    assert_eq!(
        starts,
        vec![
            dt(2025, 1, 7, 11, 0),  // Tue week 1
            dt(2025, 1, 9, 11, 0),  // Thu week 1
            dt(2025, 1, 21, 11, 0), // Tue week 3
            dt(2025, 1, 23, 11, 0), // Thu week 3
        ]
    );
}

// ---------------------------------------------------------------------------
// Monthly / yearly clamping
// ---------------------------------------------------------------------------

#[test]
fn monthly_clamps_to_the_last_day_of_short_months() {
    let occurrences = expand_in_window(
        &rule("FREQ=MONTHLY;COUNT=4"),
        dt(2025, 1, 31, 10, 0),
        dt(2025, 1, 31, 11, 0),
        dt(2025, 1, 1, 0, 0),
        dt(2026, 1, 1, 0, 0),
        &ExpandOptions::default(),
    )
    .expect("should expand");

    let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();
    assert_eq!(
        starts,
        vec![
            dt(2025, 1, 31, 10, 0),
            dt(2025, 2, 28, 10, 0), // clamped, not skipped
            dt(2025, 3, 31, 10, 0), // back on the anchor's day-of-month
            dt(2025, 4, 30, 10, 0),
        ]
    );
}

#[test]
fn yearly_clamps_leap_day_anchors_in_non_leap_years() {
    let occurrences = expand_in_window(
        &rule("FREQ=YEARLY;COUNT=5"),
        dt(2024, 2, 29, 12, 0),
        dt(2024, 2, 29, 13, 0),
        dt(2024, 1, 1, 0, 0),
        dt(2030, 1, 1, 0, 0),
        &ExpandOptions::default(),
    )
    .expect("should expand");

    let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();
    assert_eq!(
        starts,
        vec![
            dt(2024, 2, 29, 12, 0),
            dt(2025, 2, 28, 12, 0),
            dt(2026, 2, 28, 12, 0),
            dt(2027, 2, 28, 12, 0),
            dt(2028, 2, 29, 12, 0), // leap year again
        ]
    );
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

#[test]
fn until_is_inclusive() {
    let occurrences = expand_in_window(
        &rule("FREQ=DAILY;UNTIL=20250103T090000Z"),
        dt(2025, 1, 1, 9, 0),
        dt(2025, 1, 1, 9, 30),
        dt(2025, 1, 1, 0, 0),
        dt(2025, 2, 1, 0, 0),
        &ExpandOptions::default(),
    )
    .expect("should expand");

    assert_eq!(occurrences.len(), 3);
    assert_eq!(occurrences[2].start, dt(2025, 1, 3, 9, 0));
}

#[test]
fn max_occurrences_caps_the_returned_set() {
    let occurrences = expand_in_window(
        &rule("FREQ=DAILY"),
        dt(2025, 1, 1, 9, 0),
        dt(2025, 1, 1, 9, 30),
        dt(2025, 1, 1, 0, 0),
        dt(2026, 1, 1, 0, 0),
        &ExpandOptions {
            max_occurrences: 7,
            ..ExpandOptions::default()
        },
    )
    .expect("should expand");

    assert_eq!(occurrences.len(), 7);
}

#[test]
fn strict_after_skips_a_start_exactly_at_from() {
    let occurrences = expand_in_window(
        &rule("FREQ=DAILY;COUNT=3"),
        dt(2025, 1, 1, 9, 0),
        dt(2025, 1, 1, 9, 30),
        dt(2025, 1, 1, 9, 0),
        dt(2025, 2, 1, 0, 0),
        &ExpandOptions {
            strict_after: true,
            ..ExpandOptions::default()
        },
    )
    .expect("should expand");

    let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();
    assert_eq!(starts, vec![dt(2025, 1, 2, 9, 0), dt(2025, 1, 3, 9, 0)]);
}

#[test]
fn invalid_rule_is_rejected_before_expansion() {
    let mut bad = rule("FREQ=DAILY;COUNT=3");
    bad.interval = 0;
    let result = expand_in_window(
        &bad,
        dt(2025, 1, 1, 9, 0),
        dt(2025, 1, 1, 9, 30),
        dt(2025, 1, 1, 0, 0),
        dt(2025, 2, 1, 0, 0),
        &ExpandOptions::default(),
    );
    assert!(matches!(
        result,
        Err(EngineError::InvalidRule {
            field: "INTERVAL",
            ..
        })
    ));
}

#[test]
fn inverted_anchor_span_is_rejected() {
    let result = expand_in_window(
        &rule("FREQ=DAILY"),
        dt(2025, 1, 1, 9, 0),
        dt(2025, 1, 1, 8, 0),
        dt(2025, 1, 1, 0, 0),
        dt(2025, 2, 1, 0, 0),
        &ExpandOptions::default(),
    );
    assert!(matches!(result, Err(EngineError::InvalidOperation(_))));
}

// ---------------------------------------------------------------------------
// next_occurrence / is_occurrence_start
// ---------------------------------------------------------------------------

#[test]
fn next_occurrence_is_strictly_after() {
    let r = rule("FREQ=DAILY;COUNT=5");
    let next = next_occurrence(&r, dt(2025, 1, 1, 9, 0), dt(2025, 1, 1, 9, 30), dt(2025, 1, 2, 9, 0))
        .expect("should succeed")
        .expect("series continues past Jan 2");

    assert_eq!(next.start, dt(2025, 1, 3, 9, 0));
    assert_eq!(next.end, dt(2025, 1, 3, 9, 30));
}

#[test]
fn next_occurrence_none_when_the_series_is_exhausted() {
    let r = rule("FREQ=DAILY;COUNT=3");
    let next = next_occurrence(&r, dt(2025, 1, 1, 9, 0), dt(2025, 1, 1, 9, 30), dt(2025, 1, 3, 9, 0))
        .expect("should succeed");
    assert_eq!(next, None);
}

#[test]
fn is_occurrence_start_requires_exact_timestamps() {
    let r = rule("FREQ=DAILY;COUNT=5");
    let anchor = dt(2025, 1, 1, 9, 0);

    assert!(is_occurrence_start(&r, anchor, dt(2025, 1, 3, 9, 0)).unwrap());
    assert!(!is_occurrence_start(&r, anchor, dt(2025, 1, 3, 10, 0)).unwrap());
    assert!(!is_occurrence_start(&r, anchor, dt(2025, 1, 6, 9, 0)).unwrap(), "past COUNT");
}
