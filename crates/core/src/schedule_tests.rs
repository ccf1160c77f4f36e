// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::strategies::{arb_days, arb_reference, arb_time_of_day, arb_timezone};
use proptest::prelude::*;
use yare::parameterized;

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

#[test]
fn empty_days_default_to_workdays() {
    let days = normalize_days::<&str>(&[]).unwrap();
    assert_eq!(days, Weekday::WORKDAYS.to_vec());
}

#[test]
fn days_are_deduplicated_and_sorted() {
    let days = normalize_days(&["FRI", "mon", "Sun", "fri", "Mon"]).unwrap();
    assert_eq!(days, vec![Weekday::Sun, Weekday::Mon, Weekday::Fri]);
}

#[test]
fn unknown_day_is_rejected() {
    let err = normalize_days(&["mon", "funday"]).unwrap_err();
    assert_eq!(err, ScheduleError::InvalidDay("funday".to_string()));
}

#[parameterized(
    morning = { "09:00", 9, 0 },
    single_digit_hour = { "7:05", 7, 5 },
    last_minute = { "23:59", 23, 59 },
    padded = { " 12:30 ", 12, 30 },
)]
fn time_of_day_parses(raw: &str, hour: u8, minute: u8) {
    assert_eq!(TimeOfDay::parse(raw).unwrap(), TimeOfDay { hour, minute });
}

#[parameterized(
    hour_overflow = { "24:00" },
    minute_overflow = { "10:60" },
    missing_colon = { "0900" },
    short_minute = { "9:5" },
    letters = { "ab:cd" },
    empty = { "" },
)]
fn time_of_day_rejects(raw: &str) {
    assert!(matches!(TimeOfDay::parse(raw), Err(ScheduleError::InvalidTime(_))));
}

#[test]
fn time_of_day_serde_is_string() {
    let t = TimeOfDay::new(9, 5).unwrap();
    assert_eq!(serde_json::to_string(&t).unwrap(), "\"09:05\"");
    let parsed: TimeOfDay = serde_json::from_str("\"18:45\"").unwrap();
    assert_eq!(parsed, TimeOfDay::new(18, 45).unwrap());
}

#[test]
fn unknown_timezone_is_rejected() {
    assert!(matches!(
        Schedule::parse::<&str>(&[], "09:00", "Mars/Olympus"),
        Err(ScheduleError::InvalidTimezone(_))
    ));
}

#[test]
fn default_days_from_sunday_morning_runs_monday() {
    let schedule = Schedule::parse::<&str>(&[], "09:00", "UTC").unwrap();
    assert_eq!(schedule.days, Weekday::WORKDAYS.to_vec());
    let next = schedule.next_after(utc("2026-02-01T10:00:00Z")).unwrap();
    assert_eq!(next, utc("2026-02-02T09:00:00Z"));
}

#[parameterized(
    later_today = { "2026-02-02T08:00:00Z", "2026-02-02T09:00:00Z" },
    exact_match_moves_on = { "2026-02-02T09:00:00Z", "2026-02-03T09:00:00Z" },
    one_second_before = { "2026-02-02T08:59:59Z", "2026-02-02T09:00:00Z" },
    friday_evening = { "2026-02-06T18:00:00Z", "2026-02-09T09:00:00Z" },
)]
fn next_is_strictly_after_reference(reference: &str, expected: &str) {
    let schedule = Schedule::parse::<&str>(&[], "09:00", "UTC").unwrap();
    assert_eq!(schedule.next_after(utc(reference)).unwrap(), utc(expected));
}

#[test]
fn next_respects_timezone() {
    let schedule = Schedule::parse(&["wed"], "09:00", "America/New_York").unwrap();
    // Wednesday 2026-02-04 09:00 EST is 14:00 UTC.
    let next = schedule.next_after(utc("2026-02-02T00:00:00Z")).unwrap();
    assert_eq!(next, utc("2026-02-04T14:00:00Z"));
}

#[test]
fn local_weekday_differs_from_utc_weekday() {
    // 23:30 Sunday in Tokyo is 14:30 Sunday UTC.
    let schedule = Schedule::parse(&["sun"], "23:30", "Asia/Tokyo").unwrap();
    let next = schedule.next_after(utc("2026-02-01T00:00:00Z")).unwrap();
    assert_eq!(next, utc("2026-02-01T14:30:00Z"));
}

#[test]
fn spring_forward_gap_shifts_one_hour() {
    // 2026-03-08 02:30 does not exist in New York; 03:30 EDT is 07:30 UTC.
    let schedule = Schedule::parse(&["sun"], "02:30", "America/New_York").unwrap();
    let next = schedule.next_after(utc("2026-03-07T12:00:00Z")).unwrap();
    assert_eq!(next, utc("2026-03-08T07:30:00Z"));
}

#[test]
fn fall_back_ambiguity_takes_earliest() {
    // 2026-11-01 01:30 happens twice in New York; the EDT instant is 05:30 UTC.
    let schedule = Schedule::parse(&["sun"], "01:30", "America/New_York").unwrap();
    let next = schedule.next_after(utc("2026-10-31T12:00:00Z")).unwrap();
    assert_eq!(next, utc("2026-11-01T05:30:00Z"));
}

#[test]
fn empty_day_set_fails_closed() {
    let schedule = Schedule {
        days: Vec::new(),
        time_of_day: TimeOfDay::new(9, 0).unwrap(),
        timezone: Tz::UTC,
    };
    assert_eq!(schedule.next_after(utc("2026-02-01T10:00:00Z")), Err(ScheduleError::NoSlot));
}

proptest! {
    #[test]
    fn next_run_lands_on_allowed_day_at_configured_time(
        days in arb_days(),
        time in arb_time_of_day(),
        tz in arb_timezone(),
        reference in arb_reference(),
    ) {
        let schedule = Schedule { days: days.clone(), time_of_day: time, timezone: tz };
        let next = schedule.next_after(reference).unwrap();

        prop_assert!(next > reference);
        prop_assert!(next - reference <= chrono::Duration::days(8));

        let local = next.with_timezone(&tz);
        prop_assert!(days.contains(&Weekday::from_chrono(local.weekday())));

        let configured = local.date_naive().and_time(time.as_naive());
        let exists = !matches!(tz.from_local_datetime(&configured), LocalResult::None);
        if exists {
            prop_assert_eq!(local.naive_local(), configured);
        }
    }

    #[test]
    fn normalized_days_are_sorted_unique_and_nonempty(days in proptest::collection::vec(
        prop::sample::select(Weekday::ALL.to_vec()), 0..10,
    )) {
        let tokens: Vec<String> = days.iter().map(|d| d.as_str().to_uppercase()).collect();
        let normalized = normalize_days(&tokens).unwrap();
        prop_assert!(!normalized.is_empty());
        prop_assert!(normalized.windows(2).all(|w| w[0] < w[1]));
        for day in &days {
            prop_assert!(normalized.contains(day));
        }
    }
}
