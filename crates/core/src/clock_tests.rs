//! Clock unit tests

use super::*;
use chrono::TimeZone;

#[test]
fn system_clock_advances() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}

#[test]
fn fake_clock_is_frozen_until_advanced() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).single().unwrap();
    let clock = FakeClock::at(start);
    assert_eq!(clock.now(), start);
    assert_eq!(clock.now(), start);

    clock.advance(Duration::minutes(5));
    assert_eq!(clock.now(), start + Duration::minutes(5));
}

#[test]
fn fake_clock_set_overrides_time() {
    let clock = FakeClock::new();
    let target = Utc.with_ymd_and_hms(2030, 6, 15, 8, 30, 0).single().unwrap();
    clock.set(target);
    assert_eq!(clock.now(), target);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::hours(1));
    assert_eq!(clock.now(), other.now());
}
