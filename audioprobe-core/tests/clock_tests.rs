//! Unit tests for the frame clock primitives

use audioprobe_core::clock::{
    boottime_nanos, frames_for_duration_ms, monotonic_nanos, nanos_for_frames, now_nanos,
    tolerance_frames, Timebase, BOOTTIME_OFFSET_NANOS, NANOS_PER_SECOND,
};
use std::thread;
use std::time::Duration;

#[test]
fn test_monotonic_clock_increases() {
    let first = monotonic_nanos();
    thread::sleep(Duration::from_millis(5));
    let second = monotonic_nanos();
    assert!(second > first, "monotonic clock must advance");
}

#[test]
fn test_boottime_tracks_monotonic() {
    let mono = monotonic_nanos();
    let boot = boottime_nanos();
    let offset = boot - mono;
    // The two reads are microseconds apart; the offset must be the fixed
    // constant up to that slack.
    assert!((offset - BOOTTIME_OFFSET_NANOS).abs() < NANOS_PER_SECOND / 100);
}

#[test]
fn test_now_nanos_selects_timebase() {
    let mono = now_nanos(Timebase::Monotonic);
    let boot = now_nanos(Timebase::BootTime);
    assert!(boot > mono);
}

#[test]
fn test_frames_for_duration() {
    // 2000 ms at 23456 Hz
    assert_eq!(frames_for_duration_ms(23_456, 2000), 46_912);
    assert_eq!(frames_for_duration_ms(48_000, 1000), 48_000);
    assert_eq!(frames_for_duration_ms(44_100, 0), 0);
}

#[test]
fn test_nanos_for_frames() {
    assert_eq!(nanos_for_frames(48_000, 48_000), NANOS_PER_SECOND);
    assert_eq!(nanos_for_frames(48_000, 24_000), NANOS_PER_SECOND / 2);
}

#[test]
fn test_tolerance_frames() {
    // 80 ms at 44100 Hz
    assert_eq!(tolerance_frames(44_100, 80), 3528);
    // 60 ms at 96000 Hz
    assert_eq!(tolerance_frames(96_000, 60), 5760);
}
