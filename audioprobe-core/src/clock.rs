//! Frame clock model
//!
//! Relates a device's frame position to wall-clock time in two timebases.
//! A frame position advancing at a sample rate of `r` Hz is expected to
//! satisfy `position(t) ~= position(t0) + r * (t - t0)`; the verification of
//! that relationship lives in `audioprobe-verify`, the primitives live here.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;

/// Nanoseconds per second.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Nanoseconds per millisecond.
pub const NANOS_PER_MILLIS: i64 = 1_000_000;

/// Fixed offset between the boot-time and monotonic clock views.
///
/// The synthetic clock models a system that had been up for a while before
/// the process started, so the two timebases are visibly distinct while
/// staying in lockstep.
pub const BOOTTIME_OFFSET_NANOS: i64 = 86_400 * NANOS_PER_SECOND;

/// Clock domain a frame-position timestamp is anchored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timebase {
    /// Process monotonic time.
    Monotonic,
    /// Time since system boot; offset from monotonic by a fixed amount.
    BootTime,
}

/// A frame position paired with the time it was observed.
///
/// Two samples taken at different times against the same frame counter are
/// only comparable within one streaming session; stop and flush reset the
/// position-to-time correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameClockSample {
    /// Frames elapsed since the session's position origin.
    pub frame_position: u64,
    /// Time of observation in the sample's timebase, in nanoseconds.
    pub time_nanos: i64,
    /// Clock domain `time_nanos` belongs to.
    pub timebase: Timebase,
}

fn process_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Current monotonic time in nanoseconds, anchored to a process-wide epoch.
///
/// Devices and harnesses both read this clock, so their times are directly
/// comparable.
pub fn monotonic_nanos() -> i64 {
    process_epoch().elapsed().as_nanos() as i64
}

/// Current boot-time clock reading in nanoseconds.
pub fn boottime_nanos() -> i64 {
    monotonic_nanos() + BOOTTIME_OFFSET_NANOS
}

/// Current reading of the given timebase in nanoseconds.
pub fn now_nanos(timebase: Timebase) -> i64 {
    match timebase {
        Timebase::Monotonic => monotonic_nanos(),
        Timebase::BootTime => boottime_nanos(),
    }
}

/// Number of frames a stream at `sample_rate_hz` produces in `millis` ms.
pub fn frames_for_duration_ms(sample_rate_hz: u32, millis: u64) -> u64 {
    millis * u64::from(sample_rate_hz) / 1000
}

/// Expected nanoseconds for `frame_count` frames at `sample_rate_hz`.
pub fn nanos_for_frames(sample_rate_hz: u32, frame_count: u64) -> i64 {
    (frame_count as i64) * NANOS_PER_SECOND / i64::from(sample_rate_hz)
}

/// Tolerance expressed in milliseconds converted to a frame budget.
pub fn tolerance_frames(sample_rate_hz: u32, tolerance_ms: u64) -> u64 {
    u64::from(sample_rate_hz) * tolerance_ms / 1000
}
