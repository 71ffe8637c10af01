//! Verification failure types
//!
//! Every variant is fatal to the scenario it occurs in; none is retried.
//! Messages carry the literal expected and actual values so a failure can
//! be told apart from a harness-tolerance miscalibration.

use thiserror::Error;

/// A device contract violation detected by a verifier.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    /// The caller handed the verifier unusable input (identical frame
    /// positions, unordered samples, mismatched timebases).
    #[error("invalid verification input: {reason}")]
    InvalidInput {
        /// What was wrong with the input
        reason: String,
    },

    /// The linear-rate invariant between two timestamps does not hold.
    #[error(
        "frame clock drift: ratio {ratio:.6} outside 1.0 +/- {tolerance} \
         (time diff {time_diff_nanos} ns, frame diff {frame_diff}, \
         expected {expected_nanos} ns from frames)"
    )]
    Drift {
        /// Observed time-per-frames ratio
        ratio: f64,
        /// Accepted deviation from 1.0
        tolerance: f64,
        /// Wall-clock nanoseconds between the two samples
        time_diff_nanos: i64,
        /// Frames elapsed between the two samples
        frame_diff: u64,
        /// Nanoseconds the frame diff should have taken at the sample rate
        expected_nanos: i64,
    },

    /// A quantity that must never decrease went backward.
    #[error("{quantity} went backward: {previous} -> {current}")]
    NonMonotonic {
        /// Name of the violated quantity
        quantity: &'static str,
        /// Earlier observation
        previous: i64,
        /// Later, smaller observation
        current: i64,
    },

    /// An event count fell outside its expected bounds.
    #[error("{label} count {observed} outside expected {min}..={max}")]
    Count {
        /// Which notification stream was off
        label: &'static str,
        /// Events actually observed
        observed: usize,
        /// Fewest events acceptable
        min: u64,
        /// Most events acceptable
        max: u64,
    },

    /// An event fired too far from its expected position.
    #[error(
        "event {index}: expected {expected_frames} frames from origin, \
         observed {actual_frames} (deviation {deviation_frames}, \
         tolerance {tolerance_frames})"
    )]
    EventTiming {
        /// Index of the offending event, relative to the first observed
        index: usize,
        /// Expected offset in frames
        expected_frames: u64,
        /// Observed offset in frames
        actual_frames: u64,
        /// Absolute deviation in frames
        deviation_frames: u64,
        /// Accepted deviation in frames
        tolerance_frames: u64,
    },

    /// Back-to-back timestamps disagree with the elapsed time between them.
    #[error(
        "timestamp jitter {jitter_frames} frames exceeds allowed \
         {allowed_frames} (frame delta {delta_frames}, expected {expected_frames})"
    )]
    Jitter {
        /// Frames the position advanced between polls
        delta_frames: u64,
        /// Frames the elapsed time predicts
        expected_frames: u64,
        /// Absolute difference between the two
        jitter_frames: u64,
        /// Accepted jitter budget in frames
        allowed_frames: u64,
    },

    /// The two timebase views of one published timestamp disagree on the
    /// frame position.
    #[error(
        "timebases disagree on frame position: monotonic {monotonic_frames}, \
         boot-time {boottime_frames}"
    )]
    TimebaseMismatch {
        /// Frame position reported against the monotonic clock
        monotonic_frames: u64,
        /// Frame position reported against the boot-time clock
        boottime_frames: u64,
    },

    /// An accumulated expected position diverged from the observed one.
    #[error(
        "position diverged: expected {expected_frames} frames, observed \
         {actual_frames} (tolerance {tolerance_frames})"
    )]
    Position {
        /// Expected accumulated frames
        expected_frames: u64,
        /// Observed frames
        actual_frames: u64,
        /// Accepted deviation in frames
        tolerance_frames: u64,
    },
}
