//! Frame clock continuity verification
//!
//! Checks that two timestamps from one streaming session satisfy the
//! linear-rate relationship `timeDiff ~= frameDiff * 1e9 / sampleRate`.

use crate::error::VerifyError;
use audioprobe_core::clock::NANOS_PER_SECOND;
use audioprobe_core::FrameClockSample;
use tracing::debug;

/// Default accepted deviation of the time/frames ratio from 1.0.
///
/// Real clock-domain conversion is usually accurate to a part per thousand
/// or better; one percent leaves headroom for hardware jitter.
pub const DEFAULT_CONTINUITY_TOLERANCE: f64 = 0.01;

/// Verify the linear-rate invariant between two samples of one session
/// with the default 1% tolerance. Returns the observed ratio.
pub fn verify_continuity(
    start: &FrameClockSample,
    stop: &FrameClockSample,
    sample_rate_hz: u32,
) -> Result<f64, VerifyError> {
    verify_continuity_with_tolerance(start, stop, sample_rate_hz, DEFAULT_CONTINUITY_TOLERANCE)
}

/// Verify the linear-rate invariant with a caller-chosen tolerance.
///
/// The samples must be ordered (`stop` after `start`) and must have
/// advanced by at least one frame; anything else is an input error, not a
/// drift finding.
pub fn verify_continuity_with_tolerance(
    start: &FrameClockSample,
    stop: &FrameClockSample,
    sample_rate_hz: u32,
    tolerance: f64,
) -> Result<f64, VerifyError> {
    if sample_rate_hz == 0 {
        return Err(VerifyError::InvalidInput {
            reason: "sample rate must be positive".to_string(),
        });
    }
    if start.timebase != stop.timebase {
        return Err(VerifyError::InvalidInput {
            reason: format!(
                "samples from different timebases ({:?} vs {:?})",
                start.timebase, stop.timebase
            ),
        });
    }
    if stop.time_nanos <= start.time_nanos {
        return Err(VerifyError::InvalidInput {
            reason: format!(
                "samples not time-ordered ({} ns then {} ns)",
                start.time_nanos, stop.time_nanos
            ),
        });
    }
    if stop.frame_position < start.frame_position {
        return Err(VerifyError::NonMonotonic {
            quantity: "frame position",
            previous: start.frame_position as i64,
            current: stop.frame_position as i64,
        });
    }
    let frame_diff = stop.frame_position - start.frame_position;
    if frame_diff == 0 {
        return Err(VerifyError::InvalidInput {
            reason: "identical frame positions; continuity is undefined".to_string(),
        });
    }

    let time_diff_nanos = stop.time_nanos - start.time_nanos;
    let expected_nanos = (frame_diff as i64) * NANOS_PER_SECOND / i64::from(sample_rate_hz);
    let ratio = time_diff_nanos as f64 / expected_nanos as f64;
    debug!(
        ratio,
        time_diff_nanos, frame_diff, expected_nanos, "continuity check"
    );
    if (ratio - 1.0).abs() > tolerance {
        return Err(VerifyError::Drift {
            ratio,
            tolerance,
            time_diff_nanos,
            frame_diff,
            expected_nanos,
        });
    }
    Ok(ratio)
}

/// Verify one step of a back-to-back timestamp polling sequence.
///
/// Both deltas must be non-negative, and the frame delta must stay within
/// `allowed_frames` of what the elapsed time predicts at the sample rate.
/// Returns the signed jitter in frames for statistics.
pub fn verify_timestamp_step(
    previous: &FrameClockSample,
    current: &FrameClockSample,
    sample_rate_hz: u32,
    allowed_frames: u64,
) -> Result<i64, VerifyError> {
    if current.time_nanos < previous.time_nanos {
        return Err(VerifyError::NonMonotonic {
            quantity: "timestamp time",
            previous: previous.time_nanos,
            current: current.time_nanos,
        });
    }
    if current.frame_position < previous.frame_position {
        return Err(VerifyError::NonMonotonic {
            quantity: "frame position",
            previous: previous.frame_position as i64,
            current: current.frame_position as i64,
        });
    }
    let delta_frames = current.frame_position - previous.frame_position;
    let delta_time = current.time_nanos - previous.time_nanos;
    let expected_frames =
        (delta_time as u64).saturating_mul(u64::from(sample_rate_hz)) / NANOS_PER_SECOND as u64;
    let jitter = delta_frames as i64 - expected_frames as i64;
    if jitter.unsigned_abs() >= allowed_frames {
        return Err(VerifyError::Jitter {
            delta_frames,
            expected_frames,
            jitter_frames: jitter.unsigned_abs(),
            allowed_frames,
        });
    }
    Ok(jitter)
}
