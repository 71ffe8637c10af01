//! Position notification verification
//!
//! Count-bound and timing checks over positions at which marker/periodic
//! callbacks were observed to fire. Since the device's true position is
//! not separately queryable at callback time, observed positions are
//! approximated by elapsed wall-clock time times the sample rate, and
//! only relative spacing from the first observed event is testable.

use crate::error::VerifyError;
use crate::stats::DriftStatistic;
use audioprobe_core::clock::tolerance_frames;
use parking_lot::Mutex;
use tracing::debug;

/// Default accepted deviation of an event from its expected position.
pub const DEFAULT_EVENT_TOLERANCE_MS: u64 = 80;

/// Thread-safe append-only log of event positions.
///
/// Written by the device's delivery thread, drained by the driver thread
/// only after the session is confirmed stopped.
#[derive(Debug, Default)]
pub struct EventLog {
    positions: Mutex<Vec<u64>>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one observed event position.
    pub fn append(&self, position: u64) {
        self.positions.lock().push(position);
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        self.positions.lock().len()
    }

    /// Whether anything was recorded.
    pub fn is_empty(&self) -> bool {
        self.positions.lock().is_empty()
    }

    /// Copy of the recorded positions, in arrival order.
    pub fn snapshot(&self) -> Vec<u64> {
        self.positions.lock().clone()
    }
}

/// Expected `(min, max)` event counts for a notification stream.
///
/// `min` comes from the nominal streaming duration; `max` from the actual
/// duration plus one trailing event, since stop is not instantaneous
/// relative to event delivery.
pub fn expected_event_bounds(period_hz: f64, nominal_ms: u64, actual_ms: u64) -> (u64, u64) {
    let min = (period_hz * nominal_ms as f64 / 1000.0).floor() as u64;
    let max = (period_hz * actual_ms as f64 / 1000.0).floor() as u64 + 1;
    (min, max)
}

/// Verify an observed event count against the bounds above.
pub fn verify_event_counts(
    label: &'static str,
    observed: usize,
    period_hz: f64,
    nominal_ms: u64,
    actual_ms: u64,
) -> Result<(), VerifyError> {
    let (min, max) = expected_event_bounds(period_hz, nominal_ms, actual_ms);
    debug!(label, observed, min, max, "event count check");
    if (observed as u64) < min || (observed as u64) > max {
        return Err(VerifyError::Count {
            label,
            observed,
            min,
            max,
        });
    }
    Ok(())
}

/// Verify the relative timing of observed events against their expected
/// period and fold the millisecond-domain deviations into a statistic.
///
/// Events positioned beyond `nominal_frames` are excluded; they may be
/// artifacts of the stop-delay grace window (they still count for the
/// count bounds, which are checked separately).
pub fn verify_event_timing(
    observed: &[u64],
    period_frames: u64,
    sample_rate_hz: u32,
    tolerance_ms: u64,
    nominal_frames: u64,
) -> Result<DriftStatistic, VerifyError> {
    let mut stat = DriftStatistic::new();
    if observed.is_empty() || period_frames == 0 {
        return Ok(stat);
    }
    let tolerance = tolerance_frames(sample_rate_hz, tolerance_ms);
    let origin = observed[0];
    for (i, &position) in observed.iter().enumerate().skip(1) {
        if position > nominal_frames {
            // Don't consider notifications delivered while stopping.
            break;
        }
        let expected = period_frames * i as u64;
        let actual = position.saturating_sub(origin);
        let deviation = expected.abs_diff(actual);
        if deviation > tolerance {
            return Err(VerifyError::EventTiming {
                index: i,
                expected_frames: expected,
                actual_frames: actual,
                deviation_frames: deviation,
                tolerance_frames: tolerance,
            });
        }
        stat.add((actual as f64 - expected as f64) * 1000.0 / f64::from(sample_rate_hz));
    }
    Ok(stat)
}

/// Verify an accumulated expected position against the observed one.
///
/// Used by variable-rate scenarios where the expectation is the sum of
/// `rate_i * interval_i` over each interval's own rate setting.
pub fn verify_accumulated_position(
    expected_frames: u64,
    actual_frames: u64,
    tolerance_frames: u64,
) -> Result<(), VerifyError> {
    let deviation = expected_frames.abs_diff(actual_frames);
    debug!(
        expected_frames,
        actual_frames, deviation, tolerance_frames, "accumulated position check"
    );
    if deviation > tolerance_frames {
        return Err(VerifyError::Position {
            expected_frames,
            actual_frames,
            tolerance_frames,
        });
    }
    Ok(())
}
