//! Position notification recorder
//!
//! Listener installed on the device under test. Notifications arrive on
//! the device's delivery thread; the recorder timestamps each one by
//! elapsed wall-clock time converted to frames (the device's true position
//! is not separately queryable at callback time) and appends it to a
//! mutex-guarded log. The driver thread drains the logs only after the
//! session is stopped.
//!
//! A marker notification re-arms the marker one period further, so a
//! single-shot marker behaves as a recurring one for the duration of the
//! session.

use audioprobe_core::{AudioDevice, PositionListener};
use audioprobe_verify::EventLog;
use parking_lot::Mutex;
use std::time::Instant;
use tracing::warn;

struct RecorderState {
    active: bool,
    sample_rate_hz: u32,
    started_at: Option<Instant>,
    marker_period_frames: u64,
    next_marker: u64,
    late_events: u32,
}

/// Records marker and periodic notification positions for one session.
pub struct PositionRecorder {
    state: Mutex<RecorderState>,
    markers: EventLog,
    periodics: EventLog,
}

impl PositionRecorder {
    /// Create an idle recorder.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RecorderState {
                active: false,
                sample_rate_hz: 0,
                started_at: None,
                marker_period_frames: 0,
                next_marker: 0,
                late_events: 0,
            }),
            markers: EventLog::new(),
            periodics: EventLog::new(),
        }
    }

    /// Activate the recorder just before the stream starts.
    ///
    /// `marker_period_frames` of zero means no marker re-arming.
    pub fn start(&self, sample_rate_hz: u32, marker_period_frames: u64) {
        let mut state = self.state.lock();
        state.active = true;
        state.sample_rate_hz = sample_rate_hz;
        state.started_at = Some(Instant::now());
        state.marker_period_frames = marker_period_frames;
        state.next_marker = marker_period_frames;
    }

    /// Deactivate the recorder. Called some time after the device stopped,
    /// as in-flight messages may still be delivered right after stop.
    pub fn stop(&self) {
        self.state.lock().active = false;
    }

    /// Marker positions observed, in arrival order.
    pub fn markers(&self) -> Vec<u64> {
        self.markers.snapshot()
    }

    /// Periodic notification positions observed, in arrival order.
    pub fn periodics(&self) -> Vec<u64> {
        self.periodics.snapshot()
    }

    /// Notifications that arrived while the recorder was inactive.
    pub fn late_events(&self) -> u32 {
        self.state.lock().late_events
    }

    /// Approximate stream position from elapsed time at the sample rate.
    fn position_now(state: &RecorderState) -> u64 {
        let Some(started_at) = state.started_at else {
            return 0;
        };
        let delta_ms = started_at.elapsed().as_millis() as u64;
        delta_ms * u64::from(state.sample_rate_hz) / 1000
    }
}

impl Default for PositionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionListener for PositionRecorder {
    fn on_marker_reached(&self, device: &dyn AudioDevice) {
        let rearm = {
            let mut state = self.state.lock();
            if !state.active {
                state.late_events += 1;
                warn!("marker notification after session stop");
                return;
            }
            self.markers.append(Self::position_now(&state));
            if state.marker_period_frames == 0 {
                None
            } else {
                state.next_marker += state.marker_period_frames;
                Some(state.next_marker)
            }
        };
        if let Some(next) = rearm {
            if let Err(e) = device.set_marker_position(next) {
                warn!(error = %e, next, "failed to re-arm marker");
            }
        }
    }

    fn on_periodic_notification(&self, _device: &dyn AudioDevice) {
        let mut state = self.state.lock();
        if !state.active {
            state.late_events += 1;
            warn!("periodic notification after session stop");
            return;
        }
        self.periodics.append(Self::position_now(&state));
    }
}
