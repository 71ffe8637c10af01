//! Capture session harness
//!
//! Drives a capture device through the canonical verification lifecycle:
//! assert the pre-start timestamp negative path, start the stream, read a
//! one-frame anchor then fixed-size chunks until the target frame count,
//! capture a start timestamp within a bounded retry budget, stop with the
//! grace windows asynchronous notification delivery needs, then verify
//! everything collected: dual-timebase agreement, position preservation
//! across stop, the linear-rate continuity invariant, and notification
//! count/timing bounds.
//!
//! Exactly one driver task owns the transfer loop; notification collection
//! happens on the device's delivery thread through [`PositionRecorder`].

use crate::error::SessionError;
use crate::recorder::PositionRecorder;
use audioprobe_core::clock::{self, FrameClockSample, Timebase, NANOS_PER_MILLIS};
use audioprobe_core::{AudioDevice, DeviceError, DeviceState, PositionListener, TransferMode};
use audioprobe_report::{MetricDirection, MetricUnit, ScenarioReport};
use audioprobe_verify::{
    verify_continuity_with_tolerance, verify_event_counts, verify_event_timing, DriftStatistic,
    VerifyError, DEFAULT_CONTINUITY_TOLERANCE, DEFAULT_EVENT_TOLERANCE_MS,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration of one capture verification session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Scenario name used in the report
    pub name: String,

    /// Nominal streaming duration in milliseconds
    pub duration_ms: u64,

    /// Frames per chunked read after the one-frame anchor read
    pub chunk_frames: usize,

    /// Marker notifications per second; zero disables the marker
    pub marker_periods_per_second: u32,

    /// Periodic notifications per second; zero disables them
    pub update_periods_per_second: u32,

    /// Re-arm the marker one period further after each fire. When false
    /// the marker is single-shot and exactly one event is expected.
    pub rearm_marker: bool,

    /// Most timestamp queries tolerated before the first one must succeed
    pub timestamp_retry_budget: u32,

    /// Accepted ratio deviation for the continuity check
    pub continuity_tolerance: f64,

    /// Accepted event timing deviation in milliseconds
    pub event_tolerance_ms: u64,

    /// Wait for in-flight notifications around stop
    pub event_grace: Duration,

    /// Inactivity window after stop before final timestamps are taken
    pub post_stop_inactivity: Duration,

    /// Blocking transfer budget is `nominal * factor`, at least the floor
    pub transfer_timeout_factor: f64,

    /// Lower bound of the blocking transfer budget
    pub transfer_timeout_floor: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "capture_session".to_string(),
            duration_ms: 2000,
            chunk_frames: 512,
            marker_periods_per_second: 0,
            update_periods_per_second: 0,
            rearm_marker: true,
            timestamp_retry_budget: 100,
            continuity_tolerance: DEFAULT_CONTINUITY_TOLERANCE,
            event_tolerance_ms: DEFAULT_EVENT_TOLERANCE_MS,
            event_grace: Duration::from_millis(30),
            post_stop_inactivity: Duration::from_millis(1000),
            transfer_timeout_factor: 1.5,
            transfer_timeout_floor: Duration::from_millis(100),
        }
    }
}

/// Everything a completed session hands back for inspection.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Unique id of this session run
    pub session_id: Uuid,
    /// First timestamp captured after start
    pub start_timestamp: FrameClockSample,
    /// Final timestamp captured after stop
    pub stop_timestamp: FrameClockSample,
    /// Observed time/frames continuity ratio
    pub ratio: f64,
    /// Frames the session set out to stream
    pub target_frames: u64,
    /// Marker positions observed
    pub markers: Vec<u64>,
    /// Periodic notification positions observed
    pub periodics: Vec<u64>,
    /// Millisecond-domain marker timing deviations
    pub marker_stats: DriftStatistic,
    /// Millisecond-domain periodic timing deviations
    pub periodic_stats: DriftStatistic,
    /// Delay between start and the first frame of data, in milliseconds
    pub cold_start_ms: u64,
    /// Collected scenario metrics
    pub report: ScenarioReport,
}

/// Harness for one capture verification scenario.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    config: SessionConfig,
}

impl CaptureSession {
    /// Create a session harness with the given configuration.
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Blocking read under the session's timeout budget.
    ///
    /// A timeout means the device stalled: the stream is stopped to
    /// unblock the reader and the scenario fails.
    async fn read_frames<D>(&self, device: &D, frames: usize) -> Result<usize, SessionError>
    where
        D: AudioDevice + Clone + 'static,
    {
        let config = device.config();
        let nominal =
            Duration::from_secs_f64(frames as f64 / f64::from(config.sample_rate_hz));
        let budget = nominal
            .mul_f64(self.config.transfer_timeout_factor)
            .max(self.config.transfer_timeout_floor);
        let reader = device.clone();
        let channels = config.channels.channel_count();
        let task = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0.0f32; frames * channels];
            reader.read(&mut buf, frames, TransferMode::Blocking)
        });
        match tokio::time::timeout(budget, task).await {
            Ok(joined) => {
                let result = joined.map_err(|e| DeviceError::Backend {
                    reason: format!("reader task failed: {}", e),
                })?;
                Ok(result?)
            }
            Err(_) => {
                warn!(?budget, "blocking read stalled; stopping device");
                let _ = device.stop();
                Err(SessionError::Timeout {
                    op: "read",
                    budget,
                })
            }
        }
    }

    /// Run the scenario against `device` and verify every invariant.
    pub async fn run<D>(&self, device: &D) -> Result<SessionOutcome, SessionError>
    where
        D: AudioDevice + Clone + 'static,
    {
        let session_id = Uuid::new_v4();
        let device_config = device.config();
        let sample_rate = device_config.sample_rate_hz;
        let target_frames = clock::frames_for_duration_ms(sample_rate, self.config.duration_ms);
        info!(
            %session_id,
            scenario = %self.config.name,
            sample_rate,
            target_frames,
            "starting capture session"
        );

        // Notification setup happens before start; the marker arms one
        // period in and re-arms itself from the callback.
        let marker_period = if self.config.marker_periods_per_second > 0 {
            u64::from(sample_rate / self.config.marker_periods_per_second)
        } else {
            0
        };
        let update_period = if self.config.update_periods_per_second > 0 {
            u64::from(sample_rate / self.config.update_periods_per_second)
        } else {
            0
        };
        let recorder = Arc::new(PositionRecorder::new());
        device.set_position_listener(Some(recorder.clone() as Arc<dyn PositionListener>))?;
        if marker_period > 0 {
            device.set_marker_position(marker_period)?;
        }
        device.set_notification_period(update_period)?;

        // On a fresh device there is no timestamp before start; this
        // negative path is part of the contract. A reused device keeps its
        // frozen post-stop timestamp, so the check only applies once.
        if device.state() == DeviceState::Initialized {
            match device.timestamp(Timebase::Monotonic) {
                Err(DeviceError::NotReady) => {}
                Ok(ts) => {
                    return Err(VerifyError::InvalidInput {
                        reason: format!(
                            "timestamp available before start (frame position {})",
                            ts.frame_position
                        ),
                    }
                    .into())
                }
                Err(other) => return Err(other.into()),
            }
        }

        let wall_start_nanos = clock::monotonic_nanos();
        let rearm_period = if self.config.rearm_marker { marker_period } else { 0 };
        recorder.start(sample_rate, rearm_period);
        device.start()?;
        let started_at = Instant::now();
        let state = device.state();
        if state != DeviceState::Active {
            return Err(SessionError::UnexpectedState {
                expected: DeviceState::Active,
                actual: state,
            });
        }

        // Read a single anchor frame first, then full chunks. The first
        // timestamp may lag the first data since the two take different
        // paths; tolerate a bounded number of failed queries.
        let mut frames_read: u64 = 0;
        let mut first_sample_at: Option<Instant> = None;
        let mut start_timestamp: Option<FrameClockSample> = None;
        let mut timestamp_attempts: u32 = 0;
        while frames_read < target_frames {
            let amount = if frames_read == 0 {
                1
            } else {
                self.config
                    .chunk_frames
                    .min((target_frames - frames_read) as usize)
            };
            let transferred = self.read_frames(device, amount).await?;
            if transferred != amount {
                return Err(SessionError::ShortTransfer {
                    op: "read",
                    requested: amount,
                    transferred,
                });
            }
            if frames_read == 0 {
                first_sample_at = Some(Instant::now());
            }
            frames_read += transferred as u64;
            if start_timestamp.is_none() {
                match device.timestamp(Timebase::Monotonic) {
                    Ok(ts) => start_timestamp = Some(ts),
                    Err(DeviceError::NotReady) => {
                        timestamp_attempts += 1;
                        if timestamp_attempts > self.config.timestamp_retry_budget {
                            return Err(SessionError::TimestampUnavailable {
                                attempts: timestamp_attempts,
                            });
                        }
                    }
                    Err(other) => return Err(other.into()),
                }
            }
        }
        let reads_done_at = Instant::now();
        let start_timestamp = start_timestamp.ok_or(SessionError::TimestampUnavailable {
            attempts: timestamp_attempts,
        })?;

        let first_sample_at = first_sample_at.unwrap_or(reads_done_at);
        let cold_start_ms = first_sample_at.duration_since(started_at).as_millis() as u64;
        if cold_start_ms > 200 {
            warn!(cold_start_ms, "cold input start time way too long");
        } else if cold_start_ms > 100 {
            warn!(cold_start_ms, "cold input start time too long");
        }

        // Events ride a separate delivery thread; give the last ones a
        // moment to land before and after stopping.
        tokio::time::sleep(self.config.event_grace).await;
        let stop_requested_at = Instant::now();
        device.stop()?;
        let stop_done_at = Instant::now();
        let state = device.state();
        if state != DeviceState::Stopped {
            return Err(SessionError::UnexpectedState {
                expected: DeviceState::Stopped,
                actual: state,
            });
        }
        tokio::time::sleep(self.config.event_grace).await;
        recorder.stop();
        let actual_streaming_ms = stop_done_at.duration_since(first_sample_at).as_millis() as u64;

        // Let the device sit before the final timestamps; stop need not be
        // in the past of the last published sample.
        tokio::time::sleep(self.config.post_stop_inactivity).await;

        let stop_timestamp = device.timestamp(Timebase::Monotonic)?;
        let stop_timestamp_boot = device.timestamp(Timebase::BootTime)?;
        if stop_timestamp.frame_position != stop_timestamp_boot.frame_position {
            return Err(VerifyError::TimebaseMismatch {
                monotonic_frames: stop_timestamp.frame_position,
                boottime_frames: stop_timestamp_boot.frame_position,
            }
            .into());
        }

        // Stop must preserve the session's position.
        if stop_timestamp.frame_position < target_frames {
            return Err(VerifyError::Position {
                expected_frames: target_frames,
                actual_frames: stop_timestamp.frame_position,
                tolerance_frames: 0,
            }
            .into());
        }
        let elapsed_nanos = stop_timestamp.time_nanos - wall_start_nanos;
        let nominal_nanos = self.config.duration_ms as i64 * NANOS_PER_MILLIS;
        if elapsed_nanos <= nominal_nanos {
            return Err(VerifyError::InvalidInput {
                reason: format!(
                    "stop timestamp only {} ns after start; nominal duration {} ns",
                    elapsed_nanos, nominal_nanos
                ),
            }
            .into());
        }

        let ratio = verify_continuity_with_tolerance(
            &start_timestamp,
            &stop_timestamp,
            sample_rate,
            self.config.continuity_tolerance,
        )?;

        let late = recorder.late_events();
        if late > 0 {
            return Err(SessionError::LateEvents { count: late });
        }

        let markers = recorder.markers();
        let periodics = recorder.periodics();
        if marker_period > 0 {
            if self.config.rearm_marker {
                verify_event_counts(
                    "marker",
                    markers.len(),
                    f64::from(self.config.marker_periods_per_second),
                    self.config.duration_ms,
                    actual_streaming_ms,
                )?;
            } else if markers.len() != 1 {
                // Single-shot marker: it fires once and stays disarmed.
                return Err(VerifyError::Count {
                    label: "marker",
                    observed: markers.len(),
                    min: 1,
                    max: 1,
                }
                .into());
            }
        }
        if update_period > 0 {
            verify_event_counts(
                "periodic",
                periodics.len(),
                f64::from(self.config.update_periods_per_second),
                self.config.duration_ms,
                actual_streaming_ms,
            )?;
        }
        let marker_stats = verify_event_timing(
            &markers,
            marker_period,
            sample_rate,
            self.config.event_tolerance_ms,
            target_frames,
        )?;
        let periodic_stats = verify_event_timing(
            &periodics,
            update_period,
            sample_rate,
            self.config.event_tolerance_ms,
            target_frames,
        )?;

        debug!(
            ratio,
            markers = markers.len(),
            periodics = periodics.len(),
            "capture session verified"
        );

        let mut report = ScenarioReport::new(self.config.name.clone());
        report.add_value(
            "start_streaming_lag",
            cold_start_ms as f64,
            MetricUnit::Ms,
            MetricDirection::LowerBetter,
        );
        report.add_value(
            "stop_execution_time",
            stop_done_at.duration_since(stop_requested_at).as_millis() as f64,
            MetricUnit::Ms,
            MetricDirection::LowerBetter,
        );
        report.add_value(
            "total_stream_time_expected",
            self.config.duration_ms as f64,
            MetricUnit::Ms,
            MetricDirection::Neutral,
        );
        report.add_value(
            "total_stream_time_actual",
            reads_done_at.duration_since(first_sample_at).as_millis() as f64,
            MetricUnit::Ms,
            MetricDirection::Neutral,
        );
        report.add_value(
            "continuity_ratio",
            ratio,
            MetricUnit::Ratio,
            MetricDirection::Neutral,
        );
        report.add_value(
            "total_markers_actual",
            markers.len() as f64,
            MetricUnit::Count,
            MetricDirection::Neutral,
        );
        report.add_value(
            "total_periods_actual",
            periodics.len() as f64,
            MetricUnit::Count,
            MetricDirection::Neutral,
        );
        report.add_value(
            "average_marker_diff",
            marker_stats.avg(),
            MetricUnit::Ms,
            MetricDirection::LowerBetter,
        );
        report.add_value(
            "maximum_marker_abs_diff",
            marker_stats.max_abs(),
            MetricUnit::Ms,
            MetricDirection::LowerBetter,
        );
        report.add_value(
            "average_periodic_diff",
            periodic_stats.avg(),
            MetricUnit::Ms,
            MetricDirection::LowerBetter,
        );
        report.add_value(
            "maximum_periodic_abs_diff",
            periodic_stats.max_abs(),
            MetricUnit::Ms,
            MetricDirection::LowerBetter,
        );
        report.set_summary(
            "unified_abs_diff",
            (marker_stats.avg_abs() + periodic_stats.avg_abs()) / 2.0,
            MetricUnit::Ms,
            MetricDirection::LowerBetter,
        );
        report.emit();

        Ok(SessionOutcome {
            session_id,
            start_timestamp,
            stop_timestamp,
            ratio,
            target_frames,
            markers,
            periodics,
            marker_stats,
            periodic_stats,
            cold_start_ms,
            report,
        })
    }
}
