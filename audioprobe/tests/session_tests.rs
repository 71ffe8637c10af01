//! Integration tests for the capture session harness
//!
//! Runs the full verification lifecycle against the synthetic device and
//! checks the fatal paths with purpose-built misbehaving devices.

use audioprobe::*;
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn capture_device(sample_rate_hz: u32) -> SyntheticDevice {
    SyntheticDevice::capture(DeviceConfig {
        sample_rate_hz,
        channels: ChannelLayout::Stereo,
        encoding: SampleEncoding::Pcm16,
        buffer_frames: 2048,
    })
    .expect("open capture device")
}

// ============================================================================
// TIMESTAMP SCENARIO (23456 Hz, resampling rate)
// ============================================================================

#[tokio::test]
async fn test_timestamp_scenario_2s_stereo() {
    init_tracing();
    let device = capture_device(23_456);
    let session = CaptureSession::new(SessionConfig {
        name: "timestamp_23456".to_string(),
        duration_ms: 2000,
        ..SessionConfig::default()
    });

    let outcome = session.run(&device).await.expect("scenario passes");

    assert_eq!(outcome.target_frames, 46_912);
    assert!(outcome.stop_timestamp.frame_position >= 46_912);
    assert!(outcome.ratio >= 0.99 && outcome.ratio <= 1.01);
    assert_eq!(outcome.stop_timestamp.timebase, Timebase::Monotonic);
    assert!(outcome.report.value("continuity_ratio").is_some());

    device.release().unwrap();
}

#[tokio::test]
async fn test_two_sessions_back_to_back() {
    // Stop does not reset the position; a second session on the same
    // device continues the counter and still satisfies every invariant.
    let device = capture_device(23_456);
    let session = CaptureSession::new(SessionConfig {
        name: "timestamp_repeat".to_string(),
        duration_ms: 700,
        post_stop_inactivity: Duration::from_millis(200),
        ..SessionConfig::default()
    });

    let first = session.run(&device).await.expect("first run passes");
    let second = session.run(&device).await.expect("second run passes");
    assert!(second.stop_timestamp.frame_position >= first.stop_timestamp.frame_position);

    device.release().unwrap();
}

// ============================================================================
// NOTIFICATION SCENARIO (44100 Hz, marker + periodic)
// ============================================================================

#[tokio::test]
async fn test_marker_and_periodic_scenario() {
    init_tracing();
    // Marker armed at sampleRate/2 frames (single-shot), periodic every
    // sampleRate frames, over a 2000 ms stream.
    let device = capture_device(44_100);
    let session = CaptureSession::new(SessionConfig {
        name: "notifications_44100".to_string(),
        duration_ms: 2000,
        marker_periods_per_second: 2,
        rearm_marker: false,
        update_periods_per_second: 1,
        post_stop_inactivity: Duration::from_millis(300),
        ..SessionConfig::default()
    });

    let outcome = session.run(&device).await.expect("scenario passes");

    assert_eq!(outcome.markers.len(), 1);
    assert!(
        (2..=3).contains(&outcome.periodics.len()),
        "expected 2..=3 periodic events, saw {}",
        outcome.periodics.len()
    );
    assert!(outcome.report.value("total_periods_actual").is_some());

    device.release().unwrap();
}

#[tokio::test]
async fn test_rearmed_marker_scenario() {
    let device = capture_device(44_100);
    let session = CaptureSession::new(SessionConfig {
        name: "rearmed_markers".to_string(),
        duration_ms: 1000,
        marker_periods_per_second: 2,
        update_periods_per_second: 4,
        post_stop_inactivity: Duration::from_millis(200),
        ..SessionConfig::default()
    });

    let outcome = session.run(&device).await.expect("scenario passes");

    // Count bounds were already verified inside the session; the timing
    // statistics must cover the interior events.
    assert!(outcome.markers.len() >= 2);
    assert!(outcome.periodics.len() >= 4);
    assert!(outcome.periodic_stats.count() >= 1);
    assert!(outcome.periodic_stats.max_abs() <= 80.0);

    device.release().unwrap();
}

// ============================================================================
// FATAL PATHS
// ============================================================================

mod doubles {
    use audioprobe::{
        AudioDevice, DeviceConfig, DeviceError, DeviceState, Direction, FrameClockSample,
        PlaybackParams, PositionListener, Timebase, TransferMode,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// Device whose reads never complete: models a stalled HAL.
    #[derive(Clone)]
    pub struct StalledDevice {
        state: Arc<Mutex<DeviceState>>,
        config: DeviceConfig,
    }

    impl StalledDevice {
        pub fn new(config: DeviceConfig) -> Self {
            Self {
                state: Arc::new(Mutex::new(DeviceState::Initialized)),
                config,
            }
        }
    }

    impl AudioDevice for StalledDevice {
        fn state(&self) -> DeviceState {
            *self.state.lock()
        }

        fn direction(&self) -> Direction {
            Direction::Capture
        }

        fn config(&self) -> DeviceConfig {
            self.config
        }

        fn start(&self) -> Result<(), DeviceError> {
            *self.state.lock() = DeviceState::Active;
            Ok(())
        }

        fn stop(&self) -> Result<(), DeviceError> {
            *self.state.lock() = DeviceState::Stopped;
            Ok(())
        }

        fn pause(&self) -> Result<(), DeviceError> {
            *self.state.lock() = DeviceState::Paused;
            Ok(())
        }

        fn flush(&self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn release(&self) -> Result<(), DeviceError> {
            *self.state.lock() = DeviceState::Released;
            Ok(())
        }

        fn read(
            &self,
            _buf: &mut [f32],
            _count_frames: usize,
            _mode: TransferMode,
        ) -> Result<usize, DeviceError> {
            thread::sleep(Duration::from_secs(10));
            Ok(0)
        }

        fn write(
            &self,
            _buf: &[f32],
            _count_frames: usize,
            _mode: TransferMode,
        ) -> Result<usize, DeviceError> {
            Ok(0)
        }

        fn position(&self) -> Result<u64, DeviceError> {
            Ok(0)
        }

        fn timestamp(&self, _timebase: Timebase) -> Result<FrameClockSample, DeviceError> {
            Err(DeviceError::NotReady)
        }

        fn set_marker_position(&self, _frames: u64) -> Result<(), DeviceError> {
            Ok(())
        }

        fn set_notification_period(&self, _frames: u64) -> Result<(), DeviceError> {
            Ok(())
        }

        fn set_position_listener(
            &self,
            _listener: Option<Arc<dyn PositionListener>>,
        ) -> Result<(), DeviceError> {
            Ok(())
        }

        fn set_playback_rate(&self, _rate_hz: u32) -> Result<(), DeviceError> {
            Ok(())
        }

        fn set_playback_params(&self, _params: PlaybackParams) -> Result<(), DeviceError> {
            Ok(())
        }

        fn playback_params(&self) -> Result<PlaybackParams, DeviceError> {
            Ok(PlaybackParams::default())
        }

        fn set_loop_enabled(&self, _enabled: bool) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    /// Device whose blocking reads come up short.
    #[derive(Clone)]
    pub struct ShortReadDevice {
        inner: StalledDevice,
    }

    impl ShortReadDevice {
        pub fn new(config: DeviceConfig) -> Self {
            Self {
                inner: StalledDevice::new(config),
            }
        }
    }

    impl AudioDevice for ShortReadDevice {
        fn state(&self) -> DeviceState {
            self.inner.state()
        }

        fn direction(&self) -> Direction {
            Direction::Capture
        }

        fn config(&self) -> DeviceConfig {
            self.inner.config()
        }

        fn start(&self) -> Result<(), DeviceError> {
            self.inner.start()
        }

        fn stop(&self) -> Result<(), DeviceError> {
            self.inner.stop()
        }

        fn pause(&self) -> Result<(), DeviceError> {
            self.inner.pause()
        }

        fn flush(&self) -> Result<(), DeviceError> {
            self.inner.flush()
        }

        fn release(&self) -> Result<(), DeviceError> {
            self.inner.release()
        }

        fn read(
            &self,
            _buf: &mut [f32],
            _count_frames: usize,
            _mode: TransferMode,
        ) -> Result<usize, DeviceError> {
            Ok(0)
        }

        fn write(
            &self,
            buf: &[f32],
            count_frames: usize,
            mode: TransferMode,
        ) -> Result<usize, DeviceError> {
            self.inner.write(buf, count_frames, mode)
        }

        fn position(&self) -> Result<u64, DeviceError> {
            self.inner.position()
        }

        fn timestamp(&self, timebase: Timebase) -> Result<FrameClockSample, DeviceError> {
            self.inner.timestamp(timebase)
        }

        fn set_marker_position(&self, frames: u64) -> Result<(), DeviceError> {
            self.inner.set_marker_position(frames)
        }

        fn set_notification_period(&self, frames: u64) -> Result<(), DeviceError> {
            self.inner.set_notification_period(frames)
        }

        fn set_position_listener(
            &self,
            listener: Option<Arc<dyn PositionListener>>,
        ) -> Result<(), DeviceError> {
            self.inner.set_position_listener(listener)
        }

        fn set_playback_rate(&self, rate_hz: u32) -> Result<(), DeviceError> {
            self.inner.set_playback_rate(rate_hz)
        }

        fn set_playback_params(&self, params: PlaybackParams) -> Result<(), DeviceError> {
            self.inner.set_playback_params(params)
        }

        fn playback_params(&self) -> Result<PlaybackParams, DeviceError> {
            self.inner.playback_params()
        }

        fn set_loop_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
            self.inner.set_loop_enabled(enabled)
        }
    }
}

#[tokio::test]
async fn test_stalled_read_is_fatal_timeout() {
    let device = doubles::StalledDevice::new(DeviceConfig::default());
    let session = CaptureSession::new(SessionConfig {
        name: "stalled_device".to_string(),
        duration_ms: 100,
        ..SessionConfig::default()
    });

    let err = session.run(&device).await.expect_err("stall must fail");
    assert!(
        matches!(err, SessionError::Timeout { op: "read", .. }),
        "expected Timeout, got {err:?}"
    );
    // The harness stops the device to unblock the stalled reader.
    assert_eq!(device.state(), DeviceState::Stopped);
}

#[tokio::test]
async fn test_short_blocking_read_is_fatal() {
    let device = doubles::ShortReadDevice::new(DeviceConfig::default());
    let session = CaptureSession::new(SessionConfig {
        name: "short_read_device".to_string(),
        duration_ms: 100,
        ..SessionConfig::default()
    });

    let err = session.run(&device).await.expect_err("short read must fail");
    assert!(
        matches!(
            err,
            SessionError::ShortTransfer {
                op: "read",
                requested: 1,
                transferred: 0,
            }
        ),
        "expected ShortTransfer, got {err:?}"
    );
}

#[tokio::test]
async fn test_late_listener_is_dropped_cleanly() {
    // Releasing with a listener installed must not wedge the delivery
    // thread.
    let device = capture_device(48_000);
    let recorder = Arc::new(PositionRecorder::new());
    device
        .set_position_listener(Some(recorder.clone() as Arc<dyn PositionListener>))
        .unwrap();
    device
        .set_notification_period(u64::from(48_000u32) / 20)
        .unwrap();
    recorder.start(48_000, 0);
    device.start().unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    device.release().unwrap();
    assert!(recorder.periodics().len() >= 1);
}
