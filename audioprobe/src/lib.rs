//! # Audioprobe
//!
//! A verification harness for streaming audio devices: checks that a
//! device's reported frame position advances consistently with wall-clock
//! time, with bounded jitter, across start/stop/pause/flush and
//! variable-rate playback.
//!
//! The device under test is anything implementing
//! [`AudioDevice`](audioprobe_core::AudioDevice); a deterministic
//! [`SyntheticDevice`](audioprobe_core::SyntheticDevice) ships with the
//! core crate for hardware-free runs.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use audioprobe::{CaptureSession, DeviceConfig, SessionConfig, SyntheticDevice};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = SyntheticDevice::capture(DeviceConfig::default())?;
//!     let session = CaptureSession::new(SessionConfig {
//!         duration_ms: 2000,
//!         update_periods_per_second: 1,
//!         ..SessionConfig::default()
//!     });
//!     let outcome = session.run(&device).await?;
//!     println!("continuity ratio {}", outcome.ratio);
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use audioprobe_core::{
    AudioDevice, ChannelLayout, DeviceConfig, DeviceError, DeviceState, Direction, FallbackMode,
    FrameClockSample, PlaybackParams, PositionListener, SampleEncoding, SyntheticDevice, Timebase,
    TransferMode,
};

#[cfg(feature = "hardware")]
pub use audioprobe_core::CpalOutputDevice;

pub use audioprobe_report::{MetricDirection, MetricUnit, ScenarioReport};

pub use audioprobe_verify::{
    verify_continuity, verify_continuity_with_tolerance, verify_event_counts, verify_event_timing,
    verify_timestamp_step, DriftStatistic, EventLog, VerifyError,
};

// Public API modules
pub mod error;
pub mod rate;
pub mod recorder;
pub mod session;

// Re-export main API types
pub use error::SessionError;
pub use rate::{RateOutcome, RateStep, SpeedStep, VariableRateSession};
pub use recorder::PositionRecorder;
pub use session::{CaptureSession, SessionConfig, SessionOutcome};
