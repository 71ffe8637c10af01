//! # Audioprobe Verify
//!
//! Pure verification logic for the audioprobe timing harness: the
//! frame-clock continuity check, back-to-back timestamp jitter bounds,
//! position notification count/timing verification and the running drift
//! statistics they produce. Nothing here touches a device; callers hand in
//! observations collected by a session.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod continuity;
pub mod error;
pub mod events;
pub mod stats;

// Re-export main types
pub use continuity::{
    verify_continuity, verify_continuity_with_tolerance, verify_timestamp_step,
    DEFAULT_CONTINUITY_TOLERANCE,
};
pub use error::VerifyError;
pub use events::{
    expected_event_bounds, verify_accumulated_position, verify_event_counts, verify_event_timing,
    EventLog, DEFAULT_EVENT_TOLERANCE_MS,
};
pub use stats::DriftStatistic;
