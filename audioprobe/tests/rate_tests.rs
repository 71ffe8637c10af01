//! Integration tests for variable-rate playback accumulation

use audioprobe::*;
use std::time::Duration;

fn playback_device(sample_rate_hz: u32) -> SyntheticDevice {
    SyntheticDevice::playback(DeviceConfig {
        sample_rate_hz,
        channels: ChannelLayout::Mono,
        encoding: SampleEncoding::Pcm8,
        buffer_frames: 4096,
    })
    .expect("open playback device")
}

#[tokio::test]
async fn test_rate_sweep_accumulates_per_interval() -> anyhow::Result<()> {
    // Sweep 24 kHz up to 96 kHz; the expected position is the sum of each
    // interval's own rate, not any single global rate.
    let device = playback_device(24_000);
    let session = VariableRateSession::default();
    let steps: Vec<RateStep> = [24_000u32, 48_000, 72_000, 96_000]
        .iter()
        .map(|&rate_hz| RateStep {
            rate_hz,
            hold: Duration::from_millis(100),
        })
        .collect();

    let outcome = session.run_rates(&device, &steps).await?;

    assert!(outcome.end_frames > outcome.origin_frames);
    // Roughly 24000 expected frames; the session already verified the
    // 60 ms tolerance at the final rate.
    assert!(outcome.expected_frames > 20_000);
    assert_eq!(outcome.tolerance_frames, 96_000 * 60 / 1000);

    device.release()?;
    Ok(())
}

#[tokio::test]
async fn test_rate_sweep_down() {
    let device = playback_device(24_000);
    let session = VariableRateSession::default();
    let steps: Vec<RateStep> = [96_000u32, 72_000, 48_000, 24_000]
        .iter()
        .map(|&rate_hz| RateStep {
            rate_hz,
            hold: Duration::from_millis(100),
        })
        .collect();

    session
        .run_rates(&device, &steps)
        .await
        .expect("downward sweep passes");
    device.release().unwrap();
}

#[tokio::test]
async fn test_speed_sweep_accumulates_per_interval() -> anyhow::Result<()> {
    let device = playback_device(48_000);
    let session = VariableRateSession::default();
    let steps: Vec<SpeedStep> = [0.5f32, 1.0, 1.5, 2.0]
        .iter()
        .map(|&speed| SpeedStep {
            params: PlaybackParams::default().with_speed(speed),
            hold: Duration::from_millis(100),
        })
        .collect();

    let outcome = session.run_speeds(&device, &steps).await?;
    assert!(outcome.expected_frames > 20_000);
    device.release()?;
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_speed_is_fatal() {
    let device = playback_device(48_000);
    let session = VariableRateSession::default();
    let steps = [SpeedStep {
        params: PlaybackParams::default().with_speed(0.0),
        hold: Duration::from_millis(50),
    }];

    let err = session
        .run_speeds(&device, &steps)
        .await
        .expect_err("zero speed must fail");
    assert!(matches!(
        err,
        SessionError::Device(DeviceError::InvalidArgument { .. })
    ));
    device.release().unwrap();
}

#[tokio::test]
async fn test_rate_sweep_requires_playback_device() {
    let device = SyntheticDevice::capture(DeviceConfig::default()).unwrap();
    let session = VariableRateSession::default();
    let steps = [RateStep {
        rate_hz: 48_000,
        hold: Duration::from_millis(50),
    }];

    let err = session
        .run_rates(&device, &steps)
        .await
        .expect_err("capture device must be rejected");
    assert!(matches!(
        err,
        SessionError::Device(DeviceError::InvalidArgument { .. })
    ));
    device.release().unwrap();
}

#[tokio::test]
async fn test_empty_schedule_is_invalid_input() {
    let device = playback_device(48_000);
    let session = VariableRateSession::default();
    let err = session
        .run_rates(&device, &[])
        .await
        .expect_err("empty schedule must fail");
    assert!(matches!(err, SessionError::Verify(VerifyError::InvalidInput { .. })));
    device.release().unwrap();
}
