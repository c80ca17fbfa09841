mod common;

use std::time::{Duration, Instant};

use common::Event;
use pixelflow_image::{ChannelLayout, PixelBuffer};
use pixelflow_io::capture::CaptureError;
use pixelflow_pipeline::{
    Catalog, FrameOutcome, PipelineError, PumpOutcome, Refresh, TransformError,
};

/// Pump until a frame has been processed, giving up after a while.
fn pump_one_frame(
    coordinator: &pixelflow_pipeline::Coordinator<common::RecordingPresenter>,
) -> Option<FrameOutcome> {
    for _ in 0..200 {
        match coordinator.process_next_frame(Duration::from_millis(50)) {
            PumpOutcome::Frame(outcome) => return Some(outcome),
            PumpOutcome::StreamEnded => return None,
            PumpOutcome::Idle => {}
        }
    }
    None
}

#[test]
fn histogram_refresh_is_throttled() -> Result<(), PipelineError> {
    let coordinator = common::coordinator();
    let frame = common::rgb([4, 4], 1).map_err(TransformError::from)?;
    let start = Instant::now();

    let permitted: Vec<u64> = (0..=60u64)
        .filter(|i| {
            let now = start + Duration::from_millis(i * 100);
            matches!(
                coordinator.on_frame_arrived_at(frame.clone(), now),
                FrameOutcome::Processed { histogram: true }
            )
        })
        .collect();
    assert_eq!(permitted, vec![0, 50]);

    let events = common::take_events(&coordinator);
    let size = frame.size();
    assert_eq!(events[0], Event::Original(Some(size), Refresh::Full));
    assert_eq!(events[2], Event::Original(Some(size), Refresh::ImageOnly));
    Ok(())
}

#[test]
fn capture_start_resets_throttle() -> Result<(), PipelineError> {
    let backend = common::replay(vec![common::mono([2, 2], 0).map_err(TransformError::from)?], true);
    let coordinator = common::coordinator_with(Catalog::builtin(), backend);
    let frame = common::mono([2, 2], 9).map_err(TransformError::from)?;
    let t0 = Instant::now();

    assert_eq!(
        coordinator.on_frame_arrived_at(frame.clone(), t0),
        FrameOutcome::Processed { histogram: true }
    );
    assert_eq!(
        coordinator.on_frame_arrived_at(frame.clone(), t0 + Duration::from_secs(1)),
        FrameOutcome::Processed { histogram: false }
    );

    coordinator.start_capture()?;
    assert_eq!(
        coordinator.on_frame_arrived_at(frame, t0 + Duration::from_secs(2)),
        FrameOutcome::Processed { histogram: true }
    );
    coordinator.stop_capture();
    Ok(())
}

#[test]
fn frames_are_mirrored_and_transformed() -> Result<(), PipelineError> {
    let frame = PixelBuffer::from_raw([3, 1].into(), ChannelLayout::Mono, vec![10, 20, 30])
        .map_err(TransformError::from)?;
    let backend = common::replay(vec![frame], true);
    let coordinator = common::coordinator_with(Catalog::builtin(), backend);
    coordinator.change_operation("invert")?;

    coordinator.start_capture()?;
    assert!(coordinator.is_capturing());
    assert!(matches!(
        pump_one_frame(&coordinator),
        Some(FrameOutcome::Processed { .. })
    ));
    coordinator.stop_capture();

    assert_eq!(
        coordinator.original().map(|o| o.as_slice().to_vec()),
        Some(vec![30, 20, 10])
    );
    assert_eq!(
        coordinator.result().map(|r| r.as_slice().to_vec()),
        Some(vec![225, 235, 245])
    );
    Ok(())
}

#[test]
fn stop_then_start_reopens_device() -> Result<(), PipelineError> {
    let backend = common::replay(vec![common::rgb([4, 4], 5).map_err(TransformError::from)?], true);
    let coordinator = common::coordinator_with(Catalog::builtin(), backend.clone());

    for _ in 0..5 {
        coordinator.start_capture()?;
        assert!(pump_one_frame(&coordinator).is_some());
        coordinator.stop_capture();
        assert!(!coordinator.is_capturing());
        assert!(!backend.is_in_use());
    }
    assert_eq!(backend.open_count(), 5);

    // stopping twice and starting twice are harmless
    coordinator.stop_capture();
    coordinator.start_capture()?;
    coordinator.start_capture()?;
    assert_eq!(backend.open_count(), 6);
    coordinator.stop_capture();
    Ok(())
}

#[test]
fn unavailable_device_is_reported() {
    let backend = common::replay(Vec::new(), false);
    common::init_logger();
    let coordinator = pixelflow_pipeline::Coordinator::new(
        std::sync::Arc::new(Catalog::builtin()),
        std::sync::Arc::new(backend),
        common::RecordingPresenter::default(),
        pixelflow_pipeline::PipelineConfig::default().with_device_index(4),
    );

    assert!(matches!(
        coordinator.start_capture(),
        Err(PipelineError::Capture(CaptureError::DeviceUnavailable { index: 4, .. }))
    ));
    assert!(!coordinator.is_capturing());
    assert_eq!(
        coordinator.process_next_frame(Duration::from_millis(1)),
        PumpOutcome::Idle
    );
}

#[test]
fn stream_end_closes_capture() -> Result<(), PipelineError> {
    let frames = (0..3)
        .map(|v| common::mono([2, 2], v))
        .collect::<Result<Vec<_>, _>>()
        .map_err(TransformError::from)?;
    let backend = common::replay(frames, false);
    let coordinator = common::coordinator_with(Catalog::builtin(), backend.clone());

    coordinator.start_capture()?;
    let mut ended = false;
    for _ in 0..200 {
        if coordinator.process_next_frame(Duration::from_millis(50)) == PumpOutcome::StreamEnded {
            ended = true;
            break;
        }
    }
    assert!(ended);
    assert!(!coordinator.is_capturing());
    assert!(!backend.is_in_use());
    assert_eq!(common::take_events(&coordinator).last(), Some(&Event::Ended));

    // a new session can start right away
    coordinator.start_capture()?;
    assert_eq!(backend.open_count(), 2);
    coordinator.stop_capture();
    Ok(())
}

#[test]
fn ended_stream_clears_capturing_without_pumping() -> Result<(), PipelineError> {
    let frames = vec![common::mono([2, 2], 5).map_err(TransformError::from)?];
    let backend = common::replay(frames, false);
    let coordinator = common::coordinator_with(Catalog::builtin(), backend.clone());

    coordinator.start_capture()?;
    let deadline = Instant::now() + Duration::from_secs(5);
    while coordinator.is_capturing() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(!coordinator.is_capturing());
    assert!(!backend.is_in_use());
    assert!(coordinator.reset());

    // the pump still reports the end once
    let mut outcome = PumpOutcome::Idle;
    for _ in 0..10 {
        outcome = coordinator.process_next_frame(Duration::from_millis(20));
        if outcome == PumpOutcome::StreamEnded {
            break;
        }
    }
    assert_eq!(outcome, PumpOutcome::StreamEnded);

    // restarting right after the end keeps the new session flagged
    coordinator.start_capture()?;
    coordinator.stop_capture();
    assert!(!coordinator.is_capturing());
    assert_eq!(backend.open_count(), 2);
    Ok(())
}

#[test]
fn still_load_stops_capture() -> Result<(), PipelineError> {
    let backend = common::replay(vec![common::mono([2, 2], 1).map_err(TransformError::from)?], true);
    let coordinator = common::coordinator_with(Catalog::builtin(), backend.clone());

    coordinator.start_capture()?;
    assert!(!coordinator.reset());

    let still = common::rgb([5, 5], 100).map_err(TransformError::from)?;
    coordinator.load_still(still.clone());
    assert!(!coordinator.is_capturing());
    assert!(!backend.is_in_use());
    assert_eq!(coordinator.original().as_deref(), Some(&still));
    assert_eq!(coordinator.result().as_deref(), Some(&still));
    Ok(())
}

#[test]
fn slow_consumer_drops_frames() -> Result<(), PipelineError> {
    let backend = common::replay(vec![common::mono([2, 2], 1).map_err(TransformError::from)?], true);
    let coordinator = common::coordinator_with(Catalog::builtin(), backend);

    coordinator.start_capture()?;
    std::thread::sleep(Duration::from_millis(100));
    assert!(pump_one_frame(&coordinator).is_some());
    coordinator.stop_capture();

    let stats = coordinator.stats();
    assert_eq!(stats.processed, 1);
    assert!(stats.dropped > 0);
    Ok(())
}
