mod common;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use common::Event;
use pixelflow_image::{ChannelLayout, ImageError, ImageSize, PixelBuffer};
use pixelflow_pipeline::{
    ApplyOutcome, Catalog, FrameOutcome, OperationSpec, ParameterValues, PipelineError, Refresh,
    TransformError,
};

#[test]
fn grayscale_end_to_end() -> Result<(), PipelineError> {
    let coordinator = common::coordinator();
    assert_eq!(coordinator.selection().operation, "grayscale");

    coordinator.load_still(common::rgb([100, 100], 80).map_err(TransformError::from)?);
    assert_eq!(coordinator.apply_current_operation(), ApplyOutcome::Applied);

    let result = coordinator.result();
    let size = ImageSize {
        width: 100,
        height: 100,
    };
    assert_eq!(result.as_ref().map(|r| r.size()), Some(size));
    assert_eq!(result.map(|r| r.layout()), Some(ChannelLayout::Mono));

    let events = common::take_events(&coordinator);
    assert_eq!(
        events,
        vec![
            Event::Original(Some(size), Refresh::Full),
            Event::Result(Some(size), Refresh::Full),
            Event::Original(Some(size), Refresh::Full),
            Event::Result(Some(size), Refresh::Full),
        ]
    );
    Ok(())
}

#[test]
fn threshold_end_to_end() -> Result<(), PipelineError> {
    let coordinator = common::coordinator();
    coordinator.change_operation("threshold")?;
    coordinator.change_parameters(&ParameterValues::new().with("threshold", 127))?;

    let still = PixelBuffer::from_raw([2, 1].into(), ChannelLayout::Mono, vec![50, 200])
        .map_err(TransformError::from)?;
    coordinator.load_still(still);
    assert_eq!(coordinator.apply_current_operation(), ApplyOutcome::Applied);
    assert_eq!(
        coordinator.result().map(|r| r.as_slice().to_vec()),
        Some(vec![0, 255])
    );
    Ok(())
}

#[test]
fn change_without_apply_keeps_result() -> Result<(), PipelineError> {
    let coordinator = common::coordinator();
    coordinator.load_still(common::rgb([8, 6], 10).map_err(TransformError::from)?);
    coordinator.apply_current_operation();
    let before = coordinator.result();

    coordinator.change_operation("invert")?;
    coordinator.change_operation("gaussian_blur")?;
    coordinator.change_parameters(
        &ParameterValues::new()
            .with("kernel_size", 9)
            .with("sigma", 2.0),
    )?;

    let after = coordinator.result();
    assert!(matches!((&before, &after), (Some(b), Some(a)) if Arc::ptr_eq(b, a)));
    Ok(())
}

#[test]
fn change_parameters_normalizes_and_merges() -> Result<(), PipelineError> {
    let coordinator = common::coordinator();
    coordinator.change_operation("morphology")?;
    coordinator.change_parameters(&ParameterValues::new().with("kernel_size", 4))?;
    coordinator.change_parameters(&ParameterValues::new().with("operation", "open"))?;

    let parameters = coordinator.selection().parameters;
    assert_eq!(parameters.integer("kernel_size").ok(), Some(5));
    assert_eq!(parameters.choice("operation").ok(), Some("open"));
    assert_eq!(parameters.choice("shape").ok(), Some("rect"));

    // reselecting keeps the parameters, switching resets them
    coordinator.change_operation("morphology")?;
    assert_eq!(coordinator.selection().parameters, parameters);
    coordinator.change_operation("box_blur")?;
    coordinator.change_operation("morphology")?;
    assert_eq!(
        coordinator.selection().parameters.integer("kernel_size").ok(),
        Some(3)
    );
    Ok(())
}

#[test]
fn invalid_selection_is_rejected() -> Result<(), PipelineError> {
    let coordinator = common::coordinator();
    assert!(matches!(
        coordinator.change_operation("posterize"),
        Err(PipelineError::Transform(TransformError::UnknownOperation(_)))
    ));

    coordinator.change_operation("flip")?;
    let before = coordinator.selection();
    assert!(matches!(
        coordinator.change_parameters(&ParameterValues::new().with("direction", "diagonal")),
        Err(PipelineError::Transform(TransformError::InvalidParameter { .. }))
    ));
    assert_eq!(coordinator.selection(), before);
    Ok(())
}

#[test]
fn failing_transform_falls_back_to_original() -> Result<(), PipelineError> {
    let mut catalog = Catalog::builtin();
    catalog.register(OperationSpec::new("broken", "always fails"), |_, _| {
        Err(TransformError::Failed(ImageError::UnsupportedChannels(2)))
    });
    catalog.register(OperationSpec::new("explode", "always panics"), |_, _| {
        panic!("explode")
    });
    let coordinator = common::coordinator_with(catalog, common::replay(Vec::new(), false));

    for id in ["broken", "explode"] {
        let still = common::rgb([4, 4], 33).map_err(TransformError::from)?;
        coordinator.load_still(still.clone());
        coordinator.change_operation(id)?;
        common::take_events(&coordinator);

        assert_eq!(coordinator.apply_current_operation(), ApplyOutcome::FellBack);
        assert_eq!(coordinator.result().as_deref(), Some(&still));
        assert_eq!(common::take_events(&coordinator).first(), Some(&Event::Failed));

        let outcome = coordinator.on_frame_arrived(still.clone());
        assert_eq!(outcome, FrameOutcome::FellBack);
        assert_eq!(coordinator.result().as_deref(), Some(&still));
    }
    Ok(())
}

#[test]
fn apply_and_reset_without_image() {
    let coordinator = common::coordinator();
    assert_eq!(coordinator.apply_current_operation(), ApplyOutcome::NoImage);
    assert!(coordinator.reset());
    assert_eq!(
        common::take_events(&coordinator),
        vec![
            Event::Original(None, Refresh::Full),
            Event::Result(None, Refresh::Full),
        ]
    );
}

#[test]
fn reset_restores_original() -> Result<(), PipelineError> {
    let coordinator = common::coordinator();
    coordinator.change_operation("invert")?;
    let still = common::mono([3, 3], 10).map_err(TransformError::from)?;
    coordinator.load_still(still.clone());
    coordinator.apply_current_operation();
    assert_eq!(
        coordinator.result().map(|r| r.as_slice()[0]),
        Some(245)
    );

    assert!(coordinator.reset());
    assert_eq!(coordinator.result().as_deref(), Some(&still));
    Ok(())
}

#[test]
fn second_frame_during_transform_is_dropped() -> Result<(), PipelineError> {
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);

    let mut catalog = Catalog::builtin();
    catalog.register(OperationSpec::new("hold", "waits to be released"), move |b, _| {
        let _ = entered_tx.lock().unwrap().send(());
        let _ = release_rx
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(10));
        Ok(b.clone())
    });

    let coordinator = Arc::new(common::coordinator_with(
        catalog,
        common::replay(Vec::new(), false),
    ));
    coordinator.change_operation("hold")?;

    let first = common::mono([2, 2], 1).map_err(TransformError::from)?;
    let second = common::mono([2, 2], 2).map_err(TransformError::from)?;

    let handle = thread::spawn({
        let coordinator = coordinator.clone();
        let first = first.clone();
        move || coordinator.on_frame_arrived(first)
    });

    entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(coordinator.on_frame_arrived(second), FrameOutcome::Dropped);

    release_tx.send(()).unwrap();
    let outcome = handle.join().unwrap();
    assert_eq!(outcome, FrameOutcome::Processed { histogram: true });

    assert_eq!(coordinator.result().as_deref(), Some(&first));
    assert_eq!(coordinator.original().as_deref(), Some(&first));
    assert_eq!(coordinator.stats().dropped, 1);
    assert_eq!(coordinator.stats().processed, 1);
    Ok(())
}

#[test]
fn apply_waits_for_frame_in_flight() -> Result<(), PipelineError> {
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);

    let mut catalog = Catalog::builtin();
    catalog.register(OperationSpec::new("hold_once", "waits on first use"), move |b, _| {
        if entered_tx.lock().unwrap().send(()).is_ok() {
            let _ = release_rx
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(10));
        }
        Ok(b.clone())
    });

    let coordinator = Arc::new(common::coordinator_with(
        catalog,
        common::replay(Vec::new(), false),
    ));
    coordinator.change_operation("hold_once")?;

    let frame = common::mono([2, 2], 7).map_err(TransformError::from)?;
    let frame_thread = thread::spawn({
        let coordinator = coordinator.clone();
        move || coordinator.on_frame_arrived(frame)
    });
    entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    drop(entered_rx);

    let apply_thread = thread::spawn({
        let coordinator = coordinator.clone();
        move || coordinator.apply_current_operation()
    });

    release_tx.send(()).unwrap();
    assert!(matches!(
        frame_thread.join().unwrap(),
        FrameOutcome::Processed { .. }
    ));
    assert_eq!(apply_thread.join().unwrap(), ApplyOutcome::Applied);
    Ok(())
}
