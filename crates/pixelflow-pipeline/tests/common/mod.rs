#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use pixelflow_image::{ChannelLayout, ImageError, ImageSize, PixelBuffer};
use pixelflow_io::capture::{ReplayBackend, ReplayConfig};
use pixelflow_pipeline::{
    Catalog, Coordinator, PipelineConfig, Presenter, Refresh, TransformError,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Original(Option<ImageSize>, Refresh),
    Result(Option<ImageSize>, Refresh),
    Failed,
    Ended,
}

#[derive(Default)]
pub struct RecordingPresenter {
    pub events: Vec<Event>,
}

impl Presenter for RecordingPresenter {
    fn original_changed(&mut self, buffer: Option<&PixelBuffer>, refresh: Refresh) {
        self.events
            .push(Event::Original(buffer.map(|b| b.size()), refresh));
    }

    fn result_changed(&mut self, buffer: Option<&PixelBuffer>, refresh: Refresh) {
        self.events.push(Event::Result(buffer.map(|b| b.size()), refresh));
    }

    fn transform_failed(&mut self, _error: &TransformError) {
        self.events.push(Event::Failed);
    }

    fn capture_ended(&mut self) {
        self.events.push(Event::Ended);
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn mono(size: [usize; 2], val: u8) -> Result<PixelBuffer, ImageError> {
    PixelBuffer::from_size_val(size.into(), ChannelLayout::Mono, val)
}

pub fn rgb(size: [usize; 2], val: u8) -> Result<PixelBuffer, ImageError> {
    PixelBuffer::from_size_val(size.into(), ChannelLayout::Rgb, val)
}

pub fn replay(frames: Vec<PixelBuffer>, looping: bool) -> ReplayBackend {
    ReplayBackend::new(
        ReplayConfig::new(frames)
            .with_looping(looping)
            .with_frame_interval(Duration::from_millis(1)),
    )
}

pub fn coordinator_with(
    catalog: Catalog,
    backend: ReplayBackend,
) -> Coordinator<RecordingPresenter> {
    init_logger();
    Coordinator::new(
        Arc::new(catalog),
        Arc::new(backend),
        RecordingPresenter::default(),
        PipelineConfig::default().with_poll_timeout(Duration::from_millis(50)),
    )
}

pub fn coordinator() -> Coordinator<RecordingPresenter> {
    coordinator_with(Catalog::builtin(), replay(Vec::new(), false))
}

pub fn take_events(coordinator: &Coordinator<RecordingPresenter>) -> Vec<Event> {
    coordinator.with_presenter(|p| std::mem::take(&mut p.events))
}
