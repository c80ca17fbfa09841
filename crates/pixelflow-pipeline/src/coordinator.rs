use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use pixelflow_image::PixelBuffer;
use pixelflow_io::capture::CaptureBackend;
use pixelflow_io::fps_counter::FpsCounter;

use crate::catalog::Catalog;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, TransformError};
use crate::executor::Executor;
use crate::flight::SingleFlight;
use crate::params::ParameterValues;
use crate::presenter::{Presenter, Refresh};
use crate::session::{Selection, Session};
use crate::slot::{frame_slot, SlotReceiver, SlotSender};
use crate::source::FrameSource;
use crate::throttle::HistogramThrottle;

/// What happened to a frame handed to [`Coordinator::on_frame_arrived`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was transformed. `histogram` tells whether the throttle let
    /// the histograms refresh.
    Processed {
        /// Histograms were requested.
        histogram: bool,
    },
    /// The transform failed and the frame itself is shown as the result.
    FellBack,
    /// Another transform was in flight, the frame was discarded.
    Dropped,
}

/// What happened on [`Coordinator::apply_current_operation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The result was recomputed.
    Applied,
    /// The transform failed and the original is shown as the result.
    FellBack,
    /// There is no image to apply the operation to.
    NoImage,
}

/// What one turn of [`Coordinator::process_next_frame`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpOutcome {
    /// A frame was received and handled.
    Frame(FrameOutcome),
    /// No frame arrived in time, or nothing is capturing.
    Idle,
    /// The capture stream ended on its own.
    StreamEnded,
}

/// Counters for the current capture session.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CaptureStats {
    /// Frames transformed.
    pub processed: u64,
    /// Frames discarded, either because the slot was full or because a
    /// transform was in flight.
    pub dropped: u64,
    /// Smoothed rate of processed frames.
    pub fps: f32,
}

struct CaptureLink {
    source: FrameSource,
    receiver: Option<SlotReceiver>,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    dropped: AtomicU64,
}

/// Clears the capturing flag when the capture thread lets go of its sink.
struct ActiveFlag(Arc<AtomicBool>);

impl Drop for ActiveFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// What the capture thread feeds every frame into.
struct FrameSink {
    sender: SlotSender,
    counters: Arc<Counters>,
    _active: ActiveFlag,
}

impl FrameSink {
    fn deliver(&self, frame: PixelBuffer) {
        if !self.sender.offer(frame) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ties still images, captured frames, the transform executor and the
/// presenter together.
///
/// All methods take `&self`; the coordinator can be shared between the
/// thread pumping frames and the thread reacting to user input. At most one
/// transform runs at a time. Captured frames that arrive while one is in
/// flight are dropped, explicit requests wait their turn.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use pixelflow_image::{ChannelLayout, PixelBuffer};
/// use pixelflow_io::capture::{ReplayBackend, ReplayConfig};
/// use pixelflow_pipeline::{
///     ApplyOutcome, Catalog, Coordinator, PipelineConfig, Presenter, Refresh,
/// };
///
/// struct Quiet;
///
/// impl Presenter for Quiet {
///     fn original_changed(&mut self, _: Option<&PixelBuffer>, _: Refresh) {}
///     fn result_changed(&mut self, _: Option<&PixelBuffer>, _: Refresh) {}
/// }
///
/// let coordinator = Coordinator::new(
///     Arc::new(Catalog::builtin()),
///     Arc::new(ReplayBackend::new(ReplayConfig::default())),
///     Quiet,
///     PipelineConfig::default(),
/// );
///
/// let still = PixelBuffer::from_size_val([8, 8].into(), ChannelLayout::Rgb, 40).unwrap();
/// coordinator.load_still(still);
/// assert_eq!(coordinator.apply_current_operation(), ApplyOutcome::Applied);
/// assert_eq!(coordinator.result().map(|r| r.num_channels()), Some(1));
/// ```
pub struct Coordinator<P: Presenter> {
    config: PipelineConfig,
    executor: Executor,
    session: Mutex<Session>,
    presenter: Mutex<P>,
    throttle: Mutex<HistogramThrottle>,
    flight: SingleFlight,
    capture: Mutex<CaptureLink>,
    capturing: Arc<AtomicBool>,
    generation: AtomicU64,
    counters: Arc<Counters>,
    fps: Mutex<FpsCounter>,
}

impl<P: Presenter> Coordinator<P> {
    /// Create a coordinator with an empty session and the catalog's default
    /// selection.
    pub fn new(
        catalog: Arc<Catalog>,
        backend: Arc<dyn CaptureBackend>,
        presenter: P,
        config: PipelineConfig,
    ) -> Self {
        let session = Session::new(&catalog);
        Self {
            throttle: Mutex::new(HistogramThrottle::new(config.histogram_interval)),
            config,
            executor: Executor::new(catalog),
            session: Mutex::new(session),
            presenter: Mutex::new(presenter),
            flight: SingleFlight::new(),
            capture: Mutex::new(CaptureLink {
                source: FrameSource::new(backend),
                receiver: None,
            }),
            capturing: Arc::new(AtomicBool::new(false)),
            generation: AtomicU64::new(0),
            counters: Arc::new(Counters::default()),
            fps: Mutex::new(FpsCounter::new()),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The catalog operations are resolved against.
    pub fn catalog(&self) -> &Catalog {
        self.executor.catalog()
    }

    /// The last loaded or captured image.
    pub fn original(&self) -> Option<Arc<PixelBuffer>> {
        lock(&self.session).original.clone()
    }

    /// The image currently shown as the result.
    pub fn result(&self) -> Option<Arc<PixelBuffer>> {
        lock(&self.session).result.clone()
    }

    /// The current operation and parameters.
    pub fn selection(&self) -> Selection {
        lock(&self.session).selection.clone()
    }

    /// Run `f` with exclusive access to the presenter.
    pub fn with_presenter<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        let mut presenter = lock(&self.presenter);
        f(&mut *presenter)
    }

    /// Whether a capture session is active.
    ///
    /// Turns false as soon as the capture thread has released the device,
    /// also when the stream ended on its own.
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Counters of the current or last capture session.
    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            processed: self.counters.processed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            fps: lock(&self.fps).fps(),
        }
    }

    fn notify(&self, original: Option<&PixelBuffer>, result: Option<&PixelBuffer>, refresh: Refresh) {
        let mut presenter = lock(&self.presenter);
        presenter.original_changed(original, refresh);
        presenter.result_changed(result, refresh);
    }

    /// Run the selection on `original`, falling back to `original` itself.
    fn transform(
        &self,
        original: &Arc<PixelBuffer>,
        selection: &Selection,
    ) -> Result<Arc<PixelBuffer>, (Arc<PixelBuffer>, TransformError)> {
        self.executor
            .execute(original, &selection.operation, &selection.parameters)
            .map(Arc::new)
            .map_err(|err| {
                log::warn!(
                    "{} failed, showing the original instead: {err}",
                    selection.operation
                );
                (original.clone(), err)
            })
    }

    /// Show a still image as both original and result.
    ///
    /// An active capture is stopped first.
    pub fn load_still(&self, buffer: PixelBuffer) {
        self.stop_capture();
        let _permit = self.flight.acquire();

        let still = Arc::new(buffer);
        {
            let mut session = lock(&self.session);
            session.original = Some(still.clone());
            session.result = Some(still.clone());
        }
        log::info!("loaded still {}", still.size());
        self.notify(Some(&*still), Some(&*still), Refresh::Full);
    }

    /// Transform a captured frame with the current selection.
    ///
    /// The frame is dropped if another transform is in flight.
    pub fn on_frame_arrived(&self, buffer: PixelBuffer) -> FrameOutcome {
        self.on_frame_arrived_at(buffer, Instant::now())
    }

    /// [`Coordinator::on_frame_arrived`] with an explicit arrival time for the
    /// histogram throttle.
    pub fn on_frame_arrived_at(&self, buffer: PixelBuffer, now: Instant) -> FrameOutcome {
        self.handle_frame(buffer, None, now)
    }

    /// Transform a frame, dropping it if another transform is in flight or,
    /// when `generation` is given, if the capture session that produced it
    /// has been stopped since.
    fn handle_frame(
        &self,
        buffer: PixelBuffer,
        generation: Option<u64>,
        now: Instant,
    ) -> FrameOutcome {
        let Some(_permit) = self.flight.try_acquire() else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            log::debug!("transform in flight, dropping frame");
            return FrameOutcome::Dropped;
        };

        // checked under the permit, so a still loaded meanwhile is never overwritten
        if generation.is_some_and(|g| g != self.generation.load(Ordering::SeqCst)) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            log::debug!("frame from a stopped capture session, dropping it");
            return FrameOutcome::Dropped;
        }

        let original = Arc::new(buffer);
        let selection = {
            let mut session = lock(&self.session);
            session.original = Some(original.clone());
            session.selection.clone()
        };

        let outcome = self.transform(&original, &selection);
        let result = match &outcome {
            Ok(result) => result.clone(),
            Err((fallback, _)) => fallback.clone(),
        };
        lock(&self.session).result = Some(result.clone());

        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        lock(&self.fps).update_at(now);

        let histogram = lock(&self.throttle).permit_at(now);
        let refresh = if histogram {
            Refresh::Full
        } else {
            Refresh::ImageOnly
        };

        if let Err((_, err)) = &outcome {
            lock(&self.presenter).transform_failed(err);
        }
        self.notify(Some(&*original), Some(&*result), refresh);

        match outcome {
            Ok(_) => FrameOutcome::Processed { histogram },
            Err(_) => FrameOutcome::FellBack,
        }
    }

    /// Recompute the result from the current original.
    ///
    /// Waits for an in-flight transform instead of being dropped. Outside a
    /// capture session both previews get a full refresh.
    pub fn apply_current_operation(&self) -> ApplyOutcome {
        let _permit = self.flight.acquire();

        let (original, selection) = {
            let session = lock(&self.session);
            (session.original.clone(), session.selection.clone())
        };
        let Some(original) = original else {
            return ApplyOutcome::NoImage;
        };

        let outcome = self.transform(&original, &selection);
        let result = match &outcome {
            Ok(result) => result.clone(),
            Err((fallback, _)) => fallback.clone(),
        };
        lock(&self.session).result = Some(result.clone());

        if let Err((_, err)) = &outcome {
            lock(&self.presenter).transform_failed(err);
        }
        if !self.is_capturing() {
            self.notify(Some(&*original), Some(&*result), Refresh::Full);
        }

        match outcome {
            Ok(_) => ApplyOutcome::Applied,
            Err(_) => ApplyOutcome::FellBack,
        }
    }

    /// Show the original as the result again.
    ///
    /// Ignored while capturing. Returns whether the reset happened.
    pub fn reset(&self) -> bool {
        if self.is_capturing() {
            log::debug!("reset ignored while capturing");
            return false;
        }
        let _permit = self.flight.acquire();

        let original = {
            let mut session = lock(&self.session);
            session.result = session.original.clone();
            session.original.clone()
        };
        self.notify(original.as_deref(), original.as_deref(), Refresh::Full);
        true
    }

    /// Select another operation with its default parameters.
    ///
    /// Selecting the current operation keeps its parameters. The result is
    /// not recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::UnknownOperation`] for an unregistered id.
    pub fn change_operation(&self, id: &str) -> Result<(), PipelineError> {
        let spec = self.catalog().describe(id)?;
        let mut session = lock(&self.session);
        if session.selection.operation != id {
            session.selection = Selection {
                operation: id.to_string(),
                parameters: spec.default_parameters(),
            };
            log::debug!("selected {id}");
        }
        Ok(())
    }

    /// Update some parameters of the current operation.
    ///
    /// `values` override the current ones and the whole set is normalized.
    /// The result is not recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidParameter`] if a value has the wrong
    /// kind or an unknown option. The selection is left unchanged.
    pub fn change_parameters(&self, values: &ParameterValues) -> Result<(), PipelineError> {
        let mut session = lock(&self.session);
        let spec = self.catalog().describe(&session.selection.operation)?;

        let mut merged = session.selection.parameters.clone();
        merged.merge(values);
        session.selection.parameters = spec.normalize(&merged)?;
        log::debug!(
            "{} parameters: {}",
            session.selection.operation,
            session.selection.parameters
        );
        Ok(())
    }

    /// Open the configured device and start feeding frames to the slot.
    ///
    /// Does nothing if already capturing. The histogram throttle and the
    /// capture counters start over.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Capture`] if the device is unavailable.
    pub fn start_capture(&self) -> Result<(), PipelineError> {
        let mut capture = lock(&self.capture);
        if capture.source.is_running() {
            return Ok(());
        }

        self.counters.processed.store(0, Ordering::Relaxed);
        self.counters.dropped.store(0, Ordering::Relaxed);
        *lock(&self.fps) = FpsCounter::new();

        // reap a session that ended on its own so its sink cannot lower the new flag
        capture.source.stop();

        let (sender, receiver) = frame_slot();
        // raised before the thread exists so that a stream ending at once still lowers it
        self.capturing.store(true, Ordering::SeqCst);
        let sink = FrameSink {
            sender,
            counters: self.counters.clone(),
            _active: ActiveFlag(self.capturing.clone()),
        };
        capture
            .source
            .start(self.config.device_index, move |frame| sink.deliver(frame))?;

        capture.receiver = Some(receiver);
        lock(&self.throttle).reset();
        Ok(())
    }

    /// Stop capturing and wait for the device to be released.
    ///
    /// Does nothing if not capturing. Frames of the stopped session that
    /// are still on their way to the transform are discarded.
    pub fn stop_capture(&self) {
        let mut capture = lock(&self.capture);
        capture.source.stop();
        capture.receiver = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.capturing.store(false, Ordering::SeqCst);
    }

    /// Wait up to `timeout` for a captured frame and transform it.
    ///
    /// When the stream has ended on its own the capture session is closed
    /// and the presenter is told.
    pub fn process_next_frame(&self, timeout: Duration) -> PumpOutcome {
        let (received, generation) = {
            let capture = lock(&self.capture);
            let Some(receiver) = capture.receiver.as_ref() else {
                return PumpOutcome::Idle;
            };
            (
                receiver.recv_timeout(timeout),
                self.generation.load(Ordering::SeqCst),
            )
        };

        match received {
            Ok(frame) => {
                PumpOutcome::Frame(self.handle_frame(frame, Some(generation), Instant::now()))
            }
            Err(RecvTimeoutError::Timeout) => PumpOutcome::Idle,
            Err(RecvTimeoutError::Disconnected) => {
                self.stop_capture();
                log::info!("capture stream ended");
                lock(&self.presenter).capture_ended();
                PumpOutcome::StreamEnded
            }
        }
    }
}
