use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use pixelflow_image::PixelBuffer;
use pixelflow_imgproc::flip;
use pixelflow_io::capture::{CaptureBackend, CaptureDevice, CaptureError};

/// Lifecycle of a [`FrameSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceState {
    /// No device is held.
    Idle,
    /// The capture thread is delivering frames.
    Running,
    /// A stop was requested and the capture thread is winding down.
    Stopping,
}

/// Drives a capture device on its own thread and hands every frame,
/// mirrored horizontally, to a single subscriber.
///
/// The device is opened on the calling thread so that
/// [`CaptureError::DeviceUnavailable`] reaches the caller of
/// [`FrameSource::start`]. If reading fails or the device runs dry, the
/// thread releases the device and the source goes back to
/// [`SourceState::Idle`] on its own.
pub struct FrameSource {
    backend: Arc<dyn CaptureBackend>,
    state: Arc<Mutex<SourceState>>,
    stop_requested: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

fn lock(state: &Mutex<SourceState>) -> MutexGuard<'_, SourceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FrameSource {
    /// Create an idle source over `backend`.
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(SourceState::Idle)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// The current state.
    pub fn state(&self) -> SourceState {
        *lock(&self.state)
    }

    /// Whether the capture thread is delivering frames.
    pub fn is_running(&self) -> bool {
        self.state() == SourceState::Running
    }

    /// Open device `index` and start delivering frames to `sink`.
    ///
    /// Does nothing if the source is already running.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::DeviceUnavailable`] if the device cannot be
    /// opened. The source stays idle.
    pub fn start<F>(&mut self, index: u32, sink: F) -> Result<(), CaptureError>
    where
        F: FnMut(PixelBuffer) + Send + 'static,
    {
        if self.is_running() {
            log::debug!("frame source already running");
            return Ok(());
        }

        // a previous session that ended on its own still has a thread to reap
        self.join();

        let device = self.backend.open(index)?;

        self.stop_requested.store(false, Ordering::SeqCst);
        *lock(&self.state) = SourceState::Running;

        let state = self.state.clone();
        let stop_requested = self.stop_requested.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("capture-{index}"))
            .spawn(move || run_capture(device, sink, &stop_requested, &state));

        match spawned {
            Ok(handle) => {
                log::info!("capture started on device {index}");
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                // the closure, and with it the device, was dropped
                *lock(&self.state) = SourceState::Idle;
                Err(CaptureError::DeviceUnavailable {
                    index,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Stop the capture thread and wait for it to release the device.
    ///
    /// Does nothing if the source is idle.
    pub fn stop(&mut self) {
        if self.handle.is_none() {
            return;
        }

        {
            let mut state = lock(&self.state);
            if *state == SourceState::Running {
                *state = SourceState::Stopping;
            }
        }
        self.stop_requested.store(true, Ordering::SeqCst);
        self.join();
        log::info!("capture stopped");
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("capture thread panicked");
            }
        }
        *lock(&self.state) = SourceState::Idle;
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn mirror(frame: PixelBuffer) -> Result<PixelBuffer, CaptureError> {
    Ok(match frame {
        PixelBuffer::Mono8(img) => flip::horizontal_flip(&img)?.into(),
        PixelBuffer::Rgb8(img) => flip::horizontal_flip(&img)?.into(),
    })
}

fn run_capture<F>(
    mut device: Box<dyn CaptureDevice>,
    mut sink: F,
    stop_requested: &AtomicBool,
    state: &Mutex<SourceState>,
) where
    F: FnMut(PixelBuffer),
{
    let mut delivered = 0u64;
    while !stop_requested.load(Ordering::SeqCst) {
        match device
            .read_frame()
            .and_then(|frame| frame.map(mirror).transpose())
        {
            Ok(Some(frame)) => {
                sink(frame);
                delivered += 1;
            }
            Ok(None) => {
                log::info!("capture reached end of stream");
                break;
            }
            Err(err) => {
                log::warn!("capture failed, ending stream: {err}");
                break;
            }
        }
    }

    device.release();
    *lock(state) = SourceState::Idle;
    log::debug!("capture thread exiting after {delivered} frames");

    // the subscriber sees the stream end only once the device is free
    drop(sink);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelflow_image::ChannelLayout;
    use pixelflow_io::capture::{ReplayBackend, ReplayConfig};
    use std::sync::mpsc;
    use std::time::Duration;

    fn backend(looping: bool) -> Result<ReplayBackend, CaptureError> {
        let frame = PixelBuffer::from_raw([2, 1].into(), ChannelLayout::Mono, vec![1, 2])?;
        Ok(ReplayBackend::new(
            ReplayConfig::new(vec![frame])
                .with_looping(looping)
                .with_frame_interval(Duration::from_millis(2)),
        ))
    }

    #[test]
    fn frames_are_mirrored() -> Result<(), CaptureError> {
        let replay = backend(false)?;
        let mut source = FrameSource::new(Arc::new(replay.clone()));
        let (tx, rx) = mpsc::channel();
        source.start(0, move |frame| {
            let _ = tx.send(frame);
        })?;

        let frame = rx.recv_timeout(Duration::from_secs(5));
        assert_eq!(frame.map(|f| f.as_slice().to_vec()), Ok(vec![2, 1]));

        // the replay runs dry and the source winds down on its own
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_err());
        assert_eq!(source.state(), SourceState::Idle);
        assert!(!replay.is_in_use());
        Ok(())
    }

    #[test]
    fn stop_releases_device_and_restart_works() -> Result<(), CaptureError> {
        let replay = backend(true)?;
        let mut source = FrameSource::new(Arc::new(replay.clone()));

        for _ in 0..3 {
            let (tx, rx) = mpsc::channel();
            source.start(0, move |frame| {
                let _ = tx.send(frame);
            })?;
            assert!(source.is_running());
            assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());

            source.stop();
            assert_eq!(source.state(), SourceState::Idle);
            assert!(!replay.is_in_use());
        }
        assert_eq!(replay.open_count(), 3);
        Ok(())
    }

    #[test]
    fn start_while_running_is_noop() -> Result<(), CaptureError> {
        let replay = backend(true)?;
        let mut source = FrameSource::new(Arc::new(replay.clone()));
        source.start(0, |_| {})?;
        source.start(0, |_| {})?;
        assert_eq!(replay.open_count(), 1);
        source.stop();
        source.stop();
        Ok(())
    }

    #[test]
    fn unavailable_device_stays_idle() -> Result<(), CaptureError> {
        let mut source = FrameSource::new(Arc::new(backend(true)?));
        let res = source.start(9, |_| {});
        assert!(matches!(res, Err(CaptureError::DeviceUnavailable { index: 9, .. })));
        assert_eq!(source.state(), SourceState::Idle);
        Ok(())
    }
}
