use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pixelflow_image::PixelBuffer;

use super::{CaptureBackend, CaptureDevice, CaptureError};

/// Configuration for a [`ReplayBackend`].
#[derive(Clone, Debug)]
pub struct ReplayConfig {
    /// The frames to play back, in order.
    pub frames: Vec<PixelBuffer>,
    /// Delay between consecutive frames. `None` plays as fast as possible.
    pub frame_interval: Option<Duration>,
    /// Restart from the first frame instead of ending the stream.
    pub looping: bool,
    /// The only index the backend answers to.
    pub device_index: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            frame_interval: None,
            looping: false,
            device_index: 0,
        }
    }
}

impl ReplayConfig {
    /// Create a configuration playing `frames` once.
    pub fn new(frames: Vec<PixelBuffer>) -> Self {
        Self {
            frames,
            ..Default::default()
        }
    }

    /// Set the delay between frames.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Enable or disable looping.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Set the device index the backend answers to.
    pub fn with_device_index(mut self, index: u32) -> Self {
        self.device_index = index;
        self
    }
}

/// A capture backend that plays back frames held in memory.
///
/// The device can be held by one session at a time, like a real camera. A
/// second `open` before the first device is released fails with
/// [`CaptureError::DeviceUnavailable`].
///
/// # Example
///
/// ```
/// use pixelflow_image::{ChannelLayout, PixelBuffer};
/// use pixelflow_io::capture::{CaptureBackend, ReplayBackend, ReplayConfig};
///
/// let frame = PixelBuffer::from_size_val([4, 4].into(), ChannelLayout::Rgb, 7).unwrap();
/// let backend = ReplayBackend::new(ReplayConfig::new(vec![frame.clone()]));
///
/// let mut device = backend.open(0).unwrap();
/// assert_eq!(device.read_frame().unwrap(), Some(frame));
/// assert_eq!(device.read_frame().unwrap(), None);
/// device.release();
/// ```
#[derive(Clone)]
pub struct ReplayBackend {
    frames: Arc<Vec<PixelBuffer>>,
    frame_interval: Option<Duration>,
    looping: bool,
    device_index: u32,
    in_use: Arc<AtomicBool>,
    opened: Arc<AtomicUsize>,
}

impl ReplayBackend {
    /// Create a backend from its configuration.
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            frames: Arc::new(config.frames),
            frame_interval: config.frame_interval,
            looping: config.looping,
            device_index: config.device_index,
            in_use: Arc::new(AtomicBool::new(false)),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether a device handle is currently held.
    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }

    /// How many times the device has been opened successfully.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for ReplayBackend {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        if index != self.device_index {
            return Err(CaptureError::DeviceUnavailable {
                index,
                reason: "no such device".to_string(),
            });
        }

        if self
            .in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CaptureError::DeviceUnavailable {
                index,
                reason: "device busy".to_string(),
            });
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        log::debug!("replay device {index} opened ({} frames)", self.frames.len());

        Ok(Box::new(ReplayDevice {
            frames: self.frames.clone(),
            frame_interval: self.frame_interval,
            looping: self.looping,
            position: 0,
            in_use: self.in_use.clone(),
            released: false,
        }))
    }
}

struct ReplayDevice {
    frames: Arc<Vec<PixelBuffer>>,
    frame_interval: Option<Duration>,
    looping: bool,
    position: usize,
    in_use: Arc<AtomicBool>,
    released: bool,
}

impl CaptureDevice for ReplayDevice {
    fn read_frame(&mut self) -> Result<Option<PixelBuffer>, CaptureError> {
        if self.released || self.frames.is_empty() {
            return Ok(None);
        }

        if self.position >= self.frames.len() {
            if !self.looping {
                return Ok(None);
            }
            self.position = 0;
        }

        if let Some(interval) = self.frame_interval {
            std::thread::sleep(interval);
        }

        let frame = self.frames[self.position].clone();
        self.position += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.in_use.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for ReplayDevice {
    fn drop(&mut self) {
        self.release();
    }
}
