mod replay;
pub use replay::{ReplayBackend, ReplayConfig};

#[cfg(all(feature = "v4l", target_os = "linux"))]
mod v4l;
#[cfg(all(feature = "v4l", target_os = "linux"))]
pub use self::v4l::{V4lBackend, V4lCameraConfig};

use pixelflow_image::PixelBuffer;

/// An error type for capture devices.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    /// The device could not be opened.
    #[error("Capture device {index} is unavailable: {reason}")]
    DeviceUnavailable {
        /// Index of the requested device.
        index: u32,
        /// Why opening failed.
        reason: String,
    },

    /// A frame could not be read from an open device.
    #[error("Failed to read a frame. {0}")]
    ReadError(#[from] std::io::Error),

    /// The device produced samples that do not form a valid image.
    #[error("Invalid frame. {0}")]
    InvalidFrame(#[from] pixelflow_image::ImageError),
}

/// A factory for capture devices addressed by index.
///
/// Implementations must be shareable so that the capture loop can open the
/// device on its own thread.
pub trait CaptureBackend: Send + Sync {
    /// Open the device with the given index.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::DeviceUnavailable`] if the device is missing or
    /// already held by someone else.
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, CaptureError>;
}

/// An open capture device.
pub trait CaptureDevice: Send {
    /// Read the next frame.
    ///
    /// Blocks until a frame is available. `Ok(None)` marks the end of the
    /// stream.
    fn read_frame(&mut self) -> Result<Option<PixelBuffer>, CaptureError>;

    /// Give the device back. Calling this more than once is harmless.
    fn release(&mut self);
}
