use pixelflow_image::{ChannelLayout, ImageSize, PixelBuffer};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::{CaptureBackend, CaptureDevice, CaptureError};

const NUM_BUFFERS: u32 = 4;

/// Configuration for V4L2 video capture.
#[derive(Clone, Debug)]
pub struct V4lCameraConfig {
    /// The desired image size
    pub size: ImageSize,
    /// The desired frames per second
    pub fps: u32,
}

impl Default for V4lCameraConfig {
    fn default() -> Self {
        Self {
            size: ImageSize {
                width: 640,
                height: 480,
            },
            fps: 30,
        }
    }
}

impl V4lCameraConfig {
    /// Set the requested image size.
    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    /// Set the requested frame rate.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }
}

/// Capture backend for `/dev/videoN` devices.
#[derive(Clone, Debug, Default)]
pub struct V4lBackend {
    config: V4lCameraConfig,
}

impl V4lBackend {
    /// Create a backend that opens devices with `config`.
    pub fn new(config: V4lCameraConfig) -> Self {
        Self { config }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WireFormat {
    Yuyv,
    Rgb3,
}

fn unavailable(index: u32, reason: impl ToString) -> CaptureError {
    CaptureError::DeviceUnavailable {
        index,
        reason: reason.to_string(),
    }
}

impl CaptureBackend for V4lBackend {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let device = Device::new(index as usize).map_err(|e| unavailable(index, e))?;

        let mut format = device.format().map_err(|e| unavailable(index, e))?;
        format.width = self.config.size.width as u32;
        format.height = self.config.size.height as u32;
        format.fourcc = FourCC::new(b"YUYV");
        device.set_format(&format).map_err(|e| unavailable(index, e))?;

        // the driver may settle on a different size or format
        let actual = device.format().map_err(|e| unavailable(index, e))?;
        let wire = match &actual.fourcc.repr {
            b"YUYV" => WireFormat::Yuyv,
            b"RGB3" => WireFormat::Rgb3,
            other => {
                return Err(unavailable(
                    index,
                    format!("unsupported pixel format {}", String::from_utf8_lossy(other)),
                ))
            }
        };

        device
            .set_params(&Parameters::with_fps(self.config.fps))
            .map_err(|e| unavailable(index, e))?;

        let stream = Stream::with_buffers(&device, Type::VideoCapture, NUM_BUFFERS)
            .map_err(|e| unavailable(index, e))?;

        let size = ImageSize {
            width: actual.width as usize,
            height: actual.height as usize,
        };
        log::info!("opened /dev/video{index}: {size} {wire:?} @ {} fps", self.config.fps);

        Ok(Box::new(V4lDevice {
            stream: Some(stream),
            _device: device,
            size,
            wire,
        }))
    }
}

struct V4lDevice {
    stream: Option<Stream<'static>>,
    _device: Device,
    size: ImageSize,
    wire: WireFormat,
}

impl CaptureDevice for V4lDevice {
    fn read_frame(&mut self) -> Result<Option<PixelBuffer>, CaptureError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        let (data, _meta) = stream.next()?;
        let num_pixels = self.size.area();

        let rgb = match self.wire {
            WireFormat::Yuyv => {
                if data.len() < num_pixels * 2 {
                    return Ok(None);
                }
                yuyv_to_rgb(&data[..num_pixels * 2])
            }
            WireFormat::Rgb3 => {
                if data.len() < num_pixels * 3 {
                    return Ok(None);
                }
                data[..num_pixels * 3].to_vec()
            }
        };

        Ok(Some(PixelBuffer::from_raw(
            self.size,
            ChannelLayout::Rgb,
            rgb,
        )?))
    }

    fn release(&mut self) {
        // dropping the stream turns streaming off and unmaps the buffers
        self.stream = None;
    }
}

/// Convert packed YUYV 4:2:2 samples to interleaved RGB.
///
/// Uses BT.601 coefficients in fixed point scaled by 32.
fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
    let mut rgb = vec![0u8; yuyv.len() / 2 * 3];

    yuyv.chunks_exact(4)
        .zip(rgb.chunks_exact_mut(6))
        .for_each(|(src, dst)| {
            let u = src[1] as i32 - 128;
            let v = src[3] as i32 - 128;

            let dr = 45 * v;
            let dg = -11 * u - 23 * v;
            let db = 57 * u;

            for (k, &y) in [src[0], src[2]].iter().enumerate() {
                let y = (y as i32) << 5;
                dst[3 * k] = ((y + dr) >> 5).clamp(0, 255) as u8;
                dst[3 * k + 1] = ((y + dg) >> 5).clamp(0, 255) as u8;
                dst[3 * k + 2] = ((y + db) >> 5).clamp(0, 255) as u8;
            }
        });

    rgb
}
