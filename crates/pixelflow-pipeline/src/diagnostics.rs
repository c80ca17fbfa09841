use pixelflow_image::{ImageError, PixelBuffer};
use pixelflow_imgproc::histogram;

/// Per-channel 256-bin histograms of an image.
///
/// # Example
///
/// ```
/// use pixelflow_image::{ChannelLayout, PixelBuffer};
/// use pixelflow_pipeline::diagnostics::Histograms;
///
/// let image = PixelBuffer::from_size_val([4, 4].into(), ChannelLayout::Rgb, 9).unwrap();
/// let hist = Histograms::compute(&image).unwrap();
///
/// assert_eq!(hist.num_channels(), 3);
/// assert_eq!(hist.channel(0).map(|h| h[9]), Some(16));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Histograms {
    channels: Vec<[usize; 256]>,
}

impl Histograms {
    /// Count the samples of every channel of `buffer`.
    pub fn compute(buffer: &PixelBuffer) -> Result<Self, ImageError> {
        let channels = buffer
            .split_channels()?
            .iter()
            .map(histogram::histogram_256)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { channels })
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// The histogram of channel `index`.
    pub fn channel(&self, index: usize) -> Option<&[usize; 256]> {
        self.channels.get(index)
    }

    /// Mean sample value of channel `index`.
    pub fn mean(&self, index: usize) -> Option<f64> {
        let hist = self.channel(index)?;
        let total: usize = hist.iter().sum();
        if total == 0 {
            return None;
        }
        let sum: usize = hist.iter().enumerate().map(|(v, &n)| v * n).sum();
        Some(sum as f64 / total as f64)
    }
}
