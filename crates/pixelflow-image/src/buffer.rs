use crate::{error::ImageError, Image, ImageSize};

/// The channel layout of a [`PixelBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// Single intensity channel.
    Mono,
    /// Three interleaved color channels (RGB order).
    Rgb,
}

impl ChannelLayout {
    /// Number of samples per pixel.
    #[inline]
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Rgb => 3,
        }
    }
}

/// An 8-bit raster whose channel layout is only known at runtime.
///
/// This is the unit of data exchanged between the capture source, the
/// transform catalog and the presentation layer. Once produced it is never
/// mutated in place; stages hand it on by value or by shared reference.
///
/// # Examples
///
/// ```
/// use pixelflow_image::{ChannelLayout, ImageSize, PixelBuffer};
///
/// let buffer = PixelBuffer::from_raw(
///     ImageSize { width: 2, height: 1 },
///     ChannelLayout::Mono,
///     vec![0, 255],
/// ).unwrap();
///
/// assert_eq!(buffer.num_channels(), 1);
/// assert_eq!(buffer.as_slice(), &[0, 255]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum PixelBuffer {
    /// 8-bit grayscale image
    Mono8(Image<u8, 1>),
    /// 8-bit RGB image
    Rgb8(Image<u8, 3>),
}

impl PixelBuffer {
    /// Build a buffer from raw interleaved samples.
    ///
    /// # Errors
    ///
    /// Fails if `data` does not hold exactly `width * height * channels` samples.
    pub fn from_raw(
        size: ImageSize,
        layout: ChannelLayout,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        Ok(match layout {
            ChannelLayout::Mono => PixelBuffer::Mono8(Image::new(size, data)?),
            ChannelLayout::Rgb => PixelBuffer::Rgb8(Image::new(size, data)?),
        })
    }

    /// Create a buffer filled with a single sample value.
    pub fn from_size_val(
        size: ImageSize,
        layout: ChannelLayout,
        val: u8,
    ) -> Result<Self, ImageError> {
        Self::from_raw(size, layout, vec![val; size.area() * layout.num_channels()])
    }

    /// The channel layout of the buffer.
    #[inline]
    pub fn layout(&self) -> ChannelLayout {
        match self {
            PixelBuffer::Mono8(_) => ChannelLayout::Mono,
            PixelBuffer::Rgb8(_) => ChannelLayout::Rgb,
        }
    }

    /// The size of the buffer in pixels.
    #[inline]
    pub fn size(&self) -> ImageSize {
        match self {
            PixelBuffer::Mono8(img) => img.size(),
            PixelBuffer::Rgb8(img) => img.size(),
        }
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.size().width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.size().height
    }

    /// Number of samples per pixel.
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.layout().num_channels()
    }

    /// The raw interleaved samples.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            PixelBuffer::Mono8(img) => img.as_slice(),
            PixelBuffer::Rgb8(img) => img.as_slice(),
        }
    }

    /// Split the buffer into single-channel planes.
    pub fn split_channels(&self) -> Result<Vec<Image<u8, 1>>, ImageError> {
        match self {
            PixelBuffer::Mono8(img) => Ok(vec![img.clone()]),
            PixelBuffer::Rgb8(img) => img.split_channels(),
        }
    }
}

impl From<Image<u8, 1>> for PixelBuffer {
    fn from(image: Image<u8, 1>) -> Self {
        PixelBuffer::Mono8(image)
    }
}

impl From<Image<u8, 3>> for PixelBuffer {
    fn from(image: Image<u8, 3>) -> Self {
        PixelBuffer::Rgb8(image)
    }
}
