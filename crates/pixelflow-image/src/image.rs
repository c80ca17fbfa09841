use crate::error::ImageError;

/// Width and height of a raster, in pixels.
///
/// # Examples
///
/// ```
/// use pixelflow_image::ImageSize;
///
/// let size: ImageSize = [640, 480].into();
/// assert_eq!(size.area(), 640 * 480);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageSize {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
}

impl ImageSize {
    /// Number of pixels covered by this size.
    #[inline]
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from([width, height]: [usize; 2]) -> Self {
        ImageSize { width, height }
    }
}

/// A raster with a compile-time channel count.
///
/// Samples are stored row-major with interleaved channels (H, W, C). The
/// length of the sample vector always equals `width * height * CHANNELS`.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T, const CHANNELS: usize> {
    size: ImageSize,
    data: Vec<T>,
}

impl<T, const CHANNELS: usize> Image<T, CHANNELS> {
    /// Wrap interleaved samples into an image.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidChannelShape`] when `data` does not hold
    /// exactly `size.area() * CHANNELS` samples.
    ///
    /// # Examples
    ///
    /// ```
    /// use pixelflow_image::Image;
    ///
    /// let image = Image::<u8, 3>::new([10, 20].into(), vec![0u8; 10 * 20 * 3]).unwrap();
    /// assert_eq!(image.width(), 10);
    /// assert_eq!(image.height(), 20);
    /// assert_eq!(image.num_channels(), 3);
    ///
    /// assert!(Image::<u8, 3>::new([10, 20].into(), vec![0u8; 5]).is_err());
    /// ```
    pub fn new(size: ImageSize, data: Vec<T>) -> Result<Self, ImageError> {
        let expected = size.area() * CHANNELS;
        if data.len() != expected {
            return Err(ImageError::InvalidChannelShape(data.len(), expected));
        }

        Ok(Self { size, data })
    }

    /// Create an image with every sample set to `val`.
    pub fn from_size_val(size: ImageSize, val: T) -> Result<Self, ImageError>
    where
        T: Clone,
    {
        Image::new(size, vec![val; size.area() * CHANNELS])
    }

    /// Extract one channel as a single-channel image.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::ChannelIndexOutOfBounds`] if `channel >= CHANNELS`.
    pub fn channel(&self, channel: usize) -> Result<Image<T, 1>, ImageError>
    where
        T: Copy,
    {
        if channel >= CHANNELS {
            return Err(ImageError::ChannelIndexOutOfBounds(channel, CHANNELS));
        }

        let plane = self
            .data
            .chunks_exact(CHANNELS)
            .map(|pixel| pixel[channel])
            .collect();

        Image::new(self.size, plane)
    }

    /// Split the image into one plane per channel.
    pub fn split_channels(&self) -> Result<Vec<Image<T, 1>>, ImageError>
    where
        T: Copy,
    {
        (0..CHANNELS).map(|c| self.channel(c)).collect()
    }

    /// Size of the image in pixels.
    #[inline]
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Number of columns, same as [`Image::width`].
    #[inline]
    pub fn cols(&self) -> usize {
        self.size.width
    }

    /// Number of rows, same as [`Image::height`].
    #[inline]
    pub fn rows(&self) -> usize {
        self.size.height
    }

    /// Width of the image in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Height of the image in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Number of interleaved channels.
    #[inline]
    pub fn num_channels(&self) -> usize {
        CHANNELS
    }

    /// Samples as a flat row-major slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Samples as a mutable flat row-major slice.
    #[inline]
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Sample at column `x`, row `y` and channel `ch`.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinates or the channel fall outside the image.
    pub fn get_pixel(&self, x: usize, y: usize, ch: usize) -> Result<&T, ImageError> {
        if x >= self.width() || y >= self.height() {
            return Err(ImageError::PixelIndexOutOfBounds(
                x,
                y,
                self.width(),
                self.height(),
            ));
        }

        if ch >= CHANNELS {
            return Err(ImageError::ChannelIndexOutOfBounds(ch, CHANNELS));
        }

        Ok(&self.data[(y * self.cols() + x) * CHANNELS + ch])
    }
}

#[cfg(test)]
mod tests {
    use crate::image::{Image, ImageError, ImageSize};

    #[test]
    fn size_from_array() {
        let size: ImageSize = [10, 20].into();
        assert_eq!(size.width, 10);
        assert_eq!(size.height, 20);
        assert_eq!(size.area(), 200);
        assert_eq!(size.to_string(), "10x20");
    }

    #[test]
    fn wrong_length_is_rejected() {
        let res = Image::<u8, 3>::new([2, 2].into(), vec![0u8; 5]);
        assert_eq!(res, Err(ImageError::InvalidChannelShape(5, 12)));
    }

    #[test]
    fn get_pixel_bounds() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new([2, 1].into(), vec![7, 9])?;
        assert_eq!(image.get_pixel(1, 0, 0)?, &9);
        assert!(image.get_pixel(2, 0, 0).is_err());
        assert!(image.get_pixel(0, 1, 0).is_err());
        assert!(image.get_pixel(0, 0, 1).is_err());
        Ok(())
    }

    #[test]
    fn split_rgb_planes() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new([1, 2].into(), vec![0, 1, 2, 3, 4, 5])?;
        let planes = image.split_channels()?;
        assert_eq!(planes.len(), 3);
        assert_eq!(planes[0].as_slice(), &[0, 3]);
        assert_eq!(planes[1].as_slice(), &[1, 4]);
        assert_eq!(planes[2].as_slice(), &[2, 5]);
        assert!(image.channel(3).is_err());
        Ok(())
    }
}
