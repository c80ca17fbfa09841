use pixelflow_image::{Image, ImageError};

use crate::parallel;

/// Shape of a structuring element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelShape {
    /// Full square.
    Rect,
    /// Horizontal and vertical bars through the center.
    Cross,
    /// Ellipse inscribed in the square.
    Ellipse,
}

/// Morphological operation built from erosion and dilation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MorphOp {
    /// Minimum over the structuring element.
    Erode,
    /// Maximum over the structuring element.
    Dilate,
    /// Erosion followed by dilation.
    Open,
    /// Dilation followed by erosion.
    Close,
    /// Dilation minus erosion.
    Gradient,
}

/// A binary structuring element.
///
/// # Example
///
/// ```
/// use pixelflow_imgproc::morphology::{Kernel, KernelShape};
///
/// let kernel = Kernel::new(KernelShape::Cross, 3).unwrap();
/// assert_eq!(kernel.data(), &[0, 1, 0, 1, 1, 1, 0, 1, 0]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kernel {
    size: usize,
    data: Vec<u8>,
}

impl Kernel {
    /// Create a square structuring element of odd `size`.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or even.
    pub fn new(shape: KernelShape, size: usize) -> Result<Self, ImageError> {
        if size == 0 || size % 2 == 0 {
            return Err(ImageError::InvalidKernelSize(size));
        }

        let center = (size / 2) as f32;
        let radius = center + 0.5;
        let data = (0..size * size)
            .map(|i| {
                let (y, x) = ((i / size) as f32, (i % size) as f32);
                let inside = match shape {
                    KernelShape::Rect => true,
                    KernelShape::Cross => y == center || x == center,
                    KernelShape::Ellipse => {
                        let (dy, dx) = (y - center, x - center);
                        (dx * dx + dy * dy) <= radius * radius
                    }
                };
                u8::from(inside)
            })
            .collect();

        Ok(Self { size, data })
    }

    /// Side length of the kernel.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Row-major mask, 1 where the element is active.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Active offsets `(dy, dx)` relative to the center.
    fn offsets(&self) -> Vec<(isize, isize)> {
        let half = (self.size / 2) as isize;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == 1)
            .map(|(i, _)| {
                (
                    (i / self.size) as isize - half,
                    (i % self.size) as isize - half,
                )
            })
            .collect()
    }
}

/// Reduce each neighborhood with `select`, skipping taps outside the image.
fn reduce_neighborhood<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel: &Kernel,
    init: u8,
    select: fn(u8, u8) -> u8,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            dst.width(),
            dst.height(),
            src.width(),
            src.height(),
        ));
    }

    let offsets = kernel.offsets();
    let (cols, rows) = (src.cols() as isize, src.rows() as isize);
    let data = src.as_slice();

    parallel::par_iter_dst_rows(dst, |y, row| {
        for x in 0..cols {
            for c in 0..C {
                let mut acc = init;
                for &(dy, dx) in offsets.iter() {
                    let (sy, sx) = (y as isize + dy, x + dx);
                    if sy < 0 || sy >= rows || sx < 0 || sx >= cols {
                        continue;
                    }
                    acc = select(acc, data[((sy * cols + sx) as usize) * C + c]);
                }
                row[x as usize * C + c] = acc;
            }
        }
    });

    Ok(())
}

/// Erode an image using a [`Kernel`].
///
/// Erosion shrinks bright regions. Each sample is replaced by the minimum
/// value in the neighborhood defined by the kernel.
pub fn erode<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel: &Kernel,
) -> Result<(), ImageError> {
    reduce_neighborhood(src, dst, kernel, u8::MAX, std::cmp::min)
}

/// Dilate an image using a [`Kernel`].
///
/// Dilation expands bright regions. Each sample is replaced by the maximum
/// value in the neighborhood defined by the kernel.
pub fn dilate<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel: &Kernel,
) -> Result<(), ImageError> {
    reduce_neighborhood(src, dst, kernel, u8::MIN, std::cmp::max)
}

fn repeat<const C: usize>(
    src: &Image<u8, C>,
    kernel: &Kernel,
    iterations: usize,
    op: fn(&Image<u8, C>, &mut Image<u8, C>, &Kernel) -> Result<(), ImageError>,
) -> Result<Image<u8, C>, ImageError> {
    let mut current = src.clone();
    let mut scratch = Image::from_size_val(src.size(), 0u8)?;
    for _ in 0..iterations {
        op(&current, &mut scratch, kernel)?;
        std::mem::swap(&mut current, &mut scratch);
    }
    Ok(current)
}

/// Apply a [`MorphOp`] `iterations` times per elementary step.
///
/// As with the usual definition, `Open` with two iterations erodes twice and
/// then dilates twice.
pub fn morphology_ex<const C: usize>(
    src: &Image<u8, C>,
    op: MorphOp,
    kernel: &Kernel,
    iterations: usize,
) -> Result<Image<u8, C>, ImageError> {
    match op {
        MorphOp::Erode => repeat(src, kernel, iterations, erode),
        MorphOp::Dilate => repeat(src, kernel, iterations, dilate),
        MorphOp::Open => {
            let eroded = repeat(src, kernel, iterations, erode)?;
            repeat(&eroded, kernel, iterations, dilate)
        }
        MorphOp::Close => {
            let dilated = repeat(src, kernel, iterations, dilate)?;
            repeat(&dilated, kernel, iterations, erode)
        }
        MorphOp::Gradient => {
            let dilated = repeat(src, kernel, iterations, dilate)?;
            let eroded = repeat(src, kernel, iterations, erode)?;
            let data = dilated
                .as_slice()
                .iter()
                .zip(eroded.as_slice().iter())
                .map(|(&d, &e)| d.saturating_sub(e))
                .collect();
            Image::new(src.size(), data)
        }
    }
}
