use num_traits::Zero;
use std::cmp::PartialOrd;

use pixelflow_image::{Image, ImageError};

use crate::parallel;

/// The type of thresholding to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdType {
    /// Binary thresholding
    Binary,
    /// Inverse binary thresholding
    BinaryInv,
    /// Truncated thresholding
    Trunc,
    /// To zero thresholding
    ToZero,
    /// Inverse to zero thresholding
    ToZeroInv,
}

fn check_same_size<T1, T2, const C1: usize, const C2: usize>(
    src: &Image<T1, C1>,
    dst: &Image<T2, C2>,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }
    Ok(())
}

/// Apply a fixed-level threshold to an image.
///
/// Every sample is compared against `threshold` independently, so color
/// images are thresholded per channel.
///
/// # Arguments
///
/// * `src` - The input image of an arbitrary number of channels and type.
/// * `dst` - The output image of the same size.
/// * `threshold` - The threshold value. Must be the same type as the image.
/// * `max_value` - The value used by the binary variants above (or below) the threshold.
/// * `kind` - The [`ThresholdType`] to apply.
///
/// # Examples
///
/// ```
/// use pixelflow_image::{Image, ImageSize};
/// use pixelflow_imgproc::threshold::{threshold, ThresholdType};
///
/// let data = vec![100u8, 200, 50, 150, 200, 250];
/// let image = Image::<_, 1>::new(ImageSize { width: 2, height: 3 }, data).unwrap();
///
/// let mut thresholded = Image::<_, 1>::from_size_val(image.size(), 0).unwrap();
///
/// threshold(&image, &mut thresholded, 100, 255, ThresholdType::Binary).unwrap();
/// assert_eq!(thresholded.as_slice(), &[0, 255, 0, 255, 255, 255]);
/// ```
pub fn threshold<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    threshold: T,
    max_value: T,
    kind: ThresholdType,
) -> Result<(), ImageError>
where
    T: Copy + Send + Sync + PartialOrd + Zero,
{
    check_same_size(src, dst)?;

    // run the thresholding operation in parallel
    parallel::par_iter_rows_val(src, dst, |&src_pixel, dst_pixel| {
        let above = src_pixel > threshold;
        *dst_pixel = match kind {
            ThresholdType::Binary if above => max_value,
            ThresholdType::Binary => T::zero(),
            ThresholdType::BinaryInv if above => T::zero(),
            ThresholdType::BinaryInv => max_value,
            ThresholdType::Trunc if above => threshold,
            ThresholdType::Trunc => src_pixel,
            ThresholdType::ToZero if above => src_pixel,
            ThresholdType::ToZero => T::zero(),
            ThresholdType::ToZeroInv if above => T::zero(),
            ThresholdType::ToZeroInv => src_pixel,
        };
    });

    Ok(())
}

/// Apply a binary threshold to an image.
///
/// Samples strictly greater than `threshold` become `max_value`, the rest zero.
pub fn threshold_binary<T, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<T, C>,
    threshold_value: T,
    max_value: T,
) -> Result<(), ImageError>
where
    T: Copy + Send + Sync + PartialOrd + Zero,
{
    threshold(src, dst, threshold_value, max_value, ThresholdType::Binary)
}

/// Compute the threshold that maximizes the between-class variance of a
/// 256-bin histogram (Otsu's method).
///
/// Returns 0 for an empty histogram.
pub fn otsu_threshold_value(hist: &[usize; 256]) -> u8 {
    let total: usize = hist.iter().sum();
    if total == 0 {
        return 0;
    }

    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_bg = 0.0f64;
    let mut weight_bg = 0usize;
    let mut best_threshold = 0u8;
    let mut best_variance = -1.0f64;

    for (t, &count) in hist.iter().enumerate() {
        weight_bg += count;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }

        sum_bg += t as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;
        let diff = mean_bg - mean_fg;
        let variance = weight_bg as f64 * weight_fg as f64 * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// Threshold an intensity image against the mean of its local neighborhood.
///
/// A pixel becomes `max_value` when it is greater than the mean of the
/// `block_size x block_size` window centered on it minus `c`, otherwise zero.
/// Windows are clipped at the image border.
///
/// # Errors
///
/// Returns an error if the sizes differ or `block_size` is even or smaller than 3.
pub fn adaptive_threshold_mean(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    block_size: usize,
    c: i32,
    max_value: u8,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;

    if block_size < 3 || block_size % 2 == 0 {
        return Err(ImageError::InvalidKernelSize(block_size));
    }

    let (width, height) = (src.cols(), src.rows());
    let integral = integral_image(src);
    let stride = width + 1;
    let radius = block_size / 2;
    let data = src.as_slice();

    parallel::par_iter_dst_rows(dst, |y, row| {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius + 1).min(height);
        for (x, out) in row.iter_mut().enumerate() {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius + 1).min(width);
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let area = ((y1 - y0) * (x1 - x0)) as f64;
            let mean = sum as f64 / area;
            *out = if f64::from(data[y * width + x]) > mean - f64::from(c) {
                max_value
            } else {
                0
            };
        }
    });

    Ok(())
}

/// Summed-area table with a zero first row and column.
fn integral_image(src: &Image<u8, 1>) -> Vec<u64> {
    let (width, height) = (src.cols(), src.rows());
    let stride = width + 1;
    let mut integral = vec![0u64; stride * (height + 1)];
    for (y, row) in src.as_slice().chunks_exact(width.max(1)).enumerate() {
        let mut row_sum = 0u64;
        for (x, &v) in row.iter().enumerate() {
            row_sum += u64::from(v);
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }
    integral
}

#[cfg(test)]
mod tests {
    use super::ThresholdType;
    use pixelflow_image::{Image, ImageError, ImageSize};

    fn image(data: Vec<u8>) -> Result<Image<u8, 1>, ImageError> {
        Image::new(
            ImageSize {
                width: 2,
                height: 3,
            },
            data,
        )
    }

    #[test]
    fn threshold_variants() -> Result<(), ImageError> {
        let src = image(vec![100, 200, 50, 150, 200, 250])?;
        let mut dst = Image::from_size_val(src.size(), 0u8)?;

        let cases = [
            (ThresholdType::Binary, [0, 255, 0, 255, 255, 255]),
            (ThresholdType::BinaryInv, [255, 0, 255, 0, 0, 0]),
            (ThresholdType::Trunc, [100, 150, 50, 150, 150, 150]),
            (ThresholdType::ToZero, [0, 200, 0, 0, 200, 250]),
            (ThresholdType::ToZeroInv, [100, 0, 50, 150, 0, 0]),
        ];

        for (kind, expected) in cases {
            let t = if kind == ThresholdType::Binary || kind == ThresholdType::BinaryInv {
                100
            } else {
                150
            };
            super::threshold(&src, &mut dst, t, 255, kind)?;
            assert_eq!(dst.as_slice(), &expected, "{kind:?}");
        }

        Ok(())
    }

    #[test]
    fn threshold_size_mismatch() -> Result<(), ImageError> {
        let src = image(vec![0; 6])?;
        let mut dst = Image::<u8, 1>::from_size_val([3, 3].into(), 0)?;
        assert!(super::threshold_binary(&src, &mut dst, 1, 255).is_err());
        Ok(())
    }

    #[test]
    fn otsu_bimodal() {
        let mut hist = [0usize; 256];
        hist[40] = 100;
        hist[210] = 100;
        let t = super::otsu_threshold_value(&hist);
        assert!((40..210).contains(&t), "threshold {t}");
        assert_eq!(super::otsu_threshold_value(&[0; 256]), 0);
    }

    #[test]
    fn adaptive_threshold_flat_image() -> Result<(), ImageError> {
        let src = Image::<u8, 1>::from_size_val([5, 5].into(), 80)?;
        let mut dst = Image::from_size_val(src.size(), 0u8)?;
        // a flat image sits exactly on its mean, so a positive offset keeps it
        super::adaptive_threshold_mean(&src, &mut dst, 3, 2, 255)?;
        assert!(dst.as_slice().iter().all(|&v| v == 255));
        super::adaptive_threshold_mean(&src, &mut dst, 3, -2, 255)?;
        assert!(dst.as_slice().iter().all(|&v| v == 0));
        assert!(super::adaptive_threshold_mean(&src, &mut dst, 4, 0, 255).is_err());
        Ok(())
    }
}
