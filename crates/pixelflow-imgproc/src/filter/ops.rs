use pixelflow_image::{Image, ImageError};
use rayon::prelude::*;

use super::{from_f32_saturating, kernels, separable_filter, to_f32};
use crate::parallel;

/// Which image derivative the sobel operator reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SobelDirection {
    /// The gradient magnitude `sqrt(gx^2 + gy^2)`.
    Magnitude,
    /// The absolute horizontal derivative.
    X,
    /// The absolute vertical derivative.
    Y,
}

fn check_kernel_size(kernel_size: usize) -> Result<(), ImageError> {
    if kernel_size == 0 || kernel_size % 2 == 0 {
        return Err(ImageError::InvalidKernelSize(kernel_size));
    }
    Ok(())
}

fn check_same_size<const C: usize>(
    src: &Image<u8, C>,
    dst: &Image<u8, C>,
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

/// Blur an image using a box blur filter
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_size` - The odd size of the square kernel.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn box_blur<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel_size: usize,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;
    check_kernel_size(kernel_size)?;

    let kernel = kernels::box_blur_kernel_1d(kernel_size);
    let src_f32 = to_f32(src)?;
    let mut dst_f32 = Image::<f32, C>::from_size_val(src.size(), 0.0)?;
    separable_filter(&src_f32, &mut dst_f32, &kernel, &kernel)?;
    from_f32_saturating(&dst_f32, dst)
}

/// Blur an image using a gaussian blur filter
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_size` - The odd size of the square kernel.
/// * `sigma` - The sigma of the gaussian kernel; zero derives it from the kernel size.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn gaussian_blur<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel_size: usize,
    sigma: f32,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;
    check_kernel_size(kernel_size)?;

    let kernel = kernels::gaussian_kernel_1d(kernel_size, sigma);
    let src_f32 = to_f32(src)?;
    let mut dst_f32 = Image::<f32, C>::from_size_val(src.size(), 0.0)?;
    separable_filter(&src_f32, &mut dst_f32, &kernel, &kernel)?;
    from_f32_saturating(&dst_f32, dst)
}

/// Replace every sample by the median of its `kernel_size x kernel_size` neighborhood.
///
/// Channels are filtered independently and borders replicate the edge samples.
pub fn median_blur<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    kernel_size: usize,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;
    check_kernel_size(kernel_size)?;

    let (cols, rows) = (src.cols() as isize, src.rows() as isize);
    let radius = (kernel_size / 2) as isize;
    let data = src.as_slice();

    parallel::par_iter_dst_rows(dst, |y, row| {
        let mut window = Vec::with_capacity(kernel_size * kernel_size);
        for x in 0..cols {
            for c in 0..C {
                window.clear();
                for dy in -radius..=radius {
                    let sy = (y as isize + dy).clamp(0, rows - 1);
                    for dx in -radius..=radius {
                        let sx = (x + dx).clamp(0, cols - 1);
                        window.push(data[((sy * cols + sx) as usize) * C + c]);
                    }
                }
                let mid = window.len() / 2;
                let (_, median, _) = window.select_nth_unstable(mid);
                row[x as usize * C + c] = *median;
            }
        }
    });

    Ok(())
}

/// Edge-preserving smoothing with a bilateral filter.
///
/// Each output sample is a weighted mean over a disc of the given
/// `diameter`, where weights fall off with spatial distance (`sigma_space`)
/// and with the summed absolute color difference to the center pixel
/// (`sigma_color`).
pub fn bilateral_filter<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    diameter: usize,
    sigma_color: f32,
    sigma_space: f32,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;
    check_kernel_size(diameter)?;

    let sigma_color = sigma_color.max(f32::EPSILON);
    let sigma_space = sigma_space.max(f32::EPSILON);
    let radius = (diameter / 2) as isize;

    // spatial taps inside the disc
    let mut taps = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2.sqrt() <= radius as f32 {
                taps.push((dy, dx, (-r2 / (2.0 * sigma_space * sigma_space)).exp()));
            }
        }
    }

    // color weights indexed by summed absolute difference
    let color_lut: Vec<f32> = (0..=255 * C)
        .map(|d| {
            let d = d as f32;
            (-(d * d) / (2.0 * sigma_color * sigma_color)).exp()
        })
        .collect();

    let (cols, rows) = (src.cols() as isize, src.rows() as isize);
    let data = src.as_slice();

    parallel::par_iter_dst_rows(dst, |y, row| {
        for x in 0..cols {
            let center = &data[((y as isize * cols + x) as usize) * C..][..C];
            let mut acc = [0.0f32; C];
            let mut norm = 0.0f32;
            for &(dy, dx, w_space) in taps.iter() {
                let sy = (y as isize + dy).clamp(0, rows - 1);
                let sx = (x + dx).clamp(0, cols - 1);
                let px = &data[((sy * cols + sx) as usize) * C..][..C];
                let diff: usize = px
                    .iter()
                    .zip(center.iter())
                    .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs() as usize)
                    .sum();
                let w = w_space * color_lut[diff];
                for (a, &v) in acc.iter_mut().zip(px.iter()) {
                    *a += w * f32::from(v);
                }
                norm += w;
            }
            for (c, a) in acc.iter().enumerate() {
                // the center tap always contributes, so norm is strictly positive
                row[x as usize * C + c] = (a / norm).round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    Ok(())
}

/// Scale absolute responses into `[0, 255]` by their maximum.
///
/// An all-zero response stays all-zero.
fn normalize_response(response: &[f32], dst: &mut Image<u8, 1>) {
    let max = response
        .par_iter()
        .cloned()
        .reduce(|| 0.0f32, f32::max);

    if !(max.is_finite() && max > 0.0) {
        dst.as_slice_mut().iter_mut().for_each(|v| *v = 0);
        return;
    }

    let scale = 255.0 / max;
    dst.as_slice_mut()
        .par_iter_mut()
        .zip(response.par_iter())
        .for_each(|(d, &r)| *d = (r * scale).round().clamp(0.0, 255.0) as u8);
}

/// Compute the sobel edge response of an intensity image.
///
/// The response is normalized so that its strongest edge maps to 255. A flat
/// image produces an all-zero output.
///
/// # Arguments
///
/// * `src` - The source intensity image.
/// * `dst` - The destination intensity image.
/// * `kernel_size` - The kernel size, one of 3, 5 or 7.
/// * `direction` - Which derivative to report.
pub fn sobel(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    kernel_size: usize,
    direction: SobelDirection,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;

    // get the sobel kernels
    let (deriv, smooth) = kernels::sobel_kernel_1d(kernel_size)?;
    let src_f32 = to_f32(src)?;

    let mut gx = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
    let mut gy = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
    if direction != SobelDirection::Y {
        separable_filter(&src_f32, &mut gx, &deriv, &smooth)?;
    }
    if direction != SobelDirection::X {
        separable_filter(&src_f32, &mut gy, &smooth, &deriv)?;
    }

    let response: Vec<f32> = gx
        .as_slice()
        .par_iter()
        .zip(gy.as_slice().par_iter())
        .map(|(&gx, &gy)| match direction {
            SobelDirection::Magnitude => (gx * gx + gy * gy).sqrt(),
            SobelDirection::X => gx.abs(),
            SobelDirection::Y => gy.abs(),
        })
        .collect();

    normalize_response(&response, dst);

    Ok(())
}

/// Compute the absolute laplacian of an intensity image.
///
/// `kernel_size` 1 uses the 4-neighbour kernel, 3 the diagonal kernel
/// `[2 0 2; 0 -8 0; 2 0 2]`. The response is normalized like [`sobel`].
pub fn laplacian(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    kernel_size: usize,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;

    let kernel: [[f32; 3]; 3] = match kernel_size {
        1 => [[0.0, 1.0, 0.0], [1.0, -4.0, 1.0], [0.0, 1.0, 0.0]],
        3 => [[2.0, 0.0, 2.0], [0.0, -8.0, 0.0], [2.0, 0.0, 2.0]],
        _ => return Err(ImageError::InvalidKernelSize(kernel_size)),
    };

    let (cols, rows) = (src.cols() as isize, src.rows() as isize);
    let data = src.as_slice();

    let response: Vec<f32> = (0..rows * cols)
        .into_par_iter()
        .map(|idx| {
            let (y, x) = (idx / cols, idx % cols);
            let mut acc = 0.0f32;
            for (ky, krow) in kernel.iter().enumerate() {
                let sy = (y + ky as isize - 1).clamp(0, rows - 1);
                for (kx, &k) in krow.iter().enumerate() {
                    let sx = (x + kx as isize - 1).clamp(0, cols - 1);
                    acc += k * f32::from(data[(sy * cols + sx) as usize]);
                }
            }
            acc.abs()
        })
        .collect();

    normalize_response(&response, dst);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::SobelDirection;
    use pixelflow_image::{Image, ImageError, ImageSize};

    fn step_image() -> Result<Image<u8, 1>, ImageError> {
        let size = ImageSize {
            width: 6,
            height: 4,
        };
        let data = (0..size.area())
            .map(|i| if i % size.width < 3 { 0 } else { 200 })
            .collect();
        Image::new(size, data)
    }

    #[test]
    fn box_blur_flat_image_is_unchanged() -> Result<(), ImageError> {
        let src = Image::<u8, 3>::from_size_val([4, 4].into(), 90)?;
        let mut dst = Image::<u8, 3>::from_size_val(src.size(), 0)?;
        super::box_blur(&src, &mut dst, 3)?;
        assert_eq!(dst, src);
        assert!(super::box_blur(&src, &mut dst, 2).is_err());
        Ok(())
    }

    #[test]
    fn gaussian_blur_smooths_step() -> Result<(), ImageError> {
        let src = step_image()?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        super::gaussian_blur(&src, &mut dst, 3, 0.0)?;
        let row = &dst.as_slice()[0..6];
        assert_eq!(row[0], 0);
        assert!(row[2] > 0 && row[3] < 200, "{row:?}");
        assert_eq!(row[5], 200);
        Ok(())
    }

    #[test]
    fn median_blur_removes_impulse() -> Result<(), ImageError> {
        let mut data = vec![10u8; 25];
        data[12] = 255;
        let src = Image::<u8, 1>::new([5, 5].into(), data)?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        super::median_blur(&src, &mut dst, 3)?;
        assert!(dst.as_slice().iter().all(|&v| v == 10));
        Ok(())
    }

    #[test]
    fn bilateral_keeps_strong_edge() -> Result<(), ImageError> {
        let src = step_image()?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        super::bilateral_filter(&src, &mut dst, 5, 10.0, 50.0)?;
        let row = &dst.as_slice()[0..6];
        assert_eq!(row[2], 0);
        assert_eq!(row[3], 200);
        Ok(())
    }

    #[test]
    fn sobel_detects_vertical_edge() -> Result<(), ImageError> {
        let src = step_image()?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        super::sobel(&src, &mut dst, 3, SobelDirection::Magnitude)?;
        let row = &dst.as_slice()[6..12];
        assert_eq!(row[0], 0);
        assert_eq!(row[2], 255);
        assert_eq!(row[3], 255);
        assert_eq!(row[5], 0);

        super::sobel(&src, &mut dst, 3, SobelDirection::Y)?;
        assert!(dst.as_slice().iter().all(|&v| v == 0));
        Ok(())
    }

    #[test]
    fn sobel_flat_image_is_all_zero() -> Result<(), ImageError> {
        let src = Image::<u8, 1>::from_size_val([8, 8].into(), 0)?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 7)?;
        for k in [3, 5, 7] {
            super::sobel(&src, &mut dst, k, SobelDirection::Magnitude)?;
            assert!(dst.as_slice().iter().all(|&v| v == 0));
        }
        Ok(())
    }

    #[test]
    fn laplacian_responds_at_edge() -> Result<(), ImageError> {
        let src = step_image()?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        super::laplacian(&src, &mut dst, 1)?;
        let row = &dst.as_slice()[0..6];
        assert_eq!(row[0], 0);
        assert_eq!(row[2], 255);
        assert_eq!(row[3], 255);
        assert!(super::laplacian(&src, &mut dst, 5).is_err());
        Ok(())
    }
}
