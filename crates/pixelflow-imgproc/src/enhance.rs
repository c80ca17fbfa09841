use pixelflow_image::{Image, ImageError};

use crate::{filter, histogram, parallel};

fn check_same_size<const C: usize>(
    src: &Image<u8, C>,
    dst: &Image<u8, C>,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
        ));
    }
    Ok(())
}

/// Apply a linear contrast and brightness adjustment.
///
/// dst(x,y,c) = saturate(src(x,y,c) * alpha + beta)
///
/// # Arguments
///
/// * `src` - The input image.
/// * `dst` - The output image.
/// * `alpha` - Contrast gain.
/// * `beta` - Brightness offset.
///
/// # Example
///
/// ```
/// use pixelflow_image::Image;
/// use pixelflow_imgproc::enhance::adjust_brightness_contrast;
///
/// let src = Image::<u8, 1>::new([3, 1].into(), vec![0, 100, 200]).unwrap();
/// let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0).unwrap();
///
/// adjust_brightness_contrast(&src, &mut dst, 1.5, 10.0).unwrap();
/// assert_eq!(dst.as_slice(), &[10, 160, 255]);
/// ```
pub fn adjust_brightness_contrast<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    alpha: f32,
    beta: f32,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;

    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = (i as f32 * alpha + beta).round().clamp(0.0, 255.0) as u8;
    }

    parallel::par_iter_rows_val(src, dst, |&s, d| *d = lut[s as usize]);

    Ok(())
}

/// 3x3 laplacian sharpening kernel.
const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Sharpen an image and scale the result by `alpha`.
///
/// The image is correlated with `[0 -1 0; -1 5 -1; 0 -1 0]` and saturated to
/// 8 bits, then every sample becomes `saturate(|v * alpha|)`.
///
/// # Example
///
/// ```
/// use pixelflow_image::Image;
/// use pixelflow_imgproc::enhance::sharpen;
///
/// let src = Image::<u8, 1>::new([4, 1].into(), vec![0, 0, 200, 200]).unwrap();
/// let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0).unwrap();
///
/// sharpen(&src, &mut dst, 1.0).unwrap();
/// assert_eq!(dst.as_slice(), &[0, 0, 255, 200]);
/// ```
pub fn sharpen<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
    alpha: f32,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;

    let src_f32 = filter::to_f32(src)?;
    let mut response = Image::<f32, C>::from_size_val(src.size(), 0.0)?;
    filter::filter2d(&src_f32, &mut response, &SHARPEN_KERNEL, 3)?;

    parallel::par_iter_rows_val(&response, dst, |&r, d| {
        let sharp = r.round().clamp(0.0, 255.0);
        *d = (sharp * alpha).abs().round().clamp(0.0, 255.0) as u8;
    });

    Ok(())
}

/// Invert every sample: `255 - v`.
pub fn invert<const C: usize>(src: &Image<u8, C>, dst: &mut Image<u8, C>) -> Result<(), ImageError> {
    check_same_size(src, dst)?;
    parallel::par_iter_rows_val(src, dst, |&s, d| *d = u8::MAX - s);
    Ok(())
}

/// Build the equalization lookup table of a 256-bin histogram.
///
/// Images with a single intensity map onto themselves.
fn equalization_lut(hist: &[usize; 256]) -> [u8; 256] {
    let mut lut = [0u8; 256];
    let total: usize = hist.iter().sum();
    let cdf_min = hist.iter().copied().find(|&c| c > 0).unwrap_or(0);

    if total == 0 || total == cdf_min {
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
        return lut;
    }

    let denom = (total - cdf_min) as f64;
    let mut cdf = 0usize;
    for (i, v) in lut.iter_mut().enumerate() {
        cdf += hist[i];
        let num = cdf.saturating_sub(cdf_min) as f64;
        *v = (num / denom * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Equalize the histogram of every channel independently.
pub fn equalize_histogram<const C: usize>(
    src: &Image<u8, C>,
    dst: &mut Image<u8, C>,
) -> Result<(), ImageError> {
    check_same_size(src, dst)?;

    let luts = src
        .split_channels()?
        .iter()
        .map(|plane| histogram::histogram_256(plane).map(|h| equalization_lut(&h)))
        .collect::<Result<Vec<_>, ImageError>>()?;

    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        for (c, (&s, d)) in src_pixel.iter().zip(dst_pixel.iter_mut()).enumerate() {
            *d = luts[c][s as usize];
        }
    });

    Ok(())
}
