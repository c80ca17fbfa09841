use pixelflow_image::{Image, ImageError};
use rayon::prelude::*;

/// Offsets of each kernel tap relative to the center tap.
fn tap_offsets(kernel: &[f32]) -> Vec<isize> {
    let half = (kernel.len() / 2) as isize;
    (0..kernel.len() as isize).map(|i| i - half).collect()
}

/// Clamp a signed index into `[0, len)`, replicating the border samples.
#[inline]
fn clamp_index(idx: isize, len: usize) -> usize {
    idx.clamp(0, len as isize - 1) as usize
}

/// Apply a separable filter to an image.
///
/// The horizontal kernel is applied first, then the vertical one. Borders
/// replicate the nearest edge sample.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_x` - The horizontal kernel.
/// * `kernel_y` - The vertical kernel.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn separable_filter<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel_x: &[f32],
    kernel_y: &[f32],
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    if kernel_x.is_empty() {
        return Err(ImageError::InvalidKernelSize(0));
    }

    if kernel_y.is_empty() {
        return Err(ImageError::InvalidKernelSize(0));
    }

    let (cols, rows) = (src.cols(), src.rows());
    if cols == 0 || rows == 0 {
        return Ok(());
    }

    let offsets_x = tap_offsets(kernel_x);
    let offsets_y = tap_offsets(kernel_y);
    let row_len = cols * C;
    let src_data = src.as_slice();

    // horizontal pass
    let mut temp = vec![0.0f32; src_data.len()];
    temp.par_chunks_exact_mut(row_len)
        .zip(src_data.par_chunks_exact(row_len))
        .for_each(|(out_row, in_row)| {
            for x in 0..cols {
                let mut acc = [0.0f32; C];
                for (k, &off) in kernel_x.iter().zip(offsets_x.iter()) {
                    let sx = clamp_index(x as isize + off, cols);
                    for (c, a) in acc.iter_mut().enumerate() {
                        *a += in_row[sx * C + c] * k;
                    }
                }
                out_row[x * C..(x + 1) * C].copy_from_slice(&acc);
            }
        });

    // vertical pass
    dst.as_slice_mut()
        .par_chunks_exact_mut(row_len)
        .enumerate()
        .for_each(|(y, out_row)| {
            out_row.iter_mut().for_each(|v| *v = 0.0);
            for (k, &off) in kernel_y.iter().zip(offsets_y.iter()) {
                let sy = clamp_index(y as isize + off, rows);
                let in_row = &temp[sy * row_len..(sy + 1) * row_len];
                for (o, &i) in out_row.iter_mut().zip(in_row.iter()) {
                    *o += i * k;
                }
            }
        });

    Ok(())
}

/// Convert an 8-bit image to floating point without scaling.
pub fn to_f32<const C: usize>(src: &Image<u8, C>) -> Result<Image<f32, C>, ImageError> {
    let data = src.as_slice().iter().map(|&v| f32::from(v)).collect();
    Image::new(src.size(), data)
}

/// Round and saturate a floating point image back into an 8-bit destination.
pub fn from_f32_saturating<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<u8, C>,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    dst.as_slice_mut()
        .par_iter_mut()
        .zip(src.as_slice().par_iter())
        .for_each(|(d, &s)| *d = s.round().clamp(0.0, 255.0) as u8);

    Ok(())
}
