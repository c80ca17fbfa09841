use pixelflow_image::{Image, ImageError};
use rayon::prelude::*;

/// Correlate an image with a dense square kernel.
///
/// The kernel is row-major with side `kernel_size` and is applied without
/// flipping, like `filter2D`. Borders replicate the nearest edge sample.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel` - The `kernel_size * kernel_size` weights.
/// * `kernel_size` - The odd side length of the kernel.
pub fn filter2d<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel: &[f32],
    kernel_size: usize,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    if kernel_size % 2 == 0 || kernel.len() != kernel_size * kernel_size {
        return Err(ImageError::InvalidKernelSize(kernel_size));
    }

    let (cols, rows) = (src.cols(), src.rows());
    if cols == 0 || rows == 0 {
        return Ok(());
    }

    let half = (kernel_size / 2) as isize;
    let row_len = cols * C;
    let src_data = src.as_slice();

    dst.as_slice_mut()
        .par_chunks_exact_mut(row_len)
        .enumerate()
        .for_each(|(y, out_row)| {
            for x in 0..cols {
                let mut acc = [0.0f32; C];
                for (ky, weights) in kernel.chunks_exact(kernel_size).enumerate() {
                    let sy = (y as isize + ky as isize - half).clamp(0, rows as isize - 1) as usize;
                    let in_row = &src_data[sy * row_len..(sy + 1) * row_len];
                    for (kx, &w) in weights.iter().enumerate() {
                        let sx =
                            (x as isize + kx as isize - half).clamp(0, cols as isize - 1) as usize;
                        for (c, a) in acc.iter_mut().enumerate() {
                            *a += in_row[sx * C + c] * w;
                        }
                    }
                }
                out_row[x * C..(x + 1) * C].copy_from_slice(&acc);
            }
        });

    Ok(())
}
