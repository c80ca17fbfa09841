use pixelflow_image::{Image, ImageError};
use rayon::prelude::*;

use super::{kernels, separable_filter, to_f32};

const TAN_22_5: f32 = 0.414_213_57;
const TAN_67_5: f32 = 2.414_213_6;

#[derive(Clone, Copy, PartialEq, Eq)]
enum EdgeClass {
    None,
    Weak,
    Strong,
}

/// Detect edges with the Canny algorithm.
///
/// Gradients come from the 3x3 sobel operator and their strength is the L1
/// norm `|gx| + |gy|`. Thin ridges are kept by non-maximum suppression along
/// the quantized gradient direction, then hysteresis keeps every ridge pixel
/// stronger than `low_threshold` that is 8-connected to one stronger than
/// `high_threshold`. Edge pixels are 255, everything else 0.
///
/// The thresholds are swapped if given in the wrong order. No smoothing is
/// applied; blur the input first for noisy images.
///
/// # Example
///
/// ```
/// use pixelflow_image::Image;
/// use pixelflow_imgproc::filter::canny;
///
/// let data = (0..40).map(|i| if i % 8 < 4 { 0 } else { 200 }).collect();
/// let src = Image::<u8, 1>::new([8, 5].into(), data).unwrap();
/// let mut edges = Image::<u8, 1>::from_size_val(src.size(), 0).unwrap();
///
/// canny(&src, &mut edges, 50.0, 100.0).unwrap();
/// assert_eq!(&edges.as_slice()[0..8], &[0, 0, 0, 255, 0, 0, 0, 0]);
/// ```
pub fn canny(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    low_threshold: f32,
    high_threshold: f32,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let (low, high) = if low_threshold <= high_threshold {
        (low_threshold, high_threshold)
    } else {
        (high_threshold, low_threshold)
    };

    let (cols, rows) = (src.cols(), src.rows());
    if cols == 0 || rows == 0 {
        return Ok(());
    }

    let (deriv, smooth) = kernels::sobel_kernel_1d(3)?;
    let src_f32 = to_f32(src)?;
    let mut gx = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
    let mut gy = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
    separable_filter(&src_f32, &mut gx, &deriv, &smooth)?;
    separable_filter(&src_f32, &mut gy, &smooth, &deriv)?;
    let (gx, gy) = (gx.as_slice(), gy.as_slice());

    let magnitude: Vec<f32> = gx
        .par_iter()
        .zip(gy.par_iter())
        .map(|(&dx, &dy)| dx.abs() + dy.abs())
        .collect();

    // samples outside the image count as zero strength
    let strength = |x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= cols as isize || y >= rows as isize {
            return 0.0;
        }
        magnitude[y as usize * cols + x as usize]
    };

    let classes: Vec<EdgeClass> = (0..cols * rows)
        .into_par_iter()
        .map(|idx| {
            let m = magnitude[idx];
            if m <= low {
                return EdgeClass::None;
            }

            let (x, y) = ((idx % cols) as isize, (idx / cols) as isize);
            let (ax, ay) = (gx[idx].abs(), gy[idx].abs());
            // one side is strict so that plateaus two pixels wide keep a single ridge
            let is_ridge = if ay < ax * TAN_22_5 {
                m > strength(x - 1, y) && m >= strength(x + 1, y)
            } else if ay > ax * TAN_67_5 {
                m > strength(x, y - 1) && m >= strength(x, y + 1)
            } else {
                let s = if (gx[idx] < 0.0) != (gy[idx] < 0.0) { -1 } else { 1 };
                m > strength(x - s, y - 1) && m > strength(x + s, y + 1)
            };

            match (is_ridge, m > high) {
                (false, _) => EdgeClass::None,
                (true, false) => EdgeClass::Weak,
                (true, true) => EdgeClass::Strong,
            }
        })
        .collect();

    let out = dst.as_slice_mut();
    out.iter_mut().for_each(|v| *v = 0);

    let mut stack: Vec<usize> = classes
        .iter()
        .enumerate()
        .filter(|(_, &c)| c == EdgeClass::Strong)
        .map(|(idx, _)| idx)
        .collect();
    for &idx in stack.iter() {
        out[idx] = u8::MAX;
    }

    while let Some(idx) = stack.pop() {
        let (x, y) = ((idx % cols) as isize, (idx / cols) as isize);
        for (dx, dy) in (-1..=1).flat_map(|dy| (-1..=1).map(move |dx| (dx, dy))) {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= cols as isize || ny >= rows as isize {
                continue;
            }
            let n = ny as usize * cols + nx as usize;
            if out[n] == 0 && classes[n] != EdgeClass::None {
                out[n] = u8::MAX;
                stack.push(n);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pixelflow_image::{Image, ImageError, ImageSize};

    fn step(level: u8) -> Result<Image<u8, 1>, ImageError> {
        let size = ImageSize {
            width: 10,
            height: 6,
        };
        let data = (0..size.area())
            .map(|i| if i % size.width < 5 { 0 } else { level })
            .collect();
        Image::new(size, data)
    }

    #[test]
    fn step_edge_is_a_single_column() -> Result<(), ImageError> {
        let src = step(200)?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 7)?;
        super::canny(&src, &mut dst, 50.0, 100.0)?;
        for row in dst.as_slice().chunks_exact(10) {
            assert_eq!(row, &[0, 0, 0, 0, 255, 0, 0, 0, 0, 0]);
        }
        Ok(())
    }

    #[test]
    fn weak_edge_without_strong_seed_is_dropped() -> Result<(), ImageError> {
        // sobel strength of a 20 level step is 80, between the thresholds
        let src = step(20)?;
        let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        super::canny(&src, &mut dst, 50.0, 100.0)?;
        assert!(dst.as_slice().iter().all(|&v| v == 0));

        super::canny(&src, &mut dst, 50.0, 70.0)?;
        assert_eq!(dst.as_slice().iter().filter(|&&v| v == 255).count(), 6);
        Ok(())
    }

    #[test]
    fn swapped_thresholds_and_flat_input() -> Result<(), ImageError> {
        let src = step(200)?;
        let mut a = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        let mut b = Image::<u8, 1>::from_size_val(src.size(), 0)?;
        super::canny(&src, &mut a, 50.0, 100.0)?;
        super::canny(&src, &mut b, 100.0, 50.0)?;
        assert_eq!(a, b);

        let flat = Image::<u8, 1>::from_size_val([5, 5].into(), 128)?;
        let mut dst = Image::<u8, 1>::from_size_val(flat.size(), 9)?;
        super::canny(&flat, &mut dst, 0.0, 0.0)?;
        assert!(dst.as_slice().iter().all(|&v| v == 0));
        Ok(())
    }
}
