use pixelflow_image::{Image, ImageError};
use rayon::prelude::*;

/// Mirror an image around its vertical axis.
///
/// The channel order inside each pixel is preserved.
///
/// # Example
///
/// ```
/// use pixelflow_image::Image;
/// use pixelflow_imgproc::flip::horizontal_flip;
///
/// let image = Image::<u8, 1>::new([3, 1].into(), vec![1, 2, 3]).unwrap();
/// let flipped = horizontal_flip(&image).unwrap();
/// assert_eq!(flipped.as_slice(), &[3, 2, 1]);
/// ```
pub fn horizontal_flip<T, const C: usize>(src: &Image<T, C>) -> Result<Image<T, C>, ImageError>
where
    T: Clone + Send + Sync,
{
    let row_len = src.cols() * C;
    let mut dst = src.clone();
    if row_len == 0 {
        return Ok(dst);
    }

    dst.as_slice_mut()
        .par_chunks_exact_mut(row_len)
        .zip(src.as_slice().par_chunks_exact(row_len))
        .for_each(|(dst_row, src_row)| {
            for (dst_px, src_px) in dst_row
                .chunks_exact_mut(C)
                .zip(src_row.chunks_exact(C).rev())
            {
                dst_px.clone_from_slice(src_px);
            }
        });

    Ok(dst)
}

/// Mirror an image around its horizontal axis.
pub fn vertical_flip<T, const C: usize>(src: &Image<T, C>) -> Result<Image<T, C>, ImageError>
where
    T: Clone + Send + Sync,
{
    let row_len = src.cols() * C;
    let mut dst = src.clone();
    if row_len == 0 {
        return Ok(dst);
    }

    dst.as_slice_mut()
        .par_chunks_exact_mut(row_len)
        .zip(src.as_slice().par_chunks_exact(row_len).rev())
        .for_each(|(dst_row, src_row)| dst_row.clone_from_slice(src_row));

    Ok(dst)
}

#[cfg(test)]
mod tests {
    use pixelflow_image::{Image, ImageError};

    #[test]
    fn hflip_mono() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new([2, 3].into(), vec![0, 1, 2, 3, 4, 5])?;
        let flipped = super::horizontal_flip(&image)?;
        assert_eq!(flipped.as_slice(), &[1, 0, 3, 2, 5, 4]);
        Ok(())
    }

    #[test]
    fn hflip_keeps_channel_order() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new([2, 1].into(), vec![1, 2, 3, 4, 5, 6])?;
        let flipped = super::horizontal_flip(&image)?;
        assert_eq!(flipped.as_slice(), &[4, 5, 6, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn vflip_mono() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new([2, 3].into(), vec![0, 1, 2, 3, 4, 5])?;
        let flipped = super::vertical_flip(&image)?;
        assert_eq!(flipped.as_slice(), &[4, 5, 2, 3, 0, 1]);
        Ok(())
    }

    #[test]
    fn flip_empty() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new([0, 0].into(), vec![])?;
        assert_eq!(super::horizontal_flip(&image)?, image);
        assert_eq!(super::vertical_flip(&image)?, image);
        Ok(())
    }
}
