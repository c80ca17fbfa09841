use std::path::Path;

use image::{ColorType, DynamicImage, ImageFormat};
use pixelflow_image::{ChannelLayout, ImageSize, PixelBuffer};

use crate::error::IoError;

/// Convert a decoded image into a [`PixelBuffer`].
///
/// Luminance images stay single channel, color images become RGB. Alpha is
/// discarded in both cases.
fn buffer_from_dynamic(img: DynamicImage) -> Result<PixelBuffer, IoError> {
    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    let buffer = match img.color() {
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            PixelBuffer::from_raw(size, ChannelLayout::Mono, img.into_luma8().into_raw())?
        }
        ColorType::Rgb8 | ColorType::Rgba8 | ColorType::Rgb16 | ColorType::Rgba16 => {
            PixelBuffer::from_raw(size, ChannelLayout::Rgb, img.into_rgb8().into_raw())?
        }
        other => return Err(IoError::UnsupportedColorType(other)),
    };

    Ok(buffer)
}

/// Reads an image from the given file path.
///
/// The format is guessed from the file contents, not from the extension.
///
/// # Arguments
///
/// * `file_path` - The path to the image.
///
/// # Returns
///
/// A mono buffer for grayscale files and an RGB buffer for everything else.
///
/// # Errors
///
/// Fails if the file is missing, unreadable or not a supported image.
pub fn read_image_any(file_path: impl AsRef<Path>) -> Result<PixelBuffer, IoError> {
    let file_path = file_path.as_ref();

    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::ImageReader::open(file_path)?
        .with_guessed_format()?
        .decode()?;

    log::debug!(
        "decoded {} ({}x{}, {:?})",
        file_path.display(),
        img.width(),
        img.height(),
        img.color()
    );

    buffer_from_dynamic(img)
}

/// Decodes an in-memory encoded image (PNG, JPEG, BMP or TIFF).
pub fn decode_image(bytes: &[u8]) -> Result<PixelBuffer, IoError> {
    buffer_from_dynamic(image::load_from_memory(bytes)?)
}

/// Writes a buffer to disk, choosing the encoder from the file extension.
///
/// # Arguments
///
/// * `file_path` - The destination path, for example `out.png`.
/// * `buffer` - The image to encode.
///
/// # Errors
///
/// Returns [`IoError::InvalidFileExtension`] when the extension is unknown.
pub fn write_image(file_path: impl AsRef<Path>, buffer: &PixelBuffer) -> Result<(), IoError> {
    let file_path = file_path.as_ref();
    let format = ImageFormat::from_path(file_path)
        .map_err(|_| IoError::InvalidFileExtension(file_path.to_path_buf()))?;
    write_image_with_format(file_path, buffer, format)
}

/// Writes a buffer to disk with an explicit encoder.
pub fn write_image_with_format(
    file_path: impl AsRef<Path>,
    buffer: &PixelBuffer,
    format: ImageFormat,
) -> Result<(), IoError> {
    let color = match buffer.layout() {
        ChannelLayout::Mono => ColorType::L8,
        ChannelLayout::Rgb => ColorType::Rgb8,
    };

    image::save_buffer_with_format(
        file_path,
        buffer.as_slice(),
        buffer.width() as u32,
        buffer.height() as u32,
        color,
        format,
    )?;

    Ok(())
}
