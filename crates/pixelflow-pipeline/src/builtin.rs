use pixelflow_image::{Image, ImageError, PixelBuffer};
use pixelflow_imgproc::{
    color, enhance, filter, flip,
    filter::SobelDirection,
    histogram,
    morphology::{self, Kernel, KernelShape, MorphOp},
    threshold::{self, ThresholdType},
};

use crate::catalog::{Catalog, OperationSpec};
use crate::error::TransformError;
use crate::params::{ParameterSpec, ParameterValues};

/// Run `f` over either layout, keeping the layout of the input.
macro_rules! per_layout {
    ($buffer:expr, |$img:ident| $body:expr) => {
        match $buffer {
            PixelBuffer::Mono8($img) => PixelBuffer::from($body),
            PixelBuffer::Rgb8($img) => PixelBuffer::from($body),
        }
    };
}

/// Allocate a destination of the same size and fill it with `f`.
fn unary<const C: usize>(
    src: &Image<u8, C>,
    f: impl FnOnce(&Image<u8, C>, &mut Image<u8, C>) -> Result<(), ImageError>,
) -> Result<Image<u8, C>, ImageError> {
    let mut dst = Image::from_size_val(src.size(), 0u8)?;
    f(src, &mut dst)?;
    Ok(dst)
}

fn invalid_choice(parameter: &str, value: &str) -> TransformError {
    TransformError::InvalidParameter {
        operation: String::new(),
        parameter: parameter.to_string(),
        reason: format!("unknown option {value:?}"),
    }
}

const THRESHOLD_TYPES: &[&str] = &[
    "binary",
    "binary_inverse",
    "truncate",
    "to_zero",
    "to_zero_inverse",
];
const SOBEL_DIRECTIONS: &[&str] = &["magnitude", "x", "y"];
const MORPH_OPERATIONS: &[&str] = &["erode", "dilate", "open", "close", "gradient"];
const MORPH_SHAPES: &[&str] = &["rect", "cross", "ellipse"];
const FLIP_DIRECTIONS: &[&str] = &["horizontal", "vertical", "both"];

pub(crate) fn register_all(catalog: &mut Catalog) {
    catalog.register(
        OperationSpec::new("grayscale", "Convert to a single intensity channel"),
        grayscale,
    );
    catalog.register(
        OperationSpec::new("threshold", "Fixed-level threshold")
            .with_parameter(ParameterSpec::integer(
                "threshold",
                "Threshold level",
                0,
                255,
                127,
            ))
            .with_parameter(ParameterSpec::integer(
                "max_value",
                "Value assigned to samples above the level",
                0,
                255,
                255,
            ))
            .with_parameter(ParameterSpec::choice(
                "type",
                "Thresholding rule",
                THRESHOLD_TYPES,
                "binary",
            )),
        threshold_fixed,
    );
    catalog.register(
        OperationSpec::new("otsu_threshold", "Binary threshold at the Otsu level")
            .with_parameter(ParameterSpec::integer(
                "max_value",
                "Value assigned to samples above the level",
                0,
                255,
                255,
            )),
        otsu_threshold,
    );
    catalog.register(
        OperationSpec::new(
            "adaptive_threshold",
            "Threshold against the local mean of each neighborhood",
        )
        .with_parameter(ParameterSpec::odd_integer(
            "block_size",
            "Neighborhood side length",
            3,
            51,
            11,
        ))
        .with_parameter(ParameterSpec::integer(
            "c",
            "Constant subtracted from the mean",
            -30,
            30,
            2,
        )),
        adaptive_threshold,
    );
    catalog.register(
        OperationSpec::new("box_blur", "Normalized box filter").with_parameter(
            ParameterSpec::odd_integer("kernel_size", "Kernel side length", 1, 31, 5),
        ),
        box_blur,
    );
    catalog.register(
        OperationSpec::new("gaussian_blur", "Gaussian smoothing")
            .with_parameter(ParameterSpec::odd_integer(
                "kernel_size",
                "Kernel side length",
                1,
                31,
                5,
            ))
            .with_parameter(ParameterSpec::real(
                "sigma",
                "Standard deviation, 0 derives it from the kernel size",
                0.0,
                10.0,
                0.1,
                0.0,
            )),
        gaussian_blur,
    );
    catalog.register(
        OperationSpec::new("median_blur", "Median of each neighborhood").with_parameter(
            ParameterSpec::odd_integer("kernel_size", "Kernel side length", 1, 15, 3),
        ),
        median_blur,
    );
    catalog.register(
        OperationSpec::new("bilateral_filter", "Edge preserving smoothing")
            .with_parameter(ParameterSpec::odd_integer(
                "diameter",
                "Neighborhood diameter",
                1,
                15,
                9,
            ))
            .with_parameter(ParameterSpec::real(
                "sigma_color",
                "Range sigma",
                1.0,
                200.0,
                1.0,
                75.0,
            ))
            .with_parameter(ParameterSpec::real(
                "sigma_space",
                "Spatial sigma",
                1.0,
                200.0,
                1.0,
                75.0,
            )),
        bilateral_filter,
    );
    catalog.register(
        OperationSpec::new("canny", "Canny edges with hysteresis")
            .with_parameter(ParameterSpec::integer(
                "threshold",
                "Upper hysteresis threshold, the lower one is half of it",
                10,
                300,
                100,
            ))
            .with_parameter(ParameterSpec::odd_integer(
                "blur_size",
                "Gaussian pre-smoothing kernel, 1 disables it",
                1,
                7,
                1,
            )),
        canny,
    );
    catalog.register(
        OperationSpec::new("sobel", "Sobel gradient, scaled to the full range")
            .with_parameter(ParameterSpec::odd_integer(
                "kernel_size",
                "Kernel side length",
                3,
                7,
                3,
            ))
            .with_parameter(ParameterSpec::choice(
                "direction",
                "Gradient component",
                SOBEL_DIRECTIONS,
                "magnitude",
            )),
        sobel,
    );
    catalog.register(
        OperationSpec::new("laplacian", "Absolute Laplacian response").with_parameter(
            ParameterSpec::odd_integer("kernel_size", "Kernel side length", 1, 3, 1),
        ),
        laplacian,
    );
    catalog.register(
        OperationSpec::new("morphology", "Erosion, dilation and their compositions")
            .with_parameter(ParameterSpec::choice(
                "operation",
                "Morphological operation",
                MORPH_OPERATIONS,
                "erode",
            ))
            .with_parameter(ParameterSpec::choice(
                "shape",
                "Structuring element shape",
                MORPH_SHAPES,
                "rect",
            ))
            .with_parameter(ParameterSpec::odd_integer(
                "kernel_size",
                "Structuring element side length",
                1,
                31,
                3,
            ))
            .with_parameter(ParameterSpec::integer(
                "iterations",
                "Repetitions of each elementary step",
                1,
                10,
                1,
            )),
        morphology,
    );
    catalog.register(
        OperationSpec::new("brightness_contrast", "Linear gain and offset")
            .with_parameter(ParameterSpec::real(
                "alpha",
                "Contrast gain",
                0.0,
                3.0,
                0.05,
                1.0,
            ))
            .with_parameter(ParameterSpec::integer(
                "beta",
                "Brightness offset",
                -100,
                100,
                0,
            )),
        brightness_contrast,
    );
    catalog.register(
        OperationSpec::new("sharpen", "Laplacian sharpening followed by a gain")
            .with_parameter(ParameterSpec::real(
                "alpha",
                "Gain applied after sharpening",
                0.5,
                3.0,
                0.01,
                1.0,
            )),
        sharpen,
    );
    catalog.register(
        OperationSpec::new("equalize_histogram", "Histogram equalization per channel"),
        equalize_histogram,
    );
    catalog.register(OperationSpec::new("invert", "Photographic negative"), invert);
    catalog.register(
        OperationSpec::new("flip", "Mirror the image").with_parameter(ParameterSpec::choice(
            "direction",
            "Mirror axis",
            FLIP_DIRECTIONS,
            "horizontal",
        )),
        flip_image,
    );
}

fn grayscale(src: &PixelBuffer, _: &ParameterValues) -> Result<PixelBuffer, TransformError> {
    Ok(color::gray_from_buffer(src)?.into())
}

fn threshold_fixed(
    src: &PixelBuffer,
    params: &ParameterValues,
) -> Result<PixelBuffer, TransformError> {
    let level = params.sample("threshold")?;
    let max_value = params.sample("max_value")?;
    let kind = match params.choice("type")? {
        "binary" => ThresholdType::Binary,
        "binary_inverse" => ThresholdType::BinaryInv,
        "truncate" => ThresholdType::Trunc,
        "to_zero" => ThresholdType::ToZero,
        "to_zero_inverse" => ThresholdType::ToZeroInv,
        other => return Err(invalid_choice("type", other)),
    };

    Ok(per_layout!(src, |img| unary(img, |s, d| {
        threshold::threshold(s, d, level, max_value, kind)
    })?))
}

fn otsu_threshold(
    src: &PixelBuffer,
    params: &ParameterValues,
) -> Result<PixelBuffer, TransformError> {
    let max_value = params.sample("max_value")?;
    let gray = color::gray_from_buffer(src)?;
    let level = threshold::otsu_threshold_value(&histogram::histogram_256(&gray)?);
    log::debug!("otsu level {level}");

    Ok(unary(&gray, |s, d| threshold::threshold_binary(s, d, level, max_value))?.into())
}

fn adaptive_threshold(
    src: &PixelBuffer,
    params: &ParameterValues,
) -> Result<PixelBuffer, TransformError> {
    let block_size = params.size("block_size")?;
    let c = params.integer("c")? as i32;
    let gray = color::gray_from_buffer(src)?;

    Ok(unary(&gray, |s, d| {
        threshold::adaptive_threshold_mean(s, d, block_size, c, u8::MAX)
    })?
    .into())
}

fn box_blur(src: &PixelBuffer, params: &ParameterValues) -> Result<PixelBuffer, TransformError> {
    let kernel_size = params.size("kernel_size")?;
    Ok(per_layout!(src, |img| unary(img, |s, d| {
        filter::box_blur(s, d, kernel_size)
    })?))
}

fn gaussian_blur(
    src: &PixelBuffer,
    params: &ParameterValues,
) -> Result<PixelBuffer, TransformError> {
    let kernel_size = params.size("kernel_size")?;
    let sigma = params.real("sigma")? as f32;
    Ok(per_layout!(src, |img| unary(img, |s, d| {
        filter::gaussian_blur(s, d, kernel_size, sigma)
    })?))
}

fn median_blur(src: &PixelBuffer, params: &ParameterValues) -> Result<PixelBuffer, TransformError> {
    let kernel_size = params.size("kernel_size")?;
    Ok(per_layout!(src, |img| unary(img, |s, d| {
        filter::median_blur(s, d, kernel_size)
    })?))
}

fn bilateral_filter(
    src: &PixelBuffer,
    params: &ParameterValues,
) -> Result<PixelBuffer, TransformError> {
    let diameter = params.size("diameter")?;
    let sigma_color = params.real("sigma_color")? as f32;
    let sigma_space = params.real("sigma_space")? as f32;
    Ok(per_layout!(src, |img| unary(img, |s, d| {
        filter::bilateral_filter(s, d, diameter, sigma_color, sigma_space)
    })?))
}

fn canny(src: &PixelBuffer, params: &ParameterValues) -> Result<PixelBuffer, TransformError> {
    let high = params.integer("threshold")?;
    let blur_size = params.size("blur_size")?;
    let mut gray = color::gray_from_buffer(src)?;
    if blur_size > 1 {
        gray = unary(&gray, |s, d| filter::gaussian_blur(s, d, blur_size, 0.0))?;
    }
    let (low, high) = ((high / 2) as f32, high as f32);
    Ok(unary(&gray, |s, d| filter::canny(s, d, low, high))?.into())
}

fn sobel(src: &PixelBuffer, params: &ParameterValues) -> Result<PixelBuffer, TransformError> {
    let kernel_size = params.size("kernel_size")?;
    let direction = match params.choice("direction")? {
        "magnitude" => SobelDirection::Magnitude,
        "x" => SobelDirection::X,
        "y" => SobelDirection::Y,
        other => return Err(invalid_choice("direction", other)),
    };
    let gray = color::gray_from_buffer(src)?;
    Ok(unary(&gray, |s, d| filter::sobel(s, d, kernel_size, direction))?.into())
}

fn laplacian(src: &PixelBuffer, params: &ParameterValues) -> Result<PixelBuffer, TransformError> {
    let kernel_size = params.size("kernel_size")?;
    let gray = color::gray_from_buffer(src)?;
    Ok(unary(&gray, |s, d| filter::laplacian(s, d, kernel_size))?.into())
}

fn morphology(src: &PixelBuffer, params: &ParameterValues) -> Result<PixelBuffer, TransformError> {
    let op = match params.choice("operation")? {
        "erode" => MorphOp::Erode,
        "dilate" => MorphOp::Dilate,
        "open" => MorphOp::Open,
        "close" => MorphOp::Close,
        "gradient" => MorphOp::Gradient,
        other => return Err(invalid_choice("operation", other)),
    };
    let shape = match params.choice("shape")? {
        "rect" => KernelShape::Rect,
        "cross" => KernelShape::Cross,
        "ellipse" => KernelShape::Ellipse,
        other => return Err(invalid_choice("shape", other)),
    };
    let kernel = Kernel::new(shape, params.size("kernel_size")?)?;
    let iterations = params.size("iterations")?;

    Ok(per_layout!(src, |img| morphology::morphology_ex(
        img, op, &kernel, iterations
    )?))
}

fn brightness_contrast(
    src: &PixelBuffer,
    params: &ParameterValues,
) -> Result<PixelBuffer, TransformError> {
    let alpha = params.real("alpha")? as f32;
    let beta = params.integer("beta")? as f32;
    Ok(per_layout!(src, |img| unary(img, |s, d| {
        enhance::adjust_brightness_contrast(s, d, alpha, beta)
    })?))
}

fn sharpen(src: &PixelBuffer, params: &ParameterValues) -> Result<PixelBuffer, TransformError> {
    let alpha = params.real("alpha")? as f32;
    Ok(per_layout!(src, |img| unary(img, |s, d| {
        enhance::sharpen(s, d, alpha)
    })?))
}

fn equalize_histogram(
    src: &PixelBuffer,
    _: &ParameterValues,
) -> Result<PixelBuffer, TransformError> {
    Ok(per_layout!(src, |img| unary(img, enhance::equalize_histogram)?))
}

fn invert(src: &PixelBuffer, _: &ParameterValues) -> Result<PixelBuffer, TransformError> {
    Ok(per_layout!(src, |img| unary(img, enhance::invert)?))
}

fn flip_image(src: &PixelBuffer, params: &ParameterValues) -> Result<PixelBuffer, TransformError> {
    let (horizontal, vertical) = match params.choice("direction")? {
        "horizontal" => (true, false),
        "vertical" => (false, true),
        "both" => (true, true),
        other => return Err(invalid_choice("direction", other)),
    };

    Ok(per_layout!(src, |img| {
        let mut out = img.clone();
        if horizontal {
            out = flip::horizontal_flip(&out)?;
        }
        if vertical {
            out = flip::vertical_flip(&out)?;
        }
        out
    }))
}
