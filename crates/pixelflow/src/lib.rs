#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use pixelflow_image as image;

#[doc(inline)]
pub use pixelflow_imgproc as imgproc;

#[doc(inline)]
pub use pixelflow_io as io;

#[doc(inline)]
pub use pixelflow_pipeline as pipeline;
