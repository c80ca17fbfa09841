#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// image representation with a compile-time channel count.
pub mod image;

/// runtime-layout pixel buffer exchanged between pipeline stages.
pub mod buffer;

/// Error types for the image module.
pub mod error;

pub use crate::buffer::{ChannelLayout, PixelBuffer};
pub use crate::error::ImageError;
pub use crate::image::{Image, ImageSize};
