#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Camera and replay capture devices.
pub mod capture;

/// Error types for the io module.
pub mod error;

/// A frames-per-second counter.
pub mod fps_counter;

/// High-level read and write functions for image files.
pub mod functional;

pub use crate::error::IoError;
