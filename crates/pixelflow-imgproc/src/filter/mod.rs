//! Filter operations
//!
//! This module provides filter operations for image processing.

/// Canny edge detection
mod canny;
pub use canny::*;

/// Dense 2D correlation
mod convolution;
pub use convolution::*;

/// Filter kernels
pub mod kernels;

/// Filter operations
mod ops;
pub use ops::*;

/// Separable filter operations
mod separable_filter;
pub use separable_filter::*;
