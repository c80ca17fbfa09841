#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// The registry of named, parameterized transforms.
pub mod catalog;

/// Pipeline configuration.
pub mod config;

/// The coordinator tying capture, transforms and presentation together.
pub mod coordinator;

/// Histogram helpers for presenters.
pub mod diagnostics;

/// Error types for the pipeline.
pub mod error;

/// Runs catalog operations with failures contained.
pub mod executor;

/// Parameter declarations, values and normalization.
pub mod params;

/// The presentation collaborator.
pub mod presenter;

/// Session state shared between the capture and still paths.
pub mod session;

/// The capture thread driving a device.
pub mod source;

mod builtin;
mod flight;
mod slot;
mod throttle;

pub use catalog::{Catalog, OperationSpec};
pub use config::PipelineConfig;
pub use coordinator::{ApplyOutcome, CaptureStats, Coordinator, FrameOutcome, PumpOutcome};
pub use error::{PipelineError, TransformError};
pub use executor::Executor;
pub use params::{ParameterKind, ParameterSpec, ParameterValue, ParameterValues};
pub use presenter::{Presenter, Refresh};
pub use throttle::HistogramThrottle;
