use pixelflow_image::ImageError;
use pixelflow_io::capture::CaptureError;

/// An error raised while resolving or running a transform.
#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    /// No operation is registered under the identifier.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// A parameter value does not fit its declaration.
    #[error("Invalid parameter {parameter} for {operation}: {reason}")]
    InvalidParameter {
        /// The operation identifier.
        operation: String,
        /// The parameter name.
        parameter: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// The underlying image routine failed.
    #[error("Transform failed. {0}")]
    Failed(#[from] ImageError),

    /// The operation panicked.
    #[error("Transform panicked: {0}")]
    Panicked(String),
}

impl TransformError {
    /// Attach the operation identifier to a parameter error raised without one.
    pub(crate) fn in_operation(self, id: &str) -> Self {
        match self {
            TransformError::InvalidParameter {
                operation,
                parameter,
                reason,
            } if operation.is_empty() => TransformError::InvalidParameter {
                operation: id.to_string(),
                parameter,
                reason,
            },
            other => other,
        }
    }
}

/// An error returned by the pipeline coordinator.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The selection could not be changed.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// The capture device could not be started.
    #[error(transparent)]
    Capture(#[from] CaptureError),
}
