use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use pixelflow_image::{ImageError, PixelBuffer};

use crate::catalog::Catalog;
use crate::error::TransformError;
use crate::params::ParameterValues;

/// Runs catalog operations with normalized parameters.
///
/// A transform that fails or panics never takes the caller down with it;
/// the failure comes back as a [`TransformError`] and the caller decides what
/// to show instead. The executor keeps no state between calls.
#[derive(Clone)]
pub struct Executor {
    catalog: Arc<Catalog>,
}

impl Executor {
    /// Create an executor over `catalog`.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// The catalog the executor runs operations from.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Normalize `params` for `op_id` and run the operation on `original`.
    ///
    /// # Arguments
    ///
    /// * `original` - The input image. It is never modified.
    /// * `op_id` - The operation identifier.
    /// * `params` - Parameter values, normalized before use.
    ///
    /// # Returns
    ///
    /// The transformed image, with the same width and height as `original`.
    ///
    /// # Errors
    ///
    /// Any failure of the lookup, the parameters or the transform itself,
    /// including a panic, is returned as a [`TransformError`].
    pub fn execute(
        &self,
        original: &PixelBuffer,
        op_id: &str,
        params: &ParameterValues,
    ) -> Result<PixelBuffer, TransformError> {
        let spec = self.catalog.describe(op_id)?;
        let params = spec.normalize(params)?;

        let output = panic::catch_unwind(AssertUnwindSafe(|| {
            self.catalog.apply(op_id, original, &params)
        }))
        .map_err(|payload| TransformError::Panicked(panic_message(payload.as_ref())))??;

        if output.size() != original.size() {
            return Err(TransformError::Failed(ImageError::InvalidImageSize(
                original.width(),
                original.height(),
                output.width(),
                output.height(),
            )));
        }

        log::trace!("{op_id}({params}) on {}", original.size());
        Ok(output)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OperationSpec;
    use pixelflow_image::ChannelLayout;

    fn executor() -> Executor {
        let mut catalog = Catalog::builtin();
        catalog.register(OperationSpec::new("explode", "always panics"), |_, _| {
            panic!("boom")
        });
        catalog.register(OperationSpec::new("shrink", "drops a column"), |b, _| {
            Ok(PixelBuffer::from_size_val(
                [b.width() - 1, b.height()].into(),
                b.layout(),
                0,
            )?)
        });
        Executor::new(Arc::new(catalog))
    }

    #[test]
    fn normalizes_before_running() -> Result<(), TransformError> {
        let src = PixelBuffer::from_size_val([5, 5].into(), ChannelLayout::Rgb, 30)?;
        let params = ParameterValues::new().with("kernel_size", 4);
        let out = executor().execute(&src, "box_blur", &params)?;
        assert_eq!(out, src);
        Ok(())
    }

    #[test]
    fn panic_is_contained() -> Result<(), TransformError> {
        let src = PixelBuffer::from_size_val([2, 2].into(), ChannelLayout::Mono, 0)?;
        let res = executor().execute(&src, "explode", &ParameterValues::new());
        assert!(matches!(res, Err(TransformError::Panicked(msg)) if msg == "boom"));
        Ok(())
    }

    #[test]
    fn size_change_is_a_failure() -> Result<(), TransformError> {
        let src = PixelBuffer::from_size_val([3, 2].into(), ChannelLayout::Mono, 0)?;
        let res = executor().execute(&src, "shrink", &ParameterValues::new());
        assert!(matches!(res, Err(TransformError::Failed(_))));
        Ok(())
    }

    #[test]
    fn unknown_operation() -> Result<(), TransformError> {
        let src = PixelBuffer::from_size_val([1, 1].into(), ChannelLayout::Mono, 0)?;
        let res = executor().execute(&src, "nope", &ParameterValues::new());
        assert!(matches!(res, Err(TransformError::UnknownOperation(_))));
        Ok(())
    }
}
