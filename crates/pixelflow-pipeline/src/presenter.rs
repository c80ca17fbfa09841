use pixelflow_image::PixelBuffer;

use crate::error::TransformError;

/// How much of a preview must be redrawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refresh {
    /// The image and its histograms.
    Full,
    /// The image only. Histograms keep their previous values.
    ImageOnly,
}

impl Refresh {
    /// Whether histograms should be recomputed.
    #[inline]
    pub fn histogram(&self) -> bool {
        matches!(self, Refresh::Full)
    }
}

/// The presentation layer the coordinator reports to.
///
/// Calls come from whichever thread drives the coordinator, one at a time.
pub trait Presenter: Send {
    /// The original preview changed.
    fn original_changed(&mut self, buffer: Option<&PixelBuffer>, refresh: Refresh);

    /// The result preview changed.
    fn result_changed(&mut self, buffer: Option<&PixelBuffer>, refresh: Refresh);

    /// A transform failed and the original is shown in its place.
    fn transform_failed(&mut self, _error: &TransformError) {}

    /// The capture stream ended without being stopped.
    fn capture_ended(&mut self) {}
}
