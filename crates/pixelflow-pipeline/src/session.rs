use std::sync::Arc;

use pixelflow_image::PixelBuffer;

use crate::catalog::Catalog;
use crate::params::ParameterValues;

/// The operation and parameters applied to incoming images.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    /// Operation identifier.
    pub operation: String,
    /// Normalized parameter values.
    pub parameters: ParameterValues,
}

impl Selection {
    /// The default operation of `catalog` with its default parameters.
    pub fn default_for(catalog: &Catalog) -> Self {
        catalog
            .default_operation()
            .map(|spec| Selection {
                operation: spec.id.to_string(),
                parameters: spec.default_parameters(),
            })
            .unwrap_or_default()
    }
}

/// What the pipeline currently shows.
///
/// `result` is the output of the selection applied to `original` as of the
/// last apply, or `original` itself after a load, a reset or a failed
/// transform. Both are empty until the first image arrives.
#[derive(Clone, Debug, Default)]
pub struct Session {
    /// The last loaded still or captured frame.
    pub original: Option<Arc<PixelBuffer>>,
    /// The transformed image.
    pub result: Option<Arc<PixelBuffer>>,
    /// The current selection.
    pub selection: Selection,
}

impl Session {
    /// An empty session with the catalog's default selection.
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            original: None,
            result: None,
            selection: Selection::default_for(catalog),
        }
    }
}
