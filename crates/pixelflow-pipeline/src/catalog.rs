use std::sync::Arc;

use pixelflow_image::PixelBuffer;

use crate::error::TransformError;
use crate::params::{ParameterSpec, ParameterValues};

/// The signature of a catalog transform.
///
/// Transforms receive normalized parameters and must not mutate shared state.
pub type TransformFn =
    dyn Fn(&PixelBuffer, &ParameterValues) -> Result<PixelBuffer, TransformError> + Send + Sync;

/// The public description of an operation.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationSpec {
    /// Unique identifier, e.g. `gaussian_blur`.
    pub id: &'static str,
    /// Human readable description.
    pub description: &'static str,
    /// Ordered parameter declarations.
    pub parameters: Vec<ParameterSpec>,
}

impl OperationSpec {
    /// Create a spec without parameters.
    pub fn new(id: &'static str, description: &'static str) -> Self {
        Self {
            id,
            description,
            parameters: Vec::new(),
        }
    }

    /// Append a parameter declaration.
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Look up a parameter declaration by name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Every declared parameter set to its default.
    pub fn default_parameters(&self) -> ParameterValues {
        self.parameters
            .iter()
            .fold(ParameterValues::new(), |acc, p| acc.with(p.name, p.default_value()))
    }

    /// Parse `name=value` assignments into parameter values.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidParameter`] for a malformed
    /// assignment, an undeclared name or a value that does not parse.
    pub fn parse_assignments<'a>(
        &self,
        assignments: impl IntoIterator<Item = &'a str>,
    ) -> Result<ParameterValues, TransformError> {
        let invalid = |parameter: &str, reason: String| TransformError::InvalidParameter {
            operation: self.id.to_string(),
            parameter: parameter.to_string(),
            reason,
        };

        let mut values = ParameterValues::new();
        for assignment in assignments {
            let (name, text) = assignment
                .split_once('=')
                .ok_or_else(|| invalid(assignment, "expected name=value".to_string()))?;
            let name = name.trim();
            let spec = self
                .parameter(name)
                .ok_or_else(|| invalid(name, "not declared".to_string()))?;
            let value = spec.parse_value(text).map_err(|reason| invalid(name, reason))?;
            values.insert(name, value);
        }
        Ok(values)
    }

    /// Resolve `values` into a complete, in-range set of parameters.
    ///
    /// Missing values take their defaults and undeclared names are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidParameter`] for a value of the wrong
    /// kind or an unknown choice.
    pub fn normalize(&self, values: &ParameterValues) -> Result<ParameterValues, TransformError> {
        for (name, _) in values.iter() {
            if self.parameter(name).is_none() {
                log::debug!("{}: ignoring undeclared parameter {name}", self.id);
            }
        }

        let mut normalized = ParameterValues::new();
        for spec in self.parameters.iter() {
            let value = spec.normalize(values.get(spec.name)).map_err(|reason| {
                TransformError::InvalidParameter {
                    operation: self.id.to_string(),
                    parameter: spec.name.to_string(),
                    reason,
                }
            })?;
            normalized.insert(spec.name, value);
        }
        Ok(normalized)
    }
}

struct Operation {
    spec: OperationSpec,
    transform: Arc<TransformFn>,
}

/// The closed set of operations the pipeline can run.
///
/// # Example
///
/// ```
/// use pixelflow_image::{ChannelLayout, PixelBuffer};
/// use pixelflow_pipeline::{Catalog, ParameterValues};
///
/// let catalog = Catalog::builtin();
/// let spec = catalog.describe("gaussian_blur").unwrap();
/// let params = spec.default_parameters();
///
/// let image = PixelBuffer::from_size_val([8, 8].into(), ChannelLayout::Rgb, 10).unwrap();
/// let blurred = catalog.apply("gaussian_blur", &image, &params).unwrap();
/// assert_eq!(blurred.size(), image.size());
/// ```
pub struct Catalog {
    operations: Vec<Operation>,
}

impl Catalog {
    /// A catalog with no operations.
    pub fn empty() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// The catalog of built-in operations. The first one is `grayscale`.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        crate::builtin::register_all(&mut catalog);
        catalog
    }

    /// Register an operation, replacing any operation with the same id.
    pub fn register<F>(&mut self, spec: OperationSpec, transform: F)
    where
        F: Fn(&PixelBuffer, &ParameterValues) -> Result<PixelBuffer, TransformError>
            + Send
            + Sync
            + 'static,
    {
        let operation = Operation {
            spec,
            transform: Arc::new(transform),
        };
        match self
            .operations
            .iter_mut()
            .find(|op| op.spec.id == operation.spec.id)
        {
            Some(existing) => *existing = operation,
            None => self.operations.push(operation),
        }
    }

    fn find(&self, id: &str) -> Result<&Operation, TransformError> {
        self.operations
            .iter()
            .find(|op| op.spec.id == id)
            .ok_or_else(|| TransformError::UnknownOperation(id.to_string()))
    }

    /// Describe an operation.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::UnknownOperation`] if `id` is not registered.
    pub fn describe(&self, id: &str) -> Result<&OperationSpec, TransformError> {
        self.find(id).map(|op| &op.spec)
    }

    /// Run an operation on `buffer` with already normalized `params`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::UnknownOperation`] if `id` is not registered,
    /// or whatever the transform itself reports.
    pub fn apply(
        &self,
        id: &str,
        buffer: &PixelBuffer,
        params: &ParameterValues,
    ) -> Result<PixelBuffer, TransformError> {
        let op = self.find(id)?;
        (op.transform)(buffer, params).map_err(|e| e.in_operation(id))
    }

    /// The operation selected when nothing else is.
    pub fn default_operation(&self) -> Option<&OperationSpec> {
        self.operations.first().map(|op| &op.spec)
    }

    /// Registered identifiers in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.operations.iter().map(|op| op.spec.id)
    }

    /// Registered specs in registration order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationSpec> {
        self.operations.iter().map(|op| &op.spec)
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the catalog has no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
