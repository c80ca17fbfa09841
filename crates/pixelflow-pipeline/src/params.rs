use std::collections::BTreeMap;
use std::fmt;

use crate::error::TransformError;

/// A concrete parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterValue {
    /// A whole number.
    Integer(i64),
    /// A real number.
    Real(f64),
    /// One of a fixed set of options.
    Choice(String),
}

impl ParameterValue {
    fn kind_name(&self) -> &'static str {
        match self {
            ParameterValue::Integer(_) => "integer",
            ParameterValue::Real(_) => "real",
            ParameterValue::Choice(_) => "choice",
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Integer(v) => write!(f, "{v}"),
            ParameterValue::Real(v) => write!(f, "{v}"),
            ParameterValue::Choice(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Integer(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::Integer(i64::from(v))
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Real(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Choice(v.to_string())
    }
}

/// The kind of a parameter together with its range and default.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterKind {
    /// An integer range.
    Integer {
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
        /// Values snap to `min + k * step`.
        step: i64,
        /// Value used when none is given.
        default: i64,
        /// Even values are moved to a neighboring odd value.
        odd: bool,
    },
    /// A real range.
    Real {
        /// Smallest accepted value.
        min: f64,
        /// Largest accepted value.
        max: f64,
        /// Suggested increment for interactive controls.
        step: f64,
        /// Value used when none is given.
        default: f64,
    },
    /// An enumerated choice.
    Choice {
        /// The accepted options.
        options: &'static [&'static str],
        /// Option used when none is given.
        default: &'static str,
    },
}

/// The declaration of a single operation parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSpec {
    /// Parameter name, unique within its operation.
    pub name: &'static str,
    /// Human readable description.
    pub description: &'static str,
    /// Kind, range and default.
    pub kind: ParameterKind,
}

impl ParameterSpec {
    /// Declare an integer parameter with unit step.
    pub fn integer(
        name: &'static str,
        description: &'static str,
        min: i64,
        max: i64,
        default: i64,
    ) -> Self {
        Self {
            name,
            description,
            kind: ParameterKind::Integer {
                min,
                max,
                step: 1,
                default,
                odd: false,
            },
        }
    }

    /// Declare a kernel-size style integer parameter that must be odd.
    pub fn odd_integer(
        name: &'static str,
        description: &'static str,
        min: i64,
        max: i64,
        default: i64,
    ) -> Self {
        let mut spec = Self::integer(name, description, min, max, default);
        if let ParameterKind::Integer { odd, .. } = &mut spec.kind {
            *odd = true;
        }
        spec
    }

    /// Declare a real parameter.
    pub fn real(
        name: &'static str,
        description: &'static str,
        min: f64,
        max: f64,
        step: f64,
        default: f64,
    ) -> Self {
        Self {
            name,
            description,
            kind: ParameterKind::Real {
                min,
                max,
                step,
                default,
            },
        }
    }

    /// Declare a choice parameter.
    pub fn choice(
        name: &'static str,
        description: &'static str,
        options: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            description,
            kind: ParameterKind::Choice { options, default },
        }
    }

    /// The default value of the parameter.
    pub fn default_value(&self) -> ParameterValue {
        match &self.kind {
            ParameterKind::Integer { default, .. } => ParameterValue::Integer(*default),
            ParameterKind::Real { default, .. } => ParameterValue::Real(*default),
            ParameterKind::Choice { default, .. } => ParameterValue::Choice(default.to_string()),
        }
    }

    /// Parse a textual value according to the parameter kind.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when `text` is not a number of
    /// the right kind. Choices are not checked here, see
    /// [`ParameterSpec::normalize`].
    pub fn parse_value(&self, text: &str) -> Result<ParameterValue, String> {
        let text = text.trim();
        match &self.kind {
            ParameterKind::Integer { .. } => text
                .parse::<i64>()
                .map(ParameterValue::Integer)
                .map_err(|e| format!("{text:?} is not an integer: {e}")),
            ParameterKind::Real { .. } => text
                .parse::<f64>()
                .map(ParameterValue::Real)
                .map_err(|e| format!("{text:?} is not a number: {e}")),
            ParameterKind::Choice { .. } => Ok(ParameterValue::Choice(text.to_string())),
        }
    }

    /// Bring a value into the declared range.
    ///
    /// Integers are clamped, snapped to the step grid and, when the parameter
    /// is odd, moved up to the next odd value (or down if that leaves the
    /// range). Reals are clamped. A missing value yields the default.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the value has the wrong
    /// kind, is not finite, or is not one of the declared options.
    pub fn normalize(&self, value: Option<&ParameterValue>) -> Result<ParameterValue, String> {
        let Some(value) = value else {
            return Ok(self.default_value());
        };

        match (&self.kind, value) {
            (
                &ParameterKind::Integer {
                    min,
                    max,
                    step,
                    odd,
                    ..
                },
                &ParameterValue::Integer(v),
            ) => Ok(ParameterValue::Integer(normalize_integer(
                v, min, max, step, odd,
            ))),
            (&ParameterKind::Real { min, max, .. }, &ParameterValue::Real(v)) => {
                if !v.is_finite() {
                    return Err(format!("{v} is not a finite number"));
                }
                Ok(ParameterValue::Real(v.clamp(min, max)))
            }
            (ParameterKind::Choice { options, .. }, ParameterValue::Choice(v)) => {
                if options.contains(&v.as_str()) {
                    Ok(value.clone())
                } else {
                    Err(format!("{v:?} is not one of {options:?}"))
                }
            }
            (kind, value) => Err(format!(
                "expected {} value, got {}",
                match kind {
                    ParameterKind::Integer { .. } => "an integer",
                    ParameterKind::Real { .. } => "a real",
                    ParameterKind::Choice { .. } => "a choice",
                },
                value.kind_name()
            )),
        }
    }
}

fn normalize_integer(v: i64, min: i64, max: i64, step: i64, odd: bool) -> i64 {
    let step = step.max(1);
    let v = v.clamp(min, max);

    // nearest grid point, kept inside the range
    let mut v = min + (v - min + step / 2) / step * step;
    if v > max {
        v -= step;
    }

    if odd && v % 2 == 0 {
        if v < max {
            v += 1;
        } else {
            v -= 1;
        }
    }
    v
}

/// Parameter values keyed by name.
///
/// # Example
///
/// ```
/// use pixelflow_pipeline::ParameterValues;
///
/// let params = ParameterValues::new()
///     .with("threshold", 100)
///     .with("type", "binary");
///
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterValues {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterValues {
    /// An empty set of values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`ParameterValues::insert`].
    pub fn with(mut self, name: &str, value: impl Into<ParameterValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a value, replacing any previous one.
    pub fn insert(&mut self, name: &str, value: impl Into<ParameterValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    /// Look up a value.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every value of `other` over this one.
    pub fn merge(&mut self, other: &ParameterValues) {
        for (name, value) in other.iter() {
            self.insert(name, value.clone());
        }
    }

    fn missing(name: &str, expected: &str) -> TransformError {
        TransformError::InvalidParameter {
            operation: String::new(),
            parameter: name.to_string(),
            reason: format!("missing {expected} value"),
        }
    }

    /// Read an integer value.
    pub fn integer(&self, name: &str) -> Result<i64, TransformError> {
        match self.get(name) {
            Some(ParameterValue::Integer(v)) => Ok(*v),
            _ => Err(Self::missing(name, "integer")),
        }
    }

    /// Read an integer value as a non-negative size.
    pub fn size(&self, name: &str) -> Result<usize, TransformError> {
        let v = self.integer(name)?;
        usize::try_from(v).map_err(|_| TransformError::InvalidParameter {
            operation: String::new(),
            parameter: name.to_string(),
            reason: format!("{v} is negative"),
        })
    }

    /// Read an integer value as a sample.
    pub fn sample(&self, name: &str) -> Result<u8, TransformError> {
        let v = self.integer(name)?;
        u8::try_from(v).map_err(|_| TransformError::InvalidParameter {
            operation: String::new(),
            parameter: name.to_string(),
            reason: format!("{v} does not fit in 0..=255"),
        })
    }

    /// Read a real value.
    pub fn real(&self, name: &str) -> Result<f64, TransformError> {
        match self.get(name) {
            Some(ParameterValue::Real(v)) => Ok(*v),
            _ => Err(Self::missing(name, "real")),
        }
    }

    /// Read a choice value.
    pub fn choice(&self, name: &str) -> Result<&str, TransformError> {
        match self.get(name) {
            Some(ParameterValue::Choice(v)) => Ok(v.as_str()),
            _ => Err(Self::missing(name, "choice")),
        }
    }
}

impl fmt::Display for ParameterValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn odd_rounds_up_then_down_at_max() {
        assert_eq!(normalize_integer(4, 1, 31, 1, true), 5);
        assert_eq!(normalize_integer(5, 1, 31, 1, true), 5);
        assert_eq!(normalize_integer(0, 1, 31, 1, true), 1);
        assert_eq!(normalize_integer(40, 1, 31, 1, true), 31);
        assert_eq!(normalize_integer(14, 1, 14, 1, true), 13);
    }

    #[test]
    fn step_snapping() {
        assert_eq!(normalize_integer(7, 0, 100, 5, false), 5);
        assert_eq!(normalize_integer(8, 0, 100, 5, false), 10);
        assert_eq!(normalize_integer(99, 0, 98, 5, false), 95);
        assert_eq!(normalize_integer(-3, -30, 30, 1, false), -3);
    }

    #[test]
    fn normalize_by_kind() {
        let kernel = ParameterSpec::odd_integer("kernel_size", "", 1, 31, 5);
        assert_eq!(kernel.normalize(None), Ok(ParameterValue::Integer(5)));
        assert_eq!(
            kernel.normalize(Some(&ParameterValue::Integer(8))),
            Ok(ParameterValue::Integer(9))
        );
        assert!(kernel.normalize(Some(&ParameterValue::Real(3.0))).is_err());

        let sigma = ParameterSpec::real("sigma", "", 0.0, 10.0, 0.1, 0.0);
        match sigma.normalize(Some(&ParameterValue::Real(12.5))) {
            Ok(ParameterValue::Real(v)) => assert_relative_eq!(v, 10.0),
            other => panic!("unexpected {other:?}"),
        }
        assert!(sigma.normalize(Some(&ParameterValue::Real(f64::NAN))).is_err());

        let direction = ParameterSpec::choice("direction", "", &["x", "y"], "x");
        assert!(direction.normalize(Some(&"y".into())).is_ok());
        assert!(direction.normalize(Some(&"z".into())).is_err());
    }

    #[test]
    fn parse_by_kind() {
        let kernel = ParameterSpec::odd_integer("kernel_size", "", 1, 31, 5);
        assert_eq!(kernel.parse_value(" 7 "), Ok(ParameterValue::Integer(7)));
        assert!(kernel.parse_value("7.5").is_err());

        let sigma = ParameterSpec::real("sigma", "", 0.0, 10.0, 0.1, 0.0);
        assert_eq!(sigma.parse_value("2"), Ok(ParameterValue::Real(2.0)));
    }

    #[test]
    fn typed_getters() -> Result<(), TransformError> {
        let params = ParameterValues::new()
            .with("k", 3)
            .with("alpha", 1.5)
            .with("type", "binary")
            .with("neg", -1);
        assert_eq!(params.size("k")?, 3);
        assert_eq!(params.sample("k")?, 3);
        assert_relative_eq!(params.real("alpha")?, 1.5);
        assert_eq!(params.choice("type")?, "binary");
        assert!(params.size("neg").is_err());
        assert!(params.integer("alpha").is_err());
        assert!(params.choice("missing").is_err());
        assert_eq!(params.to_string(), "alpha=1.5, k=3, neg=-1, type=binary");
        Ok(())
    }
}
