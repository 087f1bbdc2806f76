//! Parameter space definitions.

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, PyroResult};

/// A single real-valued parameter with inclusive bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Human-readable parameter name (e.g. "conductivity").
    pub name: String,
    pub low: f64,
    pub high: f64,
}

impl ParameterDef {
    pub fn new(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            low,
            high,
        }
    }

    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    /// Map a unit-interval coordinate onto this parameter's range.
    pub fn scale(&self, unit: f64) -> f64 {
        (self.low + unit * self.span()).clamp(self.low, self.high)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// Ordered list of parameter definitions.
///
/// Immutable once validated; the core only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSpace {
    parameters: Vec<ParameterDef>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    /// Build a space from parameter definitions, validating every bound.
    pub fn from_defs(parameters: Vec<ParameterDef>) -> PyroResult<Self> {
        let space = Self { parameters };
        space.validate()?;
        Ok(space)
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef::new(name, low, high));
        self
    }

    /// Check the space is non-empty and every parameter has finite `low < high`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parameters.is_empty() {
            return Err(ConfigError::EmptySpace);
        }
        for param in &self.parameters {
            if !(param.low.is_finite() && param.high.is_finite() && param.low < param.high) {
                return Err(ConfigError::InvalidBounds {
                    name: param.name.clone(),
                    low: param.low,
                    high: param.high,
                });
            }
        }
        Ok(())
    }

    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters
    }

    pub fn ndim(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// Lower and upper bound vectors, in parameter order.
    pub fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.parameters.iter().map(|p| (p.low, p.high)).unzip()
    }

    /// Scale a unit-cube point onto the space.
    pub fn scale(&self, unit: &[f64]) -> Vec<f64> {
        self.parameters
            .iter()
            .zip(unit)
            .map(|(param, &u)| param.scale(u))
            .collect()
    }

    /// Clamp an arbitrary point into the space.
    pub fn clamp(&self, point: &[f64]) -> Vec<f64> {
        self.parameters
            .iter()
            .zip(point)
            .map(|(param, &x)| x.clamp(param.low, param.high))
            .collect()
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.parameters.len()
            && self
                .parameters
                .iter()
                .zip(point)
                .all(|(param, &x)| param.contains(x))
    }
}

impl Default for ParameterSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain_and_bounds() {
        let space = ParameterSpace::new()
            .add_float("a", 0.0, 1.0)
            .add_float("b", -5.0, 5.0);
        assert_eq!(space.ndim(), 2);
        assert_eq!(space.names(), vec!["a", "b"]);
        assert_eq!(space.bounds(), (vec![0.0, -5.0], vec![1.0, 5.0]));
        assert!(space.validate().is_ok());
    }

    #[test]
    fn scale_maps_unit_cube_endpoints() {
        let space = ParameterSpace::new()
            .add_float("a", 2.0, 4.0)
            .add_float("b", -1.0, 1.0);
        assert_eq!(space.scale(&[0.0, 1.0]), vec![2.0, 1.0]);
        assert_eq!(space.scale(&[0.5, 0.5]), vec![3.0, 0.0]);
    }

    #[test]
    fn inverted_bounds_rejected() {
        let err = ParameterSpace::from_defs(vec![ParameterDef::new("k", 3.0, 1.0)]).unwrap_err();
        assert!(err.to_string().contains("'k'"));
    }

    #[test]
    fn degenerate_and_infinite_bounds_rejected() {
        let flat = ParameterSpace::new().add_float("k", 1.0, 1.0);
        assert!(matches!(flat.validate(), Err(ConfigError::InvalidBounds { .. })));

        let open = ParameterSpace::new().add_float("k", 0.0, f64::INFINITY);
        assert!(matches!(open.validate(), Err(ConfigError::InvalidBounds { .. })));
    }

    #[test]
    fn empty_space_rejected() {
        assert_eq!(ParameterSpace::new().validate(), Err(ConfigError::EmptySpace));
    }

    #[test]
    fn contains_and_clamp() {
        let space = ParameterSpace::new().add_float("x", 0.0, 1.0);
        assert!(space.contains(&[1.0]));
        assert!(!space.contains(&[1.5]));
        assert!(!space.contains(&[0.5, 0.5]));
        assert_eq!(space.clamp(&[1.5]), vec![1.0]);
    }

    #[test]
    fn serializes_as_plain_list() {
        let space = ParameterSpace::new().add_float("x", 0.0, 1.0);
        let json = serde_json::to_value(&space).unwrap();
        assert!(json.is_array());
        let back: ParameterSpace = serde_json::from_value(json).unwrap();
        assert_eq!(back, space);
    }
}
