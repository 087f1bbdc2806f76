//! Initial designs: the starting candidates handed to an optimizer.

use serde::{Deserialize, Serialize};

use crate::errors::{FormatError, PyroResult};
use crate::space::ParameterSpace;

/// One value per parameter, in parameter order.
pub type CandidateVector = Vec<f64>;

/// Ordered candidate points plus, when loaded from a file, their known
/// objective values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialDesign {
    points: Vec<CandidateVector>,
    fvals: Option<Vec<f64>>,
}

impl InitialDesign {
    /// A freshly sampled design; every value is unknown.
    pub fn new(points: Vec<CandidateVector>) -> Self {
        Self {
            points,
            fvals: None,
        }
    }

    /// A design with known values aligned row-for-row with `points`.
    pub fn with_values(points: Vec<CandidateVector>, fvals: Vec<f64>) -> PyroResult<Self> {
        if fvals.len() != points.len() {
            return Err(FormatError::InconsistentRow {
                line: 0,
                expected: points.len(),
                found: fvals.len(),
            }
            .into());
        }
        Ok(Self {
            points,
            fvals: Some(fvals),
        })
    }

    /// Scale a raw unit-cube sample onto `space`, producing a new design.
    pub fn from_unit_sample(unit: &[Vec<f64>], space: &ParameterSpace) -> Self {
        Self::new(unit.iter().map(|row| space.scale(row)).collect())
    }

    pub fn points(&self) -> &[CandidateVector] {
        &self.points
    }

    pub fn fvals(&self) -> Option<&[f64]> {
        self.fvals.as_deref()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Known value of row `index`. NaN marks a value that still has to be
    /// evaluated.
    pub fn known_value(&self, index: usize) -> Option<f64> {
        self.fvals
            .as_ref()
            .and_then(|values| values.get(index).copied())
            .filter(|value| !value.is_nan())
    }

    /// Number of rows whose value is already known.
    pub fn num_known(&self) -> usize {
        (0..self.len()).filter(|&i| self.known_value(i).is_some()).count()
    }

    pub fn into_parts(self) -> (Vec<CandidateVector>, Option<Vec<f64>>) {
        (self.points, self.fvals)
    }
}
