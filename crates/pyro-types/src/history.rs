//! Evaluation results and the append-only optimization history.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::design::CandidateVector;
use crate::errors::{EvaluationError, PyroResult};

/// Identity of one submitted evaluation. Issued by the evaluation pool in
/// submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvaluationId(pub u64);

impl fmt::Display for EvaluationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eval-{}", self.0)
    }
}

/// Outcome of evaluating one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// `None` for values supplied by an initial-design file.
    pub id: Option<EvaluationId>,
    pub candidate: CandidateVector,
    /// Objective value; `+inf` when `error` is set.
    pub value: f64,
    pub error: Option<EvaluationError>,
}

impl EvaluationResult {
    pub fn success(id: EvaluationId, candidate: CandidateVector, value: f64) -> Self {
        Self {
            id: Some(id),
            candidate,
            value,
            error: None,
        }
    }

    pub fn failure(id: EvaluationId, candidate: CandidateVector, error: EvaluationError) -> Self {
        Self {
            id: Some(id),
            candidate,
            value: f64::INFINITY,
            error: Some(error),
        }
    }

    /// A value already known from a previous run.
    pub fn known(candidate: CandidateVector, value: f64) -> Self {
        Self {
            id: None,
            candidate,
            value,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Every evaluated point (`Xi`) and its value (`Fi`), in completion order.
///
/// Failed evaluations stay in the history with their error marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationHistory {
    xi: Vec<CandidateVector>,
    fi: Vec<f64>,
    errors: Vec<Option<EvaluationError>>,
}

impl OptimizationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: EvaluationResult) {
        self.xi.push(result.candidate);
        self.fi.push(result.value);
        self.errors.push(result.error);
    }

    pub fn xi(&self) -> &[CandidateVector] {
        &self.xi
    }

    pub fn fi(&self) -> &[f64] {
        &self.fi
    }

    pub fn errors(&self) -> &[Option<EvaluationError>] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.fi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fi.is_empty()
    }

    pub fn num_failed(&self) -> usize {
        self.errors.iter().filter(|e| e.is_some()).count()
    }

    /// Index of the smallest value; the earliest entry wins exact ties.
    pub fn argmin(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, &value) in self.fi.iter().enumerate() {
            let improves = match best {
                None => true,
                Some(b) => value < self.fi[b],
            };
            if improves {
                best = Some(i);
            }
        }
        best
    }
}

/// Final result of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub best_point: CandidateVector,
    pub best_value: f64,
    pub history: OptimizationHistory,
    /// Incumbent best value after the initial design and after each iteration.
    pub best_trace: Vec<f64>,
    /// Number of proposal iterations performed after the initial design.
    pub iterations: usize,
}

impl OptimizationOutcome {
    /// Derive the best point from `history`.
    pub fn from_history(
        history: OptimizationHistory,
        best_trace: Vec<f64>,
        iterations: usize,
    ) -> PyroResult<Self> {
        let best = history
            .argmin()
            .ok_or_else(|| crate::internal_error!("optimization finished with an empty history"))?;
        Ok(Self {
            best_point: history.xi[best].clone(),
            best_value: history.fi[best],
            history,
            best_trace,
            iterations,
        })
    }
}
