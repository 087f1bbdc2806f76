use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::OptimizationHistory;

/// Main error type for the pyro optimization driver
#[derive(Error, Debug)]
pub enum PyroError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Initial design format error: {0}")]
    Format(#[from] FormatError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Insufficient data: {required} distinct points required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("Evaluation pool error: {0}")]
    Pool(String),

    #[error("Run interrupted before completion")]
    Interrupted,

    /// The run stopped early. `history` holds every evaluation that completed
    /// before it did, failed ones included.
    #[error("Run stopped after {} evaluations: {cause}", .history.len())]
    Aborted {
        #[source]
        cause: Box<PyroError>,
        history: Box<OptimizationHistory>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration errors. Always fatal and raised before any evaluation starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown optimizer '{name}' (available: {})", .available.join(", "))]
    UnknownOptimizer { name: String, available: Vec<String> },

    #[error("unknown initial design method '{method}' (expected 'rand' or 'lhs')")]
    UnknownSamplingMethod { method: String },

    #[error("invalid bounds for parameter '{name}': low {low} must be finite and below high {high}")]
    InvalidBounds { name: String, low: f64, high: f64 },

    #[error("parameter space is empty")]
    EmptySpace,

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("{message}")]
    Invalid { message: String },
}

/// Errors raised while reading an initial-design file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("column '{column}' not found in design header")]
    MissingColumn { column: String },

    #[error("line {line}: expected {expected} fields, found {found}")]
    InconsistentRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: column '{column}' holds non-numeric value '{value}'")]
    InvalidNumber {
        line: u64,
        column: String,
        value: String,
    },

    #[error("design file {path} contains no rows")]
    Empty { path: String },
}

/// Failure of a single evaluation. Local to one candidate and stored next to
/// it in the optimization history.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationError {
    #[error("objective failed: {message}")]
    Failed { message: String },

    #[error("worker crashed: {message}")]
    Crashed { message: String },

    #[error("objective produced unparsable output: {output:?}")]
    InvalidOutput { output: String },

    #[error("evaluation exceeded {seconds}s timeout")]
    Timeout { seconds: u64 },

    #[error("worker terminated before returning a result")]
    WorkerLost,
}

impl PyroError {
    /// Evaluations completed by a run that stopped early.
    pub fn partial_history(&self) -> Option<&OptimizationHistory> {
        match self {
            Self::Aborted { history, .. } => Some(&**history),
            _ => None,
        }
    }

    /// The innermost error, looking through [`PyroError::Aborted`].
    pub fn root_cause(&self) -> &PyroError {
        match self {
            Self::Aborted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for pyro operations
pub type PyroResult<T> = Result<T, PyroError>;

/// Macro for creating free-form configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::PyroError::Config($crate::ConfigError::Invalid {
            message: format!($($arg)*),
        })
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::PyroError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConfigError::UnknownOptimizer {
            name: "gp".to_string(),
            available: vec!["coordinate".to_string(), "random".to_string()],
        };

        let text = error.to_string();
        assert!(text.contains("'gp'"));
        assert!(text.contains("coordinate, random"));
    }

    #[test]
    fn test_error_conversion() {
        let format_error = FormatError::MissingColumn {
            column: "tig".to_string(),
        };
        let pyro_error: PyroError = format_error.into();

        match pyro_error {
            PyroError::Format(FormatError::MissingColumn { column }) => assert_eq!(column, "tig"),
            other => panic!("Expected Format error, got {other:?}"),
        }
    }

    #[test]
    fn test_evaluation_error_serializes_with_kind_tag() {
        let err = EvaluationError::Timeout { seconds: 30 };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["seconds"], 30);
    }

    #[test]
    fn test_aborted_keeps_history_and_cause() {
        let mut history = OptimizationHistory::new();
        history.record(crate::EvaluationResult::known(vec![0.5], 2.0));
        let err = PyroError::Aborted {
            cause: Box::new(PyroError::Interrupted),
            history: Box::new(history),
        };

        assert_eq!(err.partial_history().map(|h| h.len()), Some(1));
        assert!(matches!(err.root_cause(), PyroError::Interrupted));
        assert!(err.to_string().starts_with("Run stopped after 1 evaluations"));
        assert!(PyroError::Interrupted.partial_history().is_none());
    }

    #[test]
    fn test_macros() {
        let config_err = config_error!("num_jobs must be positive, got {}", 0);
        assert!(matches!(config_err, PyroError::Config(ConfigError::Invalid { .. })));
        let internal_err = internal_error!("Something went wrong");
        assert!(internal_err.to_string().contains("Something went wrong"));
    }
}
