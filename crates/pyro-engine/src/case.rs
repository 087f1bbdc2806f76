//! The optimization case: parameter space plus the objective it is scored by.

use std::fmt;
use std::sync::Arc;
use tracing::info;

use pyro_types::{ParameterSpace, PyroResult};

use crate::objective::Objective;

/// A named problem: what to vary and how to score a candidate.
#[derive(Clone)]
pub struct Case {
    pub name: String,
    pub params: ParameterSpace,
    objective: Arc<dyn Objective>,
}

impl Case {
    /// Build a case; the parameter space is validated here.
    pub fn new(
        name: impl Into<String>,
        params: ParameterSpace,
        objective: Arc<dyn Objective>,
    ) -> PyroResult<Self> {
        params.validate()?;
        Ok(Self {
            name: name.into(),
            params,
            objective,
        })
    }

    /// Lower and upper bound vectors.
    pub fn get_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.params.bounds()
    }

    pub fn param_names(&self) -> Vec<String> {
        self.params.names()
    }

    /// Shared handle to the objective, for submission to the pool.
    pub fn objective(&self) -> Arc<dyn Objective> {
        Arc::clone(&self.objective)
    }

    /// Log the case definition.
    pub fn print_info(&self) {
        info!(
            "Case '{}': {} parameters, objective: {}",
            self.name,
            self.params.ndim(),
            self.objective.describe()
        );
        for param in self.params.parameters() {
            info!("  {:<24} [{}, {}]", param.name, param.low, param.high);
        }
    }
}

impl fmt::Debug for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Case")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("objective", &self.objective.describe())
            .finish()
    }
}
