//! JSON run configuration: the case definition plus run options.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use pyro_types::{ParameterDef, ParameterSpace, PyroResult, RunOptions, SamplingMethod};

/// External simulator invoked once per evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Parent of the per-evaluation work directories.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseConfig {
    pub name: String,
    pub parameters: Vec<ParameterDef>,
    pub simulator: SimulatorConfig,
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub case: CaseConfig,
    #[serde(default)]
    pub run: RunOptions,
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> PyroResult<Self> {
        let path = path.as_ref();
        tracing::info!("Reading run configuration from: {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse and validate. Bounds and option errors surface here, before any
    /// evaluation is attempted.
    pub fn from_json_str(text: &str) -> PyroResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if let Some(method) = value.pointer("/run/initial_design").and_then(|m| m.as_str()) {
            method.parse::<SamplingMethod>()?;
        }
        let config: Self = serde_json::from_value(value)?;
        config.space()?;
        config.run.validate()?;
        Ok(config)
    }

    pub fn space(&self) -> PyroResult<ParameterSpace> {
        ParameterSpace::from_defs(self.case.parameters.clone())
    }
}
