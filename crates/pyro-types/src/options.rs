//! Run options consumed by the driver and the optimizer strategies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::{ConfigError, PyroResult};

/// How the initial design is sampled when no design file is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingMethod {
    /// Independent uniform draws.
    #[serde(rename = "rand")]
    Random,
    /// Maximin-optimized Latin hypercube.
    #[serde(rename = "lhs")]
    LatinHypercube,
}

impl Default for SamplingMethod {
    fn default() -> Self {
        Self::LatinHypercube
    }
}

impl FromStr for SamplingMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rand" => Ok(Self::Random),
            "lhs" => Ok(Self::LatinHypercube),
            other => Err(ConfigError::UnknownSamplingMethod {
                method: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => write!(f, "rand"),
            Self::LatinHypercube => write!(f, "lhs"),
        }
    }
}

/// What a strategy does with a failed evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure as `+inf` and keep going.
    Penalize,
    /// Stop the run at the first failure.
    Abort,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Penalize
    }
}

/// Options for one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Number of parallel evaluation workers.
    pub num_jobs: usize,

    /// Registry name of the optimizer strategy.
    pub optimizer_name: String,

    /// Sampling method used when `initial_design_file` is not set.
    pub initial_design: SamplingMethod,

    /// Previously recorded (point, value) table to resume from.
    pub initial_design_file: Option<PathBuf>,

    /// Number of sampled initial points.
    pub num_initial: usize,

    /// Maximum number of proposal iterations after the initial design.
    pub max_iter: usize,

    /// Candidates proposed per iteration. Defaults to `num_jobs`.
    pub num_points: Option<usize>,

    /// Where history and result files are written.
    pub output_dir: PathBuf,

    /// Seed for sampling and stochastic strategies.
    pub seed: Option<u64>,

    /// Per-evaluation wall clock limit.
    pub eval_timeout_secs: Option<u64>,

    pub on_failure: FailurePolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            num_jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            optimizer_name: "coordinate".to_string(),
            initial_design: SamplingMethod::default(),
            initial_design_file: None,
            num_initial: 10,
            max_iter: 20,
            num_points: None,
            output_dir: PathBuf::from("Results"),
            seed: None,
            eval_timeout_secs: None,
            on_failure: FailurePolicy::default(),
        }
    }
}

impl RunOptions {
    pub fn new(optimizer_name: &str) -> Self {
        Self {
            optimizer_name: optimizer_name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_num_jobs(mut self, n: usize) -> Self {
        self.num_jobs = n;
        self
    }

    pub fn with_max_iter(mut self, n: usize) -> Self {
        self.max_iter = n;
        self
    }

    pub fn with_initial_design(mut self, method: SamplingMethod, num_initial: usize) -> Self {
        self.initial_design = method;
        self.num_initial = num_initial;
        self
    }

    pub fn with_initial_design_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.initial_design_file = Some(path.into());
        self
    }

    pub fn with_num_points(mut self, n: usize) -> Self {
        self.num_points = Some(n);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Candidates per proposal iteration.
    pub fn batch_size(&self) -> usize {
        self.num_points.unwrap_or(self.num_jobs).max(1)
    }

    /// Reject option combinations that cannot run.
    pub fn validate(&self) -> PyroResult<()> {
        let positive = [
            ("num_jobs", self.num_jobs),
            ("num_initial", self.num_initial),
            ("num_points", self.num_points.unwrap_or(1)),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "must be at least 1".to_string(),
                }
                .into());
            }
        }
        if self.eval_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "eval_timeout_secs".to_string(),
                message: "must be at least 1 second".to_string(),
            }
            .into());
        }
        if self.optimizer_name.trim().is_empty() {
            return Err(crate::config_error!("optimizer_name must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_method_parses_known_names() {
        assert_eq!("rand".parse::<SamplingMethod>(), Ok(SamplingMethod::Random));
        assert_eq!("lhs".parse::<SamplingMethod>(), Ok(SamplingMethod::LatinHypercube));
        assert_eq!(
            "sobol".parse::<SamplingMethod>(),
            Err(ConfigError::UnknownSamplingMethod {
                method: "sobol".into()
            })
        );
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: RunOptions =
            serde_json::from_str(r#"{"num_jobs": 3, "initial_design": "rand", "num_initial": 4}"#)
                .unwrap();
        assert_eq!(opts.num_jobs, 3);
        assert_eq!(opts.initial_design, SamplingMethod::Random);
        assert_eq!(opts.num_initial, 4);
        assert_eq!(opts.optimizer_name, "coordinate");
        assert_eq!(opts.on_failure, FailurePolicy::Penalize);
        assert_eq!(opts.batch_size(), 3);
    }

    #[test]
    fn unknown_sampling_method_rejected_when_deserializing() {
        let parsed = serde_json::from_str::<RunOptions>(r#"{"initial_design": "grid"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn zero_counts_fail_validation() {
        let opts = RunOptions::new("random").with_num_jobs(0);
        assert!(opts.validate().is_err());

        let opts = RunOptions::new("random").with_num_points(0);
        assert!(opts.validate().is_err());

        let opts = RunOptions::new("random").with_initial_design(SamplingMethod::Random, 0);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let opts = RunOptions::new("perturb")
            .with_num_jobs(2)
            .with_max_iter(5)
            .with_num_points(6)
            .with_seed(42);
        assert!(opts.validate().is_ok());
        assert_eq!(opts.batch_size(), 6);
        assert_eq!(opts.seed, Some(42));
        assert_eq!(opts.max_iter, 5);
    }
}
