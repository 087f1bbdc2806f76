//! One optimization run from options to report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use pyro_data::DesignLoader;
use pyro_engine::{Case, EvaluationPool, PoolConfig};
use pyro_optimizer::{rng_for, ImportanceAnalyzer, Sampler, StrategyRegistry};
use pyro_types::{
    ConfigError, EvaluationResult, ImportanceReport, InitialDesign, OptimizationHistory,
    OptimizationOutcome, PyroError, PyroResult, RunOptions,
};

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub case_name: String,
    pub optimizer: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcome: OptimizationOutcome,
    /// `None` when the history was too small to rank parameters.
    pub importance: Option<ImportanceReport>,
}

impl RunReport {
    /// Human readable summary for the terminal.
    pub fn summary(&self, param_names: &[String]) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Run {} ({}) finished in {:.2}s\n",
            self.run_id,
            self.optimizer,
            self.elapsed.as_secs_f64()
        ));
        out.push_str(&format!(
            "Evaluations: {} ({} failed), iterations: {}\n",
            self.outcome.history.len(),
            self.outcome.history.num_failed(),
            self.outcome.iterations
        ));
        out.push_str(&format!("Best value: {}\n", self.outcome.best_value));
        out.push_str("Best point:\n");
        for (name, value) in param_names.iter().zip(&self.outcome.best_point) {
            out.push_str(&format!("  {name:<24} {value}\n"));
        }
        match &self.importance {
            Some(report) => {
                out.push_str("Parameter importance:\n");
                for entry in &report.ranking {
                    out.push_str(&format!("  {:<24} {:.4}\n", entry.name, entry.score));
                }
            }
            None => out.push_str("Parameter importance: not available\n"),
        }
        out
    }
}

/// Runs cases against a fixed strategy registry.
#[derive(Debug, Clone)]
pub struct Driver {
    registry: StrategyRegistry,
    loader: DesignLoader,
    analyzer: ImportanceAnalyzer,
}

impl Driver {
    pub fn new(registry: StrategyRegistry) -> Self {
        Self {
            registry,
            loader: DesignLoader::new(),
            analyzer: ImportanceAnalyzer::default(),
        }
    }

    pub fn with_loader(mut self, loader: DesignLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_analyzer(mut self, analyzer: ImportanceAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub async fn run(&self, case: &Case, opts: &RunOptions) -> PyroResult<RunReport> {
        self.run_until(case, opts, std::future::pending::<()>()).await
    }

    /// Run until the strategy finishes or `cancel` resolves, whichever comes
    /// first. On cancellation no new work is submitted and in-flight
    /// evaluations are abandoned.
    ///
    /// When the strategy fails or the run is cancelled the pool is still shut
    /// down, and the error is [`PyroError::Aborted`]: its cause is the
    /// strategy error or [`PyroError::Interrupted`], and its history holds the
    /// known design rows plus every evaluation that completed.
    pub async fn run_until<C>(&self, case: &Case, opts: &RunOptions, cancel: C) -> PyroResult<RunReport>
    where
        C: Future<Output = ()>,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = Instant::now();

        opts.validate()?;
        let strategy = self.registry.get(&opts.optimizer_name)?;
        let design = self.initial_design(case, opts)?;
        let known: Vec<EvaluationResult> = (0..design.len())
            .filter_map(|i| {
                design
                    .known_value(i)
                    .map(|value| EvaluationResult::known(design.points()[i].clone(), value))
            })
            .collect();

        let mut config = PoolConfig::new(opts.num_jobs);
        if let Some(secs) = opts.eval_timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        let mut pool = EvaluationPool::start(config)?;

        info!(
            %run_id,
            "Running '{}' with optimizer '{}' on {} workers",
            case.name,
            strategy.name(),
            pool.num_jobs()
        );

        let result = tokio::select! {
            outcome = strategy.optimize(case, opts, &pool, design) => outcome,
            _ = cancel => {
                warn!("Run interrupted; abandoning in-flight evaluations");
                Err(PyroError::Interrupted)
            }
        };
        pool.shutdown().await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(cause) => {
                let mut history = OptimizationHistory::new();
                for record in known.into_iter().chain(pool.completed().await) {
                    history.record(record);
                }
                warn!("Run stopped after {} evaluations: {cause}", history.len());
                return Err(PyroError::Aborted {
                    cause: Box::new(cause),
                    history: Box::new(history),
                });
            }
        };

        info!(
            "Best value {} after {} evaluations",
            outcome.best_value,
            outcome.history.len()
        );

        let analyzer = self.analyzer.clone().with_seed(opts.seed.unwrap_or_default());
        let importance = match analyzer.rank(&outcome.history, &case.param_names()) {
            Ok(report) => Some(report),
            Err(PyroError::InsufficientData { required, available }) => {
                warn!(
                    "Skipping parameter importance: {required} distinct points required, {available} available"
                );
                None
            }
            Err(e) => return Err(e),
        };

        Ok(RunReport {
            run_id,
            case_name: case.name.clone(),
            optimizer: strategy.name().to_string(),
            started_at,
            elapsed: timer.elapsed(),
            outcome,
            importance,
        })
    }

    /// Load the design file when one is configured, otherwise sample.
    pub fn initial_design(&self, case: &Case, opts: &RunOptions) -> PyroResult<InitialDesign> {
        let design = match &opts.initial_design_file {
            Some(path) => {
                info!("Loading initial design from {}", path.display());
                self.loader.load(path, &case.param_names())?
            }
            None => {
                info!(
                    "Sampling {} initial points ({})",
                    opts.num_initial, opts.initial_design
                );
                let mut rng = rng_for(opts, 0);
                Sampler::new(opts.initial_design).generate(opts.num_initial, &case.params, &mut rng)?
            }
        };

        if let Some(row) = design.points().iter().position(|x| !case.params.contains(x)) {
            return Err(ConfigError::InvalidValue {
                field: "initial_design_file".to_string(),
                message: format!("row {} lies outside the parameter bounds", row + 1),
            }
            .into());
        }
        Ok(design)
    }
}
