//! The strategy seam and the registry strategies are looked up in.

use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::Arc;

use pyro_engine::{Case, EvaluationPool};
use pyro_types::{ConfigError, InitialDesign, OptimizationOutcome, PyroResult, RunOptions};

use crate::coordinate::CoordinateSearch;
use crate::search::{PerturbSearch, RandomSearch};

/// Common trait for all search strategies.
///
/// A strategy receives the case, the run options, a started pool and the
/// initial design. Rows of the design that carry a known value are recorded
/// without evaluation; every other point is evaluated through `pool`. The
/// returned outcome holds the full history and the best point in it.
#[async_trait]
pub trait OptimizerStrategy: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    async fn optimize(
        &self,
        case: &Case,
        opts: &RunOptions,
        pool: &EvaluationPool,
        design: InitialDesign,
    ) -> PyroResult<OptimizationOutcome>;
}

/// Deterministic generator for one strategy stream when `opts.seed` is set,
/// entropy-seeded otherwise.
pub fn rng_for(opts: &RunOptions, stream: u64) -> ChaCha8Rng {
    match opts.seed {
        Some(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(stream);
            rng
        }
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Name to strategy mapping. Built once, read-only afterwards.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn OptimizerStrategy>>,
}

impl StrategyRegistry {
    pub fn builder() -> StrategyRegistryBuilder {
        StrategyRegistryBuilder::default()
    }

    /// Registry with every built-in strategy.
    pub fn with_defaults() -> Self {
        Self::builder()
            .register(RandomSearch::default())
            .register(PerturbSearch::default())
            .register(CoordinateSearch::default())
            .build()
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn OptimizerStrategy>, ConfigError> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownOptimizer {
                name: name.to_string(),
                available: self.names(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

#[derive(Default)]
pub struct StrategyRegistryBuilder {
    strategies: BTreeMap<String, Arc<dyn OptimizerStrategy>>,
}

impl StrategyRegistryBuilder {
    /// Add a strategy under its own name. A later registration with the same
    /// name replaces the earlier one.
    pub fn register<S: OptimizerStrategy + 'static>(self, strategy: S) -> Self {
        self.register_arc(Arc::new(strategy))
    }

    pub fn register_arc(mut self, strategy: Arc<dyn OptimizerStrategy>) -> Self {
        self.strategies.insert(strategy.name().to_string(), strategy);
        self
    }

    pub fn build(self) -> StrategyRegistry {
        StrategyRegistry {
            strategies: self.strategies,
        }
    }
}
