//! # pyro-optimizer
//!
//! Search side of a pyro run.
//!
//! Provides initial-design sampling (uniform random and maximin Latin
//! hypercube), the [`OptimizerStrategy`] seam with a name-keyed
//! [`StrategyRegistry`], the built-in strategies, and parameter importance
//! ranking over a finished history.

mod coordinate;
mod importance;
mod sampler;
mod search;
mod strategy;
mod tracker;

pub use coordinate::CoordinateSearch;
pub use importance::{ImportanceAnalyzer, DEFAULT_NUM_TREES};
pub use sampler::{
    latin_hypercube, maximin_latin_hypercube, min_pairwise_distance, unit_random, Sampler,
    DEFAULT_MAXIMIN_ITERATIONS,
};
pub use search::{perturb, sample_uniform, PerturbSearch, RandomSearch};
pub use strategy::{rng_for, OptimizerStrategy, StrategyRegistry, StrategyRegistryBuilder};
pub use tracker::{SearchTracker, POINT_TOLERANCE};
