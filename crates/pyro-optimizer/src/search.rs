//! Sampling based strategies: pure random search and perturbation of the
//! incumbent.

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info};

use pyro_engine::{Case, EvaluationPool};
use pyro_types::{CandidateVector, InitialDesign, OptimizationOutcome, ParameterSpace, PyroResult, RunOptions};

use crate::strategy::{rng_for, OptimizerStrategy};
use crate::tracker::SearchTracker;

/// Uniform point in `space`.
pub fn sample_uniform<R: Rng + ?Sized>(space: &ParameterSpace, rng: &mut R) -> CandidateVector {
    space
        .parameters()
        .iter()
        .map(|p| rng.gen_range(p.low..p.high))
        .collect()
}

/// Move every coordinate of `base` by up to `scale` of its range, then clamp.
pub fn perturb<R: Rng + ?Sized>(
    space: &ParameterSpace,
    base: &[f64],
    scale: f64,
    rng: &mut R,
) -> CandidateVector {
    let moved: Vec<f64> = space
        .parameters()
        .iter()
        .zip(base)
        .map(|(p, &v)| v + rng.gen_range(-scale..scale) * p.span())
        .collect();
    space.clamp(&moved)
}

// ---- Random search ----

/// Independent uniform sampling. Each iteration proposes one batch.
#[derive(Debug, Clone, Default)]
pub struct RandomSearch;

#[async_trait]
impl OptimizerStrategy for RandomSearch {
    fn name(&self) -> &str {
        "random"
    }

    async fn optimize(
        &self,
        case: &Case,
        opts: &RunOptions,
        pool: &EvaluationPool,
        design: InitialDesign,
    ) -> PyroResult<OptimizationOutcome> {
        let mut rng = rng_for(opts, 1);
        let mut tracker = SearchTracker::new(case, opts, pool);
        tracker.seed(design).await?;

        for _ in 0..opts.max_iter {
            let batch: Vec<CandidateVector> = (0..opts.batch_size())
                .map(|_| sample_uniform(&case.params, &mut rng))
                .collect();
            tracker.evaluate_batch(batch).await?;
            tracker.finish_iteration();
        }

        tracker.into_outcome()
    }
}

// ---- Perturbation search ----

/// Mix of exploration and exploitation around the incumbent.
///
/// With probability `exploration_weight` a proposal is drawn uniformly;
/// otherwise the best point so far is moved by up to `perturbation` of each
/// parameter range.
#[derive(Debug, Clone)]
pub struct PerturbSearch {
    exploration_weight: f64,
    perturbation: f64,
}

impl PerturbSearch {
    pub fn new(exploration_weight: f64, perturbation: f64) -> Self {
        Self {
            exploration_weight: exploration_weight.clamp(0.0, 1.0),
            perturbation: perturbation.abs(),
        }
    }

    pub fn exploration_weight(&self) -> f64 {
        self.exploration_weight
    }

    fn propose<R: Rng + ?Sized>(&self, space: &ParameterSpace, best: Option<&[f64]>, rng: &mut R) -> CandidateVector {
        match best {
            Some(base) if self.perturbation > 0.0 && rng.gen::<f64>() >= self.exploration_weight => {
                perturb(space, base, self.perturbation, rng)
            }
            _ => sample_uniform(space, rng),
        }
    }
}

impl Default for PerturbSearch {
    fn default() -> Self {
        Self::new(0.3, 0.1)
    }
}

#[async_trait]
impl OptimizerStrategy for PerturbSearch {
    fn name(&self) -> &str {
        "perturb"
    }

    async fn optimize(
        &self,
        case: &Case,
        opts: &RunOptions,
        pool: &EvaluationPool,
        design: InitialDesign,
    ) -> PyroResult<OptimizationOutcome> {
        let mut rng = rng_for(opts, 2);
        let mut tracker = SearchTracker::new(case, opts, pool);
        tracker.seed(design).await?;

        for _ in 0..opts.max_iter {
            let best = tracker.best().map(|(x, _)| x.to_vec());
            let batch: Vec<CandidateVector> = (0..opts.batch_size())
                .map(|_| self.propose(&case.params, best.as_deref(), &mut rng))
                .collect();
            debug!(size = batch.len(), "perturb batch");
            tracker.evaluate_batch(batch).await?;
            tracker.finish_iteration();
        }

        info!(
            "Perturbation search finished after {} iterations",
            tracker.iterations()
        );
        tracker.into_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyro_engine::FnObjective;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    fn bowl() -> Case {
        let space = ParameterSpace::new().add_float("a", 0.0, 1.0).add_float("b", -2.0, 2.0);
        let objective = FnObjective::new(|x| (x[0] - 0.3).powi(2) + (x[1] - 1.0).powi(2));
        Case::new("bowl", space, Arc::new(objective)).unwrap()
    }

    fn start_design() -> InitialDesign {
        InitialDesign::new(vec![vec![0.9, -1.5], vec![0.1, 0.0], vec![0.5, 1.9]])
    }

    #[test]
    fn perturbation_stays_in_bounds() {
        let space = ParameterSpace::new().add_float("a", 0.0, 1.0).add_float("b", -2.0, 2.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            let p = perturb(&space, &[1.0, -2.0], 0.5, &mut rng);
            assert!(space.contains(&p));
        }
    }

    #[tokio::test]
    async fn random_search_history_size() {
        let case = bowl();
        let opts = RunOptions::new("random").with_max_iter(4).with_num_points(3).with_seed(7);
        let pool = EvaluationPool::new(2).unwrap();

        let outcome = RandomSearch
            .optimize(&case, &opts, &pool, start_design())
            .await
            .unwrap();

        assert_eq!(outcome.history.len(), 3 + 4 * 3);
        assert_eq!(outcome.iterations, 4);
        assert_eq!(outcome.best_trace.len(), 5);
        assert!(outcome.history.xi().iter().all(|x| case.params.contains(x)));
    }

    #[tokio::test]
    async fn perturb_search_improves_on_the_design() {
        let case = bowl();
        let opts = RunOptions::new("perturb").with_max_iter(15).with_num_points(4).with_seed(11);
        let pool = EvaluationPool::new(4).unwrap();

        let outcome = PerturbSearch::default()
            .optimize(&case, &opts, &pool, start_design())
            .await
            .unwrap();

        let initial = outcome.best_trace[0];
        assert!(outcome.best_value <= initial);
        assert!(outcome.best_trace.windows(2).all(|w| w[1] <= w[0]));

        let min = outcome.history.fi().iter().cloned().fold(f64::INFINITY, f64::min);
        assert_eq!(outcome.best_value, min);
    }

    #[test]
    fn pure_exploration_never_perturbs() {
        let space = ParameterSpace::new().add_float("a", 10.0, 20.0);
        let strategy = PerturbSearch::new(1.0, 0.1);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        // An out-of-range base would be clamped to 10.0 if it were used.
        let hits = (0..50)
            .filter(|_| strategy.propose(&space, Some(&[0.0]), &mut rng)[0] == 10.0)
            .count();
        assert_eq!(hits, 0);
    }
}
