//! Compass search around the incumbent.

use async_trait::async_trait;
use tracing::{debug, info};

use pyro_engine::{Case, EvaluationPool};
use pyro_types::{CandidateVector, InitialDesign, OptimizationOutcome, ParameterSpace, PyroResult, RunOptions};

use crate::strategy::OptimizerStrategy;
use crate::tracker::SearchTracker;

/// Deterministic pattern search.
///
/// Every iteration tries `center ± step_j` along each parameter, all neighbors
/// of one iteration in a single parallel batch. When a neighbor improves on the
/// incumbent the center moves there; otherwise every step is halved. The
/// search stops after `max_iter` iterations or once all steps fall below
/// `min_step` of their parameter range.
#[derive(Debug, Clone)]
pub struct CoordinateSearch {
    initial_step: f64,
    min_step: f64,
}

impl CoordinateSearch {
    /// `initial_step` and `min_step` are fractions of each parameter range.
    pub fn new(initial_step: f64, min_step: f64) -> Self {
        Self {
            initial_step,
            min_step,
        }
    }

    /// Compass neighbors of `center`, clamped into the space. Neighbors that
    /// collapse onto the center or onto each other are dropped.
    pub fn neighbors(space: &ParameterSpace, center: &[f64], steps: &[f64]) -> Vec<CandidateVector> {
        let mut neighbors: Vec<CandidateVector> = Vec::with_capacity(2 * steps.len());
        for (j, &step) in steps.iter().enumerate() {
            for sign in [1.0, -1.0] {
                let mut neighbor = center.to_vec();
                neighbor[j] += sign * step;
                let neighbor = space.clamp(&neighbor);
                if neighbor != center && !neighbors.contains(&neighbor) {
                    neighbors.push(neighbor);
                }
            }
        }
        neighbors
    }

    fn converged(&self, space: &ParameterSpace, steps: &[f64]) -> bool {
        space
            .parameters()
            .iter()
            .zip(steps)
            .all(|(p, &s)| s < self.min_step * p.span())
    }
}

impl Default for CoordinateSearch {
    fn default() -> Self {
        Self::new(0.25, 1e-4)
    }
}

#[async_trait]
impl OptimizerStrategy for CoordinateSearch {
    fn name(&self) -> &str {
        "coordinate"
    }

    async fn optimize(
        &self,
        case: &Case,
        opts: &RunOptions,
        pool: &EvaluationPool,
        design: InitialDesign,
    ) -> PyroResult<OptimizationOutcome> {
        let space = &case.params;
        let mut tracker = SearchTracker::new(case, opts, pool);
        tracker.seed(design).await?;

        let mut steps: Vec<f64> = space
            .parameters()
            .iter()
            .map(|p| self.initial_step * p.span())
            .collect();

        while tracker.iterations() < opts.max_iter {
            if self.converged(space, &steps) {
                info!("Coordinate search converged after {} iterations", tracker.iterations());
                break;
            }

            let before = tracker.best_value();
            let center = match tracker.best() {
                Some((x, _)) => x.to_vec(),
                None => space.scale(&vec![0.5; space.ndim()]),
            };

            let (neighbors, known): (Vec<_>, Vec<_>) = Self::neighbors(space, &center, &steps)
                .into_iter()
                .partition(|neighbor| !tracker.already_evaluated(neighbor));
            debug!(neighbors = neighbors.len(), skipped = known.len(), "coordinate iteration");
            tracker.evaluate_batch(neighbors).await?;
            tracker.finish_iteration();

            if tracker.best_value() >= before {
                for step in &mut steps {
                    *step *= 0.5;
                }
            }
        }

        tracker.into_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyro_engine::FnObjective;
    use std::sync::Arc;

    fn unit_square() -> ParameterSpace {
        ParameterSpace::new().add_float("a", 0.0, 1.0).add_float("b", 0.0, 1.0)
    }

    #[test]
    fn interior_center_gets_two_neighbors_per_dimension() {
        let neighbors = CoordinateSearch::neighbors(&unit_square(), &[0.5, 0.5], &[0.25, 0.125]);
        assert_eq!(
            neighbors,
            vec![vec![0.75, 0.5], vec![0.25, 0.5], vec![0.5, 0.625], vec![0.5, 0.375]]
        );
    }

    #[test]
    fn boundary_neighbors_are_clamped_and_deduplicated() {
        let neighbors = CoordinateSearch::neighbors(&unit_square(), &[1.0, 0.0], &[0.25, 0.25]);
        assert_eq!(neighbors, vec![vec![0.75, 0.0], vec![1.0, 0.25]]);
    }

    #[tokio::test]
    async fn history_and_best_agree() {
        let objective = FnObjective::new(|x| (x[0] - 0.3).powi(2) + (x[1] - 0.7).powi(2));
        let case = Case::new("bowl", unit_square(), Arc::new(objective)).unwrap();
        let opts = RunOptions::new("coordinate").with_max_iter(6);
        let pool = EvaluationPool::new(2).unwrap();
        let design = InitialDesign::new(vec![vec![0.9, 0.1], vec![0.5, 0.5]]);

        let outcome = CoordinateSearch::default()
            .optimize(&case, &opts, &pool, design)
            .await
            .unwrap();

        assert_eq!(outcome.iterations, 6);
        assert!(outcome.history.len() > 2);
        assert!(outcome.history.len() <= 2 + 6 * 4);
        assert_eq!(pool.submitted() as usize, outcome.history.len());

        let best = outcome.history.argmin().unwrap();
        assert_eq!(outcome.best_value, outcome.history.fi()[best]);
        assert_eq!(outcome.best_point, outcome.history.xi()[best]);
        assert!(outcome.best_value < 0.08);
    }

    #[tokio::test]
    async fn never_submits_a_recorded_point_again() {
        let objective = FnObjective::new(|x| (x[0] - 0.3).powi(2) + (x[1] - 0.7).powi(2));
        let space = unit_square();
        let case = Case::new("bowl", space.clone(), Arc::new(objective)).unwrap();
        let opts = RunOptions::new("coordinate").with_max_iter(8);
        let pool = EvaluationPool::new(2).unwrap();
        let design = InitialDesign::new(vec![vec![0.9, 0.1]]);

        let outcome = CoordinateSearch::default()
            .optimize(&case, &opts, &pool, design)
            .await
            .unwrap();

        let xi = outcome.history.xi();
        for (i, x) in xi.iter().enumerate() {
            for earlier in &xi[..i] {
                let same = x.iter().zip(earlier).all(|(a, b)| (a - b).abs() <= 1e-12);
                assert!(!same, "{x:?} evaluated twice");
            }
        }
        assert_eq!(pool.submitted() as usize, xi.len());
        assert!(outcome.best_value < 0.72);
    }

    #[tokio::test]
    async fn known_design_values_skip_evaluation() {
        let objective = FnObjective::new(|x| x[0] + x[1]);
        let case = Case::new("plane", unit_square(), Arc::new(objective)).unwrap();
        let opts = RunOptions::new("coordinate").with_max_iter(1);
        let pool = EvaluationPool::new(1).unwrap();
        let design =
            InitialDesign::with_values(vec![vec![0.5, 0.5], vec![0.2, 0.9]], vec![1.0, 1.1]).unwrap();

        let outcome = CoordinateSearch::default()
            .optimize(&case, &opts, &pool, design)
            .await
            .unwrap();

        // Only the four neighbors around (0.5, 0.5) went through the pool.
        assert_eq!(pool.submitted(), 4);
        assert_eq!(outcome.history.len(), 6);
        assert_eq!(outcome.best_point, vec![0.25, 0.5]);
    }

    #[tokio::test]
    async fn stops_once_steps_are_tiny() {
        let case = Case::new("flat", unit_square(), Arc::new(FnObjective::new(|_| 1.0))).unwrap();
        let opts = RunOptions::new("coordinate").with_max_iter(1000);
        let pool = EvaluationPool::new(2).unwrap();
        let design = InitialDesign::new(vec![vec![0.5, 0.5]]);

        let outcome = CoordinateSearch::new(0.25, 0.01)
            .optimize(&case, &opts, &pool, design)
            .await
            .unwrap();

        // 0.25 halves below 0.01 after five failures.
        assert_eq!(outcome.iterations, 5);
        assert_eq!(outcome.best_point, vec![0.5, 0.5]);
    }
}
