//! Parameter importance from an extremely randomized regression forest.
//!
//! Each tree is grown on the full history. At every node one random cut is
//! drawn per non-constant parameter, and the cut with the largest variance
//! reduction is kept. A parameter's importance is the total reduction it is
//! responsible for, normalized per tree and averaged over the forest.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::debug;

use pyro_types::{CandidateVector, ImportanceReport, OptimizationHistory, PyroError, PyroResult};

pub const DEFAULT_NUM_TREES: usize = 100;

#[derive(Debug, Clone)]
pub struct ImportanceAnalyzer {
    num_trees: usize,
    min_samples_split: usize,
    seed: u64,
}

impl ImportanceAnalyzer {
    pub fn new(num_trees: usize) -> Self {
        Self {
            num_trees: num_trees.max(1),
            min_samples_split: 2,
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n.max(2);
        self
    }

    /// Rank `names` by their influence on the objective values in `history`.
    ///
    /// Failed and non-finite evaluations are ignored. At least two distinct
    /// points must remain.
    pub fn rank(&self, history: &OptimizationHistory, names: &[String]) -> PyroResult<ImportanceReport> {
        let (xs, ys): (Vec<&CandidateVector>, Vec<f64>) = history
            .xi()
            .iter()
            .zip(history.fi())
            .filter(|(_, f)| f.is_finite())
            .map(|(x, &f)| (x, f))
            .unzip();

        let distinct = count_distinct(&xs);
        if distinct < 2 {
            return Err(PyroError::InsufficientData {
                required: 2,
                available: distinct,
            });
        }

        let ndim = names.len();
        let per_tree: Vec<Vec<f64>> = (0..self.num_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(t as u64));
                let mut scores = self.grow_tree(&xs, &ys, ndim, &mut rng);
                normalize(&mut scores);
                scores
            })
            .collect();

        let mut scores = vec![0.0; ndim];
        for tree in &per_tree {
            for (total, s) in scores.iter_mut().zip(tree) {
                *total += s;
            }
        }
        if !normalize(&mut scores) {
            // Nothing could be explained: no parameter is singled out.
            scores = vec![1.0 / ndim as f64; ndim];
        }
        debug!(trees = self.num_trees, samples = ys.len(), "importance forest fitted");

        Ok(ImportanceReport::from_scores(names, &scores))
    }

    /// Unnormalized impurity decrease per feature for one tree.
    fn grow_tree(&self, xs: &[&CandidateVector], ys: &[f64], ndim: usize, rng: &mut ChaCha8Rng) -> Vec<f64> {
        let mut importance = vec![0.0; ndim];
        let mut stack: Vec<Vec<usize>> = vec![(0..ys.len()).collect()];

        while let Some(node) = stack.pop() {
            if node.len() < self.min_samples_split {
                continue;
            }
            let impurity = variance(ys, &node);
            if impurity <= 0.0 {
                continue;
            }

            let mut best: Option<(f64, usize, Vec<usize>, Vec<usize>)> = None;
            for j in 0..ndim {
                let (lo, hi) = node.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    (lo.min(xs[i][j]), hi.max(xs[i][j]))
                });
                if hi <= lo {
                    continue;
                }
                let threshold = rng.gen_range(lo..hi);
                let (left, right): (Vec<usize>, Vec<usize>) =
                    node.iter().partition(|&&i| xs[i][j] <= threshold);

                let n = node.len() as f64;
                let decrease = n * impurity
                    - left.len() as f64 * variance(ys, &left)
                    - right.len() as f64 * variance(ys, &right);
                if best.as_ref().map_or(true, |(d, ..)| decrease > *d) {
                    best = Some((decrease, j, left, right));
                }
            }

            if let Some((decrease, j, left, right)) = best {
                importance[j] += decrease.max(0.0);
                stack.push(left);
                stack.push(right);
            }
        }
        importance
    }
}

impl Default for ImportanceAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_TREES)
    }
}

fn variance(ys: &[f64], idx: &[usize]) -> f64 {
    if idx.is_empty() {
        return 0.0;
    }
    let n = idx.len() as f64;
    let mean = idx.iter().map(|&i| ys[i]).sum::<f64>() / n;
    idx.iter().map(|&i| (ys[i] - mean).powi(2)).sum::<f64>() / n
}

/// Scale to unit sum in place. Returns false when there is nothing to scale.
fn normalize(scores: &mut [f64]) -> bool {
    let total: f64 = scores.iter().sum();
    if total > 0.0 && total.is_finite() {
        scores.iter_mut().for_each(|s| *s /= total);
        true
    } else {
        false
    }
}

fn count_distinct(xs: &[&CandidateVector]) -> usize {
    let mut seen: Vec<&CandidateVector> = Vec::new();
    for &x in xs {
        if !seen.contains(&x) {
            seen.push(x);
        }
    }
    seen.len()
}
