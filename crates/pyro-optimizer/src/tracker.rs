//! Bookkeeping shared by every search strategy.
//!
//! [`SearchTracker`] owns the [`OptimizationHistory`] for one run. It seeds it
//! from the initial design, pushes batches through the evaluation pool, folds
//! results back in the order they complete, applies the run's
//! [`FailurePolicy`], and keeps the incumbent best point.

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use pyro_engine::{Case, EvaluationPool};
use pyro_types::{
    CandidateVector, EvaluationResult, FailurePolicy, InitialDesign, OptimizationHistory,
    OptimizationOutcome, PyroError, PyroResult, RunOptions,
};

/// Points closer than this fraction of every parameter range count as equal.
pub const POINT_TOLERANCE: f64 = 1e-12;

pub struct SearchTracker<'a> {
    case: &'a Case,
    pool: &'a EvaluationPool,
    policy: FailurePolicy,
    history: OptimizationHistory,
    best: Option<(CandidateVector, f64)>,
    best_trace: Vec<f64>,
    iterations: usize,
}

impl<'a> SearchTracker<'a> {
    pub fn new(case: &'a Case, opts: &RunOptions, pool: &'a EvaluationPool) -> Self {
        Self {
            case,
            pool,
            policy: opts.on_failure,
            history: OptimizationHistory::new(),
            best: None,
            best_trace: Vec::new(),
            iterations: 0,
        }
    }

    /// Record the known rows of `design` and evaluate the rest.
    pub async fn seed(&mut self, design: InitialDesign) -> PyroResult<()> {
        let known = design.num_known();
        let mut pending = Vec::with_capacity(design.len() - known);

        for (i, point) in design.points().iter().enumerate() {
            match design.known_value(i) {
                Some(value) => self.record(EvaluationResult::known(point.clone(), value))?,
                None => pending.push(point.clone()),
            }
        }

        info!(
            "Initial design: {} points, {} known, {} to evaluate",
            design.len(),
            known,
            pending.len()
        );
        self.evaluate_batch(pending).await?;
        self.best_trace.push(self.best_value());
        Ok(())
    }

    /// Submit `candidates` and wait for all of them. Results are recorded and
    /// returned in completion order.
    pub async fn evaluate_batch(
        &mut self,
        candidates: Vec<CandidateVector>,
    ) -> PyroResult<Vec<EvaluationResult>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let handles = self.pool.map(candidates, self.case.objective());
        let mut pending: FuturesUnordered<_> = handles.into_iter().collect();
        let mut results = Vec::with_capacity(pending.len());

        while let Some(result) = pending.next().await {
            self.record(result.clone())?;
            results.push(result);
        }
        Ok(results)
    }

    /// Close an iteration of proposals.
    pub fn finish_iteration(&mut self) {
        self.iterations += 1;
        let best = self.best_value();
        self.best_trace.push(best);
        info!("Iteration {}: best value {:.6e}", self.iterations, best);
    }

    fn record(&mut self, result: EvaluationResult) -> PyroResult<()> {
        let failure = result.error.clone();
        let improves = match &self.best {
            None => true,
            Some((_, best)) => result.value < *best,
        };
        if improves {
            debug!(value = result.value, "new incumbent");
            self.best = Some((result.candidate.clone(), result.value));
        }
        self.history.record(result);

        if let Some(error) = failure {
            match self.policy {
                FailurePolicy::Penalize => {
                    warn!("Evaluation failed, recorded as +inf: {error}");
                }
                FailurePolicy::Abort => return Err(PyroError::Evaluation(error)),
            }
        }
        Ok(())
    }

    pub fn case(&self) -> &Case {
        self.case
    }

    /// Incumbent best point and value.
    pub fn best(&self) -> Option<(&[f64], f64)> {
        self.best.as_ref().map(|(x, f)| (x.as_slice(), *f))
    }

    /// Incumbent best value, `+inf` before anything was recorded.
    pub fn best_value(&self) -> f64 {
        self.best.as_ref().map(|(_, f)| *f).unwrap_or(f64::INFINITY)
    }

    /// Whether `candidate` is already in the history, up to
    /// [`POINT_TOLERANCE`] of each parameter range.
    pub fn already_evaluated(&self, candidate: &[f64]) -> bool {
        let params = self.case.params.parameters();
        self.history.xi().iter().any(|x| {
            x.iter()
                .zip(candidate)
                .zip(params)
                .all(|((a, b), p)| (a - b).abs() <= POINT_TOLERANCE * p.span())
        })
    }

    pub fn history(&self) -> &OptimizationHistory {
        &self.history
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn into_outcome(self) -> PyroResult<OptimizationOutcome> {
        OptimizationOutcome::from_history(self.history, self.best_trace, self.iterations)
    }
}
