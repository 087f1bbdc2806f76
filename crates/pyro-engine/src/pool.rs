//! Fixed-size evaluation pool.
//!
//! `num_jobs` worker tasks pull jobs from one shared queue. Each submission
//! returns an [`EvaluationHandle`], a future that resolves to the
//! [`EvaluationResult`] of exactly that candidate. Completion order is not
//! submission order; callers correlate through the handle, never by position.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pyro_types::{CandidateVector, EvaluationError, EvaluationId, EvaluationResult, PyroError, PyroResult};

use crate::objective::{panic_message, Objective};

/// Pool sizing and limits.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub num_jobs: usize,
    /// Wall clock limit per evaluation.
    pub eval_timeout: Option<Duration>,
}

impl PoolConfig {
    pub fn new(num_jobs: usize) -> Self {
        Self {
            num_jobs,
            eval_timeout: None,
        }
    }

    /// Limit each evaluation to `timeout`.
    ///
    /// The limit frees the worker, which then moves on to the next job. A
    /// simulator process is killed when its evaluation is dropped, but a
    /// [`FnObjective`](crate::FnObjective) closure cannot be stopped: it keeps
    /// running on the blocking thread pool until it returns. With closure
    /// objectives, more than `num_jobs` closures may then run at once, and
    /// [`EvaluationPool::shutdown`] does not wait for them.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.eval_timeout = Some(timeout);
        self
    }
}

struct Job {
    id: EvaluationId,
    candidate: CandidateVector,
    objective: Arc<dyn Objective>,
    reply: oneshot::Sender<EvaluationResult>,
}

type JobQueue = Arc<Mutex<mpsc::UnboundedReceiver<Job>>>;

/// Every result a worker produced, in completion order.
type Journal = Arc<Mutex<Vec<EvaluationResult>>>;

/// Parallel evaluation pool.
pub struct EvaluationPool {
    config: PoolConfig,
    queue: Option<mpsc::UnboundedSender<Job>>,
    workers: Vec<JoinHandle<()>>,
    next_id: AtomicU64,
    journal: Journal,
}

impl EvaluationPool {
    /// Start a pool with `num_jobs` workers. Must be called inside a tokio
    /// runtime.
    pub fn new(num_jobs: usize) -> PyroResult<Self> {
        Self::start(PoolConfig::new(num_jobs))
    }

    pub fn start(config: PoolConfig) -> PyroResult<Self> {
        if config.num_jobs == 0 {
            return Err(PyroError::Pool("pool needs at least one worker".to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PyroError::Pool(format!("cannot start workers outside a runtime: {e}")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let jobs: JobQueue = Arc::new(Mutex::new(rx));
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));

        let workers = (0..config.num_jobs)
            .map(|worker| {
                runtime.spawn(worker_loop(
                    worker,
                    Arc::clone(&jobs),
                    Arc::clone(&journal),
                    config.eval_timeout,
                ))
            })
            .collect();

        info!("Started evaluation pool with {} workers", config.num_jobs);

        Ok(Self {
            config,
            queue: Some(tx),
            workers,
            next_id: AtomicU64::new(0),
            journal,
        })
    }

    pub fn num_jobs(&self) -> usize {
        self.config.num_jobs
    }

    pub fn is_running(&self) -> bool {
        self.queue.is_some()
    }

    /// Number of evaluations submitted so far.
    pub fn submitted(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    /// Results of every evaluation the workers finished, in completion order,
    /// whether or not the submitter collected them. Still readable after
    /// [`shutdown`](Self::shutdown).
    pub async fn completed(&self) -> Vec<EvaluationResult> {
        self.journal.lock().await.clone()
    }

    /// Queue one candidate for evaluation.
    ///
    /// After [`shutdown`](Self::shutdown) the handle resolves immediately to
    /// [`EvaluationError::WorkerLost`].
    pub fn submit(&self, candidate: CandidateVector, objective: Arc<dyn Objective>) -> EvaluationHandle {
        let id = EvaluationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (reply, rx) = oneshot::channel();

        let handle = EvaluationHandle {
            id,
            candidate: candidate.clone(),
            rx,
        };

        let job = Job {
            id,
            candidate,
            objective,
            reply,
        };
        match &self.queue {
            Some(queue) => {
                if queue.send(job).is_err() {
                    warn!(%id, "evaluation queue closed; dropping submission");
                }
            }
            None => warn!(%id, "submission after pool shutdown"),
        }

        handle
    }

    /// Queue a batch. Handles come back in submission order.
    pub fn map<I>(&self, candidates: I, objective: Arc<dyn Objective>) -> Vec<EvaluationHandle>
    where
        I: IntoIterator<Item = CandidateVector>,
    {
        candidates
            .into_iter()
            .map(|candidate| self.submit(candidate, Arc::clone(&objective)))
            .collect()
    }

    /// Stop accepting work and terminate every worker. In-flight evaluations
    /// are abandoned; simulator processes are killed with their futures.
    pub async fn shutdown(&mut self) {
        if self.queue.take().is_none() && self.workers.is_empty() {
            return;
        }
        for worker in &self.workers {
            worker.abort();
        }
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.await {
                if !e.is_cancelled() {
                    warn!("evaluation worker ended abnormally: {e}");
                }
            }
        }
        info!("Evaluation pool shut down after {} submissions", self.submitted());
    }
}

impl Drop for EvaluationPool {
    fn drop(&mut self) {
        self.queue.take();
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn worker_loop(worker: usize, jobs: JobQueue, journal: Journal, timeout: Option<Duration>) {
    loop {
        let job = {
            let mut rx = jobs.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            debug!(worker, "evaluation queue closed");
            break;
        };

        debug!(worker, id = %job.id, "evaluating candidate");
        let result = run_job(job.id, job.candidate, job.objective.as_ref(), timeout).await;
        if let Some(error) = &result.error {
            warn!(worker, id = %job.id, "evaluation failed: {error}");
        }
        journal.lock().await.push(result.clone());
        // The submitter may have stopped waiting.
        let _ = job.reply.send(result);
    }
}

async fn run_job(
    id: EvaluationId,
    candidate: CandidateVector,
    objective: &dyn Objective,
    timeout: Option<Duration>,
) -> EvaluationResult {
    let call = AssertUnwindSafe(objective.evaluate(id, &candidate)).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let seconds = limit.as_secs_f64().ceil() as u64;
                return EvaluationResult::failure(id, candidate, EvaluationError::Timeout { seconds });
            }
        },
        None => call.await,
    };

    match outcome {
        Ok(Ok(value)) if value.is_nan() => EvaluationResult::failure(
            id,
            candidate,
            EvaluationError::InvalidOutput {
                output: "NaN".to_string(),
            },
        ),
        Ok(Ok(value)) => EvaluationResult::success(id, candidate, value),
        Ok(Err(error)) => EvaluationResult::failure(id, candidate, error),
        Err(payload) => EvaluationResult::failure(
            id,
            candidate,
            EvaluationError::Crashed {
                message: panic_message(&*payload),
            },
        ),
    }
}

/// Pending result of one submitted candidate.
pub struct EvaluationHandle {
    id: EvaluationId,
    candidate: CandidateVector,
    rx: oneshot::Receiver<EvaluationResult>,
}

impl EvaluationHandle {
    pub fn id(&self) -> EvaluationId {
        self.id
    }

    pub fn candidate(&self) -> &[f64] {
        &self.candidate
    }
}

impl Future for EvaluationHandle {
    type Output = EvaluationResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(EvaluationResult::failure(
                this.id,
                this.candidate.clone(),
                EvaluationError::WorkerLost,
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for EvaluationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationHandle")
            .field("id", &self.id)
            .field("candidate", &self.candidate)
            .finish()
    }
}
