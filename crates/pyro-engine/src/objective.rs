//! Black-box objective functions.
//!
//! Objectives are immutable once built: every worker of the pool calls the same
//! `Arc<dyn Objective>` through `&self`, and any per-evaluation state lives in
//! the evaluation itself (for [`SimulatorObjective`], in its own OS process).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use pyro_types::{EvaluationError, EvaluationId};

/// A black-box function of one candidate vector.
#[async_trait]
pub trait Objective: Send + Sync {
    /// Evaluate `candidate`. `id` identifies the evaluation for logging and
    /// work-directory naming.
    async fn evaluate(&self, id: EvaluationId, candidate: &[f64]) -> Result<f64, EvaluationError>;

    /// Short description for logs.
    fn describe(&self) -> String {
        "objective".to_string()
    }
}

type ObjectiveFn = dyn Fn(&[f64]) -> Result<f64, String> + Send + Sync;

/// Synchronous closure objective, run on the blocking thread pool.
///
/// A panic inside the closure is reported as [`EvaluationError::Crashed`].
#[derive(Clone)]
pub struct FnObjective {
    func: Arc<ObjectiveFn>,
}

impl FnObjective {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(move |x: &[f64]| Ok(func(x))),
        }
    }

    /// Closure that may report a failure message.
    pub fn fallible<F>(func: F) -> Self
    where
        F: Fn(&[f64]) -> Result<f64, String> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl Objective for FnObjective {
    async fn evaluate(&self, _id: EvaluationId, candidate: &[f64]) -> Result<f64, EvaluationError> {
        let func = Arc::clone(&self.func);
        let x = candidate.to_vec();
        match tokio::task::spawn_blocking(move || func(&x)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(EvaluationError::Failed { message }),
            Err(e) if e.is_panic() => Err(EvaluationError::Crashed {
                message: panic_message(&*e.into_panic()),
            }),
            Err(_) => Err(EvaluationError::WorkerLost),
        }
    }

    fn describe(&self) -> String {
        "closure".to_string()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Runs an external simulator, one OS process per evaluation.
///
/// The candidate is written to the child's stdin as
/// `{"id": <n>, "parameters": {"<name>": <value>, ...}}`; the last non-empty
/// line of stdout must hold the objective value. The evaluation id is also
/// exported as `PYRO_EVAL_ID`.
#[derive(Debug, Clone)]
pub struct SimulatorObjective {
    program: PathBuf,
    args: Vec<String>,
    work_dir: Option<PathBuf>,
    param_names: Vec<String>,
}

impl SimulatorObjective {
    pub fn new(program: impl Into<PathBuf>, param_names: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: None,
            param_names,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Run every evaluation inside `<work_dir>/eval-<id>`.
    ///
    /// Relative program paths such as `./run.sh` are resolved against the
    /// current directory first, since the child starts elsewhere.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        if self.program.is_relative() && self.program.components().count() > 1 {
            self.program = std::env::current_dir()?.join(&self.program);
        }
        self.work_dir = Some(work_dir.into());
        Ok(self)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn payload(&self, id: EvaluationId, candidate: &[f64]) -> String {
        let parameters: serde_json::Map<String, serde_json::Value> = self
            .param_names
            .iter()
            .zip(candidate)
            .map(|(name, &value)| (name.clone(), serde_json::json!(value)))
            .collect();
        let mut text = serde_json::json!({ "id": id.0, "parameters": parameters }).to_string();
        text.push('\n');
        text
    }
}

#[async_trait]
impl Objective for SimulatorObjective {
    async fn evaluate(&self, id: EvaluationId, candidate: &[f64]) -> Result<f64, EvaluationError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("PYRO_EVAL_ID", id.0.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(work_dir) = &self.work_dir {
            let eval_dir = work_dir.join(id.to_string());
            tokio::fs::create_dir_all(&eval_dir)
                .await
                .map_err(|e| EvaluationError::Failed {
                    message: format!("cannot create {}: {e}", eval_dir.display()),
                })?;
            cmd.current_dir(eval_dir);
        }

        let mut child = cmd.spawn().map_err(|e| EvaluationError::Failed {
            message: format!("failed to launch {}: {e}", self.program.display()),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = self.payload(id, candidate);
            // A simulator that ignores its input may exit before reading it.
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(EvaluationError::Failed {
                        message: format!("failed to send candidate: {e}"),
                    });
                }
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| EvaluationError::Crashed {
                message: format!("lost simulator process: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or("").trim().to_string();
            return Err(match output.status.code() {
                Some(code) => EvaluationError::Failed {
                    message: format!("exit status {code}: {tail}"),
                },
                None => EvaluationError::Crashed {
                    message: format!("simulator terminated by signal: {}", output.status),
                },
            });
        }

        parse_objective(&String::from_utf8_lossy(&output.stdout))
    }

    fn describe(&self) -> String {
        format!("simulator {}", self.program.display())
    }
}

fn parse_objective(stdout: &str) -> Result<f64, EvaluationError> {
    let last = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("");
    last.parse::<f64>()
        .map_err(|_| EvaluationError::InvalidOutput {
            output: last.chars().take(200).collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> SimulatorObjective {
        SimulatorObjective::new("sh", vec!["a".into(), "b".into()])
            .with_args(vec!["-c".into(), script.into()])
    }

    #[test]
    fn parse_uses_last_non_empty_line() {
        assert_eq!(parse_objective("starting\n\n0.125\n  \n"), Ok(0.125));
        assert!(matches!(
            parse_objective("done\n"),
            Err(EvaluationError::InvalidOutput { .. })
        ));
        assert!(matches!(parse_objective(""), Err(EvaluationError::InvalidOutput { .. })));
    }

    #[test]
    fn payload_names_every_parameter() {
        let objective = sh("true");
        let payload = objective.payload(EvaluationId(3), &[0.5, 2.0]);
        let json: serde_json::Value = serde_json::from_str(payload.trim()).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["parameters"]["a"], 0.5);
        assert_eq!(json["parameters"]["b"], 2.0);
    }

    #[tokio::test]
    async fn closure_objective_evaluates() {
        let objective = FnObjective::new(|x| x.iter().sum());
        assert_eq!(objective.evaluate(EvaluationId(0), &[1.0, 2.5]).await, Ok(3.5));
    }

    #[tokio::test]
    async fn closure_failure_and_panic_are_reported() {
        let failing = FnObjective::fallible(|_| Err("diverged".to_string()));
        assert_eq!(
            failing.evaluate(EvaluationId(0), &[0.0]).await,
            Err(EvaluationError::Failed {
                message: "diverged".into()
            })
        );

        let panicking = FnObjective::new(|_| panic!("model blew up"));
        match panicking.evaluate(EvaluationId(1), &[0.0]).await {
            Err(EvaluationError::Crashed { message }) => assert!(message.contains("model blew up")),
            other => panic!("expected crash, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn simulator_reads_value_from_stdout() {
        let objective = sh("cat > /dev/null; echo progress; echo 4.25");
        assert_eq!(objective.evaluate(EvaluationId(0), &[0.1, 0.2]).await, Ok(4.25));
    }

    #[tokio::test]
    async fn simulator_runs_in_its_own_work_dir() {
        let dir = TempDir::new().unwrap();
        let objective = sh("cat > input.json; echo $PYRO_EVAL_ID")
            .with_work_dir(dir.path())
            .unwrap();

        let value = objective.evaluate(EvaluationId(7), &[0.1, 0.2]).await.unwrap();
        assert_eq!(value, 7.0);

        let written = std::fs::read_to_string(dir.path().join("eval-7").join("input.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(json["parameters"]["b"], 0.2);
    }

    #[tokio::test]
    async fn simulator_exit_status_is_failure() {
        let objective = sh("echo 'mesh error' >&2; exit 3");
        match objective.evaluate(EvaluationId(0), &[0.0, 0.0]).await {
            Err(EvaluationError::Failed { message }) => {
                assert!(message.contains("exit status 3"));
                assert!(message.contains("mesh error"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn simulator_killed_by_signal_is_crash() {
        let objective = sh("kill -9 $$");
        assert!(matches!(
            objective.evaluate(EvaluationId(0), &[0.0, 0.0]).await,
            Err(EvaluationError::Crashed { .. })
        ));
    }

    #[tokio::test]
    async fn simulator_garbage_output_is_invalid() {
        let objective = sh("echo NOT_A_NUMBER");
        assert!(matches!(
            objective.evaluate(EvaluationId(0), &[0.0, 0.0]).await,
            Err(EvaluationError::InvalidOutput { .. })
        ));
    }

    #[tokio::test]
    async fn missing_program_is_failure() {
        let objective = SimulatorObjective::new("/nonexistent/pyro-simulator", vec![]);
        assert!(matches!(
            objective.evaluate(EvaluationId(0), &[]).await,
            Err(EvaluationError::Failed { .. })
        ));
    }
}
