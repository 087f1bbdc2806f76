//! Process-level setup for the `pyro` binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pyro_data::{write_history, RunConfig};
use pyro_engine::{Case, SimulatorObjective};
use pyro_types::{PyroError, PyroResult};

/// Install the global subscriber. `RUST_LOG` wins; otherwise the `-v` count
/// picks the level.
pub fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .try_init();
}

/// Build the simulator-backed case a configuration file describes.
pub fn case_from_config(config: &RunConfig) -> PyroResult<Case> {
    let space = config.space()?;
    let sim = &config.case.simulator;

    let mut objective = SimulatorObjective::new(&sim.program, space.names()).with_args(sim.args.clone());
    if let Some(work_dir) = &sim.work_dir {
        objective = objective.with_work_dir(work_dir)?;
    }

    Case::new(config.case.name.clone(), space, Arc::new(objective))
}

/// Write whatever a stopped run managed to evaluate to `history.csv` in
/// `output_dir`. Returns the path written, or `None` when the error carries
/// no evaluations.
pub fn save_partial_history(
    output_dir: &Path,
    param_names: &[String],
    err: &PyroError,
) -> PyroResult<Option<PathBuf>> {
    let Some(history) = err.partial_history().filter(|h| !h.is_empty()) else {
        return Ok(None);
    };
    let path = output_dir.join("history.csv");
    write_history(&path, param_names, history)?;
    warn!("Run did not finish; {} evaluations saved to {}", history.len(), path.display());
    Ok(Some(path))
}
