//! # pyro-cli
//!
//! Run orchestration for pyro: the [`Driver`] that wires sampling, the
//! evaluation pool, the selected strategy and importance ranking into one
//! run, plus the setup helpers the `pyro` binary uses.

pub mod driver;
pub mod setup;

pub use driver::{Driver, RunReport};
pub use setup::{case_from_config, init_tracing, save_partial_history};
