//! # pyro-data
//!
//! File formats around an optimization run: the CSV initial-design table used
//! to resume from recorded (point, value) pairs, and the JSON run
//! configuration.

pub mod config;
pub mod design;

pub use config::{CaseConfig, RunConfig, SimulatorConfig};
pub use design::{write_design, write_history, DesignLoader};
