//! # pyro-engine
//!
//! Evaluation side of a pyro run: the [`Objective`] seam, the [`Case`] that
//! owns it, and the [`EvaluationPool`] that runs evaluations on a fixed set of
//! workers and hands back one [`EvaluationHandle`] per submitted candidate.

pub mod case;
pub mod objective;
pub mod pool;

pub use case::Case;
pub use objective::{FnObjective, Objective, SimulatorObjective};
pub use pool::{EvaluationHandle, EvaluationPool, PoolConfig};
