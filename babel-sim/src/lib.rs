//! babel-sim: solver supervision and run orchestration.
//!
//! The acoustic solver is an external process. [`SimulationWorker`] starts
//! it and streams its output; [`SimulationOrchestrator`] decides whether a
//! run is needed at all, supervises it and loads the resulting bundles.
//!
//! A line of solver output containing [`babel_core::ERROR_SENTINEL`] marks
//! the whole run as failed, regardless of the process exit status.

mod error;
pub mod message;
pub mod orchestrator;
pub mod solver;
pub mod worker;

pub use error::{Error, Result};
pub use message::RunMessage;
pub use orchestrator::{
    BundlePair, RunObserver, RunOutcome, RunTask, SimulationOrchestrator, DEFAULT_POLL_INTERVAL,
};
pub use solver::{solver_arguments, SolverCommand};
pub use worker::{JoinReport, RunHandle, SimulationWorker, WorkerOutcome};
