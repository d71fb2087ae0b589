//! Error types for babel-sim.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for run operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Run error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The solver process could not be started.
    #[error("failed to start solver {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// I/O error while supervising the solver.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A supervising thread panicked.
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),

    /// Configuration rejected before start.
    #[error("configuration error: {0}")]
    Config(#[from] babel_core::Error),

    /// Result store error, including missing or unreadable bundles.
    #[error("store error: {0}")]
    Store(#[from] babel_io::Error),
}
