//! Post-processing error types.

use thiserror::Error;

/// Result type for post-processing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Post-processing error types.
#[derive(Error, Debug)]
pub enum Error {
    /// No voxel carries the bone code, so the skull focus is undefined.
    #[error("no voxel with material code {code}: cannot locate the focus")]
    NoFocusRegion { code: u8 },

    /// Bundle cannot be post-processed.
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),

    /// Planning mask has no voxel with the target label.
    #[error("planning mask has no voxel labelled {0}")]
    NoTargetLabel(u8),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] babel_core::Error),
}
