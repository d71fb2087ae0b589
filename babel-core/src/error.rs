//! Error types for babel-core.

use thiserror::Error;

/// Result type alias for babel-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid simulation configuration.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Transducer profile document could not be parsed.
    #[error("profile error: {0}")]
    ProfileError(#[from] serde_json::Error),

    /// I/O error while reading a profile document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown transducer model requested from a profile document.
    #[error("unknown transducer model: {0}")]
    UnknownModel(String),

    /// Array extents disagree between two datasets of one bundle.
    #[error("shape mismatch: {what} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        found: Vec<usize>,
        expected: Vec<usize>,
    },

    /// Voxel index outside the volume.
    #[error("voxel {index:?} outside volume of shape {shape:?}")]
    VoxelOutOfBounds { index: [usize; 3], shape: [usize; 3] },

    /// Bundle contents violate an invariant.
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),
}
