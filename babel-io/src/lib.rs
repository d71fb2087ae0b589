//! babel-io: Result bundle storage for BabelBrain simulations.
//!
//! Result bundles live next to the subject data as HDF5 files whose names
//! are derived from the run configuration, so a file on disk is the cache
//! entry. Reading and writing the files requires the `hdf5` feature; path
//! derivation and cache detection do not.

mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod store;

pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use crate::hdf5::{read_bundle_hdf5, write_bundle_hdf5};
pub use store::{path_for, ResultStore};
