//! babel-core: Core types for transcranial ultrasound simulation planning.
//!
//! This crate holds the data model shared by the result store, the field
//! post-processor and the simulation orchestrator: run configuration
//! snapshots, result bundles, solver progress events and transducer
//! profile documents.

pub mod bundle;
pub mod config;
pub mod error;
pub mod profile;
pub mod progress;

pub use bundle::{check_voxel, BundleVariant, CachedRunSummary, MaterialTable, ResultBundle};
pub use config::{
    ComputeDevice, ComputingBackend, MechanicalAdjustment, SimulationConfig, TransducerGeometry,
};
pub use error::{Error, Result};
pub use profile::{ProfileConfig, TransducerProfile};
pub use progress::{classify_line, ProgressEvent, ProgressKind, ERROR_SENTINEL};
