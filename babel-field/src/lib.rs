//! Acoustic field post-processing.
//!
//! Given the full (skull) and water-only result bundles of a run, this
//! crate computes:
//! - intensity volumes and their foci
//! - the energy through the focal plane and the skull correction factor
//! - normalized cross-sections through the target for display
//!
//! Element-wise work runs on the rayon pool. Reductions are sequential, so
//! repeated calls on the same input give bit-identical results.

mod error;
pub mod intensity;
pub mod material;
pub mod postprocess;
pub mod section;
pub mod targeting;

pub use error::{Error, Result};
pub use material::{remap_material_code, remap_material_map, SKULL_BONE_CODE};
pub use postprocess::{FieldPostprocessor, FieldSummary, FieldView, FocalEnergy, PostprocessedField};
pub use section::{CrossSection, SectionPlane, INTENSITY_CONTOUR_LEVELS};
pub use targeting::{distance_from_skin, SkinDistance, TARGET_LABEL};
