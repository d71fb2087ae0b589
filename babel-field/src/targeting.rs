//! Skin-to-target distance from a planning mask.
//!
//! Presenters that work from the planning mask call [`distance_from_skin`]
//! to get the `distance_to_target_mm` passed to
//! [`FieldPostprocessor::process`](crate::FieldPostprocessor::process),
//! which places the target on the depth axis of the cross-sections. The CLI
//! takes that distance directly (`--distance-mm`).

use ndarray::{ArrayView3, Axis};

use crate::{Error, Result};

/// Mask label of the planned target voxel.
pub const TARGET_LABEL: u8 = 5;

/// Skin entry and target along the depth line of sight.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SkinDistance {
    pub target_voxel: [usize; 3],
    /// Depth index of the first non-zero voxel above the target.
    pub skin_z: usize,
    pub distance_mm: f64,
}

/// Locate the target label and measure its depth below the skin.
///
/// The target is the first voxel (C order) labelled [`TARGET_LABEL`]. The
/// skin is the first non-zero voxel on the depth line through it.
///
/// # Errors
/// Returns `NoTargetLabel` if the mask has no target voxel.
pub fn distance_from_skin(mask: ArrayView3<u8>, voxel_size_mm: f64) -> Result<SkinDistance> {
    let (i, j, k) = mask
        .indexed_iter()
        .find_map(|(index, &label)| (label == TARGET_LABEL).then_some(index))
        .ok_or(Error::NoTargetLabel(TARGET_LABEL))?;

    let line = mask.index_axis(Axis(0), i);
    let line = line.index_axis(Axis(0), j);
    // The target itself is non-zero, so a skin voxel always exists at or above it.
    let skin_z = line.iter().position(|&label| label > 0).unwrap_or(k);

    #[allow(clippy::cast_precision_loss)]
    let distance_mm = (k - skin_z) as f64 * voxel_size_mm;
    log::debug!("target at [{i}, {j}, {k}], skin at z={skin_z}, distance {distance_mm:.2} mm");

    Ok(SkinDistance {
        target_voxel: [i, j, k],
        skin_z,
        distance_mm,
    })
}
