//! Material code handling.
//!
//! The solver distinguishes more tissue subtypes than the display does.
//! Solver codes are collapsed into display categories 0..=3:
//!
//! | solver | display |
//! |--------|---------|
//! | 0      | 0       |
//! | 1      | 1       |
//! | 2, 3   | 2       |
//! | 4      | 3       |

use ndarray::Array3;

/// Display code of skull bone, after remapping.
pub const SKULL_BONE_CODE: u8 = 3;

/// Row of the full bundle's material table used for skull intensity.
pub const SKULL_MATERIAL_ROW: usize = 4;

/// Row of the water bundle's material table (homogeneous medium).
pub const WATER_MATERIAL_ROW: usize = 0;

/// Map one solver material code to its display category.
///
/// Codes outside `0..=4` pass through unchanged.
#[inline]
#[must_use]
pub fn remap_material_code(code: u8) -> u8 {
    match code {
        3 => 2,
        4 => 3,
        other => other,
    }
}

/// Remap a material volume in place.
pub fn remap_material_map(map: &mut Array3<u8>) {
    map.mapv_inplace(remap_material_code);
}
