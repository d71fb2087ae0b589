//! Cross-sections through the target.

use ndarray::{Array2, Array3, Axis};

/// Contour levels drawn over normalized intensity sections (0.1 to 1.0).
pub const INTENSITY_CONTOUR_LEVELS: [f64; 10] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

/// Orientation of a cross-section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SectionPlane {
    /// y fixed at the target; horizontal axis is x.
    Xz,
    /// x fixed at the target; horizontal axis is y.
    Yz,
}

impl SectionPlane {
    /// Both planes.
    pub const ALL: [Self; 2] = [Self::Xz, Self::Yz];
}

impl std::fmt::Display for SectionPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xz => write!(f, "XZ"),
            Self::Yz => write!(f, "YZ"),
        }
    }
}

/// A 2-D slice of intensity and material, ready for display.
///
/// Both grids are indexed `[depth, horizontal]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSection {
    pub plane: SectionPlane,
    /// Horizontal coordinates in mm.
    pub horizontal_mm: Vec<f64>,
    /// Depth coordinates in mm, measured so the target sits at the skin
    /// distance.
    pub depth_mm: Vec<f64>,
    pub intensity: Array2<f64>,
    pub material: Array2<u8>,
    /// Target marker `(horizontal, depth)` in mm.
    pub focus_marker_mm: (f64, f64),
}

/// Depth axis relative to the target, shifted by the skin-to-target distance.
#[must_use]
pub fn depth_axis_mm(z_mm: &[f64], target_z: usize, distance_to_target_mm: f64) -> Vec<f64> {
    let origin = z_mm[target_z];
    z_mm.iter()
        .map(|&z| z - origin + distance_to_target_mm)
        .collect()
}

/// Extract a section of `intensity` and `material` through `target`.
///
/// `target` must lie inside both volumes.
#[must_use]
pub(crate) fn extract(
    plane: SectionPlane,
    intensity: &Array3<f64>,
    material: &Array3<u8>,
    target: [usize; 3],
    horizontal_mm: &[f64],
    depth_mm: Vec<f64>,
    distance_to_target_mm: f64,
) -> CrossSection {
    let (axis, index) = match plane {
        SectionPlane::Xz => (Axis(1), target[1]),
        SectionPlane::Yz => (Axis(0), target[0]),
    };
    // The remaining 2-D view is [horizontal, depth]; transpose to [depth, horizontal].
    let slice_intensity = intensity.index_axis(axis, index).t().to_owned();
    let slice_material = material.index_axis(axis, index).t().to_owned();

    CrossSection {
        plane,
        horizontal_mm: horizontal_mm.to_vec(),
        depth_mm,
        intensity: slice_intensity,
        material: slice_material,
        focus_marker_mm: (0.0, distance_to_target_mm),
    }
}
