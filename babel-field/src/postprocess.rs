//! Field post-processing.
//!
//! Turns a `(full, water)` pair of result bundles into normalized intensity
//! maps, focal energies and the skull correction factor.

use babel_core::{check_voxel, ResultBundle};
use ndarray::Array3;

use crate::intensity::{
    flip_depth, intensity, locate_maximum, mean_spacing, normalize, plane_energy,
    restrict_to_material,
};
use crate::material::{remap_material_map, SKULL_BONE_CODE, SKULL_MATERIAL_ROW, WATER_MATERIAL_ROW};
use crate::section::{depth_axis_mm, extract, CrossSection, SectionPlane};
use crate::{Error, Result};

/// Which intensity volume a section is cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldView {
    Water,
    Skull,
}

/// Focus of one intensity volume.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FocalEnergy {
    /// Voxel holding the maximum intensity.
    pub voxel: [usize; 3],
    /// Intensity summed over the depth plane through `voxel`, times `dx^2`.
    pub energy: f64,
}

/// Scalar results of a post-processing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldSummary {
    pub water_focus: FocalEnergy,
    pub skull_focus: FocalEnergy,
    /// Water focal energy over skull focal energy.
    pub correction_factor: f64,
    /// Un-normalized water intensity at the target (W/m^2).
    pub water_intensity_at_target: f64,
    /// Un-normalized skull intensity at the target (W/m^2).
    pub skull_intensity_at_target: f64,
    /// Peak water intensity before normalization.
    pub water_peak: f64,
    /// Peak skull intensity (bone only) before normalization.
    pub skull_peak: f64,
    pub pitch_mm: f64,
    pub target_voxel: [usize; 3],
    pub distance_to_target_mm: f64,
    /// Trajectory correction echoed from the full bundle, in metres.
    pub adjustment_in_ras: [f64; 3],
}

/// Output of [`FieldPostprocessor::process`].
#[derive(Debug, Clone)]
pub struct PostprocessedField {
    /// Normalized water intensity, depth-flipped.
    pub water_intensity: Array3<f64>,
    /// Normalized skull intensity, zero outside bone, depth-flipped.
    pub skull_intensity: Array3<f64>,
    /// Display material codes of the full bundle, depth-flipped.
    pub material_map: Array3<u8>,
    pub x_mm: Vec<f64>,
    pub y_mm: Vec<f64>,
    pub z_mm: Vec<f64>,
    /// Depth axis of the sections.
    pub depth_mm: Vec<f64>,
    summary: FieldSummary,
}

impl PostprocessedField {
    /// Scalar metrics.
    #[must_use]
    pub fn summary(&self) -> FieldSummary {
        self.summary
    }

    #[must_use]
    pub fn correction_factor(&self) -> f64 {
        self.summary.correction_factor
    }

    /// Cross-section of one view through the target voxel.
    #[must_use]
    pub fn section(&self, view: FieldView, plane: SectionPlane) -> CrossSection {
        let volume = match view {
            FieldView::Water => &self.water_intensity,
            FieldView::Skull => &self.skull_intensity,
        };
        let horizontal = match plane {
            SectionPlane::Xz => &self.x_mm,
            SectionPlane::Yz => &self.y_mm,
        };
        extract(
            plane,
            volume,
            &self.material_map,
            self.summary.target_voxel,
            horizontal,
            self.depth_mm.clone(),
            self.summary.distance_to_target_mm,
        )
    }
}

/// Post-processor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPostprocessor {
    /// Material row of the full bundle used for skull intensity.
    pub skull_material_row: usize,
    /// Material row of the water bundle used for water intensity.
    pub water_material_row: usize,
    /// Display code the skull intensity is restricted to.
    pub bone_code: u8,
}

impl Default for FieldPostprocessor {
    fn default() -> Self {
        Self {
            skull_material_row: SKULL_MATERIAL_ROW,
            water_material_row: WATER_MATERIAL_ROW,
            bone_code: SKULL_BONE_CODE,
        }
    }
}

impl FieldPostprocessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Post-process a `(full, water)` pair.
    ///
    /// `target_voxel` indexes the unflipped grid, as written by the solver;
    /// `distance_to_target_mm` is the skin-to-target distance used to place
    /// the section depth axis.
    ///
    /// A skull focal energy of zero yields an infinite (or NaN) correction
    /// factor.
    ///
    /// # Errors
    /// Returns `InvalidBundle` or a core error if the bundles are
    /// inconsistent, and `NoFocusRegion` if the full bundle has no bone.
    pub fn process(
        &self,
        full: &ResultBundle,
        water: &ResultBundle,
        target_voxel: [usize; 3],
        distance_to_target_mm: f64,
    ) -> Result<PostprocessedField> {
        full.validate()?;
        water.validate()?;
        let shape = full.shape();
        if water.shape() != shape {
            return Err(babel_core::Error::ShapeMismatch {
                what: "water p_amp",
                found: water.shape().to_vec(),
                expected: shape.to_vec(),
            }
            .into());
        }
        check_voxel(target_voxel, shape)?;

        let skull_props = full.material.properties(self.skull_material_row)?;
        let water_props = water.material.properties(self.water_material_row)?;

        let full_p = flip_depth(&full.p_amp);
        let water_p = flip_depth(&water.p_amp);
        let mut material_map = flip_depth(&full.material_map);
        remap_material_map(&mut material_map);

        let pitch_m = mean_spacing(&full.x_vec)?;
        let to_mm = |v: &[f64]| v.iter().map(|m| m * 1e3).collect::<Vec<f64>>();
        let x_mm = to_mm(&full.x_vec);
        let y_mm = to_mm(&full.y_vec);
        let z_mm = to_mm(&full.z_vec);

        let (mut water_intensity, mut skull_intensity) = rayon::join(
            || intensity(&water_p, water_props.0, water_props.1),
            || intensity(&full_p, skull_props.0, skull_props.1),
        );

        let water_intensity_at_target = water_intensity[target_voxel];
        let skull_intensity_at_target = skull_intensity[target_voxel];

        if !restrict_to_material(&mut skull_intensity, &material_map, self.bone_code) {
            return Err(Error::NoFocusRegion {
                code: self.bone_code,
            });
        }

        let skull_focus = focal_energy(&skull_intensity, pitch_m)?;
        let water_focus = focal_energy(&water_intensity, pitch_m)?;
        let correction_factor = water_focus.energy / skull_focus.energy;

        log::info!(
            "EnergyAtFocusWater={:e} EnergyAtFocusSkull={:e} factor={correction_factor:.4}",
            water_focus.energy,
            skull_focus.energy
        );
        log::debug!(
            "intensity at target {target_voxel:?}: water={water_intensity_at_target:e} skull={skull_intensity_at_target:e}"
        );

        let water_peak = normalize(&mut water_intensity);
        let skull_peak = normalize(&mut skull_intensity);

        let depth_mm = depth_axis_mm(&z_mm, target_voxel[2], distance_to_target_mm);

        Ok(PostprocessedField {
            water_intensity,
            skull_intensity,
            material_map,
            x_mm,
            y_mm,
            z_mm,
            depth_mm,
            summary: FieldSummary {
                water_focus,
                skull_focus,
                correction_factor,
                water_intensity_at_target,
                skull_intensity_at_target,
                water_peak,
                skull_peak,
                pitch_mm: pitch_m * 1e3,
                target_voxel,
                distance_to_target_mm,
                adjustment_in_ras: full.adjustment_in_ras,
            },
        })
    }
}

fn focal_energy(volume: &Array3<f64>, pitch_m: f64) -> Result<FocalEnergy> {
    let voxel = locate_maximum(volume)
        .ok_or_else(|| Error::InvalidBundle("empty intensity volume".to_string()))?;
    Ok(FocalEnergy {
        voxel,
        energy: plane_energy(volume, voxel[2], pitch_m),
    })
}
