//! Intensity volumes and focal-plane reductions.
//!
//! Element-wise maps run on the rayon pool; reductions are sequential so a
//! given input always yields bit-identical output.

use ndarray::{Array3, Axis, Zip};

use crate::{Error, Result};

/// Pulse-average intensity `p^2 / (2 rho c)` of a pressure amplitude volume.
#[must_use]
pub fn intensity(p_amp: &Array3<f64>, density: f64, speed_of_sound: f64) -> Array3<f64> {
    let impedance2 = 2.0 * density * speed_of_sound;
    Zip::from(p_amp).par_map_collect(|&p| p * p / impedance2)
}

/// Reverse a volume along the depth axis (axis 2).
#[must_use]
pub fn flip_depth<T: Clone>(volume: &Array3<T>) -> Array3<T> {
    let mut view = volume.view();
    view.invert_axis(Axis(2));
    view.as_standard_layout().into_owned()
}

/// Zero every voxel whose material code differs from `code`.
///
/// Returns false, leaving `volume` untouched, when no voxel carries `code`.
pub fn restrict_to_material(volume: &mut Array3<f64>, material_map: &Array3<u8>, code: u8) -> bool {
    if !material_map.iter().any(|&m| m == code) {
        return false;
    }
    Zip::from(volume).and(material_map).for_each(|v, &m| {
        if m != code {
            *v = 0.0;
        }
    });
    true
}

/// Index of the first voxel, in C order, holding the maximum value.
///
/// Returns `None` for an empty volume.
#[must_use]
pub fn locate_maximum(volume: &Array3<f64>) -> Option<[usize; 3]> {
    let mut best: Option<([usize; 3], f64)> = None;
    for ((i, j, k), &value) in volume.indexed_iter() {
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some(([i, j, k], value)),
        }
    }
    best.map(|(index, _)| index)
}

/// Sum of the depth plane `z` scaled by the squared in-plane pitch.
#[must_use]
pub fn plane_energy(volume: &Array3<f64>, z: usize, pitch: f64) -> f64 {
    volume.index_axis(Axis(2), z).sum() * pitch * pitch
}

/// Mean spacing of a coordinate vector.
///
/// # Errors
/// Returns `InvalidBundle` if the vector has fewer than two samples or the
/// spacing is not a positive finite number.
pub fn mean_spacing(axis: &[f64]) -> Result<f64> {
    if axis.len() < 2 {
        return Err(Error::InvalidBundle(format!(
            "coordinate vector needs at least 2 samples, found {}",
            axis.len()
        )));
    }
    let diffs: f64 = axis.windows(2).map(|w| w[1] - w[0]).sum();
    #[allow(clippy::cast_precision_loss)]
    let spacing = diffs / (axis.len() - 1) as f64;
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(Error::InvalidBundle(format!(
            "coordinate spacing {spacing} is not positive"
        )));
    }
    Ok(spacing)
}

/// Divide a volume by its maximum so the peak becomes 1.
///
/// Volumes whose maximum is not positive are left unchanged. Returns the
/// maximum used.
pub fn normalize(volume: &mut Array3<f64>) -> f64 {
    let max = volume.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 {
        volume.par_mapv_inplace(|v| v / max);
    }
    max
}
