//! Simulation result bundles.
//!
//! A bundle is the complete output of one solver variant: the pressure
//! amplitude volume, the material map it was computed on, the grid axes and
//! the parameters the run was made with. Volumes are indexed `[x, y, z]`
//! with `z` the depth axis.

use ndarray::{Array2, Array3};

use crate::{Error, Result};

/// Which of the two solver variants a bundle holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleVariant {
    /// Simulation through skull and tissue.
    Full,
    /// Free-field simulation in water.
    Water,
}

impl BundleVariant {
    /// Both variants, full first.
    pub const ALL: [Self; 2] = [Self::Full, Self::Water];

    /// File name suffix inserted before `DataForSim.h5`.
    #[must_use]
    pub fn file_suffix(self) -> &'static str {
        match self {
            Self::Full => "",
            Self::Water => "Water_",
        }
    }
}

/// Acoustic properties per material code.
///
/// Row `i` holds `[density (kg/m^3), speed of sound (m/s), ...]` for
/// material code `i`; extra columns written by the solver are kept but
/// unused here.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialTable {
    rows: Array2<f64>,
}

impl MaterialTable {
    /// Wrap a material array.
    ///
    /// # Errors
    /// Returns `InvalidBundle` if the array has fewer than two columns or no
    /// rows.
    pub fn new(rows: Array2<f64>) -> Result<Self> {
        let (n_rows, n_cols) = rows.dim();
        if n_rows == 0 || n_cols < 2 {
            return Err(Error::InvalidBundle(format!(
                "material table must be N x 2 or wider, got {n_rows} x {n_cols}"
            )));
        }
        Ok(Self { rows })
    }

    /// Build from `(density, speed of sound)` pairs.
    ///
    /// # Errors
    /// Returns `InvalidBundle` if `pairs` is empty.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        let flat: Vec<f64> = pairs.iter().flat_map(|&(rho, c)| [rho, c]).collect();
        let rows = Array2::from_shape_vec((pairs.len(), 2), flat)
            .map_err(|e| Error::InvalidBundle(format!("material table: {e}")))?;
        Self::new(rows)
    }

    /// Number of material rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.nrows() == 0
    }

    /// `(density, speed of sound)` for a material row.
    ///
    /// # Errors
    /// Returns `InvalidBundle` if the row does not exist.
    pub fn properties(&self, row: usize) -> Result<(f64, f64)> {
        if row >= self.rows.nrows() {
            return Err(Error::InvalidBundle(format!(
                "material row {row} requested, table has {} rows",
                self.rows.nrows()
            )));
        }
        Ok((self.rows[[row, 0]], self.rows[[row, 1]]))
    }

    /// Raw table.
    #[must_use]
    pub fn as_array(&self) -> &Array2<f64> {
        &self.rows
    }
}

/// Result of one solver variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBundle {
    /// Pressure amplitude, `[x, y, z]`.
    pub p_amp: Array3<f64>,
    /// Material code per voxel, same shape as `p_amp`.
    pub material_map: Array3<u8>,
    /// Grid coordinates along x, in metres.
    pub x_vec: Vec<f64>,
    /// Grid coordinates along y, in metres.
    pub y_vec: Vec<f64>,
    /// Grid coordinates along z, in metres.
    pub z_vec: Vec<f64>,
    /// Acoustic properties per material code.
    pub material: MaterialTable,
    /// Voxel index of the planned target.
    pub target_location: [usize; 3],
    /// Correction to apply to the trajectory, in RAS space (metres).
    pub adjustment_in_ras: [f64; 3],
    /// Mechanical adjustments the run was made with (metres).
    pub tx_mechanical_adjustment: [Option<f64>; 3],
    /// Steering the run was made with (metres).
    pub z_steering: Option<f64>,
}

impl ResultBundle {
    /// Volume extents `[nx, ny, nz]`.
    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.p_amp.dim();
        [nx, ny, nz]
    }

    /// Check the structural invariants of the bundle.
    ///
    /// # Errors
    /// Returns `ShapeMismatch` if the material map or an axis vector does not
    /// match the pressure volume, and `VoxelOutOfBounds` if the target is
    /// outside it.
    pub fn validate(&self) -> Result<()> {
        let shape = self.shape();
        if self.material_map.shape() != self.p_amp.shape() {
            return Err(Error::ShapeMismatch {
                what: "MaterialMap",
                found: self.material_map.shape().to_vec(),
                expected: shape.to_vec(),
            });
        }

        for (what, axis, n) in [
            ("x_vec", &self.x_vec, shape[0]),
            ("y_vec", &self.y_vec, shape[1]),
            ("z_vec", &self.z_vec, shape[2]),
        ] {
            if axis.len() != n {
                return Err(Error::ShapeMismatch {
                    what,
                    found: vec![axis.len()],
                    expected: vec![n],
                });
            }
        }

        check_voxel(self.target_location, shape)
    }

    /// Parameters echoed by the run, for presenting a cached result.
    #[must_use]
    pub fn summary(&self) -> CachedRunSummary {
        CachedRunSummary {
            tx_mechanical_adjustment_mm: self.tx_mechanical_adjustment.map(|v| v.map(|m| m * 1e3)),
            z_steering_mm: self.z_steering.map(|m| m * 1e3),
        }
    }
}

/// Parameters of an existing result, shown when asking whether to reuse it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedRunSummary {
    /// Mechanical adjustments X/Y/Z in millimetres.
    pub tx_mechanical_adjustment_mm: [Option<f64>; 3],
    /// Steering in millimetres.
    pub z_steering_mm: Option<f64>,
}

impl std::fmt::Display for CachedRunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(z) = self.z_steering_mm {
            writeln!(f, "ZSteering={z:3.2}")?;
        }
        for (axis, value) in ["X", "Y", "Z"].iter().zip(self.tx_mechanical_adjustment_mm) {
            if let Some(value) = value {
                writeln!(f, "TxMechanicalAdjustment{axis}={value:3.2}")?;
            }
        }
        Ok(())
    }
}

/// Check that a voxel index lies inside a volume.
///
/// # Errors
/// Returns `VoxelOutOfBounds` otherwise.
pub fn check_voxel(index: [usize; 3], shape: [usize; 3]) -> Result<()> {
    if index.iter().zip(shape.iter()).any(|(i, n)| i >= n) {
        return Err(Error::VoxelOutOfBounds { index, shape });
    }
    Ok(())
}
