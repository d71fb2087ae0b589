//! HDF5 result bundle I/O.
//!
//! Bundles are flat files: every field is a dataset at the file root, named
//! as the solver writes them (`p_amp`, `MaterialMap`, `x_vec`, ...).

use crate::{Error, Result};
use babel_core::{MaterialTable, ResultBundle};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use ndarray::{Array2, Array3, ArrayView1, Ix2, Ix3};
use std::path::Path;
use std::str::FromStr;

const MECHANICAL_ADJUSTMENT_NAMES: [&str; 3] = [
    "TxMechanicalAdjustmentX",
    "TxMechanicalAdjustmentY",
    "TxMechanicalAdjustmentZ",
];

/// Reads a result bundle from an HDF5 file.
///
/// # Errors
/// Returns an error if HDF5 I/O fails, a required dataset is missing, or the
/// bundle violates its shape invariants.
pub fn read_bundle_hdf5<P: AsRef<Path>>(path: P) -> Result<ResultBundle> {
    let file = File::open(path)?;

    let p_amp: Array3<f64> = file.dataset("p_amp")?.read::<f64, Ix3>()?;
    let material_map: Array3<u8> = file.dataset("MaterialMap")?.read::<u8, Ix3>()?;
    let x_vec = read_dataset_vec::<f64>(&file, "x_vec")?;
    let y_vec = read_dataset_vec::<f64>(&file, "y_vec")?;
    let z_vec = read_dataset_vec::<f64>(&file, "z_vec")?;

    let material: Array2<f64> = file.dataset("Material")?.read::<f64, Ix2>()?;
    let material = MaterialTable::new(material)?;

    let target = read_dataset_vec::<i64>(&file, "TargetLocation")?;
    let target_location = to_voxel_index(&target)?;

    let adjustment = read_dataset_vec::<f64>(&file, "AdjustmentInRAS")?;
    let adjustment_in_ras: [f64; 3] = adjustment.as_slice().try_into().map_err(|_| {
        Error::InvalidFormat(format!(
            "AdjustmentInRAS must hold 3 values, found {}",
            adjustment.len()
        ))
    })?;

    let mut tx_mechanical_adjustment = [None; 3];
    for (slot, name) in tx_mechanical_adjustment
        .iter_mut()
        .zip(MECHANICAL_ADJUSTMENT_NAMES)
    {
        *slot = read_scalar_opt::<f64>(&file, name)?;
    }
    let z_steering = read_scalar_opt::<f64>(&file, "ZSteering")?;

    let bundle = ResultBundle {
        p_amp,
        material_map,
        x_vec,
        y_vec,
        z_vec,
        material,
        target_location,
        adjustment_in_ras,
        tx_mechanical_adjustment,
        z_steering,
    };
    bundle.validate()?;
    Ok(bundle)
}

/// Writes a result bundle to an HDF5 file, replacing any existing file.
///
/// # Errors
/// Returns an error if the bundle is inconsistent or HDF5 I/O fails.
pub fn write_bundle_hdf5<P: AsRef<Path>>(path: P, bundle: &ResultBundle) -> Result<()> {
    bundle.validate()?;

    let file = File::create(path)?;

    let p_amp = create_fixed_dataset::<f64, _>(&file, "p_amp", bundle.p_amp.dim())?;
    set_dataset_units(&p_amp, "Pa")?;
    p_amp.write(bundle.p_amp.view())?;

    let material_map = create_fixed_dataset::<u8, _>(&file, "MaterialMap", bundle.material_map.dim())?;
    material_map.write(bundle.material_map.view())?;

    for (name, axis) in [
        ("x_vec", &bundle.x_vec),
        ("y_vec", &bundle.y_vec),
        ("z_vec", &bundle.z_vec),
    ] {
        let ds = create_fixed_dataset::<f64, _>(&file, name, (axis.len(),))?;
        set_dataset_units(&ds, "m")?;
        ds.write(ArrayView1::from(axis.as_slice()))?;
    }

    let table = bundle.material.as_array();
    let material = create_fixed_dataset::<f64, _>(&file, "Material", table.dim())?;
    material.write(table.view())?;

    let target: Vec<i64> = bundle
        .target_location
        .iter()
        .map(|&i| {
            i64::try_from(i)
                .map_err(|_| Error::InvalidFormat(format!("target index {i} exceeds i64 range")))
        })
        .collect::<Result<_>>()?;
    let target_ds = create_fixed_dataset::<i64, _>(&file, "TargetLocation", (target.len(),))?;
    target_ds.write(ArrayView1::from(target.as_slice()))?;

    let ras = create_fixed_dataset::<f64, _>(&file, "AdjustmentInRAS", (3,))?;
    set_dataset_units(&ras, "m")?;
    ras.write(ArrayView1::from(&bundle.adjustment_in_ras[..]))?;

    for (value, name) in bundle
        .tx_mechanical_adjustment
        .iter()
        .zip(MECHANICAL_ADJUSTMENT_NAMES)
    {
        if let Some(value) = value {
            write_scalar(&file, name, *value)?;
        }
    }
    if let Some(value) = bundle.z_steering {
        write_scalar(&file, "ZSteering", value)?;
    }

    Ok(())
}

fn to_voxel_index(raw: &[i64]) -> Result<[usize; 3]> {
    if raw.len() != 3 {
        return Err(Error::InvalidFormat(format!(
            "TargetLocation must hold 3 indices, found {}",
            raw.len()
        )));
    }
    let mut index = [0usize; 3];
    for (slot, &value) in index.iter_mut().zip(raw) {
        *slot = usize::try_from(value)
            .map_err(|_| Error::InvalidFormat(format!("negative target index {value}")))?;
    }
    Ok(index)
}

fn create_fixed_dataset<T: H5Type, S>(group: &Group, name: &str, shape: S) -> Result<Dataset>
where
    S: Into<hdf5::Extents>,
{
    Ok(group.new_dataset::<T>().shape(shape).create(name)?)
}

fn write_scalar(group: &Group, name: &str, value: f64) -> Result<()> {
    let ds = group.new_dataset::<f64>().shape(()).create(name)?;
    set_dataset_units(&ds, "m")?;
    ds.write_scalar(&value)?;
    Ok(())
}

fn read_dataset_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    let dataset = group.dataset(name)?;
    Ok(dataset.read_raw::<T>()?)
}

// Scalars are accepted both as 0-d datasets and as 1-element arrays.
fn read_scalar_opt<T: H5Type + Copy>(group: &Group, name: &str) -> Result<Option<T>> {
    match group.dataset(name) {
        Ok(dataset) => {
            let values = dataset.read_raw::<T>()?;
            match values.as_slice() {
                [value] => Ok(Some(*value)),
                _ => Err(Error::InvalidFormat(format!(
                    "{name} must be a scalar, found {} values",
                    values.len()
                ))),
            }
        }
        Err(_) => Ok(None),
    }
}

fn set_dataset_units(dataset: &Dataset, units: &str) -> Result<()> {
    let value = to_var_len_unicode(units)?;
    dataset
        .new_attr::<VarLenUnicode>()
        .create("units")?
        .write_scalar(&value)?;
    Ok(())
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_bundle() -> ResultBundle {
        let shape = (2, 3, 4);
        ResultBundle {
            p_amp: Array3::from_shape_fn(shape, |(i, j, k)| (i * 100 + j * 10 + k) as f64),
            material_map: Array3::from_shape_fn(shape, |(_, _, k)| u8::try_from(k).unwrap()),
            x_vec: vec![-0.001, 0.0],
            y_vec: vec![-0.001, 0.0, 0.001],
            z_vec: vec![0.0, 0.001, 0.002, 0.003],
            material: MaterialTable::from_pairs(&[
                (1000.0, 1500.0),
                (1000.0, 1500.0),
                (1100.0, 1550.0),
                (1850.0, 2400.0),
                (1900.0, 2800.0),
            ])
            .unwrap(),
            target_location: [1, 2, 3],
            adjustment_in_ras: [0.001, -0.002, 0.0005],
            tx_mechanical_adjustment: [Some(0.001), Some(0.0), None],
            z_steering: Some(0.045),
        }
    }

    #[test]
    fn test_hdf5_bundle_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let bundle = sample_bundle();

        write_bundle_hdf5(file.path(), &bundle).unwrap();
        let loaded = read_bundle_hdf5(file.path()).unwrap();

        assert_eq!(loaded, bundle);
    }

    #[test]
    fn test_hdf5_missing_optional_scalars() {
        let file = NamedTempFile::new().unwrap();
        let mut bundle = sample_bundle();
        bundle.tx_mechanical_adjustment = [None; 3];
        bundle.z_steering = None;

        write_bundle_hdf5(file.path(), &bundle).unwrap();
        let loaded = read_bundle_hdf5(file.path()).unwrap();

        assert_eq!(loaded.tx_mechanical_adjustment, [None; 3]);
        assert!(loaded.z_steering.is_none());
    }

    #[test]
    fn test_hdf5_write_rejects_inconsistent_bundle() {
        let file = NamedTempFile::new().unwrap();
        let mut bundle = sample_bundle();
        bundle.z_vec.push(0.004);

        let err = write_bundle_hdf5(file.path(), &bundle).unwrap_err();
        assert!(matches!(err, Error::CoreError(_)));
    }

    #[test]
    fn test_hdf5_missing_dataset() {
        let file = NamedTempFile::new().unwrap();
        {
            let h5 = File::create(file.path()).unwrap();
            let ds = create_fixed_dataset::<f64, _>(&h5, "p_amp", (1, 1, 1)).unwrap();
            ds.write(Array3::<f64>::zeros((1, 1, 1)).view()).unwrap();
        }

        assert!(read_bundle_hdf5(file.path()).is_err());
    }

    #[test]
    fn test_voxel_index_conversion() {
        assert_eq!(to_voxel_index(&[1, 2, 3]).unwrap(), [1, 2, 3]);
        assert!(matches!(
            to_voxel_index(&[1, -2, 3]),
            Err(Error::InvalidFormat(_))
        ));
        assert!(to_voxel_index(&[1, 2]).is_err());
    }
}
