//! Result bundle store.
//!
//! The store has no index: the path of a bundle is a pure function of the
//! run configuration, and a file at that path is the cached result.

use std::ffi::OsString;
use std::path::PathBuf;

use babel_core::{BundleVariant, SimulationConfig};

#[cfg(feature = "hdf5")]
use crate::{Error, Result};
#[cfg(feature = "hdf5")]
use babel_core::{CachedRunSummary, ResultBundle};

/// File name stem shared by every bundle.
const BUNDLE_STEM: &str = "DataForSim.h5";

/// Derive the bundle path for one variant of a run.
///
/// The name is `{prefix}[{modelTag}_]{variantSuffix}DataForSim.h5`, where the
/// variant suffix is empty for the full simulation and `Water_` for the
/// water-only one.
#[must_use]
pub fn path_for(config: &SimulationConfig, variant: BundleVariant) -> PathBuf {
    let mut name = OsString::from(config.output_prefix.as_os_str());
    if let Some(tag) = &config.model_tag {
        name.push(tag);
        name.push("_");
    }
    name.push(variant.file_suffix());
    name.push(BUNDLE_STEM);
    PathBuf::from(name)
}

/// Filesystem-backed store of result bundles.
///
/// The store only reads and writes whole files; it never deletes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultStore;

impl ResultStore {
    /// Create a store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Path of a bundle; see [`path_for`].
    #[must_use]
    pub fn path_for(&self, config: &SimulationConfig, variant: BundleVariant) -> PathBuf {
        path_for(config, variant)
    }

    /// Returns true iff both the full and the water-only bundle exist.
    ///
    /// Only presence is checked: a bundle left half-written by a crashed
    /// solver counts as present.
    #[must_use]
    pub fn has_cached_result(&self, config: &SimulationConfig) -> bool {
        BundleVariant::ALL.iter().all(|&variant| {
            let path = path_for(config, variant);
            let exists = path.is_file();
            log::debug!("cache probe {}: {}", path.display(), exists);
            exists
        })
    }

    /// Load the `(full, water)` bundles of a run.
    ///
    /// # Errors
    /// Returns `MissingResult` if either file is absent or is not a readable
    /// bundle.
    #[cfg(feature = "hdf5")]
    pub fn load(&self, config: &SimulationConfig) -> Result<(ResultBundle, ResultBundle)> {
        let full = self.load_variant(config, BundleVariant::Full)?;
        let water = self.load_variant(config, BundleVariant::Water)?;
        Ok((full, water))
    }

    /// Load one bundle of a run.
    ///
    /// # Errors
    /// Returns `MissingResult` if the file is absent or is not a readable
    /// bundle.
    #[cfg(feature = "hdf5")]
    pub fn load_variant(
        &self,
        config: &SimulationConfig,
        variant: BundleVariant,
    ) -> Result<ResultBundle> {
        let path = path_for(config, variant);
        if !path.is_file() {
            return Err(Error::MissingResult {
                path,
                reason: "file not found".to_string(),
            });
        }

        log::debug!("loading {variant:?} bundle from {}", path.display());
        crate::hdf5::read_bundle_hdf5(&path).map_err(|e| Error::MissingResult {
            reason: e.to_string(),
            path,
        })
    }

    /// Parameters echoed by the cached full bundle.
    ///
    /// # Errors
    /// Returns `MissingResult` if the full bundle cannot be read.
    #[cfg(feature = "hdf5")]
    pub fn cached_summary(&self, config: &SimulationConfig) -> Result<CachedRunSummary> {
        Ok(self.load_variant(config, BundleVariant::Full)?.summary())
    }

    /// Write one bundle of a run, replacing the whole file.
    ///
    /// # Errors
    /// Returns an error if the bundle is inconsistent or the write fails.
    #[cfg(feature = "hdf5")]
    pub fn save(
        &self,
        config: &SimulationConfig,
        variant: BundleVariant,
        bundle: &ResultBundle,
    ) -> Result<PathBuf> {
        let path = path_for(config, variant);
        crate::hdf5::write_bundle_hdf5(&path, bundle)?;
        log::debug!("wrote {variant:?} bundle to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use babel_core::TransducerGeometry;
    use tempfile::TempDir;

    fn config(prefix: PathBuf) -> SimulationConfig {
        SimulationConfig::new(
            "sub-01",
            prefix,
            TransducerGeometry {
                focal_length_m: 0.135,
                diameter_m: 0.064,
            },
        )
    }

    #[test]
    fn test_path_without_model_tag() {
        let cfg = config(PathBuf::from("/data/sub-01/sub-01_H246_"));
        assert_eq!(
            path_for(&cfg, BundleVariant::Full),
            PathBuf::from("/data/sub-01/sub-01_H246_DataForSim.h5")
        );
        assert_eq!(
            path_for(&cfg, BundleVariant::Water),
            PathBuf::from("/data/sub-01/sub-01_H246_Water_DataForSim.h5")
        );
    }

    #[test]
    fn test_path_with_model_tag() {
        let cfg = config(PathBuf::from("/data/p_")).with_model_tag("BSonixPCD15287_01001");
        assert_eq!(
            path_for(&cfg, BundleVariant::Full),
            PathBuf::from("/data/p_BSonixPCD15287_01001_DataForSim.h5")
        );
        assert_eq!(
            path_for(&cfg, BundleVariant::Water),
            PathBuf::from("/data/p_BSonixPCD15287_01001_Water_DataForSim.h5")
        );
    }

    #[test]
    fn test_path_is_pure() {
        let cfg = config(PathBuf::from("/data/p_")).with_model_tag("M");
        let store = ResultStore::new();
        for variant in BundleVariant::ALL {
            assert_eq!(store.path_for(&cfg, variant), store.path_for(&cfg, variant));
            assert_eq!(store.path_for(&cfg, variant), path_for(&cfg.clone(), variant));
        }
    }

    #[test]
    fn test_cache_requires_both_files() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path().join("run_"));
        let store = ResultStore::new();

        assert!(!store.has_cached_result(&cfg));

        std::fs::write(path_for(&cfg, BundleVariant::Full), b"").unwrap();
        assert!(!store.has_cached_result(&cfg));

        std::fs::write(path_for(&cfg, BundleVariant::Water), b"").unwrap();
        assert!(store.has_cached_result(&cfg));

        std::fs::remove_file(path_for(&cfg, BundleVariant::Full)).unwrap();
        assert!(!store.has_cached_result(&cfg));
    }

    #[test]
    fn test_cache_ignores_directories() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path().join("run_"));
        std::fs::create_dir(path_for(&cfg, BundleVariant::Full)).unwrap();
        std::fs::write(path_for(&cfg, BundleVariant::Water), b"").unwrap();

        assert!(!ResultStore::new().has_cached_result(&cfg));
    }

    #[cfg(feature = "hdf5")]
    mod hdf5_store {
        use super::*;
        use babel_core::MaterialTable;
        use ndarray::Array3;

        fn bundle() -> ResultBundle {
            ResultBundle {
                p_amp: Array3::from_elem((2, 2, 2), 1.5),
                material_map: Array3::zeros((2, 2, 2)),
                x_vec: vec![0.0, 0.001],
                y_vec: vec![0.0, 0.001],
                z_vec: vec![0.0, 0.001],
                material: MaterialTable::from_pairs(&[(1000.0, 1500.0)]).unwrap(),
                target_location: [1, 1, 1],
                adjustment_in_ras: [0.0; 3],
                tx_mechanical_adjustment: [Some(0.002), Some(-0.001), Some(0.0)],
                z_steering: None,
            }
        }

        #[test]
        fn test_load_never_written() {
            let dir = TempDir::new().unwrap();
            let cfg = config(dir.path().join("never_"));
            let store = ResultStore::new();

            assert!(!store.has_cached_result(&cfg));
            let err = store.load(&cfg).unwrap_err();
            assert!(matches!(err, Error::MissingResult { .. }));
        }

        #[test]
        fn test_load_malformed_file() {
            let dir = TempDir::new().unwrap();
            let cfg = config(dir.path().join("bad_"));
            let store = ResultStore::new();
            std::fs::write(path_for(&cfg, BundleVariant::Full), b"not hdf5").unwrap();
            std::fs::write(path_for(&cfg, BundleVariant::Water), b"not hdf5").unwrap();

            assert!(store.has_cached_result(&cfg));
            match store.load(&cfg).unwrap_err() {
                Error::MissingResult { path, .. } => {
                    assert_eq!(path, path_for(&cfg, BundleVariant::Full));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_save_then_load() {
            let dir = TempDir::new().unwrap();
            let cfg = config(dir.path().join("ok_")).with_model_tag("T1");
            let store = ResultStore::new();

            store.save(&cfg, BundleVariant::Full, &bundle()).unwrap();
            assert!(!store.has_cached_result(&cfg));
            store.save(&cfg, BundleVariant::Water, &bundle()).unwrap();
            assert!(store.has_cached_result(&cfg));

            let (full, water) = store.load(&cfg).unwrap();
            assert_eq!(full, bundle());
            assert_eq!(water, bundle());

            let summary = store.cached_summary(&cfg).unwrap();
            let x_mm = summary.tx_mechanical_adjustment_mm[0].unwrap();
            assert!((x_mm - 2.0).abs() < 1e-12);
        }
    }
}
