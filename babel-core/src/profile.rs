//! Transducer profile documents.
//!
//! A profile document is a JSON object with default geometric constants and
//! compute selection at the top level, plus an optional `Models` map whose
//! entries override the defaults for one transducer model:
//!
//! ```json
//! {
//!   "ComputingDevice": "A6000",
//!   "ComputingBackend": "CUDA",
//!   "TxFoc": 0.135,
//!   "TxDiam": 0.064,
//!   "MinimalTPODistance": 0.031,
//!   "MaximalTPODistance": 0.080,
//!   "Models": {
//!     "BSonixPCD15287_01001": { "TxFoc": 0.0352, "TxDiam": 0.0332, "AdjustDistanceSkin": 0.003 }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::config::{ComputeDevice, ComputingBackend, TransducerGeometry};
use crate::{Error, Result};

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonProfileDocument {
    #[serde(rename = "ComputingDevice")]
    computing_device: Option<String>,
    #[serde(rename = "ComputingBackend")]
    computing_backend: Option<ComputingBackend>,
    #[serde(flatten)]
    defaults: JsonProfile,
    #[serde(rename = "Models")]
    models: BTreeMap<String, JsonProfile>,
}

#[derive(Deserialize, Default, Clone)]
#[serde(default)]
struct JsonProfile {
    #[serde(rename = "TxFoc")]
    tx_foc: Option<f64>,
    #[serde(rename = "TxDiam")]
    tx_diam: Option<f64>,
    #[serde(rename = "AdjustDistanceSkin")]
    adjust_distance_skin: Option<f64>,
    #[serde(rename = "MinimalTPODistance")]
    minimal_tpo_distance: Option<f64>,
    #[serde(rename = "MaximalTPODistance")]
    maximal_tpo_distance: Option<f64>,
}

impl JsonProfile {
    fn overlay(&self, over: &JsonProfile) -> JsonProfile {
        JsonProfile {
            tx_foc: over.tx_foc.or(self.tx_foc),
            tx_diam: over.tx_diam.or(self.tx_diam),
            adjust_distance_skin: over.adjust_distance_skin.or(self.adjust_distance_skin),
            minimal_tpo_distance: over.minimal_tpo_distance.or(self.minimal_tpo_distance),
            maximal_tpo_distance: over.maximal_tpo_distance.or(self.maximal_tpo_distance),
        }
    }
}

/// Geometric constants of one transducer model, in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransducerProfile {
    /// Focal length (`TxFoc`).
    pub focal_length_m: f64,
    /// Aperture diameter (`TxDiam`).
    pub diameter_m: f64,
    /// Offset between the exit plane and the skin (`AdjustDistanceSkin`).
    pub adjust_distance_skin_m: f64,
    /// Steering range (`MinimalTPODistance`, `MaximalTPODistance`).
    pub steering_bounds_m: Option<(f64, f64)>,
}

impl TransducerProfile {
    /// Geometry for a [`crate::SimulationConfig`].
    #[must_use]
    pub fn geometry(&self) -> TransducerGeometry {
        TransducerGeometry {
            focal_length_m: self.focal_length_m,
            diameter_m: self.diameter_m,
        }
    }

    /// Distance from the transducer's exit plane to its natural focus.
    #[must_use]
    pub fn distance_out_plane_to_focus_m(&self) -> f64 {
        let radius = self.diameter_m / 2.0;
        (self.focal_length_m.powi(2) - radius.powi(2)).sqrt()
    }

    /// Largest mechanical Z adjustment (mm, rounded to 0.1) that keeps the
    /// focus on a target `distance_skin_mm` below the skin.
    #[must_use]
    pub fn max_mechanical_z_mm(&self, distance_skin_mm: f64) -> f64 {
        let out_plane_mm = (self.distance_out_plane_to_focus_m() - self.adjust_distance_skin_m) * 1e3;
        ((out_plane_mm - distance_skin_mm) * 10.0).round() / 10.0
    }

    /// Clamp a requested steering distance into the allowed range.
    #[must_use]
    pub fn clamp_steering_m(&self, z_steering_m: f64) -> f64 {
        match self.steering_bounds_m {
            Some((min, max)) => z_steering_m.clamp(min, max),
            None => z_steering_m,
        }
    }
}

/// Parsed profile document.
#[derive(Debug, Clone)]
pub struct ProfileConfig {
    /// Compute device selection.
    pub device: ComputeDevice,
    defaults: TransducerProfileDraft,
    models: BTreeMap<String, TransducerProfileDraft>,
}

#[derive(Debug, Clone, Copy, Default)]
struct TransducerProfileDraft {
    tx_foc: Option<f64>,
    tx_diam: Option<f64>,
    adjust_distance_skin: Option<f64>,
    minimal_tpo_distance: Option<f64>,
    maximal_tpo_distance: Option<f64>,
}

impl From<&JsonProfile> for TransducerProfileDraft {
    fn from(p: &JsonProfile) -> Self {
        Self {
            tx_foc: p.tx_foc,
            tx_diam: p.tx_diam,
            adjust_distance_skin: p.adjust_distance_skin,
            minimal_tpo_distance: p.minimal_tpo_distance,
            maximal_tpo_distance: p.maximal_tpo_distance,
        }
    }
}

impl TransducerProfileDraft {
    fn finish(self, name: &str) -> Result<TransducerProfile> {
        let focal_length_m = self
            .tx_foc
            .ok_or_else(|| Error::ConfigError(format!("{name}: TxFoc missing")))?;
        let diameter_m = self
            .tx_diam
            .ok_or_else(|| Error::ConfigError(format!("{name}: TxDiam missing")))?;

        let steering_bounds_m = match (self.minimal_tpo_distance, self.maximal_tpo_distance) {
            (Some(min), Some(max)) if min <= max => Some((min, max)),
            (Some(min), Some(max)) => {
                return Err(Error::ConfigError(format!(
                    "{name}: MinimalTPODistance {min} exceeds MaximalTPODistance {max}"
                )))
            }
            (None, None) => None,
            _ => {
                return Err(Error::ConfigError(format!(
                    "{name}: MinimalTPODistance and MaximalTPODistance must be given together"
                )))
            }
        };

        Ok(TransducerProfile {
            focal_length_m,
            diameter_m,
            adjust_distance_skin_m: self.adjust_distance_skin.unwrap_or(0.0),
            steering_bounds_m,
        })
    }
}

impl ProfileConfig {
    /// Load a profile document from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let doc: JsonProfileDocument = serde_json::from_reader(reader)?;
        Ok(Self::from_document(&doc))
    }

    /// Load a profile document from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid document.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: JsonProfileDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(&doc))
    }

    fn from_document(doc: &JsonProfileDocument) -> Self {
        let device = ComputeDevice {
            name: doc
                .computing_device
                .clone()
                .unwrap_or_else(|| ComputeDevice::default().name),
            backend: doc.computing_backend.unwrap_or_default(),
        };

        let models: BTreeMap<String, TransducerProfileDraft> = doc
            .models
            .iter()
            .map(|(name, p)| (name.clone(), (&doc.defaults.overlay(p)).into()))
            .collect();

        Self {
            device,
            defaults: (&doc.defaults).into(),
            models,
        }
    }

    /// Names of the models with overrides.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Resolve the profile for a model, or the defaults for `None`.
    ///
    /// # Errors
    /// Returns `UnknownModel` for a model without an entry, and
    /// `ConfigError` if focal length or diameter are missing.
    pub fn profile(&self, model: Option<&str>) -> Result<TransducerProfile> {
        match model {
            None => self.defaults.finish("defaults"),
            Some(name) => self
                .models
                .get(name)
                .ok_or_else(|| Error::UnknownModel(name.to_string()))?
                .finish(name),
        }
    }
}
