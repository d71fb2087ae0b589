//! Simulation run configuration.
//!
//! A [`SimulationConfig`] is captured once from the presenter before a run
//! starts and is only read afterwards.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Numerical backend the field solver should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComputingBackend {
    /// Plain CPU execution.
    #[default]
    #[serde(rename = "CPU", alias = "cpu")]
    Cpu,
    /// NVIDIA CUDA.
    #[serde(rename = "CUDA", alias = "cuda")]
    Cuda,
    /// OpenCL devices.
    #[serde(rename = "OpenCL", alias = "opencl")]
    OpenCl,
    /// Apple Metal.
    #[serde(rename = "Metal", alias = "metal")]
    Metal,
}

impl ComputingBackend {
    /// Name passed to the solver.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Cuda => "CUDA",
            Self::OpenCl => "OpenCL",
            Self::Metal => "Metal",
        }
    }
}

impl fmt::Display for ComputingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ComputingBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "opencl" => Ok(Self::OpenCl),
            "metal" => Ok(Self::Metal),
            other => Err(Error::ConfigError(format!(
                "unknown computing backend '{other}'"
            ))),
        }
    }
}

/// Compute device selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeDevice {
    /// Device name as understood by the solver (e.g. "A6000", "M1").
    pub name: String,
    /// Backend the device is driven through.
    pub backend: ComputingBackend,
}

impl Default for ComputeDevice {
    fn default() -> Self {
        Self {
            name: "CPU".to_string(),
            backend: ComputingBackend::Cpu,
        }
    }
}

/// Focusing transducer geometry, in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransducerGeometry {
    /// Focal length.
    pub focal_length_m: f64,
    /// Aperture diameter.
    pub diameter_m: f64,
}

/// Mechanical adjustment of the transducer, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MechanicalAdjustment {
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
}

impl MechanicalAdjustment {
    /// Build from millimetre values (the unit presenters show).
    #[must_use]
    pub fn from_mm(x_mm: f64, y_mm: f64, z_mm: f64) -> Self {
        Self {
            x_m: x_mm / 1e3,
            y_m: y_mm / 1e3,
            z_m: z_mm / 1e3,
        }
    }
}

/// Immutable snapshot of everything one simulation run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Subject identifier passed to the solver as `ID`.
    pub subject_id: String,
    /// Transducer system name (e.g. "H246", "BSonix").
    pub tx_system: String,
    /// Directory holding the subject folders, passed as `basedir`.
    pub base_dir: PathBuf,
    /// Path prefix of result files; the file name is appended verbatim.
    pub output_prefix: PathBuf,
    /// Model tag for multi-model transducer families; `None` for a single
    /// default transducer.
    pub model_tag: Option<String>,
    /// Transducer geometry.
    pub geometry: TransducerGeometry,
    /// Mechanical adjustments.
    pub mechanical: MechanicalAdjustment,
    /// Steering distance along the acoustic axis, in metres.
    pub z_steering_m: f64,
    /// Allowed steering range in metres, when the transducer can steer.
    pub steering_bounds_m: Option<(f64, f64)>,
    /// Frequencies to simulate, in Hz.
    pub frequencies_hz: Vec<f64>,
    /// Spatial sampling, points per wavelength, one per frequency.
    pub base_ppw: Vec<u32>,
    /// Compute device.
    pub device: ComputeDevice,
}

impl SimulationConfig {
    /// Create a configuration with a single 500 kHz run at 6 PPW on CPU.
    pub fn new(
        subject_id: impl Into<String>,
        output_prefix: impl Into<PathBuf>,
        geometry: TransducerGeometry,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            tx_system: "H246".to_string(),
            base_dir: PathBuf::new(),
            output_prefix: output_prefix.into(),
            model_tag: None,
            geometry,
            mechanical: MechanicalAdjustment::default(),
            z_steering_m: 0.0,
            steering_bounds_m: None,
            frequencies_hz: vec![500e3],
            base_ppw: vec![6],
            device: ComputeDevice::default(),
        }
    }

    /// Sets the transducer system name.
    #[must_use]
    pub fn with_tx_system(mut self, tx_system: impl Into<String>) -> Self {
        self.tx_system = tx_system.into();
        self
    }

    /// Sets the subject base directory.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Sets the transducer model tag.
    #[must_use]
    pub fn with_model_tag(mut self, tag: impl Into<String>) -> Self {
        self.model_tag = Some(tag.into());
        self
    }

    /// Sets the mechanical adjustments.
    #[must_use]
    pub fn with_mechanical(mut self, mechanical: MechanicalAdjustment) -> Self {
        self.mechanical = mechanical;
        self
    }

    /// Sets the steering distance and, optionally, its allowed range.
    #[must_use]
    pub fn with_steering(mut self, z_steering_m: f64, bounds_m: Option<(f64, f64)>) -> Self {
        self.z_steering_m = z_steering_m;
        self.steering_bounds_m = bounds_m;
        self
    }

    /// Sets frequencies and matching PPW values.
    #[must_use]
    pub fn with_frequencies(mut self, frequencies_hz: Vec<f64>, base_ppw: Vec<u32>) -> Self {
        self.frequencies_hz = frequencies_hz;
        self.base_ppw = base_ppw;
        self
    }

    /// Sets the compute device.
    #[must_use]
    pub fn with_device(mut self, device: ComputeDevice) -> Self {
        self.device = device;
        self
    }

    /// Name of the simulation target, `{ID}_{TxSystem}`.
    #[must_use]
    pub fn target_name(&self) -> String {
        format!("{}_{}", self.subject_id, self.tx_system)
    }

    /// Check the snapshot before handing it to a solver.
    ///
    /// # Errors
    /// Returns `ConfigError` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.subject_id.trim().is_empty() {
            return Err(Error::ConfigError("subject id is empty".to_string()));
        }

        let TransducerGeometry {
            focal_length_m,
            diameter_m,
        } = self.geometry;
        if !(focal_length_m > 0.0 && diameter_m > 0.0) {
            return Err(Error::ConfigError(format!(
                "transducer geometry must be positive (focal length {focal_length_m} m, diameter {diameter_m} m)"
            )));
        }
        if focal_length_m <= diameter_m / 2.0 {
            return Err(Error::ConfigError(format!(
                "focal length {focal_length_m} m must exceed the aperture radius {} m",
                diameter_m / 2.0
            )));
        }

        let MechanicalAdjustment { x_m, y_m, z_m } = self.mechanical;
        if !(x_m.is_finite() && y_m.is_finite() && z_m.is_finite()) {
            return Err(Error::ConfigError(
                "mechanical adjustments must be finite".to_string(),
            ));
        }

        if self.frequencies_hz.is_empty() {
            return Err(Error::ConfigError("no frequencies selected".to_string()));
        }
        if let Some(bad) = self
            .frequencies_hz
            .iter()
            .find(|f| !f.is_finite() || **f <= 0.0)
        {
            return Err(Error::ConfigError(format!("invalid frequency {bad} Hz")));
        }
        if self.base_ppw.len() != self.frequencies_hz.len() {
            return Err(Error::ConfigError(format!(
                "{} PPW values for {} frequencies",
                self.base_ppw.len(),
                self.frequencies_hz.len()
            )));
        }
        if self.base_ppw.contains(&0) {
            return Err(Error::ConfigError("PPW must be positive".to_string()));
        }

        if !self.z_steering_m.is_finite() {
            return Err(Error::ConfigError("steering must be finite".to_string()));
        }
        if let Some((min, max)) = self.steering_bounds_m {
            if self.z_steering_m < min || self.z_steering_m > max {
                return Err(Error::ConfigError(format!(
                    "steering {:.1} mm outside [{:.1} - {:.1}] mm",
                    self.z_steering_m * 1e3,
                    min * 1e3,
                    max * 1e3
                )));
            }
        }

        Ok(())
    }
}
