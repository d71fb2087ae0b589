//! Solver command line.
//!
//! The solver is an external program. It receives the run parameters as
//! `--Key value` pairs after a fixed list of leading arguments (an
//! interpreter script path, for instance). List values are comma-joined.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Command;

use babel_core::SimulationConfig;

/// Program plus fixed leading arguments used to launch the solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl SolverCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a leading argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Full command for one run: leading arguments, then the run keywords.
    #[must_use]
    pub fn build(&self, config: &SimulationConfig) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in solver_arguments(config) {
            command.arg(format!("--{key}"));
            command.arg(value);
        }
        command
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Keyword arguments for one run, in the order they are passed.
///
/// Lengths are in metres and frequencies in Hz. Model-specific keys
/// (`extrasuffix`, `Aperture`, `FocalLength`) are only emitted when the
/// configuration carries a model tag.
#[must_use]
pub fn solver_arguments(config: &SimulationConfig) -> Vec<(&'static str, OsString)> {
    let mut args: Vec<(&'static str, OsString)> = vec![
        ("ID", config.subject_id.clone().into()),
        ("Target", config.target_name().into()),
        ("deviceName", config.device.name.clone().into()),
        ("COMPUTING_BACKEND", config.device.backend.as_str().into()),
        ("basePPW", join(&config.base_ppw).into()),
        ("basedir", config.base_dir.clone().into_os_string()),
        (
            "TxMechanicalAdjustmentX",
            config.mechanical.x_m.to_string().into(),
        ),
        (
            "TxMechanicalAdjustmentY",
            config.mechanical.y_m.to_string().into(),
        ),
        (
            "TxMechanicalAdjustmentZ",
            config.mechanical.z_m.to_string().into(),
        ),
        ("ZSteering", config.z_steering_m.to_string().into()),
        ("Frequencies", join(&config.frequencies_hz).into()),
    ];

    if let Some(tag) = &config.model_tag {
        args.push(("extrasuffix", format!("{tag}_").into()));
        args.push(("Aperture", config.geometry.diameter_m.to_string().into()));
        args.push((
            "FocalLength",
            config.geometry.focal_length_m.to_string().into(),
        ));
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use babel_core::{ComputeDevice, ComputingBackend, MechanicalAdjustment, TransducerGeometry};

    fn config() -> SimulationConfig {
        SimulationConfig::new(
            "sub-07",
            "/data/sub-07/run_",
            TransducerGeometry {
                focal_length_m: 0.135,
                diameter_m: 0.064,
            },
        )
        .with_base_dir("/data")
        .with_mechanical(MechanicalAdjustment::from_mm(1.5, 0.0, -2.0))
        .with_frequencies(vec![250e3, 500e3], vec![6, 9])
        .with_device(ComputeDevice {
            name: "A6000".to_string(),
            backend: ComputingBackend::Cuda,
        })
    }

    fn value<'a>(args: &'a [(&'static str, OsString)], key: &str) -> Option<&'a OsStr> {
        args.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_os_str())
    }

    #[test]
    fn test_keyword_contract() {
        let args = solver_arguments(&config());
        assert_eq!(value(&args, "ID"), Some(OsStr::new("sub-07")));
        assert_eq!(value(&args, "Target"), Some(OsStr::new("sub-07_H246")));
        assert_eq!(value(&args, "deviceName"), Some(OsStr::new("A6000")));
        assert_eq!(value(&args, "COMPUTING_BACKEND"), Some(OsStr::new("CUDA")));
        assert_eq!(value(&args, "basePPW"), Some(OsStr::new("6,9")));
        assert_eq!(value(&args, "basedir"), Some(OsStr::new("/data")));
        assert_eq!(value(&args, "Frequencies"), Some(OsStr::new("250000,500000")));
        assert_eq!(
            value(&args, "TxMechanicalAdjustmentX"),
            Some(OsStr::new("0.0015"))
        );
        assert_eq!(value(&args, "ZSteering"), Some(OsStr::new("0")));
        assert!(value(&args, "extrasuffix").is_none());
    }

    #[test]
    fn test_model_keys() {
        let args = solver_arguments(&config().with_model_tag("BSonixPCD15287_01001"));
        assert_eq!(
            value(&args, "extrasuffix"),
            Some(OsStr::new("BSonixPCD15287_01001_"))
        );
        assert_eq!(value(&args, "Aperture"), Some(OsStr::new("0.064")));
        assert_eq!(value(&args, "FocalLength"), Some(OsStr::new("0.135")));
    }

    #[test]
    fn test_build_puts_leading_args_first() {
        let command = SolverCommand::new("python3").arg("solver.py").build(&config());
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(command.get_program(), OsStr::new("python3"));
        assert_eq!(args[0], OsStr::new("solver.py"));
        assert_eq!(args[1], OsStr::new("--ID"));
        assert_eq!(args[2], OsStr::new("sub-07"));
        assert_eq!(args.len(), 1 + 2 * solver_arguments(&config()).len());
    }
}
