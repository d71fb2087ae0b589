//! babel: command-line front end.
//!
//! Runs the acoustic solver for a subject (reusing cached results when they
//! exist), post-processes result bundles and inspects bundle files.
#![allow(clippy::cast_precision_loss, clippy::too_many_lines)]

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use babel_core::{
    BundleVariant, CachedRunSummary, ComputeDevice, ComputingBackend, MechanicalAdjustment,
    ProfileConfig, ProgressEvent, ResultBundle, SimulationConfig, TransducerGeometry,
};
use babel_field::{FieldPostprocessor, FieldSummary};
use babel_io::{read_bundle_hdf5, ResultStore};
use babel_sim::{RunObserver, RunOutcome, SimulationOrchestrator, SolverCommand};
use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Core(#[from] babel_core::Error),

    #[error("{0}")]
    Store(#[from] babel_io::Error),

    #[error("{0}")]
    Run(#[from] babel_sim::Error),

    #[error("post-processing error: {0}")]
    Field(#[from] babel_field::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),

    #[error("solver reported an error; see the progress output above")]
    SolverFailed,
}

/// What to do when results for the configuration already exist.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Reuse {
    /// Ask on the terminal
    Ask,
    /// Reuse without asking
    Always,
    /// Always recompute
    Never,
}

/// Transcranial ultrasound simulation runner.
#[derive(Parser)]
#[command(name = "babel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the result bundle paths of a configuration
    Paths {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Run the solver, or reuse cached results
    Run {
        #[command(flatten)]
        run: RunArgs,

        /// Solver program
        #[arg(long)]
        solver: PathBuf,

        /// Leading argument passed to the solver before the run keywords
        #[arg(long = "solver-arg", allow_hyphen_values = true)]
        solver_args: Vec<String>,

        /// Handling of existing results
        #[arg(long, value_enum, default_value = "ask")]
        reuse: Reuse,

        /// Skin-to-target distance (mm); post-process the results when given
        #[arg(long)]
        distance_mm: Option<f64>,
    },

    /// Post-process cached results and print the field summary as JSON
    Postprocess {
        #[command(flatten)]
        run: RunArgs,

        /// Skin-to-target distance (mm)
        #[arg(long)]
        distance_mm: f64,

        /// Write the summary here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show information about a result bundle file
    Info {
        /// Bundle file
        input: PathBuf,
    },
}

/// Parameters that make up a [`SimulationConfig`].
#[derive(Args)]
struct RunArgs {
    /// Subject identifier
    #[arg(long)]
    subject: String,

    /// Path prefix of the result files
    #[arg(long)]
    prefix: PathBuf,

    /// Transducer system name
    #[arg(long, default_value = "H246")]
    tx_system: String,

    /// Directory holding the subject folders
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Transducer profile document (JSON)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Transducer model from the profile document
    #[arg(long)]
    model: Option<String>,

    /// Focal length (mm), when no profile is given
    #[arg(long)]
    focal_length_mm: Option<f64>,

    /// Aperture diameter (mm), when no profile is given
    #[arg(long)]
    diameter_mm: Option<f64>,

    /// Mechanical adjustment X (mm)
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    mech_x: f64,

    /// Mechanical adjustment Y (mm)
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    mech_y: f64,

    /// Mechanical adjustment Z (mm)
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    mech_z: f64,

    /// Steering distance (mm), clamped to the profile's range
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    steering_mm: f64,

    /// Frequency (kHz); repeat for several
    #[arg(long = "frequency-khz", default_value = "500")]
    frequencies_khz: Vec<f64>,

    /// Points per wavelength, one per frequency
    #[arg(long = "ppw", default_value = "6")]
    ppw: Vec<u32>,

    /// Compute device name (overrides the profile)
    #[arg(long)]
    device: Option<String>,

    /// Computing backend (overrides the profile)
    #[arg(long)]
    backend: Option<ComputingBackend>,
}

impl RunArgs {
    fn to_config(&self) -> Result<SimulationConfig> {
        let mut device = ComputeDevice::default();
        let steering_m = self.steering_mm / 1e3;
        let (geometry, steering_m, bounds) = match &self.profile {
            Some(path) => {
                let profiles = ProfileConfig::from_file(path)?;
                let profile = profiles.profile(self.model.as_deref())?;
                device = profiles.device.clone();
                (
                    profile.geometry(),
                    profile.clamp_steering_m(steering_m),
                    profile.steering_bounds_m,
                )
            }
            None => {
                let (Some(focal), Some(diameter)) = (self.focal_length_mm, self.diameter_mm) else {
                    return Err(CliError::Usage(
                        "either --profile or both --focal-length-mm and --diameter-mm are required"
                            .to_string(),
                    ));
                };
                let geometry = TransducerGeometry {
                    focal_length_m: focal / 1e3,
                    diameter_m: diameter / 1e3,
                };
                (geometry, steering_m, None)
            }
        };
        if let Some(name) = &self.device {
            device.name.clone_from(name);
        }
        if let Some(backend) = self.backend {
            device.backend = backend;
        }

        let mut config = SimulationConfig::new(&self.subject, &self.prefix, geometry)
            .with_tx_system(&self.tx_system)
            .with_base_dir(&self.base_dir)
            .with_mechanical(MechanicalAdjustment::from_mm(
                self.mech_x,
                self.mech_y,
                self.mech_z,
            ))
            .with_steering(steering_m, bounds)
            .with_frequencies(
                self.frequencies_khz.iter().map(|f| f * 1e3).collect(),
                self.ppw.clone(),
            )
            .with_device(device);
        if let Some(model) = &self.model {
            config = config.with_model_tag(model);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Terminal presenter for a run.
struct ConsoleObserver {
    reuse: Reuse,
}

impl RunObserver for ConsoleObserver {
    fn confirm_reuse(&mut self, summary: &CachedRunSummary) -> bool {
        eprintln!("Results for this configuration already exist:");
        eprint!("{summary}");
        match self.reuse {
            Reuse::Always => true,
            Reuse::Never => false,
            Reuse::Ask => ask("Reuse previous results? [y/N] ").unwrap_or(false),
        }
    }

    fn set_busy(&mut self, busy: bool) {
        if busy {
            eprintln!("Running solver...");
        }
    }

    fn on_progress(&mut self, event: &ProgressEvent) {
        if event.is_error() {
            log::error!("{}", event.line);
        } else {
            log::info!("{}", event.line);
        }
    }

    fn on_solver_failure(&mut self) {
        eprintln!("There was an error in execution of the solver.");
    }
}

fn ask(prompt: &str) -> std::io::Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn postprocess(full: &ResultBundle, water: &ResultBundle, distance_mm: f64) -> Result<FieldSummary> {
    let field = FieldPostprocessor::new().process(full, water, full.target_location, distance_mm)?;
    Ok(field.summary())
}

fn write_summary(summary: &FieldSummary, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    match output {
        Some(path) => std::fs::write(path, json + "\n")?,
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Paths { run } => {
            let config = run.to_config()?;
            let store = ResultStore::new();
            for variant in BundleVariant::ALL {
                println!("{}", store.path_for(&config, variant).display());
            }
            println!(
                "cached: {}",
                if store.has_cached_result(&config) { "yes" } else { "no" }
            );
        }

        Commands::Run {
            run,
            solver,
            solver_args,
            reuse,
            distance_mm,
        } => {
            let config = run.to_config()?;
            let command = solver_args
                .iter()
                .fold(SolverCommand::new(solver), |cmd, arg| cmd.arg(arg));
            let orchestrator = SimulationOrchestrator::new(command);
            let mut observer = ConsoleObserver { reuse };

            let force = matches!(reuse, Reuse::Never);
            let outcome = orchestrator.run(&config, force, &mut observer)?;
            let label = match &outcome {
                RunOutcome::CacheHit(_) => "reused cached results",
                RunOutcome::Computed(_) => "simulation complete",
                RunOutcome::Error => return Err(CliError::SolverFailed),
            };
            eprintln!("{label}");

            if let (Some(distance_mm), Some(pair)) = (distance_mm, outcome.bundles()) {
                let summary = postprocess(&pair.full, &pair.water, distance_mm)?;
                write_summary(&summary, None)?;
            }
        }

        Commands::Postprocess {
            run,
            distance_mm,
            output,
        } => {
            let config = run.to_config()?;
            let (full, water) = ResultStore::new().load(&config)?;
            let summary = postprocess(&full, &water, distance_mm)?;
            write_summary(&summary, output.as_deref())?;
            if let Some(path) = output {
                eprintln!("Summary written to {}", path.display());
            }
        }

        Commands::Info { input } => {
            let bundle = read_bundle_hdf5(&input)?;
            let [nx, ny, nz] = bundle.shape();

            println!("File: {}", input.display());
            println!("Grid: {nx} x {ny} x {nz}");
            if let [first, second, ..] = bundle.x_vec.as_slice() {
                println!("Pitch: {:.3} mm", (second - first) * 1e3);
            }
            println!("Target voxel: {:?}", bundle.target_location);
            println!("Material rows: {}", bundle.material.len());
            let peak = bundle.p_amp.iter().copied().fold(0.0_f64, f64::max);
            println!("Peak pressure: {peak:.4e} Pa");
            let [ax, ay, az] = bundle.adjustment_in_ras.map(|m| m * 1e3);
            println!("Adjustment in RAS: {ax:.2}, {ay:.2}, {az:.2} mm");
            print!("{}", bundle.summary());
        }
    }

    Ok(())
}
