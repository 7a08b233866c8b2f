//! Command-line driver for casing simulations.

use anyhow::{bail, Context, Result};
use casing_sim_core::io::npy::{self, NpyData};
use casing_sim_core::solver::SolverPreference;
use casing_sim_core::{
    CasingParameters, CylMeshSpec, Formulation, MeshGenerator, ParameterFile, Physics,
    PhysicsKind, Simulation, SimulationParameters, SourceParameters, TensorMeshSpec,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Electromagnetic simulations of currents on steel well casings
#[derive(Parser, Debug)]
#[command(name = "casing-sim")]
#[command(about = "EM forward simulations on well casings", long_about = None)]
struct Args {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulation from casing, mesh and source parameter files
    Run {
        /// Physics to run (FDEM, TDEM or DC)
        #[arg(long)]
        physics: PhysicsKind,

        /// Reported field (e, b, h, j); defaults by physics
        #[arg(long)]
        formulation: Option<Formulation>,

        /// Casing model parameter file
        #[arg(long, default_value = "ModelParameters.json")]
        casing: PathBuf,

        /// Mesh generator parameter file
        #[arg(long, default_value = "MeshParameters.json")]
        mesh: PathBuf,

        /// Source parameter file
        #[arg(long, default_value = "SourceParameters.json")]
        source: PathBuf,

        #[command(flatten)]
        run: RunOptions,
    },

    /// Re-run a saved simulation
    Resume {
        /// Saved simulation file
        #[arg(default_value = "simulationParameters.json")]
        path: PathBuf,

        /// Override the thread count
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },

    /// Build the mesh for a casing model and print its summary
    Mesh {
        /// Mesh generator parameter file
        #[arg(long, default_value = "MeshParameters.json")]
        mesh: PathBuf,

        /// Casing model parameter file; the one stored with the mesh when omitted
        #[arg(long)]
        casing: Option<PathBuf>,
    },

    /// Write default parameter files and a run script into a directory
    Init {
        /// Target directory
        directory: PathBuf,

        /// Physics of the run script
        #[arg(long, default_value = "DC")]
        physics: PhysicsKind,

        /// Mesh kind
        #[arg(long, value_enum, default_value_t = MeshChoice::Cylindrical)]
        mesh: MeshChoice,
    },

    /// Print the shape and range of a field file
    Inspect {
        /// `.npy` field file
        path: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RunOptions {
    /// Working directory
    #[arg(short, long, default_value = ".")]
    directory: PathBuf,

    /// Field file name (defaults to fields.npy, fieldsDC.npy for DC)
    #[arg(long)]
    fields_filename: Option<String>,

    /// Solver threads
    #[arg(short = 'j', long, default_value_t = 1)]
    threads: usize,

    /// Skip direct factorizations
    #[arg(long)]
    iterative: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MeshChoice {
    Tensor,
    Cylindrical,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(
    physics: PhysicsKind,
    formulation: Option<Formulation>,
    files: [&Path; 3],
    options: RunOptions,
    verbose: bool,
) -> Result<()> {
    let [casing_path, mesh_path, source_path] = files;
    let physics = match formulation {
        Some(formulation) => Physics::with_formulation(physics, formulation)?,
        None => Physics::from_kind(physics),
    };

    let casing = CasingParameters::load(casing_path)
        .with_context(|| format!("loading casing model {}", casing_path.display()))?;
    let mesh = MeshGenerator::load(mesh_path)
        .with_context(|| format!("loading mesh generator {}", mesh_path.display()))?;
    let source = SourceParameters::load(source_path)
        .with_context(|| format!("loading source {}", source_path.display()))?;

    let mut parameters = SimulationParameters::in_directory(options.directory);
    parameters.fields_filename = options.fields_filename;
    parameters.num_threads = options.threads;
    parameters.verbose = verbose;
    if options.iterative {
        parameters.solver.preference = SolverPreference::Iterative;
    }

    let mut sim = Simulation::new(physics, Arc::new(casing), mesh, Some(source), parameters)?;
    finish(&mut sim)
}

fn finish(sim: &mut Simulation) -> Result<()> {
    let (rows, cols) = sim.run()?.shape();
    info!(
        "Wrote {} x {} array to {}",
        rows,
        cols,
        sim.fields_path().display()
    );
    Ok(())
}

fn resume(path: &Path, threads: Option<usize>, verbose: bool) -> Result<()> {
    let mut file = casing_sim_core::simulation::SimulationFile::load(path)
        .with_context(|| format!("loading simulation {}", path.display()))?;
    if let Some(threads) = threads {
        file.parameters.num_threads = threads;
    }
    file.parameters.verbose |= verbose;
    let mut sim = Simulation::from_file(file)?;
    finish(&mut sim)
}

fn mesh_summary(mesh_path: &Path, casing_path: Option<&Path>) -> Result<()> {
    let mut generator = MeshGenerator::load(mesh_path)
        .with_context(|| format!("loading mesh generator {}", mesh_path.display()))?;
    if let Some(path) = casing_path {
        let casing = CasingParameters::load(path)
            .with_context(|| format!("loading casing model {}", path.display()))?;
        generator.set_casing(Arc::new(casing));
    }

    let mesh = generator.mesh()?;
    let [nx, ny, nz] = mesh.shape();
    println!("kind:   {:?}", mesh.kind());
    println!("shape:  {} x {} x {} ({} cells)", nx, ny, nz, mesh.n_cells());
    for (axis, name) in ["x", "y", "z"].iter().enumerate() {
        let (lo, hi) = mesh.extent(axis);
        let h = mesh.h(axis);
        let min = h.iter().copied().fold(f64::INFINITY, f64::min);
        let max = h.iter().copied().fold(0.0, f64::max);
        println!("{name}:      [{lo:.4}, {hi:.4}]  widths {min:.4e} .. {max:.4e}");
    }
    Ok(())
}

fn init(directory: &Path, physics: PhysicsKind, mesh: MeshChoice) -> Result<()> {
    let casing = Arc::new(CasingParameters::default());
    let generator = match mesh {
        MeshChoice::Tensor => MeshGenerator::tensor(Arc::clone(&casing), TensorMeshSpec::default()),
        MeshChoice::Cylindrical => {
            if physics != PhysicsKind::Dc {
                bail!("{physics} runs need a tensor mesh");
            }
            MeshGenerator::cylindrical(Arc::clone(&casing), CylMeshSpec::default())
        }
    };

    let sim = Simulation::new(
        Physics::from_kind(physics),
        casing,
        generator,
        Some(SourceParameters::default()),
        SimulationParameters::in_directory(directory),
    )?;
    let script = sim.write_script()?;
    let saved = sim.save()?;
    println!("Wrote {} and {}", script.display(), saved.display());
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let array = npy::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (dtype, max_abs) = match &array.data {
        NpyData::Float64(v) => ("float64", v.iter().fold(0.0, |m: f64, x| m.max(x.abs()))),
        NpyData::Complex128(v) => ("complex128", v.iter().fold(0.0, |m: f64, x| m.max(x.norm()))),
    };
    println!("shape:  {:?}", array.shape);
    println!("dtype:  {dtype}");
    println!("order:  {}", if array.fortran_order { "F" } else { "C" });
    println!("max |v|: {max_abs:.6e}");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Run {
            physics,
            formulation,
            casing,
            mesh,
            source,
            run: options,
        } => run(
            physics,
            formulation,
            [&casing, &mesh, &source],
            options,
            args.verbose,
        ),
        Command::Resume { path, threads } => resume(&path, threads, args.verbose),
        Command::Mesh { mesh, casing } => mesh_summary(&mesh, casing.as_deref()),
        Command::Init {
            directory,
            physics,
            mesh,
        } => init(&directory, physics, mesh),
        Command::Inspect { path } => inspect(&path),
    }
}
