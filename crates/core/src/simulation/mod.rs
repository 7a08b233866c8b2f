//! Simulation driver
//!
//! A `Simulation` ties the casing model, the mesh generator, the source and
//! the run parameters to one physics choice, and walks a fixed lifecycle:
//!
//! ```text
//! Constructed -> Validated -> Solved -> Persisted
//!       \____________\___________\______> Failed
//! ```
//!
//! Validation checks every input and resolves the linear solver backend once.
//! Solving builds the physical properties and the forward problem and runs it
//! inside a dedicated rayon pool. Persisting writes the solution array
//! through a temporary file so a failed run never leaves a partial field file.

pub mod parameters;

pub use parameters::{SimulationFile, SimulationParameters};

use crate::core_types::Vec3;
use crate::io::script::{write_run_script, RunScript};
use crate::io::{NpyError, ParameterFile, PersistenceError};
use crate::mesh::{Mesh, MeshError, MeshGenerator};
use crate::model::{CasingParameters, ModelError, PhysicalProperties};
use crate::physics::{
    create_problem, position, Fields, Physics, PhysicsError, PhysicsKind, SolverSetup, Survey,
};
use crate::solver::{Backend, SolverError};
use crate::sources::{SourceError, SourceParameters};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle state of a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationState {
    #[default]
    Constructed,
    Validated,
    Solved,
    Persisted,
    Failed,
}

/// Errors raised while configuring or running a simulation
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Physics(#[from] PhysicsError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Npy(#[from] NpyError),
    /// No source configured
    #[error("simulation has no source")]
    MissingSource,
    /// A run parameter is out of range
    #[error("invalid simulation parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// Operation not allowed in the current state
    #[error("cannot {operation} a simulation in state {state:?}")]
    InvalidTransition {
        /// Attempted operation
        operation: &'static str,
        /// State at the time
        state: SimulationState,
    },
    /// Filesystem failure outside the parameter files
    #[error("i/o error on {}: {message}", path.display())]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        message: String,
    },
    /// A saved simulation whose mesh generator carries a different casing
    #[error("mesh generator casing differs from the simulation casing")]
    CasingMismatch,
    /// The solve thread pool could not be created
    #[error("failed to build a pool of {threads} threads: {message}")]
    ThreadPool {
        /// Requested threads
        threads: usize,
        /// Underlying error
        message: String,
    },
}

/// A configured forward simulation
#[derive(Debug)]
pub struct Simulation {
    physics: Physics,
    parameters: SimulationParameters,
    casing: Arc<CasingParameters>,
    mesh: MeshGenerator,
    source: Option<SourceParameters>,
    state: SimulationState,
    backend: Option<Backend>,
    props: Option<Arc<PhysicalProperties>>,
    fields: Option<Fields>,
}

fn io_error(path: &Path, e: &std::io::Error) -> SimulationError {
    SimulationError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

impl Simulation {
    /// Wire the components together and create the working directory
    ///
    /// The mesh generator is pointed at `casing`, and an unset source physics
    /// is filled in with this simulation's physics.
    ///
    /// # Errors
    /// Returns error if the working directory cannot be created
    pub fn new(
        physics: Physics,
        casing: Arc<CasingParameters>,
        mut mesh: MeshGenerator,
        mut source: Option<SourceParameters>,
        parameters: SimulationParameters,
    ) -> Result<Self, SimulationError> {
        fs::create_dir_all(&parameters.directory)
            .map_err(|e| io_error(&parameters.directory, &e))?;

        mesh.set_casing(Arc::clone(&casing));
        if let Some(src) = source.as_mut() {
            if src.physics.is_none() {
                src.physics = Some(physics.kind());
            }
        }

        Ok(Self {
            physics,
            parameters,
            casing,
            mesh,
            source,
            state: SimulationState::Constructed,
            backend: None,
            props: None,
            fields: None,
        })
    }

    /// DC simulation of a dipole between `src_a` and `src_b`
    ///
    /// # Errors
    /// Returns error if the working directory cannot be created
    pub fn dc(
        casing: Arc<CasingParameters>,
        mesh: MeshGenerator,
        src_a: Vec3,
        src_b: Vec3,
        parameters: SimulationParameters,
    ) -> Result<Self, SimulationError> {
        let source = SourceParameters::dipole(src_a, src_b).with_physics(PhysicsKind::Dc);
        Self::new(Physics::Dc, casing, mesh, Some(source), parameters)
    }

    /// Rebuild a saved simulation
    ///
    /// # Errors
    /// Returns error if the file cannot be read or the directory created
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SimulationError> {
        let file = SimulationFile::load(path)?;
        Self::from_file(file)
    }

    /// Rebuild from the on-disk form
    ///
    /// # Errors
    /// Returns error if the mesh generator was saved with another casing, or
    /// the working directory cannot be created
    pub fn from_file(file: SimulationFile) -> Result<Self, SimulationError> {
        if **file.mesh.casing() != file.casing {
            return Err(SimulationError::CasingMismatch);
        }
        Self::new(
            file.physics,
            Arc::new(file.casing),
            file.mesh,
            file.source,
            file.parameters,
        )
    }

    /// On-disk form of this simulation
    #[must_use]
    pub fn to_file(&self) -> SimulationFile {
        SimulationFile {
            physics: self.physics,
            parameters: self.parameters.clone(),
            casing: CasingParameters::clone(&self.casing),
            mesh: self.mesh.clone(),
            source: self.source.clone(),
        }
    }

    /// Save to `directory/filename`
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn save(&self) -> Result<PathBuf, PersistenceError> {
        self.to_file().save(&self.parameters.directory)
    }

    #[must_use]
    pub fn physics(&self) -> Physics {
        self.physics
    }

    #[must_use]
    pub fn parameters(&self) -> &SimulationParameters {
        &self.parameters
    }

    #[must_use]
    pub fn casing(&self) -> &Arc<CasingParameters> {
        &self.casing
    }

    #[must_use]
    pub fn mesh_generator(&self) -> &MeshGenerator {
        &self.mesh
    }

    #[must_use]
    pub fn source(&self) -> Option<&SourceParameters> {
        self.source.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// Backend chosen at validation
    #[must_use]
    pub fn backend(&self) -> Option<Backend> {
        self.backend
    }

    /// Fields of a solved simulation
    #[must_use]
    pub fn fields(&self) -> Option<&Fields> {
        self.fields.as_ref()
    }

    /// Field file name, defaulted by physics
    #[must_use]
    pub fn fields_filename(&self) -> &str {
        self.parameters
            .fields_filename
            .as_deref()
            .unwrap_or_else(|| self.physics.default_fields_filename())
    }

    /// Full path of the field file
    #[must_use]
    pub fn fields_path(&self) -> PathBuf {
        self.parameters.directory.join(self.fields_filename())
    }

    /// Physical properties on the current mesh, built on first access
    ///
    /// # Errors
    /// Returns error if the mesh cannot be built
    pub fn physprops(&mut self) -> Result<Arc<PhysicalProperties>, SimulationError> {
        if let Some(props) = &self.props {
            return Ok(Arc::clone(props));
        }
        let props = Arc::new(PhysicalProperties::new(
            Arc::clone(&self.casing),
            self.mesh.mesh()?,
        ));
        if self.parameters.verbose {
            info!(
                "Physical properties: {} cells, {} casing cells",
                props.sigma().len(),
                props.n_casing_cells()
            );
        }
        self.props = Some(Arc::clone(&props));
        Ok(props)
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[SimulationState],
    ) -> Result<(), SimulationError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SimulationError::InvalidTransition {
                operation,
                state: self.state,
            })
        }
    }

    fn record<T>(&mut self, result: Result<T, SimulationError>) -> Result<T, SimulationError> {
        if let Err(e) = &result {
            warn!("Simulation failed: {}", e);
            self.state = SimulationState::Failed;
        }
        result
    }

    /// Check all inputs and resolve the solver backend
    ///
    /// # Errors
    /// Returns the first configuration problem found; the simulation is then
    /// `Failed`
    pub fn validate(&mut self) -> Result<(), SimulationError> {
        self.expect_state(
            "validate",
            &[SimulationState::Constructed, SimulationState::Validated],
        )?;
        let result = self.check_inputs();
        self.record(result)?;
        self.state = SimulationState::Validated;
        Ok(())
    }

    fn check_inputs(&mut self) -> Result<(), SimulationError> {
        info!("Validating parameters...");
        self.casing.validate()?;
        match self.physics.kind() {
            PhysicsKind::Fdem => self.casing.validate_frequencies()?,
            PhysicsKind::Tdem => self.casing.validate_time_steps()?,
            PhysicsKind::Dc => {}
        }
        if self.parameters.num_threads == 0 {
            return Err(SimulationError::InvalidParameter {
                name: "num_threads",
                reason: "must be at least 1".into(),
            });
        }

        let mesh = self.mesh.mesh()?;
        log_mesh_summary(&mesh);

        let kind = self.physics.kind();
        let source = self.source.as_mut().ok_or(SimulationError::MissingSource)?;
        source.attach(kind)?;
        source.validate(&self.casing)?;
        let waveform = source.waveform;
        let (src_a, src_b) = source.electrodes(&self.casing);

        self.physics.check_support(mesh.kind(), waveform)?;
        for (name, p) in [("A", src_a), ("B", src_b)] {
            if mesh.locate(&p).is_none() {
                return Err(PhysicsError::ElectrodeOutsideMesh {
                    name,
                    position: position(&p),
                }
                .into());
            }
        }

        let unknowns = self.physics.unknowns(mesh.shape());
        self.backend = Some(
            self.parameters
                .solver
                .select(self.physics.system_kind(), unknowns),
        );
        Ok(())
    }

    /// Run the forward problem
    ///
    /// # Errors
    /// Returns error if the simulation is not validated or the solve fails
    pub fn solve(&mut self) -> Result<&Fields, SimulationError> {
        self.expect_state("solve", &[SimulationState::Validated])?;
        let result = self.run_problem();
        let fields = self.record(result)?;
        self.fields = Some(fields);
        self.state = SimulationState::Solved;
        self.fields.as_ref().ok_or(SimulationError::InvalidTransition {
            operation: "solve",
            state: self.state,
        })
    }

    fn run_problem(&mut self) -> Result<Fields, SimulationError> {
        let backend = self.backend.ok_or(SimulationError::InvalidTransition {
            operation: "solve",
            state: self.state,
        })?;
        let source = self.source.as_ref().ok_or(SimulationError::MissingSource)?;
        let survey = Survey::for_physics(self.physics.kind(), &self.casing, source);
        let problem = create_problem(
            self.physics,
            survey,
            SolverSetup {
                backend,
                criteria: self.parameters.solver.criteria,
            },
        );

        let threads = self.parameters.num_threads;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| SimulationError::ThreadPool {
                threads,
                message: e.to_string(),
            })?;

        info!(
            "Starting {} ({} formulation) on {} thread(s)",
            self.physics.kind(),
            self.physics.formulation(),
            threads
        );
        let start = Instant::now();
        let props = pool.install(|| self.physprops())?;
        let fields = pool.install(|| problem.fields(&props))?;
        info!("   ... Done. Elapsed time: {:.2?}", start.elapsed());
        debug!("Solution {} has shape {:?}", fields.solution_key(), fields.shape());
        Ok(fields)
    }

    /// Write the solution array to the field file
    ///
    /// # Errors
    /// Returns error if the simulation is not solved or the file cannot be
    /// written
    pub fn persist(&mut self) -> Result<PathBuf, SimulationError> {
        self.expect_state("persist", &[SimulationState::Solved])?;
        let result = self.write_fields();
        let path = self.record(result)?;
        self.state = SimulationState::Persisted;
        Ok(path)
    }

    fn write_fields(&self) -> Result<PathBuf, SimulationError> {
        let fields = self.fields.as_ref().ok_or(SimulationError::InvalidTransition {
            operation: "persist",
            state: self.state,
        })?;
        let path = self.fields_path();
        let partial = path.with_extension("npy.partial");

        if let Err(e) = fields.write_npy(&partial) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        fs::rename(&partial, &path).map_err(|e| io_error(&path, &e))?;
        info!("Saved {} to {}", fields.solution_key(), path.display());
        Ok(path)
    }

    /// Validate, save the parameters, solve and persist
    ///
    /// # Errors
    /// Returns the first failure of any stage
    pub fn run(&mut self) -> Result<&Fields, SimulationError> {
        if self.state == SimulationState::Constructed {
            self.validate()?;
        }
        if self.state == SimulationState::Validated {
            let saved = self.save();
            self.record(saved.map_err(SimulationError::from))?;
            self.solve()?;
        }
        if self.state == SimulationState::Solved {
            self.persist()?;
        }
        self.expect_state("run", &[SimulationState::Persisted])?;
        self.fields.as_ref().ok_or(SimulationError::InvalidTransition {
            operation: "run",
            state: self.state,
        })
    }

    /// Save the casing, mesh and source files and a `simulation.sh` that
    /// re-runs them
    ///
    /// # Errors
    /// Returns error if there is no source or a file cannot be written
    pub fn write_script(&self) -> Result<PathBuf, SimulationError> {
        let source = self.source.as_ref().ok_or(SimulationError::MissingSource)?;
        let directory = &self.parameters.directory;

        self.casing.save(directory)?;
        self.mesh.save(directory)?;
        source.save(directory)?;

        let script = RunScript {
            physics: self.physics.kind().to_string(),
            formulation: self.physics.formulation().to_string(),
            casing: self.casing.filename.clone(),
            mesh: self.mesh.filename().to_string(),
            source: source.filename.clone(),
        };
        Ok(write_run_script(directory, &script)?)
    }
}

fn log_mesh_summary(mesh: &Mesh) {
    let (_, max_x) = mesh.extent(0);
    let (min_z, max_z) = mesh.extent(2);
    info!(
        "      max x: {:.1}, min z: {:.1}, max z: {:.1}, nC: {}",
        max_x,
        min_z,
        max_z,
        mesh.n_cells()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{CylMeshSpec, TensorMeshSpec};

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("casing-sim-simulation-{}-{name}", std::process::id()))
    }

    fn small_casing() -> Arc<CasingParameters> {
        Arc::new(CasingParameters {
            casing_l: 10.0,
            src_a: Vec3::new(0.0, 0.0, -5.0),
            src_b: Vec3::new(40.0, 0.0, -5.0),
            ..Default::default()
        })
    }

    fn small_tensor(casing: &Arc<CasingParameters>) -> MeshGenerator {
        MeshGenerator::tensor(
            Arc::clone(casing),
            TensorMeshSpec {
                csx: 10.0,
                csy: 10.0,
                csz: 10.0,
                nch: 1,
                nca: 1,
                ncb: 1,
                npadx: 2,
                npady: 2,
                npadz: 2,
                domain_y: 20.0,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_new_fills_source_physics_and_creates_directory() {
        let dir = scratch("new").join("nested");
        let casing = small_casing();
        let sim = Simulation::new(
            Physics::fdem(),
            Arc::clone(&casing),
            small_tensor(&casing),
            Some(SourceParameters::default()),
            SimulationParameters::in_directory(&dir),
        )
        .unwrap();

        assert!(dir.is_dir());
        assert_eq!(sim.source().unwrap().physics, Some(PhysicsKind::Fdem));
        assert_eq!(sim.state(), SimulationState::Constructed);
        assert_eq!(sim.fields_filename(), "fields.npy");
        let _ = fs::remove_dir_all(scratch("new"));
    }

    #[test]
    fn test_validate_without_source_fails() {
        let dir = scratch("nosource");
        let casing = small_casing();
        let mut sim = Simulation::new(
            Physics::tdem(),
            Arc::clone(&casing),
            small_tensor(&casing),
            None,
            SimulationParameters::in_directory(&dir),
        )
        .unwrap();

        assert!(matches!(sim.validate(), Err(SimulationError::MissingSource)));
        assert_eq!(sim.state(), SimulationState::Failed);
        assert!(matches!(
            sim.solve(),
            Err(SimulationError::InvalidTransition { operation: "solve", .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_validate_rejects_em_on_cylindrical_mesh() {
        let dir = scratch("cylem");
        let casing = small_casing();
        let mesh = MeshGenerator::cylindrical(Arc::clone(&casing), CylMeshSpec::default());
        let mut sim = Simulation::new(
            Physics::fdem(),
            Arc::clone(&casing),
            mesh,
            Some(SourceParameters::default()),
            SimulationParameters::in_directory(&dir),
        )
        .unwrap();

        assert!(matches!(
            sim.validate(),
            Err(SimulationError::Physics(PhysicsError::Unsupported { .. }))
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_source_physics_mismatch_fails_validation() {
        let dir = scratch("mismatch");
        let casing = small_casing();
        let source = SourceParameters::default().with_physics(PhysicsKind::Tdem);
        let mut sim = Simulation::new(
            Physics::fdem(),
            Arc::clone(&casing),
            small_tensor(&casing),
            Some(source),
            SimulationParameters::in_directory(&dir),
        )
        .unwrap();

        assert!(matches!(
            sim.validate(),
            Err(SimulationError::Source(SourceError::PhysicsMismatch { .. }))
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let dir = scratch("threads");
        let casing = small_casing();
        let params = SimulationParameters {
            num_threads: 0,
            ..SimulationParameters::in_directory(&dir)
        };
        let mut sim = Simulation::dc(
            Arc::clone(&casing),
            small_tensor(&casing),
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(20.0, 0.0, -5.0),
            params,
        )
        .unwrap();
        assert!(matches!(
            sim.validate(),
            Err(SimulationError::InvalidParameter { name: "num_threads", .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_dc_run_on_tensor_mesh() {
        let dir = scratch("dcrun");
        let casing = small_casing();
        let mut sim = Simulation::dc(
            Arc::clone(&casing),
            small_tensor(&casing),
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(20.0, 0.0, -5.0),
            SimulationParameters::in_directory(&dir),
        )
        .unwrap();

        let n_cells = sim.mesh_generator().mesh().unwrap().n_cells();
        let shape = sim.run().unwrap().shape();
        assert_eq!(shape, (n_cells, 1));
        assert_eq!(sim.state(), SimulationState::Persisted);
        assert_eq!(sim.backend(), Some(Backend::Cholesky));
        assert!(sim.fields_path().ends_with("fieldsDC.npy"));
        assert!(sim.fields_path().is_file());
        assert!(dir.join("simulationParameters.json").is_file());
        assert!(!dir.join("fieldsDC.npy.partial").exists());

        assert!(matches!(
            sim.persist(),
            Err(SimulationError::InvalidTransition { .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = scratch("saveload");
        let casing = small_casing();
        let sim = Simulation::new(
            Physics::tdem(),
            Arc::clone(&casing),
            small_tensor(&casing),
            Some(SourceParameters::default()),
            SimulationParameters::in_directory(&dir),
        )
        .unwrap();

        let path = sim.save().unwrap();
        let loaded = Simulation::load(&path).unwrap();
        assert_eq!(loaded.to_file(), sim.to_file());
        assert_eq!(loaded.physics(), Physics::tdem());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_rejects_disagreeing_casings() {
        let dir = scratch("casing_mismatch");
        let casing = small_casing();
        let sim = Simulation::new(
            Physics::Dc,
            Arc::clone(&casing),
            small_tensor(&casing),
            Some(SourceParameters::default()),
            SimulationParameters::in_directory(&dir),
        )
        .unwrap();

        let mut file = sim.to_file();
        assert!(Simulation::from_file(file.clone()).is_ok());

        file.casing.sigma_back *= 10.0;
        assert!(matches!(
            Simulation::from_file(file),
            Err(SimulationError::CasingMismatch)
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_script_saves_parameter_files() {
        let dir = scratch("script");
        let casing = small_casing();
        let sim = Simulation::new(
            Physics::fdem(),
            Arc::clone(&casing),
            small_tensor(&casing),
            Some(SourceParameters::default()),
            SimulationParameters::in_directory(&dir),
        )
        .unwrap();

        let script = sim.write_script().unwrap();
        assert!(dir.join("ModelParameters.json").is_file());
        assert!(dir.join("MeshParameters.json").is_file());
        assert!(dir.join("SourceParameters.json").is_file());
        let text = fs::read_to_string(script).unwrap();
        assert!(text.contains("--physics FDEM"));
        assert!(text.contains("--formulation h"));
        let _ = fs::remove_dir_all(&dir);
    }
}
