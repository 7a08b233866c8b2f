//! Casing Simulation Core Library
//!
//! Configures and runs electromagnetic forward simulations of currents on
//! steel well casings. A casing model sizes a tensor or cylindrical mesh
//! (with geometric padding to push the boundary out to effective infinity),
//! the model is mapped onto per-cell conductivity and permeability, and one of
//! three forward problems is solved on it:
//!
//! - DC resistivity (cell-centred potential)
//! - Frequency-domain EM (edge electric field, one solve per frequency)
//! - Time-domain EM (backward Euler, step-on or step-off source)
//!
//! Every configuration component round-trips through a JSON parameter file
//! and the solution is written as a NumPy `.npy` array.
//!
//! ## Example
//!
//! ```rust,ignore
//! use casing_sim_core::{CasingParameters, CylMeshSpec, MeshGenerator, Simulation, SimulationParameters, Vec3};
//! use std::sync::Arc;
//!
//! let casing = Arc::new(CasingParameters::default());
//! let mesh = MeshGenerator::cylindrical(Arc::clone(&casing), CylMeshSpec::default());
//! let mut sim = Simulation::dc(
//!     casing,
//!     mesh,
//!     Vec3::new(0.0, 0.0, -975.0),
//!     Vec3::new(1000.0, 0.0, -975.0),
//!     SimulationParameters::in_directory("run"),
//! )?;
//! sim.run()?;
//! ```

// Core types and constants
pub mod core_types;

// Configuration and on-disk formats
pub mod io;
pub mod model;
pub mod sources;

// Discretization and numerics
pub mod mesh;
pub mod physics;
pub mod solver;

// Orchestration
pub mod simulation;

// Re-export core types
pub use core_types::{Vec3, MU_0};

// Re-export configuration types
pub use io::{ParameterFile, PersistenceError};
pub use model::{Background, CasingParameters, ModelError, PhysicalProperties};
pub use sources::{SourceKind, SourceParameters, Waveform};

// Re-export mesh and physics types
pub use mesh::{CylMeshSpec, Mesh, MeshError, MeshGenerator, MeshKind, MeshSpec, TensorMeshSpec};
pub use physics::{Fields, ForwardProblem, Formulation, Physics, PhysicsError, PhysicsKind};
pub use solver::{SolverConfig, SolverError};

// Re-export the driver
pub use simulation::{Simulation, SimulationError, SimulationParameters, SimulationState};
