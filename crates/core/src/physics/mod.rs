//! Forward problems
//!
//! Three closed physics choices are dispatched onto a mesh:
//!
//! - `Dc` - cell-centred potential for a grounded dipole
//! - `Fdem` - frequency-domain electric field on mesh edges
//! - `Tdem` - transient electric field, backward Euler in time
//!
//! Every problem implements `ForwardProblem`, taking the per-cell physical
//! properties and returning a `Fields` array with one column per frequency,
//! time or (for DC) a single column.
//!
//! # Module Organization
//!
//! - `survey` - sources expanded over frequencies / times
//! - `fields` - solved field arrays and their NPY output
//! - `em` - operators and wire-path source shared by FDEM and TDEM
//! - `dc`, `fdem`, `tdem` - the three forward problems

pub mod dc;
pub(crate) mod em;
pub mod fdem;
pub mod fields;
pub mod survey;
pub mod tdem;

pub use dc::DcProblem;
pub use fdem::FdemProblem;
pub use fields::{FieldColumns, FieldLocation, FieldValues, Fields};
pub use survey::{Survey, SurveySource};
pub use tdem::TdemProblem;

use crate::core_types::Vec3;
use crate::mesh::{MeshError, MeshKind};
use crate::model::{ModelError, PhysicalProperties};
use crate::solver::{Backend, ConvergenceCriteria, SolverError, SystemKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while setting up or running a forward problem
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// Operator assembly failed
    #[error(transparent)]
    Mesh(#[from] MeshError),
    /// Linear solve failed
    #[error(transparent)]
    Solver(#[from] SolverError),
    /// Model vector mismatch
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Physics / formulation / mesh combination not available
    #[error("{physics} does not support {reason}")]
    Unsupported {
        /// Physics that was requested
        physics: PhysicsKind,
        /// What is unsupported
        reason: String,
    },
    /// An electrode is outside the mesh or on its boundary
    #[error("electrode {name} at {position:?} is not inside the mesh")]
    ElectrodeOutsideMesh {
        /// "A" or "B"
        name: &'static str,
        /// Cartesian position
        position: [f64; 3],
    },
    /// The survey holds sources of another physics
    #[error("survey has no {0} sources")]
    EmptySurvey(PhysicsKind),
    /// Solved array and column labels disagree
    #[error("field array has {values} columns for {labels} labels")]
    ColumnMismatch {
        /// Columns in the value array
        values: usize,
        /// Column labels
        labels: usize,
    },
}

/// Physics family, as stored on source files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PhysicsKind {
    Fdem,
    Tdem,
    Dc,
}

impl fmt::Display for PhysicsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhysicsKind::Fdem => "FDEM",
            PhysicsKind::Tdem => "TDEM",
            PhysicsKind::Dc => "DC",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for PhysicsKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FDEM" => Ok(PhysicsKind::Fdem),
            "TDEM" => Ok(PhysicsKind::Tdem),
            "DC" => Ok(PhysicsKind::Dc),
            other => Err(format!("unknown physics `{other}`, expected FDEM, TDEM or DC")),
        }
    }
}

/// Field reported as the solution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formulation {
    E,
    B,
    H,
    J,
    Phi,
}

impl fmt::Display for Formulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Formulation::E => "e",
            Formulation::B => "b",
            Formulation::H => "h",
            Formulation::J => "j",
            Formulation::Phi => "phi",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Formulation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "e" => Ok(Formulation::E),
            "b" => Ok(Formulation::B),
            "h" => Ok(Formulation::H),
            "j" => Ok(Formulation::J),
            "phi" => Ok(Formulation::Phi),
            other => Err(format!("unknown formulation `{other}`, expected e, b, h, j or phi")),
        }
    }
}

/// Physics and formulation of a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum Physics {
    /// Frequency domain
    Fdem {
        /// Reported field
        formulation: Formulation,
    },
    /// Time domain
    Tdem {
        /// Reported field
        formulation: Formulation,
    },
    /// Direct current; always reports `phi`
    Dc,
}

impl Physics {
    /// FDEM reporting `h`
    #[must_use]
    pub fn fdem() -> Self {
        Physics::Fdem {
            formulation: Formulation::H,
        }
    }

    /// TDEM reporting `j`
    #[must_use]
    pub fn tdem() -> Self {
        Physics::Tdem {
            formulation: Formulation::J,
        }
    }

    /// Default formulation for a physics family
    #[must_use]
    pub fn from_kind(kind: PhysicsKind) -> Self {
        match kind {
            PhysicsKind::Fdem => Self::fdem(),
            PhysicsKind::Tdem => Self::tdem(),
            PhysicsKind::Dc => Physics::Dc,
        }
    }

    /// Family with an explicit formulation
    ///
    /// # Errors
    /// Returns error if the formulation is not available for the family
    pub fn with_formulation(kind: PhysicsKind, formulation: Formulation) -> Result<Self, PhysicsError> {
        let physics = match kind {
            PhysicsKind::Fdem => Physics::Fdem { formulation },
            PhysicsKind::Tdem => Physics::Tdem { formulation },
            PhysicsKind::Dc => Physics::Dc,
        };
        if physics.formulation() == formulation {
            Ok(physics)
        } else {
            Err(PhysicsError::Unsupported {
                physics: kind,
                reason: format!("formulation `{formulation}`"),
            })
        }
    }

    #[must_use]
    pub fn kind(&self) -> PhysicsKind {
        match self {
            Physics::Fdem { .. } => PhysicsKind::Fdem,
            Physics::Tdem { .. } => PhysicsKind::Tdem,
            Physics::Dc => PhysicsKind::Dc,
        }
    }

    #[must_use]
    pub fn formulation(&self) -> Formulation {
        match self {
            Physics::Fdem { formulation } | Physics::Tdem { formulation } => *formulation,
            Physics::Dc => Formulation::Phi,
        }
    }

    /// Field file name used when the simulation does not set one
    #[must_use]
    pub fn default_fields_filename(&self) -> &'static str {
        match self {
            Physics::Dc => "fieldsDC.npy",
            Physics::Fdem { .. } | Physics::Tdem { .. } => "fields.npy",
        }
    }

    /// Algebraic class of the assembled system
    #[must_use]
    pub fn system_kind(&self) -> SystemKind {
        match self {
            Physics::Fdem { .. } => SystemKind::ComplexSymmetric,
            Physics::Tdem { .. } | Physics::Dc => SystemKind::RealSpd,
        }
    }

    /// Check the formulation and mesh kind are supported
    ///
    /// # Errors
    /// Returns `PhysicsError::Unsupported` for EM on cylindrical meshes,
    /// `phi` outside DC, and `b`/`h` for step-off transients
    pub fn check_support(
        &self,
        mesh: MeshKind,
        waveform: crate::sources::Waveform,
    ) -> Result<(), PhysicsError> {
        let unsupported = |reason: String| PhysicsError::Unsupported {
            physics: self.kind(),
            reason,
        };
        match self {
            Physics::Dc => Ok(()),
            Physics::Fdem { .. } | Physics::Tdem { .. } if mesh == MeshKind::Cylindrical => {
                Err(unsupported("cylindrical meshes".into()))
            }
            Physics::Fdem { formulation } | Physics::Tdem { formulation }
                if *formulation == Formulation::Phi =>
            {
                Err(unsupported("formulation `phi`".into()))
            }
            Physics::Tdem { formulation }
                if waveform == crate::sources::Waveform::StepOff
                    && matches!(formulation, Formulation::B | Formulation::H) =>
            {
                Err(unsupported(format!(
                    "formulation `{formulation}` with a step-off waveform"
                )))
            }
            Physics::Fdem { .. } | Physics::Tdem { .. } => Ok(()),
        }
    }

    /// Number of unknowns in the system assembled on a mesh of `shape`
    #[must_use]
    pub fn unknowns(&self, shape: [usize; 3]) -> usize {
        let [nx, ny, nz] = shape;
        match self {
            Physics::Dc => nx * ny * nz,
            Physics::Fdem { .. } | Physics::Tdem { .. } => {
                nx * (ny + 1) * (nz + 1) + (nx + 1) * ny * (nz + 1) + (nx + 1) * (ny + 1) * nz
            }
        }
    }
}

/// A forward problem bound to its survey and solver backend
pub trait ForwardProblem: Send + Sync {
    /// Solve for the fields of every source in the survey
    ///
    /// # Errors
    /// Returns error if operator assembly or a linear solve fails
    fn fields(&self, props: &PhysicalProperties) -> Result<Fields, PhysicsError>;

    /// Physics and formulation
    fn physics(&self) -> Physics;

    /// Backend used for the linear solves
    fn backend(&self) -> Backend;
}

/// Linear solver selected for a problem
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSetup {
    /// Backend to instantiate
    pub backend: Backend,
    /// Criteria for iterative backends
    pub criteria: ConvergenceCriteria,
}

/// Create the forward problem for `physics`
#[must_use]
pub fn create_problem(physics: Physics, survey: Survey, solver: SolverSetup) -> Box<dyn ForwardProblem> {
    match physics {
        Physics::Dc => Box::new(DcProblem::new(survey, solver)),
        Physics::Fdem { formulation } => Box::new(FdemProblem::new(formulation, survey, solver)),
        Physics::Tdem { formulation } => Box::new(TdemProblem::new(formulation, survey, solver)),
    }
}

pub(crate) fn position(p: &Vec3) -> [f64; 3] {
    [p.x, p.y, p.z]
}
