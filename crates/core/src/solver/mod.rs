//! Linear solver module
//!
//! This module provides a backend-agnostic interface for the sparse systems
//! assembled by the forward problems. The core abstraction is the
//! `LinearSolver` trait, implemented by direct and iterative backends.
//!
//! # Backend Selection
//!
//! The backend is chosen once per simulation from the `SolverConfig`:
//! 1. Try the preferred direct backend (if the system fits its size limit)
//! 2. Fall back to the iterative backend (always available), logging a warning
//!
//! # Example
//!
//! ```rust,ignore
//! use casing_sim_core::solver::{SolverConfig, SystemKind};
//!
//! let config = SolverConfig::default();
//! let backend = config.select(SystemKind::RealSpd, n);
//! let mut solver = backend.real_solver(config.criteria);
//! solver.factor(&matrix)?;
//! let x = solver.solve(&rhs)?;
//! ```

mod backend;
mod direct;
mod iterative;
#[allow(clippy::module_name_repetitions)]
mod r#trait;

// Re-exports
pub use backend::{Backend, BackendResolution, SolverConfig, SolverPreference, SystemKind};
pub use direct::{CholeskySolver, DenseLuSolver};
pub use iterative::{apply_real, csr_matvec, BiCgStab, ConjugateGradient, ConvergenceCriteria};
pub use r#trait::{LinearSolver, SolverError};

use nalgebra::ComplexField;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Pin the rows and columns flagged in `fixed` to the identity
///
/// Entries touching a fixed index are dropped and a unit diagonal is placed
/// on every fixed row, which imposes a homogeneous Dirichlet condition while
/// keeping the matrix symmetric. The matching right-hand side entries must be
/// zeroed by the caller.
#[must_use]
pub fn pin_dofs<T>(coo: &CooMatrix<T>, fixed: &[bool]) -> CsrMatrix<T>
where
    T: ComplexField + Copy,
{
    let mut pinned = CooMatrix::new(coo.nrows(), coo.ncols());
    for (row, col, &value) in coo.triplet_iter() {
        if !fixed[row] && !fixed[col] {
            pinned.push(row, col, value);
        }
    }
    for (dof, _) in fixed.iter().enumerate().filter(|(_, f)| **f) {
        pinned.push(dof, dof, T::one());
    }
    CsrMatrix::from(&pinned)
}
