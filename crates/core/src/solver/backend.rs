//! Backend selection
//!
//! The preferred backends are direct factorizations; they are "available" for
//! a system when its size fits the configured limits. When the preferred
//! backend is unavailable the selection falls back to the matching iterative
//! backend and logs a warning. Selection happens once per simulation, at
//! validation time.

use super::direct::{CholeskySolver, DenseLuSolver};
use super::iterative::{BiCgStab, ConjugateGradient, ConvergenceCriteria};
use super::r#trait::{LinearSolver, SolverError};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Which family of backends to try first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverPreference {
    /// Direct factorization when the system fits, iterative otherwise
    #[default]
    Direct,
    /// Always iterative
    Iterative,
}

/// Algebraic class of an assembled system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKind {
    /// Real symmetric positive definite (DC, TDEM)
    RealSpd,
    /// Complex symmetric (FDEM)
    ComplexSymmetric,
}

/// A concrete solver backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Sparse Cholesky
    Cholesky,
    /// Dense LU
    DenseLu,
    /// Jacobi-preconditioned conjugate gradient
    ConjugateGradient,
    /// Jacobi-preconditioned BiCGSTAB
    BiCgStab,
}

impl Backend {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Backend::Cholesky => "sparse Cholesky",
            Backend::DenseLu => "dense LU",
            Backend::ConjugateGradient => "Jacobi-CG",
            Backend::BiCgStab => "Jacobi-BiCGSTAB",
        }
    }

    #[must_use]
    pub fn is_direct(self) -> bool {
        matches!(self, Backend::Cholesky | Backend::DenseLu)
    }

    /// Instantiate for real systems
    #[must_use]
    pub fn real_solver(self, criteria: ConvergenceCriteria) -> Box<dyn LinearSolver<f64>> {
        match self {
            Backend::Cholesky => Box::new(CholeskySolver::new()),
            Backend::DenseLu => Box::new(DenseLuSolver::<f64>::new()),
            Backend::ConjugateGradient => Box::new(ConjugateGradient::new(criteria)),
            Backend::BiCgStab => Box::new(BiCgStab::<f64>::new(criteria)),
        }
    }

    /// Instantiate for complex systems
    ///
    /// # Errors
    /// Returns error for backends restricted to real SPD matrices
    pub fn complex_solver(
        self,
        criteria: ConvergenceCriteria,
    ) -> Result<Box<dyn LinearSolver<Complex<f64>>>, SolverError> {
        match self {
            Backend::DenseLu => Ok(Box::new(DenseLuSolver::<Complex<f64>>::new())),
            Backend::BiCgStab => Ok(Box::new(BiCgStab::<Complex<f64>>::new(criteria))),
            Backend::Cholesky | Backend::ConjugateGradient => Err(SolverError::InvalidMatrix(
                format!("{} requires a real SPD matrix", self.name()),
            )),
        }
    }
}

/// Outcome of resolving the preferred backend for a system
#[derive(Debug, Clone, PartialEq)]
pub enum BackendResolution {
    /// Preferred direct backend is available
    Preferred(Backend),
    /// Preferred backend unavailable, using the iterative one
    Fallback {
        /// Backend that was wanted
        preferred: Backend,
        /// Backend used instead
        fallback: Backend,
        /// Why the preferred one is unavailable
        reason: String,
    },
    /// Iterative backend requested explicitly
    Configured(Backend),
}

impl BackendResolution {
    /// Backend to use
    #[must_use]
    pub fn backend(&self) -> Backend {
        match self {
            BackendResolution::Preferred(b) | BackendResolution::Configured(b) => *b,
            BackendResolution::Fallback { fallback, .. } => *fallback,
        }
    }
}

/// Linear solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Backend family tried first
    pub preference: SolverPreference,
    /// Largest real SPD system factored with sparse Cholesky
    pub max_sparse_direct_unknowns: usize,
    /// Largest complex system factored with dense LU
    pub max_dense_unknowns: usize,
    /// Iterative convergence criteria
    pub criteria: ConvergenceCriteria,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            preference: SolverPreference::Direct,
            max_sparse_direct_unknowns: 200_000,
            max_dense_unknowns: 4_000,
            criteria: ConvergenceCriteria::default(),
        }
    }
}

impl SolverConfig {
    /// Decide which backend solves a system of `unknowns` unknowns
    #[must_use]
    pub fn resolve(&self, system: SystemKind, unknowns: usize) -> BackendResolution {
        let (direct, iterative, limit) = match system {
            SystemKind::RealSpd => (
                Backend::Cholesky,
                Backend::ConjugateGradient,
                self.max_sparse_direct_unknowns,
            ),
            SystemKind::ComplexSymmetric => {
                (Backend::DenseLu, Backend::BiCgStab, self.max_dense_unknowns)
            }
        };

        match self.preference {
            SolverPreference::Iterative => BackendResolution::Configured(iterative),
            SolverPreference::Direct if unknowns <= limit => BackendResolution::Preferred(direct),
            SolverPreference::Direct => BackendResolution::Fallback {
                preferred: direct,
                fallback: iterative,
                reason: format!("{unknowns} unknowns exceed the direct limit of {limit}"),
            },
        }
    }

    /// `resolve`, logging the outcome
    #[must_use]
    pub fn select(&self, system: SystemKind, unknowns: usize) -> Backend {
        let resolution = self.resolve(system, unknowns);
        match &resolution {
            BackendResolution::Preferred(b) => {
                info!("Using {} solver ({} unknowns)", b.name(), unknowns);
            }
            BackendResolution::Configured(b) => {
                info!("Using configured {} solver ({} unknowns)", b.name(), unknowns);
            }
            BackendResolution::Fallback {
                preferred,
                fallback,
                reason,
            } => {
                warn!(
                    "{} solver unavailable: {}. Falling back to the slower {} solver.",
                    preferred.name(),
                    reason,
                    fallback.name()
                );
            }
        }
        resolution.backend()
    }
}
