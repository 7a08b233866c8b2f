//! Linear solver trait definition
//!
//! This module defines the `LinearSolver` trait, which provides a
//! backend-agnostic interface for the sparse systems assembled by the forward
//! problems. Direct and iterative backends both implement it.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use thiserror::Error;

/// Errors raised by linear solver backends
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SolverError {
    /// Matrix is singular or numerically singular
    #[error("matrix is singular")]
    SingularMatrix,
    /// Matrix expected to be symmetric positive definite is not
    #[error("matrix is not positive definite")]
    NotPositiveDefinite,
    /// Iterative solver did not reach the tolerance
    #[error("failed to converge after {iterations} iterations (residual {residual_norm:.2e})")]
    ConvergenceFailure {
        /// Iterations performed
        iterations: usize,
        /// Final residual norm
        residual_norm: f64,
    },
    /// Matrix structure is invalid
    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),
    /// Right-hand side does not match the factored matrix
    #[error("right-hand side has {actual} rows, matrix has {expected}")]
    DimensionMismatch {
        /// Matrix dimension
        expected: usize,
        /// Right-hand side length
        actual: usize,
    },
    /// Breakdown during iteration
    #[error("numerical instability: {0}")]
    NumericalInstability(String),
    /// `solve` called before `factor`
    #[error("solver used before factor()")]
    NotFactored,
}

/// Backend-agnostic interface for solving `A x = b`
///
/// A solver is factored once for a matrix and then used for any number of
/// right-hand sides (one per frequency or per time step of equal length).
pub trait LinearSolver<T>: Send + Sync {
    /// Factor or prepare the solver for `matrix`
    ///
    /// Direct backends compute their factorization here; iterative backends
    /// keep the matrix and build their preconditioner.
    ///
    /// # Errors
    ///
    /// Returns error if the matrix is not square or the factorization breaks
    /// down
    fn factor(&mut self, matrix: &CsrMatrix<T>) -> Result<(), SolverError>;

    /// Solve for one right-hand side
    ///
    /// # Errors
    ///
    /// Returns error if the solver is not factored, the dimensions do not
    /// match, or an iterative method fails to converge
    fn solve(&self, rhs: &DVector<T>) -> Result<DVector<T>, SolverError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// True once `factor` has succeeded
    fn is_ready(&self) -> bool;
}

pub(crate) fn check_square<T>(matrix: &CsrMatrix<T>) -> Result<usize, SolverError> {
    if matrix.nrows() == matrix.ncols() {
        Ok(matrix.nrows())
    } else {
        Err(SolverError::InvalidMatrix(format!(
            "matrix must be square: {}x{}",
            matrix.nrows(),
            matrix.ncols()
        )))
    }
}

pub(crate) fn check_rhs(expected: usize, actual: usize) -> Result<(), SolverError> {
    if expected == actual {
        Ok(())
    } else {
        Err(SolverError::DimensionMismatch { expected, actual })
    }
}
