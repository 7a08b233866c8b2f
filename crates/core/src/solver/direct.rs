//! Direct solver backends
//!
//! `CholeskySolver` factors real symmetric positive definite systems with
//! the sparse Cholesky decomposition of `nalgebra-sparse`. `DenseLuSolver`
//! converts to a dense matrix and uses nalgebra's LU decomposition; it works
//! for any scalar but its O(n²) memory limits it to small systems.

use super::r#trait::{check_rhs, check_square, LinearSolver, SolverError};
use nalgebra::{ComplexField, DMatrix, DVector, Dyn, LU};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};
use tracing::debug;

/// Sparse Cholesky factorization for real SPD matrices
#[derive(Default)]
pub struct CholeskySolver {
    factor: Option<CscCholesky<f64>>,
    dimension: usize,
}

impl CholeskySolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinearSolver<f64> for CholeskySolver {
    fn factor(&mut self, matrix: &CsrMatrix<f64>) -> Result<(), SolverError> {
        let n = check_square(matrix)?;
        self.factor = None;

        let csc = CscMatrix::from(matrix);
        let factor = CscCholesky::factor(&csc).map_err(|_| SolverError::NotPositiveDefinite)?;
        debug!(
            "Cholesky factor of {}x{} matrix: {} non-zeros in L",
            n,
            n,
            factor.l().nnz()
        );

        self.factor = Some(factor);
        self.dimension = n;
        Ok(())
    }

    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        let factor = self.factor.as_ref().ok_or(SolverError::NotFactored)?;
        check_rhs(self.dimension, rhs.len())?;

        let b = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
        let x = factor.solve(&b);
        if x.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NumericalInstability(
                "non-finite value in Cholesky solution".into(),
            ));
        }
        Ok(DVector::from_column_slice(x.as_slice()))
    }

    fn name(&self) -> &'static str {
        "sparse Cholesky"
    }

    fn is_ready(&self) -> bool {
        self.factor.is_some()
    }
}

/// Dense LU factorization
///
/// Rejects matrices whose smallest pivot is negligible next to the largest.
pub struct DenseLuSolver<T: ComplexField> {
    lu: Option<LU<T, Dyn, Dyn>>,
    dimension: usize,
}

impl<T: ComplexField> Default for DenseLuSolver<T> {
    fn default() -> Self {
        Self {
            lu: None,
            dimension: 0,
        }
    }
}

impl<T: ComplexField> DenseLuSolver<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> LinearSolver<T> for DenseLuSolver<T>
where
    T: ComplexField<RealField = f64> + Copy,
{
    fn factor(&mut self, matrix: &CsrMatrix<T>) -> Result<(), SolverError> {
        let n = check_square(matrix)?;
        self.lu = None;

        let mut dense = DMatrix::<T>::zeros(n, n);
        for (row, col, value) in matrix.triplet_iter() {
            dense[(row, col)] += *value;
        }
        let lu = dense.lu();

        let u = lu.u();
        let pivots: Vec<f64> = (0..n).map(|i| u[(i, i)].modulus()).collect();
        let max = pivots.iter().copied().fold(0.0, f64::max);
        let min = pivots.iter().copied().fold(f64::INFINITY, f64::min);
        if n > 0 && !(min > 1e-14 * max) {
            return Err(SolverError::SingularMatrix);
        }

        self.lu = Some(lu);
        self.dimension = n;
        Ok(())
    }

    fn solve(&self, rhs: &DVector<T>) -> Result<DVector<T>, SolverError> {
        let lu = self.lu.as_ref().ok_or(SolverError::NotFactored)?;
        check_rhs(self.dimension, rhs.len())?;
        lu.solve(rhs).ok_or(SolverError::SingularMatrix)
    }

    fn name(&self) -> &'static str {
        "dense LU"
    }

    fn is_ready(&self) -> bool {
        self.lu.is_some()
    }
}
