//! Iterative Krylov solvers
//!
//! Both solvers use a Jacobi (diagonal) preconditioner and a CSR
//! matrix-vector product parallelised over rows with rayon, so they run on
//! whatever thread pool the caller has installed.
//!
//! - `ConjugateGradient` for real symmetric positive definite systems
//! - `BiCgStab` for general (including complex symmetric) systems
//!
//! # References
//!
//! - Hestenes & Stiefel (1952). "Methods of Conjugate Gradients for Solving
//!   Linear Systems". J. Res. Nat. Bur. Standards 49(6).
//! - van der Vorst (1992). "Bi-CGSTAB: A Fast and Smoothly Converging Variant
//!   of Bi-CG for the Solution of Nonsymmetric Linear Systems". SIAM J. Sci.
//!   Stat. Comput. 13(2), 631-644.

use super::r#trait::{check_rhs, check_square, LinearSolver, SolverError};
use nalgebra::{ComplexField, DVector};
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Convergence criteria for iterative solvers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvergenceCriteria {
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Relative tolerance: `||r|| / ||b|| < relative_tolerance`
    pub relative_tolerance: f64,
    /// Absolute tolerance: `||r|| < absolute_tolerance`
    pub absolute_tolerance: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            relative_tolerance: 1e-10,
            absolute_tolerance: 1e-30,
        }
    }
}

impl ConvergenceCriteria {
    fn is_converged(&self, residual_norm: f64, rhs_norm: f64) -> bool {
        residual_norm < self.absolute_tolerance
            || residual_norm < self.relative_tolerance * rhs_norm
    }
}

/// `y = A x` for a CSR matrix, rows in parallel
#[must_use]
pub fn csr_matvec<T>(matrix: &CsrMatrix<T>, x: &DVector<T>) -> DVector<T>
where
    T: ComplexField + Copy,
{
    let offsets = matrix.row_offsets();
    let cols = matrix.col_indices();
    let vals = matrix.values();
    let y: Vec<T> = (0..matrix.nrows())
        .into_par_iter()
        .map(|row| {
            let mut acc = T::zero();
            for idx in offsets[row]..offsets[row + 1] {
                acc += vals[idx] * x[cols[idx]];
            }
            acc
        })
        .collect();
    DVector::from_vec(y)
}

/// Apply a real CSR operator to a vector of any field type
#[must_use]
pub fn apply_real<T>(matrix: &CsrMatrix<f64>, x: &[T]) -> Vec<T>
where
    T: ComplexField<RealField = f64> + Copy,
{
    let offsets = matrix.row_offsets();
    let cols = matrix.col_indices();
    let vals = matrix.values();
    (0..matrix.nrows())
        .into_par_iter()
        .map(|row| {
            let mut acc = T::zero();
            for idx in offsets[row]..offsets[row + 1] {
                acc += x[cols[idx]].scale(vals[idx]);
            }
            acc
        })
        .collect()
}

fn inverse_diagonal<T>(matrix: &CsrMatrix<T>) -> Result<DVector<T>, SolverError>
where
    T: ComplexField<RealField = f64> + Copy,
{
    let mut inv = DVector::zeros(matrix.nrows());
    for (row, lane) in matrix.row_iter().enumerate() {
        let diag = lane
            .col_indices()
            .iter()
            .zip(lane.values())
            .filter(|(col, _)| **col == row)
            .fold(T::zero(), |acc, (_, &v)| acc + v);
        if diag.modulus() == 0.0 {
            return Err(SolverError::InvalidMatrix(format!(
                "zero diagonal in row {row}, Jacobi preconditioner undefined"
            )));
        }
        inv[row] = T::one() / diag;
    }
    Ok(inv)
}

struct Prepared<T: ComplexField> {
    matrix: CsrMatrix<T>,
    inv_diag: DVector<T>,
}

/// Jacobi-preconditioned conjugate gradient for real SPD systems
pub struct ConjugateGradient {
    criteria: ConvergenceCriteria,
    prepared: Option<Prepared<f64>>,
}

impl ConjugateGradient {
    #[must_use]
    pub fn new(criteria: ConvergenceCriteria) -> Self {
        Self {
            criteria,
            prepared: None,
        }
    }
}

impl LinearSolver<f64> for ConjugateGradient {
    fn factor(&mut self, matrix: &CsrMatrix<f64>) -> Result<(), SolverError> {
        check_square(matrix)?;
        let inv_diag = inverse_diagonal(matrix)?;
        self.prepared = Some(Prepared {
            matrix: matrix.clone(),
            inv_diag,
        });
        Ok(())
    }

    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        let Prepared { matrix, inv_diag } = self.prepared.as_ref().ok_or(SolverError::NotFactored)?;
        let n = matrix.nrows();
        check_rhs(n, rhs.len())?;

        let rhs_norm = rhs.norm();
        let mut x = DVector::zeros(n);
        let mut r = rhs.clone();
        if self.criteria.is_converged(r.norm(), rhs_norm) {
            return Ok(x);
        }

        let mut z = r.component_mul(inv_diag);
        let mut p = z.clone();
        let mut rz = r.dot(&z);

        for iter in 0..self.criteria.max_iterations {
            let ap = csr_matvec(matrix, &p);
            let pap = p.dot(&ap);
            if pap <= 0.0 {
                return Err(SolverError::NotPositiveDefinite);
            }
            let alpha = rz / pap;
            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &ap, 1.0);

            let res_norm = r.norm();
            if !res_norm.is_finite() {
                return Err(SolverError::NumericalInstability(
                    "non-finite residual in CG".into(),
                ));
            }
            if self.criteria.is_converged(res_norm, rhs_norm) {
                debug!("CG converged in {} iterations (residual {:.2e})", iter + 1, res_norm);
                return Ok(x);
            }

            z = r.component_mul(inv_diag);
            let rz_new = r.dot(&z);
            let beta = rz_new / rz;
            rz = rz_new;
            p = &z + p * beta;
        }

        Err(SolverError::ConvergenceFailure {
            iterations: self.criteria.max_iterations,
            residual_norm: r.norm(),
        })
    }

    fn name(&self) -> &'static str {
        "Jacobi-CG"
    }

    fn is_ready(&self) -> bool {
        self.prepared.is_some()
    }
}

/// Jacobi-preconditioned BiCGSTAB
pub struct BiCgStab<T: ComplexField> {
    criteria: ConvergenceCriteria,
    prepared: Option<Prepared<T>>,
}

impl<T: ComplexField> BiCgStab<T> {
    #[must_use]
    pub fn new(criteria: ConvergenceCriteria) -> Self {
        Self {
            criteria,
            prepared: None,
        }
    }
}

const BREAKDOWN: f64 = 1e-300;

impl<T> LinearSolver<T> for BiCgStab<T>
where
    T: ComplexField<RealField = f64> + Copy,
{
    fn factor(&mut self, matrix: &CsrMatrix<T>) -> Result<(), SolverError> {
        check_square(matrix)?;
        let inv_diag = inverse_diagonal(matrix)?;
        self.prepared = Some(Prepared {
            matrix: matrix.clone(),
            inv_diag,
        });
        Ok(())
    }

    fn solve(&self, rhs: &DVector<T>) -> Result<DVector<T>, SolverError> {
        let Prepared { matrix, inv_diag } = self.prepared.as_ref().ok_or(SolverError::NotFactored)?;
        let n = matrix.nrows();
        check_rhs(n, rhs.len())?;

        let rhs_norm = rhs.norm();
        let mut x = DVector::zeros(n);
        let mut r = rhs.clone();
        let mut res_norm = r.norm();
        if self.criteria.is_converged(res_norm, rhs_norm) {
            return Ok(x);
        }

        let r_hat = r.clone();
        let mut rho = T::one();
        let mut alpha = T::one();
        let mut omega = T::one();
        let mut p = DVector::zeros(n);
        let mut v = DVector::zeros(n);

        for iter in 0..self.criteria.max_iterations {
            let rho_new = r_hat.dotc(&r);
            if rho_new.modulus() < BREAKDOWN {
                return Err(SolverError::NumericalInstability(
                    "BiCGSTAB breakdown: rho vanished".into(),
                ));
            }
            let beta = (rho_new / rho) * (alpha / omega);
            rho = rho_new;

            p = &r + (&p - &v * omega) * beta;
            let y = p.component_mul(inv_diag);
            v = csr_matvec(matrix, &y);

            let r_hat_v = r_hat.dotc(&v);
            if r_hat_v.modulus() < BREAKDOWN {
                return Err(SolverError::NumericalInstability(
                    "BiCGSTAB breakdown: (r̂, v) vanished".into(),
                ));
            }
            alpha = rho / r_hat_v;

            let s = &r - &v * alpha;
            let s_norm = s.norm();
            if self.criteria.is_converged(s_norm, rhs_norm) {
                x += y * alpha;
                debug!("BiCGSTAB converged in {} iterations (residual {:.2e})", iter + 1, s_norm);
                return Ok(x);
            }

            let z = s.component_mul(inv_diag);
            let t = csr_matvec(matrix, &z);
            let tt = t.dotc(&t);
            if tt.modulus() < BREAKDOWN {
                return Err(SolverError::NumericalInstability(
                    "BiCGSTAB breakdown: (t, t) vanished".into(),
                ));
            }
            omega = t.dotc(&s) / tt;

            x += y * alpha + &z * omega;
            r = s - t * omega;

            res_norm = r.norm();
            if !res_norm.is_finite() {
                return Err(SolverError::NumericalInstability(
                    "non-finite residual in BiCGSTAB".into(),
                ));
            }
            if self.criteria.is_converged(res_norm, rhs_norm) {
                debug!("BiCGSTAB converged in {} iterations (residual {:.2e})", iter + 1, res_norm);
                return Ok(x);
            }
            if omega.modulus() < BREAKDOWN {
                return Err(SolverError::NumericalInstability(
                    "BiCGSTAB breakdown: omega vanished".into(),
                ));
            }
        }

        Err(SolverError::ConvergenceFailure {
            iterations: self.criteria.max_iterations,
            residual_norm: res_norm,
        })
    }

    fn name(&self) -> &'static str {
        "Jacobi-BiCGSTAB"
    }

    fn is_ready(&self) -> bool {
        self.prepared.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra_sparse::CooMatrix;
    use num_complex::Complex;

    fn shifted_laplacian<T: ComplexField<RealField = f64> + Copy>(n: usize, shift: T) -> CsrMatrix<T> {
        let mut coo = CooMatrix::new(n, n);
        let two = T::from_real(2.0);
        let minus_one = T::from_real(-1.0);
        for i in 0..n {
            coo.push(i, i, two + shift);
            if i + 1 < n {
                coo.push(i, i + 1, minus_one);
                coo.push(i + 1, i, minus_one);
            }
        }
        CsrMatrix::from(&coo)
    }

    #[test]
    fn test_matvec_matches_dense() {
        let a = shifted_laplacian(5, 0.5);
        let x = DVector::from_fn(5, |i, _| (i as f64).sin());
        let dense = nalgebra_sparse::convert::serial::convert_csr_dense(&a);
        assert_relative_eq!(csr_matvec(&a, &x), &dense * &x, epsilon = 1e-14);
        assert_relative_eq!(
            DVector::from_vec(apply_real(&a, x.as_slice())),
            &dense * &x,
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_cg_converges() {
        let a = shifted_laplacian(50, 0.0);
        let x_true = DVector::from_fn(50, |i, _| 1.0 + (i % 7) as f64);
        let b = csr_matvec(&a, &x_true);

        let mut cg = ConjugateGradient::new(ConvergenceCriteria::default());
        cg.factor(&a).unwrap();
        let x = cg.solve(&b).unwrap();
        assert_relative_eq!(x, x_true, epsilon = 1e-6);
    }

    #[test]
    fn test_bicgstab_complex_symmetric() {
        let a = shifted_laplacian(40, Complex::new(0.0, 0.3));
        let x_true = DVector::from_fn(40, |i, _| Complex::new(1.0, i as f64 * 0.1));
        let b = csr_matvec(&a, &x_true);

        let mut solver = BiCgStab::new(ConvergenceCriteria::default());
        solver.factor(&a).unwrap();
        let x = solver.solve(&b).unwrap();
        assert!((x - x_true).norm() < 1e-6);
    }

    #[test]
    fn test_convergence_failure_reported() {
        let a = shifted_laplacian(200, 0.0);
        let b = DVector::from_element(200, 1.0);
        let criteria = ConvergenceCriteria {
            max_iterations: 2,
            ..Default::default()
        };
        let mut cg = ConjugateGradient::new(criteria);
        cg.factor(&a).unwrap();
        assert!(matches!(
            cg.solve(&b),
            Err(SolverError::ConvergenceFailure { iterations: 2, .. })
        ));
    }
}
