//! Frequency-domain EM
//!
//! For each frequency the edge electric field solves
//!
//! ```text
//! (Cᵀ M_f(1/μ) C + iω M_e(σ)) e = -iω s
//! ```
//!
//! with `s` the edge-integrated wire source. The formulation picks the
//! reported field: `e`, `j = σe`, `b = -Ce / iω` or `h = b / μ`.

use super::em::{wire_source, EmOperators};
use super::{
    FieldColumns, FieldLocation, FieldValues, Fields, ForwardProblem, Formulation, Physics,
    PhysicsError, PhysicsKind, SolverSetup, Survey, SurveySource,
};
use crate::model::PhysicalProperties;
use crate::solver::{apply_real, pin_dofs, Backend};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CooMatrix;
use num_complex::Complex;
use std::f64::consts::PI;
use std::time::Instant;
use tracing::{debug, info};

/// FDEM forward problem on a tensor mesh
pub struct FdemProblem {
    formulation: Formulation,
    survey: Survey,
    solver: SolverSetup,
}

impl FdemProblem {
    #[must_use]
    pub fn new(formulation: Formulation, survey: Survey, solver: SolverSetup) -> Self {
        Self {
            formulation,
            survey,
            solver,
        }
    }

    fn system(ops: &EmOperators, stiffness: &CooMatrix<f64>, omega: f64) -> CooMatrix<Complex<f64>> {
        let n = ops.topology.n_edges();
        let mut coo = CooMatrix::new(n, n);
        for (row, col, &value) in stiffness.triplet_iter() {
            coo.push(row, col, Complex::new(value, 0.0));
        }
        for (edge, &m) in ops.edge_sigma.iter().enumerate() {
            coo.push(edge, edge, Complex::new(0.0, omega * m));
        }
        coo
    }

    fn report(&self, ops: &EmOperators, e: &[Complex<f64>], omega: f64) -> Vec<Complex<f64>> {
        let b = || -> Vec<Complex<f64>> {
            let scale = -1.0 / Complex::new(0.0, omega);
            apply_real(&ops.curl, e).into_iter().map(|v| v * scale).collect()
        };
        match self.formulation {
            Formulation::J => ops.edge_current(e),
            Formulation::B => b(),
            Formulation::H => ops.face_field(&b()),
            Formulation::E | Formulation::Phi => e.to_vec(),
        }
    }
}

impl ForwardProblem for FdemProblem {
    fn fields(&self, props: &PhysicalProperties) -> Result<Fields, PhysicsError> {
        let physics = self.physics();
        physics.check_support(props.mesh().kind(), crate::sources::Waveform::StepOff)?;

        let sources: Vec<&SurveySource> = self.survey.of_physics(PhysicsKind::Fdem).collect();
        if sources.is_empty() {
            return Err(PhysicsError::EmptySurvey(PhysicsKind::Fdem));
        }

        let ops = EmOperators::new(props)?;
        let stiffness = ops.stiffness();
        let n_edges = ops.topology.n_edges();
        let (location, n_rows) = match self.formulation {
            Formulation::B | Formulation::H => (FieldLocation::Faces, ops.topology.n_faces()),
            _ => (FieldLocation::Edges, n_edges),
        };

        let mut values = DMatrix::<Complex<f64>>::zeros(n_rows, sources.len());
        let mut frequencies = Vec::with_capacity(sources.len());

        for (column, source) in sources.iter().enumerate() {
            let SurveySource::Frequency {
                frequency,
                src_a,
                src_b,
                current,
            } = source
            else {
                continue;
            };
            let start = Instant::now();
            let omega = 2.0 * PI * frequency;
            let wire = wire_source(props.mesh(), &ops.topology, src_a, src_b, *current)?;

            let matrix = pin_dofs(&Self::system(&ops, &stiffness, omega), &ops.boundary_edges);
            let rhs = DVector::from_iterator(
                n_edges,
                wire.iter().zip(&ops.boundary_edges).map(|(&s, &fixed)| {
                    if fixed {
                        Complex::new(0.0, 0.0)
                    } else {
                        Complex::new(0.0, -omega * s)
                    }
                }),
            );

            let mut solver = self.solver.backend.complex_solver(self.solver.criteria)?;
            solver.factor(&matrix)?;
            let e = solver.solve(&rhs)?;

            let reported = self.report(&ops, e.as_slice(), omega);
            values.column_mut(column).copy_from_slice(&reported);
            frequencies.push(*frequency);

            info!(
                "FDEM {} Hz solved with {} in {:.2?}",
                frequency,
                solver.name(),
                start.elapsed()
            );
            debug!("max |e| = {:.3e}", e.iter().fold(0.0, |m: f64, v| m.max(v.norm())));
        }

        Fields::new(
            self.formulation,
            location,
            FieldColumns::Frequencies(frequencies),
            FieldValues::Complex(values),
        )
    }

    fn physics(&self) -> Physics {
        Physics::Fdem {
            formulation: self.formulation,
        }
    }

    fn backend(&self) -> Backend {
        self.solver.backend
    }
}
