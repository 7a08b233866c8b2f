//! Time-domain EM
//!
//! Backward Euler on the edge electric field:
//!
//! ```text
//! (Cᵀ M_f(1/μ) C + M_e(σ)/Δt) eⁿ⁺¹ = M_e(σ) eⁿ / Δt - (sⁿ⁺¹ - sⁿ) / Δt
//! ```
//!
//! The system matrix only depends on Δt, so it is factored once per run of
//! equal step lengths.
//!
//! A step-off source starts from the galvanic field of the steady current,
//! `e⁰ = -Gφ` with `GᵀM_e(σ)G φ = Gᵀs`; only `e` and `j` are reported since
//! the steady magnetic field is not computed. A step-on source starts from
//! rest and also integrates `bⁿ⁺¹ = bⁿ - Δt C eⁿ⁺¹`.

use super::em::{wire_source, EmOperators};
use super::{
    FieldColumns, FieldLocation, FieldValues, Fields, ForwardProblem, Formulation, Physics,
    PhysicsError, PhysicsKind, SolverSetup, Survey, SurveySource,
};
use crate::mesh::operators;
use crate::model::PhysicalProperties;
use crate::solver::{apply_real, pin_dofs, Backend, LinearSolver};
use crate::sources::Waveform;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CooMatrix;
use std::time::Instant;
use tracing::{debug, info};

/// TDEM forward problem on a tensor mesh
pub struct TdemProblem {
    formulation: Formulation,
    survey: Survey,
    solver: SolverSetup,
}

impl TdemProblem {
    #[must_use]
    pub fn new(formulation: Formulation, survey: Survey, solver: SolverSetup) -> Self {
        Self {
            formulation,
            survey,
            solver,
        }
    }

    /// Galvanic field of the steady source current
    fn steady_field(
        &self,
        props: &PhysicalProperties,
        ops: &EmOperators,
        source: &[f64],
    ) -> Result<Vec<f64>, PhysicsError> {
        let mesh = props.mesh();
        let grad = operators::nodal_gradient(mesh)?;
        let fixed = ops.topology.boundary_nodes();

        let matrix = pin_dofs(&operators::weighted_gram(&grad, &ops.edge_sigma), &fixed);
        let grad_t = grad.transpose();
        let rhs: Vec<f64> = apply_real(&grad_t, source)
            .into_iter()
            .zip(&fixed)
            .map(|(v, &f)| if f { 0.0 } else { v })
            .collect();

        let mut solver = self.solver.backend.real_solver(self.solver.criteria);
        solver.factor(&matrix)?;
        let phi = solver.solve(&DVector::from_vec(rhs))?;
        debug!("Steady potential solved with {}", solver.name());

        Ok(apply_real(&grad, phi.as_slice()).into_iter().map(|v| -v).collect())
    }

    fn system(ops: &EmOperators, stiffness: &CooMatrix<f64>, dt: f64) -> CooMatrix<f64> {
        let mut coo = stiffness.clone();
        for (edge, &m) in ops.edge_sigma.iter().enumerate() {
            coo.push(edge, edge, m / dt);
        }
        coo
    }

    fn report(&self, ops: &EmOperators, e: &[f64], b: &[f64]) -> Vec<f64> {
        match self.formulation {
            Formulation::J => ops.edge_current(e),
            Formulation::B => b.to_vec(),
            Formulation::H => ops.face_field(b),
            Formulation::E | Formulation::Phi => e.to_vec(),
        }
    }
}

impl ForwardProblem for TdemProblem {
    fn fields(&self, props: &PhysicalProperties) -> Result<Fields, PhysicsError> {
        let source = self
            .survey
            .of_physics(PhysicsKind::Tdem)
            .next()
            .ok_or(PhysicsError::EmptySurvey(PhysicsKind::Tdem))?;
        let SurveySource::Transient {
            src_a,
            src_b,
            current,
            waveform,
            step_lengths,
        } = source
        else {
            return Err(PhysicsError::EmptySurvey(PhysicsKind::Tdem));
        };
        self.physics().check_support(props.mesh().kind(), *waveform)?;

        let start = Instant::now();
        let ops = EmOperators::new(props)?;
        let stiffness = ops.stiffness();
        let n_edges = ops.topology.n_edges();
        let wire = wire_source(props.mesh(), &ops.topology, src_a, src_b, *current)?;

        let (location, n_rows) = match self.formulation {
            Formulation::B | Formulation::H => (FieldLocation::Faces, ops.topology.n_faces()),
            _ => (FieldLocation::Edges, n_edges),
        };
        let mut values = DMatrix::<f64>::zeros(n_rows, step_lengths.len() + 1);
        let mut times = Vec::with_capacity(step_lengths.len() + 1);
        times.push(0.0);

        // source before and after t = 0
        let (s_before, s_after) = match waveform {
            Waveform::StepOff => (wire.clone(), vec![0.0; n_edges]),
            Waveform::StepOn => (vec![0.0; n_edges], wire.clone()),
        };
        let mut e = match waveform {
            Waveform::StepOff => self.steady_field(props, &ops, &wire)?,
            Waveform::StepOn => vec![0.0; n_edges],
        };
        let mut b = vec![0.0; ops.topology.n_faces()];
        values.column_mut(0).copy_from_slice(&self.report(&ops, &e, &b));

        let mut solver: Option<(f64, Box<dyn LinearSolver<f64>>)> = None;
        let mut t = 0.0;
        for (step, &dt) in step_lengths.iter().enumerate() {
            let refactor = !matches!(&solver, Some((current_dt, _)) if *current_dt == dt);
            if refactor {
                let matrix = pin_dofs(&Self::system(&ops, &stiffness, dt), &ops.boundary_edges);
                let mut fresh = self.solver.backend.real_solver(self.solver.criteria);
                fresh.factor(&matrix)?;
                debug!("Factored TDEM system for dt = {:.3e} s with {}", dt, fresh.name());
                solver = Some((dt, fresh));
            }
            let Some((_, active)) = &solver else {
                continue;
            };

            let s_prev: &[f64] = if step == 0 { &s_before } else { &s_after };
            let rhs = DVector::from_iterator(
                n_edges,
                (0..n_edges).map(|edge| {
                    if ops.boundary_edges[edge] {
                        0.0
                    } else {
                        (ops.edge_sigma[edge] * e[edge] - (s_after[edge] - s_prev[edge])) / dt
                    }
                }),
            );
            let next = active.solve(&rhs)?;
            e = next.as_slice().to_vec();

            if *waveform == Waveform::StepOn {
                let curl_e = apply_real(&ops.curl, &e);
                for (bf, ce) in b.iter_mut().zip(curl_e) {
                    *bf -= dt * ce;
                }
            }

            t += dt;
            times.push(t);
            values.column_mut(step + 1).copy_from_slice(&self.report(&ops, &e, &b));
        }

        info!(
            "TDEM {} steps to t = {:.3e} s in {:.2?}",
            step_lengths.len(),
            t,
            start.elapsed()
        );

        Fields::new(
            self.formulation,
            location,
            FieldColumns::Times(times),
            FieldValues::Real(values),
        )
    }

    fn physics(&self) -> Physics {
        Physics::Tdem {
            formulation: self.formulation,
        }
    }

    fn backend(&self) -> Backend {
        self.solver.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Vec3;
    use crate::mesh::{Mesh, MeshKind};
    use crate::model::CasingParameters;
    use crate::solver::ConvergenceCriteria;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn props() -> PhysicalProperties {
        let mesh = Mesh::new(
            MeshKind::Tensor,
            [vec![10.0; 5], vec![10.0; 4], vec![10.0; 4]],
            [-25.0, -20.0, -20.0],
        )
        .unwrap();
        let cp = CasingParameters {
            casing_l: 10.0,
            ..Default::default()
        };
        PhysicalProperties::new(Arc::new(cp), Arc::new(mesh))
    }

    fn problem(formulation: Formulation, waveform: Waveform) -> TdemProblem {
        let source = SurveySource::Transient {
            src_a: Vec3::new(-10.0, 0.0, -10.0),
            src_b: Vec3::new(10.0, 0.0, -10.0),
            current: 1.0,
            waveform,
            step_lengths: vec![1e-4, 1e-4, 1e-3],
        };
        TdemProblem::new(
            formulation,
            Survey::new(vec![source]),
            SolverSetup {
                backend: Backend::Cholesky,
                criteria: ConvergenceCriteria::default(),
            },
        )
    }

    #[test]
    fn test_step_on_starts_from_rest() {
        let props = props();
        let fields = problem(Formulation::B, Waveform::StepOn).fields(&props).unwrap();
        let b = fields.real().unwrap();

        assert_eq!(fields.location(), FieldLocation::Faces);
        assert_eq!(b.ncols(), 4);
        assert!(b.column(0).iter().all(|v| *v == 0.0));
        assert!(b.column(3).iter().any(|v| *v != 0.0));

        match fields.columns() {
            FieldColumns::Times(times) => {
                assert_eq!(times.len(), 4);
                assert_relative_eq!(times[3], 1.2e-3, epsilon = 1e-15);
            }
            other => panic!("unexpected columns {other:?}"),
        }
    }

    #[test]
    fn test_step_off_decays() {
        let props = props();
        let fields = problem(Formulation::E, Waveform::StepOff).fields(&props).unwrap();
        let e = fields.real().unwrap();

        let norm0 = e.column(0).norm();
        let norm_last = e.column(3).norm();
        assert!(norm0 > 0.0);
        assert!(norm_last < norm0);
    }

    #[test]
    fn test_step_off_rejects_magnetic_formulations() {
        let props = props();
        assert!(matches!(
            problem(Formulation::H, Waveform::StepOff).fields(&props),
            Err(PhysicsError::Unsupported { .. })
        ));
    }
}
