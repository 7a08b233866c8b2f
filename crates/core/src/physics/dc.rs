//! DC resistivity
//!
//! Cell-centred finite volume: the potential `phi` satisfies `-∇·σ∇φ = q`
//! with `+I` injected in the cell holding electrode A, `-I` in the cell
//! holding electrode B, and the outer boundary grounded. Works on tensor and
//! cylindrical meshes.

use super::{
    position, FieldColumns, FieldLocation, FieldValues, Fields, ForwardProblem, Physics,
    PhysicsError, PhysicsKind, SolverSetup, Survey, SurveySource,
};
use crate::core_types::Vec3;
use crate::mesh::{operators, Mesh};
use crate::model::PhysicalProperties;
use crate::solver::Backend;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use std::time::Instant;
use tracing::{info, warn};

/// DC forward problem
pub struct DcProblem {
    survey: Survey,
    solver: SolverSetup,
}

fn electrode_cell(mesh: &Mesh, name: &'static str, p: &Vec3) -> Result<usize, PhysicsError> {
    let [i, j, k] = mesh
        .locate(p)
        .ok_or(PhysicsError::ElectrodeOutsideMesh {
            name,
            position: position(p),
        })?;
    Ok(mesh.cell_index(i, j, k))
}

impl DcProblem {
    #[must_use]
    pub fn new(survey: Survey, solver: SolverSetup) -> Self {
        Self { survey, solver }
    }
}

impl ForwardProblem for DcProblem {
    fn fields(&self, props: &PhysicalProperties) -> Result<Fields, PhysicsError> {
        let sources: Vec<&SurveySource> = self.survey.of_physics(PhysicsKind::Dc).collect();
        if sources.is_empty() {
            return Err(PhysicsError::EmptySurvey(PhysicsKind::Dc));
        }

        let start = Instant::now();
        let mesh = props.mesh();
        let n = mesh.n_cells();
        let matrix = CsrMatrix::from(&operators::cell_conductance(mesh, props.sigma())?);

        let mut solver = self.solver.backend.real_solver(self.solver.criteria);
        solver.factor(&matrix)?;

        let mut values = DMatrix::<f64>::zeros(n, sources.len());
        for (column, source) in sources.iter().enumerate() {
            let (src_a, src_b) = source.electrodes();
            let a = electrode_cell(mesh, "A", &src_a)?;
            let b = electrode_cell(mesh, "B", &src_b)?;
            if a == b {
                warn!("Electrodes A and B fall in the same cell {}; the potential is zero", a);
            }

            let mut rhs = DVector::zeros(n);
            rhs[a] += source.current();
            rhs[b] -= source.current();
            let phi = solver.solve(&rhs)?;
            values.column_mut(column).copy_from(&phi);
        }

        info!(
            "DC solved {} cells with {} in {:.2?}",
            n,
            solver.name(),
            start.elapsed()
        );

        Fields::new(
            super::Formulation::Phi,
            FieldLocation::CellCenters,
            FieldColumns::Static,
            FieldValues::Real(values),
        )
    }

    fn physics(&self) -> Physics {
        Physics::Dc
    }

    fn backend(&self) -> Backend {
        self.solver.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::FULL_TURN;
    use crate::mesh::MeshKind;
    use crate::model::CasingParameters;
    use crate::solver::ConvergenceCriteria;
    use std::sync::Arc;

    fn setup(backend: Backend) -> SolverSetup {
        SolverSetup {
            backend,
            criteria: ConvergenceCriteria::default(),
        }
    }

    fn uniform_props(kind: MeshKind, h: [Vec<f64>; 3], origin: [f64; 3]) -> PhysicalProperties {
        let cp = CasingParameters {
            casing_l: 1.0,
            ..Default::default()
        };
        let mesh = Mesh::new(kind, h, origin).unwrap();
        PhysicalProperties::new(Arc::new(cp), Arc::new(mesh))
    }

    #[test]
    fn test_dipole_potential_is_antisymmetric() {
        let props = uniform_props(
            MeshKind::Tensor,
            [vec![1.0; 9], vec![1.0; 5], vec![1.0; 5]],
            [-4.5, -2.5, -7.5],
        );
        let survey = Survey::dc(Vec3::new(-2.0, 0.0, -5.0), Vec3::new(2.0, 0.0, -5.0), 1.0);

        let direct = DcProblem::new(survey.clone(), setup(Backend::Cholesky))
            .fields(&props)
            .unwrap();
        let phi = direct.real().unwrap();
        let mesh = props.mesh();
        let a = mesh.cell_index(2, 2, 2);
        let b = mesh.cell_index(6, 2, 2);
        let middle = mesh.cell_index(4, 2, 2);

        assert!(phi[(a, 0)] > 0.0);
        assert!((phi[(a, 0)] + phi[(b, 0)]).abs() < 1e-9 * phi[(a, 0)]);
        assert!(phi[(middle, 0)].abs() < 1e-9 * phi[(a, 0)]);

        let iterative = DcProblem::new(survey, setup(Backend::ConjugateGradient))
            .fields(&props)
            .unwrap();
        let diff = (iterative.real().unwrap() - phi).norm();
        assert!(diff < 1e-6 * phi.norm());
    }

    #[test]
    fn test_cylindrical_mesh() {
        let props = uniform_props(
            MeshKind::Cylindrical,
            [vec![0.5; 8], vec![FULL_TURN], vec![0.5; 10]],
            [0.0, 0.0, -5.0],
        );
        let survey = Survey::dc(Vec3::new(0.1, 0.0, -2.0), Vec3::new(3.0, 0.0, -2.0), 1.0);
        let fields = DcProblem::new(survey, setup(Backend::Cholesky))
            .fields(&props)
            .unwrap();

        assert_eq!(fields.shape(), (80, 1));
        assert_eq!(fields.solution_key(), "phiSolution");
        let phi = fields.real().unwrap();
        assert!(phi.iter().all(|v| v.is_finite()));
        assert!(phi.max() > 0.0 && phi.min() < 0.0);
    }

    #[test]
    fn test_electrode_outside_mesh() {
        let props = uniform_props(
            MeshKind::Tensor,
            [vec![1.0; 3], vec![1.0; 3], vec![1.0; 3]],
            [0.0; 3],
        );
        let survey = Survey::dc(Vec3::new(0.5, 0.5, 0.5), Vec3::new(10.0, 0.5, 0.5), 1.0);
        assert!(matches!(
            DcProblem::new(survey, setup(Backend::Cholesky)).fields(&props),
            Err(PhysicsError::ElectrodeOutsideMesh { name: "B", .. })
        ));
    }
}
