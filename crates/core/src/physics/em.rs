//! Shared pieces of the edge-based EM problems
//!
//! Both FDEM and TDEM solve for the electric field on mesh edges with the
//! tangential field pinned to zero on the outer boundary. The grounded source
//! is a wire running along mesh edges from the return electrode to the
//! positive one.

use super::{position, PhysicsError};
use crate::core_types::Vec3;
use crate::mesh::operators::{self, TensorTopology};
use crate::mesh::Mesh;
use crate::model::PhysicalProperties;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Operators assembled once per forward problem
pub(crate) struct EmOperators {
    pub topology: TensorTopology,
    /// Faces × edges
    pub curl: CsrMatrix<f64>,
    /// Diagonal of the edge mass matrix weighted by sigma
    pub edge_sigma: Vec<f64>,
    /// Diagonal of the unweighted edge mass matrix (dual edge volumes)
    pub edge_volume: Vec<f64>,
    /// Diagonal of the face mass matrix weighted by 1/mu
    pub face_mu_inv: Vec<f64>,
    /// Diagonal of the unweighted face mass matrix (dual face volumes)
    pub face_volume: Vec<f64>,
    /// Edges tangential to the outer boundary
    pub boundary_edges: Vec<bool>,
}

impl EmOperators {
    pub fn new(props: &PhysicalProperties) -> Result<Self, PhysicsError> {
        let mesh = props.mesh();
        let topology = TensorTopology::of(mesh)?;
        let ones = vec![1.0; mesh.n_cells()];

        let ops = Self {
            topology,
            curl: operators::curl(mesh)?,
            edge_sigma: operators::edge_inner_product(mesh, props.sigma())?,
            edge_volume: operators::edge_inner_product(mesh, &ones)?,
            face_mu_inv: operators::face_inner_product(mesh, &props.mu_inv())?,
            face_volume: operators::face_inner_product(mesh, &ones)?,
            boundary_edges: topology.boundary_edges(),
        };
        debug!(
            "EM operators: {} edges ({} on the boundary), {} faces, curl nnz {}",
            topology.n_edges(),
            ops.boundary_edges.iter().filter(|b| **b).count(),
            topology.n_faces(),
            ops.curl.nnz()
        );
        Ok(ops)
    }

    /// `Cᵀ M_f(1/μ) C`
    pub fn stiffness(&self) -> CooMatrix<f64> {
        operators::weighted_gram(&self.curl, &self.face_mu_inv)
    }

    /// `j = σ e` averaged onto edges
    pub fn edge_current<T>(&self, e: &[T]) -> Vec<T>
    where
        T: Copy + std::ops::Mul<f64, Output = T>,
    {
        e.iter()
            .zip(self.edge_sigma.iter().zip(&self.edge_volume))
            .map(|(&v, (&s, &vol))| v * (s / vol))
            .collect()
    }

    /// `h = b / μ` averaged onto faces
    pub fn face_field<T>(&self, b: &[T]) -> Vec<T>
    where
        T: Copy + std::ops::Mul<f64, Output = T>,
    {
        b.iter()
            .zip(self.face_mu_inv.iter().zip(&self.face_volume))
            .map(|(&v, (&w, &vol))| v * (w / vol))
            .collect()
    }
}

fn interior_node(mesh: &Mesh, name: &'static str, p: &Vec3) -> Result<[usize; 3], PhysicsError> {
    let outside = PhysicsError::ElectrodeOutsideMesh {
        name,
        position: position(p),
    };
    if mesh.locate(p).is_none() {
        return Err(outside);
    }
    let coords = [p.x, p.y, p.z];
    let mut ijk = [0usize; 3];
    for axis in 0..3 {
        let node = mesh.nearest_node(axis, coords[axis]);
        if node == 0 || node == mesh.h(axis).len() {
            return Err(outside);
        }
        ijk[axis] = node;
    }
    Ok(ijk)
}

/// Edge-integrated source current of a wire from B to A
///
/// The wire follows mesh edges from the node nearest the return electrode to
/// the node nearest the positive electrode, first along x, then y, then z.
/// Each edge carries `±I·L_e`, signed by the edge orientation. Both electrode
/// nodes must be interior.
pub(crate) fn wire_source(
    mesh: &Mesh,
    topology: &TensorTopology,
    src_a: &Vec3,
    src_b: &Vec3,
    current: f64,
) -> Result<Vec<f64>, PhysicsError> {
    let start = interior_node(mesh, "B", src_b)?;
    let end = interior_node(mesh, "A", src_a)?;
    let h = [mesh.hx(), mesh.hy(), mesh.hz()];

    let mut segments: FxHashMap<usize, f64> = FxHashMap::default();
    let mut at = start;
    for axis in 0..3 {
        while at[axis] != end[axis] {
            let forward = end[axis] > at[axis];
            let lo = if forward { at[axis] } else { at[axis] - 1 };
            let mut cell = at;
            cell[axis] = lo;
            let [i, j, k] = cell;
            let edge = match axis {
                0 => topology.edge_x(i, j, k),
                1 => topology.edge_y(i, j, k),
                _ => topology.edge_z(i, j, k),
            };
            let sign = if forward { 1.0 } else { -1.0 };
            *segments.entry(edge).or_insert(0.0) += sign * current * h[axis][lo];
            at[axis] = if forward { at[axis] + 1 } else { at[axis] - 1 };
        }
    }

    debug!(
        "Wire source from node {:?} to {:?} over {} edges",
        start,
        end,
        segments.len()
    );

    let mut source = vec![0.0; topology.n_edges()];
    for (edge, value) in segments {
        source[edge] = value;
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshKind;

    fn mesh() -> Mesh {
        Mesh::new(
            MeshKind::Tensor,
            [vec![1.0; 6], vec![1.0; 4], vec![2.0; 5]],
            [-3.0, -2.0, -5.0],
        )
        .unwrap()
    }

    #[test]
    fn test_wire_source_path() {
        let mesh = mesh();
        let topo = TensorTopology::of(&mesh).unwrap();
        let a = Vec3::new(-1.0, 0.0, -1.0);
        let b = Vec3::new(1.0, 0.0, 1.0);
        let s = wire_source(&mesh, &topo, &a, &b, 2.0).unwrap();

        // two x edges walked in -x, one z edge walked in -z
        let nonzero: Vec<f64> = s.iter().copied().filter(|v| *v != 0.0).collect();
        assert_eq!(nonzero.len(), 3);
        let total_x: f64 = s[..mesh.hx().len() * 5 * 6].iter().sum();
        assert_eq!(total_x, -2.0 * 2.0);
        assert_eq!(nonzero.iter().sum::<f64>(), -4.0 - 4.0);
    }

    #[test]
    fn test_boundary_electrode_rejected() {
        let mesh = mesh();
        let topo = TensorTopology::of(&mesh).unwrap();
        let a = Vec3::new(0.0, 0.0, 0.0);
        let on_edge = Vec3::new(-3.0, 0.0, 0.0);
        let outside = Vec3::new(50.0, 0.0, 0.0);
        assert!(matches!(
            wire_source(&mesh, &topo, &a, &on_edge, 1.0),
            Err(PhysicsError::ElectrodeOutsideMesh { name: "B", .. })
        ));
        assert!(wire_source(&mesh, &topo, &outside, &a, 1.0).is_err());
    }
}
