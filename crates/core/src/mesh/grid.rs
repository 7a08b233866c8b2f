//! Mesh descriptor
//!
//! A `Mesh` is three ordered cell-width sequences plus an origin. On a
//! cylindrical mesh the axes are (r, θ, z); the radial origin is the axis of
//! symmetry and the angular widths span one full turn. Cells are numbered
//! x-fastest: `index = i + nx * (j + ny * k)`.

use super::MeshError;
use crate::core_types::{Vec3, FULL_TURN};
use serde::{Deserialize, Serialize};

/// Coordinate system of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshKind {
    /// Cartesian (x, y, z)
    Tensor,
    /// Cylindrical (r, θ, z)
    Cylindrical,
}

/// Structured mesh: cell widths per axis and the position of the first node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mesh {
    kind: MeshKind,
    h: [Vec<f64>; 3],
    origin: [f64; 3],
}

const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

impl Mesh {
    /// Build a mesh from cell widths and an origin
    ///
    /// # Errors
    /// Returns error if an axis is empty, a width is not finite and positive,
    /// the angular widths of a cylindrical mesh do not span 2π, or the radial
    /// origin is negative
    pub fn new(kind: MeshKind, h: [Vec<f64>; 3], origin: [f64; 3]) -> Result<Self, MeshError> {
        for (axis, widths) in h.iter().enumerate() {
            if widths.is_empty() {
                return Err(MeshError::InvalidWidths {
                    axis,
                    reason: format!("no cells along {}", AXIS_NAMES[axis]),
                });
            }
            if let Some(bad) = widths.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
                return Err(MeshError::InvalidWidths {
                    axis,
                    reason: format!("width {bad} is not finite and positive"),
                });
            }
        }
        if origin.iter().any(|v| !v.is_finite()) {
            return Err(MeshError::InvalidParameter {
                name: "x0",
                reason: format!("origin must be finite, got {origin:?}"),
            });
        }

        if kind == MeshKind::Cylindrical {
            let turn: f64 = h[1].iter().sum();
            if (turn - FULL_TURN).abs() > 1e-9 * FULL_TURN {
                return Err(MeshError::InvalidWidths {
                    axis: 1,
                    reason: format!("angular widths sum to {turn}, expected 2π"),
                });
            }
            if origin[0] < 0.0 {
                return Err(MeshError::InvalidParameter {
                    name: "x0",
                    reason: format!("radial origin must be non-negative, got {}", origin[0]),
                });
            }
        }

        Ok(Self { kind, h, origin })
    }

    /// Coordinate system
    #[must_use]
    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    /// Cell widths along `axis`
    #[must_use]
    pub fn h(&self, axis: usize) -> &[f64] {
        &self.h[axis]
    }

    /// Radial (or x) widths
    #[must_use]
    pub fn hx(&self) -> &[f64] {
        &self.h[0]
    }

    /// Angular (or y) widths
    #[must_use]
    pub fn hy(&self) -> &[f64] {
        &self.h[1]
    }

    /// Vertical widths
    #[must_use]
    pub fn hz(&self) -> &[f64] {
        &self.h[2]
    }

    /// Position of the first node
    #[must_use]
    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Cells per axis
    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        [self.h[0].len(), self.h[1].len(), self.h[2].len()]
    }

    /// Total number of cells
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.shape().iter().product()
    }

    /// True for a cylindrical mesh with a single angular cell
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        self.kind == MeshKind::Cylindrical && self.h[1].len() == 1
    }

    /// Node coordinates along `axis` (`n + 1` values)
    #[must_use]
    pub fn nodes(&self, axis: usize) -> Vec<f64> {
        let mut nodes = Vec::with_capacity(self.h[axis].len() + 1);
        let mut x = self.origin[axis];
        nodes.push(x);
        for w in &self.h[axis] {
            x += w;
            nodes.push(x);
        }
        nodes
    }

    /// Cell-centre coordinates along `axis`
    #[must_use]
    pub fn centers(&self, axis: usize) -> Vec<f64> {
        self.nodes(axis)
            .windows(2)
            .map(|w| 0.5 * (w[0] + w[1]))
            .collect()
    }

    /// First and last node along `axis`
    #[must_use]
    pub fn extent(&self, axis: usize) -> (f64, f64) {
        let total: f64 = self.h[axis].iter().sum();
        (self.origin[axis], self.origin[axis] + total)
    }

    /// Linear index of cell `(i, j, k)`
    #[must_use]
    pub fn cell_index(&self, i: usize, j: usize, k: usize) -> usize {
        let [nx, ny, _] = self.shape();
        i + nx * (j + ny * k)
    }

    /// `(i, j, k)` of a linear cell index
    #[must_use]
    pub fn cell_ijk(&self, index: usize) -> [usize; 3] {
        let [nx, ny, _] = self.shape();
        [index % nx, (index / nx) % ny, index / (nx * ny)]
    }

    /// Volume of cell `(i, j, k)`
    #[must_use]
    pub fn cell_volume(&self, i: usize, j: usize, k: usize) -> f64 {
        match self.kind {
            MeshKind::Tensor => self.h[0][i] * self.h[1][j] * self.h[2][k],
            MeshKind::Cylindrical => {
                let r1: f64 = self.origin[0] + self.h[0][..i].iter().sum::<f64>();
                let r2 = r1 + self.h[0][i];
                0.5 * (r2 * r2 - r1 * r1) * self.h[1][j] * self.h[2][k]
            }
        }
    }

    /// Volumes of all cells in linear order
    #[must_use]
    pub fn cell_volumes(&self) -> Vec<f64> {
        let [nx, ny, nz] = self.shape();
        let xn = self.nodes(0);
        let mut volumes = Vec::with_capacity(self.n_cells());
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let v = match self.kind {
                        MeshKind::Tensor => self.h[0][i] * self.h[1][j] * self.h[2][k],
                        MeshKind::Cylindrical => {
                            0.5 * (xn[i + 1] * xn[i + 1] - xn[i] * xn[i]) * self.h[1][j] * self.h[2][k]
                        }
                    };
                    volumes.push(v);
                }
            }
        }
        volumes
    }

    /// Cell centres in mesh coordinates (x/r, y/θ, z), linear order
    #[must_use]
    pub fn cell_centers(&self) -> Vec<[f64; 3]> {
        let [cx, cy, cz] = [self.centers(0), self.centers(1), self.centers(2)];
        let mut out = Vec::with_capacity(self.n_cells());
        for &z in &cz {
            for &y in &cy {
                for &x in &cx {
                    out.push([x, y, z]);
                }
            }
        }
        out
    }

    /// Distance of a cell centre from the z-axis
    #[must_use]
    pub fn center_radius(&self, center: &[f64; 3]) -> f64 {
        match self.kind {
            MeshKind::Tensor => center[0].hypot(center[1]),
            MeshKind::Cylindrical => center[0],
        }
    }

    /// Convert a Cartesian point to mesh coordinates
    #[must_use]
    pub fn to_mesh_coords(&self, p: &Vec3) -> [f64; 3] {
        match self.kind {
            MeshKind::Tensor => [p.x, p.y, p.z],
            MeshKind::Cylindrical => {
                let theta = (p.y.atan2(p.x) - self.origin[1]).rem_euclid(FULL_TURN) + self.origin[1];
                [p.x.hypot(p.y), theta, p.z]
            }
        }
    }

    /// Cell containing a Cartesian point, `None` outside the mesh
    #[must_use]
    pub fn locate(&self, p: &Vec3) -> Option<[usize; 3]> {
        let coords = self.to_mesh_coords(p);
        let mut ijk = [0usize; 3];
        for axis in 0..3 {
            ijk[axis] = locate_on_axis(&self.nodes(axis), coords[axis])?;
        }
        Some(ijk)
    }

    /// Nearest node index along `axis`
    #[must_use]
    pub fn nearest_node(&self, axis: usize, x: f64) -> usize {
        let nodes = self.nodes(axis);
        let mut best = 0;
        for (n, node) in nodes.iter().enumerate() {
            if (node - x).abs() < (nodes[best] - x).abs() {
                best = n;
            }
        }
        best
    }
}

fn locate_on_axis(nodes: &[f64], x: f64) -> Option<usize> {
    let (first, last) = (nodes[0], nodes[nodes.len() - 1]);
    if !(first..=last).contains(&x) {
        return None;
    }
    let n_cells = nodes.len() - 1;
    let above = nodes.partition_point(|&node| node <= x);
    Some(above.saturating_sub(1).min(n_cells - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn cyl() -> Mesh {
        Mesh::new(
            MeshKind::Cylindrical,
            [vec![1.0, 1.0], vec![FULL_TURN], vec![2.0, 2.0, 2.0]],
            [0.0, 0.0, -6.0],
        )
        .unwrap()
    }

    #[test]
    fn test_shape_and_nodes() {
        let mesh = Mesh::new(
            MeshKind::Tensor,
            [vec![1.0, 2.0], vec![1.0], vec![0.5, 0.5, 1.0]],
            [-1.0, 0.0, 0.0],
        )
        .unwrap();
        assert_eq!(mesh.shape(), [2, 1, 3]);
        assert_eq!(mesh.n_cells(), 6);
        assert_eq!(mesh.nodes(0), vec![-1.0, 0.0, 2.0]);
        assert_eq!(mesh.centers(0), vec![-0.5, 1.0]);
        assert_eq!(mesh.extent(2), (0.0, 2.0));
        assert_eq!(mesh.cell_ijk(mesh.cell_index(1, 0, 2)), [1, 0, 2]);
    }

    #[test]
    fn test_cylindrical_volumes() {
        let mesh = cyl();
        let v = mesh.cell_volumes();
        assert_relative_eq!(v[0], PI * 1.0 * 2.0, epsilon = 1e-12);
        assert_relative_eq!(v[1], PI * 3.0 * 2.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.cell_volume(1, 0, 2), v[mesh.cell_index(1, 0, 2)]);
        let total: f64 = v.iter().sum();
        assert_relative_eq!(total, PI * 4.0 * 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_locate_cylindrical_uses_radius() {
        let mesh = cyl();
        assert_eq!(mesh.locate(&Vec3::new(0.0, 1.5, -1.0)), Some([1, 0, 2]));
        assert_eq!(mesh.locate(&Vec3::new(-0.5, 0.0, -5.0)), Some([0, 0, 0]));
        assert_eq!(mesh.locate(&Vec3::new(3.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_rejects_bad_widths() {
        let err = Mesh::new(MeshKind::Tensor, [vec![], vec![1.0], vec![1.0]], [0.0; 3]).unwrap_err();
        assert!(matches!(err, MeshError::InvalidWidths { axis: 0, .. }));

        let err = Mesh::new(
            MeshKind::Cylindrical,
            [vec![1.0], vec![1.0], vec![1.0]],
            [0.0; 3],
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::InvalidWidths { axis: 1, .. }));

        assert!(Mesh::new(MeshKind::Tensor, [vec![1.0], vec![-1.0], vec![1.0]], [0.0; 3]).is_err());
    }
}
