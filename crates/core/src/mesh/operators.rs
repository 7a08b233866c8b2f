//! Finite-volume operators on structured meshes
//!
//! Tensor meshes carry a staggered (Yee) layout: scalar potentials on nodes,
//! electric fields on edges, magnetic flux on faces. All index spaces are
//! x-fastest. Edge and face numbering stacks the x, y and z families in that
//! order.
//!
//! The cell-centred conductance matrix used by the DC problem is available on
//! both tensor and cylindrical meshes.

use super::{Mesh, MeshError, MeshKind};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Index spaces of a tensor mesh with `nx * ny * nz` cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorTopology {
    /// Cells in x
    pub nx: usize,
    /// Cells in y
    pub ny: usize,
    /// Cells in z
    pub nz: usize,
}

impl TensorTopology {
    /// Topology of a tensor mesh
    ///
    /// # Errors
    /// Returns `MeshError::Unsupported` for cylindrical meshes
    pub fn of(mesh: &Mesh) -> Result<Self, MeshError> {
        if mesh.kind() != MeshKind::Tensor {
            return Err(MeshError::Unsupported {
                kind: mesh.kind(),
                operation: "edge/face operators",
            });
        }
        let [nx, ny, nz] = mesh.shape();
        Ok(Self { nx, ny, nz })
    }

    #[must_use]
    pub fn n_nodes(&self) -> usize {
        (self.nx + 1) * (self.ny + 1) * (self.nz + 1)
    }

    fn n_edges_x(&self) -> usize {
        self.nx * (self.ny + 1) * (self.nz + 1)
    }

    fn n_edges_y(&self) -> usize {
        (self.nx + 1) * self.ny * (self.nz + 1)
    }

    fn n_edges_z(&self) -> usize {
        (self.nx + 1) * (self.ny + 1) * self.nz
    }

    #[must_use]
    pub fn n_edges(&self) -> usize {
        self.n_edges_x() + self.n_edges_y() + self.n_edges_z()
    }

    fn n_faces_x(&self) -> usize {
        (self.nx + 1) * self.ny * self.nz
    }

    fn n_faces_y(&self) -> usize {
        self.nx * (self.ny + 1) * self.nz
    }

    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.n_faces_x() + self.n_faces_y() + self.nx * self.ny * (self.nz + 1)
    }

    #[must_use]
    pub fn node(&self, i: usize, j: usize, k: usize) -> usize {
        i + (self.nx + 1) * (j + (self.ny + 1) * k)
    }

    #[must_use]
    pub fn edge_x(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.nx * (j + (self.ny + 1) * k)
    }

    #[must_use]
    pub fn edge_y(&self, i: usize, j: usize, k: usize) -> usize {
        self.n_edges_x() + i + (self.nx + 1) * (j + self.ny * k)
    }

    #[must_use]
    pub fn edge_z(&self, i: usize, j: usize, k: usize) -> usize {
        self.n_edges_x() + self.n_edges_y() + i + (self.nx + 1) * (j + (self.ny + 1) * k)
    }

    #[must_use]
    pub fn face_x(&self, i: usize, j: usize, k: usize) -> usize {
        i + (self.nx + 1) * (j + self.ny * k)
    }

    #[must_use]
    pub fn face_y(&self, i: usize, j: usize, k: usize) -> usize {
        self.n_faces_x() + i + self.nx * (j + (self.ny + 1) * k)
    }

    #[must_use]
    pub fn face_z(&self, i: usize, j: usize, k: usize) -> usize {
        self.n_faces_x() + self.n_faces_y() + i + self.nx * (j + self.ny * k)
    }

    /// Edges tangential to the outer boundary
    #[must_use]
    pub fn boundary_edges(&self) -> Vec<bool> {
        let (nx, ny, nz) = (self.nx, self.ny, self.nz);
        let mut mask = vec![false; self.n_edges()];
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..nx {
                    mask[self.edge_x(i, j, k)] = j == 0 || j == ny || k == 0 || k == nz;
                }
            }
        }
        for k in 0..=nz {
            for j in 0..ny {
                for i in 0..=nx {
                    mask[self.edge_y(i, j, k)] = i == 0 || i == nx || k == 0 || k == nz;
                }
            }
        }
        for k in 0..nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    mask[self.edge_z(i, j, k)] = i == 0 || i == nx || j == 0 || j == ny;
                }
            }
        }
        mask
    }

    /// Nodes on the outer boundary
    #[must_use]
    pub fn boundary_nodes(&self) -> Vec<bool> {
        let (nx, ny, nz) = (self.nx, self.ny, self.nz);
        let mut mask = vec![false; self.n_nodes()];
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    mask[self.node(i, j, k)] =
                        i == 0 || i == nx || j == 0 || j == ny || k == 0 || k == nz;
                }
            }
        }
        mask
    }
}

/// Edge lengths in edge order
///
/// # Errors
/// Returns error for cylindrical meshes
pub fn edge_lengths(mesh: &Mesh) -> Result<Vec<f64>, MeshError> {
    let topo = TensorTopology::of(mesh)?;
    let (hx, hy, hz) = (mesh.hx(), mesh.hy(), mesh.hz());
    let mut lengths = Vec::with_capacity(topo.n_edges());
    for _k in 0..=topo.nz {
        for _j in 0..=topo.ny {
            lengths.extend_from_slice(hx);
        }
    }
    for _k in 0..=topo.nz {
        for &w in hy {
            lengths.extend(std::iter::repeat(w).take(topo.nx + 1));
        }
    }
    for &w in hz {
        lengths.extend(std::iter::repeat(w).take((topo.nx + 1) * (topo.ny + 1)));
    }
    Ok(lengths)
}

/// Face areas in face order
///
/// # Errors
/// Returns error for cylindrical meshes
pub fn face_areas(mesh: &Mesh) -> Result<Vec<f64>, MeshError> {
    let topo = TensorTopology::of(mesh)?;
    let (hx, hy, hz) = (mesh.hx(), mesh.hy(), mesh.hz());
    let mut areas = Vec::with_capacity(topo.n_faces());
    for &dz in hz {
        for &dy in hy {
            areas.extend(std::iter::repeat(dy * dz).take(topo.nx + 1));
        }
    }
    for &dz in hz {
        for _j in 0..=topo.ny {
            areas.extend(hx.iter().map(|dx| dx * dz));
        }
    }
    for _k in 0..=topo.nz {
        for &dy in hy {
            areas.extend(hx.iter().map(|dx| dx * dy));
        }
    }
    Ok(areas)
}

/// Discrete curl, faces × edges
///
/// Row `f` holds `±L_e / A_f` for the four edges bounding face `f`, oriented
/// by the right-hand rule about the face normal.
///
/// # Errors
/// Returns error for cylindrical meshes
pub fn curl(mesh: &Mesh) -> Result<CsrMatrix<f64>, MeshError> {
    let topo = TensorTopology::of(mesh)?;
    let (hx, hy, hz) = (mesh.hx(), mesh.hy(), mesh.hz());
    let (nx, ny, nz) = (topo.nx, topo.ny, topo.nz);
    let mut coo = CooMatrix::new(topo.n_faces(), topo.n_edges());

    // (curl e)_x = d(ez)/dy - d(ey)/dz
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..=nx {
                let f = topo.face_x(i, j, k);
                let area = hy[j] * hz[k];
                coo.push(f, topo.edge_y(i, j, k), hy[j] / area);
                coo.push(f, topo.edge_z(i, j + 1, k), hz[k] / area);
                coo.push(f, topo.edge_y(i, j, k + 1), -hy[j] / area);
                coo.push(f, topo.edge_z(i, j, k), -hz[k] / area);
            }
        }
    }
    // (curl e)_y = d(ex)/dz - d(ez)/dx
    for k in 0..nz {
        for j in 0..=ny {
            for i in 0..nx {
                let f = topo.face_y(i, j, k);
                let area = hx[i] * hz[k];
                coo.push(f, topo.edge_z(i, j, k), hz[k] / area);
                coo.push(f, topo.edge_x(i, j, k + 1), hx[i] / area);
                coo.push(f, topo.edge_z(i + 1, j, k), -hz[k] / area);
                coo.push(f, topo.edge_x(i, j, k), -hx[i] / area);
            }
        }
    }
    // (curl e)_z = d(ey)/dx - d(ex)/dy
    for k in 0..=nz {
        for j in 0..ny {
            for i in 0..nx {
                let f = topo.face_z(i, j, k);
                let area = hx[i] * hy[j];
                coo.push(f, topo.edge_x(i, j, k), hx[i] / area);
                coo.push(f, topo.edge_y(i + 1, j, k), hy[j] / area);
                coo.push(f, topo.edge_x(i, j + 1, k), -hx[i] / area);
                coo.push(f, topo.edge_y(i, j, k), -hy[j] / area);
            }
        }
    }

    Ok(CsrMatrix::from(&coo))
}

/// Nodal gradient, edges × nodes: `(φ(end) - φ(start)) / L_e`
///
/// # Errors
/// Returns error for cylindrical meshes
pub fn nodal_gradient(mesh: &Mesh) -> Result<CsrMatrix<f64>, MeshError> {
    let topo = TensorTopology::of(mesh)?;
    let (hx, hy, hz) = (mesh.hx(), mesh.hy(), mesh.hz());
    let (nx, ny, nz) = (topo.nx, topo.ny, topo.nz);
    let mut coo = CooMatrix::new(topo.n_edges(), topo.n_nodes());

    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..nx {
                let e = topo.edge_x(i, j, k);
                coo.push(e, topo.node(i, j, k), -1.0 / hx[i]);
                coo.push(e, topo.node(i + 1, j, k), 1.0 / hx[i]);
            }
        }
    }
    for k in 0..=nz {
        for j in 0..ny {
            for i in 0..=nx {
                let e = topo.edge_y(i, j, k);
                coo.push(e, topo.node(i, j, k), -1.0 / hy[j]);
                coo.push(e, topo.node(i, j + 1, k), 1.0 / hy[j]);
            }
        }
    }
    for k in 0..nz {
        for j in 0..=ny {
            for i in 0..=nx {
                let e = topo.edge_z(i, j, k);
                coo.push(e, topo.node(i, j, k), -1.0 / hz[k]);
                coo.push(e, topo.node(i, j, k + 1), 1.0 / hz[k]);
            }
        }
    }

    Ok(CsrMatrix::from(&coo))
}

fn check_weights(mesh: &Mesh, weights: &[f64]) -> Result<(), MeshError> {
    if weights.len() == mesh.n_cells() {
        Ok(())
    } else {
        Err(MeshError::InvalidParameter {
            name: "weights",
            reason: format!("{} cell weights for {} cells", weights.len(), mesh.n_cells()),
        })
    }
}

/// Diagonal edge inner product: each cell adds `w·V/4` to its 12 edges
///
/// # Errors
/// Returns error for cylindrical meshes or a weight count mismatch
pub fn edge_inner_product(mesh: &Mesh, weights: &[f64]) -> Result<Vec<f64>, MeshError> {
    let topo = TensorTopology::of(mesh)?;
    check_weights(mesh, weights)?;
    let volumes = mesh.cell_volumes();
    let mut diag = vec![0.0; topo.n_edges()];

    for k in 0..topo.nz {
        for j in 0..topo.ny {
            for i in 0..topo.nx {
                let c = mesh.cell_index(i, j, k);
                let share = 0.25 * weights[c] * volumes[c];
                for (a, b) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    diag[topo.edge_x(i, j + a, k + b)] += share;
                    diag[topo.edge_y(i + a, j, k + b)] += share;
                    diag[topo.edge_z(i + a, j + b, k)] += share;
                }
            }
        }
    }
    Ok(diag)
}

/// Diagonal face inner product: each cell adds `w·V/2` to its 6 faces
///
/// # Errors
/// Returns error for cylindrical meshes or a weight count mismatch
pub fn face_inner_product(mesh: &Mesh, weights: &[f64]) -> Result<Vec<f64>, MeshError> {
    let topo = TensorTopology::of(mesh)?;
    check_weights(mesh, weights)?;
    let volumes = mesh.cell_volumes();
    let mut diag = vec![0.0; topo.n_faces()];

    for k in 0..topo.nz {
        for j in 0..topo.ny {
            for i in 0..topo.nx {
                let c = mesh.cell_index(i, j, k);
                let share = 0.5 * weights[c] * volumes[c];
                for a in 0..2 {
                    diag[topo.face_x(i + a, j, k)] += share;
                    diag[topo.face_y(i, j + a, k)] += share;
                    diag[topo.face_z(i, j, k + a)] += share;
                }
            }
        }
    }
    Ok(diag)
}

/// `Cᵀ diag(w) C` as triplets, for a CSR operator `C`
#[must_use]
pub fn weighted_gram(c: &CsrMatrix<f64>, weights: &[f64]) -> CooMatrix<f64> {
    let mut coo = CooMatrix::new(c.ncols(), c.ncols());
    for (row, &w) in c.row_iter().zip(weights) {
        let (cols, vals) = (row.col_indices(), row.values());
        for (&a, &va) in cols.iter().zip(vals) {
            for (&b, &vb) in cols.iter().zip(vals) {
                coo.push(a, b, w * va * vb);
            }
        }
    }
    coo
}

struct Link {
    a: usize,
    b: Option<usize>,
    area: f64,
    da: f64,
    db: f64,
}

/// Cell-centred conductance matrix `-∇·σ∇` with a grounded outer boundary
///
/// Each interior face couples its two cells with conductance
/// `A / (d_a/σ_a + d_b/σ_b)`, where `d` is the centre-to-face distance. Outer
/// faces tie their cell to zero potential. On cylindrical meshes the faces on
/// the symmetry axis have zero area and are skipped, and angular neighbours
/// wrap around when there is more than one angular cell.
///
/// # Errors
/// Returns error if `sigma` does not have one value per cell
pub fn cell_conductance(mesh: &Mesh, sigma: &[f64]) -> Result<CooMatrix<f64>, MeshError> {
    check_weights(mesh, sigma)?;
    let [nx, ny, nz] = mesh.shape();
    let (hx, hy, hz) = (mesh.hx(), mesh.hy(), mesh.hz());
    let xn = mesh.nodes(0);
    let xc = mesh.centers(0);
    let cyl = mesh.kind() == MeshKind::Cylindrical;
    let mut links = Vec::new();

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..=nx {
                let area = if cyl { xn[i] * hy[j] * hz[k] } else { hy[j] * hz[k] };
                if area <= 0.0 {
                    continue;
                }
                let (a, b) = match (i.checked_sub(1), i < nx) {
                    (Some(l), true) => (mesh.cell_index(l, j, k), Some(mesh.cell_index(i, j, k))),
                    (Some(l), false) => (mesh.cell_index(l, j, k), None),
                    (None, _) => (mesh.cell_index(i, j, k), None),
                };
                let da = 0.5 * if i > 0 { hx[i - 1] } else { hx[i] };
                let db = if i < nx { 0.5 * hx[i] } else { 0.0 };
                links.push(Link { a, b, area, da, db });
            }
        }
    }

    // an axisymmetric mesh has no angular faces
    let periodic = cyl && ny > 1;
    let angular_faces = if cyl && ny == 1 { 0 } else if periodic { ny } else { ny + 1 };
    for k in 0..nz {
        for i in 0..nx {
            for j in 0..angular_faces {
                let area = hx[i] * hz[k];
                let arc = |jj: usize| if cyl { xc[i] * hy[jj] } else { hy[jj] };
                let link = if periodic {
                    let prev = (j + ny - 1) % ny;
                    Link {
                        a: mesh.cell_index(i, prev, k),
                        b: Some(mesh.cell_index(i, j, k)),
                        area,
                        da: 0.5 * arc(prev),
                        db: 0.5 * arc(j),
                    }
                } else if j == 0 {
                    Link { a: mesh.cell_index(i, 0, k), b: None, area, da: 0.5 * arc(0), db: 0.0 }
                } else if j == ny {
                    Link { a: mesh.cell_index(i, ny - 1, k), b: None, area, da: 0.5 * arc(ny - 1), db: 0.0 }
                } else {
                    Link {
                        a: mesh.cell_index(i, j - 1, k),
                        b: Some(mesh.cell_index(i, j, k)),
                        area,
                        da: 0.5 * arc(j - 1),
                        db: 0.5 * arc(j),
                    }
                };
                links.push(link);
            }
        }
    }

    for k in 0..=nz {
        for j in 0..ny {
            for i in 0..nx {
                let area = if cyl {
                    0.5 * (xn[i + 1] * xn[i + 1] - xn[i] * xn[i]) * hy[j]
                } else {
                    hx[i] * hy[j]
                };
                let link = if k == 0 {
                    Link { a: mesh.cell_index(i, j, 0), b: None, area, da: 0.5 * hz[0], db: 0.0 }
                } else if k == nz {
                    Link { a: mesh.cell_index(i, j, nz - 1), b: None, area, da: 0.5 * hz[nz - 1], db: 0.0 }
                } else {
                    Link {
                        a: mesh.cell_index(i, j, k - 1),
                        b: Some(mesh.cell_index(i, j, k)),
                        area,
                        da: 0.5 * hz[k - 1],
                        db: 0.5 * hz[k],
                    }
                };
                links.push(link);
            }
        }
    }

    let n = mesh.n_cells();
    let mut coo = CooMatrix::new(n, n);
    for link in links {
        match link.b {
            Some(b) => {
                let g = link.area / (link.da / sigma[link.a] + link.db / sigma[b]);
                coo.push(link.a, link.a, g);
                coo.push(b, b, g);
                coo.push(link.a, b, -g);
                coo.push(b, link.a, -g);
            }
            None => {
                let g = link.area * sigma[link.a] / link.da;
                coo.push(link.a, link.a, g);
            }
        }
    }
    Ok(coo)
}
