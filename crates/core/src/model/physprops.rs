//! Per-cell physical properties
//!
//! Maps a casing model onto a mesh: every cell is classified by the radius
//! and depth of its centre as fluid inside the casing, casing wall, or
//! background (with air and an optional layer depending on the background
//! model).

use super::casing::{Background, CasingParameters, ModelError};
use crate::core_types::MU_0;
use crate::mesh::Mesh;
use rayon::prelude::*;
use std::sync::Arc;

/// Material region a cell centre falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRegion {
    /// Fluid inside the casing
    Inside,
    /// Casing wall
    Casing,
    /// Background layer
    Layer,
    /// Air above the surface
    Air,
    /// Background rock
    Background,
}

impl CellRegion {
    /// Classify a point at radius `r` and depth `z`
    #[must_use]
    pub fn classify(cp: &CasingParameters, r: f64, z: f64) -> Self {
        let [z_bottom, z_top] = cp.casing_z();
        if (z_bottom..=z_top).contains(&z) {
            if r < cp.casing_a() {
                return CellRegion::Inside;
            }
            if r <= cp.casing_b() {
                return CellRegion::Casing;
            }
        }
        match &cp.background {
            Background::Wholespace => CellRegion::Background,
            Background::Halfspace if z > 0.0 => CellRegion::Air,
            Background::Halfspace => CellRegion::Background,
            Background::SingleLayer { layer_z, .. } => {
                if z > 0.0 {
                    CellRegion::Air
                } else if (layer_z[0]..=layer_z[1]).contains(&z) {
                    CellRegion::Layer
                } else {
                    CellRegion::Background
                }
            }
        }
    }

    /// Conductivity (S/m) of the region
    #[must_use]
    pub fn sigma(self, cp: &CasingParameters) -> f64 {
        match self {
            CellRegion::Inside => cp.sigma_inside,
            CellRegion::Casing => cp.sigma_casing,
            CellRegion::Air => cp.sigma_air,
            CellRegion::Background => cp.sigma_back,
            CellRegion::Layer => match &cp.background {
                Background::SingleLayer { sigma_layer, .. } => *sigma_layer,
                _ => cp.sigma_back,
            },
        }
    }

    /// Permeability (H/m) of the region
    #[must_use]
    pub fn mu(self, cp: &CasingParameters) -> f64 {
        match self {
            CellRegion::Casing => cp.mu_casing(),
            CellRegion::Inside | CellRegion::Air => MU_0,
            CellRegion::Background | CellRegion::Layer => cp.mu_back(),
        }
    }
}

/// Conductivity and permeability on every cell of a mesh
#[derive(Debug, Clone)]
pub struct PhysicalProperties {
    casing: Arc<CasingParameters>,
    mesh: Arc<Mesh>,
    sigma: Vec<f64>,
    mu: Vec<f64>,
}

impl PhysicalProperties {
    /// Classify every cell of `mesh` against `casing`
    #[must_use]
    pub fn new(casing: Arc<CasingParameters>, mesh: Arc<Mesh>) -> Self {
        let (sigma, mu): (Vec<f64>, Vec<f64>) = mesh
            .cell_centers()
            .par_iter()
            .map(|center| {
                let region = CellRegion::classify(&casing, mesh.center_radius(center), center[2]);
                (region.sigma(&casing), region.mu(&casing))
            })
            .unzip();

        Self {
            casing,
            mesh,
            sigma,
            mu,
        }
    }

    /// Rebuild from a concatenated `[sigma…, mu…]` model vector
    ///
    /// # Errors
    /// Returns `ModelError::ModelLength` unless the vector has two entries per cell
    pub fn from_model(
        casing: Arc<CasingParameters>,
        mesh: Arc<Mesh>,
        model: &[f64],
    ) -> Result<Self, ModelError> {
        let n = mesh.n_cells();
        if model.len() != 2 * n {
            return Err(ModelError::ModelLength {
                expected: 2 * n,
                actual: model.len(),
            });
        }
        let (sigma, mu) = Self::wires(model);
        Ok(Self {
            casing,
            mesh,
            sigma: sigma.to_vec(),
            mu: mu.to_vec(),
        })
    }

    /// Split a model vector into its `(sigma, mu)` halves
    #[must_use]
    pub fn wires(model: &[f64]) -> (&[f64], &[f64]) {
        model.split_at(model.len() / 2)
    }

    /// Concatenated `[sigma…, mu…]` model vector
    #[must_use]
    pub fn model(&self) -> Vec<f64> {
        let mut model = Vec::with_capacity(2 * self.sigma.len());
        model.extend_from_slice(&self.sigma);
        model.extend_from_slice(&self.mu);
        model
    }

    /// Cell conductivities (S/m)
    #[must_use]
    pub fn sigma(&self) -> &[f64] {
        &self.sigma
    }

    /// Cell permeabilities (H/m)
    #[must_use]
    pub fn mu(&self) -> &[f64] {
        &self.mu
    }

    /// Cell reciprocal permeabilities
    #[must_use]
    pub fn mu_inv(&self) -> Vec<f64> {
        self.mu.iter().map(|m| 1.0 / m).collect()
    }

    #[must_use]
    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    #[must_use]
    pub fn casing(&self) -> &Arc<CasingParameters> {
        &self.casing
    }

    /// Number of cells classified as casing wall
    #[must_use]
    pub fn n_casing_cells(&self) -> usize {
        self.sigma
            .iter()
            .filter(|&&s| s == self.casing.sigma_casing)
            .count()
    }
}
