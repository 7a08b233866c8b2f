//! Cylindrical (r, θ, z) mesh resolving the casing wall
//!
//! Radially the mesh has four regions:
//! 1. a fine uniform region at `csx1` covering the casing wall,
//! 2. a geometric transition from `csx1` up to roughly `csx2`, rescaled so the
//!    fine + transition extent lands on a whole multiple of `csx2`,
//! 3. a uniform region at `csx2` out to `domain_x2`,
//! 4. geometric padding to effective infinity.
//!
//! Vertically the core covers the casing with `nca` / `ncb` extra cells and
//! is padded at both ends, as on the tensor mesh.

use super::tensor_spec::{mesh_tensor, padded_core, TensorBlock};
use super::{cells_to_cover, require_growth, require_positive, Mesh, MeshError, MeshKind};
use crate::core_types::FULL_TURN;
use crate::model::CasingParameters;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Parameters of a cylindrical mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CylMeshSpec {
    /// Fine radial cell size around the casing (m)
    pub csx1: f64,
    /// Coarse radial cell size (m)
    pub csx2: f64,
    /// Growth factor of the fine-to-coarse transition
    pub pfx1: f64,
    /// Growth factor of the radial padding
    pub pfx2: f64,
    /// Radial extent of the uniform coarse region (m)
    pub domain_x2: f64,
    /// Angular cells; 1 collapses to an axisymmetric mesh
    pub ncy: usize,
    /// Explicit angular widths, normalized to one full turn
    pub hy: Option<Vec<f64>>,
    /// Vertical core cell size (m)
    pub csz: f64,
    /// Extra core cells above the casing
    pub nca: usize,
    /// Extra core cells below the casing
    pub ncb: usize,
    /// Vertical padding factor
    pub pfz: f64,
    /// Radial padding cells
    pub npadx: usize,
    /// Vertical padding cells
    pub npadz: usize,
    /// Origin override
    pub x0: Option<[f64; 3]>,
}

impl Default for CylMeshSpec {
    fn default() -> Self {
        Self {
            csx1: 2.5e-3,
            csx2: 25.0,
            pfx1: 1.3,
            pfx2: 1.5,
            domain_x2: 1000.0,
            ncy: 1,
            hy: None,
            csz: 0.05,
            nca: 5,
            ncb: 5,
            pfz: 1.5,
            npadx: 23,
            npadz: 38,
            x0: None,
        }
    }
}

/// Scale angular widths so they sum to one full turn
///
/// # Errors
/// Returns error if the list is empty or a width is not finite and positive
pub fn normalize_turn(widths: &[f64]) -> Result<Vec<f64>, MeshError> {
    if widths.is_empty() {
        return Err(MeshError::InvalidWidths {
            axis: 1,
            reason: "no angular cells".into(),
        });
    }
    if let Some(bad) = widths.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
        return Err(MeshError::InvalidWidths {
            axis: 1,
            reason: format!("angular width {bad} is not finite and positive"),
        });
    }

    let total: f64 = widths.iter().sum();
    if (total - FULL_TURN).abs() <= 1e-12 * FULL_TURN {
        return Ok(widths.to_vec());
    }

    warn!(
        "Angular widths sum to {:.6} rad, rescaling {} cells to 2π",
        total,
        widths.len()
    );
    let scale = FULL_TURN / total;
    Ok(widths.iter().map(|w| w * scale).collect())
}

impl CylMeshSpec {
    /// Fine radial cells: the casing wall plus two cells
    #[must_use]
    pub fn ncx1(&self, cp: &CasingParameters) -> usize {
        cells_to_cover(cp.casing_b() / self.csx1 + 2.0, 1.0)
    }

    /// Cells in the fine-to-coarse transition
    #[must_use]
    pub fn npadx1(&self) -> usize {
        let n = ((self.csx2 / self.csx1).ln() / self.pfx1.ln()).floor();
        if n.is_finite() && n > 0.0 {
            n as usize
        } else {
            0
        }
    }

    /// Vertical core cells
    #[must_use]
    pub fn ncz(&self, cp: &CasingParameters) -> usize {
        cells_to_cover(-cp.casing_z()[0], self.csz) + self.nca + self.ncb
    }

    /// Angular cells actually used
    #[must_use]
    pub fn n_theta(&self) -> usize {
        self.hy.as_ref().map_or(self.ncy, Vec::len)
    }

    /// Replace the angular widths, rescaling them to one full turn
    ///
    /// # Errors
    /// Returns error if the list is empty or holds a non-positive width
    pub fn set_hy(&mut self, widths: &[f64]) -> Result<(), MeshError> {
        let hy = normalize_turn(widths)?;
        self.ncy = hy.len();
        self.hy = Some(hy);
        Ok(())
    }

    /// Check cell sizes and padding factors
    ///
    /// # Errors
    /// Returns the first parameter found out of range
    pub fn validate(&self) -> Result<(), MeshError> {
        require_positive("csx1", self.csx1)?;
        require_positive("csx2", self.csx2)?;
        require_positive("csz", self.csz)?;
        require_positive("domain_x2", self.domain_x2)?;
        require_growth("pfx2", self.pfx2)?;
        require_growth("pfz", self.pfz)?;
        if !(self.pfx1.is_finite() && self.pfx1 > 1.0) {
            return Err(MeshError::InvalidParameter {
                name: "pfx1",
                reason: format!("transition factor must be > 1, got {}", self.pfx1),
            });
        }
        if self.csx2 < self.csx1 {
            return Err(MeshError::InvalidParameter {
                name: "csx2",
                reason: format!("coarse size {} is below fine size {}", self.csx2, self.csx1),
            });
        }
        if self.ncy == 0 {
            return Err(MeshError::InvalidParameter {
                name: "ncy",
                reason: "at least one angular cell is required".into(),
            });
        }
        if let Some(hy) = &self.hy {
            if hy.len() != self.ncy {
                return Err(MeshError::InvalidParameter {
                    name: "ncy",
                    reason: format!("ncy = {} but hy has {} widths", self.ncy, hy.len()),
                });
            }
        }
        Ok(())
    }

    /// Radial widths
    ///
    /// # Errors
    /// Returns error if the parameters are out of range
    pub fn hx(&self, cp: &CasingParameters) -> Result<Vec<f64>, MeshError> {
        self.validate()?;

        let hx1a = vec![self.csx1; self.ncx1(cp)];
        let mut hx1b = mesh_tensor(&[TensorBlock::padded(self.csx1, self.npadx1(), self.pfx1)])?;

        let fine: f64 = hx1a.iter().sum();
        let transition: f64 = hx1b.iter().sum();
        let fine_end = if hx1b.is_empty() {
            fine
        } else {
            let dx1 = fine + transition;
            let mut end = (dx1 / self.csx2).floor() * self.csx2;
            if end <= fine {
                end = (dx1 / self.csx2).ceil() * self.csx2;
            }
            let scale = (end - fine) / transition;
            hx1b.iter_mut().for_each(|w| *w *= scale);
            end
        };

        let ncx2 = cells_to_cover(self.domain_x2 - fine_end, self.csx2);
        let hx2 = mesh_tensor(&[
            TensorBlock::uniform(self.csx2, ncx2),
            TensorBlock::padded(self.csx2, self.npadx, self.pfx2),
        ])?;

        let mut hx = hx1a;
        hx.extend(hx1b);
        hx.extend(hx2);
        Ok(hx)
    }

    /// Angular widths
    ///
    /// # Errors
    /// Returns error if explicit widths are invalid
    pub fn hy(&self) -> Result<Vec<f64>, MeshError> {
        match &self.hy {
            Some(widths) => normalize_turn(widths),
            None if self.ncy == 1 => Ok(vec![FULL_TURN]),
            None => Ok(vec![FULL_TURN / self.ncy as f64; self.ncy]),
        }
    }

    /// Vertical widths
    ///
    /// # Errors
    /// Returns error if `csz` or `pfz` is invalid
    pub fn hz(&self, cp: &CasingParameters) -> Result<Vec<f64>, MeshError> {
        padded_core(self.csz, self.ncz(cp), self.npadz, self.pfz)
    }

    /// Origin for the given vertical widths, unless overridden by `x0`
    #[must_use]
    pub fn origin(&self, cp: &CasingParameters, hz: &[f64]) -> [f64; 3] {
        if let Some(x0) = self.x0 {
            return x0;
        }
        let n = (self.npadz + self.ncz(cp) - self.nca).min(hz.len());
        [0.0, 0.0, -hz[..n].iter().sum::<f64>()]
    }

    /// Build the mesh
    ///
    /// # Errors
    /// Returns error if the parameters are out of range
    pub fn build(&self, cp: &CasingParameters) -> Result<Mesh, MeshError> {
        let hx = self.hx(cp)?;
        let hy = self.hy()?;
        let hz = self.hz(cp)?;
        let origin = self.origin(cp, &hz);
        Mesh::new(MeshKind::Cylindrical, [hx, hy, hz], origin)
    }
}
