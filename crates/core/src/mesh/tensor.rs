//! Cartesian tensor mesh around a casing and a surface electrode pair
//!
//! The core region covers the horizontal electrode separation in x, a fixed
//! width in y and the casing length in z, with `nch` extra core cells on both
//! horizontal sides and `nca` / `ncb` above / below in z. Each axis is padded
//! geometrically on both ends. The origin is placed so that x = y = 0 sits
//! `nch` cells before the high end of the core and z = 0 sits `nca` cells below
//! the top of the core.

use super::tensor_spec::padded_core;
use super::{cells_to_cover, require_growth, require_positive, Mesh, MeshError, MeshKind};
use crate::model::CasingParameters;
use serde::{Deserialize, Serialize};

/// Parameters of a tensor mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TensorMeshSpec {
    /// Core cell size in x (m)
    pub csx: f64,
    /// Core cell size in y (m)
    pub csy: f64,
    /// Core cell size in z (m)
    pub csz: f64,

    /// Padding factor in x
    pub pfx: f64,
    /// Padding factor in y
    pub pfy: f64,
    /// Padding factor in z
    pub pfz: f64,

    /// Extra core cells on each horizontal side
    pub nch: usize,
    /// Extra core cells above the casing
    pub nca: usize,
    /// Extra core cells below the casing
    pub ncb: usize,

    /// Padding cells in x
    pub npadx: usize,
    /// Padding cells in y
    pub npady: usize,
    /// Padding cells in z
    pub npadz: usize,

    /// Core extent in x; defaults to the electrode separation
    pub domain_x: Option<f64>,
    /// Core extent in y
    pub domain_y: f64,
    /// Core extent in z; defaults to the casing length
    pub domain_z: Option<f64>,

    /// Origin override
    pub x0: Option<[f64; 3]>,
}

impl Default for TensorMeshSpec {
    fn default() -> Self {
        Self {
            csx: 25.0,
            csy: 25.0,
            csz: 25.0,
            pfx: 1.5,
            pfy: 1.5,
            pfz: 1.5,
            nch: 10,
            nca: 5,
            ncb: 5,
            npadx: 10,
            npady: 10,
            npadz: 10,
            domain_x: None,
            domain_y: 1000.0,
            domain_z: None,
            x0: None,
        }
    }
}

impl TensorMeshSpec {
    /// Core extent in x
    #[must_use]
    pub fn domain_x(&self, cp: &CasingParameters) -> f64 {
        self.domain_x
            .unwrap_or_else(|| (cp.src_a.x - cp.src_b.x).abs())
    }

    /// Core extent in z
    #[must_use]
    pub fn domain_z(&self, cp: &CasingParameters) -> f64 {
        self.domain_z.unwrap_or(cp.casing_l)
    }

    /// Core cells in x
    #[must_use]
    pub fn ncx(&self, cp: &CasingParameters) -> usize {
        cells_to_cover(self.domain_x(cp), self.csx) + 2 * self.nch
    }

    /// Core cells in y
    #[must_use]
    pub fn ncy(&self) -> usize {
        cells_to_cover(self.domain_y, self.csy) + 2 * self.nch
    }

    /// Core cells in z
    #[must_use]
    pub fn ncz(&self, cp: &CasingParameters) -> usize {
        cells_to_cover(self.domain_z(cp), self.csz) + self.nca + self.ncb
    }

    /// Check cell sizes and padding factors
    ///
    /// # Errors
    /// Returns the first parameter found out of range
    pub fn validate(&self) -> Result<(), MeshError> {
        require_positive("csx", self.csx)?;
        require_positive("csy", self.csy)?;
        require_positive("csz", self.csz)?;
        require_growth("pfx", self.pfx)?;
        require_growth("pfy", self.pfy)?;
        require_growth("pfz", self.pfz)?;
        require_positive("domain_y", self.domain_y)?;
        if let Some(dx) = self.domain_x {
            require_positive("domain_x", dx)?;
        }
        if let Some(dz) = self.domain_z {
            require_positive("domain_z", dz)?;
        }
        Ok(())
    }

    /// Cell widths `[hx, hy, hz]`
    ///
    /// # Errors
    /// Returns error if the parameters are out of range
    pub fn widths(&self, cp: &CasingParameters) -> Result<[Vec<f64>; 3], MeshError> {
        self.validate()?;
        Ok([
            padded_core(self.csx, self.ncx(cp), self.npadx, self.pfx)?,
            padded_core(self.csy, self.ncy(), self.npady, self.pfy)?,
            padded_core(self.csz, self.ncz(cp), self.npadz, self.pfz)?,
        ])
    }

    /// Origin for the given widths, unless overridden by `x0`
    #[must_use]
    pub fn origin(&self, cp: &CasingParameters, h: &[Vec<f64>; 3]) -> [f64; 3] {
        if let Some(x0) = self.x0 {
            return x0;
        }
        let offset = |widths: &[f64], n: usize| -> f64 { -widths[..n.min(widths.len())].iter().sum::<f64>() };
        [
            offset(&h[0], self.npadx + self.ncx(cp) - self.nch),
            offset(&h[1], self.npady + self.ncy() - self.nch),
            offset(&h[2], self.npadz + self.ncz(cp) - self.nca),
        ]
    }

    /// Build the mesh
    ///
    /// # Errors
    /// Returns error if the parameters are out of range or produce an empty axis
    pub fn build(&self, cp: &CasingParameters) -> Result<Mesh, MeshError> {
        let h = self.widths(cp)?;
        let origin = self.origin(cp, &h);
        Mesh::new(MeshKind::Tensor, h, origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_counts() {
        let cp = CasingParameters::default();
        let spec = TensorMeshSpec::default();
        // 1000 m separation at 25 m
        assert_eq!(spec.ncx(&cp), 40 + 20);
        assert_eq!(spec.ncy(), 40 + 20);
        assert_eq!(spec.ncz(&cp), 40 + 10);

        let mesh = spec.build(&cp).unwrap();
        assert_eq!(mesh.shape(), [80, 80, 70]);
    }

    #[test]
    fn test_origin_places_core_offsets() {
        let cp = CasingParameters::default();
        let spec = TensorMeshSpec::default();
        let mesh = spec.build(&cp).unwrap();

        // x = 0 lies nch core cells before the end of the core
        let x_nodes = mesh.nodes(0);
        let zero = x_nodes
            .iter()
            .position(|x| x.abs() < 1e-6)
            .expect("x = 0 must be a node");
        assert_eq!(zero, spec.npadx + spec.ncx(&cp) - spec.nch);
        let core_end = x_nodes[spec.npadx + spec.ncx(&cp)];
        assert_relative_eq!(core_end, spec.nch as f64 * spec.csx, epsilon = 1e-6);
        let core_start = x_nodes[spec.npadx];
        assert!(core_start < -(spec.nch as f64) * spec.csx);

        // top of mesh core is nca cells above z = 0
        let z_nodes = mesh.nodes(2);
        let top_of_core = z_nodes[spec.npadz + spec.ncz(&cp)];
        assert_relative_eq!(top_of_core, spec.nca as f64 * spec.csz, epsilon = 1e-6);
    }

    #[test]
    fn test_domain_defaults_follow_casing() {
        let cp = CasingParameters {
            src_a: crate::core_types::Vec3::new(200.0, 0.0, 0.0),
            src_b: crate::core_types::Vec3::new(-300.0, 0.0, 0.0),
            casing_l: 250.0,
            ..Default::default()
        };
        let spec = TensorMeshSpec::default();
        assert_eq!(spec.domain_x(&cp), 500.0);
        assert_eq!(spec.domain_z(&cp), 250.0);
    }

    #[test]
    fn test_x0_override() {
        let cp = CasingParameters::default();
        let spec = TensorMeshSpec {
            x0: Some([1.0, 2.0, 3.0]),
            ..Default::default()
        };
        assert_eq!(spec.build(&cp).unwrap().origin(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_shrinking_padding_rejected() {
        let cp = CasingParameters::default();
        let spec = TensorMeshSpec {
            pfz: 0.8,
            ..Default::default()
        };
        assert!(matches!(
            spec.build(&cp),
            Err(MeshError::InvalidParameter { name: "pfz", .. })
        ));
    }
}
