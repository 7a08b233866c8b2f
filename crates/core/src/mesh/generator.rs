//! Memoizing mesh generator
//!
//! `MeshGenerator` pairs a shared casing model with the parameters of one of
//! the two mesh kinds. The mesh is built on first access and cached; every
//! mutable access to the parameters or the casing clears the cache, so a
//! cached mesh always reflects the current inputs.

use super::{CylMeshSpec, Mesh, MeshError, MeshKind, TensorMeshSpec};
use crate::io::ParameterFile;
use crate::model::CasingParameters;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Parameters of one of the supported mesh kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshSpec {
    /// Cartesian mesh
    Tensor(TensorMeshSpec),
    /// Cylindrical mesh
    Cylindrical(CylMeshSpec),
}

impl MeshSpec {
    /// Mesh kind produced by this spec
    #[must_use]
    pub fn kind(&self) -> MeshKind {
        match self {
            MeshSpec::Tensor(_) => MeshKind::Tensor,
            MeshSpec::Cylindrical(_) => MeshKind::Cylindrical,
        }
    }

    /// Build the mesh for a casing model
    ///
    /// # Errors
    /// Returns error if the parameters are out of range
    pub fn build(&self, cp: &CasingParameters) -> Result<Mesh, MeshError> {
        match self {
            MeshSpec::Tensor(spec) => spec.build(cp),
            MeshSpec::Cylindrical(spec) => spec.build(cp),
        }
    }

    fn x0_mut(&mut self) -> &mut Option<[f64; 3]> {
        match self {
            MeshSpec::Tensor(spec) => &mut spec.x0,
            MeshSpec::Cylindrical(spec) => &mut spec.x0,
        }
    }
}

const DEFAULT_FILENAME: &str = "MeshParameters.json";

fn default_filename() -> String {
    DEFAULT_FILENAME.to_string()
}

/// On-disk form: `{filename, cp, mesh}`
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MeshGeneratorFile {
    #[serde(default = "default_filename")]
    filename: String,
    cp: CasingParameters,
    mesh: MeshSpec,
}

/// Builds and caches the mesh for a casing model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "MeshGeneratorFile", into = "MeshGeneratorFile")]
pub struct MeshGenerator {
    filename: String,
    casing: Arc<CasingParameters>,
    spec: MeshSpec,
    mesh: OnceLock<Arc<Mesh>>,
}

impl From<MeshGeneratorFile> for MeshGenerator {
    fn from(file: MeshGeneratorFile) -> Self {
        Self {
            filename: file.filename,
            casing: Arc::new(file.cp),
            spec: file.mesh,
            mesh: OnceLock::new(),
        }
    }
}

impl From<MeshGenerator> for MeshGeneratorFile {
    fn from(generator: MeshGenerator) -> Self {
        Self {
            filename: generator.filename,
            cp: Arc::unwrap_or_clone(generator.casing),
            mesh: generator.spec,
        }
    }
}

impl PartialEq for MeshGenerator {
    fn eq(&self, other: &Self) -> bool {
        self.filename == other.filename && self.casing == other.casing && self.spec == other.spec
    }
}

impl MeshGenerator {
    /// Create a generator for `spec` around `casing`
    #[must_use]
    pub fn new(casing: Arc<CasingParameters>, spec: MeshSpec) -> Self {
        Self {
            filename: default_filename(),
            casing,
            spec,
            mesh: OnceLock::new(),
        }
    }

    /// Tensor mesh generator
    #[must_use]
    pub fn tensor(casing: Arc<CasingParameters>, spec: TensorMeshSpec) -> Self {
        Self::new(casing, MeshSpec::Tensor(spec))
    }

    /// Cylindrical mesh generator
    #[must_use]
    pub fn cylindrical(casing: Arc<CasingParameters>, spec: CylMeshSpec) -> Self {
        Self::new(casing, MeshSpec::Cylindrical(spec))
    }

    /// Use a different file name for `save`
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Mesh kind
    #[must_use]
    pub fn kind(&self) -> MeshKind {
        self.spec.kind()
    }

    /// Casing model the mesh is built around
    #[must_use]
    pub fn casing(&self) -> &Arc<CasingParameters> {
        &self.casing
    }

    /// Generator parameters
    #[must_use]
    pub fn spec(&self) -> &MeshSpec {
        &self.spec
    }

    /// Mutable generator parameters; clears the cached mesh
    pub fn spec_mut(&mut self) -> &mut MeshSpec {
        self.invalidate();
        &mut self.spec
    }

    /// Replace the casing model; clears the cached mesh when it changes
    pub fn set_casing(&mut self, casing: Arc<CasingParameters>) {
        if !Arc::ptr_eq(&self.casing, &casing) {
            self.casing = casing;
            self.invalidate();
        }
    }

    /// Override the mesh origin
    ///
    /// # Errors
    /// Returns `MeshError::InvalidOrigin` unless `x0` has exactly 3 components
    pub fn set_x0(&mut self, x0: &[f64]) -> Result<(), MeshError> {
        let x0: [f64; 3] = x0
            .try_into()
            .map_err(|_| MeshError::InvalidOrigin { len: x0.len() })?;
        *self.spec_mut().x0_mut() = Some(x0);
        Ok(())
    }

    /// Replace the angular widths of a cylindrical mesh
    ///
    /// Widths not summing to 2π are rescaled proportionally.
    ///
    /// # Errors
    /// Returns error on a tensor mesh or for empty / non-positive widths
    pub fn set_hy(&mut self, widths: &[f64]) -> Result<(), MeshError> {
        match self.spec_mut() {
            MeshSpec::Cylindrical(spec) => spec.set_hy(widths),
            MeshSpec::Tensor(_) => Err(MeshError::Unsupported {
                kind: MeshKind::Tensor,
                operation: "set_hy",
            }),
        }
    }

    /// True when the mesh has been built and not invalidated since
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.mesh.get().is_some()
    }

    /// Drop the cached mesh
    pub fn invalidate(&mut self) {
        if self.mesh.take().is_some() {
            debug!("Mesh cache invalidated");
        }
    }

    /// The mesh, built on first access and reused afterwards
    ///
    /// # Errors
    /// Returns error if the parameters are out of range
    pub fn mesh(&self) -> Result<Arc<Mesh>, MeshError> {
        if let Some(mesh) = self.mesh.get() {
            return Ok(Arc::clone(mesh));
        }

        let mesh = Arc::new(self.spec.build(&self.casing)?);
        let [nx, ny, nz] = mesh.shape();
        info!(
            "Built {:?} mesh: {} x {} x {} = {} cells, origin {:?}",
            mesh.kind(),
            nx,
            ny,
            nz,
            mesh.n_cells(),
            mesh.origin()
        );
        Ok(Arc::clone(self.mesh.get_or_init(|| mesh)))
    }
}

impl ParameterFile for MeshGenerator {
    fn filename(&self) -> &str {
        &self.filename
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_casing() -> Arc<CasingParameters> {
        Arc::new(CasingParameters {
            casing_l: 10.0,
            src_a: crate::core_types::Vec3::new(0.0, 0.0, 0.0),
            src_b: crate::core_types::Vec3::new(100.0, 0.0, 0.0),
            ..Default::default()
        })
    }

    #[test]
    fn test_mesh_is_memoized() {
        let generator = MeshGenerator::tensor(small_casing(), TensorMeshSpec::default());
        assert!(!generator.is_cached());
        let a = generator.mesh().unwrap();
        let b = generator.mesh().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(generator.is_cached());
    }

    #[test]
    fn test_mutation_invalidates_cache() {
        let mut generator = MeshGenerator::tensor(small_casing(), TensorMeshSpec::default());
        let before = generator.mesh().unwrap();

        if let MeshSpec::Tensor(spec) = generator.spec_mut() {
            spec.csx = 10.0;
        }
        assert!(!generator.is_cached());
        let after = generator.mesh().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(after.shape()[0] > before.shape()[0]);

        generator.set_casing(Arc::new(CasingParameters::default()));
        assert!(!generator.is_cached());
    }

    #[test]
    fn test_set_x0_requires_three_components() {
        let mut generator = MeshGenerator::cylindrical(small_casing(), CylMeshSpec::default());
        assert_eq!(
            generator.set_x0(&[0.0, 0.0]),
            Err(MeshError::InvalidOrigin { len: 2 })
        );
        generator.set_x0(&[0.0, 0.0, -5.0]).unwrap();
        assert_eq!(generator.mesh().unwrap().origin(), [0.0, 0.0, -5.0]);
    }

    #[test]
    fn test_set_hy_only_on_cylindrical() {
        let mut generator = MeshGenerator::tensor(small_casing(), TensorMeshSpec::default());
        assert!(matches!(
            generator.set_hy(&[1.0]),
            Err(MeshError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_json_layout() {
        let generator = MeshGenerator::cylindrical(small_casing(), CylMeshSpec::default());
        let value = serde_json::to_value(&generator).unwrap();
        assert_eq!(value["filename"], "MeshParameters.json");
        assert!(value["cp"].is_object());
        assert!(value["mesh"]["cylindrical"].is_object());

        let back: MeshGenerator = serde_json::from_value(value).unwrap();
        assert_eq!(back, generator);
    }
}
