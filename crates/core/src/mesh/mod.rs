//! Mesh generation
//!
//! Structured tensor and cylindrical meshes sized from a casing model. Cell
//! widths follow a geometric padding law: a uniform core at the base cell size,
//! flanked by cells growing by a constant factor towards the domain boundary.
//!
//! # Module Organization
//!
//! - `tensor_spec` - width sequences from `(size, count, factor)` blocks
//! - `grid` - the `Mesh` descriptor (widths + origin) and geometric queries
//! - `tensor` / `cyl` - generator parameters for the two mesh kinds
//! - `generator` - `MeshGenerator`, the memoizing, serializable front end
//! - `operators` - finite-volume topology and operators on a mesh

pub mod cyl;
pub mod generator;
pub mod grid;
pub mod operators;
pub mod tensor;
pub mod tensor_spec;

pub use cyl::CylMeshSpec;
pub use generator::{MeshGenerator, MeshSpec};
pub use grid::{Mesh, MeshKind};
pub use tensor::TensorMeshSpec;
pub use tensor_spec::{mesh_tensor, TensorBlock};

use thiserror::Error;

/// Errors raised while building or configuring a mesh
#[derive(Debug, Error, PartialEq)]
pub enum MeshError {
    /// Origin override with the wrong number of components
    #[error("mesh origin must have exactly 3 components, got {len}")]
    InvalidOrigin {
        /// Number of components supplied
        len: usize,
    },
    /// A generator parameter is out of range
    #[error("invalid mesh parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// A width sequence violates the mesh invariants
    #[error("invalid cell widths on axis {axis}: {reason}")]
    InvalidWidths {
        /// Axis index (0 = x/r, 1 = y/θ, 2 = z)
        axis: usize,
        /// What is wrong with it
        reason: String,
    },
    /// Operation not available for this mesh kind
    #[error("unsupported for {kind:?} meshes: {operation}")]
    Unsupported {
        /// Mesh kind the operation was attempted on
        kind: MeshKind,
        /// Operation name
        operation: &'static str,
    },
}

/// Number of whole cells needed to cover `extent` at `cell_size`
pub(crate) fn cells_to_cover(extent: f64, cell_size: f64) -> usize {
    let n = (extent / cell_size).ceil();
    if n.is_finite() && n > 0.0 {
        n as usize
    } else {
        0
    }
}

pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<(), MeshError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MeshError::InvalidParameter {
            name,
            reason: format!("must be finite and positive, got {value}"),
        })
    }
}

pub(crate) fn require_growth(name: &'static str, value: f64) -> Result<(), MeshError> {
    if value.is_finite() && value >= 1.0 {
        Ok(())
    } else {
        Err(MeshError::InvalidParameter {
            name,
            reason: format!("padding factor must be >= 1, got {value}"),
        })
    }
}
