//! Casing model and the physical properties it induces on a mesh

pub mod casing;
pub mod physprops;

pub use casing::{Background, CasingParameters, ModelError};
pub use physprops::{CellRegion, PhysicalProperties};
