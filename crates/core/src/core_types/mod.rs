//! Core types and physical constants

pub mod constants;
pub mod vec3;

pub use constants::*;
pub use vec3::Vec3;
