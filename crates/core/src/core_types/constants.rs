//! Physical constants used by the forward problems.

use std::f64::consts::PI;

/// Permeability of free space (H/m)
pub const MU_0: f64 = 4.0e-7 * PI;

/// Full turn in radians, the total angular extent of a cylindrical mesh
pub const FULL_TURN: f64 = 2.0 * PI;
