//! Vector type alias for 3D positions.

use nalgebra::Vector3;

/// 3D vector type for electrode positions and cell locations.
///
/// This is a simple alias for `nalgebra::Vector3<f64>`. With the
/// `serde-serialize` feature it round-trips through JSON as a three element
/// array, so a wrong-length vector fails at load time.
pub type Vec3 = Vector3<f64>;
