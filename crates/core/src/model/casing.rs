//! Casing geometry and material model
//!
//! `CasingParameters` describes a steel casing (a thin conducting cylindrical
//! shell centred on the z-axis) embedded in a background model, together with
//! the default electrode positions and the frequencies / time steps used by
//! the EM forward problems.

use crate::core_types::{Vec3, MU_0};
use crate::io::ParameterFile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by invalid model parameters
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// A parameter is out of its valid range
    #[error("invalid model parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in the JSON file
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// A model vector does not match the number of mesh cells
    #[error("model vector has {actual} entries, expected {expected}")]
    ModelLength {
        /// `2 * n_cells`
        expected: usize,
        /// Length supplied
        actual: usize,
    },
}

/// Background the casing is embedded in
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Background {
    /// Uniform `sigma_back` everywhere
    #[default]
    Wholespace,
    /// `sigma_back` below z = 0, `sigma_air` above
    Halfspace,
    /// Half-space with one layer of `sigma_layer` between `layer_z[0]` and `layer_z[1]`
    SingleLayer {
        /// Bottom and top of the layer (m)
        layer_z: [f64; 2],
        /// Layer conductivity (S/m)
        sigma_layer: f64,
    },
}

/// Geometric and material description of a cased well
///
/// Immutable once constructed; the mesh generator, the physical properties
/// and the simulation all hold it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CasingParameters {
    /// File name used by `save`
    pub filename: String,

    /// Depth of the top of the casing (m)
    pub casing_top: f64,
    /// Length of the casing (m)
    pub casing_l: f64,
    /// Diameter of the casing, measured to the centre of the wall (m)
    pub casing_d: f64,
    /// Wall thickness (m)
    pub casing_t: f64,

    /// Background conductivity (S/m)
    pub sigma_back: f64,
    /// Casing conductivity (S/m)
    pub sigma_casing: f64,
    /// Conductivity of the fluid inside the casing (S/m)
    pub sigma_inside: f64,
    /// Air conductivity for half-space backgrounds (S/m)
    pub sigma_air: f64,

    /// Background relative permeability
    pub mur_back: f64,
    /// Casing relative permeability
    pub mur_casing: f64,

    /// Positive current electrode
    pub src_a: Vec3,
    /// Return electrode
    pub src_b: Vec3,

    /// FDEM frequencies (Hz)
    pub freqs: Vec<f64>,
    /// TDEM time stepping as `(dt, count)` blocks
    pub time_steps: Vec<(f64, usize)>,

    /// Background model
    pub background: Background,
}

impl Default for CasingParameters {
    fn default() -> Self {
        Self {
            filename: "ModelParameters.json".to_string(),
            casing_top: 0.0,
            casing_l: 1000.0,
            casing_d: 10e-2,
            casing_t: 1e-2,
            sigma_back: 0.1,
            sigma_casing: 5.5e6,
            sigma_inside: 1.0,
            sigma_air: 1e-8,
            mur_back: 1.0,
            mur_casing: 1.0,
            src_a: Vec3::new(0.0, 0.0, -975.0),
            src_b: Vec3::new(1e3, 0.0, -975.0),
            freqs: vec![0.5, 1.0, 2.0],
            time_steps: vec![
                (1e-6, 20),
                (1e-5, 30),
                (3e-5, 30),
                (1e-4, 40),
                (3e-4, 30),
                (1e-3, 20),
                (1e-2, 15),
            ],
            background: Background::Wholespace,
        }
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ModelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidParameter {
            name,
            reason: format!("must be finite and positive, got {value}"),
        })
    }
}

impl CasingParameters {
    /// Inner radius of the casing wall (m)
    #[must_use]
    pub fn casing_a(&self) -> f64 {
        self.casing_d / 2.0 - self.casing_t / 2.0
    }

    /// Outer radius of the casing wall (m)
    #[must_use]
    pub fn casing_b(&self) -> f64 {
        self.casing_d / 2.0 + self.casing_t / 2.0
    }

    /// Vertical extent `[bottom, top]` of the casing (m)
    #[must_use]
    pub fn casing_z(&self) -> [f64; 2] {
        [self.casing_top - self.casing_l, self.casing_top]
    }

    /// Casing permeability (H/m)
    #[must_use]
    pub fn mu_casing(&self) -> f64 {
        self.mur_casing * MU_0
    }

    /// Background permeability (H/m)
    #[must_use]
    pub fn mu_back(&self) -> f64 {
        self.mur_back * MU_0
    }

    /// Total number of TDEM time steps
    #[must_use]
    pub fn n_time_steps(&self) -> usize {
        self.time_steps.iter().map(|&(_, n)| n).sum()
    }

    /// Step lengths in order, one per TDEM step
    #[must_use]
    pub fn step_lengths(&self) -> Vec<f64> {
        self.time_steps
            .iter()
            .flat_map(|&(dt, n)| std::iter::repeat(dt).take(n))
            .collect()
    }

    /// Time grid of the TDEM simulation, starting at t = 0
    #[must_use]
    pub fn times(&self) -> Vec<f64> {
        let mut times = Vec::with_capacity(self.n_time_steps() + 1);
        let mut t = 0.0;
        times.push(t);
        for dt in self.step_lengths() {
            t += dt;
            times.push(t);
        }
        times
    }

    /// Check geometry and material parameters
    ///
    /// # Errors
    /// Returns the first parameter found out of range
    pub fn validate(&self) -> Result<(), ModelError> {
        require_positive("casing_l", self.casing_l)?;
        require_positive("casing_d", self.casing_d)?;
        require_positive("casing_t", self.casing_t)?;
        if !self.casing_top.is_finite() {
            return Err(ModelError::InvalidParameter {
                name: "casing_top",
                reason: format!("must be finite, got {}", self.casing_top),
            });
        }
        if self.casing_a() <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "casing_t",
                reason: format!(
                    "wall thickness {} leaves no inner radius for diameter {}",
                    self.casing_t, self.casing_d
                ),
            });
        }

        require_positive("sigma_back", self.sigma_back)?;
        require_positive("sigma_casing", self.sigma_casing)?;
        require_positive("sigma_inside", self.sigma_inside)?;
        require_positive("sigma_air", self.sigma_air)?;
        require_positive("mur_back", self.mur_back)?;
        require_positive("mur_casing", self.mur_casing)?;

        if let Background::SingleLayer {
            layer_z,
            sigma_layer,
        } = &self.background
        {
            require_positive("sigma_layer", *sigma_layer)?;
            if !(layer_z[0] < layer_z[1]) {
                return Err(ModelError::InvalidParameter {
                    name: "layer_z",
                    reason: format!("bottom {} must lie below top {}", layer_z[0], layer_z[1]),
                });
            }
        }

        for (name, p) in [("src_a", &self.src_a), ("src_b", &self.src_b)] {
            if !p.iter().all(|v| v.is_finite()) {
                return Err(ModelError::InvalidParameter {
                    name,
                    reason: format!("must be finite, got {p:?}"),
                });
            }
        }

        Ok(())
    }

    /// Check the FDEM frequency list
    ///
    /// # Errors
    /// Returns error if the list is empty or holds a non-positive frequency
    pub fn validate_frequencies(&self) -> Result<(), ModelError> {
        if self.freqs.is_empty() {
            return Err(ModelError::InvalidParameter {
                name: "freqs",
                reason: "at least one frequency is required".into(),
            });
        }
        self.freqs
            .iter()
            .try_for_each(|&f| require_positive("freqs", f))
    }

    /// Check the TDEM time stepping
    ///
    /// # Errors
    /// Returns error if there are no steps or a step length is non-positive
    pub fn validate_time_steps(&self) -> Result<(), ModelError> {
        if self.n_time_steps() == 0 {
            return Err(ModelError::InvalidParameter {
                name: "time_steps",
                reason: "at least one time step is required".into(),
            });
        }
        self.time_steps
            .iter()
            .try_for_each(|&(dt, _)| require_positive("time_steps", dt))
    }
}

impl ParameterFile for CasingParameters {
    fn filename(&self) -> &str {
        &self.filename
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_derived_geometry() {
        let cp = CasingParameters::default();
        assert_relative_eq!(cp.casing_a(), 0.045, epsilon = 1e-12);
        assert_relative_eq!(cp.casing_b(), 0.055, epsilon = 1e-12);
        assert_eq!(cp.casing_z(), [-1000.0, 0.0]);
        assert_relative_eq!(cp.mu_casing(), MU_0);
    }

    #[test]
    fn test_time_grid() {
        let cp = CasingParameters {
            time_steps: vec![(1e-3, 2), (1e-2, 1)],
            ..Default::default()
        };
        let times = cp.times();
        assert_eq!(times.len(), 4);
        assert_relative_eq!(times[3], 0.012, epsilon = 1e-15);
        assert_eq!(cp.step_lengths(), vec![1e-3, 1e-3, 1e-2]);
    }

    #[test]
    fn test_validate_rejects_thick_wall() {
        let cp = CasingParameters {
            casing_d: 0.02,
            casing_t: 0.03,
            ..Default::default()
        };
        let err = cp.validate().unwrap_err();
        assert!(matches!(err, ModelError::InvalidParameter { name: "casing_t", .. }));
    }

    #[test]
    fn test_validate_rejects_negative_conductivity() {
        let cp = CasingParameters {
            sigma_back: -1.0,
            ..Default::default()
        };
        assert!(cp.validate().is_err());
        assert!(CasingParameters::default().validate().is_ok());
    }

    #[test]
    fn test_frequency_and_step_checks() {
        let cp = CasingParameters {
            freqs: vec![],
            time_steps: vec![(1e-3, 0)],
            ..Default::default()
        };
        assert!(cp.validate_frequencies().is_err());
        assert!(cp.validate_time_steps().is_err());
    }

    #[test]
    fn test_wrong_length_electrode_fails_to_parse() {
        let json = r#"{"src_a": [0.0, 0.0]}"#;
        assert!(serde_json::from_str::<CasingParameters>(json).is_err());

        let json = r#"{"src_a": [1.0, 2.0, 3.0]}"#;
        let cp: CasingParameters = serde_json::from_str(json).unwrap();
        assert_eq!(cp.src_a, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(cp.casing_l, 1000.0);
    }
}
