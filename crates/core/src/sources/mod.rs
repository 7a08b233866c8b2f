//! Source configuration
//!
//! A `SourceParameters` file describes how current is injected: where the two
//! electrodes sit, how much current flows, and (for transient runs) whether
//! the source is switched on or off at t = 0. Electrode positions may be taken
//! from the casing model or given explicitly.

use crate::core_types::Vec3;
use crate::io::ParameterFile;
use crate::model::CasingParameters;
use crate::physics::PhysicsKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by invalid source parameters
#[derive(Debug, Error, PartialEq)]
pub enum SourceError {
    /// A parameter is out of its valid range
    #[error("invalid source parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// The source was configured for different physics than the simulation
    #[error("source is configured for {configured} but the simulation runs {requested}")]
    PhysicsMismatch {
        /// Physics stored on the source
        configured: PhysicsKind,
        /// Physics of the simulation using it
        requested: PhysicsKind,
    },
}

/// Electrode layout
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SourceKind {
    /// `src_a` / `src_b` of the casing model
    #[default]
    CasingElectrodes,
    /// Explicit electrode positions
    Dipole {
        /// Positive electrode
        src_a: Vec3,
        /// Return electrode
        src_b: Vec3,
    },
    /// Positive electrode on the axis at the top of the casing
    TopCasing,
    /// Positive electrode on the axis at the bottom of the casing
    DownHole,
}

/// Transient source waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    /// Steady current switched off at t = 0
    #[default]
    StepOff,
    /// Current switched on at t = 0
    StepOn,
}

/// Source parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceParameters {
    /// File name used by `save`
    pub filename: String,
    /// Electrode layout
    pub kind: SourceKind,
    /// Source current (A)
    pub current: f64,
    /// Waveform used by transient runs
    pub waveform: Waveform,
    /// Physics the source is meant for; filled in by the simulation when unset
    pub physics: Option<PhysicsKind>,
}

impl Default for SourceParameters {
    fn default() -> Self {
        Self {
            filename: "SourceParameters.json".to_string(),
            kind: SourceKind::CasingElectrodes,
            current: 1.0,
            waveform: Waveform::StepOff,
            physics: None,
        }
    }
}

impl SourceParameters {
    /// Dipole between two explicit electrodes
    #[must_use]
    pub fn dipole(src_a: Vec3, src_b: Vec3) -> Self {
        Self {
            kind: SourceKind::Dipole { src_a, src_b },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_physics(mut self, physics: PhysicsKind) -> Self {
        self.physics = Some(physics);
        self
    }

    /// `(A, B)` electrode positions for a casing model
    #[must_use]
    pub fn electrodes(&self, cp: &CasingParameters) -> (Vec3, Vec3) {
        match &self.kind {
            SourceKind::CasingElectrodes => (cp.src_a, cp.src_b),
            SourceKind::Dipole { src_a, src_b } => (*src_a, *src_b),
            SourceKind::TopCasing => (Vec3::new(0.0, 0.0, cp.casing_top), cp.src_b),
            SourceKind::DownHole => (Vec3::new(0.0, 0.0, cp.casing_z()[0]), cp.src_b),
        }
    }

    /// Set `physics` when unset, otherwise check it matches
    ///
    /// # Errors
    /// Returns `SourceError::PhysicsMismatch` if the source names other physics
    pub fn attach(&mut self, physics: PhysicsKind) -> Result<(), SourceError> {
        match self.physics {
            None => {
                self.physics = Some(physics);
                Ok(())
            }
            Some(configured) if configured == physics => Ok(()),
            Some(configured) => Err(SourceError::PhysicsMismatch {
                configured,
                requested: physics,
            }),
        }
    }

    /// Check the current and explicit electrode positions
    ///
    /// # Errors
    /// Returns error for a zero or non-finite current, coincident electrodes
    /// or non-finite positions
    pub fn validate(&self, cp: &CasingParameters) -> Result<(), SourceError> {
        if !self.current.is_finite() || self.current == 0.0 {
            return Err(SourceError::InvalidParameter {
                name: "current",
                reason: format!("must be finite and non-zero, got {}", self.current),
            });
        }

        let (a, b) = self.electrodes(cp);
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err(SourceError::InvalidParameter {
                name: "electrodes",
                reason: "positions must be finite".into(),
            });
        }
        if a == b {
            return Err(SourceError::InvalidParameter {
                name: "electrodes",
                reason: format!("A and B coincide at {:?}", [a.x, a.y, a.z]),
            });
        }
        Ok(())
    }
}

impl ParameterFile for SourceParameters {
    fn filename(&self) -> &str {
        &self.filename
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_electrode_layouts() {
        let cp = CasingParameters::default();

        let (a, b) = SourceParameters::default().electrodes(&cp);
        assert_eq!(a, cp.src_a);
        assert_eq!(b, cp.src_b);

        let top = SourceParameters {
            kind: SourceKind::TopCasing,
            ..Default::default()
        };
        assert_eq!(top.electrodes(&cp).0, Vec3::new(0.0, 0.0, 0.0));

        let down = SourceParameters {
            kind: SourceKind::DownHole,
            ..Default::default()
        };
        assert_eq!(down.electrodes(&cp).0, Vec3::new(0.0, 0.0, -1000.0));
    }

    #[test]
    fn test_attach_fills_and_checks_physics() {
        let mut src = SourceParameters::default();
        src.attach(PhysicsKind::Fdem).unwrap();
        assert_eq!(src.physics, Some(PhysicsKind::Fdem));
        src.attach(PhysicsKind::Fdem).unwrap();

        assert_eq!(
            src.attach(PhysicsKind::Tdem),
            Err(SourceError::PhysicsMismatch {
                configured: PhysicsKind::Fdem,
                requested: PhysicsKind::Tdem,
            })
        );
    }

    #[test]
    fn test_validate() {
        let cp = CasingParameters::default();
        assert!(SourceParameters::default().validate(&cp).is_ok());

        let zero = SourceParameters {
            current: 0.0,
            ..Default::default()
        };
        assert!(zero.validate(&cp).is_err());

        let p = Vec3::new(1.0, 2.0, 3.0);
        assert!(SourceParameters::dipole(p, p).validate(&cp).is_err());
    }

    #[test]
    fn test_json_layout() {
        let src = SourceParameters::dipole(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0))
            .with_physics(PhysicsKind::Dc);
        let json = serde_json::to_string(&src).unwrap();
        assert!(json.contains(r#""type":"dipole""#));
        assert!(json.contains(r#""physics":"DC""#));

        let back: SourceParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, src);
    }
}
