//! Surveys: the source list a forward problem is solved for

use super::PhysicsKind;
use crate::core_types::Vec3;
use crate::model::CasingParameters;
use crate::sources::{SourceParameters, Waveform};

/// One source of a survey
#[derive(Debug, Clone, PartialEq)]
pub enum SurveySource {
    /// Harmonic source at one frequency
    Frequency {
        /// Frequency (Hz)
        frequency: f64,
        /// Positive electrode
        src_a: Vec3,
        /// Return electrode
        src_b: Vec3,
        /// Current amplitude (A)
        current: f64,
    },
    /// Transient source stepped at t = 0
    Transient {
        /// Positive electrode
        src_a: Vec3,
        /// Return electrode
        src_b: Vec3,
        /// Current (A)
        current: f64,
        /// Step on or step off
        waveform: Waveform,
        /// Lengths of the time steps (s)
        step_lengths: Vec<f64>,
    },
    /// Grounded DC dipole
    Dipole {
        /// Positive electrode
        src_a: Vec3,
        /// Return electrode
        src_b: Vec3,
        /// Current (A)
        current: f64,
    },
}

impl SurveySource {
    #[must_use]
    pub fn physics(&self) -> PhysicsKind {
        match self {
            SurveySource::Frequency { .. } => PhysicsKind::Fdem,
            SurveySource::Transient { .. } => PhysicsKind::Tdem,
            SurveySource::Dipole { .. } => PhysicsKind::Dc,
        }
    }

    /// `(A, B)` electrode positions
    #[must_use]
    pub fn electrodes(&self) -> (Vec3, Vec3) {
        match self {
            SurveySource::Frequency { src_a, src_b, .. }
            | SurveySource::Transient { src_a, src_b, .. }
            | SurveySource::Dipole { src_a, src_b, .. } => (*src_a, *src_b),
        }
    }

    #[must_use]
    pub fn current(&self) -> f64 {
        match self {
            SurveySource::Frequency { current, .. }
            | SurveySource::Transient { current, .. }
            | SurveySource::Dipole { current, .. } => *current,
        }
    }
}

/// Sources a forward problem is solved for
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Survey {
    sources: Vec<SurveySource>,
}

impl Survey {
    #[must_use]
    pub fn new(sources: Vec<SurveySource>) -> Self {
        Self { sources }
    }

    /// One harmonic source per casing-model frequency
    #[must_use]
    pub fn fdem(cp: &CasingParameters, src: &SourceParameters) -> Self {
        let (src_a, src_b) = src.electrodes(cp);
        let sources = cp
            .freqs
            .iter()
            .map(|&frequency| SurveySource::Frequency {
                frequency,
                src_a,
                src_b,
                current: src.current,
            })
            .collect();
        Self { sources }
    }

    /// A single transient source over the casing-model time steps
    #[must_use]
    pub fn tdem(cp: &CasingParameters, src: &SourceParameters) -> Self {
        let (src_a, src_b) = src.electrodes(cp);
        Self {
            sources: vec![SurveySource::Transient {
                src_a,
                src_b,
                current: src.current,
                waveform: src.waveform,
                step_lengths: cp.step_lengths(),
            }],
        }
    }

    /// A single DC dipole
    #[must_use]
    pub fn dc(src_a: Vec3, src_b: Vec3, current: f64) -> Self {
        Self {
            sources: vec![SurveySource::Dipole {
                src_a,
                src_b,
                current,
            }],
        }
    }

    /// Survey for a physics family
    #[must_use]
    pub fn for_physics(kind: PhysicsKind, cp: &CasingParameters, src: &SourceParameters) -> Self {
        match kind {
            PhysicsKind::Fdem => Self::fdem(cp, src),
            PhysicsKind::Tdem => Self::tdem(cp, src),
            PhysicsKind::Dc => {
                let (a, b) = src.electrodes(cp);
                Self::dc(a, b, src.current)
            }
        }
    }

    #[must_use]
    pub fn sources(&self) -> &[SurveySource] {
        &self.sources
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources of one physics family
    pub fn of_physics(&self, kind: PhysicsKind) -> impl Iterator<Item = &SurveySource> {
        self.sources.iter().filter(move |s| s.physics() == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fdem_has_one_source_per_frequency() {
        let cp = CasingParameters::default();
        let survey = Survey::fdem(&cp, &SourceParameters::default());
        assert_eq!(survey.len(), 3);
        let freqs: Vec<f64> = survey
            .sources()
            .iter()
            .map(|s| match s {
                SurveySource::Frequency { frequency, .. } => *frequency,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(freqs, cp.freqs);
    }

    #[test]
    fn test_tdem_and_dc() {
        let cp = CasingParameters::default();
        let src = SourceParameters::default();

        let tdem = Survey::for_physics(PhysicsKind::Tdem, &cp, &src);
        assert_eq!(tdem.len(), 1);
        assert_eq!(tdem.of_physics(PhysicsKind::Tdem).count(), 1);
        assert_eq!(tdem.of_physics(PhysicsKind::Fdem).count(), 0);

        let dc = Survey::for_physics(PhysicsKind::Dc, &cp, &src);
        assert_eq!(dc.sources()[0].electrodes(), (cp.src_a, cp.src_b));
        assert_eq!(dc.sources()[0].current(), 1.0);
    }
}
