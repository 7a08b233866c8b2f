//! Simulation run parameters and the saved-simulation file

use crate::io::ParameterFile;
use crate::mesh::MeshGenerator;
use crate::model::CasingParameters;
use crate::physics::Physics;
use crate::solver::SolverConfig;
use crate::sources::SourceParameters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How and where a simulation runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationParameters {
    /// Working directory for every file the simulation writes
    pub directory: PathBuf,
    /// File name of the saved simulation
    pub filename: String,
    /// File name of the field array; `fields.npy` (`fieldsDC.npy` for DC) when unset
    pub fields_filename: Option<String>,
    /// Threads in the solve pool
    pub num_threads: usize,
    /// Log property and solver detail at info level
    pub verbose: bool,
    /// Linear solver selection
    pub solver: SolverConfig,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            filename: "simulationParameters.json".to_string(),
            fields_filename: None,
            num_threads: 1,
            verbose: false,
            solver: SolverConfig::default(),
        }
    }
}

impl SimulationParameters {
    /// Defaults rooted at `directory`
    #[must_use]
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }
}

/// On-disk form of a whole simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationFile {
    /// Physics and formulation
    pub physics: Physics,
    /// Run parameters
    pub parameters: SimulationParameters,
    /// Casing model
    pub casing: CasingParameters,
    /// Mesh generator
    pub mesh: MeshGenerator,
    /// Source, if one is configured
    #[serde(default)]
    pub source: Option<SourceParameters>,
}

impl ParameterFile for SimulationFile {
    fn filename(&self) -> &str {
        &self.parameters.filename
    }
}
