//! Run script
//!
//! A saved simulation directory carries a `simulation.sh` that re-runs it with
//! the `casing-sim` binary from the three parameter files next to it.

use super::json::PersistenceError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the generated script
pub const SCRIPT_NAME: &str = "simulation.sh";

/// What the script runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunScript {
    /// Physics name, e.g. `"FDEM"`
    pub physics: String,
    /// Reported field, e.g. `"h"`
    pub formulation: String,
    /// Casing parameter file, relative to the script
    pub casing: String,
    /// Mesh parameter file, relative to the script
    pub mesh: String,
    /// Source parameter file, relative to the script
    pub source: String,
}

impl RunScript {
    /// Script text
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "#!/bin/sh\n\
             # generated by casing-sim {version}\n\
             set -e\n\
             cd \"$(dirname \"$0\")\"\n\
             exec casing-sim run \\\n    \
             --physics {physics} \\\n    \
             --formulation {formulation} \\\n    \
             --casing {casing} \\\n    \
             --mesh {mesh} \\\n    \
             --source {source} \\\n    \
             --directory . \"$@\"\n",
            version = env!("CARGO_PKG_VERSION"),
            physics = self.physics,
            formulation = self.formulation,
            casing = self.casing,
            mesh = self.mesh,
            source = self.source,
        )
    }
}

/// Write `simulation.sh` into `directory` and mark it executable
///
/// # Errors
/// Returns error if the script cannot be written
pub fn write_run_script(directory: &Path, script: &RunScript) -> Result<PathBuf, PersistenceError> {
    let path = directory.join(SCRIPT_NAME);
    let save_failed = |e: std::io::Error| PersistenceError::SaveFailed {
        path: path.clone(),
        message: e.to_string(),
    };

    fs::create_dir_all(directory).map_err(save_failed)?;
    fs::write(&path, script.render()).map_err(save_failed)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).map_err(save_failed)?;
    }

    info!("Wrote {}", path.display());
    Ok(path)
}
