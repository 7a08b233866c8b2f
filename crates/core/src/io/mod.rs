//! On-disk formats
//!
//! - `json` - parameter files for every configuration component
//! - `npy` - solved field arrays
//! - `script` - the shell script that re-runs a saved simulation

pub mod json;
pub mod npy;
pub mod script;

pub use json::{load_json, save_json, ParameterFile, PersistenceError};
pub use npy::{NpyArray, NpyData, NpyError};
pub use script::{write_run_script, RunScript};
