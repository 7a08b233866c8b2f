//! JSON parameter files
//!
//! Every configuration component (casing model, mesh generator, source,
//! simulation) is persisted as a JSON document holding exactly its declared
//! fields, and re-loaded into the same type. Unknown fields are rejected by the
//! component types themselves (`deny_unknown_fields`).

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// A configuration component that knows its own file name.
///
/// `save` writes `directory/filename` (creating the directory when it does not
/// exist yet) and `load` reads it back.
pub trait ParameterFile: Serialize + DeserializeOwned {
    /// File name used when saving into a directory
    fn filename(&self) -> &str;

    /// Save to `directory/filename`
    ///
    /// # Errors
    /// Returns error if the directory cannot be created, or the component
    /// cannot be serialized or written
    fn save<P: AsRef<Path>>(&self, directory: P) -> Result<PathBuf, PersistenceError> {
        let path = directory.as_ref().join(self.filename());
        save_json(self, &path)?;
        Ok(path)
    }

    /// Load from a JSON file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        load_json(path)
    }
}

/// Serialize `value` as pretty JSON into `path`, creating parent directories
///
/// # Errors
/// Returns error if the value cannot be serialized or the file cannot be written
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PersistenceError::SaveFailed {
            path: parent.to_path_buf(),
            message: e.to_string(),
        })?;
    }

    let contents =
        serde_json::to_string_pretty(value).map_err(|e| PersistenceError::SerializeFailed(e.to_string()))?;

    fs::write(path, contents).map_err(|e| PersistenceError::SaveFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    debug!("Saved {}", path.display());
    Ok(())
}

/// Read and parse a JSON file
///
/// # Errors
/// Returns error if file cannot be read or parsed
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, PersistenceError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| PersistenceError::LoadFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    serde_json::from_str(&contents).map_err(|e| PersistenceError::ParseFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Errors that can occur with persistence operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Failed to read file
    #[error("Failed to load {}: {message}", path.display())]
    LoadFailed {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        message: String,
    },
    /// Failed to parse file contents
    #[error("Failed to parse {}: {message}", path.display())]
    ParseFailed {
        /// File that could not be parsed
        path: PathBuf,
        /// Parser message (includes line/column)
        message: String,
    },
    /// Failed to serialize a component
    #[error("Failed to serialize: {0}")]
    SerializeFailed(String),
    /// Failed to write file or create its directory
    #[error("Failed to save {}: {message}", path.display())]
    SaveFailed {
        /// File or directory that could not be written
        path: PathBuf,
        /// Underlying I/O error
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Sample {
        filename: String,
        value: f64,
    }

    impl ParameterFile for Sample {
        fn filename(&self) -> &str {
            &self.filename
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("casing-sim-json-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_save_creates_directory_and_loads_back() {
        let dir = scratch_dir("nested").join("a").join("b");
        let sample = Sample {
            filename: "sample.json".into(),
            value: 0.1 + 0.2,
        };

        let path = sample.save(&dir).unwrap();
        assert_eq!(path, dir.join("sample.json"));

        let loaded = Sample::load(&path).unwrap();
        assert_eq!(loaded, sample);

        let _ = fs::remove_dir_all(scratch_dir("nested"));
    }

    #[test]
    fn test_unknown_field_fails_at_load() {
        let dir = scratch_dir("unknown");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        fs::write(&path, r#"{"filename": "bad.json", "value": 1.0, "extra": 3}"#).unwrap();

        let err = Sample::load(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::ParseFailed { .. }));
        assert!(err.to_string().contains("extra"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file() {
        let err = load_json::<Sample, _>("/nonexistent/casing-sim/sample.json").unwrap_err();
        assert!(matches!(err, PersistenceError::LoadFailed { .. }));
    }

    #[test]
    fn test_error_messages_name_the_file() {
        let err: Box<dyn std::error::Error> = Box::new(PersistenceError::SaveFailed {
            path: PathBuf::from("/tmp/out/ModelParameters.json"),
            message: "read-only".into(),
        });
        assert_eq!(
            err.to_string(),
            "Failed to save /tmp/out/ModelParameters.json: read-only"
        );
        assert_eq!(
            PersistenceError::SerializeFailed("NaN".into()).to_string(),
            "Failed to serialize: NaN"
        );
    }
}
