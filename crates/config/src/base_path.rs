//! Installation base path (`ABSPATH`)
//!
//! The base path is defined at most once. Defining it again with the same
//! directory is a no-op; defining it with a different one is an error.

use crate::config::ConfigError;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Write-once absolute directory of the WordPress installation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasePath {
    cell: OnceLock<PathBuf>,
}

impl BasePath {
    pub fn new() -> Self {
        Self::default()
    }

    /// The defined path, if any
    pub fn get(&self) -> Option<&Path> {
        self.cell.get().map(PathBuf::as_path)
    }

    pub fn is_defined(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Define the base path if it is not defined yet
    ///
    /// # Errors
    /// * `InvalidFormat` if `path` is relative
    /// * `PathConflict` if a different path was already defined
    pub fn define(&self, path: &Path) -> Result<&Path, ConfigError> {
        if !path.is_absolute() {
            return Err(ConfigError::InvalidFormat {
                field: "base_path",
                reason: format!("'{}' is not an absolute path", path.display()),
            });
        }

        let existing = self.cell.get_or_init(|| path.to_path_buf());
        if existing != path {
            return Err(ConfigError::PathConflict {
                existing: existing.clone(),
                requested: path.to_path_buf(),
            });
        }

        Ok(existing.as_path())
    }

    /// Define the base path as the directory containing the configuration artifact
    ///
    /// `artifact_location` is the path of the artifact file itself.
    pub fn resolve(&self, artifact_location: &Path) -> Result<&Path, ConfigError> {
        let dir = artifact_location
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| ConfigError::InvalidFormat {
                field: "base_path",
                reason: format!(
                    "cannot derive a directory from '{}'",
                    artifact_location.display()
                ),
            })?;
        self.define(dir)
    }
}
