//! Startup checks module for wp-bootstrap
//!
//! Provides preflight checks to verify the installation before handing off:
//! - Base path exists and is a directory
//! - `wp-settings.php` is present in the base path
//! - Authentication keys and salts are pairwise distinct
//! - The PHP interpreter is available

use crate::config::{InstallationConfig, SecretKeys};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

/// Script the runtime is entered through
pub const SETTINGS_SCRIPT: &str = "wp-settings.php";

/// Keys or salts shorter than this are reported as weak
pub const MIN_SECRET_LENGTH: usize = 32;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Base path is not defined")]
    BasePathUndefined,

    #[error("Base path {} does not exist or is not a directory", .0.display())]
    BasePathNotDirectory(PathBuf),

    #[error("Settings script not found at {}", .0.display())]
    SettingsScriptMissing(PathBuf),

    #[error("{first} and {second} have the same value; every key and salt must be unique")]
    DuplicateSecret {
        first: &'static str,
        second: &'static str,
    },

    #[error("PHP interpreter not available: {0}")]
    InterpreterUnavailable(String),
}

/// Check that the base path is an existing directory
pub fn check_base_path(base_path: &Path) -> Result<(), StartupError> {
    if base_path.is_dir() {
        Ok(())
    } else {
        Err(StartupError::BasePathNotDirectory(base_path.to_path_buf()))
    }
}

/// Check that `wp-settings.php` exists in the base path
pub fn check_settings_script(base_path: &Path) -> Result<(), StartupError> {
    let script = base_path.join(SETTINGS_SCRIPT);
    if script.is_file() {
        Ok(())
    } else {
        Err(StartupError::SettingsScriptMissing(script))
    }
}

/// Check that no two keys or salts share a value
///
/// Values shorter than [`MIN_SECRET_LENGTH`] are logged as a warning only;
/// whether a value is unpredictable cannot be checked here.
pub fn check_secret_distinctness(secrets: &SecretKeys) -> Result<(), StartupError> {
    let entries = secrets.entries();

    for (i, &(first, _, a)) in entries.iter().enumerate() {
        if a.len() < MIN_SECRET_LENGTH {
            warn!(
                setting = first,
                length = a.len(),
                "secret is shorter than {} characters",
                MIN_SECRET_LENGTH
            );
        }
        if let Some(&(second, _, _)) = entries[i + 1..]
            .iter()
            .find(|(_, _, b)| b.expose() == a.expose())
        {
            return Err(StartupError::DuplicateSecret { first, second });
        }
    }

    Ok(())
}

/// Check that the PHP interpreter runs, via `<php> --version`
pub fn check_interpreter_available(interpreter: &str) -> Result<(), StartupError> {
    let output = Command::new(interpreter)
        .arg("--version")
        .output()
        .map_err(|e| {
            StartupError::InterpreterUnavailable(format!(
                "{} --version failed; is PHP installed and in PATH? Error: {}",
                interpreter, e
            ))
        })?;

    if !output.status.success() {
        return Err(StartupError::InterpreterUnavailable(format!(
            "{} --version exited with {}",
            interpreter, output.status
        )));
    }

    let version = String::from_utf8_lossy(&output.stdout);
    debug!(
        interpreter,
        version = version.lines().next().unwrap_or("(empty)"),
        "interpreter available"
    );
    Ok(())
}

/// Run all startup checks in order
///
/// Checks are run in the following order:
/// 1. Base path
/// 2. Settings script
/// 3. Secret distinctness
/// 4. Interpreter availability
pub fn run_startup_checks(cfg: &InstallationConfig, interpreter: &str) -> Result<(), StartupError> {
    let base_path = cfg.base_path().ok_or(StartupError::BasePathUndefined)?;
    check_base_path(base_path)?;
    check_settings_script(base_path)?;
    check_secret_distinctness(&cfg.secrets)?;
    check_interpreter_available(interpreter)?;
    Ok(())
}
