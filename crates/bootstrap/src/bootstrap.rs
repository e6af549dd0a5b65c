//! Startup sequence for wp-bootstrap
//!
//! Loads the installation settings once, resolves the base path, runs the
//! preflight checks and hands off to the external runtime.

use crate::config::{load_env_file, require_env_file, ConfigError, InstallationConfig};
use crate::runtime::{ExternalRuntime, RuntimeError};
use crate::startup::{run_startup_checks, StartupError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Error type for the startup sequence
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Startup check failed
    #[error("Startup check failed: {0}")]
    Startup(#[from] StartupError),

    /// The runtime failed after hand-off
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Configuration is already loaded")]
    AlreadyLoaded,

    /// An earlier load failed; the process has to start over
    #[error("Configuration failed to load earlier")]
    LoadFailed,

    #[error("Configuration has not been loaded")]
    NotLoaded,

    #[error("Runtime has already been started")]
    AlreadyBootstrapped,
}

/// Where the settings come from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOptions {
    /// Optional TOML file; its directory is the default base path
    pub config_file: Option<PathBuf>,
    /// `.env` file loaded into the environment before reading it
    pub env_file: Option<PathBuf>,
    /// Fail when `env_file` does not exist instead of skipping it
    pub env_file_required: bool,
}

impl LoadOptions {
    /// The file whose directory becomes the base path when none is defined
    pub fn artifact_location(&self) -> Option<&Path> {
        self.config_file.as_deref().or(self.env_file.as_deref())
    }
}

/// Lifecycle of the configuration within the process
#[derive(Debug, Clone, PartialEq)]
pub enum BootState {
    Unloaded,
    Loaded(Arc<InstallationConfig>),
    Bootstrapped(Arc<InstallationConfig>),
    /// Terminal: loading failed and is not retried
    Failed,
}

/// Drives `Unloaded -> Loaded -> Bootstrapped`, each transition at most once
///
/// A failed load moves to `Failed` instead of `Loaded`; nothing leaves it.
#[derive(Debug)]
pub struct Bootstrapper {
    state: BootState,
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootstrapper {
    pub fn new() -> Self {
        Self {
            state: BootState::Unloaded,
        }
    }

    pub fn state(&self) -> &BootState {
        &self.state
    }

    /// The loaded configuration, if any
    pub fn config(&self) -> Option<&Arc<InstallationConfig>> {
        match &self.state {
            BootState::Unloaded | BootState::Failed => None,
            BootState::Loaded(config) | BootState::Bootstrapped(config) => Some(config),
        }
    }

    fn ensure_unloaded(&self) -> Result<(), BootstrapError> {
        match self.state {
            BootState::Unloaded => Ok(()),
            BootState::Failed => Err(BootstrapError::LoadFailed),
            BootState::Loaded(_) | BootState::Bootstrapped(_) => Err(BootstrapError::AlreadyLoaded),
        }
    }

    /// Record the outcome of a load attempt
    fn settle(
        &mut self,
        result: Result<InstallationConfig, BootstrapError>,
    ) -> Result<Arc<InstallationConfig>, BootstrapError> {
        match result {
            Ok(config) => {
                let config = Arc::new(config);
                self.state = BootState::Loaded(config.clone());
                Ok(config)
            }
            Err(e) => {
                self.state = BootState::Failed;
                Err(e)
            }
        }
    }

    /// Load settings from the sources in `options`
    ///
    /// This performs the full load sequence:
    /// 1. Load the `.env` file (skipped when missing, unless required)
    /// 2. Read the TOML file, if given
    /// 3. Apply environment overrides and validate
    /// 4. Resolve the base path from the artifact location unless already defined
    ///
    /// Any failure leaves the bootstrapper in `Failed`.
    pub fn load(&mut self, options: &LoadOptions) -> Result<Arc<InstallationConfig>, BootstrapError> {
        self.ensure_unloaded()?;
        let result = read_sources(options)
            .and_then(|config| prepare(config, options.artifact_location()));
        self.settle(result)
    }

    /// Accept an already built configuration
    ///
    /// Useful for testing or when the settings come from somewhere other than
    /// files and the environment. Fails the same way `load` does.
    pub fn install(
        &mut self,
        config: InstallationConfig,
        artifact_location: Option<&Path>,
    ) -> Result<Arc<InstallationConfig>, BootstrapError> {
        self.ensure_unloaded()?;
        let result = prepare(config, artifact_location);
        self.settle(result)
    }

    /// Run the preflight checks against the loaded configuration
    pub fn preflight(&self, interpreter: &str) -> Result<(), BootstrapError> {
        if self.state == BootState::Failed {
            return Err(BootstrapError::LoadFailed);
        }
        let config = self.config().ok_or(BootstrapError::NotLoaded)?;
        run_startup_checks(config, interpreter)?;
        Ok(())
    }

    /// Hand the configuration to the external runtime
    ///
    /// The runtime is started at most once. The state moves to `Bootstrapped`
    /// before the runtime runs, so a failed runtime is not retried.
    pub async fn bootstrap<R: ExternalRuntime>(&mut self, runtime: &R) -> Result<(), BootstrapError> {
        let config = match &self.state {
            BootState::Unloaded => return Err(BootstrapError::NotLoaded),
            BootState::Failed => return Err(BootstrapError::LoadFailed),
            BootState::Bootstrapped(_) => return Err(BootstrapError::AlreadyBootstrapped),
            BootState::Loaded(config) => config.clone(),
        };

        self.state = BootState::Bootstrapped(config.clone());
        runtime.start(config).await?;
        Ok(())
    }
}

fn read_sources(options: &LoadOptions) -> Result<InstallationConfig, BootstrapError> {
    if let Some(env_file) = &options.env_file {
        if options.env_file_required {
            require_env_file(env_file)?;
            debug!(path = %env_file.display(), "loaded env file");
        } else if load_env_file(env_file)? {
            debug!(path = %env_file.display(), "loaded env file");
        }
    }

    let config = match &options.config_file {
        Some(path) => InstallationConfig::load_from_file(path)?,
        None => InstallationConfig::load()?,
    };
    Ok(config)
}

/// Settle the base path and check that one is known
fn prepare(
    config: InstallationConfig,
    artifact_location: Option<&Path>,
) -> Result<InstallationConfig, BootstrapError> {
    if config.base_path_defined() {
        debug!("base path defined externally, artifact location ignored");
    } else if let Some(location) = artifact_location {
        config.resolve_base_path(location)?;
    }

    let base_path = config
        .base_path()
        .ok_or(ConfigError::MissingField { field: "base_path" })?;

    info!(
        db_name = %config.database.name,
        db_host = %config.database.host,
        table_prefix = %config.table_prefix,
        debug = config.debug_enabled,
        base_path = %base_path.display(),
        "configuration loaded"
    );

    Ok(config)
}

/// Redacted view of the configuration for operators
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConfigSummary {
    pub db_name: String,
    pub db_user: String,
    pub db_host: String,
    pub db_charset: String,
    pub db_collate: String,
    pub table_prefix: String,
    pub debug_enabled: bool,
    pub base_path: Option<PathBuf>,
    /// Names of the secrets that are set; values are never included
    pub secrets: Vec<&'static str>,
}

impl From<&InstallationConfig> for ConfigSummary {
    fn from(config: &InstallationConfig) -> Self {
        let db = &config.database;
        Self {
            db_name: db.name.clone(),
            db_user: db.user.clone(),
            db_host: db.host.clone(),
            db_charset: db.charset.clone(),
            db_collate: db.collate.clone(),
            table_prefix: config.table_prefix.clone(),
            debug_enabled: config.debug_enabled,
            base_path: config.base_path().map(Path::to_path_buf),
            secrets: config
                .secrets
                .entries()
                .iter()
                .map(|(field, _, _)| *field)
                .chain(std::iter::once("db_password"))
                .collect(),
        }
    }
}
