//! Hand-off to the external WordPress runtime
//!
//! The runtime is entered by running `wp-settings.php` under a PHP interpreter.
//! The configuration travels explicitly through the child's environment; a
//! short prelude turns it into the constants and `$table_prefix` global the
//! runtime reads, then requires the settings script.

use crate::config::{InstallationConfig, SECRET_SETTINGS};
use crate::startup::SETTINGS_SCRIPT;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Default interpreter binary
pub const DEFAULT_INTERPRETER: &str = "php";

/// Settings defined as string constants, besides the keys and salts
const STRING_CONSTANTS: [&str; 6] = [
    "DB_NAME",
    "DB_USER",
    "DB_PASSWORD",
    "DB_HOST",
    "DB_CHARSET",
    "DB_COLLATE",
];

/// Error type for the runtime hand-off
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Runtime exited with non-zero status
    #[error("Runtime exited with code: {0}")]
    ExitedWithCode(i32),

    /// Runtime process was terminated by signal
    #[error("Runtime process was terminated by signal")]
    Terminated,

    /// The configuration has no base path to locate the settings script
    #[error("Base path is not defined")]
    BasePathUndefined,

    /// IO error spawning or waiting for the runtime
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The external runtime that takes over once configuration is loaded
///
/// Called exactly once per process, with the fully resolved configuration.
pub trait ExternalRuntime {
    fn start(
        &self,
        config: Arc<InstallationConfig>,
    ) -> impl Future<Output = Result<(), RuntimeError>> + Send;
}

/// Interpreter and script used to enter the runtime
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsScript {
    /// Interpreter binary, `php` unless overridden
    pub interpreter: String,
    /// Path to `wp-settings.php`
    pub script: PathBuf,
}

impl SettingsScript {
    pub fn new(interpreter: impl Into<String>, script: PathBuf) -> Self {
        Self {
            interpreter: interpreter.into(),
            script,
        }
    }

    /// `wp-settings.php` inside the configured base path
    pub fn for_config(
        interpreter: impl Into<String>,
        config: &InstallationConfig,
    ) -> Result<Self, RuntimeError> {
        let base = config.base_path().ok_or(RuntimeError::BasePathUndefined)?;
        Ok(Self::new(interpreter, base.join(SETTINGS_SCRIPT)))
    }
}

/// Environment variables that carry the configuration into the runtime
///
/// `ABSPATH` always ends with a `/`.
pub fn settings_env(config: &InstallationConfig) -> Vec<(&'static str, String)> {
    let db = &config.database;
    let mut vars = vec![
        ("DB_NAME", db.name.clone()),
        ("DB_USER", db.user.clone()),
        ("DB_PASSWORD", db.password.expose().to_string()),
        ("DB_HOST", db.host.clone()),
        ("DB_CHARSET", db.charset.clone()),
        ("DB_COLLATE", db.collate.clone()),
    ];

    for (_, key, value) in config.secrets.entries() {
        vars.push((key, value.expose().to_string()));
    }

    vars.push(("TABLE_PREFIX", config.table_prefix.clone()));
    vars.push(("WP_DEBUG", config.debug_enabled.to_string()));

    if let Some(base) = config.base_path() {
        vars.push(("ABSPATH", abspath_value(base)));
    }

    vars
}

fn abspath_value(base: &Path) -> String {
    let mut value = base.display().to_string();
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}

/// PHP code run before the settings script
///
/// Reads every variable of [`settings_env`] back with `getenv`, defines the
/// constants (`WP_DEBUG` as a boolean), sets the global `$table_prefix`, and
/// requires the script passed as the first argument.
pub fn settings_prelude() -> String {
    let names: Vec<String> = STRING_CONSTANTS
        .iter()
        .copied()
        .chain(SECRET_SETTINGS.iter().map(|(_, key)| *key))
        .map(|name| format!("'{}'", name))
        .collect();

    format!(
        "foreach ([{}] as $name) {{ define($name, (string) getenv($name)); }} \
         define('WP_DEBUG', getenv('WP_DEBUG') === 'true'); \
         define('ABSPATH', (string) getenv('ABSPATH')); \
         $table_prefix = (string) getenv('TABLE_PREFIX'); \
         require_once $argv[1];",
        names.join(", ")
    )
}

/// Build the interpreter command that enters the runtime
///
/// Runs `<php> -r <prelude> -- <wp-settings.php>`. The working directory is
/// the base path, as the runtime resolves its includes relative to it.
pub fn build_settings_command(script: &SettingsScript, config: &InstallationConfig) -> Command {
    let mut cmd = Command::new(&script.interpreter);
    cmd.arg("-r")
        .arg(settings_prelude())
        .arg("--")
        .arg(&script.script);
    cmd.envs(settings_env(config));

    if let Some(base) = config.base_path() {
        cmd.current_dir(base);
    }

    cmd
}

/// Run the settings script and wait for the runtime to exit
///
/// # Errors
/// Returns an error if:
/// - The interpreter fails to start (IO error)
/// - The runtime exits with non-zero status
/// - The runtime is terminated by a signal
pub async fn run_settings_script(
    script: &SettingsScript,
    config: &InstallationConfig,
) -> Result<(), RuntimeError> {
    let cmd = build_settings_command(script, config);
    info!(
        interpreter = %script.interpreter,
        script = %script.script.display(),
        "handing off to runtime"
    );

    let status = tokio::process::Command::from(cmd).status().await?;

    if status.success() {
        Ok(())
    } else {
        match status.code() {
            Some(code) => Err(RuntimeError::ExitedWithCode(code)),
            None => Err(RuntimeError::Terminated),
        }
    }
}

/// Enters WordPress by running `wp-settings.php` with a PHP interpreter
#[derive(Debug, Clone)]
pub struct PhpRuntime {
    pub interpreter: String,
}

impl PhpRuntime {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

impl Default for PhpRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_INTERPRETER)
    }
}

impl ExternalRuntime for PhpRuntime {
    async fn start(&self, config: Arc<InstallationConfig>) -> Result<(), RuntimeError> {
        let script = SettingsScript::for_config(self.interpreter.clone(), &config)?;
        run_settings_script(&script, &config).await
    }
}
