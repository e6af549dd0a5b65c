//! wp-bootstrap
//!
//! Loads the settings of a WordPress installation, checks them, and hands
//! them to the PHP runtime exactly once.

pub mod bootstrap;
pub mod logging;
pub mod runtime;
pub mod startup;

pub use bootstrap::{BootState, BootstrapError, Bootstrapper, ConfigSummary, LoadOptions};
pub use logging::LogHandle;
pub use runtime::{
    build_settings_command, run_settings_script, settings_env, ExternalRuntime, PhpRuntime,
    RuntimeError, SettingsScript, DEFAULT_INTERPRETER,
};
pub use startup::{
    check_base_path, check_interpreter_available, check_secret_distinctness,
    check_settings_script, run_startup_checks, StartupError, SETTINGS_SCRIPT,
};
pub use wp_bootstrap_config as config;
pub use wp_bootstrap_config::{ConfigError, InstallationConfig};
