//! CLI entry point for wp-bootstrap
//!
//! Parses command line arguments, loads the installation settings and hands
//! them to the WordPress runtime.

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use wp_bootstrap::config::{SecretKeys, DEFAULT_SECRET_LENGTH};
use wp_bootstrap::{logging, Bootstrapper, ConfigSummary, LoadOptions, PhpRuntime};

/// wp-bootstrap - load WordPress settings and start the runtime
#[derive(Parser, Debug)]
#[command(name = "wp-bootstrap")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML settings file; its directory is the default base path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// .env file loaded before reading the environment [default: .env, skipped when missing]
    #[arg(short, long, global = true)]
    env_file: Option<PathBuf>,

    /// PHP interpreter used to run wp-settings.php
    #[arg(long, global = true, default_value = wp_bootstrap::DEFAULT_INTERPRETER)]
    php: String,

    /// Skip preflight checks. For testing only.
    #[arg(long, global = true, default_value = "false")]
    skip_checks: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value = "false")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Load settings, run preflight checks and start the runtime (default)
    Run,
    /// Load settings and run preflight checks, then print a redacted summary
    Check,
    /// Print a fresh set of keys and salts in .env format
    GenerateSalts {
        /// Length of each key and salt
        #[arg(short, long, default_value_t = DEFAULT_SECRET_LENGTH)]
        length: usize,
    },
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// An explicit `--env-file` must exist; the default `.env` may be absent
fn load_options(args: &Args) -> io::Result<LoadOptions> {
    let env_file = args.env_file.as_deref().unwrap_or(Path::new(DEFAULT_ENV_FILE));
    Ok(LoadOptions {
        config_file: args.config.as_deref().map(absolute).transpose()?,
        env_file: Some(absolute(env_file)?),
        env_file_required: args.env_file.is_some(),
    })
}

fn print_salts(length: usize) {
    let keys = SecretKeys::generate(length);
    for (_, key, value) in keys.entries() {
        println!("{}='{}'", key, value.expose());
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let command = args.command.clone().unwrap_or(Command::Run);

    if let Command::GenerateSalts { length } = command {
        print_salts(length);
        return ExitCode::SUCCESS;
    }

    let log = match logging::init(args.log_json) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let options = match load_options(&args) {
        Ok(options) => options,
        Err(e) => {
            error!("Failed to resolve working directory: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut boot = Bootstrapper::new();
    let config = match boot.load(&options) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = log.set_debug(config.debug_enabled) {
        warn!("Failed to adjust log level: {}", e);
    }

    if args.skip_checks {
        warn!("Skipping preflight checks (--skip-checks enabled)");
    } else if let Err(e) = boot.preflight(&args.php) {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    if command == Command::Check {
        let summary = ConfigSummary::from(config.as_ref());
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to render summary: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    let runtime = PhpRuntime::new(args.php.clone());
    match boot.bootstrap(&runtime).await {
        Ok(()) => {
            info!("Runtime exited");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
