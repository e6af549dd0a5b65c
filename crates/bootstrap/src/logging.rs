//! Logging setup
//!
//! Installs a `tracing` subscriber before configuration is loaded. The level
//! starts at `info` and is raised to `debug` once `WP_DEBUG` is known to be on.
//! `RUST_LOG`, when set, takes precedence over both.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Handle to adjust the log level after startup
#[derive(Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl std::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHandle").finish()
    }
}

impl LogHandle {
    /// Switch between `debug` and `info` as the default level
    pub fn set_debug(&self, enabled: bool) -> Result<(), reload::Error> {
        self.filter.modify(|filter| *filter = build_filter(enabled))
    }
}

/// Build the filter for the given debug flag, honouring `RUST_LOG`
pub fn build_filter(debug_enabled: bool) -> EnvFilter {
    let default_level = if debug_enabled {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

/// Initialize the global subscriber
///
/// `json` selects JSON lines instead of the human-readable format. Output goes
/// to stderr so the runtime keeps stdout.
pub fn init(json: bool) -> Result<LogHandle, TryInitError> {
    let (filter, handle) = reload::Layer::new(build_filter(false));

    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true)
    });
    let text_layer = (!json).then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    Ok(LogHandle { filter: handle })
}
