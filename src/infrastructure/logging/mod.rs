// Logging module - Logging infrastructure
use crate::domain::error::{GnssConfError, GnssConfResult};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor a flag says otherwise
fn default_filter(level: &str) -> String {
    format!("gnssconf={},warn", level)
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)))
}

/// Initialize logging to stderr. A second call is a no-op.
pub fn init_logging(level: &str) -> GnssConfResult<()> {
    let result = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .try_init();

    if result.is_ok() {
        tracing::debug!("gnssconf logging initialized at {}", level);
    }
    Ok(())
}

/// Initialize logging into a file, used while the TUI owns the terminal
pub fn init_file_logging(path: &Path, level: &str) -> GnssConfResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .map_err(|e| GnssConfError::Config {
            message: format!("Failed to initialize file logging: {}", e),
        })
}

/// Log file used by the TUI
pub fn tui_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("gnssconf")
        .join("gnssconf.log")
}
