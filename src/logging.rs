//! File logging.
//!
//! The terminal belongs to the table, so log output goes to a file. The level
//! comes from `RUST_LOG` and defaults to `info`.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::domain::ExplorerError;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `<cache dir>/rtv/rtv.log`, or `rtv.log` in the working directory when the
/// platform has no cache dir.
pub fn default_log_file() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("rtv").join("rtv.log"))
        .unwrap_or_else(|| PathBuf::from("rtv.log"))
}

pub fn init_logging(log_file: &Path) -> Result<(), ExplorerError> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_LEVEL))
        .map_err(|e| ExplorerError::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| ExplorerError::Logging(e.to_string()))
}
