use anyhow::{Context, Result};
use flexi_logger::{FileSpec, Logger, LoggerHandle};

use crate::paths::log_directory;

/// Starts file logging. The terminal belongs to the TUI, so nothing is
/// written to stdout or stderr. `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str) -> Result<LoggerHandle> {
    let dir = log_directory()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    Logger::try_with_env_or_str(level)
        .with_context(|| format!("invalid log specification `{level}`"))?
        .log_to_file(FileSpec::default().directory(dir).basename("idobata"))
        .append()
        .start()
        .context("failed to start logger")
}
