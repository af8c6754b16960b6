use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::{
    fs,
    path::Path,
    sync::OnceLock,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

pub const LOG_FILE: &str = "chaos-casino.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Sends tracing output to a daily file under `log_dir`; the terminal belongs
/// to the UI. Calling it again after a successful set-up does nothing.
pub fn init_file_logging(log_dir: &Path) -> Result<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }
    fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .is_ok();
    if installed {
        let _ = LOG_GUARD.set(guard);
    }
    Ok(())
}
