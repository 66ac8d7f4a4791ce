//! Logging initialization (spec §1 "log rotation" is an external
//! collaborator; this is the ambient stack that feeds it).
//!
//! A simplified version of the teacher's `rust-srec/src/logging` module:
//! the same `tracing` + `tracing-subscriber` + `tracing-appender` stack,
//! minus the reloadable-filter/broadcast machinery the teacher built for
//! its web UI, which has no counterpart here (spec §1 Out of scope: "the
//! terminal dashboard").

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// Default filter applied when `RUST_LOG`/`KIOSK_LOG_LEVEL` is unset.
pub const DEFAULT_LOG_FILTER: &str = "kiosk_supervisor=info";

/// Initialize logging: an ANSI console layer plus a daily-rotating file
/// layer under `log_dir`. Returns the [`WorkerGuard`] for the file
/// writer; it must be kept alive for the process's lifetime or buffered
/// log lines can be dropped on exit.
pub fn init(log_dir: &Path, level: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir).map_err(Error::Io)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "kiosk-supervisor.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()
        .map_err(|err| Error::Other(format!("failed to install tracing subscriber: {err}")))?;

    Ok(guard)
}
