//! Logging initialization with file output support
//!
//! Everything goes to stderr (stdout carries shell output) and, when a log
//! directory is available, to a daily `neonterm.log`. Events with the
//! `security` target are also copied to a separate daily `security.log`.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Used when `RUST_LOG` is unset or invalid. russh is chatty at info.
const DEFAULT_FILTER: &str = "info,russh=warn,russh_sftp=warn,security=info";

/// Target of the audit events written by `security_log`
const SECURITY_TARGET: &str = "security";

/// Writer guards for the log files. Keep alive for the life of the program.
pub struct LogGuards {
    _main: WorkerGuard,
    _security: WorkerGuard,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn security_targets() -> Targets {
    Targets::new().with_target(SECURITY_TARGET, Level::INFO)
}

/// Initialize logging with optional file output.
pub fn init_logging(log_dir: Option<PathBuf>) -> Option<LogGuards> {
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);

    match log_dir {
        Some(dir) => {
            let (main_writer, main_guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, "neonterm.log"));
            let (security_writer, security_guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, "security.log"));

            let file_layer = fmt::layer()
                .with_writer(main_writer)
                .with_ansi(false)
                .with_target(true);
            let security_layer = fmt::layer()
                .with_writer(security_writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(security_targets());

            tracing_subscriber::registry()
                .with(env_filter())
                .with(console_layer)
                .with(file_layer)
                .with(security_layer)
                .init();

            Some(LogGuards {
                _main: main_guard,
                _security: security_guard,
            })
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(console_layer)
                .init();
            None
        }
    }
}
