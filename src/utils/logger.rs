use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable enabling the debug log file
pub const DEBUG_ENV: &str = "DUBMIX_DEBUG";

/// Where log output goes when debug logging is off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Human-readable lines on stderr
    Stderr,
    /// Nothing, so a full-screen interface keeps the terminal to itself
    Silent,
}

/// Initialize logging.
///
/// With `DUBMIX_DEBUG` set, everything down to debug goes to a daily log file
/// and the returned guard must be held until exit. Otherwise `target` decides.
pub fn init_logging(target: LogTarget) -> Option<WorkerGuard> {
    if std::env::var_os(DEBUG_ENV).is_some() {
        let log_dir = dirs::data_local_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("dubmix");

        let _ = std::fs::create_dir_all(&log_dir);

        let file_appender = tracing_appender::rolling::daily(&log_dir, "dubmix.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .init();

        tracing::info!("dubmix logging to {}", log_dir.display());
        return Some(guard);
    }

    if target == LogTarget::Stderr {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }
    None
}
