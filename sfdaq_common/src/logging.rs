//! Tracing subscriber setup shared by the sf-daq binaries.

use crate::config::LogLevel;
use tracing::Level;
use tracing_subscriber::EnvFilter;

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` directives are honoured on top of `level`. Calling this twice
/// is harmless; the second subscriber is ignored.
pub fn init_tracing(level: LogLevel, json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(Level::from(level).into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
