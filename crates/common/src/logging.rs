//! Logger installation and log-level queries.

use error_stack::Report;
use log::LevelFilter;

use crate::error::AdapterError;

/// Install the process-wide logger.
///
/// Host runtimes that already own a `log` implementation should skip this and
/// let the adapters log through their logger.
///
/// # Errors
///
/// Returns [`AdapterError::Logging`] if a logger has already been installed.
pub fn init_logger(level: LevelFilter) -> Result<(), Report<AdapterError>> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} [{}] {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .map_err(|e| {
            Report::new(AdapterError::Logging {
                message: e.to_string(),
            })
        })
}

/// Log level helper to determine if debug logging is enabled
#[must_use]
pub fn is_debug_enabled() -> bool {
    log::log_enabled!(log::Level::Debug)
}
