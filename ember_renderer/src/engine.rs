/// Process-wide logging state for the Ember renderer
///
/// The logger is a global slot so every component (including the Vulkan backend)
/// can report through the `engine_*!` macros without threading a logger around.

use std::sync::{OnceLock, RwLock};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::SystemTime;
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Entries below this severity are discarded before reaching the logger
static MIN_SEVERITY: AtomicU8 = AtomicU8::new(LogSeverity::Trace as u8);

fn logger_slot() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

fn severity_from_u8(value: u8) -> LogSeverity {
    match value {
        0 => LogSeverity::Trace,
        1 => LogSeverity::Debug,
        2 => LogSeverity::Info,
        3 => LogSeverity::Warn,
        _ => LogSeverity::Error,
    }
}

/// Entry point for engine-wide logging configuration
///
/// # Example
///
/// ```no_run
/// use ember_renderer::ember::Engine;
/// use ember_renderer::ember::log::LogSeverity;
///
/// Engine::set_min_severity(LogSeverity::Info);
/// Engine::log(LogSeverity::Info, "app", "renderer ready".to_string());
/// ```
pub struct Engine;

impl Engine {
    /// Replace the global logger
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut lock) = logger_slot().write() {
            *lock = Box::new(logger);
        }
    }

    /// Restore the DefaultLogger and the Trace severity floor
    pub fn reset_logger() {
        if let Ok(mut lock) = logger_slot().write() {
            *lock = Box::new(DefaultLogger);
        }
        MIN_SEVERITY.store(LogSeverity::Trace as u8, Ordering::Relaxed);
    }

    /// Discard entries below `severity`
    pub fn set_min_severity(severity: LogSeverity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    pub fn min_severity() -> LogSeverity {
        severity_from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    /// Log without file:line (used by engine_info!, engine_warn!, ...)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(severity, source, message, None, None);
    }

    /// Log with file:line (used by engine_error!, engine_err!, engine_bail!)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        Self::dispatch(severity, source, message, Some(file), Some(line));
    }

    fn dispatch(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: Option<&'static str>,
        line: Option<u32>,
    ) {
        if severity < Self::min_severity() {
            return;
        }
        if let Ok(lock) = logger_slot().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file,
                line,
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
