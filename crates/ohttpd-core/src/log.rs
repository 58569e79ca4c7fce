//! Leveled stderr logging for ohttpd
//!
//! Every line is written under the stderr lock, so lines from the reactor
//! and from workers never interleave mid-line.
//!
//! # Environment Variables
//!
//! - `OHTTPD_LOG_LEVEL=<level>` - off|error|warn|info|debug|trace, or 0-5 (default: info)
//! - `OHTTPD_LOG_FLUSH=1` - Flush stderr after each line
//!
//! # Usage
//!
//! ```ignore
//! use ohttpd_core::{hinfo, hdebug};
//!
//! hinfo!("listening on {}", addr);
//! hdebug!("fd {} rearmed for {:?}", fd, interest);
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Parse a level name or digit. Unknown strings give `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "1" => Some(LogLevel::Error),
            "warn" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Read `OHTTPD_LOG_LEVEL` / `OHTTPD_LOG_FLUSH`.
///
/// Runs on the first log call; call it explicitly to make startup
/// deterministic. A level set with [`set_log_level`] before this runs wins.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    FLUSH_ENABLED.store(crate::env::env_get_bool("OHTTPD_LOG_FLUSH", false), Ordering::Relaxed);
    if let Some(level) = crate::env::env_get_opt::<String>("OHTTPD_LOG_LEVEL")
        .as_deref()
        .and_then(LogLevel::parse)
    {
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

#[inline]
pub fn log_level() -> LogLevel {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set the level programmatically. Environment parsing is skipped afterwards.
pub fn set_log_level(level: LogLevel) {
    INITIALIZED.store(true, Ordering::SeqCst);
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

#[doc(hidden)]
pub fn _log_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("-");
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = write!(handle, "{} {}: ", level.prefix(), name);
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if FLUSH_ENABLED.load(Ordering::Relaxed) {
        let _ = handle.flush();
    }
}

#[macro_export]
macro_rules! herror {
    ($($arg:tt)*) => {{
        $crate::log::_log_impl($crate::log::LogLevel::Error, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! hwarn {
    ($($arg:tt)*) => {{
        $crate::log::_log_impl($crate::log::LogLevel::Warn, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! hinfo {
    ($($arg:tt)*) => {{
        $crate::log::_log_impl($crate::log::LogLevel::Info, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! hdebug {
    ($($arg:tt)*) => {{
        $crate::log::_log_impl($crate::log::LogLevel::Debug, format_args!($($arg)*));
    }};
}

/// Per-line request tracing. Very noisy.
#[macro_export]
macro_rules! htrace {
    ($($arg:tt)*) => {{
        $crate::log::_log_impl($crate::log::LogLevel::Trace, format_args!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" 2 "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::from_u8(99), LogLevel::Trace);
    }

    #[test]
    fn test_off_disables_everything() {
        set_log_level(LogLevel::Off);
        assert!(!level_enabled(LogLevel::Error));
        herror!("suppressed {}", 1);
        htrace!("suppressed");
    }
}
