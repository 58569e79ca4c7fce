//! Environment variable helpers used by the config overlay.
//!
//! ```ignore
//! let workers: usize = env_get("OHTTPD_WORKERS", 4);
//! let flush = env_get_bool("OHTTPD_LOG_FLUSH", false);
//! ```

use std::str::FromStr;

/// Parse `key` as `T`, falling back to `default` when unset or unparsable.
#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

/// Parse `key` as `T`; `None` when unset or unparsable.
#[inline]
pub fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// "1", "true", "yes", "on" (any case) are true; any other set value is false.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Like [`env_get`] but a parsed zero is treated as unset.
#[inline]
pub fn env_get_nonzero(key: &str, default: usize) -> usize {
    match env_get_opt::<usize>(key) {
        Some(0) | None => default,
        Some(n) => n,
    }
}
