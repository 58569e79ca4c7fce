//! Server configuration.
//!
//! Library defaults, overridden by environment variables in `from_env()`,
//! overridden again by whatever the caller sets with the builder methods.
//!
//! ```rust,ignore
//! let config = ServerConfig::from_env()
//!     .port(8080)
//!     .workers(4);
//! config.validate()?;
//! ```

use ohttpd_core::constants::{DEFAULT_BACKLOG, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_EVENTS};
use ohttpd_core::env::{env_get, env_get_nonzero, env_get_opt};
use ohttpd_core::error::{HttpdError, Result};

use crate::pool::default_workers;

use std::net::Ipv4Addr;
use std::path::PathBuf;

pub const DEFAULT_DOC_ROOT: &str = "./resources";
pub const DEFAULT_QUEUE_DEPTH: usize = 10000;
pub const DEFAULT_WAIT_TIMEOUT_MS: i32 = 500;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: Ipv4Addr,
    /// 0 picks an ephemeral port.
    pub port: u16,
    /// Directory the request targets are resolved under.
    pub doc_root: PathBuf,
    pub workers: usize,
    /// Pending tasks before the reactor runs work inline.
    pub queue_depth: usize,
    /// Connection table size; descriptors at or above it are refused.
    pub max_connections: usize,
    pub backlog: i32,
    /// Events fetched per wait.
    pub max_events: usize,
    /// Upper bound on how long shutdown goes unnoticed.
    pub wait_timeout_ms: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Library defaults, no environment.
    pub fn new() -> Self {
        Self {
            bind_addr: Ipv4Addr::UNSPECIFIED,
            port: 0,
            doc_root: PathBuf::from(DEFAULT_DOC_ROOT),
            workers: default_workers(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            backlog: DEFAULT_BACKLOG,
            max_events: DEFAULT_MAX_EVENTS,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
        }
    }

    /// Defaults with environment overrides:
    /// - `OHTTPD_DOC_ROOT` - document root
    /// - `OHTTPD_WORKERS` - worker threads
    /// - `OHTTPD_QUEUE_DEPTH` - task queue capacity
    /// - `OHTTPD_MAX_CONNS` - connection table size
    /// - `OHTTPD_BACKLOG` - listen backlog
    /// - `OHTTPD_MAX_EVENTS` - events per wait
    pub fn from_env() -> Self {
        let d = Self::new();
        Self {
            doc_root: env_get_opt::<String>("OHTTPD_DOC_ROOT")
                .filter(|s| !s.is_empty())
                .map_or(d.doc_root, PathBuf::from),
            workers: env_get_nonzero("OHTTPD_WORKERS", d.workers),
            queue_depth: env_get_nonzero("OHTTPD_QUEUE_DEPTH", d.queue_depth),
            max_connections: env_get_nonzero("OHTTPD_MAX_CONNS", d.max_connections),
            backlog: env_get("OHTTPD_BACKLOG", d.backlog),
            max_events: env_get_nonzero("OHTTPD_MAX_EVENTS", d.max_events),
            ..d
        }
    }

    // Builder methods

    pub fn bind_addr(mut self, addr: Ipv4Addr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn doc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.doc_root = root.into();
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn queue_depth(mut self, n: usize) -> Self {
        self.queue_depth = n;
        self
    }

    pub fn max_connections(mut self, n: usize) -> Self {
        self.max_connections = n;
        self
    }

    pub fn backlog(mut self, n: i32) -> Self {
        self.backlog = n;
        self
    }

    pub fn max_events(mut self, n: usize) -> Self {
        self.max_events = n;
        self
    }

    pub fn wait_timeout_ms(mut self, ms: i32) -> Self {
        self.wait_timeout_ms = ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(HttpdError::InvalidConfig("workers must be > 0"));
        }
        if self.workers > 64 {
            return Err(HttpdError::InvalidConfig("workers must be <= 64"));
        }
        if self.queue_depth == 0 {
            return Err(HttpdError::InvalidConfig("queue_depth must be > 0"));
        }
        if self.max_connections == 0 {
            return Err(HttpdError::InvalidConfig("max_connections must be > 0"));
        }
        if self.backlog <= 0 {
            return Err(HttpdError::InvalidConfig("backlog must be > 0"));
        }
        if self.max_events == 0 || self.max_events > i32::MAX as usize {
            return Err(HttpdError::InvalidConfig("max_events out of range"));
        }
        if self.wait_timeout_ms <= 0 {
            return Err(HttpdError::InvalidConfig("wait_timeout_ms must be > 0"));
        }
        if self.doc_root.as_os_str().is_empty() {
            return Err(HttpdError::InvalidConfig("doc_root must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.backlog, 5);
        assert_eq!(config.max_connections, 65535);
        assert_eq!(config.bind_addr, Ipv4Addr::UNSPECIFIED);
        assert_eq!(config.doc_root, PathBuf::from("./resources"));
    }

    #[test]
    fn test_env_overlay() {
        std::env::set_var("OHTTPD_BACKLOG", "64");
        std::env::set_var("OHTTPD_DOC_ROOT", "/srv/www");
        let config = ServerConfig::from_env();
        std::env::remove_var("OHTTPD_BACKLOG");
        std::env::remove_var("OHTTPD_DOC_ROOT");
        assert_eq!(config.backlog, 64);
        assert_eq!(config.doc_root, PathBuf::from("/srv/www"));
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new()
            .port(8080)
            .workers(3)
            .doc_root("/tmp/site")
            .bind_addr(Ipv4Addr::LOCALHOST);
        assert_eq!(config.port, 8080);
        assert_eq!(config.workers, 3);
        assert_eq!(config.doc_root, PathBuf::from("/tmp/site"));
        assert_eq!(config.bind_addr, Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn test_validation() {
        assert!(ServerConfig::new().workers(0).validate().is_err());
        assert!(ServerConfig::new().workers(1000).validate().is_err());
        assert!(ServerConfig::new().backlog(0).validate().is_err());
        assert!(ServerConfig::new().max_events(0).validate().is_err());
        assert!(ServerConfig::new().doc_root("").validate().is_err());
    }
}
